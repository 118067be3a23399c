use std::sync::Arc;

use crate::audit::AuditTrail;
use crate::bookings::BookingService;
use crate::config::Config;
use crate::db::store::Stores;
use crate::roles::{create_role_cache, RoleDirectory};
use crate::utils::storage::DocumentStorage;
use crate::workflow::{BookingWorkflow, ConfirmationGenerator};

/// Everything a handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub bookings: Arc<BookingService>,
    pub workflow: Arc<BookingWorkflow>,
    pub roles: RoleDirectory,
    pub audit: AuditTrail,
    pub documents: DocumentStorage,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        Self {
            bookings: Arc::new(BookingService::new(
                stores.bookings.clone(),
                config.trust_client_payments,
            )),
            workflow: Arc::new(BookingWorkflow::new(
                stores.bookings.clone(),
                ConfirmationGenerator::default(),
            )),
            roles: RoleDirectory::new(stores.accounts.clone(), create_role_cache())
                .with_hash_cost(config.bcrypt_cost),
            audit: AuditTrail::new(stores.audit.clone()),
            documents: DocumentStorage::new(config.document_storage_path.clone()),
            config: Arc::new(config),
            stores,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over a fresh [`MemoryStore`], returned alongside for seeding.
    ///
    /// [`MemoryStore`]: crate::db::memory::MemoryStore
    pub fn in_memory() -> (Self, Arc<crate::db::memory::MemoryStore>) {
        let store = Arc::new(crate::db::memory::MemoryStore::new());
        let state = Self::new(Config::for_tests(), Stores::from_backend(store.clone()));
        (state, store)
    }
}
