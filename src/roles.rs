//! Maps authenticated identities to their (zero or one) admin role and guards
//! every change to that mapping behind a live `super_admin` check.

use std::sync::Arc;
use std::time::Duration;

use bcrypt::DEFAULT_COST;
use moka::sync::Cache;
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::role::{AdminRole, UserRole};
use crate::db::models::user::{NewUser, User, UserWithRole};
use crate::db::store::{AccountStore, StoreError};

/// Maximum number of profiles returned by one user search.
pub const SEARCH_LIMIT: i64 = 20;

pub const MIN_PASSWORD_LEN: usize = 6;

/// The identity a request acts as, resolved once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Option<AdminRole>,
}

impl Caller {
    pub fn customer(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_some()
    }

    pub fn has_role(&self, roles: &[AdminRole]) -> bool {
        self.role.map_or(false, |r| roles.contains(&r))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("{0}")]
    PermissionDenied(String),

    #[error("User already has an admin role. Use update_role to change it.")]
    AlreadyAssigned,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    SelfModification(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for RoleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => RoleError::NotFound(what),
            StoreError::Conflict(msg) => RoleError::Conflict(msg),
            other => RoleError::Storage(other),
        }
    }
}

/// ✅ **Role lookups cached with `moka`**
pub type RoleCache = Arc<Cache<Uuid, Option<AdminRole>>>;

/// ✅ **Initialize the role cache** (TTL = 10 minutes)
pub fn create_role_cache() -> RoleCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600))
            .build(),
    )
}

/// ✅ **Privileged account created through the role endpoint**
#[derive(Debug, Deserialize, Clone, ToSchema)]
pub struct NewAdminAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: AdminRole,
}

#[derive(Clone)]
pub struct RoleDirectory {
    accounts: Arc<dyn AccountStore>,
    cache: RoleCache,
    hash_cost: u32,
}

impl RoleDirectory {
    pub fn new(accounts: Arc<dyn AccountStore>, cache: RoleCache) -> Self {
        Self {
            accounts,
            cache,
            hash_cost: DEFAULT_COST,
        }
    }

    /// Overrides the bcrypt cost used for accounts created here.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Role of `user_id`, served from the cache when possible.
    pub async fn role_of(&self, user_id: Uuid) -> Result<Option<AdminRole>, RoleError> {
        if let Some(role) = self.cache.get(&user_id) {
            return Ok(role);
        }
        let role = self.accounts.role_of(user_id).await?;
        self.cache.insert(user_id, role);
        Ok(role)
    }

    /// Authorization for role changes always reads storage, never the cache,
    /// so a revoked super_admin loses access immediately.
    async fn require_super_admin(&self, requested_by: Uuid) -> Result<(), RoleError> {
        match self.accounts.role_of(requested_by).await? {
            Some(AdminRole::SuperAdmin) => Ok(()),
            _ => {
                warn!(%requested_by, "Role management refused: caller is not a super admin");
                Err(RoleError::PermissionDenied(
                    "Only super admins can manage admin accounts".to_string(),
                ))
            }
        }
    }

    pub async fn assign(
        &self,
        target: Uuid,
        role: AdminRole,
        requested_by: Uuid,
    ) -> Result<UserRole, RoleError> {
        self.require_super_admin(requested_by).await?;

        if self.accounts.find_user(target).await?.is_none() {
            return Err(RoleError::NotFound("user"));
        }
        if self.accounts.role_of(target).await?.is_some() {
            return Err(RoleError::AlreadyAssigned);
        }

        let row = self
            .accounts
            .insert_role(target, role, Some(requested_by))
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => RoleError::AlreadyAssigned,
                other => other.into(),
            })?;
        self.cache.invalidate(&target);

        info!(%target, %role, %requested_by, "✅ Admin role assigned");
        Ok(row)
    }

    pub async fn update(
        &self,
        target: Uuid,
        role: AdminRole,
        requested_by: Uuid,
    ) -> Result<UserRole, RoleError> {
        self.require_super_admin(requested_by).await?;

        if target == requested_by && role != AdminRole::SuperAdmin {
            return Err(RoleError::SelfModification(
                "Super admins cannot demote themselves".to_string(),
            ));
        }

        let row = self.accounts.update_role(target, role).await?;
        self.cache.invalidate(&target);

        info!(%target, %role, %requested_by, "✅ Admin role updated");
        Ok(row)
    }

    pub async fn remove(&self, target: Uuid, requested_by: Uuid) -> Result<(), RoleError> {
        self.require_super_admin(requested_by).await?;

        if target == requested_by {
            return Err(RoleError::SelfModification(
                "Super admins cannot remove their own role".to_string(),
            ));
        }

        self.accounts.delete_role(target).await?;
        self.cache.invalidate(&target);

        info!(%target, %requested_by, "✅ Admin role removed");
        Ok(())
    }

    /// Creates a new account that holds `account.role` from the start.
    pub async fn create_admin(
        &self,
        account: NewAdminAccount,
        requested_by: Uuid,
    ) -> Result<(User, UserRole), RoleError> {
        self.require_super_admin(requested_by).await?;
        let new_user = self.prepare_account(&account.email, &account.password, &account.full_name)?;

        let (user, row) = self
            .accounts
            .create_user_with_role(&new_user, account.role, Some(requested_by))
            .await?;

        info!(user_id = %user.id, role = %row.role, %requested_by, "✅ Admin account created");
        Ok((user, row))
    }

    /// Up to [`SEARCH_LIMIT`] profiles whose email or name contains `term`.
    pub async fn search_users(
        &self,
        term: Option<&str>,
        requested_by: Uuid,
    ) -> Result<Vec<UserWithRole>, RoleError> {
        self.require_super_admin(requested_by).await?;
        Ok(self.accounts.search_users(term, SEARCH_LIMIT).await?)
    }

    /// Grants `super_admin` to the given account when nobody holds it yet,
    /// creating the account if needed. Returns `None` when a super admin
    /// already exists.
    pub async fn bootstrap_super_admin(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<User>, RoleError> {
        if self.accounts.count_role(AdminRole::SuperAdmin).await? > 0 {
            return Ok(None);
        }

        let user = match self.accounts.find_user_by_email(email.trim()).await? {
            Some(existing) => {
                match self.accounts.role_of(existing.id).await? {
                    Some(_) => {
                        self.accounts
                            .update_role(existing.id, AdminRole::SuperAdmin)
                            .await?;
                    }
                    None => {
                        self.accounts
                            .insert_role(existing.id, AdminRole::SuperAdmin, None)
                            .await?;
                    }
                }
                existing
            }
            None => {
                let new_user = self.prepare_account(email, password, full_name)?;
                let (user, _) = self
                    .accounts
                    .create_user_with_role(&new_user, AdminRole::SuperAdmin, None)
                    .await?;
                user
            }
        };
        self.cache.invalidate(&user.id);

        info!(user_id = %user.id, "✅ Bootstrapped super admin");
        Ok(Some(user))
    }

    fn prepare_account(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<NewUser, RoleError> {
        let email = email.trim();
        let full_name = full_name.trim();
        if email.is_empty() || password.is_empty() || full_name.is_empty() {
            return Err(RoleError::Validation(
                "Missing required fields: email, password, full_name, role".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(RoleError::Validation(format!("'{}' is not a valid email", email)));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RoleError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        Ok(NewUser {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            password_hash: bcrypt::hash(password, self.hash_cost)?,
            full_name: full_name.to_string(),
            phone: None,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::memory::MemoryStore;

    pub async fn account(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: bcrypt::hash("secret-pass", 4).unwrap(),
                full_name: email.split('@').next().unwrap_or(email).to_string(),
                phone: None,
            })
            .await
            .unwrap()
    }

    pub async fn account_with_role(store: &MemoryStore, email: &str, role: AdminRole) -> User {
        let user = account(store, email).await;
        store.insert_role(user.id, role, None).await.unwrap();
        user
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{account, account_with_role};
    use super::*;
    use crate::db::memory::MemoryStore;

    fn directory(store: &Arc<MemoryStore>) -> RoleDirectory {
        RoleDirectory::new(store.clone(), create_role_cache()).with_hash_cost(4)
    }

    #[tokio::test]
    async fn only_super_admin_may_assign() {
        let store = Arc::new(MemoryStore::new());
        let roles = directory(&store);
        let admin2 = account_with_role(&store, "a2@venue.in", AdminRole::Admin2).await;
        let target = account(&store, "new@venue.in").await;

        let err = roles
            .assign(target.id, AdminRole::Admin1, admin2.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::PermissionDenied(_)));
        assert_eq!(roles.role_of(target.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn assign_update_remove_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let roles = directory(&store);
        let root = account_with_role(&store, "root@venue.in", AdminRole::SuperAdmin).await;
        let target = account(&store, "staff@venue.in").await;

        // Prime the cache with "no role".
        assert_eq!(roles.role_of(target.id).await.unwrap(), None);

        let row = roles.assign(target.id, AdminRole::Admin1, root.id).await.unwrap();
        assert_eq!(row.created_by, Some(root.id));
        assert_eq!(roles.role_of(target.id).await.unwrap(), Some(AdminRole::Admin1));

        let err = roles
            .assign(target.id, AdminRole::Admin2, root.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::AlreadyAssigned));

        roles.update(target.id, AdminRole::Admin3, root.id).await.unwrap();
        assert_eq!(roles.role_of(target.id).await.unwrap(), Some(AdminRole::Admin3));

        roles.remove(target.id, root.id).await.unwrap();
        assert_eq!(roles.role_of(target.id).await.unwrap(), None);

        let err = roles.remove(target.id, root.id).await.unwrap_err();
        assert!(matches!(err, RoleError::NotFound("role")));
    }

    #[tokio::test]
    async fn super_admin_cannot_demote_or_remove_self() {
        let store = Arc::new(MemoryStore::new());
        let roles = directory(&store);
        let root = account_with_role(&store, "root@venue.in", AdminRole::SuperAdmin).await;

        let err = roles.update(root.id, AdminRole::Admin1, root.id).await.unwrap_err();
        assert!(matches!(err, RoleError::SelfModification(_)));
        let err = roles.remove(root.id, root.id).await.unwrap_err();
        assert!(matches!(err, RoleError::SelfModification(_)));
        assert_eq!(roles.role_of(root.id).await.unwrap(), Some(AdminRole::SuperAdmin));
    }

    #[tokio::test]
    async fn revoked_super_admin_loses_access_despite_cache() {
        let store = Arc::new(MemoryStore::new());
        let roles = directory(&store);
        let root = account_with_role(&store, "root@venue.in", AdminRole::SuperAdmin).await;
        let other = account_with_role(&store, "other@venue.in", AdminRole::SuperAdmin).await;
        let target = account(&store, "t@venue.in").await;

        assert_eq!(roles.role_of(other.id).await.unwrap(), Some(AdminRole::SuperAdmin));
        roles.remove(other.id, root.id).await.unwrap();

        let err = roles
            .assign(target.id, AdminRole::Admin1, other.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn create_admin_validates_and_hashes() {
        let store = Arc::new(MemoryStore::new());
        let roles = directory(&store);
        let root = account_with_role(&store, "root@venue.in", AdminRole::SuperAdmin).await;

        let err = roles
            .create_admin(
                NewAdminAccount {
                    email: "  ".to_string(),
                    password: "longenough".to_string(),
                    full_name: "X".to_string(),
                    role: AdminRole::Admin1,
                },
                root.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::Validation(_)));

        let (user, row) = roles
            .create_admin(
                NewAdminAccount {
                    email: "Meera@Venue.in".to_string(),
                    password: "longenough".to_string(),
                    full_name: "Meera".to_string(),
                    role: AdminRole::Admin2,
                },
                root.id,
            )
            .await
            .unwrap();
        assert_eq!(user.email, "meera@venue.in");
        assert_eq!(row.role, AdminRole::Admin2);
        assert!(bcrypt::verify("longenough", &user.password_hash).unwrap());

        let err = roles
            .create_admin(
                NewAdminAccount {
                    email: "meera@venue.in".to_string(),
                    password: "longenough".to_string(),
                    full_name: "Meera".to_string(),
                    role: AdminRole::Admin1,
                },
                root.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::Conflict(_)));
    }

    #[tokio::test]
    async fn search_requires_super_admin_and_annotates_roles() {
        let store = Arc::new(MemoryStore::new());
        let roles = directory(&store);
        let root = account_with_role(&store, "root@venue.in", AdminRole::SuperAdmin).await;
        let plain = account(&store, "guest@mail.com").await;

        let err = roles.search_users(None, plain.id).await.unwrap_err();
        assert!(matches!(err, RoleError::PermissionDenied(_)));

        let found = roles.search_users(Some("ROOT"), root.id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, Some(AdminRole::SuperAdmin));
    }

    #[tokio::test]
    async fn bootstrap_runs_only_once() {
        let store = Arc::new(MemoryStore::new());
        let roles = directory(&store);

        let first = roles
            .bootstrap_super_admin("owner@venue.in", "changeme", "Owner")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(roles.role_of(first.id).await.unwrap(), Some(AdminRole::SuperAdmin));

        let second = roles
            .bootstrap_super_admin("other@venue.in", "changeme", "Other")
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(store.count_role(AdminRole::SuperAdmin).await.unwrap(), 1);
    }

    #[test]
    fn caller_role_helpers() {
        let customer = Caller::customer(Uuid::new_v4());
        assert!(!customer.is_admin());
        let reviewer = Caller {
            user_id: Uuid::new_v4(),
            role: Some(AdminRole::Admin1),
        };
        assert!(reviewer.has_role(&[AdminRole::Admin1, AdminRole::SuperAdmin]));
        assert!(!reviewer.has_role(&[AdminRole::Admin2]));
    }
}
