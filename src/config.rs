use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow!("unknown STORAGE_BACKEND '{}'", other)),
        }
    }
}

/// Super admin created at start-up when none exists yet.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Required unless the memory backend is selected
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub storage_backend: StorageBackend,
    pub document_storage_path: PathBuf,
    pub token_ttl_secs: u64,
    /// Accept the client's payment confirmation without a provider receipt
    pub trust_client_payments: bool,
    pub run_migrations: bool,
    pub log_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    /// ✅ Load `.env` and read the environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Postgres,
        };

        let database_url = var("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND is postgres");
        }

        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let token_ttl_secs = match var("TOKEN_TTL_SECS") {
            Some(v) => v.parse().context("TOKEN_TTL_SECS must be a number of seconds")?,
            None => 36_000,
        };

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(v) => v.parse().context("MAX_UPLOAD_BYTES must be a number of bytes")?,
            None => 10 * 1024 * 1024,
        };

        let bcrypt_cost = match var("BCRYPT_COST") {
            Some(v) => v.parse().context("BCRYPT_COST must be a number between 4 and 31")?,
            None => bcrypt::DEFAULT_COST,
        };
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }

        let bootstrap_admin = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                full_name: var("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Super Admin".to_string()),
            }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            storage_backend,
            document_storage_path: PathBuf::from(
                var("DOCUMENT_STORAGE_PATH").unwrap_or_else(|| "./storage/documents".to_string()),
            ),
            token_ttl_secs,
            trust_client_payments: flag(var("TRUST_CLIENT_PAYMENTS"), true)?,
            run_migrations: flag(var("RUN_MIGRATIONS"), false)?,
            log_dir: PathBuf::from(var("LOG_DIR").unwrap_or_else(|| "logs".to_string())),
            max_upload_bytes,
            bcrypt_cost,
            bootstrap_admin,
        })
    }
}

fn flag(value: Option<String>, default: bool) -> anyhow::Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(false),
        Some(v) => Err(anyhow!("'{}' is not a boolean", v)),
    }
}

#[cfg(test)]
impl Config {
    /// In-memory configuration for tests.
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            storage_backend: StorageBackend::Memory,
            document_storage_path: env::temp_dir().join(format!("venue-docs-{}", uuid::Uuid::new_v4())),
            token_ttl_secs: 3600,
            trust_client_payments: true,
            run_migrations: false,
            log_dir: PathBuf::from("logs"),
            max_upload_bytes: 1024 * 1024,
            bcrypt_cost: 4,
            bootstrap_admin: None,
        }
    }
}
