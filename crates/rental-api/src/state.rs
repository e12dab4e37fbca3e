//! # Application State
//!
//! Shared state for the Axum application: the customer's cart store, the
//! checkout in progress, the rental backend and the service configuration.

use rental_client::HttpRentalBackend;
use rental_core::{
    session, BoxedRentalBackend, CartStore, CheckoutSequencer, FileStorage, MemoryStorage,
    SharedStorage,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Service configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Directory for persisted client state; in-memory when unset
    pub storage_dir: Option<PathBuf>,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "development".to_string(),
            storage_dir: None,
        }
    }
}

impl StorefrontConfig {
    /// Load `config/storefront.toml` (if present), then apply env overrides
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config_paths = [
            "config/storefront.toml",
            "../config/storefront.toml",
            "../../config/storefront.toml",
        ];

        let mut config = Self::default();
        for path in config_paths {
            if let Ok(content) = std::fs::read_to_string(path) {
                config = Self::from_toml_str(&content)
                    .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
                info!("Loaded storefront config from {}", path);
                break;
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Override fields from `HOST`, `PORT`, `ENVIRONMENT`, `RENTAL_STORAGE_DIR`
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a port number, got {:?}", port))?;
        }
        if let Some(environment) = lookup("ENVIRONMENT") {
            self.environment = environment;
        }
        if let Some(dir) = lookup("RENTAL_STORAGE_DIR") {
            self.storage_dir = if dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        Ok(self)
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// The customer's cart and checkout. One per process, guarded by a mutex so
/// every operation runs to completion before the next starts.
pub struct Storefront {
    pub cart: CartStore<SharedStorage>,
    pub checkout: Option<CheckoutSequencer>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cart store and checkout in progress
    pub storefront: Arc<Mutex<Storefront>>,
    /// Rental backend
    pub backend: BoxedRentalBackend,
    /// Client storage (cart, pending checkout, session)
    pub storage: SharedStorage,
    /// Application config
    pub config: StorefrontConfig,
}

impl AppState {
    /// Create the state from config files and environment
    pub fn new() -> anyhow::Result<Self> {
        let config = StorefrontConfig::load()?;

        let storage: SharedStorage = match &config.storage_dir {
            Some(dir) => {
                let storage = FileStorage::open(dir)
                    .map_err(|e| anyhow::anyhow!("Failed to open storage: {}", e))?;
                info!("Persisting client state in {}", dir.display());
                Arc::new(storage)
            }
            None => {
                warn!("No storage directory configured, client state is in-memory only");
                Arc::new(MemoryStorage::new())
            }
        };

        let backend = HttpRentalBackend::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize rental backend: {}", e))?;
        info!("Rental API: {}", backend.config().api_base_url);

        Ok(Self::with_parts(config, storage, Arc::new(backend)))
    }

    /// Assemble state from explicit parts, restoring the stored cart and
    /// session.
    pub fn with_parts(
        config: StorefrontConfig,
        storage: SharedStorage,
        backend: BoxedRentalBackend,
    ) -> Self {
        let cart = CartStore::open(Arc::clone(&storage));

        match session::load_session(&storage) {
            Ok(Some(stored)) => {
                let who = stored
                    .user
                    .as_ref()
                    .map(|u| u.full_name())
                    .unwrap_or_else(|| "unknown user".to_string());
                info!("Restored session for {}", who);
                backend.set_access_token(Some(stored.access_token));
            }
            Ok(None) => {}
            Err(e) => warn!("Cannot read stored session: {}", e),
        }

        Self {
            storefront: Arc::new(Mutex::new(Storefront {
                cart,
                checkout: None,
            })),
            backend,
            storage,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = StorefrontConfig::from_toml_str("").unwrap();
        assert_eq!(config, StorefrontConfig::default());
        assert_eq!(config.port, 8080);
        assert!(!config.is_production());
    }

    #[test]
    fn test_config_file_and_overrides() {
        let config = StorefrontConfig::from_toml_str(
            r#"
                host = "0.0.0.0"
                port = 3000
                storage_dir = "var/storefront"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage_dir, Some(PathBuf::from("var/storefront")));

        let env: HashMap<&str, &str> =
            HashMap::from([("PORT", "9090"), ("ENVIRONMENT", "production")]);
        let config = config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9090");
        assert!(config.is_production());
    }

    #[test]
    fn test_bad_port_override() {
        let result = StorefrontConfig::default()
            .apply_overrides(|key| (key == "PORT").then(|| "eighty".to_string()));
        assert!(result.is_err());
    }
}
