//! SurrealDB Handle - Connection and Store Construction
//!
//! Manages the store connection and hands out the store-access
//! implementations that share it. Supports in-memory (`mem://`), local
//! (`surrealkv://`) and remote (`ws://`, `wss://`) endpoints.

use std::path::Path;

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::surreal_annotations::SurrealAnnotationStore;
use crate::surreal_releases::SurrealReleaseStore;
use crate::Result;

pub const DEFAULT_NAMESPACE: &str = "release_tracker";
pub const DEFAULT_DATABASE: &str = "main";
const IN_MEMORY_ENDPOINT: &str = "mem://";

/// Credentials for a remote store.
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    pub username: String,
    pub password: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

/// Configuration for the store connection
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint URL (e.g., "mem://", "surrealkv://data/db", "wss://db.example.com")
    pub endpoint: String,
    /// Namespace (default: "release_tracker")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Sign-in credentials, if the endpoint requires them
    pub credentials: Option<StoreCredentials>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreConfig {
    /// Configuration for a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_ENDPOINT)
    }

    /// Create a configuration for the given endpoint without credentials
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            credentials: None,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Sign in with the given credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        is_root: bool,
    ) -> Self {
        self.credentials = Some(StoreCredentials {
            username: username.into(),
            password: password.into(),
            is_root,
        });
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - RELEASE_TRACKER_DB_URL (optional, default: in-memory)
    /// - RELEASE_TRACKER_DB_NAMESPACE (optional, default: "release_tracker")
    /// - RELEASE_TRACKER_DB_DATABASE (optional, default: "main")
    /// - RELEASE_TRACKER_DB_USERNAME (optional)
    /// - RELEASE_TRACKER_DB_PASSWORD or RELEASE_TRACKER_DB_PASSWORD_FILE
    ///   (required when a username is set)
    /// - RELEASE_TRACKER_DB_ROOT (optional, default: "false")
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint =
            lookup("RELEASE_TRACKER_DB_URL").unwrap_or_else(|| IN_MEMORY_ENDPOINT.to_string());
        let mut config = Self::new(endpoint);

        if let Some(ns) = lookup("RELEASE_TRACKER_DB_NAMESPACE") {
            config = config.with_namespace(ns);
        }
        if let Some(db) = lookup("RELEASE_TRACKER_DB_DATABASE") {
            config = config.with_database(db);
        }

        if let Some(username) = lookup("RELEASE_TRACKER_DB_USERNAME") {
            let password = match lookup("RELEASE_TRACKER_DB_PASSWORD") {
                Some(password) => password,
                None => {
                    let path = lookup("RELEASE_TRACKER_DB_PASSWORD_FILE").ok_or_else(|| {
                        StateError::Config(
                            "RELEASE_TRACKER_DB_PASSWORD or RELEASE_TRACKER_DB_PASSWORD_FILE not set"
                                .to_string(),
                        )
                    })?;
                    read_secret(Path::new(&path))?
                }
            };
            let is_root = lookup("RELEASE_TRACKER_DB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            config = config.with_credentials(username, password, is_root);
        }

        Ok(config)
    }

    pub fn is_in_memory(&self) -> bool {
        self.endpoint.starts_with(IN_MEMORY_ENDPOINT)
    }
}

/// Read a secret from a file (e.g. a mounted `/run/secrets/...`), trimming
/// the trailing newline.
fn read_secret(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        StateError::Config(format!("cannot read secret {}: {}", path.display(), e))
    })?;
    Ok(raw.trim_end().to_string())
}

/// SurrealDB connection handle for the release tracker
#[derive(Clone)]
pub struct StoreHandle {
    db: Surreal<Any>,
}

impl StoreHandle {
    /// Connect to a fresh in-memory store and set up the schema
    #[instrument(skip_all)]
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&StoreConfig::in_memory()).await
    }

    /// Connect with the given configuration and set up the schema
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        info!("Connecting to release store");

        let db = surrealdb::engine::any::connect(config.endpoint.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if let Some(credentials) = &config.credentials {
            if credentials.is_root {
                db.signin(Root {
                    username: &credentials.username,
                    password: &credentials.password,
                })
                .await
                .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &credentials.username,
                    password: &credentials.password,
                })
                .await
                .map_err(|e| {
                    StateError::Connection(format!("Database authentication failed: {}", e))
                })?;
            }
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        migrations::init_schema(&db).await?;

        info!("Release store connected and schema initialized");
        Ok(Self { db })
    }

    /// Connect using environment variables (see [`StoreConfig::from_env`])
    pub async fn from_env() -> Result<Self> {
        let config = StoreConfig::from_env()?;
        Self::connect(&config).await
    }

    /// Release store access over this connection
    pub fn release_store(&self) -> SurrealReleaseStore {
        SurrealReleaseStore::new(self.db.clone())
    }

    /// Annotation store access over this connection
    pub fn annotation_store(&self) -> SurrealAnnotationStore {
        SurrealAnnotationStore::new(self.db.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_means_in_memory() {
        let config = StoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.is_in_memory());
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn credentials_require_a_password() {
        let err = StoreConfig::from_lookup(lookup_from(&[
            ("RELEASE_TRACKER_DB_URL", "ws://db:8000"),
            ("RELEASE_TRACKER_DB_USERNAME", "tracker"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StateError::Config(_)));
    }

    #[test]
    fn password_is_read_from_secret_file() {
        let dir = std::env::temp_dir().join(format!("release-state-secret-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let secret = dir.join("db_password");
        std::fs::write(&secret, "s3cret\n").unwrap();

        let secret_path = secret.to_string_lossy().to_string();
        let config = StoreConfig::from_lookup(lookup_from(&[
            ("RELEASE_TRACKER_DB_URL", "ws://db:8000"),
            ("RELEASE_TRACKER_DB_USERNAME", "tracker"),
            ("RELEASE_TRACKER_DB_PASSWORD_FILE", secret_path.as_str()),
            ("RELEASE_TRACKER_DB_ROOT", "TRUE"),
        ]))
        .unwrap();

        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.username, "tracker");
        assert_eq!(credentials.password, "s3cret");
        assert!(credentials.is_root);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn in_memory_connection_initializes_schema() {
        let handle = StoreHandle::in_memory().await;
        assert!(handle.is_ok(), "Failed to connect: {:?}", handle.err());
    }
}
