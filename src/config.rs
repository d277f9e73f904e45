use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Name of the single conversation database.
pub const DATABASE_NAME: &str = "portkeyDB";
/// The only schema version this build understands.
pub const SCHEMA_VERSION: i64 = 1;
/// File name offered for exports.
pub const DEFAULT_EXPORT_FILE: &str = "portkey-conversations.json";

const DB_PATH_ENV: &str = "PORTKEY_DB_PATH";
const APP_DIR: &str = "portkey";

// --- Store Location ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

impl StoreConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    /// Resolves where the database lives: an explicit path wins, then the
    /// `PORTKEY_DB_PATH` environment variable, then the per-user data directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        Self::resolve_with(explicit, std::env::var(DB_PATH_ENV).ok())
    }

    fn resolve_with(explicit: Option<PathBuf>, env_path: Option<String>) -> Result<Self> {
        if let Some(path) = explicit {
            log::debug!("Using database path from command line: {}", path.display());
            return Ok(Self::new(path));
        }
        if let Some(path) = env_path.filter(|p| !p.is_empty()) {
            log::debug!("Using database path from environment variable {}: {}", DB_PATH_ENV, path);
            return Ok(Self::new(path));
        }
        let data_dir = dirs::data_local_dir().context(format!(
            "Failed to locate a local data directory; set {} instead",
            DB_PATH_ENV
        ))?;
        Ok(Self::in_dir(data_dir.join(APP_DIR)))
    }

    /// Config for the default database file inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{}.sqlite", DATABASE_NAME)))
    }
}
