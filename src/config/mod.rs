mod file_config;

pub use file_config::{FileConfig, MigrationsConfig};

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
    pub busy_timeout_ms: Option<u64>,
    pub auto_migrate: bool,
    pub no_backup: bool,
}

/// Everything needed to open a [`crate::Library`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub db_path: PathBuf,
    /// Track paths under this directory are stored relative to it.
    pub media_root: PathBuf,
    pub busy_timeout_ms: u64,
    pub auto_migrate: bool,
    pub backup_before_migrate: bool,
}

fn parent_dir(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl LibraryConfig {
    /// Defaults for a database at `db_path`, media resolved next to it.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        let db_path = db_path.as_ref().to_path_buf();
        LibraryConfig {
            media_root: parent_dir(&db_path),
            db_path,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            auto_migrate: false,
            backup_before_migrate: true,
        }
    }

    pub fn with_media_root<P: AsRef<Path>>(mut self, media_root: P) -> Self {
        self.media_root = media_root.as_ref().to_path_buf();
        self
    }

    pub fn with_auto_migrate(mut self, auto_migrate: bool) -> Self {
        self.auto_migrate = auto_migrate;
        self
    }

    pub fn with_backup_before_migrate(mut self, backup: bool) -> Self {
        self.backup_before_migrate = backup;
        self
    }

    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "db_path must be given as the first argument or in the config file"
                )
            })?;

        let db_dir = parent_dir(&db_path);
        if !db_dir.is_dir() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let media_root = file
            .media_root
            .map(PathBuf::from)
            .or_else(|| cli.media_root.clone())
            .unwrap_or(db_dir);

        let busy_timeout_ms = file
            .busy_timeout_ms
            .or(cli.busy_timeout_ms)
            .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

        let migrations = file.migrations.unwrap_or_default();
        let auto_migrate = migrations.auto_migrate.unwrap_or(cli.auto_migrate);
        let backup_before_migrate = migrations
            .backup_before_migrate
            .unwrap_or(!cli.no_backup);

        Ok(Self {
            db_path,
            media_root,
            busy_timeout_ms,
            auto_migrate,
            backup_before_migrate,
        })
    }
}
