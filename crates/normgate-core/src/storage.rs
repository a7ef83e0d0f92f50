//! On-disk storage layout.
//!
//! Resolves the four data directories once at startup and creates them, so
//! the rest of the system only deals in absolute paths. Uploaded originals
//! land under `<uploads>/<YYYY>/<MM>/<DD>/<user_id>/`, exports under
//! `<exports>/<user_id>/`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use normgate_error::ConfigError;

use crate::config::Settings;

/// Resolved storage roots, immutable after startup.
#[derive(Debug, Clone)]
pub struct Storage {
    data_root: PathBuf,
    uploads: PathBuf,
    exports: PathBuf,
    temp: PathBuf,
}

fn resolve(raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(path)
    }
}

fn ensure_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|e| ConfigError::Directory {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

impl Storage {
    /// Resolve and create the configured directories.
    pub fn init(settings: &Settings) -> Result<Self, ConfigError> {
        let storage = Self {
            data_root: resolve(&settings.data_root_dir),
            uploads: resolve(&settings.upload_files_dir),
            exports: resolve(&settings.export_files_dir),
            temp: resolve(&settings.temp_files_dir),
        };
        ensure_dir(&storage.data_root)?;
        ensure_dir(&storage.uploads)?;
        ensure_dir(&storage.exports)?;
        ensure_dir(&storage.temp)?;
        Ok(storage)
    }

    /// Data root directory.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Uploads root directory.
    pub fn uploads_root(&self) -> &Path {
        &self.uploads
    }

    /// Exports root directory.
    pub fn exports_root(&self) -> &Path {
        &self.exports
    }

    /// Temp directory.
    pub fn temp_dir(&self) -> &Path {
        &self.temp
    }

    /// Dated per-user upload directory, created on demand.
    pub fn upload_dir_for(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, ConfigError> {
        let dir = self
            .uploads
            .join(now.format("%Y").to_string())
            .join(now.format("%m").to_string())
            .join(now.format("%d").to_string())
            .join(user_id);
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Per-user export directory, created on demand.
    pub fn export_dir_for(&self, user_id: &str) -> Result<PathBuf, ConfigError> {
        let dir = self.exports.join(user_id);
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings_with_root(root: &Path) -> Settings {
        let mut settings = Settings::from_env().expect("settings");
        settings.data_root_dir = root.display().to_string();
        settings.upload_files_dir = root.join("uploads").display().to_string();
        settings.export_files_dir = root.join("exports").display().to_string();
        settings.temp_files_dir = root.join("temp").display().to_string();
        settings
    }

    #[test]
    fn test_init_creates_directories() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = Storage::init(&settings_with_root(tmp.path())).expect("storage");
        assert!(storage.uploads_root().is_dir());
        assert!(storage.exports_root().is_dir());
        assert!(storage.temp_dir().is_dir());
    }

    #[test]
    fn test_upload_dir_is_dated_and_per_user() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = Storage::init(&settings_with_root(tmp.path())).expect("storage");
        let when = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let dir = storage.upload_dir_for("user-1", when).expect("dir");
        assert!(dir.ends_with("2025/01/15/user-1"));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_export_dir_is_per_user() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = Storage::init(&settings_with_root(tmp.path())).expect("storage");
        let dir = storage.export_dir_for("user-9").expect("dir");
        assert!(dir.ends_with("user-9"));
        assert!(dir.is_dir());
    }
}
