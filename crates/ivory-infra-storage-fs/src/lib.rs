use ivory_ports::storage::{SettingsDto, StorageError, StoragePort};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "Ivory";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// JSON settings kept under the user's config directory.
pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join(APP_DIR_NAME))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE_NAME)
    }

    /// Loads settings, writing the defaults out first if no file exists yet so
    /// there is something on disk to edit.
    pub fn load_or_init_settings(&self) -> Result<SettingsDto, StorageError> {
        let path = self.settings_path();
        if path.exists() {
            return Self::read_settings(&path);
        }
        let settings = SettingsDto::default();
        self.save_settings(&settings)?;
        tracing::info!(path = %path.display(), "wrote default settings");
        Ok(settings)
    }

    fn read_settings(path: &Path) -> Result<SettingsDto, StorageError> {
        let text = fs::read_to_string(path).map_err(|e| StorageError::Io(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| StorageError::Serde(e.to_string()))
    }

    /// Stages the JSON beside the target, then renames it into place.
    fn write_settings(path: &Path, settings: &SettingsDto) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| StorageError::Serde(e.to_string()))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&staging, path).map_err(|e| StorageError::Io(e.to_string()))
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to working directory for settings");
            PathBuf::from(".")
        });
        Self { base_dir }
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(SettingsDto::default());
        }
        Self::read_settings(&path)
    }

    fn save_settings(&self, settings: &SettingsDto) -> Result<(), StorageError> {
        Self::write_settings(&self.settings_path(), settings)
    }
}
