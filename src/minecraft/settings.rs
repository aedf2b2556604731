use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::minecraft::archive::ArchiveEncoding;
use crate::minecraft::error::InstallError;

/// Get the installer data directory
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "windows") {
        base.join("MmcPackInstaller")
    } else if cfg!(target_os = "macos") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
            .join("MmcPackInstaller")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mmc-pack-installer")
    }
}

// ----------
// InstallerSettings
// Description: Settings for modpack imports, persisted to settings.json
// ----------
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InstallerSettings {
    /// Root of the game repository; the data directory when unset.
    pub game_directory: Option<String>,
    /// Encoding used for entry names of imported archives.
    #[serde(default)]
    pub archive_encoding: ArchiveEncoding,
    #[serde(default)]
    pub verbose_logging: bool,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        InstallerSettings {
            game_directory: None,
            archive_encoding: ArchiveEncoding::Auto,
            verbose_logging: false,
        }
    }
}

impl InstallerSettings {
    pub fn game_directory(&self, data_dir: &Path) -> PathBuf {
        match &self.game_directory {
            Some(path) => PathBuf::from(path),
            None => data_dir.to_path_buf(),
        }
    }
}

fn get_settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

/// Loads settings, falling back to defaults when the file is missing or unreadable.
pub fn load_settings(data_dir: &Path) -> InstallerSettings {
    let path = get_settings_path(data_dir);

    if path.exists() {
        if let Ok(content) = fs::read_to_string(&path) {
            match serde_json::from_str(&content) {
                Ok(settings) => return settings,
                Err(e) => log::warn!("Ignoring unreadable {}: {}", path.display(), e),
            }
        }
    }

    InstallerSettings::default()
}

pub fn save_settings(data_dir: &Path, settings: &InstallerSettings) -> Result<(), InstallError> {
    let path = get_settings_path(data_dir);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(settings)?;
    fs::write(&path, content)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings(dir.path()), InstallerSettings::default());
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
        assert_eq!(load_settings(dir.path()), InstallerSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let settings = InstallerSettings {
            game_directory: Some("/games/mc".to_string()),
            archive_encoding: ArchiveEncoding::Label("gbk".to_string()),
            verbose_logging: true,
        };
        save_settings(dir.path(), &settings).unwrap();

        let loaded = load_settings(dir.path());
        assert_eq!(loaded, settings);
        assert_eq!(loaded.game_directory(dir.path()), PathBuf::from("/games/mc"));
    }
}
