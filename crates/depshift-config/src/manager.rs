use crate::types::Settings;
use depshift_fs::{FileSystem, NativeFileSystem};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Settings file looked up next to the project when no path is given
pub const CONFIG_FILE_NAME: &str = "depshift.toml";

/// Errors that can occur during config management
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnv(String, #[source] serde_json::Error),

    #[error("Config file not found at {0}")]
    ConfigNotFound(PathBuf),
}

/// Manager for depshift settings stored in a TOML file
pub struct ConfigManager<F: FileSystem = NativeFileSystem> {
    fs: Arc<F>,
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let fs = Arc::new(NativeFileSystem::new(config_dir)?);
        Self::load_with_filesystem(fs, path)
    }

    /// Load `depshift.toml` from `dir`, falling back to defaults when absent
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        let fs = Arc::new(NativeFileSystem::new(dir)?);
        let path = fs.project_root().join(CONFIG_FILE_NAME);
        if fs.exists(&path)? {
            Self::load_with_filesystem(fs, &path)
        } else {
            Ok(Self {
                fs,
                config_path: path,
                settings: Settings::default(),
            })
        }
    }
}

impl<F: FileSystem> ConfigManager<F> {
    /// Load settings with a custom FileSystem
    pub fn load_with_filesystem(fs: Arc<F>, path: &Path) -> Result<Self, ConfigError> {
        if !fs.exists(path)? {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let contents = fs.read_to_string(path)?;
        let settings: Settings = toml::from_str(&contents)?;

        Ok(Self {
            fs,
            config_path: path.to_path_buf(),
            settings,
        })
    }

    /// Save settings back to the file they were loaded from
    pub fn save(&self) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(&self.settings)?;
        self.fs.write(&self.config_path, &toml_str)?;
        Ok(())
    }

    /// Get reference to settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get mutable reference to settings (caller must call save())
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Consume the manager, keeping only the settings
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Path of the backing file
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depshift_fs::MemoryFileSystem;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_default_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::load_or_default(temp_dir.path()).unwrap();
        assert_eq!(manager.settings(), &Settings::default());
        assert!(manager.config_path().ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::load_or_default(temp_dir.path()).unwrap();
        manager.settings_mut().update_lower_bounds = true;
        manager.save().unwrap();

        let reloaded = ConfigManager::load_from(&temp_dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(reloaded.settings().update_lower_bounds);
    }

    #[test]
    fn test_load_missing_file() {
        let fs = Arc::new(MemoryFileSystem::new("/project").unwrap());
        let result = ConfigManager::load_with_filesystem(fs, Path::new("/project/depshift.toml"));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_from_memory() {
        let fs = Arc::new(
            MemoryFileSystem::new("/project")
                .unwrap()
                .with_file(
                    "depshift.toml",
                    "[registry]\ndefault_tag = \"stable\"\n\n[registry.tag_overrides]\nreact = \"next\"\n",
                )
                .unwrap(),
        );
        let manager =
            ConfigManager::load_with_filesystem(fs, Path::new("/project/depshift.toml")).unwrap();

        assert_eq!(manager.settings().registry.default_tag, "stable");
        assert_eq!(manager.settings().registry.tag_overrides["react"], "next");
    }
}
