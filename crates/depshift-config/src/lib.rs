//! Settings for depshift.
//!
//! Settings come from three layers, later layers winning:
//! built-in defaults, an optional `depshift.toml`, and environment variables.

pub mod env;
pub mod manager;
pub mod types;

pub use manager::{ConfigError, ConfigManager, CONFIG_FILE_NAME};
pub use types::{ManifestSettings, NodeEnv, RegistrySettings, Settings};
