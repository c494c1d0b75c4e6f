//! # Registrar Settings
//!
//! Layered configuration for the Registrar service registry.
//!
//! Settings are read from prioritized sources and merged before being
//! deserialized into [`RegistrySettings`]:
//!
//! 1. [`DefaultSource`] - built-in defaults (priority 0)
//! 2. [`TomlFileSource`] - a flat TOML table (priority 50)
//! 3. [`EnvSource`] - `REGISTRAR_*` environment variables (priority 100)
//!
//! ```no_run
//! use registrar_conf::SettingsBuilder;
//!
//! let settings = SettingsBuilder::standard().build()?;
//! println!("self name: {}", settings.self_name);
//! # Ok::<(), registrar_conf::SettingsError>(())
//! ```

pub mod builder;
pub mod error;
pub mod settings;
pub mod sources;

pub use builder::SettingsBuilder;
pub use error::{SettingsError, SettingsResult};
pub use settings::{
	DEFAULT_MAX_LAYER_DEPTH, DEFAULT_MAX_RESOLUTION_DEPTH, DEFAULT_SELF_NAME, RecordingPolicy,
	RegistrySettings,
};
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
