//! Configuration sources for layered registry settings
//!
//! Sources are merged in priority order (environment variables > TOML file >
//! defaults). Each source yields a flat key/value map; keys are lowercase
//! setting names.

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::RegistrySettings;

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Invalid source: {0}")]
	InvalidSource(String),
}

/// Source that yields the built-in defaults of [`RegistrySettings`].
#[derive(Debug, Default)]
pub struct DefaultSource;

impl DefaultSource {
	pub fn new() -> Self {
		Self
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		match serde_json::to_value(RegistrySettings::default())? {
			Value::Object(map) => Ok(map.into_iter().collect()),
			other => Err(SourceError::InvalidSource(format!(
				"defaults serialized to a non-object value: {other}"
			))),
		}
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"built-in defaults".to_string()
	}
}

/// TOML file configuration source
///
/// Reads a flat table of settings, e.g.
///
/// ```toml
/// self_name = "Src"
/// max_resolution_depth = 64
/// dependency_recording = "every-resolution"
/// ```
pub struct TomlFileSource {
	path: PathBuf,
	required: bool,
}

impl TomlFileSource {
	/// Create a source for a file that must exist.
	///
	/// # Examples
	///
	/// ```
	/// use registrar_conf::TomlFileSource;
	///
	/// let source = TomlFileSource::new("registrar.toml");
	/// ```
	pub fn new(path: impl AsRef<Path>) -> Self {
		Self {
			path: path.as_ref().to_path_buf(),
			required: true,
		}
	}

	/// Create a source that yields nothing when the file is missing.
	pub fn optional(path: impl AsRef<Path>) -> Self {
		Self {
			path: path.as_ref().to_path_buf(),
			required: false,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			if self.required {
				return Err(SourceError::InvalidSource(format!(
					"settings file not found: {}",
					self.path.display()
				)));
			}
			tracing::debug!(path = %self.path.display(), "optional settings file not found");
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let table: toml::Table = toml::from_str(&content)?;
		let mut config = IndexMap::new();
		for (key, value) in table {
			config.insert(key.to_lowercase(), serde_json::to_value(value)?);
		}
		Ok(config)
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Environment variable configuration source
///
/// Values that look like numbers or booleans become JSON scalars, except for
/// keys declared as strings, which are always kept verbatim.
pub struct EnvSource {
	prefix: String,
	string_keys: Vec<String>,
}

impl EnvSource {
	/// Prefix used when none is given.
	pub const DEFAULT_PREFIX: &'static str = "REGISTRAR_";

	/// Settings keys whose values are strings.
	pub const STRING_KEYS: &'static [&'static str] = &["self_name", "dependency_recording"];

	/// Create a source reading `REGISTRAR_*` variables
	///
	/// # Examples
	///
	/// ```
	/// use registrar_conf::EnvSource;
	///
	/// let source = EnvSource::new();
	/// // Reads REGISTRAR_SELF_NAME, REGISTRAR_MAX_RESOLUTION_DEPTH, ...
	/// ```
	pub fn new() -> Self {
		Self {
			prefix: Self::DEFAULT_PREFIX.to_string(),
			string_keys: Self::STRING_KEYS.iter().map(|key| key.to_string()).collect(),
		}
	}

	/// Set the prefix filter for environment variables
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	/// Keep the (lowercased, prefix-stripped) `key` as a string.
	pub fn with_string_key(mut self, key: impl Into<String>) -> Self {
		self.string_keys.push(key.into());
		self
	}

	fn parse_value(&self, key: &str, raw: &str) -> Value {
		if self.string_keys.iter().any(|string_key| string_key == key) {
			Value::String(raw.to_string())
		} else {
			parse_env_value(raw)
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			if clean_key.is_empty() {
				continue;
			}
			let key = clean_key.to_lowercase();
			let value = self.parse_value(&key, &value);
			config.insert(key, value);
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		format!("environment variables with prefix {}", self.prefix)
	}
}

/// Numbers and booleans become JSON scalars; everything else stays a string.
fn parse_env_value(raw: &str) -> Value {
	let trimmed = raw.trim();
	match serde_json::from_str::<Value>(trimmed) {
		Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
		_ => Value::String(raw.to_string()),
	}
}
