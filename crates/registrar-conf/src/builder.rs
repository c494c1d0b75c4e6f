//! Layered settings builder

use indexmap::IndexMap;
use serde_json::Value;

use crate::sources::{ConfigSource, DefaultSource, EnvSource, TomlFileSource};
use crate::{RegistrySettings, SettingsError, SettingsResult};

/// Merges configuration sources by priority and produces [`RegistrySettings`].
///
/// Sources with a higher priority override keys of lower ones; ties keep the
/// order in which sources were added.
///
/// # Examples
///
/// ```
/// use registrar_conf::{DefaultSource, SettingsBuilder};
///
/// let settings = SettingsBuilder::new()
///     .add_source(DefaultSource::new())
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.self_name, "Src");
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// The standard stack: defaults, an optional `registrar.toml` in the
	/// working directory, then `REGISTRAR_*` environment variables.
	pub fn standard() -> Self {
		Self::new()
			.add_source(DefaultSource::new())
			.add_source(TomlFileSource::optional("registrar.toml"))
			.add_source(EnvSource::new())
	}

	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Loads every source and returns the merged key/value map.
	pub fn merged(&self) -> SettingsResult<IndexMap<String, Value>> {
		let mut ordered: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
		ordered.sort_by_key(|source| source.priority());

		let mut merged = IndexMap::new();
		for source in ordered {
			let values = source.load().map_err(|error| SettingsError::Source {
				source_name: source.description(),
				error,
			})?;
			tracing::trace!(
				source = %source.description(),
				keys = values.len(),
				"merging settings source"
			);
			merged.extend(values);
		}
		Ok(merged)
	}

	/// Merges, deserializes and validates the settings.
	pub fn build(&self) -> SettingsResult<RegistrySettings> {
		let merged = self.merged()?;
		let object: serde_json::Map<String, Value> = merged.into_iter().collect();
		let settings: RegistrySettings = serde_json::from_value(Value::Object(object))?;
		settings.validate()?;
		tracing::debug!(
			self_name = %settings.self_name,
			max_resolution_depth = settings.max_resolution_depth,
			max_layer_depth = settings.max_layer_depth,
			dependency_recording = settings.dependency_recording.as_str(),
			"registry settings loaded"
		);
		Ok(settings)
	}
}
