//! Registry settings

use serde::{Deserialize, Serialize};

use crate::SettingsError;

/// Name under which a registry resolves to itself unless configured otherwise.
pub const DEFAULT_SELF_NAME: &str = "Src";

/// Default limit on nested provider constructions.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 100;

/// Default number of frozen store layers kept before a registry compacts them.
pub const DEFAULT_MAX_LAYER_DEPTH: usize = 32;

/// How a recording session treats a name it has already recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingPolicy {
	/// Each name is recorded once per session, in first-seen order.
	#[default]
	Deduplicate,
	/// Every resolution appends the name, duplicates included.
	EveryResolution,
}

impl RecordingPolicy {
	/// Returns the configuration spelling of this policy.
	pub fn as_str(&self) -> &'static str {
		match self {
			RecordingPolicy::Deduplicate => "deduplicate",
			RecordingPolicy::EveryResolution => "every-resolution",
		}
	}
}

/// Settings a registry is created with.
///
/// Every descendant produced by registration inherits the settings of the
/// registry it was derived from.
///
/// # Examples
///
/// ```
/// use registrar_conf::{RecordingPolicy, RegistrySettings};
///
/// let settings = RegistrySettings::default()
///     .with_self_name("Container")
///     .with_recording_policy(RecordingPolicy::EveryResolution);
///
/// assert_eq!(settings.self_name, "Container");
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
	/// Reserved service name that resolves to the registry itself.
	pub self_name: String,
	/// Maximum number of provider constructions nested inside one another.
	pub max_resolution_depth: usize,
	/// Frozen layer count after which a derived registry flattens its store.
	pub max_layer_depth: usize,
	/// Duplicate handling for recorded dependencies.
	pub dependency_recording: RecordingPolicy,
}

impl Default for RegistrySettings {
	fn default() -> Self {
		Self {
			self_name: DEFAULT_SELF_NAME.to_string(),
			max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
			max_layer_depth: DEFAULT_MAX_LAYER_DEPTH,
			dependency_recording: RecordingPolicy::default(),
		}
	}
}

impl RegistrySettings {
	pub fn with_self_name(mut self, name: impl Into<String>) -> Self {
		self.self_name = name.into();
		self
	}

	pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
		self.max_resolution_depth = depth;
		self
	}

	pub fn with_max_layer_depth(mut self, depth: usize) -> Self {
		self.max_layer_depth = depth;
		self
	}

	pub fn with_recording_policy(mut self, policy: RecordingPolicy) -> Self {
		self.dependency_recording = policy;
		self
	}

	/// Checks the settings for values a registry cannot work with.
	///
	/// The self-name must be non-empty and must not contain the `::`
	/// namespace separator. Both depth limits must be positive.
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.self_name.trim().is_empty() {
			return Err(SettingsError::invalid("self_name", "must not be empty"));
		}
		if self.self_name.contains("::") {
			return Err(SettingsError::invalid(
				"self_name",
				format!("'{}' must not contain '::'", self.self_name),
			));
		}
		if self.max_resolution_depth == 0 {
			return Err(SettingsError::invalid(
				"max_resolution_depth",
				"must be greater than zero",
			));
		}
		if self.max_layer_depth == 0 {
			return Err(SettingsError::invalid(
				"max_layer_depth",
				"must be greater than zero",
			));
		}
		Ok(())
	}
}
