//! Settings error types.

use crate::sources::SourceError;

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors raised while loading or validating registry settings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SettingsError {
	/// A configuration source failed to load.
	#[error("failed to load {source_name}: {error}")]
	Source {
		/// Description of the failing source.
		source_name: String,
		/// Underlying error.
		#[source]
		error: SourceError,
	},

	/// Merged values could not be deserialized into settings.
	#[error("malformed settings: {0}")]
	Json(#[from] serde_json::Error),

	/// A setting holds a value the registry cannot work with.
	#[error("invalid setting '{key}': {message}")]
	Invalid {
		/// Setting key.
		key: String,
		/// What is wrong with it.
		message: String,
	},
}

impl SettingsError {
	pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Invalid {
			key: key.into(),
			message: message.into(),
		}
	}
}
