//! Registry error types.

use crate::token::RecordToken;

/// Result type for registry operations.
pub type DiResult<T> = Result<T, DiError>;

/// Errors raised by registration, resolution and dependency recording.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DiError {
	/// No provider is registered under the qualified name.
	#[error("unknown service: {0}")]
	UnknownService(String),

	/// No factory is registered under the name and no default factory is set.
	#[error("unknown class: {0} (no factory registered and no default factory configured)")]
	UnknownClass(String),

	/// A provider transitively requested itself while being constructed.
	#[error(
		"unresolvable dependency: {name}\n  Path: {path}\nThis forms a cycle that cannot be resolved."
	)]
	UnresolvableDependency {
		/// Qualified name requested a second time
		name: String,
		/// Construction path (format: A -> B -> A)
		path: String,
	},

	/// Constructions nested deeper than the configured limit.
	#[error(
		"Maximum resolution depth exceeded: {0}\nThis likely indicates an extremely deep dependency chain."
	)]
	MaxDepthExceeded(usize),

	/// The caller passed an argument the registry refuses, such as the
	/// reserved self-name.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// A recording token is unknown, already stopped, or not in the state the
	/// operation requires.
	#[error("invalid record token {token}: {reason}")]
	InvalidRecordToken {
		token: RecordToken,
		reason: &'static str,
	},

	/// Registration of a name that is in construction on the same registry.
	#[error("cannot register {0} while it is being constructed")]
	ReentrantRegistration(String),

	/// The provider value is not of the requested type.
	#[error("{name} does not hold a value of type {expected}")]
	TypeMismatch {
		name: String,
		expected: &'static str,
	},

	/// A factory asked for a positional argument that was not supplied.
	#[error("missing argument at position {index} (got {len} arguments)")]
	MissingArgument { index: usize, len: usize },

	/// A lazy handle or factory outlived the registry it was created from.
	#[error("registry dropped before {0} was used")]
	RegistryDropped(String),

	/// A user-supplied factory failed.
	#[error("factory error: {0}")]
	Factory(String),
}

impl DiError {
	/// Convenience constructor for failures raised inside user factories.
	///
	/// # Examples
	///
	/// ```
	/// use registrar_di::DiError;
	///
	/// let err = DiError::factory("connection refused");
	/// assert_eq!(err.to_string(), "factory error: connection refused");
	/// ```
	pub fn factory(message: impl Into<String>) -> Self {
		Self::Factory(message.into())
	}

	pub(crate) fn invalid_token(token: RecordToken, reason: &'static str) -> Self {
		Self::InvalidRecordToken { token, reason }
	}
}
