//! Provider entries

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::DiResult;
use crate::name::QualifiedName;
use crate::registry::Registry;

/// Type-erased provider value.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Erased `(registry) -> value` constructor stored in an entry.
pub(crate) type ServiceFn = Arc<dyn Fn(&Registry) -> DiResult<Instance> + Send + Sync>;

/// Lifecycle of one provider as seen from a single registry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderState {
	/// Nothing is registered under the name.
	Unregistered,
	/// Registered, never resolved or invalidated since.
	Uninitialized,
	/// Its factory is running on the current call stack.
	InConstruction,
	/// Resolved; the instance is cached.
	Memoized,
}

impl ProviderState {
	pub fn as_str(&self) -> &'static str {
		match self {
			ProviderState::Unregistered => "unregistered",
			ProviderState::Uninitialized => "uninitialized",
			ProviderState::InConstruction => "in-construction",
			ProviderState::Memoized => "memoized",
		}
	}
}

/// Definition plus memoization state of one provider.
///
/// Entries are immutable once placed in a frozen layer; updates replace the
/// whole entry in the owning registry's overlay.
#[derive(Clone)]
pub(crate) struct ProviderEntry {
	pub(crate) factory: ServiceFn,
	pub(crate) instance: Option<Instance>,
	pub(crate) dependencies: Vec<QualifiedName>,
	pub(crate) reverse_dependencies: Vec<QualifiedName>,
}

impl ProviderEntry {
	pub(crate) fn new(factory: ServiceFn) -> Self {
		Self {
			factory,
			instance: None,
			dependencies: Vec::new(),
			reverse_dependencies: Vec::new(),
		}
	}

	/// Same factory, no cached instance, no recorded edges.
	pub(crate) fn reset(&self) -> Self {
		Self::new(self.factory.clone())
	}

	pub(crate) fn is_memoized(&self) -> bool {
		self.instance.is_some()
	}
}

impl fmt::Debug for ProviderEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderEntry")
			.field("memoized", &self.is_memoized())
			.field("dependencies", &self.dependencies)
			.field("reverse_dependencies", &self.reverse_dependencies)
			.finish_non_exhaustive()
	}
}
