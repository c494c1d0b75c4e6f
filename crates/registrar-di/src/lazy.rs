//! Lazy service handles

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::entry::Instance;
use crate::error::{DiError, DiResult};
use crate::name::QualifiedName;
use crate::registry::WeakRegistry;

/// Deferred access to a service.
///
/// Created by [`Registry::lazy`](crate::Registry::lazy). The dependency is
/// recorded when the handle is created, so providers that only hold a handle
/// to each other can be constructed without forming a cycle. Each call to
/// [`Lazy::get`] goes through the registry again and therefore returns the
/// memoized instance once one exists.
///
/// The handle refers weakly to the registry that created it. A provider whose
/// construction created handles is never shared with derived registries; each
/// derived registry rebuilds it around handles of its own.
#[derive(Clone)]
pub struct Lazy {
	registry: WeakRegistry,
	name: String,
}

impl Lazy {
	pub(crate) fn new(registry: WeakRegistry, name: String) -> Self {
		Self { registry, name }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn qualified_name(&self) -> QualifiedName {
		QualifiedName::service(self.name.clone())
	}

	/// Resolves the service and downcasts it to `T`.
	pub fn get<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
		self.upgrade()?.service::<T>(&self.name)
	}

	/// Resolves the service without downcasting.
	pub fn get_instance(&self) -> DiResult<Instance> {
		self.upgrade()?.service_instance(&self.name)
	}

	fn upgrade(&self) -> DiResult<crate::Registry> {
		self.registry
			.upgrade()
			.ok_or_else(|| DiError::RegistryDropped(self.qualified_name().to_string()))
	}
}

impl fmt::Debug for Lazy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Lazy").field("name", &self.name).finish_non_exhaustive()
	}
}
