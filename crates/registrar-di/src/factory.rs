//! Factories: services whose value produces fresh instances
//!
//! A factory registered under `name` is stored as the service
//! `factory::name`. Resolving that service (memoized like any other) yields
//! the maker, which does not refer to any registry. [`Registry::factory`]
//! binds it to the registry it was called on and returns a [`Factory`];
//! every [`Factory::create`] call runs the maker again and returns a new
//! instance.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::entry::Instance;
use crate::error::{DiError, DiResult};
use crate::registry::{Registry, WeakRegistry};

/// Erased `(registry, args) -> value` maker of a registered factory.
pub(crate) type MakerFn = Arc<dyn Fn(&Registry, &Args) -> DiResult<Instance> + Send + Sync>;

/// Memoized value of a `factory::name` service.
#[derive(Clone)]
pub(crate) struct RegisteredMaker(pub(crate) MakerFn);

/// Registry-wide fallback `(registry, name, args) -> value`.
pub type DefaultFactoryFn =
	Arc<dyn Fn(&Registry, &str, &Args) -> DiResult<Instance> + Send + Sync>;

/// Positional, type-erased factory arguments.
///
/// # Examples
///
/// ```
/// use registrar_di::Args;
///
/// let args = Args::new().with(8080u16).with("localhost".to_string());
///
/// assert_eq!(args.len(), 2);
/// assert_eq!(*args.get::<u16>(0).unwrap(), 8080);
/// assert_eq!(args.get::<String>(1).unwrap(), "localhost");
/// assert!(args.get::<u16>(1).is_err());
/// ```
#[derive(Clone, Default)]
pub struct Args {
	values: Vec<Instance>,
}

impl Args {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
		self.push(value);
		self
	}

	pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
		self.values.push(Arc::new(value));
	}

	/// Appends an already erased value.
	pub fn push_instance(&mut self, value: Instance) {
		self.values.push(value);
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Returns the argument at `index` as a `T`.
	pub fn get<T: Any + Send + Sync>(&self, index: usize) -> DiResult<&T> {
		let value = self.values.get(index).ok_or(DiError::MissingArgument {
			index,
			len: self.values.len(),
		})?;
		value
			.downcast_ref::<T>()
			.ok_or_else(|| DiError::TypeMismatch {
				name: format!("argument {index}"),
				expected: type_name::<T>(),
			})
	}

	pub fn instance(&self, index: usize) -> Option<&Instance> {
		self.values.get(index)
	}
}

impl fmt::Debug for Args {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Args").field("len", &self.values.len()).finish()
	}
}

#[derive(Clone)]
enum Maker {
	Registered(MakerFn),
	Default(DefaultFactoryFn),
}

/// Callable produced by resolving a factory.
///
/// Bound to the registry it was requested from, through a weak reference so
/// that a provider value holding a `Factory` never keeps its registry alive.
pub struct Factory {
	name: String,
	registry: WeakRegistry,
	maker: Maker,
}

impl Factory {
	pub(crate) fn registered(registry: &Registry, name: impl Into<String>, maker: MakerFn) -> Self {
		Self {
			name: name.into(),
			registry: registry.downgrade(),
			maker: Maker::Registered(maker),
		}
	}

	pub(crate) fn fallback(
		registry: &Registry,
		name: impl Into<String>,
		maker: DefaultFactoryFn,
	) -> Self {
		Self {
			name: name.into(),
			registry: registry.downgrade(),
			maker: Maker::Default(maker),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Whether this factory came from the registry's default factory.
	pub fn is_fallback(&self) -> bool {
		matches!(self.maker, Maker::Default(_))
	}

	/// Runs the maker against the registry this factory was requested from.
	pub fn create_instance(&self, args: &Args) -> DiResult<Instance> {
		let registry = self
			.registry
			.upgrade()
			.ok_or_else(|| DiError::RegistryDropped(format!("factory::{}", self.name)))?;
		tracing::trace!(factory = %self.name, args = args.len(), "invoking factory");
		match &self.maker {
			Maker::Registered(maker) => maker(&registry, args),
			Maker::Default(maker) => maker(&registry, &self.name, args),
		}
	}

	/// Runs the maker and downcasts the result to `T`.
	pub fn create<T: Any + Send + Sync>(&self, args: &Args) -> DiResult<Arc<T>> {
		self.create_instance(args)?
			.downcast::<T>()
			.map_err(|_| DiError::TypeMismatch {
				name: format!("factory::{}", self.name),
				expected: type_name::<T>(),
			})
	}
}

impl fmt::Debug for Factory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Factory")
			.field("name", &self.name)
			.field("fallback", &self.is_fallback())
			.finish_non_exhaustive()
	}
}
