//! Immutable service registry
//!
//! A [`Registry`] maps qualified names to lazily constructed, memoized
//! providers. Registering never changes an existing registry: every
//! registration returns a new value that shares all unaffected entries with
//! its parent and invalidates, transitively, everything built from a provider
//! it replaces.
//!
//! # Lifecycle of one provider
//!
//! ```text
//! Unregistered --register--> Uninitialized --resolve--> InConstruction
//!                                  ^                        |      |
//!                                  |                 returns|      |re-requests itself
//!                                  |                        v      v
//!                                  +--re-register dep--- Memoized  UnresolvableDependency
//! ```
//!
//! # Threads
//!
//! A `Registry` is `Send + Sync`. Constructions on one registry value run one
//! at a time: the first thread to miss the cache builds the provider while
//! others wait for the memoized result. Nested resolutions on the building
//! thread re-enter freely. Recording sessions belong to the thread that
//! opened them.
//!
//! A factory must not block on another thread that resolves an uncached
//! provider of the same registry value; that thread waits for the factory to
//! finish and neither makes progress.
//!
//! # Examples
//!
//! ```
//! use registrar_di::{DiResult, Registry};
//!
//! # fn main() -> DiResult<()> {
//! let registry = Registry::new()
//!     .register_service("foo", |_| Ok("foo".to_string()))?
//!     .register_service("bar", |_| Ok("bar".to_string()))?
//!     .register_service("foobar", |r| {
//!         Ok(format!("{}{}", r.service::<String>("foo")?, r.service::<String>("bar")?))
//!     })?;
//! assert_eq!(*registry.service::<String>("foobar")?, "foobar");
//!
//! let updated = registry.register_service("foo", |_| Ok("FOO".to_string()))?;
//! assert_eq!(*updated.service::<String>("foobar")?, "FOObar");
//! assert_eq!(*registry.service::<String>("foobar")?, "foobar");
//! # Ok(())
//! # }
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, ReentrantMutex};
use registrar_conf::RegistrySettings;

use crate::cycle_detection::{ResolutionPath, begin_resolution};
use crate::entry::{Instance, ProviderEntry, ProviderState, ServiceFn};
use crate::error::{DiError, DiResult};
use crate::factory::{Args, DefaultFactoryFn, Factory, MakerFn, RegisteredMaker};
use crate::lazy::Lazy;
use crate::name::{Namespace, QualifiedName};
use crate::recorder::{DependencyRecorder, FrameRecord, RecordingFrame};
use crate::store::ProviderStore;
use crate::token::RecordToken;
use crate::visualization::DependencyGraph;

struct RegistryInner {
	settings: Arc<RegistrySettings>,
	default_factory: Option<DefaultFactoryFn>,
	store: Mutex<ProviderStore>,
	/// One recorder per thread with open sessions or frames.
	recorders: Mutex<HashMap<ThreadId, DependencyRecorder>>,
	/// Held for the whole of a construction.
	construction: ReentrantMutex<()>,
	resolving: Mutex<ResolutionPath>,
}

/// Immutable service/factory registry.
///
/// Cloning a `Registry` yields another handle to the *same* registry value;
/// use [`Registry::ptr_eq`] to compare identity.
#[derive(Clone)]
pub struct Registry {
	inner: Arc<RegistryInner>,
}

/// Non-owning handle to a [`Registry`].
#[derive(Clone)]
pub struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
	pub fn upgrade(&self) -> Option<Registry> {
		self.0.upgrade().map(|inner| Registry { inner })
	}
}

impl Registry {
	/// Creates an empty registry with default settings.
	pub fn new() -> Self {
		Self::from_parts(
			ProviderStore::new(),
			None,
			Arc::new(RegistrySettings::default()),
		)
	}

	/// Creates an empty registry with the given settings.
	///
	/// # Examples
	///
	/// ```
	/// use registrar_di::{Registry, RegistrySettings};
	///
	/// let registry = Registry::with_settings(RegistrySettings::default().with_self_name("App")).unwrap();
	/// let me = registry.service::<Registry>("App").unwrap();
	/// assert!(Registry::ptr_eq(&me, &registry));
	/// ```
	pub fn with_settings(settings: RegistrySettings) -> DiResult<Self> {
		settings
			.validate()
			.map_err(|err| DiError::InvalidArgument(err.to_string()))?;
		Ok(Self::from_parts(
			ProviderStore::new(),
			None,
			Arc::new(settings),
		))
	}

	fn from_parts(
		store: ProviderStore,
		default_factory: Option<DefaultFactoryFn>,
		settings: Arc<RegistrySettings>,
	) -> Self {
		Self {
			inner: Arc::new(RegistryInner {
				settings,
				default_factory,
				store: Mutex::new(store),
				recorders: Mutex::new(HashMap::new()),
				construction: ReentrantMutex::new(()),
				resolving: Mutex::new(ResolutionPath::new()),
			}),
		}
	}

	pub fn settings(&self) -> &RegistrySettings {
		&self.inner.settings
	}

	/// The reserved name under which this registry resolves to itself.
	pub fn self_name(&self) -> &str {
		&self.inner.settings.self_name
	}

	/// Whether both handles refer to the same registry value.
	pub fn ptr_eq(a: &Registry, b: &Registry) -> bool {
		Arc::ptr_eq(&a.inner, &b.inner)
	}

	pub fn downgrade(&self) -> WeakRegistry {
		WeakRegistry(Arc::downgrade(&self.inner))
	}

	// ---------------------------------------------------------------------
	// Registration
	// ---------------------------------------------------------------------

	/// Returns a new registry in which `name` is provided by `factory`.
	///
	/// The factory runs at most once per registry lineage, on first request.
	/// If `name` was already registered, its cached instance and those of all
	/// its transitive dependents are invalidated in the new registry; `self`
	/// is left untouched.
	///
	/// Fails with [`DiError::InvalidArgument`] for the reserved self-name and
	/// with [`DiError::ReentrantRegistration`] when `name` is being constructed
	/// on this registry.
	pub fn register_service<T, F>(&self, name: impl Into<String>, factory: F) -> DiResult<Registry>
	where
		T: Any + Send + Sync,
		F: Fn(&Registry) -> DiResult<T> + Send + Sync + 'static,
	{
		let name = name.into();
		if name == self.inner.settings.self_name {
			return Err(DiError::InvalidArgument(format!(
				"'{}' is reserved for the registry itself",
				name
			)));
		}
		let factory: ServiceFn =
			Arc::new(move |registry: &Registry| -> DiResult<Instance> {
				factory(registry).map(|value| Arc::new(value) as Instance)
			});
		self.register(QualifiedName::service(name), factory)
	}

	/// Returns a new registry in which the factory `name` is provided by
	/// `maker`.
	///
	/// The maker is stored, memoized, as the service `factory::<name>`;
	/// [`Registry::factory`] binds it to the requesting registry and each
	/// call runs `maker` with that registry and the supplied arguments,
	/// producing a fresh instance.
	pub fn register_factory<T, F>(&self, name: impl Into<String>, maker: F) -> DiResult<Registry>
	where
		T: Any + Send + Sync,
		F: Fn(&Registry, &Args) -> DiResult<T> + Send + Sync + 'static,
	{
		let name = name.into();
		let maker: MakerFn = Arc::new(move |registry: &Registry, args: &Args| -> DiResult<Instance> {
			maker(registry, args).map(|value| Arc::new(value) as Instance)
		});
		let factory: ServiceFn = Arc::new(move |_: &Registry| -> DiResult<Instance> {
			Ok(Arc::new(RegisteredMaker(maker.clone())) as Instance)
		});
		self.register(QualifiedName::factory(name), factory)
	}

	/// Returns a new registry whose factory requests fall back to `maker` when
	/// no factory is registered under the requested name.
	pub fn with_default_factory<F>(&self, maker: F) -> Registry
	where
		F: Fn(&Registry, &str, &Args) -> DiResult<Instance> + Send + Sync + 'static,
	{
		let maker: DefaultFactoryFn = Arc::new(maker);
		let store = self.derive_store();
		tracing::debug!("default factory registered");
		Self::from_parts(store, Some(maker), self.inner.settings.clone())
	}

	fn register(&self, name: QualifiedName, factory: ServiceFn) -> DiResult<Registry> {
		if self.inner.resolving.lock().contains_on_current_thread(&name) {
			return Err(DiError::ReentrantRegistration(name.to_string()));
		}

		let mut store = self.derive_store();
		if store.contains(&name) {
			let invalidated = store.insert(name.clone(), factory);
			tracing::debug!(
				name = %name,
				invalidated = invalidated.len(),
				"re-registering provider"
			);
		} else {
			tracing::debug!(name = %name, "registering provider");
			store.insert(name, factory);
		}
		store.compact(self.inner.settings.max_layer_depth);

		Ok(Self::from_parts(
			store,
			self.inner.default_factory.clone(),
			self.inner.settings.clone(),
		))
	}

	/// Store for a registry value derived from this one.
	fn derive_store(&self) -> ProviderStore {
		let (store, reset) = self.inner.store.lock().derive();
		if !reset.is_empty() {
			tracing::trace!(reset = reset.len(), "rebuilding registry-bound providers");
		}
		store
	}

	// ---------------------------------------------------------------------
	// Resolution
	// ---------------------------------------------------------------------

	/// Resolves the service `name` and downcasts it to `T`.
	///
	/// Requesting the reserved self-name returns this registry (`T` must be
	/// [`Registry`]).
	pub fn service<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
		let instance = self.service_instance(name)?;
		instance.downcast::<T>().map_err(|_| DiError::TypeMismatch {
			name: QualifiedName::service(name).to_string(),
			expected: type_name::<T>(),
		})
	}

	/// Resolves the service `name` without downcasting.
	pub fn service_instance(&self, name: &str) -> DiResult<Instance> {
		if name == self.inner.settings.self_name {
			return Ok(Arc::new(self.clone()) as Instance);
		}
		self.resolve(&QualifiedName::service(name))
	}

	/// Returns a handle that resolves `name` when called.
	///
	/// `name` is recorded as a dependency of whatever is being constructed
	/// right now, even if the handle is never used. The handle resolves
	/// against this registry value; a provider built around it is rebuilt,
	/// rather than shared, in registries derived from this one.
	pub fn lazy(&self, name: impl Into<String>) -> Lazy {
		let name = name.into();
		self.with_thread_recorder(|recorder| {
			if name != self.inner.settings.self_name {
				recorder.record(&QualifiedName::service(name.clone()));
			}
			recorder.mark_handle();
		});
		Lazy::new(self.downgrade(), name)
	}

	/// Resolves the factory `name` and binds it to this registry.
	///
	/// Without a registration the registry's default factory is bound to
	/// `name`; without a default factory this fails with
	/// [`DiError::UnknownClass`]. Every call returns a new handle; the maker
	/// behind it is memoized.
	pub fn factory(&self, name: &str) -> DiResult<Arc<Factory>> {
		let factory = self.bind_factory(name)?;
		self.with_thread_recorder(DependencyRecorder::mark_handle);
		Ok(Arc::new(factory))
	}

	fn bind_factory(&self, name: &str) -> DiResult<Factory> {
		let qualified = QualifiedName::factory(name);
		match self.resolve(&qualified) {
			Ok(instance) => {
				let maker = instance
					.downcast::<RegisteredMaker>()
					.map_err(|_| DiError::TypeMismatch {
						name: qualified.to_string(),
						expected: type_name::<Factory>(),
					})?;
				Ok(Factory::registered(self, name, maker.0.clone()))
			}
			Err(DiError::UnknownService(missing)) if missing == qualified.to_string() => {
				match &self.inner.default_factory {
					Some(maker) => {
						tracing::debug!(name = %qualified, "falling back to default factory");
						Ok(Factory::fallback(self, name, maker.clone()))
					}
					None => Err(DiError::UnknownClass(name.to_string())),
				}
			}
			Err(err) => Err(err),
		}
	}

	/// Resolves the factory `name` and calls it with `args`.
	pub fn make<T: Any + Send + Sync>(&self, name: &str, args: &Args) -> DiResult<Arc<T>> {
		let instance = self.bind_factory(name)?.create_instance(args)?;
		instance.downcast::<T>().map_err(|_| DiError::TypeMismatch {
			name: QualifiedName::factory(name).to_string(),
			expected: type_name::<T>(),
		})
	}

	/// Resolves `name` and returns the providers its construction consulted
	/// directly.
	pub fn dependencies_of(&self, name: impl Into<QualifiedName>) -> DiResult<Vec<QualifiedName>> {
		let name = name.into();
		if self.is_self_name(&name) {
			return Ok(Vec::new());
		}
		self.resolve(&name)?;
		let entry = self
			.inner
			.store
			.lock()
			.lookup(&name)
			.ok_or_else(|| DiError::UnknownService(name.to_string()))?;
		Ok(entry.dependencies.clone())
	}

	/// Resolves a qualified name, constructing and memoizing on first access.
	pub(crate) fn resolve(&self, name: &QualifiedName) -> DiResult<Instance> {
		let entry = self.entry(name)?;
		if let Some(instance) = &entry.instance {
			return Ok(self.cache_hit(name, instance.clone()));
		}

		let _construction = self.inner.construction.lock();
		// Another thread may have built it while this one waited.
		let entry = self.entry(name)?;
		if let Some(instance) = &entry.instance {
			return Ok(self.cache_hit(name, instance.clone()));
		}

		let guard = begin_resolution(
			&self.inner.resolving,
			name,
			self.inner.settings.max_resolution_depth,
		)?;
		tracing::trace!(name = %name, "constructing provider");

		let frame = FrameGuard::enter(self);
		let result = (entry.factory)(self);
		let record = frame.exit()?;
		let instance = result?;

		self.inner.store.lock().memoize(
			name,
			instance.clone(),
			record.dependencies,
			record.handed_out_handles,
		);
		drop(guard);

		self.record_dependency(name);
		Ok(instance)
	}

	fn entry(&self, name: &QualifiedName) -> DiResult<Arc<ProviderEntry>> {
		self.inner
			.store
			.lock()
			.lookup(name)
			.ok_or_else(|| DiError::UnknownService(name.to_string()))
	}

	fn cache_hit(&self, name: &QualifiedName, instance: Instance) -> Instance {
		tracing::trace!(name = %name, "provider cache hit");
		self.record_dependency(name);
		instance
	}

	// ---------------------------------------------------------------------
	// Recording sessions
	// ---------------------------------------------------------------------

	/// Opens a session that records every provider the calling thread
	/// resolves while it is active. Providers resolved *inside* another
	/// provider's construction are not recorded, only the outermost ones.
	///
	/// The token is only valid on the calling thread.
	pub fn start_recording(&self) -> RecordToken {
		self.with_recorder(DependencyRecorder::start)
	}

	pub fn pause_recording(&self, token: RecordToken) -> DiResult<()> {
		self.with_recorder(|recorder| recorder.pause(token))
	}

	pub fn resume_recording(&self, token: RecordToken) -> DiResult<()> {
		self.with_recorder(|recorder| recorder.resume(token))
	}

	/// Closes the session and returns the names it recorded.
	pub fn stop_recording(&self, token: RecordToken) -> DiResult<Vec<QualifiedName>> {
		self.with_recorder(|recorder| recorder.stop(token))
	}

	/// Records `name` in every active session of the calling thread.
	pub fn record_dependency(&self, name: &QualifiedName) {
		self.with_thread_recorder(|recorder| recorder.record(name));
	}

	/// Runs `f` on the calling thread's recorder, creating it if needed.
	fn with_recorder<R>(&self, f: impl FnOnce(&mut DependencyRecorder) -> R) -> R {
		let thread = thread::current().id();
		let mut recorders = self.inner.recorders.lock();
		let recorder = recorders
			.entry(thread)
			.or_insert_with(|| DependencyRecorder::new(self.inner.settings.dependency_recording));
		let result = f(recorder);
		if recorder.open_sessions() == 0 {
			recorders.remove(&thread);
		}
		result
	}

	/// Runs `f` on the calling thread's recorder if it has one.
	fn with_thread_recorder(&self, f: impl FnOnce(&mut DependencyRecorder)) {
		let thread = thread::current().id();
		if let Some(recorder) = self.inner.recorders.lock().get_mut(&thread) {
			f(recorder);
		}
	}

	// ---------------------------------------------------------------------
	// Introspection
	// ---------------------------------------------------------------------

	pub fn contains(&self, name: impl Into<QualifiedName>) -> bool {
		let name = name.into();
		self.is_self_name(&name) || self.inner.store.lock().contains(&name)
	}

	/// Every registered qualified name, sorted. The self-name is not included.
	pub fn names(&self) -> Vec<QualifiedName> {
		self.inner.store.lock().names()
	}

	pub fn provider_state(&self, name: impl Into<QualifiedName>) -> ProviderState {
		let name = name.into();
		if self.inner.resolving.lock().contains(&name) {
			return ProviderState::InConstruction;
		}
		match self.inner.store.lock().lookup(&name) {
			None => ProviderState::Unregistered,
			Some(entry) if entry.is_memoized() => ProviderState::Memoized,
			Some(_) => ProviderState::Uninitialized,
		}
	}

	/// Providers whose last construction consulted `name`.
	pub fn reverse_dependencies_of(&self, name: impl Into<QualifiedName>) -> Vec<QualifiedName> {
		self.inner
			.store
			.lock()
			.lookup(&name.into())
			.map(|entry| entry.reverse_dependencies.clone())
			.unwrap_or_default()
	}

	/// Snapshot of every provider and its recorded dependency edges.
	pub fn dependency_graph(&self) -> DependencyGraph {
		let store = self.inner.store.lock();
		let mut graph = DependencyGraph::new();
		for name in store.names() {
			let Some(entry) = store.lookup(&name) else {
				continue;
			};
			let state = if entry.is_memoized() {
				ProviderState::Memoized
			} else {
				ProviderState::Uninitialized
			};
			graph.add_node(name.to_string(), state);
			for dependency in &entry.dependencies {
				graph.add_dependency(name.to_string(), dependency.to_string());
			}
		}
		graph
	}

	fn is_self_name(&self, name: &QualifiedName) -> bool {
		name.namespace() == Namespace::Service && name.name() == self.inner.settings.self_name
	}
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let store = self.inner.store.lock();
		f.debug_struct("Registry")
			.field("self_name", &self.inner.settings.self_name)
			.field("providers", &store.names().len())
			.field("layers", &store.layer_depth())
			.field("default_factory", &self.inner.default_factory.is_some())
			.finish()
	}
}

/// Closes a recording frame even when the factory panics.
struct FrameGuard<'a> {
	registry: &'a Registry,
	frame: Option<RecordingFrame>,
}

impl<'a> FrameGuard<'a> {
	fn enter(registry: &'a Registry) -> Self {
		let frame = registry.with_recorder(DependencyRecorder::enter_frame);
		Self {
			registry,
			frame: Some(frame),
		}
	}

	fn exit(mut self) -> DiResult<FrameRecord> {
		match self.frame.take() {
			Some(frame) => self.registry.with_recorder(|recorder| recorder.exit_frame(frame)),
			None => Ok(FrameRecord::default()),
		}
	}
}

impl Drop for FrameGuard<'_> {
	fn drop(&mut self) {
		if let Some(frame) = self.frame.take() {
			let _ = self.registry.with_recorder(|recorder| recorder.exit_frame(frame));
		}
	}
}
