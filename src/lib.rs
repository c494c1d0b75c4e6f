//! # Registrar
//!
//! An immutable service registry for Rust.
//!
//! A [`Registry`] maps names to lazily constructed, memoized providers.
//! Registering a provider returns a new registry and leaves the old one
//! untouched; values built from a replaced provider are invalidated in the new
//! registry only, everything else stays shared.
//!
//! ## Feature Flags
//!
//! - `di` (default) - the service registry ([`registrar_di`])
//! - `conf` (default) - layered settings loading ([`registrar_conf`])
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "di")]
//! # fn main() -> registrar::DiResult<()> {
//! use registrar::Registry;
//!
//! let registry = Registry::new()
//!     .register_service("greeting", |_| Ok("hello".to_string()))?
//!     .register_service("message", |r| {
//!         Ok(format!("{}, world", r.service::<String>("greeting")?))
//!     })?;
//!
//! assert_eq!(*registry.service::<String>("message")?, "hello, world");
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "di"))]
//! # fn main() {}
//! ```

#[cfg(feature = "di")]
pub use registrar_di as di;

#[cfg(feature = "conf")]
pub use registrar_conf as conf;

#[cfg(feature = "di")]
pub use registrar_di::{
	Args, DefaultFactoryFn, DependencyGraph, DiError, DiResult, Factory, Instance, Lazy,
	Namespace, ProviderState, QualifiedName, RecordToken, Registry, WeakRegistry,
};

#[cfg(feature = "conf")]
pub use registrar_conf::{
	ConfigSource, RecordingPolicy, RegistrySettings, SettingsBuilder, SettingsError,
};

/// Builds an empty registry configured by `builder`.
///
/// ```no_run
/// use registrar::SettingsBuilder;
///
/// let registry = registrar::registry_from(&SettingsBuilder::standard())?;
/// # Ok::<(), registrar::DiError>(())
/// ```
#[cfg(feature = "di")]
pub fn registry_from(builder: &SettingsBuilder) -> DiResult<Registry> {
	let settings = builder
		.build()
		.map_err(|err| DiError::InvalidArgument(err.to_string()))?;
	Registry::with_settings(settings)
}
