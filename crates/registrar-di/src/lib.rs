//! # Registrar DI
//!
//! An immutable service registry with lazy construction, memoization and
//! dependency-tracked invalidation.
//!
//! ## Features
//!
//! - **Immutable registries**: every registration returns a new [`Registry`];
//!   existing values never change and share unaffected providers
//! - **Lazy construction**: a provider's factory runs on first request and its
//!   value is cached
//! - **Automatic dependency tracking**: services a factory resolves are
//!   recorded as its direct dependencies
//! - **Selective invalidation**: re-registering a provider drops the cached
//!   values of everything transitively built from it, in the new registry only
//! - **Factories**: providers that build a fresh value per call, with an
//!   optional registry-wide fallback
//! - **Lazy handles**: [`Registry::lazy`] lets providers refer to each other
//!   without forming a construction cycle
//! - **Cycle detection**: a provider that requests itself during construction
//!   fails with [`DiError::UnresolvableDependency`]
//! - **Thread safety**: clones of one registry may resolve concurrently; each
//!   provider is still built once
//!
//! ## Example
//!
//! ```rust
//! use registrar_di::{Args, DiResult, Registry};
//!
//! struct Mailer {
//!     host: String,
//! }
//!
//! struct Message {
//!     to: String,
//! }
//!
//! # fn main() -> DiResult<()> {
//! let registry = Registry::new()
//!     .register_service("host", |_| Ok("smtp.local".to_string()))?
//!     .register_service("mailer", |r| {
//!         Ok(Mailer { host: r.service::<String>("host")?.to_string() })
//!     })?
//!     .register_factory("message", |_, args| {
//!         Ok(Message { to: args.get::<String>(0)?.clone() })
//!     })?;
//!
//! assert_eq!(registry.service::<Mailer>("mailer")?.host, "smtp.local");
//!
//! let message = registry.make::<Message>("message", &Args::new().with("ops".to_string()))?;
//! assert_eq!(message.to, "ops");
//! # Ok(())
//! # }
//! ```

mod cycle_detection;
pub mod entry;
pub mod error;
pub mod factory;
pub mod lazy;
pub mod name;
pub mod recorder;
pub mod registry;
mod store;
pub mod token;
pub mod visualization;

pub use entry::{Instance, ProviderState};
pub use error::{DiError, DiResult};
pub use factory::{Args, DefaultFactoryFn, Factory};
pub use lazy::Lazy;
pub use name::{Namespace, QualifiedName};
pub use recorder::DependencyRecorder;
pub use registry::{Registry, WeakRegistry};
pub use token::RecordToken;
pub use visualization::{DependencyGraph, GraphNode, GraphStatistics};

pub use registrar_conf::{RecordingPolicy, RegistrySettings};
