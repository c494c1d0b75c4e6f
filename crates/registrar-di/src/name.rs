//! Qualified provider names

use std::fmt;

/// Namespace a provider is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
	Service,
	Factory,
}

impl Namespace {
	pub fn prefix(&self) -> &'static str {
		match self {
			Namespace::Service => "service",
			Namespace::Factory => "factory",
		}
	}
}

/// A provider name tagged with its namespace.
///
/// Services and factories live in disjoint namespaces, so `service::mailer`
/// and `factory::mailer` never collide.
///
/// # Examples
///
/// ```
/// use registrar_di::QualifiedName;
///
/// let name = QualifiedName::factory("mailer");
/// assert_eq!(name.to_string(), "factory::mailer");
/// assert_ne!(name, QualifiedName::service("mailer"));
///
/// // Plain strings name services.
/// assert_eq!(QualifiedName::from("mailer"), QualifiedName::service("mailer"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
	namespace: Namespace,
	name: String,
}

impl QualifiedName {
	pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
		Self {
			namespace,
			name: name.into(),
		}
	}

	pub fn service(name: impl Into<String>) -> Self {
		Self::new(Namespace::Service, name)
	}

	pub fn factory(name: impl Into<String>) -> Self {
		Self::new(Namespace::Factory, name)
	}

	pub fn namespace(&self) -> Namespace {
		self.namespace
	}

	/// The user-facing name without its namespace prefix.
	pub fn name(&self) -> &str {
		&self.name
	}
}

impl fmt::Display for QualifiedName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}::{}", self.namespace.prefix(), self.name)
	}
}

impl From<&str> for QualifiedName {
	fn from(name: &str) -> Self {
		Self::service(name)
	}
}

impl From<String> for QualifiedName {
	fn from(name: String) -> Self {
		Self::service(name)
	}
}

impl From<&QualifiedName> for QualifiedName {
	fn from(name: &QualifiedName) -> Self {
		name.clone()
	}
}
