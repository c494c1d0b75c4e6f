//! Factory and default factory tests
//!
//! These tests verify that:
//! 1. A factory's maker is memoized but produces a fresh value per call
//! 2. Factory handles build against the registry they were requested from
//! 3. Factories and services live in separate namespaces
//! 4. Unregistered factories fall back to the default factory, if any

use registrar_di::{Args, DiError, Instance, ProviderState, QualifiedName, Registry};
use rstest::*;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Connection {
	host: String,
	port: u16,
}

#[fixture]
fn registry() -> Registry {
	Registry::new()
		.register_service("host", |_| Ok("db.local".to_string()))
		.unwrap()
		.register_factory("connection", |r: &Registry, args: &Args| {
			Ok(Connection {
				host: r.service::<String>("host")?.to_string(),
				port: *args.get::<u16>(0)?,
			})
		})
		.unwrap()
}

#[rstest]
fn test_factory_builds_fresh_instances(registry: Registry) {
	// Arrange
	let args = Args::new().with(5432u16);

	// Act
	let first = registry.make::<Connection>("connection", &args).unwrap();
	let second = registry.make::<Connection>("connection", &args).unwrap();

	// Assert
	assert_eq!(*first, Connection { host: "db.local".to_string(), port: 5432 });
	assert_eq!(first, second);
	assert!(!Arc::ptr_eq(&first, &second));
}

#[rstest]
fn test_factory_maker_is_memoized_and_handles_are_fresh(registry: Registry) {
	// Arrange
	let qualified = QualifiedName::factory("connection");
	assert_eq!(registry.provider_state(qualified.clone()), ProviderState::Uninitialized);

	// Act
	let first = registry.factory("connection").unwrap();
	let second = registry.factory("connection").unwrap();

	// Assert
	assert_eq!(registry.provider_state(qualified), ProviderState::Memoized);
	assert!(!Arc::ptr_eq(&first, &second));
	assert_eq!(first.name(), "connection");
	assert!(!first.is_fallback());
	let args = Args::new().with(1u16);
	assert_eq!(
		first.create::<Connection>(&args).unwrap(),
		second.create::<Connection>(&args).unwrap()
	);
}

#[rstest]
fn test_factory_handle_on_derived_registry_after_parent_is_dropped(registry: Registry) {
	// Arrange
	registry.factory("connection").unwrap();
	let derived = registry
		.register_service("unrelated", |_| Ok(0u8))
		.unwrap();

	// Act
	drop(registry);
	let made = derived
		.factory("connection")
		.unwrap()
		.create::<Connection>(&Args::new().with(5u16));

	// Assert
	assert_eq!(made.unwrap().port, 5);
}

#[rstest]
fn test_factory_handle_builds_against_requesting_registry(registry: Registry) {
	// Arrange
	let original = registry.factory("connection").unwrap();
	let derived = registry
		.register_service("host", |_| Ok("replica.local".to_string()))
		.unwrap();

	// Act
	let from_derived = derived
		.factory("connection")
		.unwrap()
		.create::<Connection>(&Args::new().with(1u16))
		.unwrap();
	let from_original = original.create::<Connection>(&Args::new().with(1u16)).unwrap();

	// Assert
	assert_eq!(from_derived.host, "replica.local");
	assert_eq!(from_original.host, "db.local");
}

#[rstest]
fn test_factory_and_service_namespaces_are_disjoint(registry: Registry) {
	// Arrange
	let registry = registry
		.register_service("connection", |_| Ok("a service".to_string()))
		.unwrap();

	// Act
	let service = registry.service::<String>("connection").unwrap();
	let made = registry
		.make::<Connection>("connection", &Args::new().with(1u16))
		.unwrap();

	// Assert
	assert_eq!(*service, "a service");
	assert_eq!(made.port, 1);
	assert!(registry.service::<String>("host").is_ok());
	assert!(matches!(
		registry.factory("host"),
		Err(DiError::UnknownClass(ref name)) if name == "host"
	));
}

#[rstest]
fn test_missing_argument_is_reported(registry: Registry) {
	// Act
	let result = registry.make::<Connection>("connection", &Args::new());

	// Assert
	assert_eq!(result.unwrap_err(), DiError::MissingArgument { index: 0, len: 0 });
}

#[rstest]
fn test_default_factory_fallback() {
	// Arrange
	let registry = Registry::new()
		.register_factory("known", |_, _| Ok("registered".to_string()))
		.unwrap()
		.with_default_factory(|_: &Registry, name: &str, args: &Args| {
			Ok(Arc::new(format!("default:{}:{}", name, args.len())) as Instance)
		});

	// Act
	let known = registry.make::<String>("known", &Args::new()).unwrap();
	let fallback = registry.factory("Anything").unwrap();
	let made = registry
		.make::<String>("Anything", &Args::new().with(1u8).with(2u8))
		.unwrap();

	// Assert
	assert_eq!(*known, "registered");
	assert!(fallback.is_fallback());
	assert_eq!(fallback.name(), "Anything");
	assert_eq!(*made, "default:Anything:2");
	assert!(!registry.contains(QualifiedName::factory("Anything")));
}

#[rstest]
fn test_default_factory_survives_registration() {
	// Arrange
	let registry = Registry::new().with_default_factory(|_: &Registry, name: &str, _: &Args| {
		Ok(Arc::new(name.to_uppercase()) as Instance)
	});

	// Act
	let derived = registry.register_service("x", |_| Ok(0u8)).unwrap();

	// Assert
	assert_eq!(*derived.make::<String>("abc", &Args::new()).unwrap(), "ABC");
	assert!(matches!(
		Registry::new().make::<String>("abc", &Args::new()),
		Err(DiError::UnknownClass(_))
	));
}

#[rstest]
fn test_unknown_factory_inside_construction() {
	// Arrange: a service asks for a factory nobody registered
	let registry = Registry::new()
		.register_service("uses_factory", |r: &Registry| {
			r.factory("helper")?;
			Ok(0u8)
		})
		.unwrap();

	// Act
	let result = registry.service::<u8>("uses_factory");

	// Assert
	assert_eq!(result.unwrap_err(), DiError::UnknownClass("helper".to_string()));
}

#[rstest]
fn test_make_on_derived_registry_after_parent_is_dropped(registry: Registry) {
	// Arrange
	registry.factory("connection").unwrap();
	let derived = registry
		.register_service("unrelated", |_| Ok(0u8))
		.unwrap();

	// Act
	drop(registry);
	let made = derived.make::<Connection>("connection", &Args::new().with(7u16));

	// Assert
	assert_eq!(made.unwrap().port, 7);
}

#[rstest]
fn test_factory_type_mismatch(registry: Registry) {
	// Act
	let result = registry.make::<String>("connection", &Args::new().with(1u16));

	// Assert
	assert!(matches!(
		result,
		Err(DiError::TypeMismatch { ref name, .. }) if name == "factory::connection"
	));
}
