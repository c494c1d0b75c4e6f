//! Re-registration and invalidation tests
//!
//! Re-registering a provider must:
//! 1. Drop the cached values of every transitive dependent in the new registry
//! 2. Keep every unrelated cached value shared with the old registry
//! 3. Never touch the registry it was called on

use registrar_di::{DiResult, ProviderState, QualifiedName, Registry};
use rstest::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn svc(name: &str) -> QualifiedName {
	QualifiedName::service(name)
}

fn concat(r: &Registry, names: &[&str]) -> DiResult<String> {
	let mut out = String::new();
	for name in names {
		out.push_str(&r.service::<String>(name)?);
	}
	Ok(out)
}

/// foo, bar and foobar = foo + bar.
#[fixture]
fn foobar() -> Registry {
	Registry::new()
		.register_service("foo", |_| Ok("foo".to_string()))
		.unwrap()
		.register_service("bar", |_| Ok("bar".to_string()))
		.unwrap()
		.register_service("foobar", |r: &Registry| concat(r, &["foo", "bar"]))
		.unwrap()
}

#[rstest]
fn test_reregistration_invalidates_dependents(foobar: Registry) {
	// Arrange
	assert_eq!(*foobar.service::<String>("foobar").unwrap(), "foobar");

	// Act
	let updated = foobar
		.register_service("foo", |_| Ok("FOO".to_string()))
		.unwrap();

	// Assert
	assert_eq!(*updated.service::<String>("foobar").unwrap(), "FOObar");
	assert_eq!(*foobar.service::<String>("foobar").unwrap(), "foobar");
	assert_eq!(*foobar.service::<String>("foo").unwrap(), "foo");
}

#[rstest]
fn test_unrelated_values_stay_shared(foobar: Registry) {
	// Arrange
	foobar.service::<String>("foobar").unwrap();
	let bar_before = foobar.service::<String>("bar").unwrap();

	// Act
	let updated = foobar
		.register_service("foo", |_| Ok("FOO".to_string()))
		.unwrap();

	// Assert
	assert_eq!(updated.provider_state("bar"), ProviderState::Memoized);
	assert_eq!(updated.provider_state("foobar"), ProviderState::Uninitialized);
	assert_eq!(updated.provider_state("foo"), ProviderState::Uninitialized);
	let bar_after = updated.service::<String>("bar").unwrap();
	assert!(Arc::ptr_eq(&bar_before, &bar_after));
}

#[rstest]
fn test_invalidation_is_transitive() {
	// Arrange: top -> middle -> leaf, plus side -> leaf
	let registry = Registry::new()
		.register_service("leaf", |_| Ok("leaf".to_string()))
		.unwrap()
		.register_service("middle", |r: &Registry| concat(r, &["leaf"]))
		.unwrap()
		.register_service("top", |r: &Registry| concat(r, &["middle"]))
		.unwrap()
		.register_service("side", |r: &Registry| concat(r, &["leaf"]))
		.unwrap()
		.register_service("other", |_| Ok("other".to_string()))
		.unwrap();
	for name in ["top", "side", "other"] {
		registry.service::<String>(name).unwrap();
	}

	// Act
	let updated = registry
		.register_service("leaf", |_| Ok("LEAF".to_string()))
		.unwrap();

	// Assert
	for name in ["leaf", "middle", "top", "side"] {
		assert_eq!(updated.provider_state(name), ProviderState::Uninitialized, "{name}");
		assert_eq!(registry.provider_state(name), ProviderState::Memoized, "{name}");
	}
	assert_eq!(updated.provider_state("other"), ProviderState::Memoized);
	assert_eq!(*updated.service::<String>("top").unwrap(), "LEAF");
	assert_eq!(*registry.service::<String>("top").unwrap(), "leaf");
}

#[rstest]
fn test_dependencies_are_direct_only() {
	// Arrange: a -> b -> c
	let registry = Registry::new()
		.register_service("c", |_| Ok("c".to_string()))
		.unwrap()
		.register_service("b", |r: &Registry| concat(r, &["c"]))
		.unwrap()
		.register_service("a", |r: &Registry| concat(r, &["b"]))
		.unwrap();

	// Act
	let deps = registry.dependencies_of("a").unwrap();

	// Assert
	assert_eq!(deps, vec![svc("b")]);
	assert_eq!(registry.dependencies_of("b").unwrap(), vec![svc("c")]);
	assert!(registry.dependencies_of("c").unwrap().is_empty());
	assert_eq!(registry.reverse_dependencies_of("c"), vec![svc("b")]);
}

#[rstest]
fn test_reverse_links_follow_latest_construction(foobar: Registry) {
	// Arrange
	foobar.service::<String>("foobar").unwrap();
	assert_eq!(foobar.reverse_dependencies_of("foo"), vec![svc("foobar")]);

	// Act: foobar no longer consults foo
	let updated = foobar
		.register_service("foobar", |r: &Registry| concat(r, &["bar"]))
		.unwrap();
	updated.service::<String>("foobar").unwrap();

	// Assert
	assert!(updated.reverse_dependencies_of("foo").is_empty());
	assert_eq!(updated.reverse_dependencies_of("bar"), vec![svc("foobar")]);
	assert_eq!(foobar.reverse_dependencies_of("foo"), vec![svc("foobar")]);
}

#[rstest]
fn test_reregistered_factory_is_called_again() {
	// Arrange
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let registry = Registry::new()
		.register_service("base", |_| Ok(1u32))
		.unwrap()
		.register_service("derived", move |r: &Registry| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(*r.service::<u32>("base")? * 10)
		})
		.unwrap();
	assert_eq!(*registry.service::<u32>("derived").unwrap(), 10);

	// Act
	let updated = registry.register_service("base", |_| Ok(2u32)).unwrap();

	// Assert
	assert_eq!(*updated.service::<u32>("derived").unwrap(), 20);
	assert_eq!(*updated.service::<u32>("derived").unwrap(), 20);
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[rstest]
fn test_self_dependency_does_not_invalidate() {
	// Arrange
	let registry = Registry::new()
		.register_service("me", |r: &Registry| {
			r.service::<Registry>("Src")?;
			Ok(0u8)
		})
		.unwrap()
		.register_service("x", |_| Ok(1u8))
		.unwrap();
	registry.service::<u8>("me").unwrap();

	// Act
	let updated = registry.register_service("x", |_| Ok(2u8)).unwrap();

	// Assert
	assert_eq!(updated.provider_state("me"), ProviderState::Memoized);
}
