//! End-to-end tests through the facade crate
//!
//! Settings are loaded from a TOML file and drive the registry built from them.

use registrar::conf::{DefaultSource, TomlFileSource};
use registrar::{DiError, ProviderState, RecordingPolicy, Registry, SettingsBuilder};
use rstest::*;
use std::io::Write;

fn builder_for(contents: &str) -> (tempfile::NamedTempFile, SettingsBuilder) {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(contents.as_bytes()).unwrap();
	let builder = SettingsBuilder::new()
		.add_source(DefaultSource::new())
		.add_source(TomlFileSource::new(file.path()));
	(file, builder)
}

#[rstest]
fn test_registry_uses_configured_self_name() {
	// Arrange
	let (_file, builder) = builder_for("self_name = \"Container\"\n");

	// Act
	let registry = registrar::registry_from(&builder).unwrap();

	// Assert
	let me = registry.service::<Registry>("Container").unwrap();
	assert!(Registry::ptr_eq(&me, &registry));
	assert!(matches!(
		registry.service::<Registry>("Src"),
		Err(DiError::UnknownService(_))
	));
	assert!(registry.register_service("Src", |_| Ok(1u8)).is_ok());
}

#[rstest]
fn test_registry_uses_configured_recording_policy() {
	// Arrange
	let (_file, builder) = builder_for("dependency_recording = \"every-resolution\"\n");
	let registry = registrar::registry_from(&builder)
		.unwrap()
		.register_service("x", |_| Ok(1u8))
		.unwrap()
		.register_service("y", |r: &Registry| {
			Ok(*r.service::<u8>("x")? + *r.service::<u8>("x")?)
		})
		.unwrap();

	// Act
	let deps = registry.dependencies_of("y").unwrap();

	// Assert
	assert_eq!(registry.settings().dependency_recording, RecordingPolicy::EveryResolution);
	assert_eq!(deps.len(), 2);
	assert_eq!(registry.provider_state("x"), ProviderState::Memoized);
}

#[rstest]
fn test_invalid_settings_surface_as_invalid_argument() {
	// Arrange
	let (_file, builder) = builder_for("max_resolution_depth = 0\n");

	// Act
	let result = registrar::registry_from(&builder);

	// Assert
	assert!(matches!(result, Err(DiError::InvalidArgument(_))));
}
