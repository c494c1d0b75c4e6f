//! Circular dependency detection
//!
//! Every registry value owns a [`ResolutionPath`]: the qualified names whose
//! factories are currently running on the call stack, in call order. A name
//! is "in construction" exactly while it sits on this path.
//!
//! ## Features
//!
//! - **O(1) Circular Detection**: membership lookup in a `HashSet`
//! - **Per registry value**: two registry values never see each other's path,
//!   so resolving the same name on a derived registry inside a factory is not
//!   a cycle
//! - **Depth Limiting**: a configurable maximum prevents pathological chains
//! - **RAII**: [`ResolutionGuard`] pops the name even when the factory fails
//!
//! Constructions on one registry value are serialized, so the path only ever
//! belongs to a single thread at a time. The owning thread is kept so that
//! other threads can tell their own re-entrance apart from a construction
//! running elsewhere.

use std::collections::HashSet;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::name::QualifiedName;

/// Names currently under construction on one registry value.
#[derive(Debug, Default)]
pub(crate) struct ResolutionPath {
	in_construction: HashSet<QualifiedName>,
	path: Vec<QualifiedName>,
	owner: Option<ThreadId>,
}

impl ResolutionPath {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn contains(&self, name: &QualifiedName) -> bool {
		self.in_construction.contains(name)
	}

	/// Whether `name` is in construction further up the calling thread's
	/// stack.
	pub(crate) fn contains_on_current_thread(&self, name: &QualifiedName) -> bool {
		self.owner == Some(thread::current().id()) && self.contains(name)
	}

	pub(crate) fn depth(&self) -> usize {
		self.path.len()
	}

	/// Formats the cycle closed by requesting `name` again (`a -> b -> a`).
	fn cycle_path(&self, name: &QualifiedName) -> String {
		match self.path.iter().position(|entry| entry == name) {
			Some(start) => {
				let cycle: Vec<String> = self.path[start..]
					.iter()
					.map(ToString::to_string)
					.collect();
				format!("{} -> {}", cycle.join(" -> "), name)
			}
			None => format!("Unknown cycle involving {}", name),
		}
	}
}

/// Marks `name` as in construction.
///
/// Fails with [`DiError::UnresolvableDependency`] when `name` is already in
/// construction and with [`DiError::MaxDepthExceeded`] when the path would
/// grow past `max_depth`.
pub(crate) fn begin_resolution<'a>(
	path: &'a Mutex<ResolutionPath>,
	name: &QualifiedName,
	max_depth: usize,
) -> DiResult<ResolutionGuard<'a>> {
	let mut state = path.lock();
	if state.contains(name) {
		return Err(DiError::UnresolvableDependency {
			name: name.to_string(),
			path: state.cycle_path(name),
		});
	}
	let depth = state.depth() + 1;
	if depth > max_depth {
		return Err(DiError::MaxDepthExceeded(depth));
	}
	if state.path.is_empty() {
		state.owner = Some(thread::current().id());
	}
	state.in_construction.insert(name.clone());
	state.path.push(name.clone());

	Ok(ResolutionGuard {
		path,
		name: name.clone(),
	})
}

/// RAII guard: removes its name from the path on drop.
#[derive(Debug)]
pub(crate) struct ResolutionGuard<'a> {
	path: &'a Mutex<ResolutionPath>,
	name: QualifiedName,
}

impl Drop for ResolutionGuard<'_> {
	fn drop(&mut self) {
		let mut state = self.path.lock();
		state.in_construction.remove(&self.name);
		if let Some(pos) = state.path.iter().rposition(|entry| entry == &self.name) {
			state.path.remove(pos);
		}
		if state.path.is_empty() {
			state.owner = None;
		}
	}
}
