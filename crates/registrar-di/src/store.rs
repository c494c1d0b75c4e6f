//! Persistent provider store
//!
//! # Mental model
//!
//! * A store is a private, mutable *overlay* on top of a chain of frozen
//!   [`Layer`]s shared with other registry values.
//! * Lookups search the overlay, then each layer from newest to oldest.
//! * Branching freezes the overlay into a new layer. The parent keeps exactly
//!   the same view, and the child starts with an empty overlay on top of the
//!   same chain, so unaffected entries are shared, never copied.
//! * Memoization and registration only ever write to the overlay of the store
//!   that performs them.
//! * Values that hold [`Lazy`](crate::Lazy) or [`Factory`](crate::Factory)
//!   handles point at the registry that built them, so [`ProviderStore::derive`]
//!   resets them (and their dependents) in the child instead of sharing them.
//!
//! # Invariants
//!
//! * A frozen layer is never mutated.
//! * `reverse_dependencies` of A contains B iff B's last successful
//!   construction recorded A. When A is registered after B recorded it, the
//!   link waits in `pending_dependents` until A's entry is created.
//! * Refresh never invokes a user factory.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entry::{Instance, ProviderEntry, ServiceFn};
use crate::name::QualifiedName;

/// Immutable slice of the provider mapping shared between registry values.
#[derive(Debug)]
struct Layer {
	parent: Option<Arc<Layer>>,
	entries: HashMap<QualifiedName, Arc<ProviderEntry>>,
	depth: usize,
}

impl Layer {
	fn get(&self, name: &QualifiedName) -> Option<&Arc<ProviderEntry>> {
		let mut layer = Some(self);
		while let Some(current) = layer {
			if let Some(entry) = current.entries.get(name) {
				return Some(entry);
			}
			layer = current.parent.as_deref();
		}
		None
	}
}

#[derive(Debug, Default)]
pub(crate) struct ProviderStore {
	base: Option<Arc<Layer>>,
	overlay: HashMap<QualifiedName, Arc<ProviderEntry>>,
	/// Memoized entries whose value holds handles bound to this registry.
	handle_holders: Arc<HashSet<QualifiedName>>,
	/// Unregistered name -> memoized entries that recorded it.
	pending_dependents: Arc<HashMap<QualifiedName, Vec<QualifiedName>>>,
}

impl ProviderStore {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn lookup(&self, name: &QualifiedName) -> Option<Arc<ProviderEntry>> {
		self.overlay
			.get(name)
			.or_else(|| self.base.as_ref().and_then(|base| base.get(name)))
			.cloned()
	}

	pub(crate) fn contains(&self, name: &QualifiedName) -> bool {
		self.lookup(name).is_some()
	}

	/// Every registered name, sorted.
	pub(crate) fn names(&self) -> Vec<QualifiedName> {
		let mut seen: HashSet<&QualifiedName> = self.overlay.keys().collect();
		let mut layer = self.base.as_deref();
		while let Some(current) = layer {
			seen.extend(current.entries.keys());
			layer = current.parent.as_deref();
		}
		let mut names: Vec<QualifiedName> = seen.into_iter().cloned().collect();
		names.sort();
		names
	}

	/// Number of frozen layers below the overlay.
	pub(crate) fn layer_depth(&self) -> usize {
		self.base.as_ref().map_or(0, |base| base.depth)
	}

	fn put(&mut self, name: QualifiedName, entry: ProviderEntry) {
		self.overlay.insert(name, Arc::new(entry));
	}

	/// Freezes the overlay into a shared layer without changing this store's
	/// view.
	fn freeze(&mut self) {
		if self.overlay.is_empty() {
			return;
		}
		let parent = self.base.take();
		let depth = parent.as_ref().map_or(0, |p| p.depth) + 1;
		self.base = Some(Arc::new(Layer {
			parent,
			entries: std::mem::take(&mut self.overlay),
			depth,
		}));
	}

	/// Returns a store with the same view that shares every current entry.
	pub(crate) fn branch(&mut self) -> ProviderStore {
		self.freeze();
		ProviderStore {
			base: self.base.clone(),
			overlay: HashMap::new(),
			handle_holders: self.handle_holders.clone(),
			pending_dependents: self.pending_dependents.clone(),
		}
	}

	/// Branches for a new registry value.
	///
	/// Entries holding handles bound to this store's registry are reset in
	/// the child, dependents first. Returns the child and the reset names.
	pub(crate) fn derive(&mut self) -> (ProviderStore, Vec<QualifiedName>) {
		let mut child = self.branch();
		let holders = child.handle_holders();

		let mut visited = HashSet::new();
		let mut reset = Vec::new();
		for name in &holders {
			child.refresh_inner(name, &mut visited, &mut reset);
		}
		(child, reset)
	}

	/// Names whose memoized value holds registry-bound handles, sorted.
	pub(crate) fn handle_holders(&self) -> Vec<QualifiedName> {
		let mut names: Vec<QualifiedName> = self.handle_holders.iter().cloned().collect();
		names.sort();
		names
	}

	/// Flattens the layer chain into a single layer once it is deeper than
	/// `max_depth`.
	pub(crate) fn compact(&mut self, max_depth: usize) {
		if self.layer_depth() <= max_depth {
			return;
		}
		let mut chain = Vec::new();
		let mut layer = self.base.as_deref();
		while let Some(current) = layer {
			chain.push(current);
			layer = current.parent.as_deref();
		}

		let mut entries = HashMap::new();
		for current in chain.iter().rev() {
			for (name, entry) in &current.entries {
				entries.insert(name.clone(), entry.clone());
			}
		}
		tracing::trace!(
			layers = chain.len(),
			entries = entries.len(),
			"compacting provider store"
		);
		self.base = Some(Arc::new(Layer {
			parent: None,
			entries,
			depth: 1,
		}));
	}

	/// Registers `factory` under `name`.
	///
	/// An existing entry is refreshed first so nothing downstream keeps a value
	/// built from the old factory; the new entry starts without reverse
	/// dependents. A fresh entry instead picks up the memoized entries that
	/// recorded `name` before it was registered. Returns the names that were
	/// reset.
	pub(crate) fn insert(&mut self, name: QualifiedName, factory: ServiceFn) -> Vec<QualifiedName> {
		let mut entry = ProviderEntry::new(factory);
		let reset = if self.contains(&name) {
			self.refresh(&name)
		} else {
			entry.reverse_dependencies = self.take_pending(&name);
			Vec::new()
		};
		self.put(name, entry);
		reset
	}

	/// Drops the cached instance of `name` and, first, of every transitive
	/// reverse dependent. Factories are kept.
	///
	/// Returns the names that were reset, dependents first.
	pub(crate) fn refresh(&mut self, name: &QualifiedName) -> Vec<QualifiedName> {
		let mut visited = HashSet::new();
		let mut reset = Vec::new();
		self.refresh_inner(name, &mut visited, &mut reset);
		reset
	}

	fn refresh_inner(
		&mut self,
		name: &QualifiedName,
		visited: &mut HashSet<QualifiedName>,
		reset: &mut Vec<QualifiedName>,
	) {
		if !visited.insert(name.clone()) {
			return;
		}
		let Some(entry) = self.lookup(name) else {
			return;
		};
		for dependent in &entry.reverse_dependencies {
			self.refresh_inner(dependent, visited, reset);
		}

		// Dependents unlinked themselves from this entry above; re-read it.
		let entry = self.lookup(name).unwrap_or(entry);
		for dependency in &entry.dependencies {
			self.unlink(dependency, name);
		}
		self.put(name.clone(), entry.reset());
		if self.handle_holders.contains(name) {
			Arc::make_mut(&mut self.handle_holders).remove(name);
		}
		reset.push(name.clone());
	}

	/// Removes `dependent` from the reverse dependencies of `dependency`.
	fn unlink(&mut self, dependency: &QualifiedName, dependent: &QualifiedName) {
		let Some(entry) = self.lookup(dependency) else {
			self.forget_pending(dependency, dependent);
			return;
		};
		if !entry.reverse_dependencies.contains(dependent) {
			return;
		}
		let mut updated = ProviderEntry::clone(&entry);
		updated.reverse_dependencies.retain(|name| name != dependent);
		self.put(dependency.clone(), updated);
	}

	fn defer_link(&mut self, dependency: &QualifiedName, dependent: &QualifiedName) {
		let dependents = Arc::make_mut(&mut self.pending_dependents)
			.entry(dependency.clone())
			.or_default();
		if !dependents.contains(dependent) {
			dependents.push(dependent.clone());
		}
	}

	fn forget_pending(&mut self, dependency: &QualifiedName, dependent: &QualifiedName) {
		let recorded = self
			.pending_dependents
			.get(dependency)
			.is_some_and(|dependents| dependents.contains(dependent));
		if !recorded {
			return;
		}
		let pending = Arc::make_mut(&mut self.pending_dependents);
		if let Some(dependents) = pending.get_mut(dependency) {
			dependents.retain(|name| name != dependent);
			if dependents.is_empty() {
				pending.remove(dependency);
			}
		}
	}

	fn take_pending(&mut self, name: &QualifiedName) -> Vec<QualifiedName> {
		if !self.pending_dependents.contains_key(name) {
			return Vec::new();
		}
		Arc::make_mut(&mut self.pending_dependents)
			.remove(name)
			.unwrap_or_default()
	}

	/// Stores the result of a successful construction and links `name` into
	/// the reverse dependencies of everything it consulted.
	///
	/// `holds_handles` marks a value built while handing out handles bound to
	/// this store's registry.
	pub(crate) fn memoize(
		&mut self,
		name: &QualifiedName,
		instance: Instance,
		dependencies: Vec<QualifiedName>,
		holds_handles: bool,
	) {
		let Some(entry) = self.lookup(name) else {
			return;
		};
		for dependency in dependencies.iter().filter(|dependency| *dependency != name) {
			match self.lookup(dependency) {
				Some(dep) if !dep.reverse_dependencies.contains(name) => {
					let mut updated = ProviderEntry::clone(&dep);
					updated.reverse_dependencies.push(name.clone());
					self.put(dependency.clone(), updated);
				}
				Some(_) => {}
				None => self.defer_link(dependency, name),
			}
		}
		if holds_handles {
			Arc::make_mut(&mut self.handle_holders).insert(name.clone());
		}

		let mut updated = ProviderEntry::clone(&entry);
		if dependencies.contains(name) && !updated.reverse_dependencies.contains(name) {
			updated.reverse_dependencies.push(name.clone());
		}
		updated.instance = Some(instance);
		updated.dependencies = dependencies;
		self.put(name.clone(), updated);
	}
}
