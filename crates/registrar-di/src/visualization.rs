//! Dependency graph snapshots for debugging
//!
//! [`Registry::dependency_graph`](crate::Registry::dependency_graph) captures
//! every provider of one registry value with the edges its last construction
//! recorded. The snapshot can be rendered as DOT for Graphviz.
//!
//! ## Example
//!
//! ```rust
//! use registrar_di::ProviderState;
//! use registrar_di::visualization::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("service::db", ProviderState::Memoized);
//! graph.add_node("service::users", ProviderState::Memoized);
//! graph.add_dependency("service::users", "service::db");
//!
//! let dot = graph.to_dot();
//! assert!(dot.contains("\"service::users\" -> \"service::db\";"));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::entry::ProviderState;

/// One provider in a [`DependencyGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
	/// Qualified name, e.g. `service::db`
	pub name: String,
	pub state: ProviderState,
}

/// Providers and their recorded dependency edges.
///
/// Nodes are kept sorted by name so the rendered output is stable.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
	nodes: BTreeMap<String, GraphNode>,
	edges: Vec<(String, String)>,
}

impl DependencyGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_node(&mut self, name: impl Into<String>, state: ProviderState) {
		let name = name.into();
		self.nodes.insert(name.clone(), GraphNode { name, state });
	}

	/// Adds the edge "`from` was built from `to`".
	pub fn add_dependency(&mut self, from: impl Into<String>, to: impl Into<String>) {
		self.edges.push((from.into(), to.into()));
	}

	pub fn node(&self, name: &str) -> Option<&GraphNode> {
		self.nodes.get(name)
	}

	pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
		self.nodes.values()
	}

	pub fn edges(&self) -> &[(String, String)] {
		&self.edges
	}

	/// Direct dependencies of `name`, in recording order.
	pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
		self.edges
			.iter()
			.filter(|(from, _)| from == name)
			.map(|(_, to)| to.as_str())
			.collect()
	}

	/// Every node that reaches `name` through one or more edges, sorted.
	///
	/// This is exactly the set re-registering `name` invalidates.
	pub fn transitive_dependents(&self, name: &str) -> Vec<String> {
		let mut found = BTreeSet::new();
		let mut pending = vec![name.to_string()];
		while let Some(current) = pending.pop() {
			for (from, to) in &self.edges {
				if *to == current && found.insert(from.clone()) {
					pending.push(from.clone());
				}
			}
		}
		found.remove(name);
		found.into_iter().collect()
	}

	/// Renders the graph in DOT format.
	///
	/// Memoized providers are filled green, uninitialized ones grey.
	pub fn to_dot(&self) -> String {
		let mut output = String::from("digraph Registry {\n");
		output.push_str("  rankdir=LR;\n");
		output.push_str("  node [shape=box, style=rounded];\n\n");

		for node in self.nodes.values() {
			let color = match node.state {
				ProviderState::Memoized => "lightgreen",
				ProviderState::InConstruction => "lightyellow",
				ProviderState::Uninitialized => "lightgrey",
				ProviderState::Unregistered => "white",
			};
			output.push_str(&format!(
				"  \"{}\" [label=\"{}\\n({})\", fillcolor={}, style=filled];\n",
				node.name,
				node.name,
				node.state.as_str(),
				color
			));
		}

		output.push('\n');

		for (from, to) in &self.edges {
			output.push_str(&format!("  \"{}\" -> \"{}\";\n", from, to));
		}

		output.push_str("}\n");
		output
	}

	/// Cycles among the recorded edges.
	///
	/// Only dependencies declared through lazy handles can close a cycle.
	pub fn detect_cycles(&self) -> Vec<Vec<String>> {
		let mut cycles = Vec::new();
		let mut visited = HashSet::new();
		let mut on_stack = HashSet::new();

		for name in self.nodes.keys() {
			if !visited.contains(name) {
				let mut path = Vec::new();
				self.visit(name, &mut visited, &mut on_stack, &mut path, &mut cycles);
			}
		}

		cycles
	}

	fn visit(
		&self,
		node: &str,
		visited: &mut HashSet<String>,
		on_stack: &mut HashSet<String>,
		path: &mut Vec<String>,
		cycles: &mut Vec<Vec<String>>,
	) {
		visited.insert(node.to_string());
		on_stack.insert(node.to_string());
		path.push(node.to_string());

		for dep in self.dependencies_of(node) {
			if !visited.contains(dep) {
				self.visit(dep, visited, on_stack, path, cycles);
			} else if on_stack.contains(dep)
				&& let Some(start) = path.iter().position(|p| p == dep)
			{
				cycles.push(path[start..].to_vec());
			}
		}

		path.pop();
		on_stack.remove(node);
	}

	pub fn statistics(&self) -> GraphStatistics {
		let memoized_count = self
			.nodes
			.values()
			.filter(|n| n.state == ProviderState::Memoized)
			.count();

		GraphStatistics {
			node_count: self.nodes.len(),
			edge_count: self.edges.len(),
			memoized_count,
			uninitialized_count: self.nodes.len() - memoized_count,
		}
	}
}

/// Counts over a [`DependencyGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStatistics {
	pub node_count: usize,
	pub edge_count: usize,
	pub memoized_count: usize,
	/// Registered but not (or no longer) resolved
	pub uninitialized_count: usize,
}
