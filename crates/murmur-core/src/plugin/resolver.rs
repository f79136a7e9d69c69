//! Plugin load-order resolution.
//!
//! Builds a petgraph of plugin dependencies and walks it depth-first with
//! three-color marking. Unlike a strict topological sort this never fails:
//! missing dependencies are skipped and back-edges (cycles) are dropped, both
//! with a warning, yielding a best-effort order in which every present,
//! non-cyclic dependency precedes its dependent.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

/// Dependency declarations of one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginNode {
    pub name: String,
    pub dependencies: Vec<String>,
    pub test_dependencies: Vec<String>,
}

impl PluginNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies.extend(deps.iter().map(|d| d.to_string()));
        self
    }

    pub fn test_depends_on(mut self, deps: &[&str]) -> Self {
        self.test_dependencies
            .extend(deps.iter().map(|d| d.to_string()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepKind {
    Runtime,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Graph of the input plugins. Edges point from a plugin to its dependency.
struct PluginGraph {
    graph: DiGraph<String, DepKind>,
    /// Node indices in input order (duplicates removed, first wins).
    order: Vec<NodeIndex>,
}

impl PluginGraph {
    fn build(nodes: &[PluginNode], include_test: bool) -> Self {
        let mut graph = DiGraph::<String, DepKind>::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        let mut order = Vec::with_capacity(nodes.len());
        let mut declared: Vec<&PluginNode> = Vec::with_capacity(nodes.len());

        for node in nodes {
            if index.contains_key(node.name.as_str()) {
                warn!(plugin = %node.name, "Duplicate plugin in load set, keeping first");
                continue;
            }
            let idx = graph.add_node(node.name.clone());
            index.insert(node.name.as_str(), idx);
            order.push(idx);
            declared.push(node);
        }

        for node in declared {
            let from = index[node.name.as_str()];
            let mut add = |dep: &String, kind: DepKind| match index.get(dep.as_str()) {
                Some(&to) => {
                    graph.add_edge(from, to, kind);
                }
                None => {
                    warn!(
                        plugin = %node.name,
                        dependency = %dep,
                        "Plugin dependency not found in load set, skipping"
                    );
                }
            };
            for dep in &node.dependencies {
                add(dep, DepKind::Runtime);
            }
            if include_test {
                for dep in &node.test_dependencies {
                    add(dep, DepKind::Test);
                }
            }
        }

        Self { graph, order }
    }

    /// Dependencies of `idx` in declaration order (runtime before test).
    fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        // petgraph yields outgoing edges newest first
        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.reverse();
        let mut deps: Vec<NodeIndex> = edges
            .iter()
            .filter(|e| *e.weight() == DepKind::Runtime)
            .map(|e| e.target())
            .collect();
        deps.extend(
            edges
                .iter()
                .filter(|e| *e.weight() == DepKind::Test)
                .map(|e| e.target()),
        );
        deps
    }

    fn visit(&self, idx: NodeIndex, marks: &mut [Mark], out: &mut Vec<String>) {
        match marks[idx.index()] {
            Mark::Visited => return,
            Mark::Visiting => return,
            Mark::Unvisited => {}
        }
        marks[idx.index()] = Mark::Visiting;

        for dep in self.dependencies(idx) {
            if marks[dep.index()] == Mark::Visiting {
                warn!(
                    plugin = %self.graph[idx],
                    dependency = %self.graph[dep],
                    "Circular plugin dependency, dropping edge"
                );
                continue;
            }
            self.visit(dep, marks, out);
        }

        marks[idx.index()] = Mark::Visited;
        out.push(self.graph[idx].clone());
    }
}

/// Order `nodes` so every present dependency loads before its dependent.
///
/// With `include_test` set, test-only dependencies are honored as well.
/// Plugins unreachable from any dependency chain keep their input order.
/// The result contains each distinct input name exactly once.
pub fn resolve_load_order(nodes: &[PluginNode], include_test: bool) -> Vec<String> {
    let graph = PluginGraph::build(nodes, include_test);
    let mut marks = vec![Mark::Unvisited; graph.graph.node_count()];
    let mut out = Vec::with_capacity(graph.order.len());

    for &idx in &graph.order {
        graph.visit(idx, &mut marks, &mut out);
    }

    debug!(order = ?out, "Resolved plugin load order");
    out
}

/// Groups of plugins that depend on each other cyclically.
///
/// Diagnostic only; `resolve_load_order` already tolerates these.
pub fn dependency_cycles(nodes: &[PluginNode], include_test: bool) -> Vec<Vec<String>> {
    let graph = PluginGraph::build(nodes, include_test);
    tarjan_scc(&graph.graph)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1
                || scc
                    .first()
                    .is_some_and(|&n| graph.graph.contains_edge(n, n))
        })
        .map(|scc| {
            let mut names: Vec<String> = scc.iter().map(|&n| graph.graph[n].clone()).collect();
            names.sort();
            names
        })
        .collect()
}
