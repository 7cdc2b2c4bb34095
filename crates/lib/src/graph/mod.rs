//! Formula dependency graph.
//!
//! Formulas are nodes; each declared dependency becomes an edge from the
//! dependency to its dependent. Edges carry an activation predicate, and only
//! edges whose predicate holds for the resolved options take part in ordering
//! and cycle detection.

pub mod types;

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::options::ResolvedOptions;

pub use types::{Activation, Cycle, DependencyEdge, GraphError, RequiredAt};

/// Dependency graph over declared formulas.
///
/// Node indices follow declaration order, which is what breaks ties in the
/// topological sort.
#[derive(Debug, Default)]
pub struct DependencyGraph {
  graph: DiGraph<String, DependencyEdge>,
  nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
  /// Build a graph from `(formula, dependencies)` declarations, in order.
  ///
  /// # Errors
  ///
  /// Returns `UndeclaredDependency` if an edge names a formula that was not
  /// declared.
  pub fn from_declarations<'a, I>(declarations: I) -> Result<Self, GraphError>
  where
    I: IntoIterator<Item = (&'a str, &'a [DependencyEdge])>,
  {
    let declarations: Vec<_> = declarations.into_iter().collect();
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for (name, _) in &declarations {
      let idx = graph.add_node(name.to_string());
      nodes.insert(name.to_string(), idx);
    }

    for (name, edges) in &declarations {
      let dependent = nodes[*name];
      for edge in edges.iter() {
        let Some(&dependency) = nodes.get(&edge.formula) else {
          return Err(GraphError::UndeclaredDependency {
            dependent: name.to_string(),
            dependency: edge.formula.clone(),
          });
        };
        graph.add_edge(dependency, dependent, edge.clone());
      }
    }

    Ok(Self { graph, nodes })
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Active dependency edges declared by `name`, in declaration order.
  pub fn active_dependencies(&self, name: &str, resolved: &ResolvedOptions) -> Vec<DependencyEdge> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    let mut edges: Vec<_> = self
      .graph
      .edges_directed(idx, Direction::Incoming)
      .filter(|e| e.weight().activation.holds(resolved))
      .map(|e| (e.id(), e.weight().clone()))
      .collect();
    edges.sort_by_key(|(id, _)| *id);
    edges.into_iter().map(|(_, edge)| edge).collect()
  }

  /// Order `root` and everything it transitively depends on through active
  /// edges. Dependencies come first and `root` comes last.
  pub fn order(&self, root: &str, resolved: &ResolvedOptions) -> Result<Vec<String>, GraphError> {
    let &root_idx = self
      .nodes
      .get(root)
      .ok_or_else(|| GraphError::UnknownFormula(root.to_string()))?;

    let mut included = HashSet::new();
    let mut stack = vec![root_idx];
    while let Some(idx) = stack.pop() {
      if !included.insert(idx) {
        continue;
      }
      stack.extend(self.active_sources(idx, resolved));
    }

    self.order_nodes(&included, resolved)
  }

  /// Order every declared formula.
  pub fn order_all(&self, resolved: &ResolvedOptions) -> Result<Vec<String>, GraphError> {
    let included: HashSet<_> = self.graph.node_indices().collect();
    self.order_nodes(&included, resolved)
  }

  fn active_sources<'a>(
    &'a self,
    idx: NodeIndex,
    resolved: &'a ResolvedOptions,
  ) -> impl Iterator<Item = NodeIndex> + 'a {
    self
      .graph
      .edges_directed(idx, Direction::Incoming)
      .filter(move |e| e.weight().activation.holds(resolved))
      .map(|e| e.source())
  }

  /// Kahn's algorithm, always taking the earliest-declared ready node.
  fn order_nodes(&self, included: &HashSet<NodeIndex>, resolved: &ResolvedOptions) -> Result<Vec<String>, GraphError> {
    let mut in_degree: HashMap<NodeIndex, usize> = included.iter().map(|&idx| (idx, 0)).collect();
    for &idx in included {
      let count = self.active_sources(idx, resolved).filter(|s| included.contains(s)).count();
      in_degree.insert(idx, count);
    }

    let mut ready: BTreeSet<NodeIndex> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(i, _)| *i).collect();
    let mut ordered = Vec::with_capacity(included.len());

    while let Some(idx) = ready.pop_first() {
      ordered.push(self.graph[idx].clone());
      for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
        if !edge.weight().activation.holds(resolved) {
          continue;
        }
        if let Some(degree) = in_degree.get_mut(&edge.target()) {
          *degree = degree.saturating_sub(1);
          if *degree == 0 {
            ready.insert(edge.target());
          }
        }
      }
    }

    if ordered.len() < included.len() {
      let done: HashSet<&String> = ordered.iter().collect();
      let remaining: BTreeSet<NodeIndex> = included
        .iter()
        .filter(|idx| !done.contains(&self.graph[**idx]))
        .copied()
        .collect();
      return Err(GraphError::CycleDetected(self.find_cycle(&remaining, resolved)));
    }

    debug!(order = ?ordered, "computed dependency order");
    Ok(ordered)
  }

  /// Walk dependency edges among nodes left over by Kahn's algorithm until a
  /// node repeats. Every leftover node still has a leftover dependency, so the
  /// walk always closes a cycle.
  fn find_cycle(&self, remaining: &BTreeSet<NodeIndex>, resolved: &ResolvedOptions) -> Cycle {
    let mut path: Vec<NodeIndex> = Vec::new();
    let mut position: HashMap<NodeIndex, usize> = HashMap::new();
    let mut current = remaining.first().copied();

    while let Some(idx) = current {
      if let Some(&start) = position.get(&idx) {
        return Cycle(path[start..].iter().map(|i| self.graph[*i].clone()).collect());
      }
      position.insert(idx, path.len());
      path.push(idx);
      current = self.active_sources(idx, resolved).filter(|s| remaining.contains(s)).min();
    }

    Cycle(path.iter().map(|i| self.graph[*i].clone()).collect())
  }
}
