//! petgraph-based dependency graph over sibling steps.
//!
//! An edge runs from the step returning a value to every later sibling that
//! takes it as input, either as a value-less parameter or through a `$name`
//! reference. Scope is forward-only, so the graph is acyclic by construction.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::types::{StepDefinition, StepKind};

pub struct DependencyGraph<'a> {
    /// Node weights are the steps, edge weights the value passed along.
    pub graph: DiGraph<&'a StepDefinition, String>,
    pub node_indices: HashMap<&'a str, NodeIndex>,
}

/// Names a step takes from its scope.
fn consumed(step: &StepDefinition) -> Vec<&str> {
    let mut refs: Vec<&str> = Vec::new();
    for p in &step.parameters {
        match &p.value {
            None => refs.push(&p.name),
            Some(value) => refs.extend(value.parameter_references()),
        }
    }
    if let StepKind::Resource { state, .. } = &step.kind {
        for value in state.values() {
            refs.extend(value.parameter_references());
        }
    }

    let mut names: Vec<&str> = Vec::with_capacity(refs.len());
    for r in refs {
        if !names.contains(&r) {
            names.push(r);
        }
    }
    names
}

impl<'a> DependencyGraph<'a> {
    pub fn build(steps: &'a [StepDefinition]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut producers: HashMap<&'a str, NodeIndex> = HashMap::new();

        for step in steps {
            let idx = graph.add_node(step);
            node_indices.insert(step.identifier.as_str(), idx);

            for name in consumed(step) {
                if let Some(&producer) = producers.get(name) {
                    graph.add_edge(producer, idx, name.to_string());
                }
            }
            for r in &step.returns {
                producers.insert(r.name.as_str(), idx);
            }
        }

        DependencyGraph {
            graph,
            node_indices,
        }
    }

    /// Steps in an order that runs every producer before its consumers.
    /// Independent steps keep their source order.
    pub fn execution_order(&self) -> Vec<&'a StepDefinition> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(idx) = ready.pop_first() {
            order.push(self.graph[idx]);
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = edge.target();
                in_degree[target.index()] -= 1;
                if in_degree[target.index()] == 0 {
                    ready.insert(target);
                }
            }
        }
        order
    }

    /// Steps grouped by depth: every step of a level depends only on steps
    /// of earlier levels, so each level may run concurrently.
    pub fn levels(&self) -> Vec<Vec<&'a StepDefinition>> {
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        let mut levels: Vec<Vec<&'a StepDefinition>> = Vec::new();

        for step in self.execution_order() {
            let idx = self.node_indices[step.identifier.as_str()];
            let level = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .filter_map(|p| depth.get(&p).map(|d| d + 1))
                .max()
                .unwrap_or(0);
            depth.insert(idx, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(step);
        }
        levels
    }

    /// Direct producers of the step `identifier`, in source order.
    pub fn dependencies(&self, identifier: &str) -> Vec<&'a StepDefinition> {
        let Some(&idx) = self.node_indices.get(identifier) else {
            return Vec::new();
        };
        let producers: BTreeSet<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        producers.into_iter().map(|p| self.graph[p]).collect()
    }
}
