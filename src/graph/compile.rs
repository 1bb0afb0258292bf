// src/graph/compile.rs

//! Topological ordering of a workflow graph.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use super::model::{Edge, WorkflowGraph};
use crate::errors::GraphError;

/// Execution order plus the fan-in index the resolver works from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledOrder {
    /// Node ids, every edge source before its target.
    pub order: Vec<String>,

    /// Edges keyed by target id, in edge insertion order. Edges with unknown
    /// endpoints are not present.
    pub incoming: HashMap<String, Vec<Edge>>,
}

impl CompiledOrder {
    pub fn incoming(&self, node_id: &str) -> &[Edge] {
        self.incoming
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn position(&self, node_id: &str) -> Option<usize> {
        self.order.iter().position(|id| id == node_id)
    }
}

/// Order the nodes of `graph` with Kahn's algorithm.
///
/// - The ready queue is seeded in node insertion order and successors are
///   visited in edge insertion order, so the result is deterministic.
/// - Edges naming an unknown node are dropped with a warning.
/// - If nodes remain once the queue drains, they are reported (in insertion
///   order) as [`GraphError::CyclicGraph`].
pub fn compile(graph: &WorkflowGraph) -> Result<CompiledOrder, GraphError> {
    if graph.is_empty() {
        return Err(GraphError::EmptyGraph);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(GraphError::DuplicateNodeId(node.id.clone()));
        }
    }

    // Edge direction: source -> target.
    let mut dag: DiGraphMap<&str, ()> = DiGraphMap::new();
    for node in &graph.nodes {
        dag.add_node(node.id.as_str());
    }

    let mut incoming: HashMap<String, Vec<Edge>> = HashMap::new();
    for edge in &graph.edges {
        let (source, target) = (edge.source.as_str(), edge.target.as_str());
        if !dag.contains_node(source) || !dag.contains_node(target) {
            warn!(
                source = %source,
                target = %target,
                "discarding edge with unknown endpoint"
            );
            continue;
        }
        dag.add_edge(source, target, ());
        incoming
            .entry(edge.target.clone())
            .or_default()
            .push(edge.clone());
    }

    let mut in_degree: HashMap<&str, usize> =
        dag.nodes().map(|node| (node, 0)).collect();
    for (_, target, _) in dag.all_edges() {
        if let Some(d) = in_degree.get_mut(target) {
            *d += 1;
        }
    }

    let mut ready: VecDeque<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(graph.nodes.len());
    while let Some(current) = ready.pop_front() {
        order.push(current.to_string());
        for next in dag.neighbors_directed(current, Direction::Outgoing) {
            if let Some(d) = in_degree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    ready.push_back(next);
                }
            }
        }
    }

    if order.len() != graph.nodes.len() {
        let done: HashSet<&str> = order.iter().map(String::as_str).collect();
        let remaining: Vec<String> = graph
            .nodes
            .iter()
            .filter(|n| !done.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        return Err(GraphError::CyclicGraph(remaining));
    }

    debug!(?order, "compiled execution order");
    Ok(CompiledOrder { order, incoming })
}
