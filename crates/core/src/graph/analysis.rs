//! Cycle detection, ordering and critical path over a `DependencyGraph`.

use std::collections::HashMap;

use super::builder::{build_graph, DependencyGraph, NodeIndex};
use super::GraphError;
use crate::ticket::Ticket;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find every cycle reachable by a depth-first scan of the graph.
///
/// Roots are visited in node insertion order. Each cycle is reported as the
/// path slice from the first occurrence of the repeated node through the
/// closing repeat, so `[a, b, c, a]` for `a -> b -> c -> a`.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    fn visit(
        graph: &DependencyGraph,
        node: NodeIndex,
        colors: &mut [Color],
        path: &mut Vec<NodeIndex>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        colors[node] = Color::Gray;
        path.push(node);

        for dep in graph.dependency_indices(node) {
            match colors[dep] {
                Color::White => visit(graph, dep, colors, path, cycles),
                Color::Gray => {
                    if let Some(start) = path.iter().position(|&n| n == dep) {
                        let mut cycle: Vec<String> = path[start..]
                            .iter()
                            .map(|&n| graph.node(n).to_string())
                            .collect();
                        cycle.push(graph.node(dep).to_string());
                        cycles.push(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors[node] = Color::Black;
    }

    let mut colors = vec![Color::White; graph.len()];
    let mut path = Vec::new();
    let mut cycles = Vec::new();

    for root in 0..graph.len() {
        if colors[root] == Color::White {
            visit(graph, root, &mut colors, &mut path, &mut cycles);
        }
    }

    cycles
}

fn ensure_acyclic(graph: &DependencyGraph) -> Result<(), GraphError> {
    let cycles = detect_cycles(graph);
    if cycles.is_empty() {
        Ok(())
    } else {
        Err(GraphError::CyclicDependency { cycles })
    }
}

/// Order tickets so every dependency precedes its dependents.
///
/// Fails with `CyclicDependency` rather than returning a partial order.
/// Ties follow node insertion order.
pub fn topological_sort(graph: &DependencyGraph) -> Result<Vec<String>, GraphError> {
    ensure_acyclic(graph)?;
    Ok(post_order(graph))
}

fn post_order(graph: &DependencyGraph) -> Vec<String> {
    fn visit(graph: &DependencyGraph, node: NodeIndex, visited: &mut [bool], out: &mut Vec<String>) {
        visited[node] = true;
        for dep in graph.dependency_indices(node) {
            if !visited[dep] {
                visit(graph, dep, visited, out);
            }
        }
        out.push(graph.node(node).to_string());
    }

    let mut visited = vec![false; graph.len()];
    let mut out = Vec::with_capacity(graph.len());
    for node in 0..graph.len() {
        if !visited[node] {
            visit(graph, node, &mut visited, &mut out);
        }
    }
    out
}

/// Longest dependency chain, measured in tickets, in execution order
/// (deepest dependency first).
///
/// Ties keep the first chain found under node insertion order.
pub fn critical_path(graph: &DependencyGraph) -> Result<Vec<String>, GraphError> {
    ensure_acyclic(graph)?;
    Ok(longest_chain(graph))
}

fn longest_chain(graph: &DependencyGraph) -> Vec<String> {
    /// Longest chain starting at `node` and following dependency edges.
    fn chain_from(
        graph: &DependencyGraph,
        node: NodeIndex,
        memo: &mut HashMap<NodeIndex, Vec<NodeIndex>>,
    ) -> Vec<NodeIndex> {
        if let Some(chain) = memo.get(&node) {
            return chain.clone();
        }

        let mut best: Vec<NodeIndex> = Vec::new();
        for dep in graph.dependency_indices(node) {
            let candidate = chain_from(graph, dep, memo);
            if candidate.len() > best.len() {
                best = candidate;
            }
        }

        let mut chain = Vec::with_capacity(best.len() + 1);
        chain.push(node);
        chain.extend(best);
        memo.insert(node, chain.clone());
        chain
    }

    let mut memo = HashMap::new();
    let mut longest: Vec<NodeIndex> = Vec::new();
    for node in 0..graph.len() {
        let chain = chain_from(graph, node, &mut memo);
        if chain.len() > longest.len() {
            longest = chain;
        }
    }

    longest
        .into_iter()
        .rev()
        .map(|n| graph.node(n).to_string())
        .collect()
}

/// Result of `analyze_dependencies`.
#[derive(Debug, Clone)]
pub struct DependencyAnalysis {
    pub graph: DependencyGraph,
    /// Ticket ids in execution order; empty when cyclic.
    pub sorted_tickets: Vec<String>,
    /// Empty when cyclic.
    pub critical_path: Vec<String>,
    pub has_circular_dependencies: bool,
    pub cycles: Vec<Vec<String>>,
}

/// Build the graph, then order it and find its critical path if it is
/// acyclic.
pub fn analyze_dependencies(tickets: &[Ticket]) -> Result<DependencyAnalysis, GraphError> {
    let graph = build_graph(tickets)?;
    let cycles = detect_cycles(&graph);

    if !cycles.is_empty() {
        return Ok(DependencyAnalysis {
            graph,
            sorted_tickets: Vec::new(),
            critical_path: Vec::new(),
            has_circular_dependencies: true,
            cycles,
        });
    }

    let sorted_tickets = post_order(&graph);
    let critical_path = longest_chain(&graph);

    Ok(DependencyAnalysis {
        graph,
        sorted_tickets,
        critical_path,
        has_circular_dependencies: false,
        cycles,
    })
}
