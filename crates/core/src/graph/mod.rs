//! Dependency graph engine: builds the ticket graph, detects cycles, orders
//! tickets and finds the critical path.

mod analysis;
mod builder;
mod keywords;

use thiserror::Error;

pub use analysis::{
    analyze_dependencies, critical_path, detect_cycles, topological_sort, DependencyAnalysis,
};
pub use builder::{build_graph, DependencyGraph, NodeIndex};
pub use keywords::{extract_keywords, shared_keywords};

/// Errors from graph construction and ordering.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("invalid dependency graph: {0}")]
    Validation(String),

    #[error("cyclic dependency detected: {}", format_cycles(.cycles))]
    CyclicDependency { cycles: Vec<Vec<String>> },
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| cycle.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_message() {
        let err = GraphError::CyclicDependency {
            cycles: vec![vec!["a".into(), "b".into(), "a".into()]],
        };
        assert_eq!(err.to_string(), "cyclic dependency detected: a -> b -> a");
    }
}
