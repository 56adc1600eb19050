//! Dependency graph construction from candidate tickets.
//!
//! Edges are the union of three fixed rule passes, applied in order:
//! setup-first, file-overlap and type-semantics. Every pass is additive;
//! an edge that already exists keeps the kind of the pass that added it.

use std::collections::{HashMap, HashSet};

use super::keywords::{extract_keywords, shared_keywords};
use super::GraphError;
use crate::ticket::{DependencyEdge, DependencyKind, Ticket, TicketType};

/// Index into the node list.
pub type NodeIndex = usize;

/// Directed graph over ticket ids. An edge `a -> b` means `a` depends on `b`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Ticket ids in insertion order.
    nodes: Vec<String>,
    /// Map from ticket id to index.
    index_map: HashMap<String, NodeIndex>,
    /// Per node, the nodes it depends on, in the order the edges were added.
    edges: Vec<Vec<(NodeIndex, DependencyKind)>>,
}

impl DependencyGraph {
    /// Create a graph with the given nodes and no edges.
    pub fn with_nodes<I, S>(ids: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = Self::default();
        for id in ids {
            let id = id.into();
            if graph.index_map.contains_key(&id) {
                return Err(GraphError::Validation(format!("duplicate ticket id: {}", id)));
            }
            graph.index_map.insert(id.clone(), graph.nodes.len());
            graph.nodes.push(id);
            graph.edges.push(Vec::new());
        }
        Ok(graph)
    }

    /// Build a graph from explicit edges.
    pub fn from_edges<I, S>(ids: I, edges: &[DependencyEdge]) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = Self::with_nodes(ids)?;
        for edge in edges {
            graph.add_edge(&edge.ticket_id, &edge.depends_on_ticket_id, edge.kind)?;
        }
        Ok(graph)
    }

    /// Add `from -> to`. Returns false if the edge already existed.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        kind: DependencyKind,
    ) -> Result<bool, GraphError> {
        let from_idx = self.require(from)?;
        let to_idx = self.require(to)?;
        Ok(self.add_edge_by_index(from_idx, to_idx, kind))
    }

    fn add_edge_by_index(&mut self, from: NodeIndex, to: NodeIndex, kind: DependencyKind) -> bool {
        if from == to || self.edges[from].iter().any(|(dep, _)| *dep == to) {
            return false;
        }
        self.edges[from].push((to, kind));
        true
    }

    fn require(&self, id: &str) -> Result<NodeIndex, GraphError> {
        self.index_map
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::Validation(format!("unknown ticket id: {}", id)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ticket ids in insertion order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &str {
        &self.nodes[index]
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index_map.get(id).copied()
    }

    /// Indices of the nodes `index` depends on.
    pub fn dependency_indices(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.edges
            .get(index)
            .into_iter()
            .flat_map(|deps| deps.iter().map(|(dep, _)| *dep))
    }

    /// Ids of the tickets `id` directly depends on.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        match self.index_of(id) {
            Some(index) => self
                .dependency_indices(index)
                .map(|dep| self.nodes[dep].as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn depends_on(&self, id: &str, dependency: &str) -> bool {
        self.dependencies_of(id).contains(&dependency)
    }

    /// Every id reachable from `id` by following dependency edges.
    pub fn dependency_closure(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let Some(start) = self.index_of(id) else {
            return seen;
        };
        let mut stack: Vec<NodeIndex> = self.dependency_indices(start).collect();
        while let Some(index) = stack.pop() {
            if seen.insert(self.nodes[index].clone()) {
                stack.extend(self.dependency_indices(index));
            }
        }
        seen
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// All edges, grouped by dependent in node order.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.edges
            .iter()
            .enumerate()
            .flat_map(|(from, deps)| {
                deps.iter().map(move |(to, kind)| {
                    DependencyEdge::new(&self.nodes[from], &self.nodes[*to], *kind)
                })
            })
            .collect()
    }
}

/// Per-ticket data the rule passes compare.
struct TicketFacts<'a> {
    ticket_type: TicketType,
    files: HashSet<&'a str>,
    keywords: HashSet<String>,
}

impl<'a> TicketFacts<'a> {
    fn new(ticket: &'a Ticket) -> Self {
        Self {
            ticket_type: ticket.ticket_type,
            files: ticket.file_paths().collect(),
            keywords: extract_keywords(&format!("{} {}", ticket.title, ticket.description)),
        }
    }

    fn shares_file(&self, other: &TicketFacts<'_>) -> bool {
        !self.files.is_disjoint(&other.files)
    }

    /// Tickets are related if they share a file or at least two keywords.
    fn is_related(&self, other: &TicketFacts<'_>) -> bool {
        self.shares_file(other) || shared_keywords(&self.keywords, &other.keywords) >= 2
    }
}

/// Build the dependency graph for a set of candidate tickets.
///
/// Fails with a validation error on duplicate ids or more than one setup
/// ticket.
pub fn build_graph(tickets: &[Ticket]) -> Result<DependencyGraph, GraphError> {
    let mut graph = DependencyGraph::with_nodes(tickets.iter().map(|t| t.id.clone()))?;

    let setup: Vec<NodeIndex> = tickets
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_setup())
        .map(|(i, _)| i)
        .collect();
    if setup.len() > 1 {
        return Err(GraphError::Validation(format!(
            "expected at most one setup ticket, found {}",
            setup.len()
        )));
    }
    let setup = setup.first().copied();

    let facts: Vec<TicketFacts<'_>> = tickets.iter().map(TicketFacts::new).collect();

    // 1. Setup-first.
    if let Some(setup_idx) = setup {
        for i in 0..tickets.len() {
            if i != setup_idx {
                graph.add_edge_by_index(i, setup_idx, DependencyKind::Blocks);
            }
        }
    }

    // 2. File overlap.
    for a in 0..facts.len() {
        for b in 0..facts.len() {
            if a == b || !facts[a].shares_file(&facts[b]) {
                continue;
            }
            let b_precedes_a = Some(b) == setup
                || (facts[b].ticket_type == TicketType::Feature
                    && matches!(
                        facts[a].ticket_type,
                        TicketType::Enhancement | TicketType::Refactor
                    )
                    && facts[a].is_related(&facts[b]));
            if b_precedes_a {
                graph.add_edge_by_index(a, b, DependencyKind::FileConflict);
            }
        }
    }

    // 3. Type semantics.
    for a in 0..facts.len() {
        if !matches!(
            facts[a].ticket_type,
            TicketType::Test | TicketType::Documentation | TicketType::Refactor
        ) {
            continue;
        }
        for b in 0..facts.len() {
            if a != b
                && facts[b].ticket_type == TicketType::Feature
                && facts[a].is_related(&facts[b])
            {
                graph.add_edge_by_index(a, b, DependencyKind::Related);
            }
        }
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{AffectedFile, ChangeKind, Priority};

    fn ticket(title: &str, ticket_type: TicketType, files: &[&str]) -> Ticket {
        let mut t = Ticket::candidate("project", title, "", ticket_type, Priority::Medium);
        t.affected_files = files
            .iter()
            .map(|p| AffectedFile::new(*p, "feature implementation", ChangeKind::Modify))
            .collect();
        t
    }

    #[test]
    fn test_every_ticket_depends_on_setup() {
        let tickets = vec![
            ticket("Setup", TicketType::Setup, &[]),
            ticket("Login", TicketType::Feature, &["src/login.ts"]),
            ticket("Docs", TicketType::Documentation, &[]),
        ];
        let graph = build_graph(&tickets).unwrap();

        assert!(graph.depends_on(&tickets[1].id, &tickets[0].id));
        assert!(graph.depends_on(&tickets[2].id, &tickets[0].id));
        assert!(graph.dependencies_of(&tickets[0].id).is_empty());
    }

    #[test]
    fn test_refactor_sharing_file_depends_on_feature() {
        let tickets = vec![
            ticket("Cleanup", TicketType::Refactor, &["src/cart.ts"]),
            ticket("Cart", TicketType::Feature, &["src/cart.ts"]),
        ];
        let graph = build_graph(&tickets).unwrap();

        assert!(graph.depends_on(&tickets[0].id, &tickets[1].id));
        assert!(!graph.depends_on(&tickets[1].id, &tickets[0].id));
        assert_eq!(graph.edges()[0].kind, DependencyKind::FileConflict);
    }

    #[test]
    fn test_features_sharing_file_are_independent() {
        let tickets = vec![
            ticket("Setup", TicketType::Setup, &[]),
            ticket("Header", TicketType::Feature, &["src/a.ts"]),
            ticket("Footer", TicketType::Feature, &["src/a.ts"]),
        ];
        let graph = build_graph(&tickets).unwrap();

        assert!(!graph.depends_on(&tickets[1].id, &tickets[2].id));
        assert!(!graph.depends_on(&tickets[2].id, &tickets[1].id));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_ticket_sharing_file_with_setup_keeps_blocks_kind() {
        let tickets = vec![
            ticket("Setup", TicketType::Setup, &["package.json"]),
            ticket("Deps", TicketType::Feature, &["package.json"]),
        ];
        let graph = build_graph(&tickets).unwrap();

        let edges = graph.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, DependencyKind::Blocks);
    }

    #[test]
    fn test_test_ticket_related_by_keywords_depends_on_feature() {
        let tickets = vec![
            ticket("Shopping cart totals", TicketType::Feature, &["src/cart.ts"]),
            ticket("Cart totals tests", TicketType::Test, &["tests/cart.test.ts"]),
            ticket("Profile page tests", TicketType::Test, &["tests/profile.test.ts"]),
        ];
        let graph = build_graph(&tickets).unwrap();

        assert!(graph.depends_on(&tickets[1].id, &tickets[0].id));
        assert!(!graph.depends_on(&tickets[2].id, &tickets[0].id));
    }

    #[test]
    fn test_single_shared_keyword_is_not_related() {
        let tickets = vec![
            ticket("Checkout page", TicketType::Feature, &[]),
            ticket("Checkout docs", TicketType::Documentation, &[]),
        ];
        let graph = build_graph(&tickets).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_multiple_setup_tickets_rejected() {
        let tickets = vec![
            ticket("Setup", TicketType::Setup, &[]),
            ticket("Setup again", TicketType::Setup, &[]),
        ];
        assert!(matches!(
            build_graph(&tickets),
            Err(GraphError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let a = ticket("A", TicketType::Feature, &[]);
        let tickets = vec![a.clone(), a];
        assert!(matches!(
            build_graph(&tickets),
            Err(GraphError::Validation(_))
        ));
    }

    #[test]
    fn test_add_edge_ignores_self_and_duplicates() {
        let mut graph = DependencyGraph::with_nodes(["a", "b"]).unwrap();
        assert!(graph.add_edge("a", "b", DependencyKind::Blocks).unwrap());
        assert!(!graph.add_edge("a", "b", DependencyKind::Related).unwrap());
        assert!(!graph.add_edge("a", "a", DependencyKind::Blocks).unwrap());
        assert!(graph.add_edge("a", "zzz", DependencyKind::Blocks).is_err());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_dependency_closure_is_transitive() {
        let edges = vec![
            DependencyEdge::new("c", "b", DependencyKind::Blocks),
            DependencyEdge::new("b", "a", DependencyKind::Blocks),
        ];
        let graph = DependencyGraph::from_edges(["a", "b", "c"], &edges).unwrap();

        let closure = graph.dependency_closure("c");
        assert!(closure.contains("a"));
        assert!(closure.contains("b"));
        assert_eq!(closure.len(), 2);
    }
}
