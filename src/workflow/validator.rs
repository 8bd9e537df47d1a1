//! Structural validation of workflow graphs.
//!
//! Validation is fail-fast: checks run in a fixed order and the first
//! violation is returned. The order is
//!
//! 1. dangling edge endpoints, resolved against the declared node ids
//! 2. node structure (unique ids, known kinds, well-formed trigger/action data)
//!    and unique edge ids
//! 3. branch tags (every edge leaving a condition is tagged, at most one edge
//!    per tag, no tags elsewhere)
//! 4. trigger rules (at least one trigger, no incoming edges, at least one
//!    outgoing edge)
//! 5. cycles in the subgraph reachable from a trigger (tri-color DFS)
//!
//! A successful validation yields the runnable [`Workflow`].

use std::collections::{HashMap, HashSet};

use petgraph::{
    Direction,
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};
use tracing::debug;

use crate::{
    ValidationError, ValidationReason, WorkflowModel,
    workflow::{
        Workflow,
        edge::{Branch, Edge},
        node::Node,
    },
};

/// Validate a workflow model and build its runtime graph.
pub fn validate(model: &WorkflowModel) -> std::result::Result<Workflow, ValidationError> {
    let declared: HashSet<&str> = model.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &model.edges {
        if !declared.contains(edge.source.as_str()) {
            return Err(ValidationError::at_edge(ValidationReason::DanglingSource, &edge.id).with_node(&edge.source));
        }
        if !declared.contains(edge.target.as_str()) {
            return Err(ValidationError::at_edge(ValidationReason::DanglingTarget, &edge.id).with_node(&edge.target));
        }
    }

    let mut graph: DiGraph<Node, Edge> = DiGraph::with_capacity(model.nodes.len(), model.edges.len());
    let mut index: HashMap<String, NodeIndex> = HashMap::with_capacity(model.nodes.len());

    for node_model in &model.nodes {
        if index.contains_key(&node_model.id) {
            return Err(ValidationError::at_node(ValidationReason::DuplicateNodeId, &node_model.id));
        }
        let node = Node::try_from(node_model)?;
        let idx = graph.add_node(node);
        index.insert(node_model.id.clone(), idx);
    }

    let mut edge_ids = HashSet::with_capacity(model.edges.len());
    for edge in &model.edges {
        if !edge_ids.insert(edge.id.as_str()) {
            return Err(ValidationError::at_edge(ValidationReason::DuplicateEdgeId, &edge.id));
        }
    }

    let mut seen_branches: HashSet<(NodeIndex, Branch)> = HashSet::new();
    for edge in &model.edges {
        // every endpoint is a declared node id
        let (source, target) = (index[&edge.source], index[&edge.target]);
        let from_condition = graph[source].is_condition();
        let branch = match (&edge.branch, from_condition) {
            (None, false) => None,
            (None, true) => return Err(ValidationError::at_edge(ValidationReason::MissingBranch, &edge.id).with_node(&edge.source)),
            (Some(_), false) => return Err(ValidationError::at_edge(ValidationReason::UnexpectedBranch, &edge.id).with_node(&edge.source)),
            (Some(tag), true) => {
                let branch: Branch = tag.parse().map_err(|_| ValidationError::at_edge(ValidationReason::InvalidBranch(tag.clone()), &edge.id).with_node(&edge.source))?;
                if !seen_branches.insert((source, branch)) {
                    return Err(ValidationError::at_edge(ValidationReason::DuplicateBranch(branch), &edge.id).with_node(&edge.source));
                }
                Some(branch)
            }
        };

        graph.add_edge(
            source,
            target,
            Edge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                branch,
            },
        );
    }

    let triggers: Vec<NodeIndex> = graph.node_indices().filter(|idx| graph[*idx].is_trigger()).collect();
    if triggers.is_empty() {
        return Err(ValidationError::new(ValidationReason::NoTrigger));
    }
    for idx in &triggers {
        if graph.edges_directed(*idx, Direction::Incoming).next().is_some() {
            return Err(ValidationError::at_node(ValidationReason::TriggerHasIncoming, &graph[*idx].id));
        }
        if graph.edges_directed(*idx, Direction::Outgoing).next().is_none() {
            return Err(ValidationError::at_node(ValidationReason::TriggerHasNoOutgoing, &graph[*idx].id));
        }
    }

    if let Some((node, edge)) = find_reachable_cycle(&graph, &triggers) {
        return Err(ValidationError::at_edge(ValidationReason::Cycle, &graph[edge].id).with_node(&graph[node].id));
    }

    debug!(workflow_id = %model.id, nodes = graph.node_count(), edges = graph.edge_count(), "workflow validated");

    Ok(Workflow::from_parts(model.id.clone(), model.name.clone(), model.env.clone(), graph, index))
}

/// Validate without keeping the built graph, for authoring tools.
pub fn validate_workflow(model: &WorkflowModel) -> bool {
    validate(model).is_ok()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

struct Frame {
    node: NodeIndex,
    edges: Vec<(EdgeIndex, NodeIndex)>,
    next: usize,
}

impl Frame {
    fn new(
        graph: &DiGraph<Node, Edge>,
        node: NodeIndex,
    ) -> Self {
        let mut edges: Vec<(EdgeIndex, NodeIndex)> = graph.edges_directed(node, Direction::Outgoing).map(|e| (e.id(), e.target())).collect();
        edges.sort();
        Self {
            node,
            edges,
            next: 0,
        }
    }
}

/// Depth-first search from every root with tri-color marking. Returns the node
/// that closes a cycle and the back edge pointing at it. Nodes not reachable
/// from a root are never visited, so unreachable cycles are accepted.
fn find_reachable_cycle(
    graph: &DiGraph<Node, Edge>,
    roots: &[NodeIndex],
) -> Option<(NodeIndex, EdgeIndex)> {
    let mut color = vec![Color::White; graph.node_count()];

    for root in roots {
        if color[root.index()] != Color::White {
            continue;
        }
        color[root.index()] = Color::Gray;
        let mut stack = vec![Frame::new(graph, *root)];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.edges.len() {
                let (edge, target) = frame.edges[frame.next];
                frame.next += 1;
                match color[target.index()] {
                    Color::Gray => return Some((target, edge)),
                    Color::White => {
                        color[target.index()] = Color::Gray;
                        stack.push(Frame::new(graph, target));
                    }
                    Color::Black => {}
                }
            } else {
                color[frame.node.index()] = Color::Black;
                stack.pop();
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn model(
        nodes: Value,
        edges: Value,
    ) -> WorkflowModel {
        serde_json::from_value(json!({"id": "wf", "nodes": nodes, "edges": edges})).unwrap()
    }

    fn trigger(id: &str) -> Value {
        json!({"id": id, "kind": "trigger", "data": {"type": "manual"}})
    }

    fn action(id: &str) -> Value {
        json!({"id": id, "kind": "action", "data": {"type": "echo"}})
    }

    fn condition(id: &str) -> Value {
        json!({"id": id, "kind": "condition", "data": {"expression": "ok == true"}})
    }

    fn edge(
        id: &str,
        source: &str,
        target: &str,
    ) -> Value {
        json!({"id": id, "source": source, "target": target})
    }

    fn branch(
        id: &str,
        source: &str,
        target: &str,
        tag: &str,
    ) -> Value {
        json!({"id": id, "source": source, "target": target, "branch": tag})
    }

    fn reason(m: &WorkflowModel) -> ValidationReason {
        validate(m).unwrap_err().reason
    }

    #[test]
    fn test_valid_linear_workflow() {
        let m = model(json!([trigger("t"), action("a")]), json!([edge("e1", "t", "a")]));
        let wf = validate(&m).unwrap();
        assert_eq!(wf.id(), "wf");
        assert!(validate_workflow(&m));
    }

    #[test]
    fn test_dangling_target_references_edge() {
        let m = model(json!([trigger("t"), action("a")]), json!([edge("e1", "t", "a"), edge("e2", "a", "ghost")]));
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::DanglingTarget);
        assert_eq!(err.edge_id.as_deref(), Some("e2"));
        assert_eq!(err.node_id.as_deref(), Some("ghost"));
    }

    #[test]
    fn test_dangling_source_references_edge() {
        let m = model(json!([trigger("t"), action("a")]), json!([edge("e1", "t", "a"), edge("e9", "nope", "a")]));
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::DanglingSource);
        assert_eq!(err.edge_id.as_deref(), Some("e9"));
        assert!(!validate_workflow(&m));
    }

    #[test]
    fn test_dangling_edge_reported_before_node_defects() {
        let m = model(
            json!([trigger("t"), {"id": "a", "kind": "action", "data": {}}]),
            json!([edge("e1", "t", "a"), edge("e2", "a", "ghost")]),
        );
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::DanglingTarget);
        assert_eq!(err.edge_id.as_deref(), Some("e2"));

        let m = model(
            json!([trigger("t"), {"id": "x", "kind": "webhook-out", "data": {}}]),
            json!([edge("e1", "t", "x"), edge("e1", "nope", "x")]),
        );
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::DanglingSource);
        assert_eq!(err.edge_id.as_deref(), Some("e1"));
        assert_eq!(err.node_id.as_deref(), Some("nope"));
    }

    #[test]
    fn test_duplicate_ids() {
        let m = model(json!([trigger("t"), action("t")]), json!([]));
        assert_eq!(reason(&m), ValidationReason::DuplicateNodeId);

        let m = model(json!([trigger("t"), action("a")]), json!([edge("e1", "t", "a"), edge("e1", "t", "a")]));
        assert_eq!(reason(&m), ValidationReason::DuplicateEdgeId);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let m = model(json!([trigger("t"), {"id": "x", "kind": "webhook-out", "data": {}}]), json!([edge("e1", "t", "x")]));
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::UnknownKind("webhook-out".to_string()));
        assert_eq!(err.node_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_condition_edges_need_branch() {
        let m = model(json!([trigger("t"), condition("c"), action("a")]), json!([edge("e1", "t", "c"), edge("e2", "c", "a")]));
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::MissingBranch);
        assert_eq!(err.edge_id.as_deref(), Some("e2"));
    }

    #[test]
    fn test_condition_branch_must_be_unique() {
        let m = model(
            json!([trigger("t"), condition("c"), action("a"), action("b")]),
            json!([edge("e1", "t", "c"), branch("e2", "c", "a", "true"), branch("e3", "c", "b", "true")]),
        );
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::DuplicateBranch(Branch::True));
        assert_eq!(err.edge_id.as_deref(), Some("e3"));
    }

    #[test]
    fn test_invalid_and_unexpected_branch_tags() {
        let m = model(json!([trigger("t"), condition("c"), action("a")]), json!([edge("e1", "t", "c"), branch("e2", "c", "a", "maybe")]));
        assert_eq!(reason(&m), ValidationReason::InvalidBranch("maybe".to_string()));

        let m = model(json!([trigger("t"), action("a")]), json!([branch("e1", "t", "a", "true")]));
        assert_eq!(reason(&m), ValidationReason::UnexpectedBranch);
    }

    #[test]
    fn test_condition_with_single_branch_is_valid() {
        let m = model(json!([trigger("t"), condition("c"), action("a")]), json!([edge("e1", "t", "c"), branch("e2", "c", "a", "true")]));
        assert!(validate_workflow(&m));
    }

    #[test]
    fn test_trigger_rules() {
        let m = model(json!([action("a")]), json!([]));
        assert_eq!(reason(&m), ValidationReason::NoTrigger);

        let m = model(json!([trigger("t")]), json!([]));
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::TriggerHasNoOutgoing);
        assert_eq!(err.node_id.as_deref(), Some("t"));

        let m = model(json!([trigger("t"), action("a")]), json!([edge("e1", "t", "a"), edge("e2", "a", "t")]));
        assert_eq!(reason(&m), ValidationReason::TriggerHasIncoming);
    }

    #[test]
    fn test_reachable_cycle_rejected() {
        let m = model(
            json!([trigger("t"), action("a"), action("b")]),
            json!([edge("e1", "t", "a"), edge("e2", "a", "b"), edge("e3", "b", "a")]),
        );
        let err = validate(&m).unwrap_err();
        assert_eq!(err.reason, ValidationReason::Cycle);
        assert_eq!(err.edge_id.as_deref(), Some("e3"));
        assert_eq!(err.node_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_cycle_through_condition_rejected() {
        let m = model(
            json!([trigger("t"), condition("c"), action("a")]),
            json!([edge("e1", "t", "c"), branch("e2", "c", "a", "false"), edge("e3", "a", "c")]),
        );
        assert_eq!(reason(&m), ValidationReason::Cycle);
    }

    #[test]
    fn test_unreachable_cycle_accepted() {
        let m = model(
            json!([trigger("t"), action("a"), action("x"), action("y")]),
            json!([edge("e1", "t", "a"), edge("e2", "x", "y"), edge("e3", "y", "x")]),
        );
        assert!(validate_workflow(&m));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let m = model(
            json!([trigger("t"), action("a"), action("b"), action("d")]),
            json!([edge("e1", "t", "a"), edge("e2", "t", "b"), edge("e3", "a", "d"), edge("e4", "b", "d")]),
        );
        assert!(validate_workflow(&m));
    }

    #[test]
    fn test_first_violation_wins() {
        // dangling edge is checked before the missing branch tag
        let m = model(
            json!([trigger("t"), condition("c"), action("a")]),
            json!([edge("e1", "t", "c"), edge("e2", "c", "a"), edge("e3", "a", "ghost")]),
        );
        assert_eq!(reason(&m), ValidationReason::DanglingTarget);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let bad = model(json!([trigger("t"), action("a")]), json!([edge("e1", "t", "a"), edge("e2", "a", "a")]));
        assert_eq!(validate(&bad).unwrap_err(), validate(&bad).unwrap_err());

        let good = model(json!([trigger("t"), action("a")]), json!([edge("e1", "t", "a")]));
        assert_eq!(validate_workflow(&good), validate_workflow(&good));
    }
}
