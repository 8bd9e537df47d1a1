//! Runtime workflow representation using a directed graph.
//!
//! A [`Workflow`] is an immutable, validated snapshot of a workflow model. It
//! stores nodes and edges in a petgraph arena with an id → index map, and the
//! outgoing adjacency of every node is computed once at construction so the
//! scheduler never scans the edge list during traversal.
//!
//! The only way to obtain a `Workflow` is through
//! [`validate`](crate::workflow::validator::validate), so holding one is proof
//! that the graph passed validation.

use std::{collections::HashMap, sync::Arc};

use petgraph::{
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};

use crate::workflow::{
    edge::Edge,
    node::{Node, NodeId},
};

#[derive(Debug, Clone)]
pub struct Workflow {
    id: String,
    name: String,
    env: Arc<HashMap<String, String>>,
    graph: DiGraph<Node, Edge>,
    index: HashMap<NodeId, NodeIndex>,
    /// outgoing edges per node, in declaration order
    outgoing: Vec<Vec<EdgeIndex>>,
    triggers: Vec<NodeIndex>,
}

impl Workflow {
    pub(crate) fn from_parts(
        id: String,
        name: String,
        env: HashMap<String, String>,
        graph: DiGraph<Node, Edge>,
        index: HashMap<NodeId, NodeIndex>,
    ) -> Self {
        let mut outgoing = vec![Vec::new(); graph.node_count()];
        for edge in graph.edge_references() {
            outgoing[edge.source().index()].push(edge.id());
        }
        for edges in outgoing.iter_mut() {
            edges.sort();
        }

        let triggers = graph.node_indices().filter(|idx| graph[*idx].is_trigger()).collect();

        Self {
            id,
            name,
            env: Arc::new(env),
            graph,
            index,
            outgoing,
            triggers,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Environment variables available to templates and conditions.
    pub fn env(&self) -> &Arc<HashMap<String, String>> {
        &self.env
    }

    /// get node by id
    pub fn node(
        &self,
        id: &str,
    ) -> Option<&Node> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All trigger nodes, the execution roots.
    pub fn triggers(&self) -> impl Iterator<Item = &Node> {
        self.triggers.iter().map(|idx| &self.graph[*idx])
    }

    /// Outgoing edges of a node with their target nodes.
    pub fn children(
        &self,
        id: &str,
    ) -> Vec<(&Edge, &Node)> {
        match self.index.get(id) {
            Some(idx) => self.outgoing(*idx).map(|(edge, target)| (edge, &self.graph[target])).collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn index_of(
        &self,
        id: &str,
    ) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(
        &self,
        idx: NodeIndex,
    ) -> &Node {
        &self.graph[idx]
    }

    pub(crate) fn trigger_indices(&self) -> &[NodeIndex] {
        &self.triggers
    }

    pub(crate) fn outgoing(
        &self,
        idx: NodeIndex,
    ) -> impl Iterator<Item = (&Edge, NodeIndex)> + '_ {
        self.outgoing[idx.index()].iter().map(move |e| {
            let target = self.graph.edge_endpoints(*e).map(|(_, t)| t).unwrap_or(idx);
            (&self.graph[*e], target)
        })
    }

    /// Output a human-readable representation of the workflow graph
    pub fn schema(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("=== Workflow {} ===", self.id));
        lines.push(format!("Nodes: {}, Edges: {}", self.graph.node_count(), self.graph.edge_count()));
        lines.push(String::new());

        lines.push("--- Nodes ---".to_string());
        for node in self.graph.node_weights() {
            lines.push(format!("[{}] {} (kind: {})", node.id, node.label, node.kind()));
        }
        lines.push(String::new());

        lines.push("--- Edges ---".to_string());
        for edge in self.graph.edge_weights() {
            let handle = edge.branch.map(|b| b.to_string()).unwrap_or_else(|| "always".to_string());
            lines.push(format!("{} --[{}]--> {} (id: {})", edge.source, handle, edge.target, edge.id));
        }
        lines.push(String::new());

        lines.push("--- Graph Structure ---".to_string());
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            let outgoing: Vec<String> = self
                .outgoing(idx)
                .map(|(edge, target)| match edge.branch {
                    Some(branch) => format!("{}({})", self.graph[target].id, branch),
                    None => self.graph[target].id.clone(),
                })
                .collect();

            if outgoing.is_empty() {
                lines.push(format!("{} -> (end)", node.id));
            } else {
                lines.push(format!("{} -> {}", node.id, outgoing.join(", ")));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{WorkflowModel, workflow::validator::validate};

    fn workflow() -> crate::Workflow {
        let model: WorkflowModel = serde_json::from_value(json!({
            "id": "wf",
            "nodes": [
                {"id": "t", "kind": "trigger", "data": {"type": "manual"}},
                {"id": "c", "kind": "condition", "data": {"expression": "ok"}},
                {"id": "x", "kind": "action", "data": {"type": "echo"}},
                {"id": "y", "kind": "action", "data": {"type": "echo"}}
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "c"},
                {"id": "e2", "source": "c", "target": "x", "branch": "true"},
                {"id": "e3", "source": "c", "target": "y", "branch": "false"}
            ]
        }))
        .unwrap();
        validate(&model).unwrap()
    }

    #[test]
    fn test_children_in_declaration_order() {
        let wf = workflow();
        let children: Vec<&str> = wf.children("c").into_iter().map(|(_, n)| n.id.as_str()).collect();
        assert_eq!(children, vec!["x", "y"]);
        assert!(wf.children("missing").is_empty());
    }

    #[test]
    fn test_triggers_and_lookup() {
        let wf = workflow();
        let triggers: Vec<&str> = wf.triggers().map(|n| n.id.as_str()).collect();
        assert_eq!(triggers, vec!["t"]);
        assert_eq!(wf.node("x").map(|n| n.id.as_str()), Some("x"));
        assert_eq!(wf.node_count(), 4);
        assert_eq!(wf.edge_count(), 3);
        assert!(wf.index_of("c").is_some());
    }

    #[test]
    fn test_schema_lists_branches() {
        let schema = workflow().schema();
        assert!(schema.contains("c -> x(true), y(false)"));
        assert!(schema.contains("x -> (end)"));
    }
}
