//! Workflow edge definitions for connecting nodes.
//!
//! Edges leaving a condition node carry a [`Branch`] tag; every other edge is
//! unconditional.

use serde::{Deserialize, Serialize};

use crate::workflow::node::NodeId;

/// Unique identifier for an edge within a workflow.
pub type EdgeId = String;

/// Branch tag of an edge leaving a condition node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Branch {
    True,
    False,
}

impl From<bool> for Branch {
    fn from(value: bool) -> Self {
        if value { Branch::True } else { Branch::False }
    }
}

/// Runtime edge representation connecting two nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Unique edge identifier.
    pub id: EdgeId,
    /// ID of the source node.
    pub source: NodeId,
    /// ID of the target node.
    pub target: NodeId,
    /// Branch tag, present only on edges leaving a condition node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

impl Edge {
    /// Whether this edge fires given a node's evaluated branch.
    /// Unconditional edges always fire.
    pub fn follows(
        &self,
        taken: Option<Branch>,
    ) -> bool {
        match (self.branch, taken) {
            (None, _) => true,
            (Some(tag), Some(taken)) => tag == taken,
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(branch: Option<Branch>) -> Edge {
        Edge {
            id: "e".to_string(),
            source: "a".to_string(),
            target: "b".to_string(),
            branch,
        }
    }

    #[test]
    fn test_branch_parse() {
        assert_eq!("true".parse::<Branch>().unwrap(), Branch::True);
        assert_eq!("false".parse::<Branch>().unwrap(), Branch::False);
        assert!("maybe".parse::<Branch>().is_err());
        assert_eq!(Branch::from(false), Branch::False);
        assert_eq!(Branch::True.to_string(), "true");
    }

    #[test]
    fn test_follows() {
        assert!(edge(None).follows(None));
        assert!(edge(Some(Branch::True)).follows(Some(Branch::True)));
        assert!(!edge(Some(Branch::True)).follows(Some(Branch::False)));
        assert!(!edge(Some(Branch::False)).follows(None));
    }
}
