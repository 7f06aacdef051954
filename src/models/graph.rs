//! Node/edge projection returned by graph extraction queries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A node of an extracted subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Server-assigned node id.
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: Map<String, JsonValue>,
}

/// A relationship of an extracted subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: i64,
    /// Relationship type (e.g. `BROTHER_OF`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Id of the start node.
    pub source: i64,
    /// Id of the end node.
    pub target: i64,
    pub properties: Map<String, JsonValue>,
}

/// Nodes and edges produced by `graph_from_query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphProjection {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphProjection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_serializes_type_field() {
        let edge = GraphEdge {
            id: 3,
            kind: "BROTHER_OF".into(),
            source: 1,
            target: 2,
            properties: Map::new(),
        };
        let value = serde_json::to_value(&edge).unwrap();
        assert_eq!(
            value,
            json!({"id": 3, "type": "BROTHER_OF", "source": 1, "target": 2, "properties": {}})
        );
    }
}
