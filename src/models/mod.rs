//! Domain models: connection configuration and graph projections.

mod connection;
mod graph;

pub use connection::{
    BackendType, ConnectionConfig, ConnectionDocument, Credentials, GremlinConfig, NamedGraph,
    PortValue, PropertyGraphConfig, DEFAULT_GREMLIN_PORT, DEFAULT_NEO4J_PORT,
};
pub use graph::{GraphEdge, GraphNode, GraphProjection};
