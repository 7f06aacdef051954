//! Backend implementations for different graph databases.
//!
//! Each backend implements [`GraphDataSource`](crate::graph::GraphDataSource).
//!
//! | Backend | Module | Query language |
//! |---------|--------|----------------|
//! | Neo4j | [`neo4j`] | Cypher |
//! | JanusGraph, CosmosDB | [`gremlin`] | Gremlin |

pub mod gremlin;
pub mod neo4j;

pub use gremlin::GremlinDataSource;
pub use neo4j::Neo4jDataSource;
