//! Graph abstraction layer for backend-agnostic database access.
//!
//! Every backend implements [`GraphDataSource`], so the same calling code
//! works against Neo4j and Gremlin servers (JanusGraph, CosmosDB) alike.
//!
//! # Usage
//!
//! ```ignore
//! use graphbridge::graph::QueryExt;
//!
//! // Records from the default graph
//! let rows = source.query("MATCH (n:Alchemist) RETURN n")
//!     .fetch_all()
//!     .await?;
//!
//! // Tabular result from a named graph
//! let table = source.query("MATCH (n:Alchemist) WHERE n.name = $name RETURN n.name AS name")
//!     .param("name", "Alphonse")
//!     .graph("amestris")
//!     .fetch_table()
//!     .await?;
//!
//! // Write query
//! source.query("CREATE (n:Alchemist {name: $name})")
//!     .param("name", "Edward")
//!     .write()
//!     .execute()
//!     .await?;
//! ```

mod macros;
mod query;
mod row;
mod traits;

pub mod backends;

// Re-export core types
pub use query::{Query, QueryExt};
pub use row::{Params, QueryResult, Row, Table};
pub use traits::{GraphDataSource, QueryRequest};

// Re-export macro (defined at crate root via #[macro_export])
#[doc(inline)]
pub use crate::graph_query;
