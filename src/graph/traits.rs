//! Core trait for graph database abstraction.
//!
//! Every backend exposes the same capability set through
//! [`GraphDataSource`]; callers hold an `Arc<dyn GraphDataSource>` handed out
//! by the [`ConnectionManager`](crate::connection::ConnectionManager) and
//! never inspect which backend is behind it.

use async_trait::async_trait;

use crate::error::AppError;
use crate::graph::row::{Params, QueryResult};
use crate::models::{BackendType, GraphProjection};

/// A query together with its execution options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// Query text in the backend's language (Cypher or Gremlin).
    pub query: String,
    /// Parameters bound to the query.
    pub params: Params,
    /// Target graph; the backend's default graph when `None`.
    pub graph: Option<String>,
    /// Run in a read-write transaction instead of a read-only one.
    pub write: bool,
    /// Return a [`Table`](crate::graph::Table) instead of records.
    pub as_table: bool,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Uniform access to a connected graph database.
///
/// # Errors
///
/// Implementations map backend failures onto the shared taxonomy:
/// server-rejected queries become [`AppError::Query`], transport and driver
/// faults become [`AppError::Internal`], and capabilities a backend lacks
/// become [`AppError::Unsupported`].
#[async_trait]
pub trait GraphDataSource: Send + Sync {
    /// Which backend this data source talks to.
    fn backend_type(&self) -> BackendType;

    /// Name of the graph used when a query does not name one.
    async fn get_default_graph(&self) -> Result<String, AppError>;

    /// Names of every graph reachable through this data source.
    async fn get_graphs(&self) -> Result<Vec<String>, AppError>;

    /// Executes a query and materializes the full response.
    async fn run_query(&self, request: QueryRequest) -> Result<QueryResult, AppError>;

    /// Executes a query and reshapes its result into nodes and edges.
    async fn graph_from_query(
        &self,
        query: &str,
        params: Params,
        graph: Option<&str>,
    ) -> Result<GraphProjection, AppError>;

    /// Lightweight round-trip proving the server is reachable.
    async fn health_check(&self) -> Result<(), AppError>;

    /// Releases the driver resources. Calling it more than once is a no-op.
    async fn close(&self);
}
