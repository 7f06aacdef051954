//! Query builder for fluent query construction.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::graph::row::{QueryResult, Row, Table};
use crate::graph::traits::{GraphDataSource, QueryRequest};
use crate::models::GraphProjection;

/// A builder for constructing and executing queries.
///
/// `Query` provides a fluent API for adding parameters and options and
/// executing queries against any [`GraphDataSource`].
///
/// # Example
///
/// ```ignore
/// let rows = Query::new(&source, "MATCH (n:Alchemist {name: $name}) RETURN n")
///     .param("name", "Alphonse")
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, S: GraphDataSource + ?Sized> {
    source: &'a S,
    request: QueryRequest,
    error: Option<AppError>,
}

impl<'a, S: GraphDataSource + ?Sized> Query<'a, S> {
    /// Creates a new query builder.
    pub fn new(source: &'a S, query: &str) -> Self {
        Self {
            source,
            request: QueryRequest::new(query),
            error: None,
        }
    }

    /// Adds a parameter to the query.
    ///
    /// Parameters are referenced in Cypher using `$name` syntax. A value that
    /// cannot be serialized is reported when the query is executed.
    pub fn param<T: Serialize>(mut self, name: &str, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(json_value) => {
                self.request.params.insert(name.to_string(), json_value);
            }
            Err(e) => {
                self.error.get_or_insert(AppError::Validation(format!(
                    "parameter '{}' is not serializable: {}",
                    name, e
                )));
            }
        }
        self
    }

    /// Adds a parameter that's already a JSON value.
    pub fn param_raw(mut self, name: &str, value: JsonValue) -> Self {
        self.request.params.insert(name.to_string(), value);
        self
    }

    /// Targets a specific graph instead of the default one.
    pub fn graph(mut self, graph: &str) -> Self {
        self.request.graph = Some(graph.to_string());
        self
    }

    /// Runs the query in a read-write transaction.
    pub fn write(mut self) -> Self {
        self.request.write = true;
        self
    }

    /// Returns the request this builder would send.
    pub fn into_request(self) -> Result<QueryRequest, AppError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.request),
        }
    }

    /// Executes the query as built.
    pub async fn execute(self) -> Result<QueryResult, AppError> {
        let source = self.source;
        source.run_query(self.into_request()?).await
    }

    /// Executes the query and returns its records.
    pub async fn fetch_all(self) -> Result<Vec<Row>, AppError> {
        self.execute().await?.into_records()
    }

    /// Executes the query and returns the first record, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, AppError> {
        Ok(self.fetch_all().await?.into_iter().next())
    }

    /// Executes the query and returns the result as a table.
    pub async fn fetch_table(mut self) -> Result<Table, AppError> {
        self.request.as_table = true;
        self.execute().await?.into_table()
    }

    /// Executes the query and returns the raw response values.
    pub async fn fetch_values(self) -> Result<Vec<JsonValue>, AppError> {
        Ok(self.execute().await?.into_values())
    }

    /// Executes the query through the backend's graph extraction.
    pub async fn extract_graph(self) -> Result<GraphProjection, AppError> {
        let source = self.source;
        let request = self.into_request()?;
        source
            .graph_from_query(&request.query, request.params, request.graph.as_deref())
            .await
    }
}

/// Extension trait providing a convenient `query()` method.
///
/// This trait is automatically implemented for all sized [`GraphDataSource`]
/// types; trait objects get the same method inherently.
pub trait QueryExt: GraphDataSource {
    /// Creates a new query builder for this data source.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use graphbridge::graph::QueryExt;
    ///
    /// let rows = source.query("MATCH (n) RETURN n LIMIT $limit")
    ///     .param("limit", 10)
    ///     .fetch_all()
    ///     .await?;
    /// ```
    fn query(&self, query: &str) -> Query<'_, Self>
    where
        Self: Sized,
    {
        Query::new(self, query)
    }
}

// Blanket implementation for all GraphDataSource types
impl<S: GraphDataSource> QueryExt for S {}

impl dyn GraphDataSource {
    /// Creates a new query builder for this data source.
    pub fn query(&self, query: &str) -> Query<'_, dyn GraphDataSource> {
        Query::new(self, query)
    }
}
