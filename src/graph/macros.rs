//! Macro for convenient query construction.

/// Macro for inline queries with optional parameters.
///
/// Shorthand for `source.query(..).param(..)` chains. Works with concrete
/// data sources and with `Arc<dyn GraphDataSource>`.
///
/// # Usage
///
/// ```ignore
/// use graphbridge::graph_query;
///
/// // Query without parameters
/// let rows = graph_query!(source, "MATCH (n) RETURN n").fetch_all().await?;
///
/// // Query with parameters
/// let rows = graph_query!(
///     source,
///     "MATCH (n:Alchemist {name: $name}) RETURN n",
///     name = "Alphonse"
/// )
/// .fetch_all()
/// .await?;
/// ```
#[macro_export]
macro_rules! graph_query {
    // Query without parameters
    ($source:expr, $query:expr) => {
        $source.query($query)
    };
    // Query with parameters
    ($source:expr, $query:expr, $($name:ident = $value:expr),+ $(,)?) => {
        $source.query($query)$(.param(stringify!($name), $value))+
    };
}
