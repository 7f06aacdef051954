//! Query and extract command handlers.

use color_eyre::Result;
use serde_json::Value as JsonValue;

use crate::connection::ConnectionManager;

use super::output::{print_json, print_table};
use super::App;

impl App {
    /// Run a query and print its result.
    pub async fn run_query(
        &self,
        query: &str,
        params: &[(String, JsonValue)],
        graph: Option<&str>,
        write: bool,
        table: bool,
    ) -> Result<()> {
        let manager = ConnectionManager::global()?;
        let source = manager.get_graph_data_source().await?;

        let mut builder = source.query(query);
        for (name, value) in params {
            builder = builder.param_raw(name, value.clone());
        }
        if let Some(graph) = graph {
            builder = builder.graph(graph);
        }
        if write {
            builder = builder.write();
        }

        if table {
            print_table(&builder.fetch_table().await?);
        } else {
            print_json(&builder.execute().await?)?;
        }

        Ok(())
    }

    /// Run a query through graph extraction and print the projection.
    pub async fn run_extract(
        &self,
        query: &str,
        params: &[(String, JsonValue)],
        graph: Option<&str>,
    ) -> Result<()> {
        let manager = ConnectionManager::global()?;
        let source = manager.get_graph_data_source().await?;

        let mut builder = source.query(query);
        for (name, value) in params {
            builder = builder.param_raw(name, value.clone());
        }
        if let Some(graph) = graph {
            builder = builder.graph(graph);
        }

        let projection = builder.extract_graph().await?;
        tracing::info!(
            "Extracted {} nodes and {} edges",
            projection.nodes.len(),
            projection.edges.len()
        );
        print_json(&projection)?;

        Ok(())
    }
}
