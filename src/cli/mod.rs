//! CLI module for graphbridge.
//!
//! Subcommands:
//! - `check`: Build the configured data source and probe it
//! - `graphs`: List the graphs reachable through the data source
//! - `query`: Run a query and print the result
//! - `extract`: Run a query through graph extraction (Neo4j only)

mod check;
mod output;
mod query;

use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;

use crate::connection::ConnectionManager;

/// graphbridge - one query interface over Neo4j and Gremlin servers
#[derive(Parser)]
#[command(name = "graphbridge")]
#[command(about = "Query Neo4j, JanusGraph and CosmosDB through one connection manager")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the data source from the stored connection and run a health check
    Check,

    /// List the graphs (databases) reachable through the data source
    Graphs,

    /// Run a query against the data source
    Query {
        /// Query text (Cypher or Gremlin, depending on the backend)
        query: String,

        /// Query parameter as name=value; values are parsed as JSON, else taken as strings
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, JsonValue)>,

        /// Target graph instead of the default one
        #[arg(short, long)]
        graph: Option<String>,

        /// Run in a read-write transaction
        #[arg(long)]
        write: bool,

        /// Print the result as a table
        #[arg(long)]
        table: bool,
    },

    /// Run a query through graph extraction and print nodes and edges
    Extract {
        /// Cypher query whose result is extracted
        query: String,

        /// Query parameter as name=value
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, JsonValue)>,

        /// Target graph instead of the default one
        #[arg(short, long)]
        graph: Option<String>,
    },
}

impl App {
    /// Run the CLI application.
    ///
    /// The process-wide connection is torn down afterwards, whether the
    /// command succeeded or not.
    pub async fn run(self) -> color_eyre::Result<()> {
        let result = self.dispatch().await;
        ConnectionManager::evict_singleton_instance().await;
        result
    }

    async fn dispatch(&self) -> color_eyre::Result<()> {
        match self.command {
            Command::Check => self.run_check().await,
            Command::Graphs => self.run_graphs().await,
            Command::Query {
                ref query,
                ref params,
                ref graph,
                write,
                table,
            } => {
                self.run_query(query, params, graph.as_deref(), write, table)
                    .await
            }
            Command::Extract {
                ref query,
                ref params,
                ref graph,
            } => self.run_extract(query, params, graph.as_deref()).await,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, JsonValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("parameter name is empty in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bson::doc;
    use serde_json::json;
    use serial_test::serial;

    use crate::store::MemoryDocumentStore;
    use crate::testing::FakeConnector;

    #[tokio::test]
    #[serial]
    async fn test_failed_command_still_closes_connection() {
        let store = MemoryDocumentStore::with_connection_documents([doc! {
            "type": "NEO4J", "protocol": "bolt", "uri": "localhost",
        }]);
        let connector = Arc::new(FakeConnector::new());
        let manager = Arc::new(ConnectionManager::new(Arc::new(store), connector.clone()));
        ConnectionManager::install(Arc::clone(&manager));

        let app = App::try_parse_from(["graphbridge", "query", "RETURN 1", "--graph", "nowhere"])
            .unwrap();
        assert!(app.run().await.is_err());

        assert_eq!(connector.built()[0].close_count(), 1);
        assert!(ConnectionManager::install(manager).is_none());
        ConnectionManager::evict_singleton_instance().await;
    }

    #[test]
    fn test_parse_param_json_and_plain_strings() {
        assert_eq!(parse_param("limit=5").unwrap(), ("limit".into(), json!(5)));
        assert_eq!(
            parse_param("name=Alphonse").unwrap(),
            ("name".into(), json!("Alphonse"))
        );
        assert_eq!(
            parse_param("filter={\"a\":1}").unwrap(),
            ("filter".into(), json!({"a": 1}))
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn test_query_command_parses() {
        let app = App::try_parse_from([
            "graphbridge",
            "query",
            "MATCH (n:Alchemist {name: $name}) RETURN n",
            "-p",
            "name=Alphonse",
            "--graph",
            "neo4j",
            "--table",
        ])
        .unwrap();

        match app.command {
            Command::Query {
                params,
                graph,
                table,
                write,
                ..
            } => {
                assert_eq!(params, vec![("name".to_string(), json!("Alphonse"))]);
                assert_eq!(graph.as_deref(), Some("neo4j"));
                assert!(table);
                assert!(!write);
            }
            _ => panic!("expected query command"),
        }
    }
}
