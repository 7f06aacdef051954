//! Integration tests against a live MongoDB + Neo4j (with APOC) deployment.
//!
//! MongoDB is reached through the usual `MONGO_*` variables; the Neo4j
//! address written into the connection document defaults to
//! `bolt://localhost:7687` with `neo4j`/`password` and can be overridden with
//! `TEST_NEO4J_HOST` and `TEST_NEO4J_PORT`.
//!
//! Run with: `cargo test --features integration --test datasource_integration`

#![cfg(feature = "integration")]

use std::sync::Arc;

use bson::doc;
use graphbridge::config::Config;
use graphbridge::connection::{ConnectionManager, ConnectionState};
use graphbridge::error::AppError;
use graphbridge::graph::{GraphDataSource, QueryRequest, QueryResult};
use graphbridge::store::{DocumentStore, MongoDocumentStore};
use serial_test::serial;

const COLLECTION: &str = "graphDbConnection";

fn neo4j_host() -> String {
    std::env::var("TEST_NEO4J_HOST").unwrap_or_else(|_| "localhost".into())
}

fn neo4j_port() -> i32 {
    std::env::var("TEST_NEO4J_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(7687)
}

/// Writes the Neo4j connection document and installs a fresh manager.
async fn setup() -> Arc<ConnectionManager> {
    ConnectionManager::evict_singleton_instance().await;

    let config = Config::load().expect("Failed to load configuration");
    let store = MongoDocumentStore::connect(&config.mongo).expect("Failed to create store");
    store.delete_all(COLLECTION).await.expect("Failed to clear connections");
    store
        .insert_one(
            COLLECTION,
            doc! {
                "protocol": "bolt",
                "uri": neo4j_host(),
                "port": neo4j_port(),
                "user": "neo4j",
                "pass": "password",
                "type": "NEO4J",
            },
        )
        .await
        .expect("Failed to write connection document");

    let manager = Arc::new(ConnectionManager::from_config(&config).expect("Failed to build manager"));
    ConnectionManager::install(Arc::clone(&manager));
    manager
}

/// Recreates the Alchemist brothers.
async fn seed(source: &Arc<dyn GraphDataSource>) {
    source
        .query("MATCH (n:Alchemist) DETACH DELETE n")
        .write()
        .execute()
        .await
        .expect("Cleanup failed");
    source
        .query("CREATE (n:Alchemist {name: 'Edward'})-[:BROTHER_OF]->(m:Alchemist {name: 'Alphonse'})")
        .write()
        .execute()
        .await
        .expect("Seeding failed");
}

// All tests share one MongoDB collection and one process-wide manager
#[serial]
mod datasource_tests {
    use super::*;

    #[tokio::test]
    async fn test_manager_connects_to_neo4j() {
        let manager = setup().await;
        let source = ConnectionManager::global()
            .expect("No process-wide manager")
            .get_graph_data_source()
            .await
            .expect("Failed to build data source");

        assert_eq!(manager.state().await, ConnectionState::Connected);
        assert_eq!(source.get_default_graph().await.unwrap(), "neo4j");
        manager.check_driver().await.expect("Health check failed");

        ConnectionManager::evict_singleton_instance().await;
    }

    #[tokio::test]
    async fn test_query_returns_alchemist() {
        let manager = setup().await;
        let source = manager.get_graph_data_source().await.unwrap();
        seed(&source).await;

        let rows = source
            .query("MATCH (n:Alchemist {name: $name}) RETURN n")
            .param("name", "Alphonse")
            .fetch_all()
            .await
            .expect("Query failed");

        assert_eq!(rows.len(), 1);
        let node = rows[0].get_raw("n").expect("Missing column n");
        assert_eq!(node["name"], "Alphonse");

        ConnectionManager::evict_singleton_instance().await;
    }

    #[tokio::test]
    async fn test_table_has_one_row_per_record() {
        let manager = setup().await;
        let source = manager.get_graph_data_source().await.unwrap();
        seed(&source).await;

        let table = source
            .query("MATCH (n:Alchemist) RETURN n.name AS name ORDER BY name")
            .fetch_table()
            .await
            .expect("Query failed");

        assert_eq!(table.columns, vec!["name"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0], "Alphonse");

        ConnectionManager::evict_singleton_instance().await;
    }

    #[tokio::test]
    async fn test_invalid_query_is_a_user_error() {
        let manager = setup().await;
        let source = manager.get_graph_data_source().await.unwrap();

        let err = source
            .run_query(QueryRequest::new("MATC (n) RETURN n"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Query { .. }));

        let err = source
            .run_query(QueryRequest {
                graph: Some("nosuchgraph".into()),
                ..QueryRequest::new("RETURN 1")
            })
            .await
            .unwrap_err();
        assert!(!matches!(err, AppError::Unsupported(_)));

        ConnectionManager::evict_singleton_instance().await;
    }

    #[tokio::test]
    async fn test_graph_from_query_projects_nodes_and_edges() {
        let manager = setup().await;
        let source = manager.get_graph_data_source().await.unwrap();
        seed(&source).await;

        let projection = source
            .graph_from_query(
                "MATCH p=(:Alchemist)-[:BROTHER_OF]->(:Alchemist) RETURN p",
                Default::default(),
                None,
            )
            .await
            .expect("Extraction failed");

        assert_eq!(projection.nodes.len(), 2);
        assert_eq!(projection.edges.len(), 1);
        assert_eq!(projection.edges[0].kind, "BROTHER_OF");

        ConnectionManager::evict_singleton_instance().await;
    }

    #[tokio::test]
    async fn test_graphs_and_close() {
        let manager = setup().await;
        let source = manager.get_graph_data_source().await.unwrap();

        let graphs = source.get_graphs().await.unwrap();
        assert!(graphs.contains(&"neo4j".to_string()));

        source.close().await;
        source.close().await;
        let result = source.run_query(QueryRequest::new("RETURN 1")).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        // A closed source fails its probe, so the manager rebuilds
        assert!(manager.check_driver().await.is_err());
        let rebuilt = manager.get_graph_data_source().await.unwrap();
        assert!(matches!(
            rebuilt.run_query(QueryRequest::new("RETURN 1")).await,
            Ok(QueryResult::Records(_))
        ));

        ConnectionManager::evict_singleton_instance().await;
    }
}
