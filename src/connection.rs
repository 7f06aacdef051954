//! Connection manager: reads the graph connection document, builds the
//! matching data source and keeps it alive.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──build + health check ok──▶ Connected
//!       │                                      │  health check fails
//!       └──────build or health check fails──▶ Disconnected ──rebuild──▶ Connected | Disconnected
//! ```
//!
//! A host application either owns a [`ConnectionManager`] directly or uses
//! the process-wide instance through [`ConnectionManager::global`].

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use crate::config::{Config, DataSourceOptions};
use crate::error::AppError;
use crate::graph::backends::{GremlinDataSource, Neo4jDataSource};
use crate::graph::GraphDataSource;
use crate::models::ConnectionConfig;
use crate::store::{Collection, DocumentStore, MongoDocumentStore};

/// Connection status of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing built yet.
    Uninitialized,
    /// A data source passed its health check.
    Connected,
    /// The last build or health check failed.
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Uninitialized => write!(f, "UNINITIALIZED"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}

/// Builds a data source for a validated connection configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig)
        -> Result<Arc<dyn GraphDataSource>, AppError>;
}

/// Connector backed by the real drivers.
pub struct DriverConnector {
    options: DataSourceOptions,
}

impl DriverConnector {
    pub fn new(options: DataSourceOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn GraphDataSource>, AppError> {
        let source: Arc<dyn GraphDataSource> = match config {
            ConnectionConfig::PropertyGraph(config) => {
                Arc::new(Neo4jDataSource::connect(config, &self.options).await?)
            }
            ConnectionConfig::Gremlin(config) => {
                Arc::new(GremlinDataSource::connect(config, &self.options).await?)
            }
        };
        Ok(source)
    }
}

struct Inner {
    state: ConnectionState,
    config: Option<ConnectionConfig>,
    source: Option<Arc<dyn GraphDataSource>>,
}

/// Owns the graph connection of a process.
pub struct ConnectionManager {
    store: Arc<dyn DocumentStore>,
    connector: Arc<dyn Connector>,
    inner: Mutex<Inner>,
}

static INSTANCE: Lazy<parking_lot::Mutex<Option<Arc<ConnectionManager>>>> =
    Lazy::new(|| parking_lot::Mutex::new(None));

impl ConnectionManager {
    pub fn new(store: Arc<dyn DocumentStore>, connector: Arc<dyn Connector>) -> Self {
        Self {
            store,
            connector,
            inner: Mutex::new(Inner {
                state: ConnectionState::Uninitialized,
                config: None,
                source: None,
            }),
        }
    }

    /// Builds a manager reading from MongoDB and connecting with the real
    /// drivers.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = MongoDocumentStore::connect(&config.mongo)?;
        let connector = DriverConnector::new(config.datasource.clone());
        Ok(Self::new(Arc::new(store), Arc::new(connector)))
    }

    /// Returns the process-wide manager, building it from [`Config::load`] on
    /// first use.
    pub fn global() -> Result<Arc<ConnectionManager>, AppError> {
        let mut slot = INSTANCE.lock();
        if let Some(manager) = slot.as_ref() {
            return Ok(Arc::clone(manager));
        }
        let config = Config::load()?;
        let manager = Arc::new(Self::from_config(&config)?);
        *slot = Some(Arc::clone(&manager));
        Ok(manager)
    }

    /// Registers `manager` as the process-wide instance and returns the one
    /// it displaces, which the caller is responsible for closing.
    pub fn install(manager: Arc<ConnectionManager>) -> Option<Arc<ConnectionManager>> {
        INSTANCE.lock().replace(manager)
    }

    /// Tears down the process-wide instance; the next [`global`](Self::global)
    /// call builds a fresh one.
    pub async fn evict_singleton_instance() {
        let manager = INSTANCE.lock().take();
        if let Some(manager) = manager {
            manager.close().await;
            tracing::info!("Evicted process-wide connection manager");
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Returns the connection configuration, reading it from the document
    /// store on first use.
    pub async fn get_graph_connection(&self) -> Result<ConnectionConfig, AppError> {
        let mut inner = self.inner.lock().await;
        self.load_config(&mut inner).await
    }

    async fn load_config(&self, inner: &mut Inner) -> Result<ConnectionConfig, AppError> {
        if let Some(config) = &inner.config {
            return Ok(config.clone());
        }
        let documents = self
            .store
            .find_all(Collection::GraphDbConnection.name())
            .await?;
        let config = ConnectionConfig::from_documents(documents)?;
        tracing::debug!(backend = %config.backend_type(), "Loaded graph connection configuration");
        inner.config = Some(config.clone());
        Ok(config)
    }

    /// Returns the live data source, building and health-checking a new one
    /// when none is cached or the last check failed.
    pub async fn get_graph_data_source(&self) -> Result<Arc<dyn GraphDataSource>, AppError> {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Connected {
            if let Some(source) = &inner.source {
                return Ok(Arc::clone(source));
            }
        }

        let config = self.load_config(&mut inner).await?;
        if let Some(stale) = inner.source.take() {
            tracing::debug!("Closing stale graph data source");
            stale.close().await;
        }

        tracing::info!(
            backend = %config.backend_type(),
            previous_state = %inner.state,
            "Building graph data source"
        );
        let source = match self.connector.connect(&config).await {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build graph data source");
                inner.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        if let Err(e) = source.health_check().await {
            tracing::error!(error = %e, "Graph data source failed its health check");
            source.close().await;
            inner.state = ConnectionState::Disconnected;
            return Err(as_connectivity(e));
        }

        inner.state = ConnectionState::Connected;
        inner.source = Some(Arc::clone(&source));
        tracing::info!(backend = %source.backend_type(), "Graph data source connected");
        Ok(source)
    }

    /// Probes the cached data source.
    pub async fn check_driver(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let source = inner
            .source
            .clone()
            .ok_or_else(|| AppError::Configuration("driver instance is misconfigured".into()))?;

        match source.health_check().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Graph data source health check failed");
                inner.state = ConnectionState::Disconnected;
                Err(as_connectivity(e))
            }
        }
    }

    /// Closes the cached data source and forgets the loaded configuration.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(source) = inner.source.take() {
            source.close().await;
        }
        inner.config = None;
        inner.state = ConnectionState::Uninitialized;
    }
}

fn as_connectivity(err: AppError) -> AppError {
    match err {
        AppError::Connectivity(_) => err,
        other => AppError::Connectivity(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, Document};
    use serial_test::serial;

    use crate::store::MemoryDocumentStore;
    use crate::testing::FakeConnector;

    fn neo4j_doc() -> Document {
        doc! {
            "type": "NEO4J",
            "protocol": "bolt",
            "uri": "localhost",
            "port": 7687,
            "user": "neo4j",
            "pass": "password",
        }
    }

    fn manager_with(
        documents: Vec<Document>,
    ) -> (ConnectionManager, Arc<FakeConnector>, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::with_connection_documents(documents));
        let connector = Arc::new(FakeConnector::new());
        let manager = ConnectionManager::new(store.clone(), connector.clone());
        (manager, connector, store)
    }

    #[tokio::test]
    async fn test_zero_documents_is_a_configuration_error() {
        let (manager, connector, _) = manager_with(vec![]);

        let result = manager.get_graph_data_source().await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert_eq!(manager.state().await, ConnectionState::Uninitialized);
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_documents_is_a_configuration_error() {
        let (manager, _, _) = manager_with(vec![neo4j_doc(), neo4j_doc()]);

        let result = manager.get_graph_connection().await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert_eq!(manager.state().await, ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_missing_protocol_is_a_configuration_error() {
        let mut document = neo4j_doc();
        document.remove("protocol");
        let (manager, _, _) = manager_with(vec![document]);

        let result = manager.get_graph_data_source().await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert_eq!(manager.state().await, ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_cached_instance_is_reused() {
        let (manager, connector, _) = manager_with(vec![neo4j_doc()]);

        let first = manager.get_graph_data_source().await.unwrap();
        let second = manager.get_graph_data_source().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(manager.state().await, ConnectionState::Connected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_builds_once() {
        let (manager, connector, _) = manager_with(vec![neo4j_doc()]);
        let manager = Arc::new(manager);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_graph_data_source().await })
            })
            .collect();
        let mut sources = Vec::new();
        for task in tasks {
            sources.push(task.await.unwrap().unwrap());
        }

        assert_eq!(connector.connect_count(), 1);
        assert!(sources.iter().all(|s| Arc::ptr_eq(s, &sources[0])));
    }

    #[tokio::test]
    async fn test_failed_health_check_disconnects_and_closes() {
        let (manager, connector, _) = manager_with(vec![neo4j_doc()]);
        connector.set_healthy(false);

        let result = manager.get_graph_data_source().await;
        assert!(matches!(result, Err(AppError::Connectivity(_))));
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert_eq!(connector.built()[0].close_count(), 1);

        connector.set_healthy(true);
        manager.get_graph_data_source().await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Connected);
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_connect_disconnects() {
        let (manager, connector, _) = manager_with(vec![neo4j_doc()]);
        connector.set_refuse(true);

        let result = manager.get_graph_data_source().await;
        assert!(matches!(result, Err(AppError::Connectivity(_))));
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_check_driver_without_instance() {
        let (manager, _, _) = manager_with(vec![neo4j_doc()]);

        let result = manager.check_driver().await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_check_driver_failure_triggers_rebuild() {
        let (manager, connector, store) = manager_with(vec![neo4j_doc()]);
        let first = manager.get_graph_data_source().await.unwrap();
        manager.check_driver().await.unwrap();

        connector.set_healthy(false);
        let result = manager.check_driver().await;
        assert!(matches!(result, Err(AppError::Connectivity(_))));
        assert_eq!(manager.state().await, ConnectionState::Disconnected);

        // Configuration stays cached even when the store changes
        store.delete_all("graphDbConnection").await.unwrap();
        connector.set_healthy(true);
        let second = manager.get_graph_data_source().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.built()[0].close_count(), 1);
        assert_eq!(manager.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_gremlin_configuration_selects_gremlin_backend() {
        let (manager, _, _) = manager_with(vec![doc! {
            "type": "janusgraph",
            "uri": "janus.local",
            "tinkerpopGraphs": { "people": "g_people" },
        }]);

        let source = manager.get_graph_data_source().await.unwrap();
        assert!(source.backend_type().is_gremlin());
    }

    #[tokio::test]
    async fn test_close_resets_state() {
        let (manager, connector, _) = manager_with(vec![neo4j_doc()]);
        manager.get_graph_data_source().await.unwrap();

        manager.close().await;
        manager.close().await;

        assert_eq!(manager.state().await, ConnectionState::Uninitialized);
        assert_eq!(connector.built()[0].close_count(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_install_and_evict_process_wide_instance() {
        let (manager, connector, _) = manager_with(vec![neo4j_doc()]);
        let manager = Arc::new(manager);
        ConnectionManager::install(Arc::clone(&manager));

        let global = ConnectionManager::global().unwrap();
        assert!(Arc::ptr_eq(&global, &manager));
        global.get_graph_data_source().await.unwrap();

        ConnectionManager::evict_singleton_instance().await;
        assert_eq!(connector.built()[0].close_count(), 1);
        assert_eq!(manager.state().await, ConnectionState::Uninitialized);
    }

    #[tokio::test]
    #[serial]
    async fn test_install_returns_displaced_instance() {
        let (first, _, _) = manager_with(vec![neo4j_doc()]);
        let (second, _, _) = manager_with(vec![neo4j_doc()]);
        let first = Arc::new(first);

        ConnectionManager::install(Arc::clone(&first));
        let displaced = ConnectionManager::install(Arc::new(second)).unwrap();
        assert!(Arc::ptr_eq(&displaced, &first));

        ConnectionManager::evict_singleton_instance().await;
    }
}
