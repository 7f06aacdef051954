//! Test doubles for the graph data source and connector seams.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::connection::Connector;
use crate::error::AppError;
use crate::graph::{GraphDataSource, Params, QueryRequest, QueryResult, Row, Table};
use crate::models::{BackendType, ConnectionConfig, GraphProjection};

/// Data source answering every query on its `neo4j` graph with a single
/// `Alphonse` record.
pub(crate) struct FakeDataSource {
    backend: BackendType,
    healthy: Arc<AtomicBool>,
    closed: AtomicUsize,
}

impl FakeDataSource {
    pub fn healthy() -> Self {
        Self::new(BackendType::Neo4j, Arc::new(AtomicBool::new(true)))
    }

    pub fn new(backend: BackendType, healthy: Arc<AtomicBool>) -> Self {
        Self {
            backend,
            healthy,
            closed: AtomicUsize::new(0),
        }
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphDataSource for FakeDataSource {
    fn backend_type(&self) -> BackendType {
        self.backend
    }

    async fn get_default_graph(&self) -> Result<String, AppError> {
        Ok("neo4j".into())
    }

    async fn get_graphs(&self) -> Result<Vec<String>, AppError> {
        Ok(vec!["neo4j".into(), "system".into()])
    }

    async fn run_query(&self, request: QueryRequest) -> Result<QueryResult, AppError> {
        if let Some(graph) = request.graph.as_deref().filter(|g| *g != "neo4j") {
            return Err(AppError::GraphNotFound(format!("no graph named '{}'", graph)));
        }
        let rows = vec![Row::new([("n".to_string(), json!({"name": "Alphonse"}))])];
        if request.as_table {
            Ok(QueryResult::Table(Table::from_rows(&rows)))
        } else {
            Ok(QueryResult::Records(rows))
        }
    }

    async fn graph_from_query(
        &self,
        _query: &str,
        _params: Params,
        _graph: Option<&str>,
    ) -> Result<GraphProjection, AppError> {
        Ok(GraphProjection::default())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Connectivity("fake server is down".into()))
        }
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out [`FakeDataSource`]s and remembering each one.
pub(crate) struct FakeConnector {
    healthy: Arc<AtomicBool>,
    refuse: AtomicBool,
    built: Mutex<Vec<Arc<FakeDataSource>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            healthy: Arc::new(AtomicBool::new(true)),
            refuse: AtomicBool::new(false),
            built: Mutex::new(Vec::new()),
        }
    }

    /// Health of every source built so far and from now on.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn built(&self) -> Vec<Arc<FakeDataSource>> {
        self.built.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.built.lock().len()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn GraphDataSource>, AppError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(AppError::Connectivity("connection refused".into()));
        }
        let source = Arc::new(FakeDataSource::new(
            config.backend_type(),
            Arc::clone(&self.healthy),
        ));
        self.built.lock().push(Arc::clone(&source));
        Ok(source)
    }
}
