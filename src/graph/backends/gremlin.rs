//! Gremlin backend implementation (JanusGraph, CosmosDB).
//!
//! One `gremlin-client` pool is opened per data source. For every configured
//! graph it is aliased to the graph's traversal source twice: once as the
//! client that scripts are submitted through, once as the remote connection
//! behind a traversal source used for health checks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use gremlin_client::aio::{AsyncTerminator, GremlinClient};
use gremlin_client::process::traversal::{traversal, GraphTraversalSource};
use gremlin_client::{
    ConnectionOptions, GKey, GValue, GraphSON, GremlinError, List, Map as GMap, ToGValue, GID,
};
use parking_lot::RwLock;
use serde_json::{Map, Number, Value as JsonValue};

use crate::config::DataSourceOptions;
use crate::error::AppError;
use crate::graph::row::{Params, QueryResult};
use crate::graph::traits::{GraphDataSource, QueryRequest};
use crate::models::{BackendType, GraphProjection, GremlinConfig};

/// Resources bound to one named graph.
struct GraphHandle {
    traversal_source: String,
    /// Script submission.
    client: GremlinClient,
    /// Traversal bound to its own remote connection.
    traversal: GraphTraversalSource<AsyncTerminator>,
}

/// Gremlin graph data source.
pub struct GremlinDataSource {
    flavor: BackendType,
    endpoint: String,
    /// Configured graph names, in configuration order.
    graph_names: Vec<String>,
    /// `None` once closed.
    handles: RwLock<Option<HashMap<String, Arc<GraphHandle>>>>,
}

impl GremlinDataSource {
    /// Connects to the Gremlin server and builds the per-graph resources.
    pub async fn connect(
        config: &GremlinConfig,
        options: &DataSourceOptions,
    ) -> Result<Self, AppError> {
        let endpoint = config.endpoint();

        let mut builder = ConnectionOptions::builder()
            .host(config.host.clone())
            .port(config.port)
            .pool_size(options.gremlin_pool_size)
            .ssl(config.use_tls())
            .serializer(graphson_for(config.flavor))
            .deserializer(graphson_for(config.flavor));
        if let Some(credentials) = &config.credentials {
            builder = builder.credentials(&credentials.user, &credentials.password);
        }

        let base = GremlinClient::connect(builder.build()).await.map_err(|e| {
            AppError::Connectivity(format!("Failed to connect to Gremlin server at {}: {}", endpoint, e))
        })?;

        let mut handles = HashMap::new();
        for graph in &config.graphs {
            tracing::debug!(
                graph = %graph.name,
                traversal_source = %graph.traversal_source,
                "Initializing Gremlin client, connection and traversal"
            );
            let handle = GraphHandle {
                traversal_source: graph.traversal_source.clone(),
                client: base.alias(graph.traversal_source.as_str()),
                traversal: traversal().with_remote_async(base.alias(graph.traversal_source.as_str())),
            };
            handles.insert(graph.name.clone(), Arc::new(handle));
        }

        tracing::info!(
            endpoint = %endpoint,
            flavor = %config.flavor,
            graphs = handles.len(),
            "Connected to Gremlin server"
        );

        Ok(Self {
            flavor: config.flavor,
            endpoint,
            graph_names: config.graphs.iter().map(|g| g.name.clone()).collect(),
            handles: RwLock::new(Some(handles)),
        })
    }

    /// Returns the server endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn handle(&self, graph: &str) -> Result<Arc<GraphHandle>, AppError> {
        let handles = self.handles.read();
        let handles = handles
            .as_ref()
            .ok_or_else(|| AppError::Internal("Gremlin data source is closed".into()))?;
        handles.get(graph).cloned().ok_or_else(|| {
            AppError::GraphNotFound(format!("the selected graph '{}' is not available", graph))
        })
    }
}

#[async_trait]
impl GraphDataSource for GremlinDataSource {
    fn backend_type(&self) -> BackendType {
        self.flavor
    }

    async fn get_default_graph(&self) -> Result<String, AppError> {
        self.graph_names
            .first()
            .cloned()
            .ok_or_else(|| AppError::GraphNotFound("no Gremlin graphs are configured".into()))
    }

    async fn get_graphs(&self) -> Result<Vec<String>, AppError> {
        Ok(self.graph_names.clone())
    }

    async fn run_query(&self, request: QueryRequest) -> Result<QueryResult, AppError> {
        if request.as_table {
            return Err(AppError::Unsupported(
                "Gremlin query results cannot be converted into a table".into(),
            ));
        }

        let graph = match request.graph {
            Some(graph) if !graph.is_empty() => graph,
            _ => self.get_default_graph().await?,
        };
        let handle = self.handle(&graph)?;
        tracing::info!(
            graph = %graph,
            traversal_source = %handle.traversal_source,
            query = %request.query,
            "Running Gremlin query"
        );

        let bindings: Vec<(String, Binding)> = request
            .params
            .iter()
            .map(|(name, value)| (name.clone(), Binding(json_to_gvalue(value))))
            .collect();
        let bindings: Vec<(&str, &dyn ToGValue)> = bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToGValue))
            .collect();

        let results = handle
            .client
            .execute(request.query.as_str(), &bindings)
            .await
            .map_err(|e| map_gremlin_error(e, &request.query))?;
        let values: Vec<GValue> = results
            .try_collect()
            .await
            .map_err(|e| map_gremlin_error(e, &request.query))?;

        Ok(QueryResult::Values(values.iter().map(gvalue_to_json).collect()))
    }

    async fn graph_from_query(
        &self,
        _query: &str,
        _params: Params,
        _graph: Option<&str>,
    ) -> Result<GraphProjection, AppError> {
        Err(AppError::Unsupported(
            "graph extraction is not available for Gremlin backends".into(),
        ))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let graph = self.get_default_graph().await?;
        let handle = self.handle(&graph)?;
        handle
            .traversal
            .v(())
            .limit(1_i64)
            .count()
            .next()
            .await
            .map(|_| ())
            .map_err(|e| {
                AppError::Connectivity(format!(
                    "Gremlin graph '{}' at {} is unreachable: {}",
                    graph, self.endpoint, e
                ))
            })
    }

    async fn close(&self) {
        if let Some(handles) = self.handles.write().take() {
            // Pools are released when the last alias is dropped
            for (graph, handle) in handles {
                tracing::debug!(
                    graph = %graph,
                    shared_refs = Arc::strong_count(&handle),
                    "Releasing Gremlin client and connection"
                );
                drop(handle);
            }
            tracing::info!(endpoint = %self.endpoint, "Closed Gremlin data source");
        }
    }
}

/// CosmosDB only speaks GraphSON v2.
fn graphson_for(flavor: BackendType) -> GraphSON {
    match flavor {
        BackendType::CosmosDb => GraphSON::V2,
        _ => GraphSON::V3,
    }
}

/// A script binding.
struct Binding(GValue);

impl ToGValue for Binding {
    fn to_gvalue(&self) -> GValue {
        self.0.clone()
    }
}

fn map_gremlin_error(err: GremlinError, query: &str) -> AppError {
    match err {
        GremlinError::Request((code, message)) => AppError::Query {
            message: format!("the given gremlin query is not valid ({}): {}", code, message),
            query: query.to_string(),
        },
        other => {
            tracing::error!(error = %other, "Gremlin driver error");
            AppError::Internal(format!("Gremlin driver error: {}", other))
        }
    }
}

fn json_to_gvalue(value: &JsonValue) -> GValue {
    match value {
        JsonValue::Null => GValue::Null,
        JsonValue::Bool(b) => GValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => GValue::Int64(i),
            None => GValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => GValue::String(s.clone()),
        JsonValue::Array(items) => GValue::List(List::new(items.iter().map(json_to_gvalue).collect())),
        JsonValue::Object(map) => {
            let entries: HashMap<GKey, GValue> = map
                .iter()
                .map(|(k, v)| (GKey::String(k.clone()), json_to_gvalue(v)))
                .collect();
            GValue::Map(GMap::from(entries))
        }
    }
}

/// Converts a Gremlin response value into JSON.
///
/// Vertices and edges become `{id, label}` objects (edges also carry their
/// endpoints). Values without a JSON counterpart are rendered through `Debug`.
fn gvalue_to_json(value: &GValue) -> JsonValue {
    match value {
        GValue::Null => JsonValue::Null,
        GValue::Bool(b) => JsonValue::Bool(*b),
        GValue::Int32(i) => JsonValue::Number((*i).into()),
        GValue::Int64(i) => JsonValue::Number((*i).into()),
        GValue::Float(f) => float_to_json(f64::from(*f)),
        GValue::Double(f) => float_to_json(*f),
        GValue::String(s) => JsonValue::String(s.clone()),
        GValue::Uuid(u) => JsonValue::String(u.to_string()),
        GValue::Date(d) => JsonValue::String(d.to_rfc3339()),
        GValue::List(list) => JsonValue::Array(list.iter().map(gvalue_to_json).collect()),
        GValue::Map(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (gkey_to_string(k), gvalue_to_json(v)))
                .collect(),
        ),
        GValue::Vertex(vertex) => {
            let mut object = Map::new();
            object.insert("id".into(), gid_to_json(vertex.id()));
            object.insert("label".into(), JsonValue::String(vertex.label().clone()));
            JsonValue::Object(object)
        }
        GValue::Edge(edge) => {
            let mut object = Map::new();
            object.insert("id".into(), gid_to_json(edge.id()));
            object.insert("label".into(), JsonValue::String(edge.label().clone()));
            object.insert("source".into(), gid_to_json(edge.out_v().id()));
            object.insert("target".into(), gid_to_json(edge.in_v().id()));
            JsonValue::Object(object)
        }
        other => JsonValue::String(format!("{:?}", other)),
    }
}

fn float_to_json(f: f64) -> JsonValue {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn gid_to_json(id: &GID) -> JsonValue {
    match id {
        GID::String(s) => JsonValue::String(s.clone()),
        GID::Int32(i) => JsonValue::Number((*i).into()),
        GID::Int64(i) => JsonValue::Number((*i).into()),
    }
}

fn gkey_to_string(key: &GKey) -> String {
    match key {
        GKey::String(s) => s.clone(),
        other => format!("{:?}", other),
    }
}
