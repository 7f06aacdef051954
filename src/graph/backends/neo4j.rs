//! Neo4j backend implementation.
//!
//! Talks Bolt through `neo4rs`. Every query runs inside an explicit
//! transaction on the resolved database: write queries are committed, read
//! queries are rolled back, and any failure rolls back before the error is
//! returned, so no transaction outlives the call.
//!
//! # Example
//!
//! ```ignore
//! use graphbridge::graph::backends::neo4j::Neo4jDataSource;
//! use graphbridge::graph::QueryExt;
//!
//! let source = Neo4jDataSource::connect(&config, &options).await?;
//! let rows = source
//!     .query("MATCH (n:Alchemist {name: $name}) RETURN n")
//!     .param("name", "Alphonse")
//!     .fetch_all()
//!     .await?;
//! ```

use async_trait::async_trait;
use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Txn};
use parking_lot::RwLock;
use serde_json::{Map, Number, Value as JsonValue};
use tokio::sync::OnceCell;

use crate::config::DataSourceOptions;
use crate::error::AppError;
use crate::graph::row::{Params, QueryResult, Row, Table};
use crate::graph::traits::{GraphDataSource, QueryRequest};
use crate::models::{BackendType, GraphEdge, GraphNode, GraphProjection, PropertyGraphConfig};

/// Administrative database that answers `SHOW ...` commands.
const SYSTEM_DATABASE: &str = "system";

const SHOW_DEFAULT_DATABASE: &str = "SHOW DEFAULT DATABASE";
const SHOW_DATABASES: &str = "SHOW DATABASES";
const HEALTH_CHECK: &str = "RETURN 1";

/// Wraps a caller query in APOC's virtual-graph extraction.
const APOC_GRAPH_FROM_CYPHER: &str = "CALL apoc.graph.fromCypher($query, $param, apoc.create.uuid(), {}) \
     YIELD graph AS g \
     RETURN g.nodes AS nodes, g.relationships AS rels";

/// Neo4j graph data source.
///
/// Holds the `neo4rs` connection pool until [`close`](GraphDataSource::close)
/// is called. The server's default database is looked up once and cached.
pub struct Neo4jDataSource {
    graph: RwLock<Option<Graph>>,
    uri: String,
    default_graph: OnceCell<String>,
    default_graph_fallback: Option<String>,
}

impl Neo4jDataSource {
    /// Connects to the server described by `config`.
    pub async fn connect(
        config: &PropertyGraphConfig,
        options: &DataSourceOptions,
    ) -> Result<Self, AppError> {
        let uri = config.uri();
        let (user, password) = config
            .credentials
            .as_ref()
            .map(|c| (c.user.as_str(), c.password.as_str()))
            .unwrap_or(("", ""));

        let neo_config = ConfigBuilder::default()
            .uri(&uri)
            .user(user)
            .password(password)
            .fetch_size(options.fetch_size)
            .max_connections(options.max_connections)
            .build()
            .map_err(|e| AppError::Configuration(format!("Invalid Neo4j configuration: {}", e)))?;

        let graph = Graph::connect(neo_config).await.map_err(|e| {
            AppError::Connectivity(format!("Failed to connect to Neo4j at {}: {}", uri, e))
        })?;

        tracing::info!(uri = %uri, "Connected to Neo4j");
        Ok(Self::from_graph(
            graph,
            uri,
            options.default_graph_fallback.clone(),
        ))
    }

    /// Wraps an already connected `neo4rs` graph.
    pub fn from_graph(graph: Graph, uri: String, default_graph_fallback: Option<String>) -> Self {
        Self {
            graph: RwLock::new(Some(graph)),
            uri,
            default_graph: OnceCell::new(),
            default_graph_fallback,
        }
    }

    /// Returns the connection URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn graph(&self) -> Result<Graph, AppError> {
        self.graph
            .read()
            .clone()
            .ok_or_else(|| AppError::Internal("Neo4j data source is closed".into()))
    }

    async fn resolve_graph(&self, graph: Option<&str>) -> Result<String, AppError> {
        match graph {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => self.get_default_graph().await,
        }
    }

    /// Runs `query` in a transaction on `database` and collects every row.
    async fn run_in_txn(
        &self,
        database: &str,
        query: neo4rs::Query,
        text: &str,
        write: bool,
    ) -> Result<Vec<neo4rs::Row>, AppError> {
        let graph = self.graph()?;
        let mut txn = graph
            .start_txn_on(database)
            .await
            .map_err(|e| map_neo4j_error(e, text))?;

        match collect_rows(&mut txn, query).await {
            Ok(rows) => {
                let finished = if write {
                    txn.commit().await
                } else {
                    txn.rollback().await
                };
                finished.map_err(|e| map_neo4j_error(e, text))?;
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back Neo4j transaction");
                }
                Err(map_neo4j_error(e, text))
            }
        }
    }

    /// Runs an administrative command on the system database (auto-commit).
    async fn run_admin(&self, command: &str) -> Result<Vec<neo4rs::Row>, AppError> {
        let graph = self.graph()?;
        let mut stream = graph
            .execute_on(SYSTEM_DATABASE, neo4rs::query(command))
            .await
            .map_err(|e| map_neo4j_error(e, command))?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| map_neo4j_error(e, command))? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn lookup_default_graph(&self) -> Result<String, AppError> {
        let lookup = async {
            let rows = self.run_admin(SHOW_DEFAULT_DATABASE).await?;
            rows.first()
                .and_then(|row| row.get::<String>("name").ok())
                .ok_or_else(|| AppError::Query {
                    message: "server did not report a default database".into(),
                    query: SHOW_DEFAULT_DATABASE.into(),
                })
        };

        resolve_default(lookup.await, self.default_graph_fallback.as_deref())
    }
}

/// Applies the configured fallback to a failed default-database lookup.
fn resolve_default(
    lookup: Result<String, AppError>,
    fallback: Option<&str>,
) -> Result<String, AppError> {
    match lookup {
        Ok(name) => Ok(name),
        // Driver and transport failures always propagate
        Err(err @ AppError::Internal(_)) => Err(err),
        Err(err) => match fallback {
            Some(fallback) => {
                tracing::warn!(
                    error = %err,
                    fallback = %fallback,
                    "Could not read the default database, using fallback name"
                );
                Ok(fallback.to_string())
            }
            None => Err(err),
        },
    }
}

#[async_trait]
impl GraphDataSource for Neo4jDataSource {
    fn backend_type(&self) -> BackendType {
        BackendType::Neo4j
    }

    async fn get_default_graph(&self) -> Result<String, AppError> {
        self.default_graph
            .get_or_try_init(|| self.lookup_default_graph())
            .await
            .cloned()
    }

    async fn get_graphs(&self) -> Result<Vec<String>, AppError> {
        let rows = self.run_admin(SHOW_DATABASES).await?;
        let mut names: Vec<String> = Vec::new();
        // Clustered servers report one row per database per member
        for name in rows.iter().filter_map(|row| row.get::<String>("name").ok()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn run_query(&self, request: QueryRequest) -> Result<QueryResult, AppError> {
        let database = self.resolve_graph(request.graph.as_deref()).await?;
        tracing::info!(
            database = %database,
            write = request.write,
            query = %request.query,
            "Running Neo4j query"
        );

        let query = bolt_query(&request.query, &request.params);
        let rows = self
            .run_in_txn(&database, query, &request.query, request.write)
            .await?;
        let records = rows
            .iter()
            .map(bolt_row_to_row)
            .collect::<Result<Vec<Row>, AppError>>()?;

        if request.as_table {
            Ok(QueryResult::Table(Table::from_rows(&records)))
        } else {
            Ok(QueryResult::Records(records))
        }
    }

    async fn graph_from_query(
        &self,
        query: &str,
        params: Params,
        graph: Option<&str>,
    ) -> Result<GraphProjection, AppError> {
        let database = self.resolve_graph(graph).await?;
        tracing::info!(database = %database, query = %query, "Extracting graph from Neo4j query");

        let param_map: Map<String, JsonValue> = params.into_iter().collect();
        let wrapped = neo4rs::query(APOC_GRAPH_FROM_CYPHER)
            .param("query", query)
            .param("param", json_to_bolt(&JsonValue::Object(param_map)));

        let rows = self.run_in_txn(&database, wrapped, query, false).await?;

        // The procedure aggregates everything into a single row
        match rows.first() {
            Some(row) => projection_from_row(row, query),
            None => Ok(GraphProjection::default()),
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let graph = self.graph()?;
        graph
            .run(neo4rs::query(HEALTH_CHECK))
            .await
            .map_err(|e| AppError::Connectivity(format!("Neo4j at {} is unreachable: {}", self.uri, e)))
    }

    async fn close(&self) {
        if self.graph.write().take().is_some() {
            tracing::info!(uri = %self.uri, "Closed Neo4j data source");
        }
    }
}

async fn collect_rows(txn: &mut Txn, query: neo4rs::Query) -> Result<Vec<neo4rs::Row>, neo4rs::Error> {
    let mut stream = txn.execute(query).await?;
    let mut rows = Vec::new();
    while let Some(row) = stream.next(txn.handle()).await? {
        rows.push(row);
    }
    Ok(rows)
}

/// Server-reported failures are the caller's fault; everything else is ours.
fn map_neo4j_error(err: neo4rs::Error, query: &str) -> AppError {
    match err {
        neo4rs::Error::Neo4j(e) => AppError::Query {
            message: format!("the given neo4j query is not valid: {}", e.message()),
            query: query.to_string(),
        },
        other => {
            tracing::error!(error = %other, "Neo4j driver error");
            AppError::Internal(format!("Neo4j driver error: {}", other))
        }
    }
}

fn bolt_query(text: &str, params: &Params) -> neo4rs::Query {
    params
        .iter()
        .fold(neo4rs::query(text), |query, (name, value)| {
            query.param(name, json_to_bolt(value))
        })
}

/// Converts a Bolt record into a [`Row`].
///
/// The driver keys records by column name, so columns are sorted to keep
/// tables stable across calls.
fn bolt_row_to_row(row: &neo4rs::Row) -> Result<Row, AppError> {
    let map: BoltMap = row
        .to_strict()
        .map_err(|e| AppError::Internal(format!("unreadable Neo4j record: {}", e)))?;
    let mut fields: Vec<(String, JsonValue)> = map
        .value
        .iter()
        .map(|(key, value)| (key.value.clone(), bolt_to_json(value)))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Row::new(fields))
}

fn projection_from_row(row: &neo4rs::Row, query: &str) -> Result<GraphProjection, AppError> {
    let extraction_error = |e: String| AppError::Query {
        message: format!("unexpected graph extraction result: {}", e),
        query: query.to_string(),
    };

    let nodes: Vec<neo4rs::Node> = row
        .get("nodes")
        .map_err(|e| extraction_error(e.to_string()))?;
    let rels: Vec<neo4rs::Relation> = row
        .get("rels")
        .map_err(|e| extraction_error(e.to_string()))?;

    let nodes = nodes
        .iter()
        .map(|node| GraphNode {
            id: node.id(),
            labels: node.labels().into_iter().map(str::to_string).collect(),
            properties: node
                .keys()
                .into_iter()
                .map(|key| (key.to_string(), property_to_json(node.get::<BoltType>(key))))
                .collect(),
        })
        .collect();

    let edges = rels
        .iter()
        .map(|rel| GraphEdge {
            id: rel.id(),
            kind: rel.typ().to_string(),
            source: rel.start_node_id(),
            target: rel.end_node_id(),
            properties: rel
                .keys()
                .into_iter()
                .map(|key| (key.to_string(), property_to_json(rel.get::<BoltType>(key))))
                .collect(),
        })
        .collect();

    Ok(GraphProjection { nodes, edges })
}

fn property_to_json<E>(value: Result<BoltType, E>) -> JsonValue {
    value.map(|v| bolt_to_json(&v)).unwrap_or(JsonValue::Null)
}

/// Converts a Bolt value into JSON.
///
/// Nodes and relationships become their property maps. Temporal and spatial
/// values have no JSON equivalent and are rendered through `Debug`.
pub(crate) fn bolt_to_json(value: &BoltType) -> JsonValue {
    match value {
        BoltType::Null(_) => JsonValue::Null,
        BoltType::Boolean(b) => JsonValue::Bool(b.value),
        BoltType::Integer(i) => JsonValue::Number(i.value.into()),
        BoltType::Float(f) => Number::from_f64(f.value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        BoltType::String(s) => JsonValue::String(s.value.clone()),
        BoltType::List(list) => JsonValue::Array(list.value.iter().map(bolt_to_json).collect()),
        BoltType::Map(map) => JsonValue::Object(bolt_map_to_json(map)),
        BoltType::Node(node) => JsonValue::Object(bolt_map_to_json(&node.properties)),
        BoltType::Relation(rel) => JsonValue::Object(bolt_map_to_json(&rel.properties)),
        BoltType::UnboundedRelation(rel) => JsonValue::Object(bolt_map_to_json(&rel.properties)),
        other => JsonValue::String(format!("{:?}", other)),
    }
}

fn bolt_map_to_json(map: &BoltMap) -> Map<String, JsonValue> {
    map.value
        .iter()
        .map(|(key, value)| (key.value.clone(), bolt_to_json(value)))
        .collect()
}

/// Converts a JSON parameter into a Bolt value.
pub(crate) fn json_to_bolt(value: &JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => BoltType::from(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => BoltType::from(s.clone()),
        JsonValue::Array(items) => {
            BoltType::List(BoltList::from(items.iter().map(json_to_bolt).collect::<Vec<_>>()))
        }
        JsonValue::Object(map) => BoltType::Map(
            map.iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), json_to_bolt(v)))
                .collect::<BoltMap>(),
        ),
    }
}
