//! Graph connection configuration as persisted in the document store.
//!
//! The store holds a loosely typed document ([`ConnectionDocument`]); it is
//! validated once and turned into the tagged [`ConnectionConfig`] that the
//! connector dispatches on.

use std::str::FromStr;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_NEO4J_PORT: u16 = 7687;
pub const DEFAULT_GREMLIN_PORT: u16 = 8182;

/// Graph database flavours a connection document can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackendType {
    Neo4j,
    JanusGraph,
    CosmosDb,
}

impl BackendType {
    /// True for the backends reached through a Gremlin server.
    pub fn is_gremlin(&self) -> bool {
        matches!(self, BackendType::JanusGraph | BackendType::CosmosDb)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendType::Neo4j => "NEO4J",
            BackendType::JanusGraph => "JANUSGRAPH",
            BackendType::CosmosDb => "COSMOSDB",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEO4J" => Ok(BackendType::Neo4j),
            "JANUSGRAPH" => Ok(BackendType::JanusGraph),
            "COSMOSDB" => Ok(BackendType::CosmosDb),
            other => Err(AppError::Configuration(format!(
                "unexpected connector type '{}'. Valid values: NEO4J, JANUSGRAPH, COSMOSDB",
                other
            ))),
        }
    }
}

/// Port as found in the store: an integer, a double (legacy shell and GUI
/// tools write numbers that way) or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Double(f64),
    Text(String),
}

impl PortValue {
    fn resolve(&self) -> Result<u16, AppError> {
        let port = match self {
            PortValue::Number(n) => u16::try_from(*n).ok(),
            PortValue::Double(f) if f.is_finite() && f.fract() == 0.0 => {
                (0.0..=f64::from(u16::MAX)).contains(f).then_some(*f as u16)
            }
            PortValue::Double(_) => None,
            PortValue::Text(s) => s.trim().parse::<u16>().ok(),
        };
        port.ok_or_else(|| AppError::Configuration(format!("invalid port: {:?}", self)))
    }
}

/// Raw `graphDbConnection` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionDocument {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub protocol: Option<String>,
    #[serde(alias = "host")]
    pub uri: Option<String>,
    pub port: Option<PortValue>,
    pub user: Option<String>,
    pub pass: Option<String>,
    #[serde(rename = "tinkerpopGraphs")]
    pub tinkerpop_graphs: Option<Document>,
}

impl ConnectionDocument {
    /// Deserializes a stored document, ignoring fields this crate does not use.
    pub fn from_bson(document: Document) -> Result<Self, AppError> {
        bson::from_document(document).map_err(|e| {
            AppError::Configuration(format!("graphdb connection document is malformed: {}", e))
        })
    }
}

/// Username/password pair. Only present when both were configured.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Settings for a Bolt-speaking property graph server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyGraphConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl PropertyGraphConfig {
    /// Connection URI, e.g. `bolt://localhost:7687`.
    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// A logical graph exposed by a Gremlin server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedGraph {
    pub name: String,
    pub traversal_source: String,
}

/// Settings for a Gremlin server (JanusGraph or CosmosDB).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GremlinConfig {
    pub flavor: BackendType,
    pub protocol: Option<String>,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    /// In document order; the first entry is the default graph.
    pub graphs: Vec<NamedGraph>,
}

impl GremlinConfig {
    /// TLS is used for secure schemes, and when no scheme is configured.
    pub fn use_tls(&self) -> bool {
        match self.protocol.as_deref() {
            Some(p) => matches!(p.to_ascii_lowercase().as_str(), "wss" | "https"),
            None => true,
        }
    }

    /// Endpoint URL, e.g. `wss://host:8182/gremlin`.
    pub fn endpoint(&self) -> String {
        let scheme = match self.protocol.as_deref() {
            Some(p) => p.to_string(),
            None if self.use_tls() => "wss".to_string(),
            None => "ws".to_string(),
        };
        format!("{}://{}:{}/gremlin", scheme, self.host, self.port)
    }
}

/// Validated graph connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    PropertyGraph(PropertyGraphConfig),
    Gremlin(GremlinConfig),
}

impl ConnectionConfig {
    pub fn backend_type(&self) -> BackendType {
        match self {
            ConnectionConfig::PropertyGraph(_) => BackendType::Neo4j,
            ConnectionConfig::Gremlin(config) => config.flavor,
        }
    }

    /// Validates the set of documents read from the connection collection.
    ///
    /// Exactly one document must be present.
    pub fn from_documents(documents: Vec<Document>) -> Result<Self, AppError> {
        if documents.len() != 1 {
            tracing::error!(
                found = documents.len(),
                "graphdb connection misconfiguration: expected exactly one document"
            );
            return Err(AppError::Configuration(format!(
                "graphdb connection misconfiguration: expected exactly one connection document, found {}",
                documents.len()
            )));
        }
        let document = documents.into_iter().next().unwrap_or_default();
        ConnectionDocument::from_bson(document)?.try_into()
    }
}

impl TryFrom<ConnectionDocument> for ConnectionConfig {
    type Error = AppError;

    fn try_from(doc: ConnectionDocument) -> Result<Self, Self::Error> {
        let kind = non_blank(doc.kind).ok_or_else(|| {
            AppError::Configuration("graphdb connection misconfiguration: missing type".into())
        })?;
        let backend: BackendType = kind.parse()?;

        let host = non_blank(doc.uri).ok_or_else(|| {
            AppError::Configuration("graphdb connection is missing its uri".into())
        })?;

        let credentials = match (non_blank(doc.user), non_blank(doc.pass)) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            _ => None,
        };

        let port = doc.port.as_ref().map(PortValue::resolve).transpose()?;

        if backend.is_gremlin() {
            let graphs = named_graphs(doc.tinkerpop_graphs.as_ref());
            if graphs.is_empty() {
                return Err(AppError::Configuration(
                    "graphdb connection misconfiguration: tinkerpopGraphs is required for Gremlin backends"
                        .into(),
                ));
            }
            Ok(ConnectionConfig::Gremlin(GremlinConfig {
                flavor: backend,
                protocol: non_blank(doc.protocol),
                host,
                port: port.unwrap_or(DEFAULT_GREMLIN_PORT),
                credentials,
                graphs,
            }))
        } else {
            let protocol = non_blank(doc.protocol).ok_or_else(|| {
                AppError::Configuration("graphdb connection is missing its protocol".into())
            })?;
            Ok(ConnectionConfig::PropertyGraph(PropertyGraphConfig {
                protocol,
                host,
                port: port.unwrap_or(DEFAULT_NEO4J_PORT),
                credentials,
            }))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Graph name → traversal source pairs, skipping blank or non-string sources.
fn named_graphs(graphs: Option<&Document>) -> Vec<NamedGraph> {
    let Some(graphs) = graphs else {
        return Vec::new();
    };
    graphs
        .iter()
        .filter_map(|(name, source)| match source {
            Bson::String(s) if !s.trim().is_empty() => Some(NamedGraph {
                name: name.clone(),
                traversal_source: s.clone(),
            }),
            _ => None,
        })
        .collect()
}
