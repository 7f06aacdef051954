//! Application error types shared by the connection manager, the graph
//! backends and the document store.

use thiserror::Error;

/// Application-level errors for graphbridge.
#[derive(Error, Debug)]
pub enum AppError {
    // Connection lifecycle errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    // Query errors
    #[error("Invalid query: {message}")]
    Query { message: String, query: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Graph not available: {0}")]
    GraphNotFound(String),

    // Document store errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Document store error: {0}")]
    DocumentStore(#[from] mongodb::error::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) | AppError::Config(_) => "CONFIG_ERROR",
            AppError::Connectivity(_) => "CONNECTIVITY_ERROR",
            AppError::Query { .. } => "QUERY_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Unsupported(_) => "NOT_IMPLEMENTED",
            AppError::GraphNotFound(_) => "GRAPH_NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DocumentStore(_) => "DOCUMENT_STORE_ERROR",
        }
    }

    /// Returns true when the caller's input caused the failure rather than
    /// the server or the deployment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::Query { .. } | AppError::GraphNotFound(_) | AppError::Validation(_)
        )
    }
}
