//! graphbridge - one query interface over Neo4j and Gremlin graph databases
//!
//! The graph connection is described by a document stored in MongoDB; the
//! [`ConnectionManager`](connection::ConnectionManager) reads it, builds the
//! matching [`GraphDataSource`](graph::GraphDataSource) and keeps it healthy.

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod graph;
pub mod models;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
