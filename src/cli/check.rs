//! Check and graphs command handlers.

use color_eyre::Result;

use crate::connection::ConnectionManager;

use super::App;

impl App {
    /// Build the data source and probe it.
    pub async fn run_check(&self) -> Result<()> {
        let manager = ConnectionManager::global()?;

        let config = manager.get_graph_connection().await?;
        tracing::info!("Connection configured for backend {}", config.backend_type());

        let source = manager.get_graph_data_source().await?;
        manager.check_driver().await?;

        let default_graph = source.get_default_graph().await?;
        println!(
            "{}: {} (default graph: {})",
            source.backend_type(),
            manager.state().await,
            default_graph
        );

        Ok(())
    }

    /// List reachable graphs, marking the default one.
    pub async fn run_graphs(&self) -> Result<()> {
        let manager = ConnectionManager::global()?;
        let source = manager.get_graph_data_source().await?;

        let default_graph = source.get_default_graph().await?;
        for graph in source.get_graphs().await? {
            let marker = if graph == default_graph { "*" } else { " " };
            println!("{} {}", marker, graph);
        }

        Ok(())
    }
}
