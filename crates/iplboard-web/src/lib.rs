//! iplboard-web - JSON API for the IPL analytics dashboard

pub mod router;

pub use router::{create_router, ApiError, SeasonsQuery};

use anyhow::Result;
use iplboard_core::Dashboard;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the web server
pub async fn run(dashboard: Arc<Dashboard>, port: u16) -> Result<()> {
    let router = create_router(dashboard);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;

    info!("Web server listening on http://{}", addr);
    println!("Web server listening on http://{}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
