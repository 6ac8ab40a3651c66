// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod auth;
mod handlers;
mod routes;

pub use routes::router;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ContentConfig, ServerConfig};
use crate::directory::Directory;
use crate::graph::SocialGraph;
use crate::ledger::EngagementLedger;
use crate::models::PageRequest;
use crate::store::DynStore;
use crate::timeline::Timeline;

/// Shared handler state: the store and the services built on it
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub graph: SocialGraph,
    pub ledger: EngagementLedger,
    pub timeline: Timeline,
    pub directory: Directory,
    pub content: ContentConfig,
}

impl AppState {
    pub fn new(store: DynStore, content: ContentConfig) -> Self {
        let graph = SocialGraph::new(store.clone());
        Self {
            ledger: EngagementLedger::new(store.clone(), content.cascade_comments_on_post_delete),
            timeline: Timeline::new(store.clone(), graph.clone()),
            directory: Directory::new(store.clone(), graph.clone()),
            graph,
            store,
            content,
        }
    }

    /// Normalize raw `page`/`limit` query values with the configured sizes
    pub fn page(&self, page: Option<i64>, limit: Option<i64>) -> PageRequest {
        PageRequest::new(
            page,
            limit,
            self.content.default_page_size,
            self.content.max_page_size,
        )
    }
}

/// Start the API server and run it until Ctrl-C
pub async fn start_api_server(state: AppState, config: &ServerConfig) -> Result<()> {
    let cors = if config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port)
        .parse::<SocketAddr>()
        .context("Invalid server address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Starting API server on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, initiating graceful shutdown"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
