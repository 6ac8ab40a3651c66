// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use social_api::api::{self, AppState};
use social_api::config::{Config, StorageBackend};
use social_api::db::init_database;
use social_api::store::{DynStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();

    // Initialize tracing
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,social_api=debug".into()),
        ))
        .with(fmt_layer)
        .init();

    // Load configuration
    let config = Config::init()?;
    info!("Initialized configuration");

    let store: DynStore = match config.database.backend {
        StorageBackend::Postgres => {
            let db = Arc::new(init_database(&config.database).await?);
            info!("Connected to database");
            Arc::new(PgStore::new(db))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage, data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, config.content.clone());
    api::start_api_server(state, &config.server).await?;

    info!("Social API shutdown complete");
    Ok(())
}
