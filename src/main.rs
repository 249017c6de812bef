// SPDX-License-Identifier: MIT

//! SnipStash API Server
//!
//! REST backend for a personal text-snippet manager: folders, shortcut-keyed
//! snippets, and the server-side guarantee that no user's shortcuts are
//! prefixes of one another.

use snipstash::{
    config::Config,
    db::MongoStore,
    services::{GoogleAuthClient, Mailer},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting SnipStash API");

    // Connect to MongoDB and create unique indexes
    let db = MongoStore::new(&config.mongodb_uri, &config.mongodb_database)
        .await
        .expect("Failed to connect to MongoDB");

    let mailer = Mailer::from_config(&config).expect("Failed to initialize mailer");

    // Google sign-in is optional; routes answer 404 when unconfigured
    let google = match (&config.google_client_id, &config.google_client_secret) {
        (Some(id), Some(secret)) => {
            tracing::info!("Google sign-in enabled");
            Some(
                GoogleAuthClient::new(id.clone(), secret.clone())
                    .expect("Failed to initialize Google sign-in client"),
            )
        }
        _ => None,
    };

    // Per-user advisory locks for snippet writes
    let write_locks = Arc::new(dashmap::DashMap::new());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        mailer,
        google,
        write_locks,
    });

    // Build router
    let app = snipstash::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("snipstash=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
