pub mod bank;
pub mod cat;
pub mod config;
pub mod logging;
pub mod response;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::bank::{BankError, ItemBank};
use crate::config::Config;
use crate::session::{AttemptStore, StoreError};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load item bank: {0}")]
    Bank(#[from] BankError),
    #[error("failed to open attempt store: {0}")]
    Store(#[from] StoreError),
    #[error("unsupported DATABASE_URL scheme: {0}")]
    UnsupportedDatabase(String),
}

pub fn build_router(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_state(config: &Config) -> Result<AppState, StartupError> {
    let bank = match &config.item_bank_path {
        Some(path) => {
            let bank = ItemBank::from_path(path)?;
            tracing::info!(path = %path.display(), concepts = bank.len(), "item bank loaded");
            Arc::new(bank)
        }
        None => ItemBank::builtin(),
    };

    let store = match config.database_url.as_deref() {
        None => AttemptStore::memory(),
        Some(url) if url.starts_with("sqlite:") => AttemptStore::sqlite(url).await?,
        Some(url) => {
            let scheme = url.split(':').next().unwrap_or_default().to_string();
            return Err(StartupError::UnsupportedDatabase(scheme));
        }
    };
    tracing::info!(backend = store.backend(), "attempt store ready");

    Ok(AppState::new(bank, store))
}

pub async fn create_app(config: &Config) -> Result<axum::Router, StartupError> {
    let state = create_state(config).await?;
    Ok(build_router(state))
}
