//! Route gateway: every page's endpoints are merged here so `main.rs` only
//! sees a single [`router`] call.

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use tokio::sync::Mutex;

use crate::error::{DashboardError, Result};
use crate::Config;

mod correlation;
mod forecast;
mod health;
mod pages;
mod readings;

// ---

/// Shared router state. Handlers that only need settings extract
/// `State<Config>`.
#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Config,
    /// Held while the forecast file is checked and, if missing, generated.
    pub forecast_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn new(config: Config) -> Self {
        Self {
            config,
            forecast_lock: Arc::new(Mutex::new(())),
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

pub fn router(config: Config) -> Router {
    // ---
    Router::new()
        .merge(pages::router())
        .merge(readings::router())
        .merge(correlation::router())
        .merge(forecast::router())
        .merge(health::router())
        .with_state(AppState::new(config))
}

/// Run file I/O or model fitting off the async workers.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DashboardError::Task(e.to_string()))?
}
