//! API endpoint handlers
//!
//! This module builds the router for the proxy: the help page, a health
//! check, and a fallback that forwards everything else upstream.

use crate::api::help::help;
use crate::api::proxy::proxy;
use crate::core::audit::AuditLog;
use crate::core::cache::DiskCache;
use crate::core::config::Config;
use crate::core::pricing::Pricing;
use crate::core::stats::Stats;
use crate::core::upstream::Upstream;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: Arc<dyn Upstream>,
    /// `None` when caching is disabled
    pub cache: Option<DiskCache>,
    pub audit: Arc<AuditLog>,
    pub stats: Arc<Stats>,
    pub pricing: Arc<Pricing>,
}

impl AppState {
    /// Open the cache and audit log described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the cache or log directory cannot be created, or a
    /// log file cannot be opened.
    pub async fn new(config: Arc<Config>, upstream: Arc<dyn Upstream>) -> Result<Self> {
        let cache = if config.cache.enabled {
            Some(
                DiskCache::new(&config.cache.dir)
                    .await
                    .with_context(|| {
                        format!("Failed to open cache directory {}", config.cache.dir.display())
                    })?,
            )
        } else {
            None
        };
        let audit = Arc::new(AuditLog::open(&config.logs.dir)?);
        let pricing = Arc::new(Pricing::new(&config.pricing));

        Ok(Self {
            config,
            upstream,
            cache,
            audit,
            stats: Arc::new(Stats::new()),
            pricing,
        })
    }
}

/// Create the API router with all endpoints
///
/// Request bodies are unbounded; the upstream API enforces its own limits.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/help", get(help))
        .route("/health", get(health_check))
        .fallback(proxy)
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// GET /health - Health check with usage counters
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.snapshot();
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "upstream": state.upstream.base_url(),
        "cache_enabled": state.cache.is_some(),
        "requests": stats.requests,
        "tokens": stats.tokens,
        "cost": stats.cost,
    }))
}
