//! HTTP service exposing the tire classifier.
//!
//! Routes:
//! * `POST /classify` - multipart upload, field `image`, repeatable
//! * `GET /health` - service and model status
//! * `GET /` - usage text

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::core::{ConfigError, ServerConfig};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use std::sync::Arc;
use tirescan_core::predictors::TireClassifier;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by every request.
#[derive(Clone, Debug)]
pub struct AppState {
    classifier: Arc<TireClassifier>,
}

impl AppState {
    pub fn new(classifier: TireClassifier) -> Self {
        Self {
            classifier: Arc::new(classifier),
        }
    }

    /// Shared handle to the classifier.
    pub fn classifier(&self) -> Arc<TireClassifier> {
        Arc::clone(&self.classifier)
    }
}

/// Builds the CORS layer. An empty origin list allows every origin.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidConfig {
                message: format!("invalid CORS origin '{origin}': {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Builds the router with CORS, request tracing and the body limit applied.
///
/// # Errors
///
/// Returns `ConfigError::InvalidConfig` if a configured CORS origin is not a
/// valid header value.
pub fn router(state: AppState, config: &ServerConfig) -> Result<Router, ConfigError> {
    let body_limit = match config.body_limit_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Ok(Router::new()
        .route("/classify", post(handlers::classify))
        .route("/health", get(handlers::health))
        .route("/", get(handlers::root))
        .layer(body_limit)
        .layer(cors_layer(&config.cors_allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serves the API until Ctrl-C or SIGTERM.
pub async fn run(config: &ServerConfig, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state, config)?;
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_rejects_bad_origin() {
        assert!(cors_layer(&["http://ok.example".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
