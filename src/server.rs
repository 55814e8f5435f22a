use crate::traits::FeedFetcher;
use crate::types::RelayError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// On-demand fetch endpoint: one fetcher invocation per request, raw items
/// back as JSON. Stateless; never touches watermarks, diffing or the relay.
#[derive(Clone)]
struct AppState {
    fetcher: Arc<dyn FeedFetcher>,
}

pub fn router(fetcher: Arc<dyn FeedFetcher>) -> Router {
    Router::new()
        .route("/items/{identifier}", get(get_items))
        .route("/health", get(health))
        .with_state(AppState { fetcher })
}

async fn get_items(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> impl IntoResponse {
    match state.fetcher.fetch(&identifier).await {
        Ok(items) => (
            StatusCode::OK,
            Json(json!({ "success": true, "source": identifier, "items": items })),
        ),
        Err(e) => {
            error!("on-demand fetch for {} failed: {}", identifier, e);
            let status = match e {
                RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({ "success": false, "source": identifier, "error": e.to_string() })),
            )
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Bind and serve until the process exits.
pub async fn serve(fetcher: Arc<dyn FeedFetcher>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("on-demand fetch endpoint listening on {}", addr);
    axum::serve(listener, router(fetcher)).await?;
    Ok(())
}
