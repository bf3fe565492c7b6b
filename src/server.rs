//! HTTP surface: `GET /api/link-preview?url=...&stealth=...&search=...&validate=...`.

use crate::{
    log_error_card, log_preview_card, PreviewError, PreviewQuery, PreviewResolver,
    PreviewResult, ServiceConfig,
};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub const LINK_PREVIEW_ROUTE: &str = "/api/link-preview";

/// Routes with permissive CORS. Methods other than GET get a 405.
pub fn router(resolver: Arc<PreviewResolver>) -> Router {
    Router::new()
        .route("/", get(health))
        .route(LINK_PREVIEW_ROUTE, get(link_preview))
        .with_state(resolver)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Path only; the query carries user URLs.
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

async fn health() -> &'static str {
    "ok"
}

async fn link_preview(
    State(resolver): State<Arc<PreviewResolver>>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            let error = PreviewError::InvalidParameter(rejection.body_text());
            error.log();
            return (
                StatusCode::BAD_REQUEST,
                Json(PreviewResult::rejected(&[error])),
            )
                .into_response();
        }
    };
    let url = query.url.clone().unwrap_or_default();

    match resolver.resolve_query(&query).await {
        Ok(result) if result.success => {
            log_preview_card(&result, &url);
            (StatusCode::OK, Json(result)).into_response()
        }
        Ok(result) => (StatusCode::BAD_REQUEST, Json(result)).into_response(),
        Err(e) => {
            log_error_card(&url, &e);
            (abort_status(&e), Json(PreviewResult::failed(&e))).into_response()
        }
    }
}

/// Status for an error that aborted resolution.
fn abort_status(error: &PreviewError) -> StatusCode {
    if error.is_request_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Binds `config.bind_address()` and serves until the process stops.
pub async fn serve(config: ServiceConfig) -> Result<(), PreviewError> {
    let resolver = Arc::new(config.build_resolver()?);
    let addr = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PreviewError::ConfigError(format!("cannot bind {addr}: {e}")))?;
    info!("Link preview server listening on http://{addr}{LINK_PREVIEW_ROUTE}");

    axum::serve(listener, router(resolver))
        .await
        .map_err(|e| PreviewError::ExternalServiceError {
            service: "HTTP server".to_string(),
            message: e.to_string(),
        })
}
