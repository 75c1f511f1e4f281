//! HTTP surface: `GET /reviews` and `GET /health`.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

use crate::process::{PageParams, PageRequest, PaginationCoordinator, ReviewSource, ReviewsPage};
use crate::Error;

pub fn create_router<S: ReviewSource + 'static>(coordinator: PaginationCoordinator<S>) -> Router {
    Router::new()
        .route("/reviews", get(get_reviews::<S>))
        .route("/health", get(health))
        .with_state(Arc::new(coordinator))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// GET /reviews?url=..&page=..&pageToken=..&workId=..&apiKey=..
pub async fn get_reviews<S: ReviewSource + 'static>(
    State(coordinator): State<Arc<PaginationCoordinator<S>>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<ReviewsPage>, Error> {
    let Query(params) = params.map_err(|rejection| Error::MalformedQuery(rejection.body_text()))?;
    let request = PageRequest::from_params(params)?;
    let page = coordinator.handle(&request).await?;
    Ok(Json(page))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Error::Bootstrap(cause) => warn!("Bootstrap failed: {cause}"),
            Error::Query(cause) => warn!("Review query failed: {cause}"),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => error!("Unexpected error: {self}"),
            _ => debug!("Rejected request: {self}"),
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
