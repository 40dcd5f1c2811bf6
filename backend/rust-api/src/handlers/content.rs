use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    errors::AppResult,
    models::catalog::ContentQuery,
    services::{catalog_service::CatalogService, AppState},
};

/// GET /api/v1/content - Browse categories with nested questions.
/// Supports search, difficulty filter, sortBy pairs and pagination.
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> AppResult<impl IntoResponse> {
    tracing::debug!(?query, "Browsing content");

    let service = CatalogService::new(state.mongo.clone());
    let response = service.browse(query).await?;

    Ok((StatusCode::OK, Json(response)))
}
