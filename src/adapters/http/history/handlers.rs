//! HTTP handlers for history endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::domain_error_response;
use crate::adapters::http::middleware::RequireAuth;
use crate::ports::CheckHistoryRepository;

use super::dto::{HistoryListResponse, HistoryQuery};

const DEFAULT_PER_PAGE: u32 = 50;
const MAX_PER_PAGE: u32 = 200;

#[derive(Clone)]
pub struct HistoryHandlers {
    history: Arc<dyn CheckHistoryRepository>,
}

impl HistoryHandlers {
    pub fn new(history: Arc<dyn CheckHistoryRepository>) -> Self {
        Self { history }
    }
}

/// GET /api/history - One page of the caller's check results, newest first
pub async fn list_history(
    State(handlers): State<HistoryHandlers>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let items = match handlers.history.list(&user.id, page, per_page).await {
        Ok(items) => items,
        Err(e) => return domain_error_response(e),
    };
    let total = match handlers.history.count(&user.id).await {
        Ok(total) => total,
        Err(e) => return domain_error_response(e),
    };

    let response = HistoryListResponse {
        items: items.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
    };
    (StatusCode::OK, Json(response)).into_response()
}
