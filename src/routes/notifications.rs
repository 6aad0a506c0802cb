use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Notification;
use crate::db::NotificationRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread", get(unread_count))
        .route("/read-all", patch(mark_all_read))
        .route("/:id/read", patch(mark_read))
        .route("/:id", delete(delete_notification))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsListResponse {
    pub data: Vec<Notification>,
    pub pagination: Pagination,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub data: UnreadBody,
}

#[derive(Debug, Serialize)]
pub struct UnreadBody {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub data: ReadAllBody,
}

#[derive(Debug, Serialize)]
pub struct ReadAllBody {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub data: Notification,
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's notifications, newest first, with the unread badge count.
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<NotificationsListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * page_size;

    let notifications =
        NotificationRepository::list_for_recipient(&state.db, &claims.sub, page_size, offset)
            .await?;
    let unread = NotificationRepository::unread_count(&state.db, &claims.sub).await?;

    Ok(Json(NotificationsListResponse {
        data: notifications,
        pagination: Pagination { page, page_size },
        unread_count: unread,
    }))
}

/// Badge count endpoint for frontend polling.
async fn unread_count(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<UnreadResponse>> {
    let unread = NotificationRepository::unread_count(&state.db, &claims.sub).await?;
    Ok(Json(UnreadResponse {
        data: UnreadBody { unread },
    }))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ReadAllResponse>> {
    let updated = NotificationRepository::mark_all_read(&state.db, &claims.sub).await?;
    Ok(Json(ReadAllResponse {
        data: ReadAllBody { updated },
    }))
}

/// Mark one notification read. Scoped to the caller, so a foreign or unknown
/// id is indistinguishable: both return 404.
async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = NotificationRepository::mark_read(&state.db, &id, &claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
    Ok(Json(NotificationResponse { data: notification }))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let deleted = NotificationRepository::delete(&state.db, &id, &claims.sub).await?;
    if deleted == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
