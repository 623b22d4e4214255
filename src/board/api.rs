use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Request, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use serde::Deserialize;

use super::auth::CurrentUser;
use super::db::DbHandle;
#[cfg(test)]
use super::db::BoardDb;
use super::models::{BoardPatch, CardPatch, LabelPatch, ListPatch, User};
use crate::errors::{BoardError, Entity};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    /// Principal for requests that carry no `X-User-Id` header.
    pub default_user: User,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────
//
// Required fields are still `Option` so that a missing field produces a
// field-specific 400 rather than a generic deserialization error.

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateBoardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateListRequest {
    pub title: Option<String>,
    pub board_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateListRequest {
    pub title: Option<String>,
    pub position: Option<i32>,
}

#[derive(Deserialize)]
pub struct MoveListRequest {
    pub position: Option<i32>,
}

#[derive(Deserialize)]
pub struct CreateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub list_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub list_id: Option<i64>,
    pub position: Option<i32>,
}

#[derive(Deserialize)]
pub struct MoveCardRequest {
    pub list_id: Option<i64>,
    pub position: Option<i32>,
}

#[derive(Deserialize)]
pub struct CreateLabelRequest {
    pub title: Option<String>,
    pub color: Option<String>,
    pub board_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateLabelRequest {
    pub title: Option<String>,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
    pub card_id: Option<i64>,
    pub author: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match &err {
            BoardError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BoardError::MissingField { .. }
            | BoardError::InvalidField { .. }
            | BoardError::LabelBoardMismatch { .. } => ApiError::BadRequest(err.to_string()),
            BoardError::UnknownUser { .. } => ApiError::Unauthorized(err.to_string()),
            BoardError::Database(inner) => {
                tracing::error!(error = %format!("{:#}", inner), "request failed");
                ApiError::Internal("Internal server error".to_string())
            }
            BoardError::LockPoisoned => {
                tracing::error!(error = %err, "request failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        BoardError::from_anyhow(err).into()
    }
}

/// `Json` whose rejection is a JSON `400` in the service's error shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// `Path` whose rejection (a non-numeric id) is a JSON `400`.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/boards", get(list_boards).post(create_board))
        .route(
            "/api/boards/{id}",
            get(get_board).put(update_board).delete(delete_board),
        )
        .route("/api/lists", post(create_list))
        .route("/api/lists/board/{board_id}", get(lists_for_board))
        .route(
            "/api/lists/{id}",
            get(get_list).put(update_list).delete(delete_list),
        )
        .route("/api/lists/{id}/move", patch(move_list))
        .route("/api/cards", post(create_card))
        .route("/api/cards/list/{list_id}", get(cards_for_list))
        .route(
            "/api/cards/{id}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/api/cards/{id}/move", patch(move_card))
        .route("/api/labels", post(create_label))
        .route("/api/labels/board/{board_id}", get(labels_for_board))
        .route("/api/labels/card/{card_id}", get(labels_for_card))
        .route(
            "/api/labels/card/{card_id}/label/{label_id}",
            post(attach_label).delete(detach_label),
        )
        .route("/api/labels/{id}", put(update_label).delete(delete_label))
        .route("/api/labels/{id}/cards", get(cards_for_label))
        .route("/api/comments", post(create_comment))
        .route("/api/comments/card/{card_id}", get(comments_for_card))
        .route("/api/comments/card/{card_id}/count", get(comment_count))
        .route(
            "/api/comments/{id}",
            put(update_comment).delete(delete_comment),
        )
        .fallback(route_not_found)
}

// ── Helpers ───────────────────────────────────────────────────────────

/// A trimmed, non-empty string or `MissingField`.
fn required_text(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(BoardError::MissingField { field }.into()),
    }
}

/// Absent stays absent; present must be non-empty after trimming.
fn optional_text(value: Option<String>, field: &'static str) -> Result<Option<String>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => required_text(Some(v), field).map(Some),
    }
}

fn required_id(value: Option<i64>, field: &'static str) -> Result<i64, ApiError> {
    value.ok_or_else(|| BoardError::MissingField { field }.into())
}

fn checked_position(value: Option<i32>) -> Result<Option<i32>, ApiError> {
    match value {
        Some(p) if p < 0 => Err(BoardError::InvalidField {
            field: "position",
            message: format!("must be zero or greater, got {}", p),
        }
        .into()),
        other => Ok(other),
    }
}

fn required_position(value: Option<i32>) -> Result<i32, ApiError> {
    checked_position(value)?.ok_or_else(|| BoardError::MissingField { field: "position" }.into())
}

fn found<T>(value: Option<T>, entity: Entity, id: i64) -> Result<T, ApiError> {
    value.ok_or_else(|| BoardError::not_found(entity, id).into())
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

// Boards

async fn list_boards(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let boards = state.db.call(move |db| db.list_boards(user.id)).await?;
    Ok(Json(boards))
}

async fn get_board(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .db
        .call(move |db| db.get_board_detail(id, user.id))
        .await?;
    Ok(Json(found(detail, Entity::Board, id)?))
}

async fn create_board(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = required_text(req.title, "title")?;
    let description = req.description;
    let board = state
        .db
        .call(move |db| db.create_board(user.id, &title, description.as_deref()))
        .await?;
    Ok((StatusCode::CREATED, Json(board)))
}

async fn update_board(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = BoardPatch {
        title: Some(required_text(req.title, "title")?),
        description: req.description,
    };
    let board = state
        .db
        .call(move |db| db.update_board(id, user.id, &patch))
        .await?;
    Ok(Json(found(board, Entity::Board, id)?))
}

async fn delete_board(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .call(move |db| db.delete_board(id, user.id))
        .await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(BoardError::not_found(Entity::Board, id).into()),
    }
}

// Lists

async fn lists_for_board(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(board_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let lists = state
        .db
        .call(move |db| {
            if db.get_board(board_id, user.id)?.is_none() {
                return Err(BoardError::not_found(Entity::Board, board_id).into());
            }
            db.list_lists(board_id)
        })
        .await?;
    Ok(Json(lists))
}

async fn get_list(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state.db.call(move |db| db.get_list_with_cards(id)).await?;
    Ok(Json(found(list, Entity::List, id)?))
}

async fn create_list(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = required_text(req.title, "title")?;
    let board_id = required_id(req.board_id, "board_id")?;
    let list = state
        .db
        .call(move |db| {
            if db.get_board(board_id, user.id)?.is_none() {
                return Err(BoardError::not_found(Entity::Board, board_id).into());
            }
            db.create_list(board_id, &title)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

async fn update_list(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = ListPatch {
        title: optional_text(req.title, "title")?,
        position: checked_position(req.position)?,
    };
    let list = state.db.call(move |db| db.update_list(id, &patch)).await?;
    Ok(Json(found(list, Entity::List, id)?))
}

async fn move_list(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<MoveListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let position = required_position(req.position)?;
    let list = state.db.call(move |db| db.move_list(id, position)).await?;
    Ok(Json(found(list, Entity::List, id)?))
}

async fn delete_list(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_list(id)).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(BoardError::not_found(Entity::List, id).into()),
    }
}

// Cards

async fn cards_for_list(
    State(state): State<SharedState>,
    ApiPath(list_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = state
        .db
        .call(move |db| {
            if db.get_list(list_id)?.is_none() {
                return Err(BoardError::not_found(Entity::List, list_id).into());
            }
            db.list_cards(list_id)
        })
        .await?;
    Ok(Json(cards))
}

async fn get_card(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.db.call(move |db| db.get_card_detail(id)).await?;
    Ok(Json(found(detail, Entity::Card, id)?))
}

async fn create_card(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = required_text(req.title, "title")?;
    let list_id = required_id(req.list_id, "list_id")?;
    let description = req.description;
    let card = state
        .db
        .call(move |db| db.create_card(list_id, &title, description.as_deref()))
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

async fn update_card(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = CardPatch {
        title: optional_text(req.title, "title")?,
        description: req.description,
        list_id: req.list_id,
        position: checked_position(req.position)?,
    };
    let card = state.db.call(move |db| db.update_card(id, &patch)).await?;
    Ok(Json(found(card, Entity::Card, id)?))
}

async fn move_card(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<MoveCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let list_id = required_id(req.list_id, "list_id")?;
    let position = required_position(req.position)?;
    let card = state
        .db
        .call(move |db| db.move_card(id, list_id, position))
        .await?;
    Ok(Json(found(card, Entity::Card, id)?))
}

async fn delete_card(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_card(id)).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(BoardError::not_found(Entity::Card, id).into()),
    }
}

// Labels

async fn labels_for_board(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(board_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let labels = state
        .db
        .call(move |db| {
            if db.get_board(board_id, user.id)?.is_none() {
                return Err(BoardError::not_found(Entity::Board, board_id).into());
            }
            db.list_labels(board_id)
        })
        .await?;
    Ok(Json(labels))
}

async fn labels_for_card(
    State(state): State<SharedState>,
    ApiPath(card_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let labels = state
        .db
        .call(move |db| {
            if db.get_card(card_id)?.is_none() {
                return Err(BoardError::not_found(Entity::Card, card_id).into());
            }
            db.labels_for_card(card_id)
        })
        .await?;
    Ok(Json(labels))
}

async fn cards_for_label(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = state
        .db
        .call(move |db| {
            if db.get_label(id)?.is_none() {
                return Err(BoardError::not_found(Entity::Label, id).into());
            }
            db.cards_with_label(id)
        })
        .await?;
    Ok(Json(cards))
}

async fn create_label(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateLabelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = required_text(req.title, "title")?;
    let color = required_text(req.color, "color")?;
    let board_id = required_id(req.board_id, "board_id")?;
    let label = state
        .db
        .call(move |db| {
            if db.get_board(board_id, user.id)?.is_none() {
                return Err(BoardError::not_found(Entity::Board, board_id).into());
            }
            db.create_label(board_id, &title, &color)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(label)))
}

async fn update_label(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateLabelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = LabelPatch {
        title: optional_text(req.title, "title")?,
        color: optional_text(req.color, "color")?,
    };
    let label = state.db.call(move |db| db.update_label(id, &patch)).await?;
    Ok(Json(found(label, Entity::Label, id)?))
}

async fn delete_label(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_label(id)).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(BoardError::not_found(Entity::Label, id).into()),
    }
}

async fn attach_label(
    State(state): State<SharedState>,
    ApiPath((card_id, label_id)): ApiPath<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| db.attach_label(card_id, label_id))
        .await?;
    Ok(Json(serde_json::json!({"message": "Label added to card"})))
}

async fn detach_label(
    State(state): State<SharedState>,
    ApiPath((card_id, label_id)): ApiPath<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .db
        .call(move |db| db.detach_label(card_id, label_id))
        .await?;
    match removed {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ApiError::NotFound("Label assignment not found".to_string())),
    }
}

// Comments

async fn comments_for_card(
    State(state): State<SharedState>,
    ApiPath(card_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = state
        .db
        .call(move |db| {
            if db.get_card(card_id)?.is_none() {
                return Err(BoardError::not_found(Entity::Card, card_id).into());
            }
            db.list_comments(card_id)
        })
        .await?;
    Ok(Json(comments))
}

async fn comment_count(
    State(state): State<SharedState>,
    ApiPath(card_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state
        .db
        .call(move |db| {
            if db.get_card(card_id)?.is_none() {
                return Err(BoardError::not_found(Entity::Card, card_id).into());
            }
            db.count_comments(card_id)
        })
        .await?;
    Ok(Json(serde_json::json!({"count": count})))
}

async fn create_comment(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required_text(req.content, "content")?;
    let card_id = required_id(req.card_id, "card_id")?;
    let author = optional_text(req.author, "author")?.unwrap_or(user.username);
    let comment = state
        .db
        .call(move |db| db.create_comment(card_id, &content, &author))
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required_text(req.content, "content")?;
    let comment = state
        .db
        .call(move |db| db.update_comment(id, &content))
        .await?;
    Ok(Json(found(comment, Entity::Comment, id)?))
}

async fn delete_comment(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_comment(id)).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(BoardError::not_found(Entity::Comment, id).into()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
