//! Request principal.
//!
//! Callers identify themselves with an `X-User-Id` header. Requests without
//! one act as the default user seeded at start-up.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use super::api::{ApiError, SharedState};
use super::models::User;
use crate::errors::BoardError;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

fn user_header(headers: &HeaderMap) -> Option<Result<String, BoardError>> {
    let raw = headers.get(USER_HEADER)?;
    let value = match raw.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            return Some(Err(BoardError::UnknownUser {
                id: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
            }));
        }
    };
    if value.is_empty() || value.len() > 20 {
        return Some(Err(BoardError::UnknownUser {
            id: value.to_string(),
        }));
    }
    Some(Ok(value.to_string()))
}

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let raw = match user_header(&parts.headers) {
            None => return Ok(CurrentUser::from(&state.default_user)),
            Some(header) => header?,
        };
        let id: i64 = raw
            .parse()
            .map_err(|_| BoardError::UnknownUser { id: raw.clone() })?;

        match state.db.call(move |db| db.get_user(id)).await? {
            Some(user) => Ok(CurrentUser::from(&user)),
            None => Err(BoardError::UnknownUser { id: raw }.into()),
        }
    }
}
