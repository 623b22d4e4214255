//! Typed error hierarchy for the board service.
//!
//! Repository code works in `anyhow::Result` and attaches context as it goes.
//! Failures the caller must be able to tell apart (a missing row, a missing
//! field) travel as a `BoardError` inside the `anyhow::Error` and are recovered
//! with `downcast` at the HTTP boundary.

use std::fmt;

use thiserror::Error;

/// The kinds of record the service stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Board,
    List,
    Card,
    Label,
    Comment,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::User => "User",
            Entity::Board => "Board",
            Entity::List => "List",
            Entity::Card => "Card",
            Entity::Label => "Label",
            Entity::Comment => "Comment",
        };
        f.write_str(name)
    }
}

/// Errors from the board repositories and request validation.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Invalid {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Label {label_id} belongs to a different board than card {card_id}")]
    LabelBoardMismatch { label_id: i64, card_id: i64 },

    #[error("Unknown user {id}")]
    UnknownUser { id: String },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),
}

impl BoardError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Recover a `BoardError` carried inside an `anyhow::Error`.
    ///
    /// Anything that is not a `BoardError` becomes `Database`.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<BoardError>() {
            Ok(board_err) => board_err,
            Err(other) => BoardError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = BoardError::not_found(Entity::Card, 42);
        assert_eq!(err.to_string(), "Card 42 not found");
    }

    #[test]
    fn missing_field_message_is_field_specific() {
        let err = BoardError::MissingField { field: "board_id" };
        assert_eq!(err.to_string(), "board_id is required");
    }

    #[test]
    fn from_anyhow_recovers_board_error() {
        let wrapped: anyhow::Error = BoardError::not_found(Entity::List, 7).into();
        match BoardError::from_anyhow(wrapped) {
            BoardError::NotFound { entity, id } => {
                assert_eq!(entity, Entity::List);
                assert_eq!(id, 7);
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn from_anyhow_survives_added_context() {
        let wrapped = Err::<(), _>(BoardError::not_found(Entity::Board, 3))
            .context("Failed to create list")
            .unwrap_err();
        assert!(matches!(
            BoardError::from_anyhow(wrapped),
            BoardError::NotFound { entity: Entity::Board, id: 3 }
        ));
    }

    #[test]
    fn from_anyhow_wraps_foreign_errors_as_database() {
        let err = BoardError::from_anyhow(anyhow::anyhow!("disk I/O error"));
        match &err {
            BoardError::Database(inner) => assert!(inner.to_string().contains("disk I/O")),
            other => panic!("Expected Database, got {:?}", other),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&BoardError::LockPoisoned);
        assert_std_error(&BoardError::LabelBoardMismatch { label_id: 1, card_id: 2 });
    }
}
