use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};

use super::models::*;
use super::position::{CARDS, LISTS};
use crate::errors::{BoardError, Entity};

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| BoardError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously from a test.
    #[cfg(test)]
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, BoardDb>> {
        self.inner
            .lock()
            .map_err(|_| BoardError::LockPoisoned.into())
    }
}

#[derive(Debug)]
pub struct BoardDb {
    conn: Connection,
}

const USER_COLUMNS: &str = "id, username, email, created_at";
const BOARD_COLUMNS: &str = "id, title, description, user_id, created_at, updated_at";
const LIST_COLUMNS: &str = "id, title, board_id, position, created_at, updated_at";
const CARD_COLUMNS: &str = "id, title, description, list_id, position, created_at, updated_at";
const LABEL_COLUMNS: &str = "id, title, color, board_id, created_at";
const COMMENT_COLUMNS: &str = "id, content, card_id, author, created_at, updated_at";

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS boards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS cards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    list_id INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS labels (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    color TEXT NOT NULL,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS card_labels (
                    card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                    label_id INTEGER NOT NULL REFERENCES labels(id) ON DELETE CASCADE,
                    PRIMARY KEY (card_id, label_id)
                );

                CREATE TABLE IF NOT EXISTS comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    content TEXT NOT NULL,
                    card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                    author TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_boards_user ON boards(user_id);
                CREATE INDEX IF NOT EXISTS idx_lists_board ON lists(board_id, position);
                CREATE INDEX IF NOT EXISTS idx_cards_list ON cards(list_id, position);
                CREATE INDEX IF NOT EXISTS idx_labels_board ON labels(board_id);
                CREATE INDEX IF NOT EXISTS idx_card_labels_label ON card_labels(label_id);
                CREATE INDEX IF NOT EXISTS idx_comments_card ON comments(card_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Query helpers ─────────────────────────────────────────────────

    fn query_all<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
        what: &str,
    ) -> Result<Vec<T>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare {}", what))?;
        let rows = stmt
            .query_map(params, map)
            .with_context(|| format!("Failed to query {}", what))?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row.with_context(|| format!("Failed to read {} row", what))?);
        }
        Ok(items)
    }

    fn query_one<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
        what: &str,
    ) -> Result<Option<T>> {
        self.conn
            .query_row(sql, params, map)
            .optional()
            .with_context(|| format!("Failed to query {}", what))
    }

    fn exists(&self, entity: Entity, id: i64) -> Result<bool> {
        let table = match entity {
            Entity::User => "users",
            Entity::Board => "boards",
            Entity::List => "lists",
            Entity::Card => "cards",
            Entity::Label => "labels",
            Entity::Comment => "comments",
        };
        self.conn
            .query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table),
                params![id],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to check {} {}", entity, id))
    }

    /// Fail with `BoardError::NotFound` unless the row exists.
    fn require(&self, entity: Entity, id: i64) -> Result<()> {
        if self.exists(entity, id)? {
            Ok(())
        } else {
            Err(BoardError::not_found(entity, id).into())
        }
    }

    // ── Users ─────────────────────────────────────────────────────────

    /// Return the user named `username`, inserting it on first use.
    ///
    /// An email already held by another user is an `InvalidField` error.
    pub fn ensure_user(&self, username: &str, email: &str) -> Result<User> {
        if let Some(user) = self.get_user_by_username(username)? {
            return Ok(user);
        }
        if let Some(owner) = self.get_user_by_email(email)? {
            return Err(BoardError::InvalidField {
                field: "email",
                message: format!(
                    "email '{}' is already used by user '{}'",
                    email, owner.username
                ),
            }
            .into());
        }
        self.conn
            .execute(
                "INSERT INTO users (username, email) VALUES (?1, ?2)",
                params![username, email],
            )
            .context("Failed to insert user")?;
        self.get_user_by_username(username)?
            .with_context(|| format!("User '{}' not found after insert", username))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.query_one(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
            "user",
        )
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.query_one(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            user_from_row,
            "user",
        )
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_one(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            user_from_row,
            "user",
        )
    }

    // ── Board CRUD ────────────────────────────────────────────────────

    pub fn list_boards(&self, user_id: i64) -> Result<Vec<Board>> {
        self.query_all(
            &format!(
                "SELECT {} FROM boards WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                BOARD_COLUMNS
            ),
            params![user_id],
            board_from_row,
            "boards",
        )
    }

    pub fn get_board(&self, id: i64, user_id: i64) -> Result<Option<Board>> {
        self.query_one(
            &format!(
                "SELECT {} FROM boards WHERE id = ?1 AND user_id = ?2",
                BOARD_COLUMNS
            ),
            params![id, user_id],
            board_from_row,
            "board",
        )
    }

    pub fn create_board(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Board> {
        self.conn
            .execute(
                "INSERT INTO boards (title, description, user_id) VALUES (?1, ?2, ?3)",
                params![title, normalize_description(description), user_id],
            )
            .context("Failed to insert board")?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(board_id = id, user_id, "created board");
        self.get_board(id, user_id)?
            .context("Board not found after insert")
    }

    /// Apply a partial update. `None` when the board does not exist for the user.
    pub fn update_board(&self, id: i64, user_id: i64, patch: &BoardPatch) -> Result<Option<Board>> {
        if self.get_board(id, user_id)?.is_none() {
            return Ok(None);
        }
        if patch.is_empty() {
            return self.get_board(id, user_id);
        }

        // Use unchecked_transaction so all updates are atomic.
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        if let Some(t) = &patch.title {
            tx.execute(
                "UPDATE boards SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![t, id],
            )
            .context("Failed to update board title")?;
        }
        if let Some(d) = &patch.description {
            tx.execute(
                "UPDATE boards SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![normalize_description(Some(d.as_str())), id],
            )
            .context("Failed to update board description")?;
        }

        tx.commit().context("Failed to commit board update")?;
        self.get_board(id, user_id)
    }

    pub fn delete_board(&self, id: i64, user_id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM boards WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .context("Failed to delete board")?;
        Ok(count > 0)
    }

    // ── Board view ────────────────────────────────────────────────────

    /// The board with its lists in order, each with its cards in order.
    pub fn get_board_detail(&self, id: i64, user_id: i64) -> Result<Option<BoardDetail>> {
        let board = match self.get_board(id, user_id)? {
            Some(b) => b,
            None => return Ok(None),
        };

        let mut lists = Vec::new();
        for list in self.list_lists(id)? {
            let cards = self.card_summaries(list.id)?;
            lists.push(ListWithCards { list, cards });
        }

        Ok(Some(BoardDetail { board, lists }))
    }

    fn card_summaries(&self, list_id: i64) -> Result<Vec<CardSummary>> {
        let mut summaries = Vec::new();
        for card in self.list_cards(list_id)? {
            let labels = self.labels_for_card(card.id)?;
            let comment_count = self.count_comments(card.id)?;
            summaries.push(CardSummary {
                card,
                labels,
                comment_count,
            });
        }
        Ok(summaries)
    }

    // ── List CRUD ─────────────────────────────────────────────────────

    pub fn list_lists(&self, board_id: i64) -> Result<Vec<List>> {
        self.query_all(
            &format!(
                "SELECT {} FROM lists WHERE board_id = ?1 ORDER BY position",
                LIST_COLUMNS
            ),
            params![board_id],
            list_from_row,
            "lists",
        )
    }

    pub fn get_list(&self, id: i64) -> Result<Option<List>> {
        self.query_one(
            &format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS),
            params![id],
            list_from_row,
            "list",
        )
    }

    pub fn get_list_with_cards(&self, id: i64) -> Result<Option<ListWithCards>> {
        let list = match self.get_list(id)? {
            Some(l) => l,
            None => return Ok(None),
        };
        let cards = self.card_summaries(id)?;
        Ok(Some(ListWithCards { list, cards }))
    }

    /// Append a new list at the end of the board.
    pub fn create_list(&self, board_id: i64, title: &str) -> Result<List> {
        self.require(Entity::Board, board_id)?;
        let position = LISTS.next_position(&self.conn, board_id)?;

        self.conn
            .execute(
                "INSERT INTO lists (title, board_id, position) VALUES (?1, ?2, ?3)",
                params![title, board_id, position],
            )
            .context("Failed to insert list")?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(list_id = id, board_id, position, "created list");
        self.get_list(id)?.context("List not found after insert")
    }

    /// Apply a partial update; a new `position` goes through the move algorithm.
    pub fn update_list(&self, id: i64, patch: &ListPatch) -> Result<Option<List>> {
        let from = match LISTS.locate(&self.conn, id)? {
            Some(slot) => slot,
            None => return Ok(None),
        };
        if patch.is_empty() {
            return self.get_list(id);
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        if let Some(t) = &patch.title {
            tx.execute(
                "UPDATE lists SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![t, id],
            )
            .context("Failed to update list title")?;
        }
        if let Some(position) = patch.position {
            LISTS.relocate(&tx, id, from, from.parent_id, position)?;
        }

        tx.commit().context("Failed to commit list update")?;
        self.get_list(id)
    }

    /// Reorder a list within its board.
    pub fn move_list(&self, id: i64, position: i32) -> Result<Option<List>> {
        self.update_list(
            id,
            &ListPatch {
                title: None,
                position: Some(position),
            },
        )
    }

    /// Delete a list (its cards cascade) and renumber the lists after it.
    pub fn delete_list(&self, id: i64) -> Result<bool> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let slot = match LISTS.locate(&tx, id)? {
            Some(slot) => slot,
            None => return Ok(false),
        };
        tx.execute("DELETE FROM lists WHERE id = ?1", params![id])
            .context("Failed to delete list")?;
        LISTS.close_gap(&tx, slot)?;

        tx.commit().context("Failed to commit list delete")?;
        tracing::debug!(list_id = id, board_id = slot.parent_id, "deleted list");
        Ok(true)
    }

    // ── Card CRUD ─────────────────────────────────────────────────────

    pub fn list_cards(&self, list_id: i64) -> Result<Vec<Card>> {
        self.query_all(
            &format!(
                "SELECT {} FROM cards WHERE list_id = ?1 ORDER BY position",
                CARD_COLUMNS
            ),
            params![list_id],
            card_from_row,
            "cards",
        )
    }

    pub fn get_card(&self, id: i64) -> Result<Option<Card>> {
        self.query_one(
            &format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS),
            params![id],
            card_from_row,
            "card",
        )
    }

    pub fn get_card_detail(&self, id: i64) -> Result<Option<CardDetail>> {
        let card = match self.get_card(id)? {
            Some(c) => c,
            None => return Ok(None),
        };
        let labels = self.labels_for_card(id)?;
        let comments = self.list_comments(id)?;
        Ok(Some(CardDetail {
            card,
            labels,
            comments,
        }))
    }

    /// Append a new card at the end of the list.
    pub fn create_card(&self, list_id: i64, title: &str, description: Option<&str>) -> Result<Card> {
        self.require(Entity::List, list_id)?;
        let position = CARDS.next_position(&self.conn, list_id)?;

        self.conn
            .execute(
                "INSERT INTO cards (title, description, list_id, position) VALUES (?1, ?2, ?3, ?4)",
                params![title, normalize_description(description), list_id, position],
            )
            .context("Failed to insert card")?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(card_id = id, list_id, position, "created card");
        self.get_card(id)?.context("Card not found after insert")
    }

    /// Apply a partial update.
    ///
    /// Field writes and any change of list or position commit together. A new
    /// `list_id` without a `position` appends to the end of that list.
    pub fn update_card(&self, id: i64, patch: &CardPatch) -> Result<Option<Card>> {
        let from = match CARDS.locate(&self.conn, id)? {
            Some(slot) => slot,
            None => return Ok(None),
        };
        if let Some(list_id) = patch.list_id
            && list_id != from.parent_id
        {
            self.check_same_board(from.parent_id, list_id)?;
        }
        if patch.is_empty() {
            return self.get_card(id);
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        if let Some(t) = &patch.title {
            tx.execute(
                "UPDATE cards SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![t, id],
            )
            .context("Failed to update card title")?;
        }
        if let Some(d) = &patch.description {
            tx.execute(
                "UPDATE cards SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![normalize_description(Some(d.as_str())), id],
            )
            .context("Failed to update card description")?;
        }
        if patch.touches_placement() {
            let to_list = patch.list_id.unwrap_or(from.parent_id);
            let position = match patch.position {
                Some(p) => p,
                None if to_list == from.parent_id => from.position,
                // Clamped to the last slot of the target list.
                None => i32::MAX,
            };
            CARDS.relocate(&tx, id, from, to_list, position)?;
        }

        tx.commit().context("Failed to commit card update")?;
        self.get_card(id)
    }

    /// Cards only move between lists of one board, since labels are board-scoped.
    fn check_same_board(&self, from_list: i64, to_list: i64) -> Result<()> {
        let target = self
            .get_list(to_list)?
            .ok_or(BoardError::not_found(Entity::List, to_list))?;
        let source = self
            .get_list(from_list)?
            .ok_or(BoardError::not_found(Entity::List, from_list))?;
        if target.board_id != source.board_id {
            return Err(BoardError::InvalidField {
                field: "list_id",
                message: format!("list {} belongs to a different board", to_list),
            }
            .into());
        }
        Ok(())
    }

    /// Move a card to `position` in `list_id` (which may be its current list).
    pub fn move_card(&self, id: i64, list_id: i64, position: i32) -> Result<Option<Card>> {
        self.update_card(
            id,
            &CardPatch {
                list_id: Some(list_id),
                position: Some(position),
                ..Default::default()
            },
        )
    }

    /// Delete a card and renumber the cards after it.
    pub fn delete_card(&self, id: i64) -> Result<bool> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let slot = match CARDS.locate(&tx, id)? {
            Some(slot) => slot,
            None => return Ok(false),
        };
        tx.execute("DELETE FROM cards WHERE id = ?1", params![id])
            .context("Failed to delete card")?;
        CARDS.close_gap(&tx, slot)?;

        tx.commit().context("Failed to commit card delete")?;
        tracing::debug!(card_id = id, list_id = slot.parent_id, "deleted card");
        Ok(true)
    }

    // ── Labels ────────────────────────────────────────────────────────

    pub fn list_labels(&self, board_id: i64) -> Result<Vec<Label>> {
        self.query_all(
            &format!(
                "SELECT {} FROM labels WHERE board_id = ?1 ORDER BY title, id",
                LABEL_COLUMNS
            ),
            params![board_id],
            label_from_row,
            "labels",
        )
    }

    pub fn labels_for_card(&self, card_id: i64) -> Result<Vec<Label>> {
        self.query_all(
            "SELECT l.id, l.title, l.color, l.board_id, l.created_at
             FROM labels l
             INNER JOIN card_labels cl ON l.id = cl.label_id
             WHERE cl.card_id = ?1
             ORDER BY l.title, l.id",
            params![card_id],
            label_from_row,
            "card labels",
        )
    }

    pub fn get_label(&self, id: i64) -> Result<Option<Label>> {
        self.query_one(
            &format!("SELECT {} FROM labels WHERE id = ?1", LABEL_COLUMNS),
            params![id],
            label_from_row,
            "label",
        )
    }

    pub fn create_label(&self, board_id: i64, title: &str, color: &str) -> Result<Label> {
        self.require(Entity::Board, board_id)?;
        self.conn
            .execute(
                "INSERT INTO labels (title, color, board_id) VALUES (?1, ?2, ?3)",
                params![title, color, board_id],
            )
            .context("Failed to insert label")?;
        let id = self.conn.last_insert_rowid();
        self.get_label(id)?.context("Label not found after insert")
    }

    pub fn update_label(&self, id: i64, patch: &LabelPatch) -> Result<Option<Label>> {
        if patch.is_empty() || !self.exists(Entity::Label, id)? {
            return self.get_label(id);
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        if let Some(t) = &patch.title {
            tx.execute("UPDATE labels SET title = ?1 WHERE id = ?2", params![t, id])
                .context("Failed to update label title")?;
        }
        if let Some(c) = &patch.color {
            tx.execute("UPDATE labels SET color = ?1 WHERE id = ?2", params![c, id])
                .context("Failed to update label color")?;
        }

        tx.commit().context("Failed to commit label update")?;
        self.get_label(id)
    }

    pub fn delete_label(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM labels WHERE id = ?1", params![id])
            .context("Failed to delete label")?;
        Ok(count > 0)
    }

    /// Attach a label to a card. Attaching twice is a no-op.
    ///
    /// Both must exist and the label must belong to the card's board.
    pub fn attach_label(&self, card_id: i64, label_id: i64) -> Result<()> {
        let card_board: i64 = self
            .conn
            .query_row(
                "SELECT l.board_id FROM cards c INNER JOIN lists l ON c.list_id = l.id WHERE c.id = ?1",
                params![card_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up card board")?
            .ok_or(BoardError::not_found(Entity::Card, card_id))?;
        let label = self
            .get_label(label_id)?
            .ok_or(BoardError::not_found(Entity::Label, label_id))?;
        if label.board_id != card_board {
            return Err(BoardError::LabelBoardMismatch { label_id, card_id }.into());
        }

        self.conn
            .execute(
                "INSERT OR IGNORE INTO card_labels (card_id, label_id) VALUES (?1, ?2)",
                params![card_id, label_id],
            )
            .context("Failed to attach label")?;
        Ok(())
    }

    pub fn detach_label(&self, card_id: i64, label_id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM card_labels WHERE card_id = ?1 AND label_id = ?2",
                params![card_id, label_id],
            )
            .context("Failed to detach label")?;
        Ok(count > 0)
    }

    pub fn cards_with_label(&self, label_id: i64) -> Result<Vec<Card>> {
        self.query_all(
            "SELECT c.id, c.title, c.description, c.list_id, c.position, c.created_at, c.updated_at
             FROM cards c
             INNER JOIN card_labels cl ON c.id = cl.card_id
             WHERE cl.label_id = ?1
             ORDER BY c.position, c.id",
            params![label_id],
            card_from_row,
            "labelled cards",
        )
    }

    // ── Comments ──────────────────────────────────────────────────────

    /// Comments on a card, newest first.
    pub fn list_comments(&self, card_id: i64) -> Result<Vec<Comment>> {
        self.query_all(
            &format!(
                "SELECT {} FROM comments WHERE card_id = ?1 ORDER BY created_at DESC, id DESC",
                COMMENT_COLUMNS
            ),
            params![card_id],
            comment_from_row,
            "comments",
        )
    }

    pub fn count_comments(&self, card_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM comments WHERE card_id = ?1",
                params![card_id],
                |row| row.get(0),
            )
            .context("Failed to count comments")
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        self.query_one(
            &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
            params![id],
            comment_from_row,
            "comment",
        )
    }

    pub fn create_comment(&self, card_id: i64, content: &str, author: &str) -> Result<Comment> {
        self.require(Entity::Card, card_id)?;
        self.conn
            .execute(
                "INSERT INTO comments (content, card_id, author) VALUES (?1, ?2, ?3)",
                params![content, card_id, author],
            )
            .context("Failed to insert comment")?;
        let id = self.conn.last_insert_rowid();
        self.get_comment(id)?
            .context("Comment not found after insert")
    }

    pub fn update_comment(&self, id: i64, content: &str) -> Result<Option<Comment>> {
        self.conn
            .execute(
                "UPDATE comments SET content = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![content, id],
            )
            .context("Failed to update comment")?;
        self.get_comment(id)
    }

    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])
            .context("Failed to delete comment")?;
        Ok(count > 0)
    }
}

// ── Row mapping ───────────────────────────────────────────────────────

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        user_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<List> {
    Ok(List {
        id: row.get(0)?,
        title: row.get(1)?,
        board_id: row.get(2)?,
        position: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        list_id: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn label_from_row(row: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get(0)?,
        title: row.get(1)?,
        color: row.get(2)?,
        board_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        content: row.get(1)?,
        card_id: row.get(2)?,
        author: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
