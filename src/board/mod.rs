//! Board service: a Kanban back-end for boards, lists, cards, labels, and
//! comments stored in SQLite and served over a JSON HTTP API.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘   JSON   │         │  auth.rs (CurrentUser extractor)       │
//!                       │         │                                        │
//!                       │         │ DbHandle::call(|db| ...)               │
//!                       │         v                                        │
//!                       │  db.rs  (BoardDb repositories, schema)           │
//!                       │         │                                        │
//!                       │         │ create / move / delete of lists, cards │
//!                       │         v                                        │
//!                       │  position.rs  (dense sibling positions)          │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Typical Request Flow (drag a card to another list)
//!
//! 1. `PATCH /api/cards/{id}/move` with `{list_id, position}` → `api::move_card()`
//! 2. Missing fields or a negative position are rejected with 400.
//! 3. `BoardDb::move_card()` locates the card and checks the target list,
//!    then opens a transaction.
//! 4. `position::CARDS.relocate()` closes the gap in the source list, opens a
//!    slot in the target list, and writes the card's new list and position.
//! 5. The transaction commits and the updated card is returned as JSON.

pub mod api;
pub mod auth;
pub mod db;
pub mod models;
pub mod position;
pub mod server;
