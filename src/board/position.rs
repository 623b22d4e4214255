//! Dense sibling positions for lists within a board and cards within a list.
//!
//! Every parent's children hold positions `0..n-1`. Creating appends at `n`,
//! deleting closes the gap behind the removed row, and moving shifts the
//! siblings between the old and the new slot by one. Nothing here opens a
//! transaction: the repository wraps each multi-statement change in one and
//! passes the transaction in as `&Connection`.

use std::cmp::Ordering;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// Where a row sits: its parent and its rank among that parent's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub parent_id: i64,
    pub position: i32,
}

/// Add `delta` to every sibling of `parent_id` whose position is in
/// `start..=end` (`end == None` means no upper bound).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub parent_id: i64,
    pub start: i32,
    pub end: Option<i32>,
    pub delta: i32,
}

/// Sibling shifts needed to move a row from `from` to `to`.
///
/// The moved row itself is never covered by a shift.
pub fn plan_move(from: Slot, to: Slot) -> Vec<Shift> {
    if from.parent_id != to.parent_id {
        return vec![
            // Close the gap in the source parent.
            Shift {
                parent_id: from.parent_id,
                start: from.position + 1,
                end: None,
                delta: -1,
            },
            // Open a slot in the target parent.
            Shift {
                parent_id: to.parent_id,
                start: to.position,
                end: None,
                delta: 1,
            },
        ];
    }

    match to.position.cmp(&from.position) {
        Ordering::Greater => vec![Shift {
            parent_id: from.parent_id,
            start: from.position + 1,
            end: Some(to.position),
            delta: -1,
        }],
        Ordering::Less => vec![Shift {
            parent_id: from.parent_id,
            start: to.position,
            end: Some(from.position - 1),
            delta: 1,
        }],
        Ordering::Equal => Vec::new(),
    }
}

/// A table whose rows are ordered by `position` under a parent column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Siblings {
    table: &'static str,
    parent_column: &'static str,
}

/// Lists ordered within a board.
pub const LISTS: Siblings = Siblings {
    table: "lists",
    parent_column: "board_id",
};

/// Cards ordered within a list.
pub const CARDS: Siblings = Siblings {
    table: "cards",
    parent_column: "list_id",
};

impl Siblings {
    pub fn count(&self, conn: &Connection, parent_id: i64) -> Result<i32> {
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                self.table, self.parent_column
            ),
            params![parent_id],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to count {}", self.table))
    }

    /// Position a newly created child of `parent_id` receives.
    pub fn next_position(&self, conn: &Connection, parent_id: i64) -> Result<i32> {
        let max_pos: i32 = conn
            .query_row(
                &format!(
                    "SELECT COALESCE(MAX(position), -1) FROM {} WHERE {} = ?1",
                    self.table, self.parent_column
                ),
                params![parent_id],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to get max position in {}", self.table))?;
        Ok(max_pos + 1)
    }

    pub fn locate(&self, conn: &Connection, id: i64) -> Result<Option<Slot>> {
        conn.query_row(
            &format!(
                "SELECT {}, position FROM {} WHERE id = ?1",
                self.parent_column, self.table
            ),
            params![id],
            |row| {
                Ok(Slot {
                    parent_id: row.get(0)?,
                    position: row.get(1)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to locate row {} in {}", id, self.table))
    }

    /// Positions of every child of `parent_id`, in order.
    pub fn positions(&self, conn: &Connection, parent_id: i64) -> Result<Vec<i32>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT position FROM {} WHERE {} = ?1 ORDER BY position, id",
                self.table, self.parent_column
            ))
            .with_context(|| format!("Failed to prepare positions for {}", self.table))?;
        let rows = stmt
            .query_map(params![parent_id], |row| row.get(0))
            .with_context(|| format!("Failed to query positions in {}", self.table))?;
        let mut positions = Vec::new();
        for row in rows {
            positions.push(row.context("Failed to read position")?);
        }
        Ok(positions)
    }

    /// Clamp a requested target into the valid range for a move out of `from`.
    ///
    /// Within the same parent the last slot is `count - 1`; a different parent
    /// gains a row, so its last slot is `count`.
    pub fn clamp_target(
        &self,
        conn: &Connection,
        from: Slot,
        to_parent: i64,
        requested: i32,
    ) -> Result<i32> {
        let count = self.count(conn, to_parent)?;
        let last = if to_parent == from.parent_id {
            count - 1
        } else {
            count
        };
        Ok(requested.clamp(0, last.max(0)))
    }

    /// Move row `id` from `from` to `requested` under `to_parent`.
    ///
    /// Must run inside a transaction. Returns the slot the row ended up in.
    pub fn relocate(
        &self,
        conn: &Connection,
        id: i64,
        from: Slot,
        to_parent: i64,
        requested: i32,
    ) -> Result<Slot> {
        let to = Slot {
            parent_id: to_parent,
            position: self.clamp_target(conn, from, to_parent, requested)?,
        };

        for shift in plan_move(from, to) {
            self.apply(conn, id, shift)?;
        }

        conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1, position = ?2, updated_at = datetime('now') WHERE id = ?3",
                self.table, self.parent_column
            ),
            params![to.parent_id, to.position, id],
        )
        .with_context(|| format!("Failed to move row {} in {}", id, self.table))?;

        tracing::debug!(
            table = self.table,
            id,
            from_parent = from.parent_id,
            from_position = from.position,
            to_parent = to.parent_id,
            to_position = to.position,
            "relocated row"
        );
        Ok(to)
    }

    /// Pull every sibling after a removed slot back by one.
    pub fn close_gap(&self, conn: &Connection, removed: Slot) -> Result<usize> {
        conn.execute(
            &format!(
                "UPDATE {} SET position = position - 1 WHERE {} = ?1 AND position > ?2",
                self.table, self.parent_column
            ),
            params![removed.parent_id, removed.position],
        )
        .with_context(|| format!("Failed to renumber {}", self.table))
    }

    fn apply(&self, conn: &Connection, moving_id: i64, shift: Shift) -> Result<usize> {
        conn.execute(
            &format!(
                "UPDATE {} SET position = position + ?1
                 WHERE {} = ?2 AND position >= ?3 AND (?4 IS NULL OR position <= ?4) AND id != ?5",
                self.table, self.parent_column
            ),
            params![shift.delta, shift.parent_id, shift.start, shift.end, moving_id],
        )
        .with_context(|| format!("Failed to shift positions in {}", self.table))
    }
}
