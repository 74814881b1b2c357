//! Position-column access shared by every ordered sibling table.
//!
//! # Invariants
//! - Callers run these inside the operation's write transaction.
//! - Sibling index is rebuilt as `position ASC, created_at ASC, uuid ASC`.

use crate::model::placement::{PositionWrite, SiblingOrder, StoredPosition};
use crate::repo::{parse_uuid, EntityKind, ReorderOutcome, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Table holding members of one container family.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SiblingTable {
    pub table: &'static str,
    pub container_column: &'static str,
    pub container_table: &'static str,
    pub container_kind: EntityKind,
    pub member_kind: EntityKind,
}

pub(crate) const BOARD_LISTS: SiblingTable = SiblingTable {
    table: "board_lists",
    container_column: "board_uuid",
    container_table: "boards",
    container_kind: EntityKind::Board,
    member_kind: EntityKind::List,
};

pub(crate) const LIST_TASKS: SiblingTable = SiblingTable {
    table: "tasks",
    container_column: "list_uuid",
    container_table: "board_lists",
    container_kind: EntityKind::List,
    member_kind: EntityKind::Task,
};

pub(crate) const TASK_SUBTASKS: SiblingTable = SiblingTable {
    table: "subtasks",
    container_column: "task_uuid",
    container_table: "tasks",
    container_kind: EntityKind::Task,
    member_kind: EntityKind::Subtask,
};

impl SiblingTable {
    pub fn ensure_container(&self, conn: &Connection, container: Uuid) -> RepoResult<()> {
        let exists: i64 = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE uuid = ?1);",
                self.container_table
            ),
            [container.to_string()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Ok(())
        } else {
            Err(RepoError::ContainerNotFound {
                kind: self.container_kind,
                id: container,
            })
        }
    }

    /// Position allocator: highest stored position plus one, or 1.
    pub fn next_position(&self, conn: &Connection, container: Uuid) -> RepoResult<i64> {
        let max: Option<i64> = conn.query_row(
            &format!(
                "SELECT MAX(position) FROM {} WHERE {} = ?1;",
                self.table, self.container_column
            ),
            [container.to_string()],
            |row| row.get(0),
        )?;
        Ok(crate::model::placement::next_position(max))
    }

    /// Rebuilds the ordered member index of `container`.
    pub fn load_order(&self, conn: &Connection, container: Uuid) -> RepoResult<SiblingOrder> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT uuid, position
             FROM {}
             WHERE {} = ?1
             ORDER BY position ASC, created_at ASC, uuid ASC;",
            self.table, self.container_column
        ))?;
        let mut rows = stmt.query([container.to_string()])?;
        let mut stored = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            stored.push(StoredPosition {
                id: parse_uuid(&id_text, "uuid")?,
                position: row.get(1)?,
            });
        }
        Ok(SiblingOrder::from_stored(container, stored))
    }

    /// Returns `(container, position)` of one member.
    pub fn locate(&self, conn: &Connection, member: Uuid) -> RepoResult<(Uuid, i64)> {
        let found: Option<(String, i64)> = conn
            .query_row(
                &format!(
                    "SELECT {}, position FROM {} WHERE uuid = ?1;",
                    self.container_column, self.table
                ),
                [member.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (container_text, position) = found.ok_or(RepoError::MemberNotFound {
            kind: self.member_kind,
            id: member,
        })?;
        Ok((parse_uuid(&container_text, self.container_column)?, position))
    }

    pub fn apply_writes(&self, conn: &Connection, writes: &[PositionWrite]) -> RepoResult<usize> {
        if writes.is_empty() {
            return Ok(0);
        }
        let mut stmt = conn.prepare_cached(&format!(
            "UPDATE {}
             SET position = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            self.table
        ))?;
        for write in writes {
            stmt.execute(params![write.id.to_string(), write.position])?;
        }
        Ok(writes.len())
    }

    /// Validates `ordered` against current membership and rewrites changed
    /// positions. Nothing is written when validation fails.
    pub fn reorder(
        &self,
        conn: &Connection,
        container: Uuid,
        ordered: &[Uuid],
    ) -> RepoResult<ReorderOutcome> {
        self.ensure_container(conn, container)?;
        let writes = self.load_order(conn, container)?.plan_reorder(ordered)?;
        let writes = self.apply_writes(conn, &writes)?;
        Ok(ReorderOutcome { container, writes })
    }

    /// Inserts a slot for a new member: returns the position the new row must
    /// be written with, shifting siblings when an explicit slot is requested.
    pub fn open_slot(
        &self,
        conn: &Connection,
        container: Uuid,
        member: Uuid,
        position: Option<i64>,
    ) -> RepoResult<i64> {
        match position {
            None => self.next_position(conn, container),
            Some(requested) => {
                let mut order = self.load_order(conn, container)?;
                let placed = order.insert_at(member, Some(requested));
                self.apply_writes(conn, &order.pending_writes())?;
                Ok(placed)
            }
        }
    }
}
