//! Project, board, and list repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist projects, boards, and the ordered lists of each board.
//! - Keep list ordering dense through the shared sibling store.
//! - Resynchronize task status labels when a list is renamed.
//!
//! # Invariants
//! - A new board and its default lists commit together.
//! - List listing is deterministic: `position ASC, created_at ASC, uuid ASC`.
//! - After `rename_list` commits, every task in the list carries the new name.

use crate::config::RetryPolicy;
use crate::logging::log_outcome;
use crate::model::board::{Board, BoardId, BoardList, BoardSnapshot, ListId, Project, ProjectId};
use crate::repo::sibling_store::{BOARD_LISTS, LIST_TASKS};
use crate::repo::{
    ensure_schema_ready, parse_bool, parse_uuid, with_write_tx, EntityKind, ReorderOutcome,
    RepoError, RepoResult, bool_to_int,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::time::Instant;
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str = "SELECT uuid, name, description, archived, created_at, updated_at
FROM projects";
const BOARD_SELECT_SQL: &str = "SELECT uuid, project_uuid, name, created_at, updated_at
FROM boards";
const LIST_SELECT_SQL: &str = "SELECT uuid, board_uuid, name, position, created_at, updated_at
FROM board_lists";

/// Result of a committed list rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRename {
    pub list: BoardList,
    pub previous_name: String,
    /// Tasks whose status label was rewritten.
    pub resynced_tasks: usize,
}

/// Result of a committed list deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRemoval {
    pub list_uuid: ListId,
    pub board_uuid: BoardId,
    pub removed_tasks: usize,
}

/// Repository interface for projects, boards, and lists.
pub trait BoardRepository {
    fn create_project(&self, name: &str, description: &str) -> RepoResult<Project>;
    fn get_project(&self, project_uuid: ProjectId) -> RepoResult<Option<Project>>;
    /// Lists projects, newest first.
    fn list_projects(&self, include_archived: bool) -> RepoResult<Vec<Project>>;
    fn set_project_archived(&self, project_uuid: ProjectId, archived: bool) -> RepoResult<Project>;
    /// Creates a board and its seeded lists at positions `1..=N`.
    fn create_board(
        &self,
        project_uuid: ProjectId,
        name: &str,
        default_lists: &[String],
    ) -> RepoResult<BoardSnapshot>;
    fn get_board(&self, board_uuid: BoardId) -> RepoResult<Option<BoardSnapshot>>;
    fn list_boards(&self, project_uuid: ProjectId) -> RepoResult<Vec<Board>>;
    /// Creates a list at the end of the board, or at `position` with shift.
    fn create_list(
        &self,
        board_uuid: BoardId,
        name: &str,
        position: Option<i64>,
    ) -> RepoResult<BoardList>;
    fn get_list(&self, list_uuid: ListId) -> RepoResult<Option<BoardList>>;
    fn list_lists(&self, board_uuid: BoardId) -> RepoResult<Vec<BoardList>>;
    fn rename_list(&self, list_uuid: ListId, name: &str) -> RepoResult<ListRename>;
    /// Rewrites list positions to match `ordered`, or rejects the whole batch.
    fn reorder_lists(&self, board_uuid: BoardId, ordered: &[ListId]) -> RepoResult<ReorderOutcome>;
    /// Deletes a list and its tasks. Remaining lists keep their positions.
    fn delete_list(&self, list_uuid: ListId) -> RepoResult<ListRemoval>;
}

/// SQLite-backed board repository.
pub struct SqliteBoardRepository<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> SqliteBoardRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["projects", "boards", "board_lists", "tasks"])?;
        Ok(Self {
            conn,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl BoardRepository for SqliteBoardRepository<'_> {
    fn create_project(&self, name: &str, description: &str) -> RepoResult<Project> {
        let project_uuid = Uuid::new_v4();
        with_write_tx(self.conn, self.retry, |tx| {
            tx.execute(
                "INSERT INTO projects (uuid, name, description) VALUES (?1, ?2, ?3);",
                params![project_uuid.to_string(), name, description],
            )?;
            load_project(tx, project_uuid)?.ok_or(RepoError::MemberNotFound {
                kind: EntityKind::Project,
                id: project_uuid,
            })
        })
    }

    fn get_project(&self, project_uuid: ProjectId) -> RepoResult<Option<Project>> {
        load_project(self.conn, project_uuid)
    }

    fn list_projects(&self, include_archived: bool) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL}
             WHERE (?1 = 1 OR archived = 0)
             ORDER BY created_at DESC, name ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_archived)])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn set_project_archived(&self, project_uuid: ProjectId, archived: bool) -> RepoResult<Project> {
        with_write_tx(self.conn, self.retry, |tx| {
            let changed = tx.execute(
                "UPDATE projects
                 SET archived = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![project_uuid.to_string(), bool_to_int(archived)],
            )?;
            if changed == 0 {
                return Err(RepoError::MemberNotFound {
                    kind: EntityKind::Project,
                    id: project_uuid,
                });
            }
            load_project(tx, project_uuid)?.ok_or(RepoError::MemberNotFound {
                kind: EntityKind::Project,
                id: project_uuid,
            })
        })
    }

    fn create_board(
        &self,
        project_uuid: ProjectId,
        name: &str,
        default_lists: &[String],
    ) -> RepoResult<BoardSnapshot> {
        let started_at = Instant::now();
        let board_uuid = Uuid::new_v4();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            if load_project(tx, project_uuid)?.is_none() {
                return Err(RepoError::ContainerNotFound {
                    kind: EntityKind::Project,
                    id: project_uuid,
                });
            }
            let taken: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM boards WHERE project_uuid = ?1 AND name = ?2);",
                params![project_uuid.to_string(), name],
                |row| row.get(0),
            )?;
            if taken == 1 {
                return Err(RepoError::DuplicateName {
                    kind: EntityKind::Board,
                    name: name.to_string(),
                });
            }

            tx.execute(
                "INSERT INTO boards (uuid, project_uuid, name) VALUES (?1, ?2, ?3);",
                params![board_uuid.to_string(), project_uuid.to_string(), name],
            )?;
            for (index, list_name) in default_lists.iter().enumerate() {
                tx.execute(
                    "INSERT INTO board_lists (uuid, board_uuid, name, position)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![
                        Uuid::new_v4().to_string(),
                        board_uuid.to_string(),
                        list_name,
                        index as i64 + 1,
                    ],
                )?;
            }
            load_snapshot(tx, board_uuid)?.ok_or(RepoError::MemberNotFound {
                kind: EntityKind::Board,
                id: board_uuid,
            })
        });
        log_outcome(
            "board_create",
            "board_repo",
            started_at,
            &format!("board={board_uuid} lists={}", default_lists.len()),
            &result,
        );
        result
    }

    fn get_board(&self, board_uuid: BoardId) -> RepoResult<Option<BoardSnapshot>> {
        load_snapshot(self.conn, board_uuid)
    }

    fn list_boards(&self, project_uuid: ProjectId) -> RepoResult<Vec<Board>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BOARD_SELECT_SQL}
             WHERE project_uuid = ?1
             ORDER BY name ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([project_uuid.to_string()])?;
        let mut boards = Vec::new();
        while let Some(row) = rows.next()? {
            boards.push(parse_board_row(row)?);
        }
        Ok(boards)
    }

    fn create_list(
        &self,
        board_uuid: BoardId,
        name: &str,
        position: Option<i64>,
    ) -> RepoResult<BoardList> {
        let started_at = Instant::now();
        let list_uuid = Uuid::new_v4();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            BOARD_LISTS.ensure_container(tx, board_uuid)?;
            ensure_list_name_free(tx, board_uuid, name, None)?;

            let position = BOARD_LISTS.open_slot(tx, board_uuid, list_uuid, position)?;
            tx.execute(
                "INSERT INTO board_lists (uuid, board_uuid, name, position)
                 VALUES (?1, ?2, ?3, ?4);",
                params![list_uuid.to_string(), board_uuid.to_string(), name, position],
            )?;
            load_list(tx, list_uuid)?.ok_or(RepoError::MemberNotFound {
                kind: EntityKind::List,
                id: list_uuid,
            })
        });
        log_outcome(
            "list_create",
            "board_repo",
            started_at,
            &format!("board={board_uuid} list={list_uuid}"),
            &result,
        );
        result
    }

    fn get_list(&self, list_uuid: ListId) -> RepoResult<Option<BoardList>> {
        load_list(self.conn, list_uuid)
    }

    fn list_lists(&self, board_uuid: BoardId) -> RepoResult<Vec<BoardList>> {
        load_lists(self.conn, board_uuid)
    }

    fn rename_list(&self, list_uuid: ListId, name: &str) -> RepoResult<ListRename> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            let current = load_list(tx, list_uuid)?.ok_or(RepoError::MemberNotFound {
                kind: EntityKind::List,
                id: list_uuid,
            })?;
            if current.name == name {
                return Ok(ListRename {
                    previous_name: current.name.clone(),
                    list: current,
                    resynced_tasks: 0,
                });
            }
            ensure_list_name_free(tx, current.board_uuid, name, Some(list_uuid))?;

            tx.execute(
                "UPDATE board_lists
                 SET name = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![list_uuid.to_string(), name],
            )?;
            let list = load_list(tx, list_uuid)?.ok_or(RepoError::MemberNotFound {
                kind: EntityKind::List,
                id: list_uuid,
            })?;
            let resynced_tasks = tx.execute(
                "UPDATE tasks
                 SET status = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE list_uuid = ?1
                   AND status <> ?2;",
                params![list_uuid.to_string(), list.status_label()],
            )?;
            Ok(ListRename {
                list,
                previous_name: current.name,
                resynced_tasks,
            })
        });
        log_outcome(
            "list_rename",
            "board_repo",
            started_at,
            &format!("list={list_uuid}"),
            &result,
        );
        result
    }

    fn reorder_lists(&self, board_uuid: BoardId, ordered: &[ListId]) -> RepoResult<ReorderOutcome> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            BOARD_LISTS.reorder(tx, board_uuid, ordered)
        });
        log_outcome(
            "list_reorder",
            "board_repo",
            started_at,
            &format!("board={board_uuid} ids={}", ordered.len()),
            &result,
        );
        result
    }

    fn delete_list(&self, list_uuid: ListId) -> RepoResult<ListRemoval> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            let (board_uuid, _) = BOARD_LISTS.locate(tx, list_uuid)?;
            let removed_tasks = LIST_TASKS.load_order(tx, list_uuid)?.len();
            tx.execute(
                "DELETE FROM board_lists WHERE uuid = ?1;",
                [list_uuid.to_string()],
            )?;
            Ok(ListRemoval {
                list_uuid,
                board_uuid,
                removed_tasks,
            })
        });
        log_outcome(
            "list_delete",
            "board_repo",
            started_at,
            &format!("list={list_uuid}"),
            &result,
        );
        result
    }
}

/// Loads one list by id. Shared with the task repository for status sync.
pub(crate) fn load_list(conn: &Connection, list_uuid: ListId) -> RepoResult<Option<BoardList>> {
    let mut stmt = conn.prepare_cached(&format!("{LIST_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([list_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_list_row(row)?));
    }
    Ok(None)
}

/// Loads the project owning the board that holds `list_uuid`.
pub(crate) fn list_project(conn: &Connection, list_uuid: ListId) -> RepoResult<Option<ProjectId>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT b.project_uuid
             FROM board_lists l
             INNER JOIN boards b ON b.uuid = l.board_uuid
             WHERE l.uuid = ?1;",
            [list_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|text| parse_uuid(&text, "boards.project_uuid"))
        .transpose()
}

fn load_project(conn: &Connection, project_uuid: ProjectId) -> RepoResult<Option<Project>> {
    let mut stmt = conn.prepare_cached(&format!("{PROJECT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([project_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(row)?));
    }
    Ok(None)
}

fn load_snapshot(conn: &Connection, board_uuid: BoardId) -> RepoResult<Option<BoardSnapshot>> {
    let mut stmt = conn.prepare_cached(&format!("{BOARD_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([board_uuid.to_string()])?;
    let board = match rows.next()? {
        Some(row) => parse_board_row(row)?,
        None => return Ok(None),
    };
    let lists = load_lists(conn, board_uuid)?;
    Ok(Some(BoardSnapshot { board, lists }))
}

fn load_lists(conn: &Connection, board_uuid: BoardId) -> RepoResult<Vec<BoardList>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{LIST_SELECT_SQL}
         WHERE board_uuid = ?1
         ORDER BY position ASC, created_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([board_uuid.to_string()])?;
    let mut lists = Vec::new();
    while let Some(row) = rows.next()? {
        lists.push(parse_list_row(row)?);
    }
    Ok(lists)
}

fn ensure_list_name_free(
    conn: &Connection,
    board_uuid: BoardId,
    name: &str,
    except: Option<ListId>,
) -> RepoResult<()> {
    let taken: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM board_lists
            WHERE board_uuid = ?1
              AND name = ?2
              AND (?3 IS NULL OR uuid <> ?3)
        );",
        params![
            board_uuid.to_string(),
            name,
            except.map(|value| value.to_string()),
        ],
        |row| row.get(0),
    )?;
    if taken == 1 {
        return Err(RepoError::DuplicateName {
            kind: EntityKind::List,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Project {
        uuid: parse_uuid(&uuid_text, "projects.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        archived: parse_bool(row.get("archived")?, "projects.archived")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_board_row(row: &Row<'_>) -> RepoResult<Board> {
    let uuid_text: String = row.get("uuid")?;
    let project_text: String = row.get("project_uuid")?;
    Ok(Board {
        uuid: parse_uuid(&uuid_text, "boards.uuid")?,
        project_uuid: parse_uuid(&project_text, "boards.project_uuid")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_list_row(row: &Row<'_>) -> RepoResult<BoardList> {
    let uuid_text: String = row.get("uuid")?;
    let board_text: String = row.get("board_uuid")?;
    Ok(BoardList {
        uuid: parse_uuid(&uuid_text, "board_lists.uuid")?,
        board_uuid: parse_uuid(&board_text, "board_lists.board_uuid")?,
        name: row.get("name")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
