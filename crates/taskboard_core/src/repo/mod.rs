//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Own every SQL statement and every write transaction.
//! - Apply placement plans atomically: one `BEGIN IMMEDIATE` per operation.
//! - Map storage failures onto the placement error taxonomy.
//!
//! # Invariants
//! - Validation happens before the first write of an operation.
//! - A failed operation leaves no partial writes (transaction rollback).
//! - Lock contention surfaces as `ConcurrencyConflict` once retries run out.

use crate::config::RetryPolicy;
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::placement::OrderError;
use crate::model::task::TaskValidationError;
use log::warn;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod board_repo;
pub mod comment_repo;
pub mod notification_repo;
pub(crate) mod sibling_store;
pub mod task_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity families addressed by repository errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Board,
    List,
    Task,
    Subtask,
    Comment,
    Notification,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Project => "project",
            Self::Board => "board",
            Self::List => "list",
            Self::Task => "task",
            Self::Subtask => "subtask",
            Self::Comment => "comment",
            Self::Notification => "notification",
        };
        f.write_str(label)
    }
}

/// Repository error taxonomy.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Reorder payload is not a bijection onto the container's members.
    InvalidOrder(OrderError),
    /// Referenced container does not exist.
    ContainerNotFound { kind: EntityKind, id: Uuid },
    /// Referenced member does not exist.
    MemberNotFound { kind: EntityKind, id: Uuid },
    /// Write lock not acquired within the retry budget.
    ConcurrencyConflict { attempts: u32 },
    /// Task input failed field validation.
    Validation(TaskValidationError),
    /// Name already used by a sibling.
    DuplicateName { kind: EntityKind, name: String },
    /// Task and list belong to different projects.
    ProjectMismatch { project_uuid: Uuid, list_uuid: Uuid },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl RepoError {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_busy())
    }

    /// Whether the caller may retry the whole operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. }) || self.is_busy()
    }

    /// Stable machine code for log lines. Never includes user text.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) if self.is_busy() => "db_busy",
            Self::Db(_) => "db_error",
            Self::InvalidOrder(_) => "invalid_order",
            Self::ContainerNotFound { .. } => "container_not_found",
            Self::MemberNotFound { .. } => "member_not_found",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::Validation(_) => "validation",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::ProjectMismatch { .. } => "project_mismatch",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_required_table",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidOrder(err) => write!(f, "invalid order: {err}"),
            Self::ContainerNotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::MemberNotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::ConcurrencyConflict { attempts } => write!(
                f,
                "concurrent write conflict; gave up after {attempts} attempt(s)"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateName { kind, name } => {
                write!(f, "{kind} name already in use: `{name}`")
            }
            Self::ProjectMismatch {
                project_uuid,
                list_uuid,
            } => write!(
                f,
                "list {list_uuid} does not belong to project {project_uuid}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "repository requires table `{table}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidOrder(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<OrderError> for RepoError {
    fn from(value: OrderError) -> Self {
        Self::InvalidOrder(value)
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Outcome of a committed reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub container: Uuid,
    /// Rows whose position actually changed. Zero for a repeated order.
    pub writes: usize,
}

/// Runs `body` inside one `BEGIN IMMEDIATE` transaction and commits it.
///
/// `IMMEDIATE` takes the write lock before the first read, so the
/// read-compute-write sequence of an operation cannot interleave with another
/// writer. Busy failures roll back and re-run `body` per `retry`.
pub(crate) fn with_write_tx<T, F>(conn: &Connection, retry: RetryPolicy, mut body: F) -> RepoResult<T>
where
    F: FnMut(&Transaction<'_>) -> RepoResult<T>,
{
    let attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match run_write_tx(conn, &mut body) {
            Err(err) if err.is_busy() => {
                if attempt >= attempts {
                    warn!(
                        "event=write_tx module=repo status=error error_code=concurrency_conflict attempts={attempt}"
                    );
                    return Err(RepoError::ConcurrencyConflict { attempts: attempt });
                }
                warn!("event=write_tx module=repo status=retry attempt={attempt}");
                std::thread::sleep(retry.backoff_for(attempt));
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn run_write_tx<T, F>(conn: &Connection, body: &mut F) -> RepoResult<T>
where
    F: FnMut(&Transaction<'_>) -> RepoResult<T>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = body(&tx)?;
    tx.commit()?;
    Ok(value)
}

pub(crate) fn ensure_schema_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [*table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
