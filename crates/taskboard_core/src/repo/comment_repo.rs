//! Task comment persistence.
//!
//! # Responsibility
//! - Store free-text comments on tasks.
//!
//! # Invariants
//! - Comments are listed newest first; equal timestamps keep insertion order.
//! - Comments are not positioned members; they never touch sibling ranks.
//! - Deleting a task removes its comments (`ON DELETE CASCADE`).

use crate::config::RetryPolicy;
use crate::logging::log_outcome;
use crate::model::comment::{normalize_body, Comment, CommentId, NewComment};
use crate::model::task::TaskId;
use crate::repo::{
    ensure_schema_ready, parse_uuid, with_write_tx, EntityKind, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};
use std::time::Instant;
use uuid::Uuid;

const COMMENT_SELECT_SQL: &str = "SELECT
    uuid,
    task_uuid,
    author,
    body,
    created_at,
    updated_at
FROM comments";

/// Result of an edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub comment: Comment,
    /// `false` when the new body equals the stored one.
    pub changed: bool,
}

/// Repository interface for task comments.
pub trait CommentRepository {
    /// Stores a comment stamped with `now_ms`.
    fn add_comment(&self, input: &NewComment, now_ms: i64) -> RepoResult<Comment>;
    /// Lists comments of one task, newest first.
    fn list_comments(&self, task_uuid: TaskId) -> RepoResult<Vec<Comment>>;
    fn edit_comment(&self, comment_uuid: CommentId, body: &str, now_ms: i64)
        -> RepoResult<CommentEdit>;
    fn delete_comment(&self, comment_uuid: CommentId) -> RepoResult<Comment>;
}

/// SQLite-backed comment repository.
pub struct SqliteCommentRepository<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> SqliteCommentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["tasks", "comments"])?;
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

impl CommentRepository for SqliteCommentRepository<'_> {
    fn add_comment(&self, input: &NewComment, now_ms: i64) -> RepoResult<Comment> {
        let started_at = Instant::now();
        let input = input.normalized()?;
        let comment = Comment {
            uuid: Uuid::new_v4(),
            task_uuid: input.task_uuid,
            author: input.author,
            body: input.body,
            created_at: now_ms,
            updated_at: now_ms,
        };

        let result = with_write_tx(self.conn, self.retry, |tx| {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE uuid = ?1);",
                [comment.task_uuid.to_string()],
                |row| row.get(0),
            )?;
            if exists != 1 {
                return Err(RepoError::ContainerNotFound {
                    kind: EntityKind::Task,
                    id: comment.task_uuid,
                });
            }
            tx.execute(
                "INSERT INTO comments (uuid, task_uuid, author, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    comment.uuid.to_string(),
                    comment.task_uuid.to_string(),
                    comment.author.as_deref(),
                    comment.body.as_str(),
                    comment.created_at,
                    comment.updated_at,
                ],
            )?;
            Ok(comment.clone())
        });
        log_outcome(
            "comment_add",
            "comment_repo",
            started_at,
            &format!("comment={} task={}", comment.uuid, comment.task_uuid),
            &result,
        );
        result
    }

    fn list_comments(&self, task_uuid: TaskId) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE task_uuid = ?1
             ORDER BY created_at DESC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([task_uuid.to_string()])?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }

    fn edit_comment(
        &self,
        comment_uuid: CommentId,
        body: &str,
        now_ms: i64,
    ) -> RepoResult<CommentEdit> {
        let started_at = Instant::now();
        let body = normalize_body(body)?;
        let result = with_write_tx(self.conn, self.retry, |tx| {
            let current = load_required_comment(tx, comment_uuid)?;
            if current.body == body {
                return Ok(CommentEdit {
                    comment: current,
                    changed: false,
                });
            }
            tx.execute(
                "UPDATE comments SET body = ?2, updated_at = ?3 WHERE uuid = ?1;",
                params![comment_uuid.to_string(), body.as_str(), now_ms],
            )?;
            Ok(CommentEdit {
                comment: load_required_comment(tx, comment_uuid)?,
                changed: true,
            })
        });
        log_outcome(
            "comment_edit",
            "comment_repo",
            started_at,
            &format!("comment={comment_uuid}"),
            &result,
        );
        result
    }

    fn delete_comment(&self, comment_uuid: CommentId) -> RepoResult<Comment> {
        with_write_tx(self.conn, self.retry, |tx| {
            let comment = load_required_comment(tx, comment_uuid)?;
            tx.execute(
                "DELETE FROM comments WHERE uuid = ?1;",
                [comment_uuid.to_string()],
            )?;
            Ok(comment)
        })
    }
}

fn load_required_comment(conn: &Connection, comment_uuid: CommentId) -> RepoResult<Comment> {
    let mut stmt = conn.prepare_cached(&format!("{COMMENT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([comment_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_comment_row(row);
    }
    Err(RepoError::MemberNotFound {
        kind: EntityKind::Comment,
        id: comment_uuid,
    })
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    let uuid_text: String = row.get("uuid")?;
    let task_text: String = row.get("task_uuid")?;
    Ok(Comment {
        uuid: parse_uuid(&uuid_text, "comments.uuid")?,
        task_uuid: parse_uuid(&task_text, "comments.task_uuid")?,
        author: row.get("author")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
