//! Notification persistence with dedupe window.
//!
//! # Responsibility
//! - Store per-recipient notifications about tasks.
//! - Suppress a draft whose `dedupe_key` was stored within the window.
//!
//! # Invariants
//! - Dedupe check and insert share one write transaction.
//! - Listing is sorted by `created_at DESC, uuid ASC`.

use crate::config::RetryPolicy;
use crate::model::task::TaskId;
use crate::repo::{
    ensure_schema_ready, parse_bool, parse_uuid, with_write_tx, EntityKind, RepoError, RepoResult,
};
use log::debug;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskDueSoon,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::TaskDueSoon => "task_due_soon",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task_assigned" => Some(Self::TaskAssigned),
            "task_due_soon" => Some(Self::TaskDueSoon),
            _ => None,
        }
    }
}

/// Stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub uuid: NotificationId,
    pub recipient: String,
    pub kind: NotificationKind,
    pub task_uuid: TaskId,
    pub message: String,
    pub dedupe_key: String,
    pub is_read: bool,
    pub created_at: i64,
}

/// Notification waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient: String,
    pub kind: NotificationKind,
    pub task_uuid: TaskId,
    pub message: String,
    pub dedupe_key: String,
}

/// Repository interface for notifications.
pub trait NotificationRepository {
    /// Stores `draft` unless a notification with the same dedupe key exists
    /// with `created_at > now_ms - dedupe_window_ms`. `None` means suppressed.
    fn enqueue(
        &self,
        draft: &NotificationDraft,
        now_ms: i64,
        dedupe_window_ms: i64,
    ) -> RepoResult<Option<Notification>>;
    fn list_for(&self, recipient: &str, unread_only: bool) -> RepoResult<Vec<Notification>>;
    /// Marks one notification read. Scoped to `recipient`.
    fn mark_read(&self, notification_uuid: NotificationId, recipient: &str)
        -> RepoResult<Notification>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["notifications"])?;
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

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    uuid,
    recipient,
    kind,
    task_uuid,
    message,
    dedupe_key,
    is_read,
    created_at
FROM notifications";

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn enqueue(
        &self,
        draft: &NotificationDraft,
        now_ms: i64,
        dedupe_window_ms: i64,
    ) -> RepoResult<Option<Notification>> {
        with_write_tx(self.conn, self.retry, |tx| {
            let recent: i64 = tx.query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM notifications
                    WHERE dedupe_key = ?1 AND created_at > ?2
                );",
                params![draft.dedupe_key.as_str(), now_ms - dedupe_window_ms],
                |row| row.get(0),
            )?;
            if recent == 1 {
                debug!(
                    "event=notification_enqueue module=notification_repo status=suppressed dedupe_key={}",
                    draft.dedupe_key
                );
                return Ok(None);
            }

            let notification = Notification {
                uuid: Uuid::new_v4(),
                recipient: draft.recipient.clone(),
                kind: draft.kind,
                task_uuid: draft.task_uuid,
                message: draft.message.clone(),
                dedupe_key: draft.dedupe_key.clone(),
                is_read: false,
                created_at: now_ms,
            };
            tx.execute(
                "INSERT INTO notifications (
                    uuid,
                    recipient,
                    kind,
                    task_uuid,
                    message,
                    dedupe_key,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    notification.uuid.to_string(),
                    notification.recipient.as_str(),
                    notification.kind.as_str(),
                    notification.task_uuid.to_string(),
                    notification.message.as_str(),
                    notification.dedupe_key.as_str(),
                    notification.created_at,
                ],
            )?;
            Ok(Some(notification))
        })
    }

    fn list_for(&self, recipient: &str, unread_only: bool) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE recipient = ?1 AND (?2 = 0 OR is_read = 0)
             ORDER BY created_at DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![recipient, i64::from(unread_only)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }

    fn mark_read(
        &self,
        notification_uuid: NotificationId,
        recipient: &str,
    ) -> RepoResult<Notification> {
        with_write_tx(self.conn, self.retry, |tx| {
            let changed = tx.execute(
                "UPDATE notifications SET is_read = 1 WHERE uuid = ?1 AND recipient = ?2;",
                params![notification_uuid.to_string(), recipient],
            )?;
            if changed == 0 {
                return Err(RepoError::MemberNotFound {
                    kind: EntityKind::Notification,
                    id: notification_uuid,
                });
            }
            let mut stmt =
                tx.prepare_cached(&format!("{NOTIFICATION_SELECT_SQL} WHERE uuid = ?1;"))?;
            let mut rows = stmt.query([notification_uuid.to_string()])?;
            if let Some(row) = rows.next()? {
                return parse_notification_row(row);
            }
            Err(RepoError::MemberNotFound {
                kind: EntityKind::Notification,
                id: notification_uuid,
            })
        })
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let uuid_text: String = row.get("uuid")?;
    let task_text: String = row.get("task_uuid")?;
    let kind_text: String = row.get("kind")?;
    let kind = NotificationKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid notification kind `{kind_text}` in notifications.kind"
        ))
    })?;
    Ok(Notification {
        uuid: parse_uuid(&uuid_text, "notifications.uuid")?,
        recipient: row.get("recipient")?,
        kind,
        task_uuid: parse_uuid(&task_text, "notifications.task_uuid")?,
        message: row.get("message")?,
        dedupe_key: row.get("dedupe_key")?,
        is_read: parse_bool(row.get("is_read")?, "notifications.is_read")?,
        created_at: row.get("created_at")?,
    })
}
