//! Notification derivation from task events.
//!
//! # Responsibility
//! - Turn `TaskCreated`/`TaskUpdated` events into assignment and due-soon
//!   notifications for the task's assignee.
//! - List and acknowledge notifications per recipient.
//!
//! # Invariants
//! - Derivation reads only the event payload, never pre-mutation rows.
//! - Dedupe keys are `task_assigned:<task>:<assignee>` and
//!   `task_due_soon:<task>:<due_at>`.
//! - A due timestamp at or before `now + due_soon_window_ms` is due soon,
//!   including overdue ones.

use crate::config::NotificationConfig;
use crate::events::{DomainEvent, EventSink};
use crate::model::task::Task;
use crate::repo::notification_repo::{
    Notification, NotificationDraft, NotificationId, NotificationKind, NotificationRepository,
};
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::now_ms;
use log::{error, info};

/// Notification service facade.
pub struct NotificationService<R: NotificationRepository> {
    repo: R,
    config: NotificationConfig,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repo: R, config: NotificationConfig) -> Self {
        Self { repo, config }
    }

    /// Derives and stores notifications for one committed event.
    ///
    /// Returns the notifications actually stored; suppressed duplicates are
    /// omitted.
    pub fn handle(&self, event: &DomainEvent, now_ms: i64) -> ServiceResult<Vec<Notification>> {
        let drafts = match event {
            DomainEvent::TaskCreated { task } => self.drafts_for(task, true, true, now_ms),
            DomainEvent::TaskUpdated { change } => {
                let reassigned = change.assignee_changed();
                self.drafts_for(
                    &change.current,
                    reassigned,
                    reassigned || change.due_changed(),
                    now_ms,
                )
            }
            _ => Vec::new(),
        };
        self.store(drafts, now_ms)
    }

    /// Handles events in order and collects every stored notification.
    pub fn dispatch<I>(&self, events: I, now_ms: i64) -> ServiceResult<Vec<Notification>>
    where
        I: IntoIterator<Item = DomainEvent>,
    {
        let mut stored = Vec::new();
        for event in events {
            stored.extend(self.handle(&event, now_ms)?);
        }
        Ok(stored)
    }

    /// Sweeps `tasks` for due-soon reminders. Dedupe keeps repeated sweeps
    /// from notifying twice for the same due timestamp.
    pub fn scan_due_soon(&self, tasks: &[Task], now_ms: i64) -> ServiceResult<Vec<Notification>> {
        let drafts = tasks
            .iter()
            .filter_map(|task| self.due_soon_draft(task, now_ms))
            .collect();
        self.store(drafts, now_ms)
    }

    pub fn list_for(&self, recipient: &str, unread_only: bool) -> ServiceResult<Vec<Notification>> {
        let recipient = normalize_recipient(recipient)?;
        Ok(self.repo.list_for(recipient, unread_only)?)
    }

    pub fn mark_read(
        &self,
        notification_uuid: NotificationId,
        recipient: &str,
    ) -> ServiceResult<Notification> {
        let recipient = normalize_recipient(recipient)?;
        Ok(self.repo.mark_read(notification_uuid, recipient)?)
    }

    fn drafts_for(
        &self,
        task: &Task,
        assigned: bool,
        due_relevant: bool,
        now_ms: i64,
    ) -> Vec<NotificationDraft> {
        let mut drafts = Vec::new();
        if assigned {
            drafts.extend(assigned_draft(task));
        }
        if due_relevant {
            drafts.extend(self.due_soon_draft(task, now_ms));
        }
        drafts
    }

    fn due_soon_draft(&self, task: &Task, now_ms: i64) -> Option<NotificationDraft> {
        let recipient = task.assignee.as_ref()?;
        let due_at = task.due_at?;
        if due_at - now_ms > self.config.due_soon_window_ms {
            return None;
        }
        Some(NotificationDraft {
            recipient: recipient.clone(),
            kind: NotificationKind::TaskDueSoon,
            task_uuid: task.uuid,
            message: format!("Task '{}' is due soon.", task.title),
            dedupe_key: format!("task_due_soon:{}:{due_at}", task.uuid),
        })
    }

    fn store(
        &self,
        drafts: Vec<NotificationDraft>,
        now_ms: i64,
    ) -> ServiceResult<Vec<Notification>> {
        let mut stored = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if let Some(notification) =
                self.repo
                    .enqueue(&draft, now_ms, self.config.dedupe_window_ms)?
            {
                info!(
                    "event=notification_enqueue module=notification_service status=ok kind={} task={}",
                    notification.kind.as_str(),
                    notification.task_uuid
                );
                stored.push(notification);
            }
        }
        Ok(stored)
    }
}

/// Handles each published event immediately against the wall clock.
///
/// Failures are logged and dropped; the mutation that produced the event has
/// already committed.
impl<R: NotificationRepository> EventSink for NotificationService<R> {
    fn publish(&self, event: DomainEvent) {
        if let Err(err) = self.handle(&event, now_ms()) {
            error!(
                "event=notification_dispatch module=notification_service status=error kind={} error={err}",
                event.name()
            );
        }
    }
}

fn assigned_draft(task: &Task) -> Option<NotificationDraft> {
    let recipient = task.assignee.as_ref()?;
    Some(NotificationDraft {
        recipient: recipient.clone(),
        kind: NotificationKind::TaskAssigned,
        task_uuid: task.uuid,
        message: format!("A new task '{}' has been assigned to you.", task.title),
        dedupe_key: format!("task_assigned:{}:{recipient}", task.uuid),
    })
}

fn normalize_recipient(value: &str) -> ServiceResult<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BlankRecipient);
    }
    Ok(trimmed)
}
