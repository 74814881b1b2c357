//! Domain events published after a committed mutation.
//!
//! # Responsibility
//! - Describe what changed so downstream consumers (notifications, realtime
//!   fan-out, audit) can react without reading the database again.
//!
//! # Invariants
//! - Services publish only after the owning transaction committed.
//! - Publishing never fails the mutation that produced the event.

use crate::model::board::{Board, BoardId, BoardList, ListId, Project};
use crate::model::comment::Comment;
use crate::model::task::{Subtask, Task, TaskChange, TaskId};
use log::info;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// One committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ProjectCreated {
        project: Project,
    },
    BoardCreated {
        board: Board,
        lists: Vec<BoardList>,
    },
    ListCreated {
        list: BoardList,
    },
    ListRenamed {
        list: BoardList,
        previous_name: String,
        resynced_tasks: usize,
    },
    ListDeleted {
        list_uuid: ListId,
        board_uuid: BoardId,
        removed_tasks: usize,
    },
    ListsReordered {
        board_uuid: BoardId,
        writes: usize,
    },
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        change: TaskChange,
    },
    TaskMoved {
        task: Task,
        from_list: ListId,
        from_position: i64,
    },
    TaskDeleted {
        task: Task,
    },
    TasksReordered {
        list_uuid: ListId,
        writes: usize,
    },
    SubtaskCreated {
        subtask: Subtask,
    },
    SubtasksReordered {
        task_uuid: TaskId,
        writes: usize,
    },
    CommentAdded {
        comment: Comment,
    },
    CommentEdited {
        comment: Comment,
    },
    CommentDeleted {
        comment: Comment,
    },
}

impl DomainEvent {
    /// Stable `snake_case` name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProjectCreated { .. } => "project_created",
            Self::BoardCreated { .. } => "board_created",
            Self::ListCreated { .. } => "list_created",
            Self::ListRenamed { .. } => "list_renamed",
            Self::ListDeleted { .. } => "list_deleted",
            Self::ListsReordered { .. } => "lists_reordered",
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskMoved { .. } => "task_moved",
            Self::TaskDeleted { .. } => "task_deleted",
            Self::TasksReordered { .. } => "tasks_reordered",
            Self::SubtaskCreated { .. } => "subtask_created",
            Self::SubtasksReordered { .. } => "subtasks_reordered",
            Self::CommentAdded { .. } => "comment_added",
            Self::CommentEdited { .. } => "comment_edited",
            Self::CommentDeleted { .. } => "comment_deleted",
        }
    }
}

/// Receiver of committed domain events.
pub trait EventSink {
    fn publish(&self, event: DomainEvent);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn publish(&self, event: DomainEvent) {
        (**self).publish(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, event: DomainEvent) {
        (**self).publish(event);
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: DomainEvent) {}
}

/// Writes one `event=domain_event` line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: DomainEvent) {
        info!(
            "event=domain_event module=events status=ok kind={}",
            event.name()
        );
    }
}

/// In-memory buffer; consumers `drain` it after each call.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Mutex<Vec<DomainEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all buffered events in publish order.
    pub fn drain(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DomainEvent>> {
        // A panicking publisher cannot leave the Vec half-written.
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for EventBuffer {
    fn publish(&self, event: DomainEvent) {
        self.lock().push(event);
    }
}
