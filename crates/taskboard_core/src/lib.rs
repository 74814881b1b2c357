//! Core domain logic for Taskboard.
//! Owns ordered placement of lists, tasks, and subtasks and every invariant
//! that keeps their positions dense.

pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, NotificationConfig, RetryPolicy, DEFAULT_LIST_NAMES};
pub use db::{open_db, open_db_in_memory, open_db_with, DbError, DbResult};
pub use events::{DomainEvent, EventBuffer, EventSink, LogEventSink, NoopEventSink};
pub use logging::{default_log_level, init_logging, init_logging_from, logging_status};
pub use model::board::{Board, BoardId, BoardList, BoardSnapshot, ListId, Project, ProjectId};
pub use model::comment::{Comment, CommentId, NewComment};
pub use model::placement::{OrderError, SiblingOrder};
pub use model::task::{
    NewTask, Subtask, SubtaskId, Task, TaskChange, TaskId, TaskPatch, TaskPriority,
    TaskValidationError,
};
pub use repo::board_repo::{BoardRepository, ListRemoval, ListRename, SqliteBoardRepository};
pub use repo::comment_repo::{CommentEdit, CommentRepository, SqliteCommentRepository};
pub use repo::notification_repo::{
    Notification, NotificationDraft, NotificationId, NotificationKind, NotificationRepository,
    SqliteNotificationRepository,
};
pub use repo::task_repo::{SqliteTaskRepository, TaskMove, TaskRepository};
pub use repo::{EntityKind, ReorderOutcome, RepoError, RepoResult};
pub use service::board_service::BoardService;
pub use service::comment_service::CommentService;
pub use service::error::{ServiceError, ServiceResult};
pub use service::notification_service::NotificationService;
pub use service::task_service::TaskService;
pub use service::now_ms;

/// Versions a binary reports about its core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreVersion {
    pub crate_version: &'static str,
    /// Schema version `open_db*` migrates connections to.
    pub schema_version: u32,
}

pub fn core_version() -> CoreVersion {
    CoreVersion {
        crate_version: env!("CARGO_PKG_VERSION"),
        schema_version: db::migrations::latest_version(),
    }
}
