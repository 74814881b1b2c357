//! Task and subtask domain model.
//!
//! # Responsibility
//! - Define the task record, its creation input, and partial update patch.
//! - Validate user-entered task fields before persistence.
//!
//! # Invariants
//! - `status` always equals the owning list's name at rest.
//! - `position` is the task's 1-based rank within its list.
//! - `tags` are lowercase, unique, and match the tag grammar.

use crate::model::board::{ListId, ProjectId};
use crate::model::text::{normalize_label, normalize_tags, MAX_TITLE_CHARS};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TaskId = Uuid;
pub type SubtaskId = Uuid;

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Task read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub uuid: TaskId,
    pub project_uuid: ProjectId,
    pub list_uuid: ListId,
    pub title: String,
    pub description: String,
    /// Epoch ms deadline.
    pub due_at: Option<i64>,
    /// Opaque user handle owned by the identity layer.
    pub assignee: Option<String>,
    pub priority: TaskPriority,
    /// Mirror of the owning list's name.
    pub status: String,
    pub position: i64,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Creation input for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_uuid: ProjectId,
    pub list_uuid: ListId,
    pub title: String,
    pub description: String,
    pub due_at: Option<i64>,
    pub assignee: Option<String>,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    /// Explicit slot; `None` appends to the end of the list.
    pub position: Option<i64>,
}

impl NewTask {
    pub fn new(project_uuid: ProjectId, list_uuid: ListId, title: impl Into<String>) -> Self {
        Self {
            project_uuid,
            list_uuid,
            title: title.into(),
            description: String::new(),
            due_at: None,
            assignee: None,
            priority: TaskPriority::default(),
            tags: Vec::new(),
            position: None,
        }
    }

    /// Returns a copy with normalized title, assignee, and tags.
    pub fn normalized(&self) -> Result<Self, TaskValidationError> {
        Ok(Self {
            title: normalize_title(&self.title)?,
            assignee: normalize_assignee(self.assignee.as_deref())?,
            tags: normalize_tags(&self.tags).map_err(TaskValidationError::InvalidTag)?,
            ..self.clone()
        })
    }
}

/// Partial field update. `None` leaves the field untouched; the nested
/// `Option` on clearable fields distinguishes "clear" from "keep".
///
/// List membership and position are not patchable; use move/reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_at: Option<Option<i64>>,
    pub assignee: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the patch onto `task`, validating every provided field.
    pub fn apply_to(&self, task: &Task) -> Result<Task, TaskValidationError> {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            next.title = normalize_title(title)?;
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(due_at) = self.due_at {
            next.due_at = due_at;
        }
        if let Some(assignee) = &self.assignee {
            next.assignee = normalize_assignee(assignee.as_deref())?;
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(tags) = &self.tags {
            next.tags = normalize_tags(tags).map_err(TaskValidationError::InvalidTag)?;
        }
        Ok(next)
    }
}

/// Before/after pair produced by one committed task update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChange {
    pub previous: Task,
    pub current: Task,
}

impl TaskChange {
    pub fn assignee_changed(&self) -> bool {
        self.previous.assignee != self.current.assignee
    }

    pub fn due_changed(&self) -> bool {
        self.previous.due_at != self.current.due_at
    }
}

/// Checklist item inside one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub uuid: SubtaskId,
    pub task_uuid: TaskId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub position: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Validation failures for task input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    BlankTitle,
    TitleTooLong { max_chars: usize },
    BlankAssignee,
    InvalidTag(String),
    BlankComment,
    BlankAuthor,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "task title must not be blank"),
            Self::TitleTooLong { max_chars } => {
                write!(f, "task title must be at most {max_chars} characters")
            }
            Self::BlankAssignee => write!(f, "assignee must not be blank"),
            Self::InvalidTag(tag) => write!(f, "invalid tag: `{tag}`"),
            Self::BlankComment => write!(f, "comment must not be blank"),
            Self::BlankAuthor => write!(f, "comment author must not be blank"),
        }
    }
}

impl Error for TaskValidationError {}

pub fn normalize_title(value: &str) -> Result<String, TaskValidationError> {
    let title = normalize_label(value).ok_or(TaskValidationError::BlankTitle)?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(TaskValidationError::TitleTooLong {
            max_chars: MAX_TITLE_CHARS,
        });
    }
    Ok(title)
}

fn normalize_assignee(value: Option<&str>) -> Result<Option<String>, TaskValidationError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(TaskValidationError::BlankAssignee);
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}
