//! Task comment model.
//!
//! # Invariants
//! - `body` is trimmed and never blank.
//! - `author` is trimmed when present; `None` means the author is unknown.

use crate::model::task::{TaskId, TaskValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CommentId = Uuid;

/// Comment read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub uuid: CommentId,
    pub task_uuid: TaskId,
    pub author: Option<String>,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Creation input for one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub task_uuid: TaskId,
    pub author: Option<String>,
    pub body: String,
}

impl NewComment {
    pub fn new(task_uuid: TaskId, author: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            task_uuid,
            author: author.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn normalized(&self) -> Result<Self, TaskValidationError> {
        let author = match self.author.as_deref().map(str::trim) {
            None => None,
            Some("") => return Err(TaskValidationError::BlankAuthor),
            Some(author) => Some(author.to_string()),
        };
        Ok(Self {
            task_uuid: self.task_uuid,
            author,
            body: normalize_body(&self.body)?,
        })
    }
}

/// Trims a comment body. Inner line breaks are kept.
pub fn normalize_body(value: &str) -> Result<String, TaskValidationError> {
    let body = value.trim();
    if body.is_empty() {
        return Err(TaskValidationError::BlankComment);
    }
    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_body, NewComment};
    use crate::model::task::TaskValidationError;
    use uuid::Uuid;

    #[test]
    fn body_keeps_inner_lines() {
        assert_eq!(
            normalize_body("  first line\nsecond line \n").expect("valid body"),
            "first line\nsecond line"
        );
        assert_eq!(normalize_body(" \n\t"), Err(TaskValidationError::BlankComment));
    }

    #[test]
    fn author_is_optional_but_never_blank() {
        let task = Uuid::new_v4();
        let anonymous = NewComment::new(task, None, "hi").normalized().expect("valid");
        assert_eq!(anonymous.author, None);

        let named = NewComment::new(task, Some(" dana "), "hi")
            .normalized()
            .expect("valid");
        assert_eq!(named.author.as_deref(), Some("dana"));

        assert_eq!(
            NewComment::new(task, Some("  "), "hi").normalized(),
            Err(TaskValidationError::BlankAuthor)
        );
    }
}
