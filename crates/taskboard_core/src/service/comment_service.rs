//! Task comment use-case service.
//!
//! # Invariants
//! - Events are published only after the comment write committed.
//! - An edit that leaves the body unchanged publishes nothing.

use crate::events::{DomainEvent, EventSink};
use crate::model::comment::{Comment, CommentId, NewComment};
use crate::model::task::TaskId;
use crate::repo::comment_repo::{CommentEdit, CommentRepository};
use crate::service::error::ServiceResult;
use crate::service::now_ms;

/// Comment service facade.
pub struct CommentService<R: CommentRepository, E: EventSink> {
    repo: R,
    events: E,
}

impl<R: CommentRepository, E: EventSink> CommentService<R, E> {
    pub fn new(repo: R, events: E) -> Self {
        Self { repo, events }
    }

    pub fn add_comment(&self, input: &NewComment) -> ServiceResult<Comment> {
        let comment = self.repo.add_comment(input, now_ms())?;
        self.events.publish(DomainEvent::CommentAdded {
            comment: comment.clone(),
        });
        Ok(comment)
    }

    /// Newest first.
    pub fn list_comments(&self, task_uuid: TaskId) -> ServiceResult<Vec<Comment>> {
        Ok(self.repo.list_comments(task_uuid)?)
    }

    pub fn edit_comment(&self, comment_uuid: CommentId, body: &str) -> ServiceResult<CommentEdit> {
        let edit = self.repo.edit_comment(comment_uuid, body, now_ms())?;
        if edit.changed {
            self.events.publish(DomainEvent::CommentEdited {
                comment: edit.comment.clone(),
            });
        }
        Ok(edit)
    }

    pub fn delete_comment(&self, comment_uuid: CommentId) -> ServiceResult<Comment> {
        let comment = self.repo.delete_comment(comment_uuid)?;
        self.events.publish(DomainEvent::CommentDeleted {
            comment: comment.clone(),
        });
        Ok(comment)
    }
}
