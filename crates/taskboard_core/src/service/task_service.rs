//! Task and subtask use-case service.
//!
//! # Responsibility
//! - Expose create, update, reorder, and move entry points for tasks.
//! - Publish `TaskCreated`, `TaskUpdated`, `TaskMoved`, and friends after
//!   commit.
//!
//! # Invariants
//! - `TaskUpdated` carries the previous row read inside the write transaction.
//! - No-op updates and same-list moves publish nothing.

use crate::events::{DomainEvent, EventSink};
use crate::model::board::ListId;
use crate::model::task::{NewTask, Subtask, SubtaskId, Task, TaskChange, TaskId, TaskPatch};
use crate::repo::task_repo::{TaskMove, TaskRepository};
use crate::repo::ReorderOutcome;
use crate::service::error::ServiceResult;

/// Task service facade.
pub struct TaskService<R: TaskRepository, E: EventSink> {
    repo: R,
    events: E,
}

impl<R: TaskRepository, E: EventSink> TaskService<R, E> {
    pub fn new(repo: R, events: E) -> Self {
        Self { repo, events }
    }

    /// Creates a task. Status is taken from the target list's name.
    pub fn create_task(&self, input: &NewTask) -> ServiceResult<Task> {
        let task = self.repo.create_task(input)?;
        self.events
            .publish(DomainEvent::TaskCreated { task: task.clone() });
        Ok(task)
    }

    pub fn get_task(&self, task_uuid: TaskId) -> ServiceResult<Option<Task>> {
        Ok(self.repo.get_task(task_uuid)?)
    }

    pub fn list_tasks(&self, list_uuid: ListId) -> ServiceResult<Vec<Task>> {
        Ok(self.repo.list_tasks(list_uuid)?)
    }

    /// Applies `patch` and returns the before/after pair.
    pub fn update_task(&self, task_uuid: TaskId, patch: &TaskPatch) -> ServiceResult<TaskChange> {
        let change = self.repo.update_task(task_uuid, patch)?;
        if change.previous != change.current {
            self.events.publish(DomainEvent::TaskUpdated {
                change: change.clone(),
            });
        }
        Ok(change)
    }

    pub fn delete_task(&self, task_uuid: TaskId) -> ServiceResult<Task> {
        let task = self.repo.delete_task(task_uuid)?;
        self.events
            .publish(DomainEvent::TaskDeleted { task: task.clone() });
        Ok(task)
    }

    /// Rewrites the list's order to exactly `ordered`.
    pub fn reorder_tasks(
        &self,
        list_uuid: ListId,
        ordered: &[TaskId],
    ) -> ServiceResult<ReorderOutcome> {
        let outcome = self.repo.reorder_tasks(list_uuid, ordered)?;
        self.events.publish(DomainEvent::TasksReordered {
            list_uuid,
            writes: outcome.writes,
        });
        Ok(outcome)
    }

    /// Moves a task into `target_list`, appending when `position` is `None`.
    pub fn move_task(
        &self,
        task_uuid: TaskId,
        target_list: ListId,
        position: Option<i64>,
    ) -> ServiceResult<TaskMove> {
        let moved = self.repo.move_task(task_uuid, target_list, position)?;
        if moved.moved {
            self.events.publish(DomainEvent::TaskMoved {
                task: moved.task.clone(),
                from_list: moved.from_list,
                from_position: moved.from_position,
            });
        }
        Ok(moved)
    }

    pub fn create_subtask(
        &self,
        task_uuid: TaskId,
        title: &str,
        description: &str,
    ) -> ServiceResult<Subtask> {
        let subtask = self.repo.create_subtask(task_uuid, title, description)?;
        self.events.publish(DomainEvent::SubtaskCreated {
            subtask: subtask.clone(),
        });
        Ok(subtask)
    }

    pub fn list_subtasks(&self, task_uuid: TaskId) -> ServiceResult<Vec<Subtask>> {
        Ok(self.repo.list_subtasks(task_uuid)?)
    }

    pub fn reorder_subtasks(
        &self,
        task_uuid: TaskId,
        ordered: &[SubtaskId],
    ) -> ServiceResult<ReorderOutcome> {
        let outcome = self.repo.reorder_subtasks(task_uuid, ordered)?;
        self.events.publish(DomainEvent::SubtasksReordered {
            task_uuid,
            writes: outcome.writes,
        });
        Ok(outcome)
    }

    pub fn set_subtask_completed(
        &self,
        subtask_uuid: SubtaskId,
        completed: bool,
    ) -> ServiceResult<Subtask> {
        Ok(self.repo.set_subtask_completed(subtask_uuid, completed)?)
    }
}
