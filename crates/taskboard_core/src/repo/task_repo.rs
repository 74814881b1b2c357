//! Task and subtask repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist tasks inside lists and subtasks inside tasks.
//! - Run the create, reorder, and cross-list move placement paths atomically.
//!
//! # Invariants
//! - Task `status` is written only from `BoardList::status_label()`.
//! - Move phases run in order: compact source, open target slot, relocate.
//! - A move to the task's current list performs no writes.
//! - `update_task` reads the previous row inside its own write transaction.

use crate::config::RetryPolicy;
use crate::logging::log_outcome;
use crate::model::board::ListId;
use crate::model::placement::plan_move;
use crate::model::task::{
    normalize_title, NewTask, Subtask, SubtaskId, Task, TaskChange, TaskId, TaskPatch,
    TaskPriority,
};
use crate::repo::board_repo::{list_project, load_list};
use crate::repo::sibling_store::{LIST_TASKS, TASK_SUBTASKS};
use crate::repo::{
    bool_to_int, ensure_schema_ready, parse_bool, parse_uuid, with_write_tx, EntityKind,
    ReorderOutcome, RepoError, RepoResult,
};
use log::debug;
use rusqlite::{params, Connection, Row};
use std::time::Instant;
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    project_uuid,
    list_uuid,
    title,
    description,
    due_at,
    assignee,
    priority,
    status,
    position,
    tags,
    created_at,
    updated_at
FROM tasks";

const SUBTASK_SELECT_SQL: &str = "SELECT
    uuid,
    task_uuid,
    title,
    description,
    completed,
    position,
    created_at,
    updated_at
FROM subtasks";

/// Result of a committed move request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMove {
    /// Task as stored after the call.
    pub task: Task,
    pub from_list: ListId,
    pub from_position: i64,
    /// `false` when the target was the task's current list.
    pub moved: bool,
    /// Rows written, including the moved task itself.
    pub writes: usize,
}

/// Repository interface for tasks and subtasks.
pub trait TaskRepository {
    /// Creates a task at the end of its list, or at `input.position` with
    /// the list's members shifted to make room.
    fn create_task(&self, input: &NewTask) -> RepoResult<Task>;
    fn get_task(&self, task_uuid: TaskId) -> RepoResult<Option<Task>>;
    /// Lists tasks of one list in position order.
    fn list_tasks(&self, list_uuid: ListId) -> RepoResult<Vec<Task>>;
    /// Applies a field patch and returns the previous and current rows.
    fn update_task(&self, task_uuid: TaskId, patch: &TaskPatch) -> RepoResult<TaskChange>;
    /// Deletes a task. Siblings keep their positions until the next
    /// reorder/move of the list.
    fn delete_task(&self, task_uuid: TaskId) -> RepoResult<Task>;
    fn reorder_tasks(&self, list_uuid: ListId, ordered: &[TaskId]) -> RepoResult<ReorderOutcome>;
    fn move_task(
        &self,
        task_uuid: TaskId,
        target_list: ListId,
        position: Option<i64>,
    ) -> RepoResult<TaskMove>;
    fn create_subtask(
        &self,
        task_uuid: TaskId,
        title: &str,
        description: &str,
    ) -> RepoResult<Subtask>;
    fn list_subtasks(&self, task_uuid: TaskId) -> RepoResult<Vec<Subtask>>;
    fn reorder_subtasks(
        &self,
        task_uuid: TaskId,
        ordered: &[SubtaskId],
    ) -> RepoResult<ReorderOutcome>;
    fn set_subtask_completed(&self, subtask_uuid: SubtaskId, completed: bool)
        -> RepoResult<Subtask>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["board_lists", "tasks", "subtasks"])?;
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

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, input: &NewTask) -> RepoResult<Task> {
        let started_at = Instant::now();
        let input = input.normalized()?;
        let task_uuid = Uuid::new_v4();
        let tags = encode_tags(&input.tags)?;

        let result = with_write_tx(self.conn, self.retry, |tx| {
            let list = load_list(tx, input.list_uuid)?.ok_or(RepoError::ContainerNotFound {
                kind: EntityKind::List,
                id: input.list_uuid,
            })?;
            if list_project(tx, list.uuid)? != Some(input.project_uuid) {
                return Err(RepoError::ProjectMismatch {
                    project_uuid: input.project_uuid,
                    list_uuid: list.uuid,
                });
            }

            let position = LIST_TASKS.open_slot(tx, list.uuid, task_uuid, input.position)?;
            tx.execute(
                "INSERT INTO tasks (
                    uuid,
                    project_uuid,
                    list_uuid,
                    title,
                    description,
                    due_at,
                    assignee,
                    priority,
                    status,
                    position,
                    tags
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    task_uuid.to_string(),
                    input.project_uuid.to_string(),
                    list.uuid.to_string(),
                    input.title.as_str(),
                    input.description.as_str(),
                    input.due_at,
                    input.assignee.as_deref(),
                    input.priority.as_str(),
                    list.status_label(),
                    position,
                    tags.as_str(),
                ],
            )?;
            load_required_task(tx, task_uuid)
        });
        log_outcome(
            "task_create",
            "task_repo",
            started_at,
            &format!("task={task_uuid} list={}", input.list_uuid),
            &result,
        );
        result
    }

    fn get_task(&self, task_uuid: TaskId) -> RepoResult<Option<Task>> {
        load_task(self.conn, task_uuid)
    }

    fn list_tasks(&self, list_uuid: ListId) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{TASK_SELECT_SQL}
             WHERE list_uuid = ?1
             ORDER BY position ASC, created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([list_uuid.to_string()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn update_task(&self, task_uuid: TaskId, patch: &TaskPatch) -> RepoResult<TaskChange> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            let previous = load_required_task(tx, task_uuid)?;
            let next = patch.apply_to(&previous)?;
            if next == previous {
                return Ok(TaskChange {
                    current: previous.clone(),
                    previous,
                });
            }

            tx.execute(
                "UPDATE tasks
                 SET title = ?2,
                     description = ?3,
                     due_at = ?4,
                     assignee = ?5,
                     priority = ?6,
                     tags = ?7,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![
                    task_uuid.to_string(),
                    next.title.as_str(),
                    next.description.as_str(),
                    next.due_at,
                    next.assignee.as_deref(),
                    next.priority.as_str(),
                    encode_tags(&next.tags)?,
                ],
            )?;
            let current = load_required_task(tx, task_uuid)?;
            Ok(TaskChange { previous, current })
        });
        log_outcome(
            "task_update",
            "task_repo",
            started_at,
            &format!("task={task_uuid}"),
            &result,
        );
        result
    }

    fn delete_task(&self, task_uuid: TaskId) -> RepoResult<Task> {
        with_write_tx(self.conn, self.retry, |tx| {
            let task = load_required_task(tx, task_uuid)?;
            tx.execute("DELETE FROM tasks WHERE uuid = ?1;", [task_uuid.to_string()])?;
            Ok(task)
        })
    }

    fn reorder_tasks(&self, list_uuid: ListId, ordered: &[TaskId]) -> RepoResult<ReorderOutcome> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            LIST_TASKS.reorder(tx, list_uuid, ordered)
        });
        log_outcome(
            "task_reorder",
            "task_repo",
            started_at,
            &format!("list={list_uuid} ids={}", ordered.len()),
            &result,
        );
        result
    }

    fn move_task(
        &self,
        task_uuid: TaskId,
        target_list: ListId,
        position: Option<i64>,
    ) -> RepoResult<TaskMove> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            let task = load_required_task(tx, task_uuid)?;
            let target = load_list(tx, target_list)?.ok_or(RepoError::ContainerNotFound {
                kind: EntityKind::List,
                id: target_list,
            })?;
            if task.list_uuid == target.uuid {
                return Ok(TaskMove {
                    from_list: task.list_uuid,
                    from_position: task.position,
                    task,
                    moved: false,
                    writes: 0,
                });
            }
            if list_project(tx, target.uuid)? != Some(task.project_uuid) {
                return Err(RepoError::ProjectMismatch {
                    project_uuid: task.project_uuid,
                    list_uuid: target.uuid,
                });
            }

            let source_order = LIST_TASKS.load_order(tx, task.list_uuid)?;
            let target_order = LIST_TASKS.load_order(tx, target.uuid)?;
            let plan = plan_move(&source_order, &target_order, task_uuid, position).ok_or(
                RepoError::MemberNotFound {
                    kind: EntityKind::Task,
                    id: task_uuid,
                },
            )?;

            LIST_TASKS.apply_writes(tx, &plan.source_writes)?;
            LIST_TASKS.apply_writes(tx, &plan.target_writes)?;
            tx.execute(
                "UPDATE tasks
                 SET list_uuid = ?2,
                     position = ?3,
                     status = ?4,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![
                    task_uuid.to_string(),
                    target.uuid.to_string(),
                    plan.position,
                    target.status_label(),
                ],
            )?;
            debug!(
                "event=task_move_plan module=task_repo task={task_uuid} from_position={} to_position={} source_writes={} target_writes={}",
                plan.from_position,
                plan.position,
                plan.source_writes.len(),
                plan.target_writes.len()
            );

            Ok(TaskMove {
                task: load_required_task(tx, task_uuid)?,
                from_list: plan.from_container,
                from_position: plan.from_position,
                moved: true,
                writes: plan.write_count(),
            })
        });
        log_outcome(
            "task_move",
            "task_repo",
            started_at,
            &format!("task={task_uuid} target_list={target_list}"),
            &result,
        );
        result
    }

    fn create_subtask(
        &self,
        task_uuid: TaskId,
        title: &str,
        description: &str,
    ) -> RepoResult<Subtask> {
        let title = normalize_title(title)?;
        let subtask_uuid = Uuid::new_v4();
        with_write_tx(self.conn, self.retry, |tx| {
            TASK_SUBTASKS.ensure_container(tx, task_uuid)?;
            let position = TASK_SUBTASKS.open_slot(tx, task_uuid, subtask_uuid, None)?;
            tx.execute(
                "INSERT INTO subtasks (uuid, task_uuid, title, description, position)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    subtask_uuid.to_string(),
                    task_uuid.to_string(),
                    title.as_str(),
                    description,
                    position,
                ],
            )?;
            load_required_subtask(tx, subtask_uuid)
        })
    }

    fn list_subtasks(&self, task_uuid: TaskId) -> RepoResult<Vec<Subtask>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SUBTASK_SELECT_SQL}
             WHERE task_uuid = ?1
             ORDER BY position ASC, created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([task_uuid.to_string()])?;
        let mut subtasks = Vec::new();
        while let Some(row) = rows.next()? {
            subtasks.push(parse_subtask_row(row)?);
        }
        Ok(subtasks)
    }

    fn reorder_subtasks(
        &self,
        task_uuid: TaskId,
        ordered: &[SubtaskId],
    ) -> RepoResult<ReorderOutcome> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, self.retry, |tx| {
            TASK_SUBTASKS.reorder(tx, task_uuid, ordered)
        });
        log_outcome(
            "subtask_reorder",
            "task_repo",
            started_at,
            &format!("task={task_uuid} ids={}", ordered.len()),
            &result,
        );
        result
    }

    fn set_subtask_completed(
        &self,
        subtask_uuid: SubtaskId,
        completed: bool,
    ) -> RepoResult<Subtask> {
        with_write_tx(self.conn, self.retry, |tx| {
            let changed = tx.execute(
                "UPDATE subtasks
                 SET completed = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![subtask_uuid.to_string(), bool_to_int(completed)],
            )?;
            if changed == 0 {
                return Err(RepoError::MemberNotFound {
                    kind: EntityKind::Subtask,
                    id: subtask_uuid,
                });
            }
            load_required_subtask(tx, subtask_uuid)
        })
    }
}

fn load_task(conn: &Connection, task_uuid: TaskId) -> RepoResult<Option<Task>> {
    let mut stmt = conn.prepare_cached(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([task_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_task_row(row)?));
    }
    Ok(None)
}

fn load_required_task(conn: &Connection, task_uuid: TaskId) -> RepoResult<Task> {
    load_task(conn, task_uuid)?.ok_or(RepoError::MemberNotFound {
        kind: EntityKind::Task,
        id: task_uuid,
    })
}

fn load_required_subtask(conn: &Connection, subtask_uuid: SubtaskId) -> RepoResult<Subtask> {
    let mut stmt = conn.prepare_cached(&format!("{SUBTASK_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([subtask_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_subtask_row(row);
    }
    Err(RepoError::MemberNotFound {
        kind: EntityKind::Subtask,
        id: subtask_uuid,
    })
}

fn encode_tags(tags: &[String]) -> RepoResult<String> {
    serde_json::to_string(tags)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode task tags: {err}")))
}

fn decode_tags(value: &str) -> RepoResult<Vec<String>> {
    serde_json::from_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid tags `{value}` in tasks.tags")))
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let project_text: String = row.get("project_uuid")?;
    let list_text: String = row.get("list_uuid")?;
    let priority_text: String = row.get("priority")?;
    let priority = TaskPriority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid task priority `{priority_text}` in tasks.priority"
        ))
    })?;
    let tags_text: String = row.get("tags")?;

    Ok(Task {
        uuid: parse_uuid(&uuid_text, "tasks.uuid")?,
        project_uuid: parse_uuid(&project_text, "tasks.project_uuid")?,
        list_uuid: parse_uuid(&list_text, "tasks.list_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_at: row.get("due_at")?,
        assignee: row.get("assignee")?,
        priority,
        status: row.get("status")?,
        position: row.get("position")?,
        tags: decode_tags(&tags_text)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_subtask_row(row: &Row<'_>) -> RepoResult<Subtask> {
    let uuid_text: String = row.get("uuid")?;
    let task_text: String = row.get("task_uuid")?;
    Ok(Subtask {
        uuid: parse_uuid(&uuid_text, "subtasks.uuid")?,
        task_uuid: parse_uuid(&task_text, "subtasks.task_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        completed: parse_bool(row.get("completed")?, "subtasks.completed")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
