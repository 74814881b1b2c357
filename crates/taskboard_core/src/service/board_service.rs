//! Project, board, and list use-case service.
//!
//! # Responsibility
//! - Normalize names before they reach the repository.
//! - Seed new boards with the configured default lists.
//! - Publish domain events after each committed mutation.
//!
//! # Invariants
//! - Names are whitespace-collapsed, non-blank, and at most
//!   `MAX_NAME_CHARS` characters.
//! - No event is published for a failed operation.

use crate::config::{CoreConfig, DEFAULT_LIST_NAMES};
use crate::events::{DomainEvent, EventSink};
use crate::model::board::{Board, BoardId, BoardList, BoardSnapshot, ListId, Project, ProjectId};
use crate::model::text::{normalize_label, MAX_NAME_CHARS};
use crate::repo::board_repo::{BoardRepository, ListRemoval, ListRename};
use crate::repo::{EntityKind, ReorderOutcome};
use crate::service::error::{ServiceError, ServiceResult};

/// Project/board/list service facade.
pub struct BoardService<R: BoardRepository, E: EventSink> {
    repo: R,
    events: E,
    default_lists: Vec<String>,
}

impl<R: BoardRepository, E: EventSink> BoardService<R, E> {
    /// Creates a service that seeds boards with `DEFAULT_LIST_NAMES`.
    pub fn new(repo: R, events: E) -> Self {
        Self {
            repo,
            events,
            default_lists: DEFAULT_LIST_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }

    /// Creates a service using `config.default_lists`.
    pub fn from_config(repo: R, events: E, config: &CoreConfig) -> ServiceResult<Self> {
        Self::new(repo, events).with_default_lists(&config.default_lists)
    }

    /// Replaces the default list names after normalizing them.
    pub fn with_default_lists(mut self, names: &[String]) -> ServiceResult<Self> {
        let mut normalized: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = normalize_name(EntityKind::List, name)?;
            if normalized.contains(&name) {
                return Err(ServiceError::DuplicateDefaultList(name));
            }
            normalized.push(name);
        }
        self.default_lists = normalized;
        Ok(self)
    }

    pub fn default_lists(&self) -> &[String] {
        &self.default_lists
    }

    pub fn create_project(&self, name: &str, description: &str) -> ServiceResult<Project> {
        let name = normalize_name(EntityKind::Project, name)?;
        let project = self.repo.create_project(&name, description.trim())?;
        self.events.publish(DomainEvent::ProjectCreated {
            project: project.clone(),
        });
        Ok(project)
    }

    pub fn get_project(&self, project_uuid: ProjectId) -> ServiceResult<Option<Project>> {
        Ok(self.repo.get_project(project_uuid)?)
    }

    pub fn list_projects(&self, include_archived: bool) -> ServiceResult<Vec<Project>> {
        Ok(self.repo.list_projects(include_archived)?)
    }

    pub fn set_project_archived(
        &self,
        project_uuid: ProjectId,
        archived: bool,
    ) -> ServiceResult<Project> {
        Ok(self.repo.set_project_archived(project_uuid, archived)?)
    }

    /// Creates a board with the default lists at positions `1..=N`.
    pub fn create_board(&self, project_uuid: ProjectId, name: &str) -> ServiceResult<BoardSnapshot> {
        let name = normalize_name(EntityKind::Board, name)?;
        let snapshot = self
            .repo
            .create_board(project_uuid, &name, &self.default_lists)?;
        self.events.publish(DomainEvent::BoardCreated {
            board: snapshot.board.clone(),
            lists: snapshot.lists.clone(),
        });
        Ok(snapshot)
    }

    pub fn get_board(&self, board_uuid: BoardId) -> ServiceResult<Option<BoardSnapshot>> {
        Ok(self.repo.get_board(board_uuid)?)
    }

    pub fn list_boards(&self, project_uuid: ProjectId) -> ServiceResult<Vec<Board>> {
        Ok(self.repo.list_boards(project_uuid)?)
    }

    pub fn create_list(
        &self,
        board_uuid: BoardId,
        name: &str,
        position: Option<i64>,
    ) -> ServiceResult<BoardList> {
        let name = normalize_name(EntityKind::List, name)?;
        let list = self.repo.create_list(board_uuid, &name, position)?;
        self.events.publish(DomainEvent::ListCreated { list: list.clone() });
        Ok(list)
    }

    pub fn get_list(&self, list_uuid: ListId) -> ServiceResult<Option<BoardList>> {
        Ok(self.repo.get_list(list_uuid)?)
    }

    pub fn list_lists(&self, board_uuid: BoardId) -> ServiceResult<Vec<BoardList>> {
        Ok(self.repo.list_lists(board_uuid)?)
    }

    /// Renames a list; its tasks' status labels follow in the same commit.
    pub fn rename_list(&self, list_uuid: ListId, name: &str) -> ServiceResult<ListRename> {
        let name = normalize_name(EntityKind::List, name)?;
        let rename = self.repo.rename_list(list_uuid, &name)?;
        self.events.publish(DomainEvent::ListRenamed {
            list: rename.list.clone(),
            previous_name: rename.previous_name.clone(),
            resynced_tasks: rename.resynced_tasks,
        });
        Ok(rename)
    }

    pub fn reorder_lists(
        &self,
        board_uuid: BoardId,
        ordered: &[ListId],
    ) -> ServiceResult<ReorderOutcome> {
        let outcome = self.repo.reorder_lists(board_uuid, ordered)?;
        self.events.publish(DomainEvent::ListsReordered {
            board_uuid,
            writes: outcome.writes,
        });
        Ok(outcome)
    }

    pub fn delete_list(&self, list_uuid: ListId) -> ServiceResult<ListRemoval> {
        let removal = self.repo.delete_list(list_uuid)?;
        self.events.publish(DomainEvent::ListDeleted {
            list_uuid: removal.list_uuid,
            board_uuid: removal.board_uuid,
            removed_tasks: removal.removed_tasks,
        });
        Ok(removal)
    }
}

fn normalize_name(kind: EntityKind, value: &str) -> ServiceResult<String> {
    let name = normalize_label(value).ok_or(ServiceError::BlankName(kind))?;
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ServiceError::NameTooLong {
            kind,
            max_chars: MAX_NAME_CHARS,
        });
    }
    Ok(name)
}
