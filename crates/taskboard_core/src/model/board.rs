//! Project, board, and list read models.
//!
//! # Invariants
//! - Board names are unique within a project.
//! - List names are unique within a board and double as the status label of
//!   every task the list holds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;
pub type BoardId = Uuid;
pub type ListId = Uuid;

/// Top-level grouping that owns boards and tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub uuid: ProjectId,
    pub name: String,
    pub description: String,
    pub archived: bool,
    /// Epoch ms.
    pub created_at: i64,
    pub updated_at: i64,
}

/// A board inside one project. Container of lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub uuid: BoardId,
    pub project_uuid: ProjectId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An ordered column of a board. Member of a board, container of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardList {
    pub uuid: ListId,
    pub board_uuid: BoardId,
    pub name: String,
    /// 1-based rank among the board's lists.
    pub position: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BoardList {
    /// Status label every task in this list must carry.
    ///
    /// Invoked explicitly by the create, move, and rename paths.
    pub fn status_label(&self) -> &str {
        &self.name
    }
}

/// Board with its lists in position order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub lists: Vec<BoardList>,
}
