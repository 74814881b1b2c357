//! CLI argument definitions for the taskboard binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use taskboard_core::TaskPriority;
use uuid::Uuid;

/// Taskboard operator tool
#[derive(Parser, Debug)]
#[command(name = "taskboard")]
#[command(about = "Taskboard: ordered boards, lists, and tasks on SQLite")]
#[command(version)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "TASKBOARD_DB")]
    pub db: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true, env = "TASKBOARD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TASKBOARD_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or migrate the database
    Init,
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage boards
    #[command(subcommand)]
    Board(BoardCommand),
    /// Manage lists on a board
    #[command(subcommand)]
    List(ListCommand),
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Show notifications for a recipient
    Notifications(NotificationsArgs),
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List projects
    List {
        /// Include archived projects
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BoardCommand {
    /// Create a board with the default lists
    Create { project: Uuid, name: String },
    /// Print a board with its lists and tasks
    Show { board: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Add a list to a board
    Add {
        board: Uuid,
        name: String,
        /// 1-based slot; appends when omitted
        #[arg(long)]
        position: Option<i64>,
    },
    /// Rename a list and resync its tasks' status
    Rename { list: Uuid, name: String },
    /// Rewrite the order of every list on a board
    Reorder {
        board: Uuid,
        #[arg(required = true, num_args = 1..)]
        lists: Vec<Uuid>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task to a list
    Add(TaskAddArgs),
    /// Move a task to another list
    Move {
        task: Uuid,
        list: Uuid,
        /// 1-based slot; appends when omitted
        #[arg(long)]
        position: Option<i64>,
    },
    /// Rewrite the order of every task in a list
    Reorder {
        list: Uuid,
        #[arg(required = true, num_args = 1..)]
        tasks: Vec<Uuid>,
    },
    /// Comment on a task
    Comment {
        task: Uuid,
        body: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// Print a task's comments, newest first
    Comments { task: Uuid },
}

#[derive(Args, Debug)]
pub struct TaskAddArgs {
    pub project: Uuid,
    pub list: Uuid,
    pub title: String,

    #[arg(long)]
    pub assignee: Option<String>,

    /// Due timestamp in epoch milliseconds
    #[arg(long)]
    pub due_at: Option<i64>,

    #[arg(long, value_enum, default_value = "medium")]
    pub priority: PriorityArg,

    /// Repeatable tag
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// 1-based slot; appends when omitted
    #[arg(long)]
    pub position: Option<i64>,
}

#[derive(Args, Debug)]
pub struct NotificationsArgs {
    pub recipient: String,

    /// Only unread notifications
    #[arg(long)]
    pub unread: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for TaskPriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => TaskPriority::Low,
            PriorityArg::Medium => TaskPriority::Medium,
            PriorityArg::High => TaskPriority::High,
        }
    }
}
