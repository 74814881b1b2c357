//! Operator CLI over `taskboard_core`.
//!
//! # Responsibility
//! - Map subcommands onto core services for local smoke checks.
//! - Print one `key=value` line per result for easy grepping.

mod cli;

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use cli::{BoardCommand, Cli, Commands, ListCommand, ProjectCommand, TaskCommand};
use log::info;
use rusqlite::Connection;
use taskboard_core::{
    core_version, init_logging_from, open_db_with, BoardService, CommentService, CoreConfig,
    LogEventSink, NewComment, NewTask, NotificationService, SqliteBoardRepository,
    SqliteCommentRepository, SqliteNotificationRepository, SqliteTaskRepository, Task,
    TaskService,
};

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult {
    let mut config = CoreConfig::from_env()?;
    if cli.db.is_some() {
        config.db_path = cli.db;
    }
    if cli.log_dir.is_some() {
        config.log_dir = cli.log_dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if config.db_path.is_none() {
        return Err("no database given; pass --db or set TASKBOARD_DB".into());
    }
    init_logging_from(&config)?;

    let conn = open_db_with(&config)?;
    info!("event=cli_command module=cli status=start");
    match cli.command {
        Commands::Init => {
            let version = core_version();
            println!(
                "core_version={} schema_version={}",
                version.crate_version, version.schema_version
            );
            Ok(())
        }
        Commands::Project(command) => run_project(&conn, &config, command),
        Commands::Board(command) => run_board(&conn, &config, command),
        Commands::List(command) => run_list(&conn, &config, command),
        Commands::Task(command) => run_task(&conn, &config, command),
        Commands::Notifications(args) => {
            let service = notification_service(&conn, &config)?;
            for item in service.list_for(&args.recipient, args.unread)? {
                println!(
                    "notification={} kind={} task={} read={} message={:?}",
                    item.uuid,
                    item.kind.as_str(),
                    item.task_uuid,
                    item.is_read,
                    item.message
                );
            }
            Ok(())
        }
    }
}

fn board_service<'conn>(
    conn: &'conn Connection,
    config: &CoreConfig,
) -> Result<BoardService<SqliteBoardRepository<'conn>, LogEventSink>, Box<dyn Error>> {
    let repo = SqliteBoardRepository::try_new(conn)?.with_retry(config.retry);
    Ok(BoardService::from_config(repo, LogEventSink, config)?)
}

fn notification_service<'conn>(
    conn: &'conn Connection,
    config: &CoreConfig,
) -> Result<NotificationService<SqliteNotificationRepository<'conn>>, Box<dyn Error>> {
    let repo = SqliteNotificationRepository::try_new(conn)?.with_retry(config.retry);
    Ok(NotificationService::new(repo, config.notifications))
}

fn comment_service<'conn>(
    conn: &'conn Connection,
    config: &CoreConfig,
) -> Result<CommentService<SqliteCommentRepository<'conn>, LogEventSink>, Box<dyn Error>> {
    let repo = SqliteCommentRepository::try_new(conn)?.with_retry(config.retry);
    Ok(CommentService::new(repo, LogEventSink))
}

fn run_project(conn: &Connection, config: &CoreConfig, command: ProjectCommand) -> CliResult {
    let service = board_service(conn, config)?;
    match command {
        ProjectCommand::Create { name, description } => {
            let project = service.create_project(&name, &description)?;
            println!("project={} name={:?}", project.uuid, project.name);
        }
        ProjectCommand::List { all } => {
            for project in service.list_projects(all)? {
                println!(
                    "project={} name={:?} archived={}",
                    project.uuid, project.name, project.archived
                );
            }
        }
    }
    Ok(())
}

fn run_board(conn: &Connection, config: &CoreConfig, command: BoardCommand) -> CliResult {
    let service = board_service(conn, config)?;
    match command {
        BoardCommand::Create { project, name } => {
            let snapshot = service.create_board(project, &name)?;
            println!("board={} name={:?}", snapshot.board.uuid, snapshot.board.name);
            for list in snapshot.lists {
                println!("  list={} position={} name={:?}", list.uuid, list.position, list.name);
            }
        }
        BoardCommand::Show { board } => {
            let snapshot = service
                .get_board(board)?
                .ok_or_else(|| format!("board not found: {board}"))?;
            let tasks = SqliteTaskRepository::try_new(conn)?;
            let tasks = TaskService::new(tasks, LogEventSink);
            println!("board={} name={:?}", snapshot.board.uuid, snapshot.board.name);
            for list in snapshot.lists {
                println!("  list={} position={} name={:?}", list.uuid, list.position, list.name);
                for task in tasks.list_tasks(list.uuid)? {
                    print_task("    ", &task);
                }
            }
        }
    }
    Ok(())
}

fn run_list(conn: &Connection, config: &CoreConfig, command: ListCommand) -> CliResult {
    let service = board_service(conn, config)?;
    match command {
        ListCommand::Add {
            board,
            name,
            position,
        } => {
            let list = service.create_list(board, &name, position)?;
            println!("list={} position={} name={:?}", list.uuid, list.position, list.name);
        }
        ListCommand::Rename { list, name } => {
            let rename = service.rename_list(list, &name)?;
            println!(
                "list={} name={:?} resynced_tasks={}",
                rename.list.uuid, rename.list.name, rename.resynced_tasks
            );
        }
        ListCommand::Reorder { board, lists } => {
            let outcome = service.reorder_lists(board, &lists)?;
            println!("board={} writes={}", outcome.container, outcome.writes);
        }
    }
    Ok(())
}

fn run_task(conn: &Connection, config: &CoreConfig, command: TaskCommand) -> CliResult {
    let repo = SqliteTaskRepository::try_new(conn)?.with_retry(config.retry);
    let service = TaskService::new(repo, notification_service(conn, config)?);
    match command {
        TaskCommand::Add(args) => {
            let mut input = NewTask::new(args.project, args.list, args.title);
            input.assignee = args.assignee;
            input.due_at = args.due_at;
            input.priority = args.priority.into();
            input.tags = args.tags;
            input.position = args.position;
            print_task("", &service.create_task(&input)?);
        }
        TaskCommand::Move {
            task,
            list,
            position,
        } => {
            let moved = service.move_task(task, list, position)?;
            println!(
                "moved={} from_list={} from_position={} writes={}",
                moved.moved, moved.from_list, moved.from_position, moved.writes
            );
            print_task("", &moved.task);
        }
        TaskCommand::Reorder { list, tasks } => {
            let outcome = service.reorder_tasks(list, &tasks)?;
            println!("list={} writes={}", outcome.container, outcome.writes);
        }
        TaskCommand::Comment { task, body, author } => {
            let comments = comment_service(conn, config)?;
            let comment =
                comments.add_comment(&NewComment::new(task, author.as_deref(), body))?;
            println!("comment={} task={}", comment.uuid, comment.task_uuid);
        }
        TaskCommand::Comments { task } => {
            for comment in comment_service(conn, config)?.list_comments(task)? {
                println!(
                    "comment={} author={} created_at={} body={:?}",
                    comment.uuid,
                    comment.author.as_deref().unwrap_or("-"),
                    comment.created_at,
                    comment.body
                );
            }
        }
    }
    Ok(())
}

fn print_task(indent: &str, task: &Task) {
    println!(
        "{indent}task={} position={} status={:?} priority={} title={:?}",
        task.uuid,
        task.position,
        task.status,
        task.priority.as_str(),
        task.title
    );
}
