use std::sync::{Arc, Barrier};
use std::thread;

use rusqlite::Connection;
use taskboard_core::db::{open_db, open_db_in_memory, open_db_with};
use taskboard_core::model::placement::{is_dense, OrderError};
use taskboard_core::{
    BoardRepository, BoardSnapshot, CoreConfig, DomainEvent, EntityKind, EventBuffer, ListId,
    NewTask, Project, RepoError, RetryPolicy, SqliteBoardRepository, SqliteTaskRepository,
    TaskId, TaskPatch, TaskPriority, TaskRepository, TaskService,
};
use uuid::Uuid;

const BACKLOG: usize = 0;
const TODO: usize = 1;
const PROGRESS: usize = 2;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn seed_board(conn: &Connection) -> (Project, BoardSnapshot) {
    let repo = SqliteBoardRepository::try_new(conn).unwrap();
    let project = repo.create_project("Apollo", "").unwrap();
    let defaults: Vec<String> = taskboard_core::DEFAULT_LIST_NAMES
        .iter()
        .map(|name| (*name).to_string())
        .collect();
    let board = repo.create_board(project.uuid, "Main", &defaults).unwrap();
    (project, board)
}

fn add_tasks(
    repo: &SqliteTaskRepository<'_>,
    project: &Project,
    list: ListId,
    titles: &[&str],
) -> Vec<TaskId> {
    titles
        .iter()
        .map(|title| {
            repo.create_task(&NewTask::new(project.uuid, list, *title))
                .unwrap()
                .uuid
        })
        .collect()
}

fn order(repo: &SqliteTaskRepository<'_>, list: ListId) -> Vec<(TaskId, i64)> {
    repo.list_tasks(list)
        .unwrap()
        .into_iter()
        .map(|task| (task.uuid, task.position))
        .collect()
}

fn task_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_appends_dense_positions_and_mirrors_list_name() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let todo = board.lists[TODO].uuid;

    let ids = add_tasks(&repo, &project, todo, &["a", "b", "c"]);

    assert_eq!(
        order(&repo, todo),
        vec![(ids[0], 1), (ids[1], 2), (ids[2], 3)]
    );
    for task in repo.list_tasks(todo).unwrap() {
        assert_eq!(task.status, "Todo");
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.project_uuid, project.uuid);
    }
}

#[test]
fn create_stores_optional_fields() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let mut input = NewTask::new(project.uuid, board.lists[BACKLOG].uuid, "  Launch   checklist ");
    input.description = "fuel, crew".to_string();
    input.due_at = Some(1_700_000_000_000);
    input.assignee = Some(" dana ".to_string());
    input.priority = TaskPriority::High;
    input.tags = vec!["Ops".to_string(), "ops".to_string(), "launch".to_string()];

    let task = repo.create_task(&input).unwrap();
    assert_eq!(task.title, "Launch checklist");
    assert_eq!(task.assignee.as_deref(), Some("dana"));
    assert_eq!(task.tags, vec!["ops".to_string(), "launch".to_string()]);
    assert_eq!(task.status, "Backlog");
    assert_eq!(repo.get_task(task.uuid).unwrap(), Some(task));
}

#[test]
fn create_into_missing_list_is_container_not_found() {
    let conn = setup();
    let (project, _) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    let err = repo
        .create_task(&NewTask::new(project.uuid, missing, "orphan"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::ContainerNotFound {
            kind: EntityKind::List,
            id,
        } if id == missing
    ));
    assert_eq!(task_count(&conn), 0);
}

#[test]
fn create_with_foreign_project_is_rejected() {
    let conn = setup();
    let (_, board) = seed_board(&conn);
    let other = SqliteBoardRepository::try_new(&conn)
        .unwrap()
        .create_project("Gemini", "")
        .unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let err = repo
        .create_task(&NewTask::new(other.uuid, board.lists[TODO].uuid, "stray"))
        .unwrap_err();
    assert!(matches!(err, RepoError::ProjectMismatch { .. }));
    assert_eq!(task_count(&conn), 0);
}

#[test]
fn create_with_blank_title_is_validation_error() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let err = repo
        .create_task(&NewTask::new(project.uuid, board.lists[TODO].uuid, "   "))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn create_at_explicit_position_shifts_siblings() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let list = board.lists[PROGRESS].uuid;
    let ids = add_tasks(&repo, &project, list, &["x", "y"]);

    let mut input = NewTask::new(project.uuid, list, "new");
    input.position = Some(1);
    let created = repo.create_task(&input).unwrap();

    assert_eq!(created.position, 1);
    assert_eq!(
        order(&repo, list),
        vec![(created.uuid, 1), (ids[0], 2), (ids[1], 3)]
    );
}

#[test]
fn create_clamps_oversized_position_to_append() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let list = board.lists[TODO].uuid;
    add_tasks(&repo, &project, list, &["x", "y"]);

    let mut input = NewTask::new(project.uuid, list, "late");
    input.position = Some(40);
    assert_eq!(repo.create_task(&input).unwrap().position, 3);

    input.position = Some(-2);
    assert_eq!(repo.create_task(&input).unwrap().position, 1);
}

#[test]
fn reorder_rewrites_positions_and_is_idempotent() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let list = board.lists[TODO].uuid;
    let ids = add_tasks(&repo, &project, list, &["a", "b", "c"]);

    let desired = vec![ids[2], ids[0], ids[1]];
    let outcome = repo.reorder_tasks(list, &desired).unwrap();
    assert_eq!(outcome.container, list);
    assert_eq!(outcome.writes, 3);
    assert_eq!(
        order(&repo, list),
        vec![(ids[2], 1), (ids[0], 2), (ids[1], 3)]
    );

    let repeated = repo.reorder_tasks(list, &desired).unwrap();
    assert_eq!(repeated.writes, 0);
    assert_eq!(
        order(&repo, list),
        vec![(ids[2], 1), (ids[0], 2), (ids[1], 3)]
    );
}

#[test]
fn reorder_rejects_non_bijections_without_writes() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let list = board.lists[TODO].uuid;
    let ids = add_tasks(&repo, &project, list, &["a", "b", "c"]);
    let before = order(&repo, list);
    let stranger = Uuid::new_v4();

    let partial = repo.reorder_tasks(list, &[ids[1], ids[0]]).unwrap_err();
    assert!(matches!(
        partial,
        RepoError::InvalidOrder(OrderError::CountMismatch {
            expected: 3,
            actual: 2
        })
    ));

    let foreign = repo
        .reorder_tasks(list, &[ids[1], ids[0], stranger])
        .unwrap_err();
    match foreign {
        RepoError::InvalidOrder(OrderError::SetMismatch {
            unknown, missing, ..
        }) => {
            assert_eq!(unknown, vec![stranger]);
            assert_eq!(missing, vec![ids[2]]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let duplicated = repo
        .reorder_tasks(list, &[ids[0], ids[0], ids[1]])
        .unwrap_err();
    match duplicated {
        RepoError::InvalidOrder(OrderError::SetMismatch { duplicates, .. }) => {
            assert_eq!(duplicates, vec![ids[0]]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let empty = repo.reorder_tasks(list, &[]).unwrap_err();
    assert!(matches!(empty, RepoError::InvalidOrder(OrderError::Empty)));

    assert_eq!(order(&repo, list), before);
}

#[test]
fn reorder_of_missing_list_is_container_not_found() {
    let conn = setup();
    seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let err = repo
        .reorder_tasks(Uuid::new_v4(), &[Uuid::new_v4()])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::ContainerNotFound {
            kind: EntityKind::List,
            ..
        }
    ));
}

#[test]
fn move_compacts_source_and_appends_to_empty_target() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let source = board.lists[TODO].uuid;
    let target = board.lists[PROGRESS].uuid;
    let ids = add_tasks(&repo, &project, source, &["a1", "a2", "a3"]);

    let moved = repo.move_task(ids[1], target, None).unwrap();

    assert!(moved.moved);
    assert_eq!(moved.from_list, source);
    assert_eq!(moved.from_position, 2);
    assert_eq!(moved.writes, 2);
    assert_eq!(moved.task.list_uuid, target);
    assert_eq!(moved.task.position, 1);
    assert_eq!(moved.task.status, "Progress");
    assert_eq!(order(&repo, source), vec![(ids[0], 1), (ids[2], 2)]);
    assert_eq!(order(&repo, target), vec![(ids[1], 1)]);
}

#[test]
fn move_to_explicit_position_opens_slot_in_target() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let source = board.lists[TODO].uuid;
    let target = board.lists[PROGRESS].uuid;
    let moving = add_tasks(&repo, &project, source, &["m"])[0];
    let residents = add_tasks(&repo, &project, target, &["x", "y"]);

    let moved = repo.move_task(moving, target, Some(1)).unwrap();

    assert_eq!(moved.task.position, 1);
    assert_eq!(
        order(&repo, target),
        vec![(moving, 1), (residents[0], 2), (residents[1], 3)]
    );
    assert!(order(&repo, source).is_empty());
}

#[test]
fn move_clamps_oversized_position_to_append() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let source = board.lists[TODO].uuid;
    let target = board.lists[PROGRESS].uuid;
    let moving = add_tasks(&repo, &project, source, &["m"])[0];
    add_tasks(&repo, &project, target, &["x", "y"]);

    let moved = repo.move_task(moving, target, Some(99)).unwrap();
    assert_eq!(moved.task.position, 3);
}

#[test]
fn move_to_current_list_is_noop() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let list = board.lists[TODO].uuid;
    let ids = add_tasks(&repo, &project, list, &["a", "b"]);
    let before = repo.get_task(ids[0]).unwrap().unwrap();

    let outcome = repo.move_task(ids[0], list, Some(2)).unwrap();

    assert!(!outcome.moved);
    assert_eq!(outcome.writes, 0);
    assert_eq!(outcome.task, before);
    assert_eq!(order(&repo, list), vec![(ids[0], 1), (ids[1], 2)]);
}

#[test]
fn move_reports_missing_member_and_container() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let list = board.lists[TODO].uuid;
    let task = add_tasks(&repo, &project, list, &["a"])[0];

    let missing_task = repo
        .move_task(Uuid::new_v4(), list, None)
        .unwrap_err();
    assert!(matches!(
        missing_task,
        RepoError::MemberNotFound {
            kind: EntityKind::Task,
            ..
        }
    ));

    let missing_list = repo.move_task(task, Uuid::new_v4(), None).unwrap_err();
    assert!(matches!(
        missing_list,
        RepoError::ContainerNotFound {
            kind: EntityKind::List,
            ..
        }
    ));
    assert_eq!(order(&repo, list), vec![(task, 1)]);
}

#[test]
fn move_across_projects_is_rejected() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let boards = SqliteBoardRepository::try_new(&conn).unwrap();
    let other = boards.create_project("Gemini", "").unwrap();
    let foreign = boards
        .create_board(other.uuid, "Main", &["Todo".to_string()])
        .unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let task = add_tasks(&repo, &project, board.lists[TODO].uuid, &["a"])[0];

    let err = repo
        .move_task(task, foreign.lists[0].uuid, None)
        .unwrap_err();
    assert!(matches!(err, RepoError::ProjectMismatch { .. }));
    assert_eq!(
        repo.get_task(task).unwrap().unwrap().list_uuid,
        board.lists[TODO].uuid
    );
}

#[test]
fn delete_leaves_gap_until_next_move_compacts() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let list = board.lists[TODO].uuid;
    let ids = add_tasks(&repo, &project, list, &["a", "b", "c"]);

    let deleted = repo.delete_task(ids[1]).unwrap();
    assert_eq!(deleted.uuid, ids[1]);
    assert_eq!(order(&repo, list), vec![(ids[0], 1), (ids[2], 3)]);

    let appended = add_tasks(&repo, &project, list, &["d"])[0];
    assert_eq!(order(&repo, list).last(), Some(&(appended, 4)));

    repo.move_task(ids[0], board.lists[PROGRESS].uuid, None)
        .unwrap();
    assert_eq!(order(&repo, list), vec![(ids[2], 1), (appended, 2)]);

    assert!(matches!(
        repo.delete_task(ids[1]),
        Err(RepoError::MemberNotFound { .. })
    ));
}

#[test]
fn positions_stay_dense_across_moves_and_reorders() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let lists: Vec<ListId> = board.lists.iter().map(|list| list.uuid).collect();
    let ids = add_tasks(&repo, &project, lists[0], &["a", "b", "c", "d", "e", "f"]);

    let steps: [(usize, usize, Option<i64>); 8] = [
        (0, 1, None),
        (3, 1, Some(1)),
        (5, 2, Some(7)),
        (1, 1, Some(2)),
        (0, 0, Some(1)),
        (2, 4, None),
        (4, 4, Some(1)),
        (3, 2, None),
    ];
    for (task, list, position) in steps {
        repo.move_task(ids[task], lists[list], position).unwrap();
        for list in &lists {
            let positions: Vec<i64> = order(&repo, *list)
                .into_iter()
                .map(|(_, position)| position)
                .collect();
            assert!(is_dense(&positions), "positions {positions:?} not dense");
        }
    }

    let mut first: Vec<TaskId> = order(&repo, lists[1])
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    first.reverse();
    repo.reorder_tasks(lists[1], &first).unwrap();
    let positions: Vec<i64> = order(&repo, lists[1])
        .into_iter()
        .map(|(_, position)| position)
        .collect();
    assert!(is_dense(&positions));

    let total: usize = lists
        .iter()
        .map(|list| repo.list_tasks(*list).unwrap().len())
        .sum();
    assert_eq!(total, ids.len());
}

#[test]
fn update_returns_previous_and_current_rows() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let task = add_tasks(&repo, &project, board.lists[TODO].uuid, &["draft"])[0];

    let patch = TaskPatch {
        title: Some("Final   draft".to_string()),
        assignee: Some(Some("dana".to_string())),
        priority: Some(TaskPriority::Low),
        ..TaskPatch::default()
    };
    let change = repo.update_task(task, &patch).unwrap();
    assert_eq!(change.previous.title, "draft");
    assert_eq!(change.previous.assignee, None);
    assert_eq!(change.current.title, "Final draft");
    assert_eq!(change.current.assignee.as_deref(), Some("dana"));
    assert!(change.assignee_changed());
    assert!(!change.due_changed());
    assert_eq!(change.current.position, change.previous.position);
    assert_eq!(change.current.status, "Todo");

    let unchanged = repo.update_task(task, &patch).unwrap();
    assert_eq!(unchanged.previous, unchanged.current);

    let cleared = repo
        .update_task(
            task,
            &TaskPatch {
                assignee: Some(None),
                ..TaskPatch::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.current.assignee, None);

    assert!(matches!(
        repo.update_task(Uuid::new_v4(), &patch),
        Err(RepoError::MemberNotFound { .. })
    ));
}

#[test]
fn service_publishes_events_after_commit_only() {
    let conn = setup();
    let (project, board) = seed_board(&conn);
    let events = EventBuffer::new();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap(), &events);
    let todo = board.lists[TODO].uuid;
    let progress = board.lists[PROGRESS].uuid;

    let task = service
        .create_task(&NewTask::new(project.uuid, todo, "a"))
        .unwrap();
    service.move_task(task.uuid, todo, None).unwrap();
    service.move_task(task.uuid, progress, None).unwrap();
    assert!(service.reorder_tasks(progress, &[]).is_err());
    service
        .update_task(task.uuid, &TaskPatch::default())
        .unwrap();

    let published = events.drain();
    assert_eq!(published.len(), 2);
    assert!(matches!(&published[0], DomainEvent::TaskCreated { task: created } if created.uuid == task.uuid));
    match &published[1] {
        DomainEvent::TaskMoved {
            task: moved,
            from_list,
            from_position,
        } => {
            assert_eq!(moved.list_uuid, progress);
            assert_eq!(moved.status, "Progress");
            assert_eq!(*from_list, todo);
            assert_eq!(*from_position, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn concurrent_creates_into_empty_list_get_distinct_positions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.db");
    let (project_uuid, list_uuid) = {
        let conn = open_db(&path).unwrap();
        let (project, board) = seed_board(&conn);
        (project.uuid, board.lists[TODO].uuid)
    };

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|index| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqliteTaskRepository::try_new(&conn).unwrap();
                barrier.wait();
                repo.create_task(&NewTask::new(
                    project_uuid,
                    list_uuid,
                    format!("task {index}"),
                ))
                .unwrap()
                .position
            })
        })
        .collect();

    let mut positions: Vec<i64> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![1, 2]);
}

#[test]
fn held_write_lock_surfaces_concurrency_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let config = CoreConfig {
        db_path: Some(path.clone()),
        busy_timeout_ms: 10,
        ..CoreConfig::default()
    };
    let conn = open_db_with(&config).unwrap();
    let (project, board) = seed_board(&conn);
    let repo = SqliteTaskRepository::try_new(&conn)
        .unwrap()
        .with_retry(RetryPolicy {
            max_attempts: 2,
            backoff_ms: 1,
        });

    let blocker = open_db(&path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let err = repo
        .create_task(&NewTask::new(project.uuid, board.lists[TODO].uuid, "blocked"))
        .unwrap_err();
    assert!(matches!(err, RepoError::ConcurrencyConflict { attempts: 2 }));
    assert!(err.is_transient());

    blocker.execute_batch("ROLLBACK;").unwrap();
    assert_eq!(task_count(&conn), 0);

    let task = repo
        .create_task(&NewTask::new(project.uuid, board.lists[TODO].uuid, "unblocked"))
        .unwrap();
    assert_eq!(task.position, 1);
}
