use rusqlite::Connection;
use taskboard_core::db::open_db_in_memory;
use taskboard_core::model::placement::OrderError;
use taskboard_core::{
    BoardRepository, EntityKind, NewTask, RepoError, SqliteBoardRepository, SqliteTaskRepository,
    Task, TaskRepository,
};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn seed_task(conn: &Connection) -> Task {
    let boards = SqliteBoardRepository::try_new(conn).unwrap();
    let project = boards.create_project("Apollo", "").unwrap();
    let board = boards
        .create_board(project.uuid, "Main", &["Todo".to_string()])
        .unwrap();
    SqliteTaskRepository::try_new(conn)
        .unwrap()
        .create_task(&NewTask::new(project.uuid, board.lists[0].uuid, "Launch"))
        .unwrap()
}

#[test]
fn subtasks_append_with_dense_positions() {
    let conn = setup();
    let task = seed_task(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let first = repo.create_subtask(task.uuid, " Fuel ", "Top off both stages").unwrap();
    let second = repo.create_subtask(task.uuid, "Crew", "").unwrap();
    let third = repo.create_subtask(task.uuid, "Countdown", "").unwrap();

    assert_eq!(first.title, "Fuel");
    assert_eq!(first.description, "Top off both stages");
    assert_eq!(second.description, "");
    assert!(!first.completed);
    let listed = repo.list_subtasks(task.uuid).unwrap();
    let order: Vec<(Uuid, i64)> = listed.iter().map(|item| (item.uuid, item.position)).collect();
    assert_eq!(
        order,
        vec![(first.uuid, 1), (second.uuid, 2), (third.uuid, 3)]
    );
}

#[test]
fn subtask_for_missing_task_is_container_not_found() {
    let conn = setup();
    seed_task(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let err = repo.create_subtask(Uuid::new_v4(), "Fuel", "").unwrap_err();
    assert!(matches!(
        err,
        RepoError::ContainerNotFound {
            kind: EntityKind::Task,
            ..
        }
    ));
}

#[test]
fn blank_subtask_title_is_rejected() {
    let conn = setup();
    let task = seed_task(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    assert!(matches!(
        repo.create_subtask(task.uuid, "  ", ""),
        Err(RepoError::Validation(_))
    ));
    assert!(repo.list_subtasks(task.uuid).unwrap().is_empty());
}

#[test]
fn reorder_subtasks_validates_membership() {
    let conn = setup();
    let task = seed_task(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let a = repo.create_subtask(task.uuid, "a", "").unwrap().uuid;
    let b = repo.create_subtask(task.uuid, "b", "").unwrap().uuid;

    let outcome = repo.reorder_subtasks(task.uuid, &[b, a]).unwrap();
    assert_eq!(outcome.writes, 2);
    let titles: Vec<String> = repo
        .list_subtasks(task.uuid)
        .unwrap()
        .into_iter()
        .map(|item| item.title)
        .collect();
    assert_eq!(titles, vec!["b".to_string(), "a".to_string()]);

    let err = repo
        .reorder_subtasks(task.uuid, &[b, Uuid::new_v4()])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidOrder(OrderError::SetMismatch { .. })
    ));
}

#[test]
fn toggle_completion_and_cascade_with_task() {
    let conn = setup();
    let task = seed_task(&conn);
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let item = repo.create_subtask(task.uuid, "Fuel", "").unwrap();

    let done = repo.set_subtask_completed(item.uuid, true).unwrap();
    assert!(done.completed);
    let undone = repo.set_subtask_completed(item.uuid, false).unwrap();
    assert!(!undone.completed);

    assert!(matches!(
        repo.set_subtask_completed(Uuid::new_v4(), true),
        Err(RepoError::MemberNotFound {
            kind: EntityKind::Subtask,
            ..
        })
    ));

    repo.delete_task(task.uuid).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM subtasks;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}
