use chrono::NaiveDate;
use iustime_core::db::open_db_in_memory;
use iustime_core::repo::line_repo::SqliteLineRepository;
use iustime_core::repo::project_repo::SqliteProjectRepository;
use iustime_core::repo::task_repo::{SqliteTaskRepository, TaskListQuery};
use iustime_core::service::line_service::LineService;
use iustime_core::service::project_service::ProjectService;
use iustime_core::service::task_service::TaskService;
use iustime_core::{EntityKind, Project, ServiceError, Task, WorkLine, WorkStatus};
use rusqlite::Connection;
use uuid::Uuid;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

fn projects(
    conn: &Connection,
) -> ProjectService<SqliteProjectRepository<'_>, SqliteTaskRepository<'_>> {
    ProjectService::new(
        SqliteProjectRepository::try_new(conn).unwrap(),
        SqliteTaskRepository::try_new(conn).unwrap(),
    )
}

fn tasks(conn: &Connection) -> TaskService<SqliteTaskRepository<'_>, SqliteProjectRepository<'_>> {
    TaskService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteProjectRepository::try_new(conn).unwrap(),
    )
}

fn seed(conn: &Connection) -> (WorkLine, Project) {
    let line = LineService::new(SqliteLineRepository::try_new(conn).unwrap())
        .create_line("Operaciones", "")
        .unwrap();
    let project = projects(conn)
        .create_project(&Project::new(line.id, "Centro de datos", date(1), date(30)))
        .unwrap();
    (line, project)
}

fn task_with_progress(project: &Project, title: &str, progress: u8) -> Task {
    let mut task = Task::new(project.line_id, project.id, title, date(2), date(12));
    task.progress = progress;
    task
}

fn stored_progress(conn: &Connection, project: &Project) -> u8 {
    projects(conn).get_project(project.id).unwrap().progress
}

#[test]
fn project_progress_rolls_up_from_top_level_tasks() {
    let conn = open_db_in_memory().unwrap();
    let (_, project) = seed(&conn);
    let service = tasks(&conn);

    let first = service
        .create_task(&task_with_progress(&project, "Cableado", 50))
        .unwrap();
    assert_eq!(stored_progress(&conn, &project), 50);

    service
        .create_task(&task_with_progress(&project, "Racks", 75))
        .unwrap();
    assert_eq!(stored_progress(&conn, &project), 63);

    let mut subtask = Task::subtask_of(&first, "Etiquetas", date(3), date(4));
    subtask.progress = 0;
    service.create_task(&subtask).unwrap();
    assert_eq!(stored_progress(&conn, &project), 63);

    let mut done = service.get_task(first.id).unwrap();
    done.progress = 100;
    done.status = WorkStatus::Completed;
    service.update_task(&done).unwrap();
    assert_eq!(stored_progress(&conn, &project), 88);
}

#[test]
fn deleting_last_task_resets_progress_to_zero() {
    let conn = open_db_in_memory().unwrap();
    let (_, project) = seed(&conn);
    let service = tasks(&conn);

    let only = service
        .create_task(&task_with_progress(&project, "Único", 40))
        .unwrap();
    assert_eq!(stored_progress(&conn, &project), 40);

    service.delete_task(only.id).unwrap();
    assert_eq!(stored_progress(&conn, &project), 0);
}

#[test]
fn manual_progress_project_is_left_alone() {
    let conn = open_db_in_memory().unwrap();
    let (line, _) = seed(&conn);
    let mut manual = Project::new(line.id, "Manual", date(1), date(30));
    manual.auto_progress = false;
    manual.progress = 20;
    let manual = projects(&conn).create_project(&manual).unwrap();

    tasks(&conn)
        .create_task(&task_with_progress(&manual, "Algo", 90))
        .unwrap();
    assert_eq!(stored_progress(&conn, &manual), 20);
}

#[test]
fn deleting_parent_removes_its_subtasks() {
    let conn = open_db_in_memory().unwrap();
    let (_, project) = seed(&conn);
    let service = tasks(&conn);

    let parent = service
        .create_task(&task_with_progress(&project, "Padre", 10))
        .unwrap();
    let child = service
        .create_task(&Task::subtask_of(&parent, "Hija", date(3), date(4)))
        .unwrap();

    service.delete_task(parent.id).unwrap();
    assert!(matches!(
        service.get_task(child.id).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::Task, .. }
    ));
}

#[test]
fn subtasks_cannot_nest_or_cross_projects() {
    let conn = open_db_in_memory().unwrap();
    let (line, project) = seed(&conn);
    let other = projects(&conn)
        .create_project(&Project::new(line.id, "Otro", date(1), date(30)))
        .unwrap();
    let service = tasks(&conn);

    let parent = service
        .create_task(&task_with_progress(&project, "Padre", 0))
        .unwrap();
    let child = service
        .create_task(&Task::subtask_of(&parent, "Hija", date(3), date(4)))
        .unwrap();

    let grandchild = Task::subtask_of(&child, "Nieta", date(3), date(4));
    assert!(matches!(
        service.create_task(&grandchild).unwrap_err(),
        ServiceError::InvalidParent(_)
    ));

    let mut foreign = Task::new(line.id, other.id, "Ajena", date(3), date(4));
    foreign.parent_id = Some(parent.id);
    assert!(matches!(
        service.create_task(&foreign).unwrap_err(),
        ServiceError::InvalidParent(_)
    ));

    let mut orphan = task_with_progress(&project, "Huérfana", 0);
    orphan.parent_id = Some(Uuid::new_v4());
    assert!(matches!(
        service.create_task(&orphan).unwrap_err(),
        ServiceError::InvalidParent(_)
    ));
}

#[test]
fn task_with_subtasks_cannot_become_a_subtask() {
    let conn = open_db_in_memory().unwrap();
    let (_, project) = seed(&conn);
    let service = tasks(&conn);

    let first = service
        .create_task(&task_with_progress(&project, "Primera", 0))
        .unwrap();
    let second = service
        .create_task(&task_with_progress(&project, "Segunda", 0))
        .unwrap();
    service
        .create_task(&Task::subtask_of(&first, "Hija", date(3), date(4)))
        .unwrap();

    let mut demoted = first.clone();
    demoted.parent_id = Some(second.id);
    assert!(matches!(
        service.update_task(&demoted).unwrap_err(),
        ServiceError::InvalidParent(_)
    ));

    let mut own = second.clone();
    own.parent_id = Some(second.id);
    assert!(matches!(
        service.update_task(&own).unwrap_err(),
        ServiceError::InvalidParent(_)
    ));
}

#[test]
fn task_line_must_match_project_line() {
    let conn = open_db_in_memory().unwrap();
    let (_, project) = seed(&conn);
    let other_line = LineService::new(SqliteLineRepository::try_new(&conn).unwrap())
        .create_line("Otra línea", "")
        .unwrap();

    let mut task = task_with_progress(&project, "Cruzada", 0);
    task.line_id = other_line.id;
    let err = tasks(&conn).create_task(&task).unwrap_err();
    match err {
        ServiceError::LineMismatch { expected, actual } => {
            assert_eq!(expected, project.line_id);
            assert_eq!(actual, other_line.id);
        }
        other => panic!("unexpected error: {other}"),
    }

    let missing = Task::new(project.line_id, Uuid::new_v4(), "Sin proyecto", date(1), date(2));
    assert!(matches!(
        tasks(&conn).create_task(&missing).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::Project, .. }
    ));
}

#[test]
fn moving_a_task_moves_subtasks_and_recomputes_both_projects() {
    let conn = open_db_in_memory().unwrap();
    let (line, source) = seed(&conn);
    let target = projects(&conn)
        .create_project(&Project::new(line.id, "Destino", date(1), date(30)))
        .unwrap();
    let service = tasks(&conn);

    let mover = service
        .create_task(&task_with_progress(&source, "Viajera", 80))
        .unwrap();
    service
        .create_task(&task_with_progress(&source, "Quieta", 20))
        .unwrap();
    let child = service
        .create_task(&Task::subtask_of(&mover, "Acompañante", date(3), date(4)))
        .unwrap();
    assert_eq!(stored_progress(&conn, &source), 50);

    let mut moved = mover.clone();
    moved.project_id = target.id;
    service.update_task(&moved).unwrap();

    assert_eq!(stored_progress(&conn, &source), 20);
    assert_eq!(stored_progress(&conn, &target), 80);
    assert_eq!(service.get_task(child.id).unwrap().project_id, target.id);

    let in_target = service
        .list_tasks(
            &TaskListQuery {
                project_id: Some(target.id),
                ..TaskListQuery::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(in_target.len(), 2);
}

#[test]
fn failed_move_rolls_back_the_whole_write() {
    let conn = open_db_in_memory().unwrap();
    let (line, source) = seed(&conn);
    let target = projects(&conn)
        .create_project(&Project::new(line.id, "Destino", date(1), date(30)))
        .unwrap();
    let service = tasks(&conn);

    let mover = service
        .create_task(&task_with_progress(&source, "Viajera", 60))
        .unwrap();
    let child = service
        .create_task(&Task::subtask_of(&mover, "Acompañante", date(3), date(4)))
        .unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_subtask_update BEFORE UPDATE ON tasks
         WHEN OLD.parent_id IS NOT NULL
         BEGIN
            SELECT RAISE(ABORT, 'subtask updates blocked');
         END;",
    )
    .unwrap();

    let mut moved = mover.clone();
    moved.project_id = target.id;
    assert!(service.update_task(&moved).is_err());

    assert!(conn.is_autocommit());
    assert_eq!(service.get_task(mover.id).unwrap().project_id, source.id);
    assert_eq!(service.get_task(child.id).unwrap().project_id, source.id);
    assert_eq!(stored_progress(&conn, &source), 60);
    assert_eq!(stored_progress(&conn, &target), 0);
}

#[test]
fn checklist_items_keep_order_and_toggle() {
    let conn = open_db_in_memory().unwrap();
    let (_, project) = seed(&conn);
    let service = tasks(&conn);
    let task = service
        .create_task(&task_with_progress(&project, "Con lista", 0))
        .unwrap();

    service.add_checklist_item(task.id, "Comprar").unwrap();
    let task = service.add_checklist_item(task.id, " Instalar ").unwrap();
    let texts: Vec<&str> = task.checklist.iter().map(|item| item.text.as_str()).collect();
    assert_eq!(texts, vec!["Comprar", "Instalar"]);

    let first = task.checklist[0].id;
    let task = service.toggle_checklist_item(task.id, first).unwrap();
    assert!(task.checklist[0].completed);
    assert_eq!(task.checklist_progress(), (1, 2));

    let task = service.remove_checklist_item(task.id, first).unwrap();
    assert_eq!(task.checklist.len(), 1);
    assert_eq!(task.checklist[0].text, "Instalar");

    assert!(matches!(
        service.toggle_checklist_item(task.id, Uuid::new_v4()).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::ChecklistItem, .. }
    ));
    assert!(matches!(
        service.add_checklist_item(task.id, "   ").unwrap_err(),
        ServiceError::Validation(_)
    ));
}

#[test]
fn attachments_store_payload_and_size() {
    let conn = open_db_in_memory().unwrap();
    let (_, project) = seed(&conn);
    let service = tasks(&conn);
    let task = service
        .create_task(&task_with_progress(&project, "Con adjunto", 0))
        .unwrap();

    let task = service
        .add_attachment(task.id, "acta.txt", "text/plain", b"hola mundo".to_vec())
        .unwrap();
    assert_eq!(task.attachments.len(), 1);
    let attachment = &task.attachments[0];
    assert_eq!(attachment.name, "acta.txt");
    assert_eq!(attachment.mime_type, "text/plain");
    assert_eq!(attachment.size, 10);
    assert_eq!(attachment.data, b"hola mundo");

    let attachment_id = attachment.id;
    let task = service.remove_attachment(task.id, attachment_id).unwrap();
    assert!(task.attachments.is_empty());
    assert!(matches!(
        service.remove_attachment(task.id, attachment_id).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::Attachment, .. }
    ));
}

#[test]
fn task_search_filters_by_title() {
    let conn = open_db_in_memory().unwrap();
    let (line, project) = seed(&conn);
    let service = tasks(&conn);

    let mut cabling = task_with_progress(&project, "Cableado", 0);
    cabling.assignee = "Pedro".to_string();
    service.create_task(&cabling).unwrap();
    service
        .create_task(&task_with_progress(&project, "Energía", 0))
        .unwrap();

    let found = service
        .list_tasks(&TaskListQuery::for_line(line.id), Some("CABLE"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Cableado");

    let by_assignee = service
        .list_tasks(&TaskListQuery::for_line(line.id), Some("pedro"))
        .unwrap();
    assert!(by_assignee.is_empty());
}
