use chrono::NaiveDate;
use iustime_core::db::open_db_in_memory;
use iustime_core::repo::line_repo::SqliteLineRepository;
use iustime_core::repo::project_repo::SqliteProjectRepository;
use iustime_core::repo::risk_repo::{RiskListQuery, SqliteRiskRepository};
use iustime_core::repo::task_repo::SqliteTaskRepository;
use iustime_core::service::line_service::LineService;
use iustime_core::service::project_service::ProjectService;
use iustime_core::service::risk_service::RiskService;
use iustime_core::service::task_service::TaskService;
use iustime_core::{EntityKind, Level, Project, Risk, RiskStatus, ServiceError, Task, WorkLine};
use rusqlite::Connection;
use uuid::Uuid;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
}

fn risks(conn: &Connection) -> RiskService<SqliteRiskRepository<'_>, SqliteTaskRepository<'_>> {
    RiskService::new(
        SqliteRiskRepository::try_new(conn).unwrap(),
        SqliteTaskRepository::try_new(conn).unwrap(),
    )
}

fn line(conn: &Connection, name: &str) -> WorkLine {
    LineService::new(SqliteLineRepository::try_new(conn).unwrap())
        .create_line(name, "")
        .unwrap()
}

fn task_in(conn: &Connection, line: &WorkLine) -> Task {
    let project = ProjectService::new(
        SqliteProjectRepository::try_new(conn).unwrap(),
        SqliteTaskRepository::try_new(conn).unwrap(),
    )
    .create_project(&Project::new(line.id, "Proyecto", date(1), date(30)))
    .unwrap();
    TaskService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteProjectRepository::try_new(conn).unwrap(),
    )
    .create_task(&Task::new(line.id, project.id, "Tarea", date(2), date(9)))
    .unwrap()
}

#[test]
fn create_risk_normalizes_text_and_keeps_fields() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn, "Redes");

    let mut risk = Risk::new(line.id, "  Proveedor sin stock ");
    risk.responsible = "Marta".to_string();
    risk.impact = Level::High;
    risk.mitigation_strategy = Some("   ".to_string());
    let stored = risks(&conn).create_risk(&risk).unwrap();

    assert_eq!(stored.description, "Proveedor sin stock");
    assert_eq!(stored.responsible, "Marta");
    assert_eq!(stored.impact, Level::High);
    assert_eq!(stored.status, RiskStatus::Open);
    assert_eq!(stored.mitigation_strategy, None);
}

#[test]
fn linked_task_must_exist_and_share_the_line() {
    let conn = open_db_in_memory().unwrap();
    let home = line(&conn, "Casa");
    let away = line(&conn, "Fuera");
    let foreign_task = task_in(&conn, &away);

    let mut risk = Risk::new(home.id, "Dependencia externa");
    risk.task_id = Some(foreign_task.id);
    assert!(matches!(
        risks(&conn).create_risk(&risk).unwrap_err(),
        ServiceError::LineMismatch { .. }
    ));

    risk.task_id = Some(Uuid::new_v4());
    assert!(matches!(
        risks(&conn).create_risk(&risk).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::Task, .. }
    ));

    let own_task = task_in(&conn, &home);
    risk.task_id = Some(own_task.id);
    let stored = risks(&conn).create_risk(&risk).unwrap();
    assert_eq!(stored.task_id, Some(own_task.id));
}

#[test]
fn deleting_the_linked_task_clears_the_link() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn, "Casa");
    let task = task_in(&conn, &line);

    let mut risk = Risk::new(line.id, "Retraso de hardware");
    risk.task_id = Some(task.id);
    let risk = risks(&conn).create_risk(&risk).unwrap();

    TaskService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
    )
    .delete_task(task.id)
    .unwrap();

    let reloaded = risks(&conn).get_risk(risk.id).unwrap();
    assert_eq!(reloaded.task_id, None);
}

#[test]
fn task_with_linked_risks_cannot_change_line() {
    let conn = open_db_in_memory().unwrap();
    let home = line(&conn, "Casa");
    let away = line(&conn, "Fuera");
    let parent = task_in(&conn, &home);
    let destination = task_in(&conn, &away);
    let tasks = TaskService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
    );
    let child = tasks
        .create_task(&Task::subtask_of(&parent, "Subtarea", date(3), date(4)))
        .unwrap();

    let mut risk = Risk::new(home.id, "Permiso pendiente");
    risk.task_id = Some(child.id);
    let risk = risks(&conn).create_risk(&risk).unwrap();

    let mut moved = parent.clone();
    moved.project_id = destination.project_id;
    moved.line_id = away.id;
    match tasks.update_task(&moved).unwrap_err() {
        ServiceError::LinkedRisks { task_id, count } => {
            assert_eq!(task_id, parent.id);
            assert_eq!(count, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(tasks.get_task(parent.id).unwrap().line_id, home.id);
    assert_eq!(tasks.get_task(child.id).unwrap().line_id, home.id);
    // The untouched risk still saves.
    risks(&conn).update_risk(&risk).unwrap();

    risks(&conn).delete_risk(risk.id).unwrap();
    tasks.update_task(&moved).unwrap();
    let child = tasks.get_task(child.id).unwrap();
    assert_eq!(child.line_id, away.id);
    assert_eq!(child.project_id, destination.project_id);
}

#[test]
fn list_risks_scopes_by_line_and_searches_responsible() {
    let conn = open_db_in_memory().unwrap();
    let first = line(&conn, "Primera");
    let second = line(&conn, "Segunda");
    let service = risks(&conn);

    let mut owned = Risk::new(first.id, "Corte eléctrico");
    owned.responsible = "Jorge".to_string();
    service.create_risk(&owned).unwrap();
    service.create_risk(&Risk::new(first.id, "Rotación de personal")).unwrap();
    service.create_risk(&Risk::new(second.id, "Licencias")).unwrap();

    let in_first = service
        .list_risks(&RiskListQuery::for_line(first.id), None)
        .unwrap();
    assert_eq!(in_first.len(), 2);

    let by_responsible = service
        .list_risks(&RiskListQuery::for_line(first.id), Some("jorge"))
        .unwrap();
    assert_eq!(by_responsible.len(), 1);
    assert_eq!(by_responsible[0].description, "Corte eléctrico");

    let everywhere = service.list_risks(&RiskListQuery::default(), None).unwrap();
    assert_eq!(everywhere.len(), 3);
}

#[test]
fn update_and_delete_risk() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn, "Casa");
    let service = risks(&conn);

    let mut risk = service
        .create_risk(&Risk::new(line.id, "Contrato vencido"))
        .unwrap();
    risk.status = RiskStatus::Mitigated;
    risk.mitigation_strategy = Some("Renovación anticipada".to_string());
    let updated = service.update_risk(&risk).unwrap();
    assert_eq!(updated.status, RiskStatus::Mitigated);
    assert!(!updated.is_active());

    service.delete_risk(risk.id).unwrap();
    assert!(matches!(
        service.get_risk(risk.id).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::Risk, .. }
    ));
    assert!(matches!(
        service.delete_risk(risk.id).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::Risk, .. }
    ));
}
