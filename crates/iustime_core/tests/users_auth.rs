use iustime_core::db::open_db_in_memory;
use iustime_core::repo::line_repo::SqliteLineRepository;
use iustime_core::repo::user_repo::SqliteUserRepository;
use iustime_core::service::line_service::LineService;
use iustime_core::service::user_service::UserService;
use iustime_core::{
    EntityKind, LineScope, NewUser, ServiceError, User, UserRole, ValidationError, WorkLine,
};
use rusqlite::Connection;
use uuid::Uuid;

fn users(conn: &Connection) -> UserService<SqliteUserRepository<'_>, SqliteLineRepository<'_>> {
    UserService::new(
        SqliteUserRepository::try_new(conn).unwrap(),
        SqliteLineRepository::try_new(conn).unwrap(),
    )
}

fn line(conn: &Connection) -> WorkLine {
    LineService::new(SqliteLineRepository::try_new(conn).unwrap())
        .create_line("Comercial", "")
        .unwrap()
}

fn admin_input(email: &str) -> NewUser {
    NewUser {
        name: "Admin".to_string(),
        email: email.to_string(),
        password: "s3cret-pass".to_string(),
        role: UserRole::Admin,
        assigned_line_id: None,
    }
}

fn member_input(email: &str, line: &WorkLine) -> NewUser {
    NewUser {
        name: " Carla ".to_string(),
        email: email.to_string(),
        password: "member-pass".to_string(),
        role: UserRole::User,
        assigned_line_id: Some(line.id),
    }
}

#[test]
fn create_user_normalizes_and_login_ignores_email_case() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn);
    let service = users(&conn);

    let created = service
        .create_user(&member_input("  Carla@Example.COM ", &line))
        .unwrap();
    assert_eq!(created.name, "Carla");
    assert_eq!(created.email, "carla@example.com");
    assert_eq!(created.assigned_line_id, Some(line.id));

    let session = service.login("CARLA@example.com", "member-pass").unwrap();
    assert_eq!(session.user().id, created.id);
    assert!(!session.is_admin());
    assert_eq!(session.scope(), LineScope::Single(line.id));
}

#[test]
fn stored_password_is_an_argon2_hash() {
    let conn = open_db_in_memory().unwrap();
    let created = users(&conn).create_user(&admin_input("root@example.com")).unwrap();

    let stored: String = conn
        .query_row(
            "SELECT password_hash FROM users WHERE id = ?1;",
            [created.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert!(stored.starts_with("$argon2id$"));
    assert!(!stored.contains("s3cret-pass"));
}

#[test]
fn wrong_password_and_unknown_email_fail_the_same_way() {
    let conn = open_db_in_memory().unwrap();
    let service = users(&conn);
    service.create_user(&admin_input("root@example.com")).unwrap();

    assert!(matches!(
        service.login("root@example.com", "nope").unwrap_err(),
        ServiceError::InvalidCredentials
    ));
    assert!(matches!(
        service.login("ghost@example.com", "s3cret-pass").unwrap_err(),
        ServiceError::InvalidCredentials
    ));
}

#[test]
fn duplicate_email_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let service = users(&conn);
    service.create_user(&admin_input("root@example.com")).unwrap();

    let err = service
        .create_user(&admin_input("ROOT@example.com"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[test]
fn role_and_line_assignment_are_validated() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn);
    let service = users(&conn);

    let mut no_line = member_input("a@example.com", &line);
    no_line.assigned_line_id = None;
    assert!(matches!(
        service.create_user(&no_line).unwrap_err(),
        ServiceError::Validation(ValidationError::MissingAssignedLine)
    ));

    let mut admin_with_line = admin_input("b@example.com");
    admin_with_line.assigned_line_id = Some(line.id);
    assert!(matches!(
        service.create_user(&admin_with_line).unwrap_err(),
        ServiceError::Validation(ValidationError::UnexpectedAssignedLine)
    ));

    let mut unknown_line = member_input("c@example.com", &line);
    unknown_line.assigned_line_id = Some(Uuid::new_v4());
    assert!(matches!(
        service.create_user(&unknown_line).unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::Line, .. }
    ));

    let mut blank_password = member_input("d@example.com", &line);
    blank_password.password = "   ".to_string();
    assert!(matches!(
        service.create_user(&blank_password).unwrap_err(),
        ServiceError::Validation(ValidationError::BlankField("password"))
    ));

    assert!(matches!(
        service.create_user(&member_input("not-an-email", &line)).unwrap_err(),
        ServiceError::Validation(ValidationError::InvalidEmail(_))
    ));
}

#[test]
fn last_admin_cannot_be_demoted_or_deleted() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn);
    let service = users(&conn);
    let admin = service.create_user(&admin_input("root@example.com")).unwrap();

    let mut demoted: User = admin.clone();
    demoted.role = UserRole::User;
    demoted.assigned_line_id = Some(line.id);
    assert!(matches!(
        service.update_user(&demoted).unwrap_err(),
        ServiceError::LastAdmin
    ));
    assert!(matches!(
        service.delete_user(admin.id).unwrap_err(),
        ServiceError::LastAdmin
    ));

    service.create_user(&admin_input("second@example.com")).unwrap();
    let stored = service.update_user(&demoted).unwrap();
    assert_eq!(stored.role, UserRole::User);
    assert_eq!(stored.assigned_line_id, Some(line.id));
}

#[test]
fn set_password_replaces_the_old_one() {
    let conn = open_db_in_memory().unwrap();
    let service = users(&conn);
    let admin = service.create_user(&admin_input("root@example.com")).unwrap();

    service.set_password(admin.id, "brand-new").unwrap();

    assert!(service.login("root@example.com", "s3cret-pass").is_err());
    assert!(service.login("root@example.com", "brand-new").is_ok());
    assert!(matches!(
        service.set_password(Uuid::new_v4(), "whatever").unwrap_err(),
        ServiceError::NotFound { kind: EntityKind::User, .. }
    ));
}

#[test]
fn ensure_default_admin_only_seeds_an_empty_table() {
    let conn = open_db_in_memory().unwrap();
    let service = users(&conn);

    let seeded = service
        .ensure_default_admin("Boss@Example.com", "first-run")
        .unwrap()
        .unwrap();
    assert_eq!(seeded.email, "boss@example.com");
    assert!(seeded.is_admin());

    assert!(service
        .ensure_default_admin("other@example.com", "ignored")
        .unwrap()
        .is_none());
    assert_eq!(service.list_users(None).unwrap().len(), 1);
}

#[test]
fn line_with_assigned_users_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn);
    users(&conn)
        .create_user(&member_input("carla@example.com", &line))
        .unwrap();

    let err = LineService::new(SqliteLineRepository::try_new(&conn).unwrap())
        .delete_line(line.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[test]
fn list_users_searches_name_and_email() {
    let conn = open_db_in_memory().unwrap();
    let line = line(&conn);
    let service = users(&conn);
    service.create_user(&admin_input("root@example.com")).unwrap();
    service
        .create_user(&member_input("carla@example.com", &line))
        .unwrap();

    assert_eq!(service.list_users(None).unwrap().len(), 2);
    let found = service.list_users(Some("CARLA")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Carla");
}
