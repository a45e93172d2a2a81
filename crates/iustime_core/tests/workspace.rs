use chrono::NaiveDate;
use iustime_core::{
    AccessError, ConfigError, CoreConfig, DraftOrigin, Level, LineScope, MonthlyReview, NewUser,
    Project, ReviewMonth, Risk, ServiceError, Session, Task, TimelineWindow, UserRole, WorkLine,
    WorkStatus, Workspace, WorkspaceError, DEFAULT_LINE_NAME,
};

const ADMIN_EMAIL: &str = "admin@iustime.test";
const ADMIN_PASSWORD: &str = "admin-pass";
const MEMBER_EMAIL: &str = "member@iustime.test";
const MEMBER_PASSWORD: &str = "member-pass";

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

fn config() -> CoreConfig {
    CoreConfig::default().with_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
}

fn open() -> (Workspace, Session) {
    let workspace = Workspace::open_in_memory(config()).unwrap();
    let session = workspace.login(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
    (workspace, session)
}

/// Creates a second line with a member locked to it and returns the
/// member session.
fn member_on_new_line(workspace: &Workspace, admin: &Session) -> (WorkLine, Session) {
    let line = workspace.create_line(admin, "Ventas", "").unwrap();
    workspace
        .create_user(
            admin,
            &NewUser {
                name: "Miembro".to_string(),
                email: MEMBER_EMAIL.to_string(),
                password: MEMBER_PASSWORD.to_string(),
                role: UserRole::User,
                assigned_line_id: Some(line.id),
            },
        )
        .unwrap();
    let session = workspace.login(MEMBER_EMAIL, MEMBER_PASSWORD).unwrap();
    (line, session)
}

#[test]
fn bootstrap_creates_default_line_and_admin() {
    let (workspace, session) = open();

    assert!(session.is_admin());
    assert_eq!(session.scope(), LineScope::All);
    assert_eq!(session.user().email, ADMIN_EMAIL);

    let lines = workspace.list_lines(&session, None).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].name, DEFAULT_LINE_NAME);
}

#[test]
fn first_run_without_admin_credentials_fails() {
    let err = Workspace::open_in_memory(CoreConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Config(ConfigError::MissingAdminCredentials)
    ));
}

#[test]
fn reopening_a_file_database_does_not_seed_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("iustime.sqlite3");

    let first = Workspace::open(config().with_db_path(&path)).unwrap();
    let admin = first.login(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
    first.create_line(&admin, "Extra", "").unwrap();
    drop(first);

    let reopened = Workspace::open(CoreConfig::default().with_db_path(&path)).unwrap();
    let admin = reopened.login(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
    assert_eq!(reopened.list_lines(&admin, None).unwrap().len(), 2);
    assert_eq!(reopened.list_users(&admin, None).unwrap().len(), 1);
}

#[test]
fn wrong_credentials_are_rejected() {
    let (workspace, _) = open();
    let err = workspace.login(ADMIN_EMAIL, "wrong").unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Service(ServiceError::InvalidCredentials)
    ));
}

#[test]
fn members_only_reach_their_own_line() {
    let (workspace, admin) = open();
    let general = workspace.list_lines(&admin, None).unwrap()[0].clone();
    let (own, member) = member_on_new_line(&workspace, &admin);

    let visible = workspace.list_lines(&member, None).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, own.id);
    assert_eq!(member.default_line(), Some(own.id));

    let foreign = workspace
        .create_project(&admin, &Project::new(general.id, "Interno", date(1), date(30)))
        .unwrap();
    assert!(matches!(
        workspace.get_project(&member, foreign.id).unwrap_err(),
        WorkspaceError::Access(AccessError::LineForbidden { .. })
    ));
    assert!(matches!(
        workspace.list_tasks(&member, general.id, None).unwrap_err(),
        WorkspaceError::Access(AccessError::LineForbidden { .. })
    ));

    let mine = workspace
        .create_project(&member, &Project::new(own.id, "Campaña", date(1), date(30)))
        .unwrap();
    let mut escaped = mine.clone();
    escaped.line_id = general.id;
    assert!(matches!(
        workspace.update_project(&member, &escaped).unwrap_err(),
        WorkspaceError::Access(AccessError::LineForbidden { .. })
    ));
}

#[test]
fn admin_only_operations_reject_members() {
    let (workspace, admin) = open();
    let (_, member) = member_on_new_line(&workspace, &admin);

    for result in [
        workspace.create_line(&member, "Nueva", "").map(|_| ()),
        workspace.list_users(&member, None).map(|_| ()),
        workspace.global_dashboard(&member).map(|_| ()),
        workspace.export_snapshot(&member).map(|_| ()),
        workspace.get_user(&member, admin.user().id).map(|_| ()),
    ] {
        assert!(matches!(
            result.unwrap_err(),
            WorkspaceError::Access(AccessError::AdminRequired)
        ));
    }
}

#[test]
fn members_may_change_their_own_password() {
    let (workspace, admin) = open();
    let (_, member) = member_on_new_line(&workspace, &admin);

    workspace
        .set_password(&member, member.user().id, "changed-pass")
        .unwrap();
    assert!(workspace.login(MEMBER_EMAIL, "changed-pass").is_ok());

    assert!(matches!(
        workspace
            .set_password(&member, admin.user().id, "hijack")
            .unwrap_err(),
        WorkspaceError::Access(AccessError::AdminRequired)
    ));
    assert_eq!(
        workspace.get_user(&member, member.user().id).unwrap().email,
        MEMBER_EMAIL
    );
}

#[test]
fn line_dashboard_counts_tasks_and_risks() {
    let (workspace, admin) = open();
    let line = workspace.list_lines(&admin, None).unwrap()[0].clone();
    let mut project = Project::new(line.id, "Portal", date(1), date(30));
    project.status = WorkStatus::InProgress;
    let project = workspace.create_project(&admin, &project).unwrap();

    let mut done = Task::new(line.id, project.id, "Diseño", date(2), date(5));
    done.status = WorkStatus::Completed;
    done.progress = 100;
    workspace.create_task(&admin, &done).unwrap();
    let mut urgent = Task::new(line.id, project.id, "Despliegue", date(6), date(9));
    urgent.priority = Level::High;
    workspace.create_task(&admin, &urgent).unwrap();

    let mut risk = Risk::new(line.id, "Caída del hosting");
    risk.impact = Level::High;
    workspace.create_risk(&admin, &risk).unwrap();

    let dashboard = workspace.line_dashboard(&admin, line.id).unwrap();
    assert_eq!(dashboard.total_projects, 1);
    assert_eq!(dashboard.in_progress_projects, 1);
    assert_eq!(dashboard.total_tasks, 2);
    assert_eq!(dashboard.completed_tasks, 1);
    assert_eq!(dashboard.pending_tasks, 1);
    assert_eq!(dashboard.high_priority_pending, 1);
    assert_eq!(dashboard.active_risks, 1);
    assert_eq!(dashboard.high_impact_risks, 1);
    assert_eq!(dashboard.efficiency, 50);

    let global = workspace.global_dashboard(&admin).unwrap();
    assert_eq!(global.active_lines, 1);
    assert_eq!(global.total_projects, 1);
    assert_eq!(global.total_tasks, 2);
    assert_eq!(global.global_health, 50);
}

#[test]
fn timeline_places_tasks_in_the_two_week_window() {
    let (workspace, admin) = open();
    let line = workspace.list_lines(&admin, None).unwrap()[0].clone();
    let project = workspace
        .create_project(&admin, &Project::new(line.id, "Mudanza", date(1), date(30)))
        .unwrap();
    workspace
        .create_task(&admin, &Task::new(line.id, project.id, "Embalar", date(3), date(5)))
        .unwrap();
    workspace
        .create_task(&admin, &Task::new(line.id, project.id, "Fuera", date(20), date(25)))
        .unwrap();

    // 2025-06-04 is a Wednesday; the window starts Monday 2025-06-02.
    let window = TimelineWindow::containing(date(4));
    assert_eq!(window.start(), date(2));

    let rows = workspace.timeline(&admin, line.id, &window).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Embalar");
    assert_eq!(rows[0].bar.offset, 1);
    assert_eq!(rows[0].bar.duration, 3);

    let later = workspace.timeline(&admin, line.id, &window.next()).unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].title, "Fuera");
}

#[test]
fn review_generation_without_api_key_runs_offline() {
    let (workspace, admin) = open();
    let line = workspace.list_lines(&admin, None).unwrap()[0].clone();
    let june: ReviewMonth = "2025-06".parse().unwrap();

    let generated = workspace
        .generate_monthly_review(&admin, line.id, june, date(15))
        .unwrap();
    assert_eq!(generated.origin, DraftOrigin::Offline);
    assert!(generated.review.summary.contains(DEFAULT_LINE_NAME));

    let stored = workspace
        .get_monthly_review(&admin, line.id, june)
        .unwrap()
        .unwrap();
    assert_eq!(stored.summary, generated.review.summary);

    let global = workspace.generate_global_review(&admin, june).unwrap();
    assert_eq!(global.origin, DraftOrigin::Offline);
    assert_eq!(workspace.list_global_reviews(&admin).unwrap().len(), 1);
}

#[test]
fn member_review_listing_defaults_to_their_line() {
    let (workspace, admin) = open();
    let general = workspace.list_lines(&admin, None).unwrap()[0].clone();
    let (own, member) = member_on_new_line(&workspace, &admin);
    let may: ReviewMonth = "2025-05".parse().unwrap();

    for line_id in [general.id, own.id] {
        let mut review = MonthlyReview::blank(line_id, may);
        review.summary = "resumen".to_string();
        workspace.save_monthly_review(&admin, &review).unwrap();
    }

    assert_eq!(workspace.list_monthly_reviews(&admin, None).unwrap().len(), 2);
    let mine = workspace.list_monthly_reviews(&member, None).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].line_id, own.id);
    assert!(matches!(
        workspace
            .list_monthly_reviews(&member, Some(general.id))
            .unwrap_err(),
        WorkspaceError::Access(AccessError::LineForbidden { .. })
    ));
}

#[test]
fn task_groups_nest_subtasks_under_their_parent() {
    let (workspace, admin) = open();
    let line = workspace.list_lines(&admin, None).unwrap()[0].clone();
    let project = workspace
        .create_project(&admin, &Project::new(line.id, "Evento", date(1), date(30)))
        .unwrap();
    let parent = workspace
        .create_task(&admin, &Task::new(line.id, project.id, "Logística", date(2), date(9)))
        .unwrap();
    workspace
        .create_task(&admin, &Task::subtask_of(&parent, "Catering", date(3), date(4)))
        .unwrap();

    let groups = workspace.task_groups(&admin, line.id, None).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].tasks.len(), 1);
    assert_eq!(groups[0].tasks[0].task.id, parent.id);
    assert_eq!(groups[0].tasks[0].subtasks[0].title, "Catering");

    assert!(workspace
        .task_groups(&admin, line.id, Some("nada"))
        .unwrap()
        .is_empty());
}
