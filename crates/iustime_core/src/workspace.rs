//! Workspace facade: one connection, one configuration, session-checked
//! access to every use-case.
//!
//! # Responsibility
//! - Open and bootstrap the database (default line, first admin).
//! - Authorize each call against the caller's [`Session`] before any
//!   service runs.
//! - Assemble dashboard, timeline and review inputs from stored records.
//!
//! # Invariants
//! - Line-scoped records are only reachable through an authorized line.
//! - Line, user, global dashboard, global review and snapshot operations
//!   require an admin session.

use crate::ai::{
    AiError, GeminiReviewGenerator, GlobalReviewContext, OfflineReviewGenerator, ReviewContext,
    ReviewGenerator,
};
use crate::config::{ConfigError, CoreConfig};
use crate::dashboard::{global_dashboard, line_dashboard, GlobalDashboard, LineDashboard};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::{
    GlobalReview, LineId, MonthlyReview, Project, ProjectId, ReviewMonth, Risk, RiskId, Task,
    TaskId, User, UserId, WorkLine,
};
use crate::repo::line_repo::SqliteLineRepository;
use crate::repo::project_repo::SqliteProjectRepository;
use crate::repo::review_repo::SqliteReviewRepository;
use crate::repo::risk_repo::{RiskListQuery, SqliteRiskRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskListQuery};
use crate::repo::user_repo::SqliteUserRepository;
use crate::repo::RepoError;
use crate::service::line_service::LineService;
use crate::service::project_service::ProjectService;
use crate::service::review_service::{Generated, ReviewService};
use crate::service::risk_service::RiskService;
use crate::service::task_service::{group_tasks_by_project, ProjectTaskGroup, TaskService};
use crate::service::user_service::{NewUser, UserService};
use crate::service::ServiceError;
use crate::session::{AccessError, LineScope, Session};
use crate::snapshot::{export_snapshot, import_snapshot, SnapshotError, StateSnapshot};
use crate::timeline::{timeline_rows, TimelineRow, TimelineWindow};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const DEFAULT_LINE_NAME: &str = "Línea General";
const DEFAULT_LINE_DESCRIPTION: &str = "Línea de trabajo por defecto";

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

#[derive(Debug)]
pub enum WorkspaceError {
    Config(ConfigError),
    Db(DbError),
    Service(ServiceError),
    Access(AccessError),
    Snapshot(SnapshotError),
    Ai(AiError),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Snapshot(err) => write!(f, "{err}"),
            Self::Ai(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Snapshot(err) => Some(err),
            Self::Ai(err) => Some(err),
        }
    }
}

impl From<ConfigError> for WorkspaceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for WorkspaceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for WorkspaceError {
    fn from(value: RepoError) -> Self {
        Self::Service(ServiceError::from(value))
    }
}

impl From<ServiceError> for WorkspaceError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<AccessError> for WorkspaceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<SnapshotError> for WorkspaceError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

impl From<AiError> for WorkspaceError {
    fn from(value: AiError) -> Self {
        Self::Ai(value)
    }
}

type Lines<'c> = LineService<SqliteLineRepository<'c>>;
type Projects<'c> = ProjectService<SqliteProjectRepository<'c>, SqliteTaskRepository<'c>>;
type Tasks<'c> = TaskService<SqliteTaskRepository<'c>, SqliteProjectRepository<'c>>;
type Risks<'c> = RiskService<SqliteRiskRepository<'c>, SqliteTaskRepository<'c>>;
type Users<'c> = UserService<SqliteUserRepository<'c>, SqliteLineRepository<'c>>;
type Reviews<'c, G> = ReviewService<SqliteReviewRepository<'c>, G>;

#[derive(Debug)]
pub struct Workspace {
    conn: Connection,
    config: CoreConfig,
}

impl Workspace {
    /// Opens the database at `config.db_path` and bootstraps it.
    pub fn open(config: CoreConfig) -> WorkspaceResult<Self> {
        let conn = open_db(&config.db_path)?;
        Self::bootstrap(conn, config)
    }

    /// Private in-memory workspace; `config.db_path` is ignored.
    pub fn open_in_memory(config: CoreConfig) -> WorkspaceResult<Self> {
        let conn = open_db_in_memory()?;
        Self::bootstrap(conn, config)
    }

    fn bootstrap(conn: Connection, config: CoreConfig) -> WorkspaceResult<Self> {
        let workspace = Self { conn, config };
        workspace.ensure_default_admin()?;
        workspace.ensure_default_line()?;
        Ok(workspace)
    }

    fn ensure_default_admin(&self) -> WorkspaceResult<()> {
        let users = self.users()?;
        if users.list_users(None)?.is_empty() {
            let admin = self
                .config
                .admin
                .as_ref()
                .ok_or(ConfigError::MissingAdminCredentials)?;
            users.ensure_default_admin(&admin.email, &admin.password)?;
        }
        Ok(())
    }

    fn ensure_default_line(&self) -> WorkspaceResult<()> {
        let lines = self.lines()?;
        if lines.list_lines(None)?.is_empty() {
            lines.create_line(DEFAULT_LINE_NAME, DEFAULT_LINE_DESCRIPTION)?;
            log::info!("event=bootstrap_line module=workspace status=ok");
        }
        Ok(())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn login(&self, email: &str, password: &str) -> WorkspaceResult<Session> {
        Ok(self.users()?.login(email, password)?)
    }

    // Lines

    /// Lines visible to the session, filtered by name or description.
    pub fn list_lines(&self, session: &Session, search: Option<&str>) -> WorkspaceResult<Vec<WorkLine>> {
        let scope = session.scope();
        Ok(self
            .lines()?
            .list_lines(search)?
            .into_iter()
            .filter(|line| scope.allows(line.id))
            .collect())
    }

    pub fn get_line(&self, session: &Session, id: LineId) -> WorkspaceResult<WorkLine> {
        session.authorize_line(id)?;
        Ok(self.lines()?.get_line(id)?)
    }

    pub fn create_line(
        &self,
        session: &Session,
        name: &str,
        description: &str,
    ) -> WorkspaceResult<WorkLine> {
        session.require_admin()?;
        Ok(self.lines()?.create_line(name, description)?)
    }

    pub fn update_line(&self, session: &Session, line: &WorkLine) -> WorkspaceResult<WorkLine> {
        session.require_admin()?;
        Ok(self.lines()?.update_line(line)?)
    }

    /// Deletes a line with all of its records. Users must be reassigned first.
    pub fn delete_line(&self, session: &Session, id: LineId) -> WorkspaceResult<()> {
        session.require_admin()?;
        self.lines()?.delete_line(id)?;
        log::info!("event=line_delete module=workspace status=ok line_id={id}");
        Ok(())
    }

    // Projects

    pub fn list_projects(
        &self,
        session: &Session,
        line_id: LineId,
        search: Option<&str>,
    ) -> WorkspaceResult<Vec<Project>> {
        session.authorize_line(line_id)?;
        Ok(self.projects()?.list_projects(Some(line_id), search)?)
    }

    pub fn get_project(&self, session: &Session, id: ProjectId) -> WorkspaceResult<Project> {
        let project = self.projects()?.get_project(id)?;
        session.authorize_line(project.line_id)?;
        Ok(project)
    }

    pub fn create_project(&self, session: &Session, project: &Project) -> WorkspaceResult<Project> {
        session.authorize_line(project.line_id)?;
        Ok(self.projects()?.create_project(project)?)
    }

    pub fn update_project(&self, session: &Session, project: &Project) -> WorkspaceResult<Project> {
        self.get_project(session, project.id)?;
        session.authorize_line(project.line_id)?;
        Ok(self.projects()?.update_project(project)?)
    }

    pub fn delete_project(&self, session: &Session, id: ProjectId) -> WorkspaceResult<()> {
        self.get_project(session, id)?;
        Ok(self.projects()?.delete_project(id)?)
    }

    // Tasks

    /// Every task of a line, subtasks included.
    pub fn list_tasks(
        &self,
        session: &Session,
        line_id: LineId,
        search: Option<&str>,
    ) -> WorkspaceResult<Vec<Task>> {
        session.authorize_line(line_id)?;
        Ok(self
            .tasks()?
            .list_tasks(&TaskListQuery::for_line(line_id), search)?)
    }

    /// Tasks of a line grouped by project with nested subtasks.
    pub fn task_groups(
        &self,
        session: &Session,
        line_id: LineId,
        search: Option<&str>,
    ) -> WorkspaceResult<Vec<ProjectTaskGroup>> {
        let projects = self.list_projects(session, line_id, None)?;
        let tasks = self.list_tasks(session, line_id, None)?;
        Ok(group_tasks_by_project(
            &projects,
            &tasks,
            search.unwrap_or_default(),
        ))
    }

    pub fn get_task(&self, session: &Session, id: TaskId) -> WorkspaceResult<Task> {
        let task = self.tasks()?.get_task(id)?;
        session.authorize_line(task.line_id)?;
        Ok(task)
    }

    pub fn create_task(&self, session: &Session, task: &Task) -> WorkspaceResult<Task> {
        session.authorize_line(task.line_id)?;
        Ok(self.tasks()?.create_task(task)?)
    }

    pub fn update_task(&self, session: &Session, task: &Task) -> WorkspaceResult<Task> {
        self.get_task(session, task.id)?;
        session.authorize_line(task.line_id)?;
        Ok(self.tasks()?.update_task(task)?)
    }

    pub fn delete_task(&self, session: &Session, id: TaskId) -> WorkspaceResult<()> {
        self.get_task(session, id)?;
        Ok(self.tasks()?.delete_task(id)?)
    }

    pub fn add_checklist_item(
        &self,
        session: &Session,
        task_id: TaskId,
        text: &str,
    ) -> WorkspaceResult<Task> {
        self.get_task(session, task_id)?;
        Ok(self.tasks()?.add_checklist_item(task_id, text)?)
    }

    pub fn toggle_checklist_item(
        &self,
        session: &Session,
        task_id: TaskId,
        item_id: Uuid,
    ) -> WorkspaceResult<Task> {
        self.get_task(session, task_id)?;
        Ok(self.tasks()?.toggle_checklist_item(task_id, item_id)?)
    }

    pub fn remove_checklist_item(
        &self,
        session: &Session,
        task_id: TaskId,
        item_id: Uuid,
    ) -> WorkspaceResult<Task> {
        self.get_task(session, task_id)?;
        Ok(self.tasks()?.remove_checklist_item(task_id, item_id)?)
    }

    pub fn add_attachment(
        &self,
        session: &Session,
        task_id: TaskId,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> WorkspaceResult<Task> {
        self.get_task(session, task_id)?;
        Ok(self
            .tasks()?
            .add_attachment(task_id, name, mime_type, data)?)
    }

    pub fn remove_attachment(
        &self,
        session: &Session,
        task_id: TaskId,
        attachment_id: Uuid,
    ) -> WorkspaceResult<Task> {
        self.get_task(session, task_id)?;
        Ok(self.tasks()?.remove_attachment(task_id, attachment_id)?)
    }

    // Risks

    pub fn list_risks(
        &self,
        session: &Session,
        line_id: LineId,
        search: Option<&str>,
    ) -> WorkspaceResult<Vec<Risk>> {
        session.authorize_line(line_id)?;
        Ok(self
            .risks()?
            .list_risks(&RiskListQuery::for_line(line_id), search)?)
    }

    pub fn get_risk(&self, session: &Session, id: RiskId) -> WorkspaceResult<Risk> {
        let risk = self.risks()?.get_risk(id)?;
        session.authorize_line(risk.line_id)?;
        Ok(risk)
    }

    pub fn create_risk(&self, session: &Session, risk: &Risk) -> WorkspaceResult<Risk> {
        session.authorize_line(risk.line_id)?;
        Ok(self.risks()?.create_risk(risk)?)
    }

    pub fn update_risk(&self, session: &Session, risk: &Risk) -> WorkspaceResult<Risk> {
        self.get_risk(session, risk.id)?;
        session.authorize_line(risk.line_id)?;
        Ok(self.risks()?.update_risk(risk)?)
    }

    pub fn delete_risk(&self, session: &Session, id: RiskId) -> WorkspaceResult<()> {
        self.get_risk(session, id)?;
        Ok(self.risks()?.delete_risk(id)?)
    }

    // Users

    pub fn list_users(&self, session: &Session, search: Option<&str>) -> WorkspaceResult<Vec<User>> {
        session.require_admin()?;
        Ok(self.users()?.list_users(search)?)
    }

    pub fn get_user(&self, session: &Session, id: UserId) -> WorkspaceResult<User> {
        if id != session.user().id {
            session.require_admin()?;
        }
        Ok(self.users()?.get_user(id)?)
    }

    pub fn create_user(&self, session: &Session, new_user: &NewUser) -> WorkspaceResult<User> {
        session.require_admin()?;
        Ok(self.users()?.create_user(new_user)?)
    }

    pub fn update_user(&self, session: &Session, user: &User) -> WorkspaceResult<User> {
        session.require_admin()?;
        Ok(self.users()?.update_user(user)?)
    }

    /// Admins may reset any password; users only their own.
    pub fn set_password(
        &self,
        session: &Session,
        id: UserId,
        password: &str,
    ) -> WorkspaceResult<()> {
        if id != session.user().id {
            session.require_admin()?;
        }
        Ok(self.users()?.set_password(id, password)?)
    }

    pub fn delete_user(&self, session: &Session, id: UserId) -> WorkspaceResult<()> {
        session.require_admin()?;
        Ok(self.users()?.delete_user(id)?)
    }

    // Dashboards and timeline

    pub fn line_dashboard(&self, session: &Session, line_id: LineId) -> WorkspaceResult<LineDashboard> {
        let projects = self.list_projects(session, line_id, None)?;
        let tasks = self.list_tasks(session, line_id, None)?;
        let risks = self.list_risks(session, line_id, None)?;
        Ok(line_dashboard(&projects, &tasks, &risks))
    }

    pub fn global_dashboard(&self, session: &Session) -> WorkspaceResult<GlobalDashboard> {
        session.require_admin()?;
        let lines = self.lines()?.list_lines(None)?;
        let projects = self.projects()?.list_projects(None, None)?;
        let tasks = self.tasks()?.list_tasks(&TaskListQuery::default(), None)?;
        let risks = self.risks()?.list_risks(&RiskListQuery::default(), None)?;
        Ok(global_dashboard(&lines, &projects, &tasks, &risks))
    }

    pub fn timeline(
        &self,
        session: &Session,
        line_id: LineId,
        window: &TimelineWindow,
    ) -> WorkspaceResult<Vec<TimelineRow>> {
        let tasks = self.list_tasks(session, line_id, None)?;
        Ok(timeline_rows(window, &tasks))
    }

    // Reviews

    /// Context the monthly draft of `line_id` is built from.
    pub fn review_context(
        &self,
        session: &Session,
        line_id: LineId,
        month: ReviewMonth,
        today: NaiveDate,
    ) -> WorkspaceResult<ReviewContext> {
        let line = self.get_line(session, line_id)?;
        let projects = self.list_projects(session, line_id, None)?;
        let tasks = self.list_tasks(session, line_id, None)?;
        let risks = self.list_risks(session, line_id, None)?;
        Ok(ReviewContext::collect(
            &line, month, today, &projects, &tasks, &risks,
        ))
    }

    /// Drafts and stores the monthly review with the configured generator.
    pub fn generate_monthly_review(
        &self,
        session: &Session,
        line_id: LineId,
        month: ReviewMonth,
        today: NaiveDate,
    ) -> WorkspaceResult<Generated<MonthlyReview>> {
        let generator = GeminiReviewGenerator::new(self.config.ai.clone())?;
        self.generate_monthly_review_with(session, line_id, month, today, &generator)
    }

    pub fn generate_monthly_review_with<G: ReviewGenerator>(
        &self,
        session: &Session,
        line_id: LineId,
        month: ReviewMonth,
        today: NaiveDate,
        generator: G,
    ) -> WorkspaceResult<Generated<MonthlyReview>> {
        let context = self.review_context(session, line_id, month, today)?;
        Ok(self
            .reviews(generator)?
            .generate_monthly_review(line_id, month, &context)?)
    }

    pub fn save_monthly_review(
        &self,
        session: &Session,
        review: &MonthlyReview,
    ) -> WorkspaceResult<MonthlyReview> {
        session.authorize_line(review.line_id)?;
        Ok(self.stored_reviews()?.save_monthly_review(review)?)
    }

    pub fn get_monthly_review(
        &self,
        session: &Session,
        line_id: LineId,
        month: ReviewMonth,
    ) -> WorkspaceResult<Option<MonthlyReview>> {
        session.authorize_line(line_id)?;
        Ok(self.stored_reviews()?.get_monthly_review(line_id, month)?)
    }

    /// Newest first; all visible lines when `line_id` is `None`.
    pub fn list_monthly_reviews(
        &self,
        session: &Session,
        line_id: Option<LineId>,
    ) -> WorkspaceResult<Vec<MonthlyReview>> {
        let line_id = match (line_id, session.scope()) {
            (Some(line_id), _) => {
                session.authorize_line(line_id)?;
                Some(line_id)
            }
            (None, LineScope::All) => None,
            (None, LineScope::Single(line_id)) => Some(line_id),
        };
        Ok(self.stored_reviews()?.list_monthly_reviews(line_id)?)
    }

    pub fn global_review_context(
        &self,
        session: &Session,
        month: ReviewMonth,
    ) -> WorkspaceResult<GlobalReviewContext> {
        let dashboard = self.global_dashboard(session)?;
        Ok(GlobalReviewContext::from_dashboard(month, &dashboard))
    }

    pub fn generate_global_review(
        &self,
        session: &Session,
        month: ReviewMonth,
    ) -> WorkspaceResult<Generated<GlobalReview>> {
        let generator = GeminiReviewGenerator::new(self.config.ai.clone())?;
        self.generate_global_review_with(session, month, &generator)
    }

    pub fn generate_global_review_with<G: ReviewGenerator>(
        &self,
        session: &Session,
        month: ReviewMonth,
        generator: G,
    ) -> WorkspaceResult<Generated<GlobalReview>> {
        let context = self.global_review_context(session, month)?;
        Ok(self
            .reviews(generator)?
            .generate_global_review(month, &context)?)
    }

    pub fn save_global_review(
        &self,
        session: &Session,
        review: &GlobalReview,
    ) -> WorkspaceResult<GlobalReview> {
        session.require_admin()?;
        Ok(self.stored_reviews()?.save_global_review(review)?)
    }

    pub fn get_global_review(
        &self,
        session: &Session,
        month: ReviewMonth,
    ) -> WorkspaceResult<Option<GlobalReview>> {
        session.require_admin()?;
        Ok(self.stored_reviews()?.get_global_review(month)?)
    }

    pub fn list_global_reviews(&self, session: &Session) -> WorkspaceResult<Vec<GlobalReview>> {
        session.require_admin()?;
        Ok(self.stored_reviews()?.list_global_reviews()?)
    }

    // Snapshots

    pub fn export_snapshot(&self, session: &Session) -> WorkspaceResult<StateSnapshot> {
        session.require_admin()?;
        Ok(export_snapshot(&self.conn)?)
    }

    /// Replaces all domain data; an empty snapshot leaves the default line.
    pub fn import_snapshot(&self, session: &Session, snapshot: &StateSnapshot) -> WorkspaceResult<()> {
        session.require_admin()?;
        import_snapshot(&self.conn, snapshot)?;
        self.ensure_default_line()
    }

    fn lines(&self) -> WorkspaceResult<Lines<'_>> {
        Ok(LineService::new(SqliteLineRepository::try_new(&self.conn)?))
    }

    fn projects(&self) -> WorkspaceResult<Projects<'_>> {
        Ok(ProjectService::new(
            SqliteProjectRepository::try_new(&self.conn)?,
            SqliteTaskRepository::try_new(&self.conn)?,
        ))
    }

    fn tasks(&self) -> WorkspaceResult<Tasks<'_>> {
        Ok(TaskService::new(
            SqliteTaskRepository::try_new(&self.conn)?,
            SqliteProjectRepository::try_new(&self.conn)?,
        ))
    }

    fn risks(&self) -> WorkspaceResult<Risks<'_>> {
        Ok(RiskService::new(
            SqliteRiskRepository::try_new(&self.conn)?,
            SqliteTaskRepository::try_new(&self.conn)?,
        ))
    }

    fn users(&self) -> WorkspaceResult<Users<'_>> {
        Ok(UserService::new(
            SqliteUserRepository::try_new(&self.conn)?,
            SqliteLineRepository::try_new(&self.conn)?,
        ))
    }

    fn reviews<G: ReviewGenerator>(&self, generator: G) -> WorkspaceResult<Reviews<'_, G>> {
        Ok(ReviewService::new(
            SqliteReviewRepository::try_new(&self.conn)?,
            generator,
        ))
    }

    /// Review service for reads and manual saves; never generates.
    fn stored_reviews(&self) -> WorkspaceResult<Reviews<'_, OfflineReviewGenerator>> {
        self.reviews(OfflineReviewGenerator::new(self.config.ai.language))
    }
}
