//! `iustime` command-line front end over the core workspace.
//!
//! Every command logs in with `--email`/`--password` and prints JSON.

mod args;

use anyhow::{anyhow, bail, Context, Result};
use args::{
    ChecklistCommands, Cli, Commands, GlobalReviewCommands, LineCommands, ProjectCommands,
    ProjectFields, ReviewCommands, RiskCommands, RiskFields, TaskCommands, TaskFields,
    UserCommands,
};
use clap::Parser;
use iustime_core::{
    init_logging, CoreConfig, GlobalReview, MonthlyReview, NewUser, Project, Risk, Session,
    StateSnapshot, Task, TimelineWindow, UserRole, Workspace,
};
use serde::Serialize;
use std::process;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = CoreConfig::from_env().context("invalid environment configuration")?;
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    if let Some(dir) = cli.log_dir {
        config.log_dir = Some(dir);
    }
    if let Some(dir) = &config.log_dir {
        init_logging(config.log_level, dir).context("failed to start logging")?;
    }

    let workspace = Workspace::open(config).context("failed to open workspace")?;
    let email = cli
        .email
        .ok_or_else(|| anyhow!("--email (or IUSTIME_EMAIL) is required"))?;
    let password = cli
        .password
        .ok_or_else(|| anyhow!("--password (or IUSTIME_PASSWORD) is required"))?;
    let session = workspace.login(&email, &password)?;

    match cli.command {
        Commands::Lines(command) => lines(&workspace, &session, command),
        Commands::Projects(command) => projects(&workspace, &session, command),
        Commands::Tasks(command) => tasks(&workspace, &session, command),
        Commands::Risks(command) => risks(&workspace, &session, command),
        Commands::Users(command) => users(&workspace, &session, command),
        Commands::Dashboard { line } => print(&workspace.line_dashboard(&session, line)?),
        Commands::GlobalDashboard => print(&workspace.global_dashboard(&session)?),
        Commands::Timeline { line, anchor } => {
            let window = anchor
                .map(TimelineWindow::containing)
                .unwrap_or_else(TimelineWindow::today);
            print(&serde_json::json!({
                "start": window.start(),
                "end": window.end(),
                "rows": workspace.timeline(&session, line, &window)?,
            }))
        }
        Commands::Review(command) => reviews(&workspace, &session, command),
        Commands::GlobalReview(command) => global_reviews(&workspace, &session, command),
        Commands::Export { output } => {
            let json = workspace.export_snapshot(&session)?.to_json()?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display())),
                None => {
                    println!("{json}");
                    Ok(())
                }
            }
        }
        Commands::Import { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let snapshot = StateSnapshot::from_json(&text)?;
            workspace.import_snapshot(&session, &snapshot)?;
            print(&serde_json::json!({ "imported": true }))
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn lines(workspace: &Workspace, session: &Session, command: LineCommands) -> Result<()> {
    match command {
        LineCommands::List { search } => {
            print(&workspace.list_lines(session, search.as_deref())?)
        }
        LineCommands::Create { name, description } => {
            print(&workspace.create_line(session, &name, &description)?)
        }
        LineCommands::Update {
            id,
            name,
            description,
        } => {
            let mut line = workspace.get_line(session, id)?;
            if let Some(name) = name {
                line.name = name;
            }
            if let Some(description) = description {
                line.description = description;
            }
            print(&workspace.update_line(session, &line)?)
        }
        LineCommands::Delete { id } => {
            workspace.delete_line(session, id)?;
            print(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn apply_project_fields(project: &mut Project, fields: ProjectFields) {
    if let Some(objective) = fields.objective {
        project.objective = objective;
    }
    if let Some(assignee) = fields.assignee {
        project.assignee = assignee;
    }
    if let Some(status) = fields.status {
        project.status = status;
    }
    if let Some(priority) = fields.priority {
        project.priority = priority;
    }
    if let Some(difficulty) = fields.difficulty {
        project.difficulty = difficulty;
    }
    if let Some(budget) = fields.budget {
        project.budget = budget;
    }
    if let Some(notes) = fields.notes {
        project.notes = notes;
    }
    if !fields.next_steps.is_empty() {
        project.next_steps = fields.next_steps;
    }
    if let Some(progress) = fields.manual_progress {
        project.auto_progress = false;
        project.progress = progress;
    }
    if fields.auto_progress {
        project.auto_progress = true;
    }
}

fn projects(workspace: &Workspace, session: &Session, command: ProjectCommands) -> Result<()> {
    match command {
        ProjectCommands::List { line, search } => {
            print(&workspace.list_projects(session, line, search.as_deref())?)
        }
        ProjectCommands::Show { id } => print(&workspace.get_project(session, id)?),
        ProjectCommands::Create {
            line,
            name,
            start,
            end,
            fields,
        } => {
            let mut project = Project::new(line, name, start, end);
            apply_project_fields(&mut project, fields);
            print(&workspace.create_project(session, &project)?)
        }
        ProjectCommands::Update {
            id,
            name,
            start,
            end,
            fields,
        } => {
            let mut project = workspace.get_project(session, id)?;
            if let Some(name) = name {
                project.name = name;
            }
            if let Some(start) = start {
                project.start_date = start;
            }
            if let Some(end) = end {
                project.end_date = end;
            }
            apply_project_fields(&mut project, fields);
            print(&workspace.update_project(session, &project)?)
        }
        ProjectCommands::Delete { id } => {
            workspace.delete_project(session, id)?;
            print(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn apply_task_fields(task: &mut Task, fields: TaskFields) {
    if let Some(assignee) = fields.assignee {
        task.assignee = assignee;
    }
    if let Some(status) = fields.status {
        task.status = status;
    }
    if let Some(priority) = fields.priority {
        task.priority = priority;
    }
    if let Some(difficulty) = fields.difficulty {
        task.difficulty = difficulty;
    }
    if let Some(progress) = fields.progress {
        task.progress = progress;
    }
    if let Some(dependencies) = fields.dependencies {
        task.dependencies = dependencies;
    }
    if let Some(comments) = fields.comments {
        task.comments = comments;
    }
}

fn tasks(workspace: &Workspace, session: &Session, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::List {
            line,
            search,
            grouped,
        } => {
            if grouped {
                print(&workspace.task_groups(session, line, search.as_deref())?)
            } else {
                print(&workspace.list_tasks(session, line, search.as_deref())?)
            }
        }
        TaskCommands::Show { id } => print(&workspace.get_task(session, id)?),
        TaskCommands::Create {
            project,
            parent,
            title,
            start,
            end,
            fields,
        } => {
            let mut task = match parent {
                Some(parent_id) => {
                    let parent = workspace.get_task(session, parent_id)?;
                    if parent.project_id != project {
                        bail!("parent task {parent_id} belongs to another project");
                    }
                    Task::subtask_of(&parent, title, start, end)
                }
                None => {
                    let owner = workspace.get_project(session, project)?;
                    Task::new(owner.line_id, owner.id, title, start, end)
                }
            };
            apply_task_fields(&mut task, fields);
            print(&workspace.create_task(session, &task)?)
        }
        TaskCommands::Update {
            id,
            title,
            start,
            end,
            project,
            parent,
            top_level,
            fields,
        } => {
            let mut task = workspace.get_task(session, id)?;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(start) = start {
                task.start_date = start;
            }
            if let Some(end) = end {
                task.end_date = end;
            }
            if let Some(project_id) = project {
                let owner = workspace.get_project(session, project_id)?;
                task.project_id = owner.id;
                task.line_id = owner.line_id;
            }
            if parent.is_some() {
                task.parent_id = parent;
            }
            if top_level {
                task.parent_id = None;
            }
            apply_task_fields(&mut task, fields);
            print(&workspace.update_task(session, &task)?)
        }
        TaskCommands::Delete { id } => {
            workspace.delete_task(session, id)?;
            print(&serde_json::json!({ "deleted": id }))
        }
        TaskCommands::Checklist(command) => match command {
            ChecklistCommands::Add { task, text } => {
                print(&workspace.add_checklist_item(session, task, &text)?)
            }
            ChecklistCommands::Toggle { task, item } => {
                print(&workspace.toggle_checklist_item(session, task, item)?)
            }
            ChecklistCommands::Remove { task, item } => {
                print(&workspace.remove_checklist_item(session, task, item)?)
            }
        },
        TaskCommands::Attach { task, file, mime } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("{} has no file name", file.display()))?;
            print(&workspace.add_attachment(session, task, &name, &mime, data)?)
        }
        TaskCommands::Detach { task, attachment } => {
            print(&workspace.remove_attachment(session, task, attachment)?)
        }
    }
}

fn apply_risk_fields(risk: &mut Risk, fields: RiskFields) {
    if fields.task.is_some() {
        risk.task_id = fields.task;
    }
    if let Some(responsible) = fields.responsible {
        risk.responsible = responsible;
    }
    if let Some(action) = fields.required_action {
        risk.required_action = action;
    }
    if let Some(status) = fields.status {
        risk.status = status;
    }
    if let Some(priority) = fields.priority {
        risk.priority = priority;
    }
    if let Some(impact) = fields.impact {
        risk.impact = impact;
    }
    if let Some(mitigation) = fields.mitigation {
        risk.mitigation_strategy = Some(mitigation);
    }
}

fn risks(workspace: &Workspace, session: &Session, command: RiskCommands) -> Result<()> {
    match command {
        RiskCommands::List { line, search } => {
            print(&workspace.list_risks(session, line, search.as_deref())?)
        }
        RiskCommands::Create {
            line,
            description,
            fields,
        } => {
            let mut risk = Risk::new(line, description);
            apply_risk_fields(&mut risk, fields);
            print(&workspace.create_risk(session, &risk)?)
        }
        RiskCommands::Update {
            id,
            description,
            unlink_task,
            fields,
        } => {
            let mut risk = workspace.get_risk(session, id)?;
            if let Some(description) = description {
                risk.description = description;
            }
            if unlink_task {
                risk.task_id = None;
            }
            apply_risk_fields(&mut risk, fields);
            print(&workspace.update_risk(session, &risk)?)
        }
        RiskCommands::Delete { id } => {
            workspace.delete_risk(session, id)?;
            print(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn users(workspace: &Workspace, session: &Session, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::List { search } => print(&workspace.list_users(session, search.as_deref())?),
        UserCommands::Create {
            name,
            user_email,
            user_password,
            role,
            line,
        } => print(&workspace.create_user(
            session,
            &NewUser {
                name,
                email: user_email,
                password: user_password,
                role,
                assigned_line_id: line,
            },
        )?),
        UserCommands::Update {
            id,
            name,
            user_email,
            role,
            line,
        } => {
            let mut user = workspace.get_user(session, id)?;
            if let Some(name) = name {
                user.name = name;
            }
            if let Some(email) = user_email {
                user.email = email;
            }
            if let Some(role) = role {
                user.role = role;
                if role == UserRole::Admin {
                    user.assigned_line_id = None;
                }
            }
            if line.is_some() {
                user.assigned_line_id = line;
            }
            print(&workspace.update_user(session, &user)?)
        }
        UserCommands::SetPassword { id, new_password } => {
            workspace.set_password(session, id, &new_password)?;
            print(&serde_json::json!({ "updated": id }))
        }
        UserCommands::Delete { id } => {
            workspace.delete_user(session, id)?;
            print(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn reviews(workspace: &Workspace, session: &Session, command: ReviewCommands) -> Result<()> {
    match command {
        ReviewCommands::Generate { line, month } => {
            let today = chrono::Local::now().date_naive();
            print(&workspace.generate_monthly_review(session, line, month, today)?)
        }
        ReviewCommands::Show { line, month } => {
            print(&workspace.get_monthly_review(session, line, month)?)
        }
        ReviewCommands::Save {
            line,
            month,
            summary,
            achievements,
            issues,
            next_steps,
        } => {
            let mut review = workspace
                .get_monthly_review(session, line, month)?
                .unwrap_or_else(|| MonthlyReview::blank(line, month));
            if let Some(summary) = summary {
                review.summary = summary;
            }
            if let Some(achievements) = achievements {
                review.achievements = achievements;
            }
            if let Some(issues) = issues {
                review.issues = issues;
            }
            if let Some(next_steps) = next_steps {
                review.next_steps = next_steps;
            }
            print(&workspace.save_monthly_review(session, &review)?)
        }
        ReviewCommands::List { line } => print(&workspace.list_monthly_reviews(session, line)?),
    }
}

fn global_reviews(
    workspace: &Workspace,
    session: &Session,
    command: GlobalReviewCommands,
) -> Result<()> {
    match command {
        GlobalReviewCommands::Generate { month } => {
            print(&workspace.generate_global_review(session, month)?)
        }
        GlobalReviewCommands::Show { month } => {
            print(&workspace.get_global_review(session, month)?)
        }
        GlobalReviewCommands::Save {
            month,
            vision,
            milestones,
            attention_areas,
            strategy,
        } => {
            let mut review = workspace
                .get_global_review(session, month)?
                .unwrap_or_else(|| GlobalReview::blank(month));
            if let Some(vision) = vision {
                review.vision = vision;
            }
            if let Some(milestones) = milestones {
                review.milestones = milestones;
            }
            if let Some(attention_areas) = attention_areas {
                review.attention_areas = attention_areas;
            }
            if let Some(strategy) = strategy {
                review.strategy = strategy;
            }
            print(&workspace.save_global_review(session, &review)?)
        }
        GlobalReviewCommands::List => print(&workspace.list_global_reviews(session)?),
    }
}
