//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use chrono::NaiveDate;
use iustime_core::{Level, ReviewMonth, RiskStatus, UserRole, WorkStatus};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "iustime")]
#[command(about = "IusTime - projects, tasks, risks and monthly reviews per work line")]
#[command(version)]
pub struct Cli {
    /// SQLite database file (defaults to IUSTIME_DB_PATH or the temp dir)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Account email used to log in
    #[arg(long, global = true, env = "IUSTIME_EMAIL")]
    pub email: Option<String>,

    /// Account password used to log in
    #[arg(long, global = true, env = "IUSTIME_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage work lines (admin)
    #[command(subcommand)]
    Lines(LineCommands),
    /// Manage projects of a line
    #[command(subcommand)]
    Projects(ProjectCommands),
    /// Manage tasks, subtasks, checklists and attachments
    #[command(subcommand)]
    Tasks(TaskCommands),
    /// Manage risks of a line
    #[command(subcommand)]
    Risks(RiskCommands),
    /// Manage user accounts (admin)
    #[command(subcommand)]
    Users(UserCommands),
    /// Aggregate figures of one line
    Dashboard {
        #[arg(long)]
        line: Uuid,
    },
    /// Aggregate figures across every line (admin)
    GlobalDashboard,
    /// Two-week task timeline of a line
    Timeline {
        #[arg(long)]
        line: Uuid,
        /// Any date inside the wanted window (defaults to today)
        #[arg(long)]
        anchor: Option<NaiveDate>,
    },
    /// Monthly line reviews
    #[command(subcommand)]
    Review(ReviewCommands),
    /// Organization-wide monthly reviews (admin)
    #[command(subcommand)]
    GlobalReview(GlobalReviewCommands),
    /// Write all domain data as JSON (admin)
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace all domain data from a JSON export (admin)
    Import {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum LineCommands {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

/// Optional project fields shared by create and update.
#[derive(Args)]
pub struct ProjectFields {
    #[arg(long)]
    pub objective: Option<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub status: Option<WorkStatus>,
    #[arg(long)]
    pub priority: Option<Level>,
    #[arg(long)]
    pub difficulty: Option<Level>,
    #[arg(long)]
    pub budget: Option<f64>,
    #[arg(long)]
    pub notes: Option<String>,
    /// Follow-up action; repeat for several
    #[arg(long = "next-step")]
    pub next_steps: Vec<String>,
    /// Fixed progress; turns automatic roll-up off
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub manual_progress: Option<u8>,
    /// Turn automatic roll-up back on
    #[arg(long, conflicts_with = "manual_progress")]
    pub auto_progress: bool,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    List {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        search: Option<String>,
    },
    Show {
        #[arg(long)]
        id: Uuid,
    },
    Create {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[command(flatten)]
        fields: ProjectFields,
    },
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[command(flatten)]
        fields: ProjectFields,
    },
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

/// Optional task fields shared by create and update.
#[derive(Args)]
pub struct TaskFields {
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub status: Option<WorkStatus>,
    #[arg(long)]
    pub priority: Option<Level>,
    #[arg(long)]
    pub difficulty: Option<Level>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub progress: Option<u8>,
    #[arg(long)]
    pub dependencies: Option<String>,
    #[arg(long)]
    pub comments: Option<String>,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    List {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        search: Option<String>,
        /// Group by project with nested subtasks
        #[arg(long)]
        grouped: bool,
    },
    Show {
        #[arg(long)]
        id: Uuid,
    },
    Create {
        #[arg(long)]
        project: Uuid,
        /// Create as a subtask of this task
        #[arg(long)]
        parent: Option<Uuid>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[command(flatten)]
        fields: TaskFields,
    },
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Move to another project of the same line
        #[arg(long)]
        project: Option<Uuid>,
        #[arg(long, conflicts_with = "top_level")]
        parent: Option<Uuid>,
        /// Detach from its parent task
        #[arg(long)]
        top_level: bool,
        #[command(flatten)]
        fields: TaskFields,
    },
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// Edit the checklist of a task
    #[command(subcommand)]
    Checklist(ChecklistCommands),
    /// Attach a file to a task
    Attach {
        #[arg(long)]
        task: Uuid,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },
    /// Remove an attachment from a task
    Detach {
        #[arg(long)]
        task: Uuid,
        #[arg(long)]
        attachment: Uuid,
    },
}

#[derive(Subcommand)]
pub enum ChecklistCommands {
    Add {
        #[arg(long)]
        task: Uuid,
        #[arg(long)]
        text: String,
    },
    Toggle {
        #[arg(long)]
        task: Uuid,
        #[arg(long)]
        item: Uuid,
    },
    Remove {
        #[arg(long)]
        task: Uuid,
        #[arg(long)]
        item: Uuid,
    },
}

/// Optional risk fields shared by create and update.
#[derive(Args)]
pub struct RiskFields {
    /// Link to a task of the same line
    #[arg(long)]
    pub task: Option<Uuid>,
    #[arg(long)]
    pub responsible: Option<String>,
    #[arg(long)]
    pub required_action: Option<String>,
    #[arg(long)]
    pub status: Option<RiskStatus>,
    #[arg(long)]
    pub priority: Option<Level>,
    #[arg(long)]
    pub impact: Option<Level>,
    #[arg(long)]
    pub mitigation: Option<String>,
}

#[derive(Subcommand)]
pub enum RiskCommands {
    List {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        description: String,
        #[command(flatten)]
        fields: RiskFields,
    },
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        description: Option<String>,
        /// Remove the task link
        #[arg(long, conflicts_with = "task")]
        unlink_task: bool,
        #[command(flatten)]
        fields: RiskFields,
    },
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "user-email")]
        user_email: String,
        #[arg(long = "user-password")]
        user_password: String,
        #[arg(long, default_value = "user")]
        role: UserRole,
        /// Required for standard users
        #[arg(long)]
        line: Option<Uuid>,
    },
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "user-email")]
        user_email: Option<String>,
        #[arg(long)]
        role: Option<UserRole>,
        #[arg(long)]
        line: Option<Uuid>,
    },
    SetPassword {
        #[arg(long)]
        id: Uuid,
        #[arg(long = "new-password")]
        new_password: String,
    },
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Draft with the AI generator (or offline) and store it
    Generate {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        month: ReviewMonth,
    },
    Show {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        month: ReviewMonth,
    },
    /// Overwrite sections by hand; omitted sections keep their text
    Save {
        #[arg(long)]
        line: Uuid,
        #[arg(long)]
        month: ReviewMonth,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        achievements: Option<String>,
        #[arg(long)]
        issues: Option<String>,
        #[arg(long)]
        next_steps: Option<String>,
    },
    List {
        #[arg(long)]
        line: Option<Uuid>,
    },
}

#[derive(Subcommand)]
pub enum GlobalReviewCommands {
    Generate {
        #[arg(long)]
        month: ReviewMonth,
    },
    Show {
        #[arg(long)]
        month: ReviewMonth,
    },
    Save {
        #[arg(long)]
        month: ReviewMonth,
        #[arg(long)]
        vision: Option<String>,
        #[arg(long)]
        milestones: Option<String>,
        #[arg(long)]
        attention_areas: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
    },
    List,
}
