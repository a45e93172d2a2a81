//! Per-line dashboard.

use crate::model::{round_percent, Level, Project, ProjectId, Risk, RiskStatus, Task, WorkStatus};
use serde::Serialize;

const CHART_PROJECT_LIMIT: usize = 5;
const HIGHLIGHT_LIMIT: usize = 3;
const LABEL_MAX_CHARS: usize = 15;

/// Status order used by the breakdown.
const STATUS_ORDER: [WorkStatus; 4] = [
    WorkStatus::Completed,
    WorkStatus::InProgress,
    WorkStatus::Delayed,
    WorkStatus::ReadyToStart,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: WorkStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectTaskStats {
    pub project_id: ProjectId,
    /// Project name cut to 15 chars plus `...` when longer.
    pub label: String,
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineDashboard {
    pub total_projects: usize,
    pub completed_projects: usize,
    pub in_progress_projects: usize,
    /// Non-zero counts only.
    pub status_breakdown: Vec<StatusCount>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub high_priority_pending: usize,
    pub active_risks: usize,
    pub high_impact_risks: usize,
    /// Completed tasks over all tasks, as a percentage.
    pub efficiency: u8,
    pub tasks_by_project: Vec<ProjectTaskStats>,
    pub in_progress_highlights: Vec<Project>,
    pub critical_risk_highlights: Vec<Risk>,
}

/// Computes the dashboard of one line from its records.
///
/// Task counts include subtasks.
pub fn line_dashboard(projects: &[Project], tasks: &[Task], risks: &[Risk]) -> LineDashboard {
    let count_projects = |status: WorkStatus| {
        projects
            .iter()
            .filter(|project| project.status == status)
            .count()
    };

    let status_breakdown = STATUS_ORDER
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: count_projects(*status),
        })
        .filter(|entry| entry.count > 0)
        .collect();

    let total_tasks = tasks.len();
    let completed_tasks = tasks
        .iter()
        .filter(|task| task.status.is_completed())
        .count();
    let high_priority_pending = tasks
        .iter()
        .filter(|task| task.priority == Level::High && !task.status.is_completed())
        .count();

    let active: Vec<&Risk> = risks.iter().filter(|risk| risk.is_active()).collect();
    let high_impact: Vec<&Risk> = active
        .iter()
        .copied()
        .filter(|risk| risk.impact == Level::High)
        .collect();

    let efficiency = if total_tasks == 0 {
        0
    } else {
        round_percent(completed_tasks as f64 / total_tasks as f64 * 100.0)
    };

    let tasks_by_project = projects
        .iter()
        .take(CHART_PROJECT_LIMIT)
        .map(|project| {
            let owned = tasks.iter().filter(|task| task.project_id == project.id);
            ProjectTaskStats {
                project_id: project.id,
                label: chart_label(&project.name),
                total: owned.clone().count(),
                completed: owned.filter(|task| task.status.is_completed()).count(),
            }
        })
        .collect();

    LineDashboard {
        total_projects: projects.len(),
        completed_projects: count_projects(WorkStatus::Completed),
        in_progress_projects: count_projects(WorkStatus::InProgress),
        status_breakdown,
        total_tasks,
        completed_tasks,
        pending_tasks: total_tasks - completed_tasks,
        high_priority_pending,
        active_risks: active.len(),
        high_impact_risks: high_impact.len(),
        efficiency,
        tasks_by_project,
        in_progress_highlights: projects
            .iter()
            .filter(|project| project.status == WorkStatus::InProgress)
            .take(HIGHLIGHT_LIMIT)
            .cloned()
            .collect(),
        critical_risk_highlights: risks
            .iter()
            .filter(|risk| risk.impact == Level::High && risk.status != RiskStatus::Closed)
            .take(HIGHLIGHT_LIMIT)
            .cloned()
            .collect(),
    }
}

fn chart_label(name: &str) -> String {
    if name.chars().count() > LABEL_MAX_CHARS {
        let cut: String = name.chars().take(LABEL_MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        name.to_string()
    }
}
