//! Organization-wide dashboard across every line.

use crate::model::{mean_percent, Level, LineId, Project, Risk, Task, WorkLine};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineStats {
    pub line_id: LineId,
    pub line_name: String,
    pub project_count: usize,
    pub active_risks: usize,
    /// Rounded mean progress of the line's projects, 0 without projects.
    pub health: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalDashboard {
    pub active_lines: usize,
    pub total_projects: usize,
    pub total_tasks: usize,
    /// Rounded mean progress of non-completed projects, 100 when none.
    pub global_health: u8,
    /// Active risks with high priority.
    pub critical_risks: Vec<Risk>,
    pub line_stats: Vec<LineStats>,
    /// Counts by priority over all risks, any status.
    pub risk_distribution: RiskDistribution,
}

pub fn global_dashboard(
    lines: &[WorkLine],
    projects: &[Project],
    tasks: &[Task],
    risks: &[Risk],
) -> GlobalDashboard {
    let global_health = mean_percent(
        projects
            .iter()
            .filter(|project| !project.status.is_completed())
            .map(|project| project.progress),
    )
    .unwrap_or(100);

    let line_stats = lines
        .iter()
        .map(|line| {
            let line_projects = projects.iter().filter(|project| project.line_id == line.id);
            LineStats {
                line_id: line.id,
                line_name: line.name.clone(),
                project_count: line_projects.clone().count(),
                active_risks: risks
                    .iter()
                    .filter(|risk| risk.line_id == line.id && risk.is_active())
                    .count(),
                health: mean_percent(line_projects.map(|project| project.progress)).unwrap_or(0),
            }
        })
        .collect();

    let by_priority = |level: Level| risks.iter().filter(|risk| risk.priority == level).count();
    let high = by_priority(Level::High);
    let medium = by_priority(Level::Medium);
    let low = by_priority(Level::Low);

    GlobalDashboard {
        active_lines: lines.len(),
        total_projects: projects.len(),
        total_tasks: tasks.len(),
        global_health,
        critical_risks: risks
            .iter()
            .filter(|risk| risk.priority == Level::High && risk.is_active())
            .cloned()
            .collect(),
        line_stats,
        risk_distribution: RiskDistribution {
            high,
            medium,
            low,
            total: high + medium + low,
        },
    }
}
