//! Prompt text for review generation.

use crate::ai::{GlobalReviewContext, ReportLanguage, ReviewContext};
use std::fmt::Write;

const NONE: &str = "None";

/// System instruction for the per-line monthly review.
pub fn monthly_system_instruction(language: ReportLanguage) -> String {
    format!(
        "Act as a senior PMO director with strategic management experience. \
         Write clear, professional, action-oriented executive reports in {}. \
         Always return valid JSON with the keys: summary, achievements, issues, nextSteps.",
        language.display_name()
    )
}

/// System instruction for the organization-wide review.
pub fn global_system_instruction(language: ReportLanguage) -> String {
    format!(
        "Act as a senior PMO director reporting to the executive committee. \
         Write a concise organization-wide monthly analysis in {}. \
         Always return valid JSON with the keys: vision, milestones, attentionAreas, strategy.",
        language.display_name()
    )
}

/// User prompt for one line's monthly review.
pub fn monthly_prompt(context: &ReviewContext) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Generate the Monthly Review report for line \"{}\", month {}.",
        context.line_name, context.month
    );
    let _ = writeln!(prompt, "Use strictly the following real system data.");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "PROJECT DATA:");
    if context.projects.is_empty() {
        let _ = writeln!(prompt, "{NONE}");
    }
    for project in &context.projects {
        let _ = writeln!(
            prompt,
            "- Project: {} (Status: {}, Progress: {}%)",
            project.name, project.status, project.progress
        );
    }
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "MONTH ACTIVITY:");
    let _ = writeln!(
        prompt,
        "- Completed tasks: {}",
        join_or_none(&context.completed_tasks)
    );
    let _ = writeln!(
        prompt,
        "- Delayed/blocked tasks: {}",
        join_or_none(&context.overdue_tasks)
    );
    let _ = writeln!(
        prompt,
        "- Active risks detected: {}",
        join_or_none(&context.active_risks)
    );
    let _ = writeln!(prompt);
    let _ = write!(prompt, "Respond in JSON format.");
    prompt
}

/// User prompt for the organization-wide review.
pub fn global_prompt(context: &GlobalReviewContext) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Generate the Global Monthly Review for month {}.",
        context.month
    );
    let _ = writeln!(
        prompt,
        "Global health: {}%. Total projects: {}.",
        context.global_health, context.total_projects
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "LINES:");
    if context.lines.is_empty() {
        let _ = writeln!(prompt, "{NONE}");
    }
    for line in &context.lines {
        let _ = writeln!(
            prompt,
            "- {}: {} projects, {} active risks, health {}%",
            line.name, line.project_count, line.active_risks, line.health
        );
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "CRITICAL RISKS: {}",
        join_or_none(&context.critical_risks)
    );
    let _ = writeln!(prompt);
    let _ = write!(prompt, "Respond in JSON format.");
    prompt
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::{monthly_prompt, monthly_system_instruction};
    use crate::ai::{ProjectBrief, ReportLanguage, ReviewContext};
    use crate::model::WorkStatus;

    fn context() -> ReviewContext {
        ReviewContext {
            line_name: "Consultoría".to_string(),
            month: "2025-03".parse().unwrap(),
            projects: vec![ProjectBrief {
                name: "Cloud".to_string(),
                status: WorkStatus::InProgress,
                progress: 40,
            }],
            completed_tasks: vec!["Kickoff".to_string(), "Inventory".to_string()],
            overdue_tasks: Vec::new(),
            active_risks: Vec::new(),
        }
    }

    #[test]
    fn monthly_prompt_lists_projects_and_activity() {
        let prompt = monthly_prompt(&context());
        assert!(prompt.contains("month 2025-03"));
        assert!(prompt.contains("- Project: Cloud (Status: in_progress, Progress: 40%)"));
        assert!(prompt.contains("- Completed tasks: Kickoff, Inventory"));
    }

    #[test]
    fn empty_lists_render_as_none() {
        let prompt = monthly_prompt(&context());
        assert!(prompt.contains("- Delayed/blocked tasks: None"));
        assert!(prompt.contains("- Active risks detected: None"));
    }

    #[test]
    fn system_instruction_names_language_and_keys() {
        let instruction = monthly_system_instruction(ReportLanguage::Spanish);
        assert!(instruction.contains("Spanish"));
        assert!(instruction.contains("nextSteps"));
    }
}
