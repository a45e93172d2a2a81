//! Deterministic drafts composed locally from the prompt context.

use crate::ai::{
    DraftOrigin, GlobalReviewContext, GlobalReviewDraft, ReportLanguage, ReviewContext,
    ReviewDraft, ReviewGenerator,
};
use crate::model::WorkStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineReviewGenerator {
    language: ReportLanguage,
}

impl OfflineReviewGenerator {
    pub fn new(language: ReportLanguage) -> Self {
        Self { language }
    }

    /// Fixed narrative used when remote generation fails.
    pub fn fallback_monthly(&self, reason: String) -> ReviewDraft {
        let (summary, achievements, issues, next_steps) = match self.language {
            ReportLanguage::Spanish => (
                "Error al generar el resumen automático. Por favor intente más tarde.",
                "No se pudieron cargar los datos de la IA.",
                "Verifique su conexión o clave API.",
                "Proceda con la revisión manual.",
            ),
            ReportLanguage::English => (
                "Automatic summary generation failed. Please try again later.",
                "AI data could not be loaded.",
                "Check your connection or API key.",
                "Proceed with a manual review.",
            ),
        };
        ReviewDraft {
            summary: summary.to_string(),
            achievements: achievements.to_string(),
            issues: issues.to_string(),
            next_steps: next_steps.to_string(),
            origin: DraftOrigin::Fallback { reason },
        }
    }

    pub fn fallback_global(&self, reason: String) -> GlobalReviewDraft {
        let (vision, milestones, attention_areas, strategy) = match self.language {
            ReportLanguage::Spanish => (
                "Error al generar el análisis global. Por favor intente más tarde.",
                "No se pudieron cargar los datos de la IA.",
                "Verifique su conexión o clave API.",
                "Proceda con la revisión manual.",
            ),
            ReportLanguage::English => (
                "Global analysis generation failed. Please try again later.",
                "AI data could not be loaded.",
                "Check your connection or API key.",
                "Proceed with a manual review.",
            ),
        };
        GlobalReviewDraft {
            vision: vision.to_string(),
            milestones: milestones.to_string(),
            attention_areas: attention_areas.to_string(),
            strategy: strategy.to_string(),
            origin: DraftOrigin::Fallback { reason },
        }
    }
}

impl ReviewGenerator for OfflineReviewGenerator {
    fn generate_monthly(&self, context: &ReviewContext) -> ReviewDraft {
        let in_progress: Vec<&str> = context
            .projects
            .iter()
            .filter(|project| project.status == WorkStatus::InProgress)
            .map(|project| project.name.as_str())
            .collect();
        let project_count = context.projects.len();
        let average = context.average_progress();
        let completed = context.completed_tasks.len();
        let overdue = context.overdue_tasks.len();
        let risks = context.active_risks.len();

        match self.language {
            ReportLanguage::Spanish => ReviewDraft {
                summary: format!(
                    "{} - {}: {project_count} proyectos con un avance medio del {average}%.",
                    context.line_name, context.month
                ),
                achievements: if completed == 0 {
                    "Sin tareas completadas en el periodo.".to_string()
                } else {
                    format!(
                        "{completed} tareas completadas: {}.",
                        context.completed_tasks.join(", ")
                    )
                },
                issues: format!("{overdue} tareas retrasadas y {risks} riesgos activos."),
                next_steps: if in_progress.is_empty() {
                    "Planificar el arranque de los proyectos pendientes.".to_string()
                } else {
                    format!("Dar seguimiento a: {}.", in_progress.join(", "))
                },
                origin: DraftOrigin::Offline,
            },
            ReportLanguage::English => ReviewDraft {
                summary: format!(
                    "{} - {}: {project_count} projects with an average progress of {average}%.",
                    context.line_name, context.month
                ),
                achievements: if completed == 0 {
                    "No tasks completed in the period.".to_string()
                } else {
                    format!(
                        "{completed} tasks completed: {}.",
                        context.completed_tasks.join(", ")
                    )
                },
                issues: format!("{overdue} overdue tasks and {risks} active risks."),
                next_steps: if in_progress.is_empty() {
                    "Plan the start of pending projects.".to_string()
                } else {
                    format!("Follow up on: {}.", in_progress.join(", "))
                },
                origin: DraftOrigin::Offline,
            },
        }
    }

    fn generate_global(&self, context: &GlobalReviewContext) -> GlobalReviewDraft {
        let weakest = context
            .lines
            .iter()
            .min_by_key(|line| line.health)
            .map(|line| line.name.as_str());
        let strongest = context
            .lines
            .iter()
            .max_by_key(|line| line.health)
            .map(|line| line.name.as_str());
        let critical = context.critical_risks.len();

        match self.language {
            ReportLanguage::Spanish => GlobalReviewDraft {
                vision: format!(
                    "Análisis para {}: la organización muestra una salud global del {}% sobre {} proyectos.",
                    context.month, context.global_health, context.total_projects
                ),
                milestones: match strongest {
                    Some(name) => format!("La línea {name} lidera el avance del periodo."),
                    None => "Sin líneas con proyectos registrados.".to_string(),
                },
                attention_areas: match weakest {
                    Some(name) => format!(
                        "{critical} riesgos críticos activos. Requiere atención: {name}."
                    ),
                    None => format!("{critical} riesgos críticos activos."),
                },
                strategy: "Reforzar el seguimiento de riesgos críticos y redistribuir recursos hacia las líneas con menor avance.".to_string(),
                origin: DraftOrigin::Offline,
            },
            ReportLanguage::English => GlobalReviewDraft {
                vision: format!(
                    "Analysis for {}: the organization shows a global health of {}% across {} projects.",
                    context.month, context.global_health, context.total_projects
                ),
                milestones: match strongest {
                    Some(name) => format!("Line {name} leads progress this period."),
                    None => "No lines with registered projects.".to_string(),
                },
                attention_areas: match weakest {
                    Some(name) => {
                        format!("{critical} active critical risks. Needs attention: {name}.")
                    }
                    None => format!("{critical} active critical risks."),
                },
                strategy: "Tighten follow-up on critical risks and shift resources toward the lines with the least progress.".to_string(),
                origin: DraftOrigin::Offline,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OfflineReviewGenerator;
    use crate::ai::{
        DraftOrigin, GlobalReviewContext, LineBrief, ProjectBrief, ReportLanguage, ReviewContext,
        ReviewGenerator,
    };
    use crate::model::WorkStatus;

    fn context() -> ReviewContext {
        ReviewContext {
            line_name: "Legal".to_string(),
            month: "2025-06".parse().unwrap(),
            projects: vec![
                ProjectBrief {
                    name: "Contracts".to_string(),
                    status: WorkStatus::InProgress,
                    progress: 50,
                },
                ProjectBrief {
                    name: "Audit".to_string(),
                    status: WorkStatus::Completed,
                    progress: 100,
                },
            ],
            completed_tasks: vec!["Sign NDA".to_string()],
            overdue_tasks: vec!["Review clauses".to_string()],
            active_risks: Vec::new(),
        }
    }

    #[test]
    fn offline_monthly_draft_is_deterministic() {
        let generator = OfflineReviewGenerator::new(ReportLanguage::English);
        let first = generator.generate_monthly(&context());
        let second = generator.generate_monthly(&context());
        assert_eq!(first, second);
        assert_eq!(first.origin, DraftOrigin::Offline);
        assert!(first.summary.contains("2 projects"));
        assert!(first.summary.contains("75%"));
        assert!(first.achievements.contains("Sign NDA"));
        assert_eq!(first.issues, "1 overdue tasks and 0 active risks.");
        assert_eq!(first.next_steps, "Follow up on: Contracts.");
    }

    #[test]
    fn offline_global_draft_names_weakest_line() {
        let generator = OfflineReviewGenerator::new(ReportLanguage::Spanish);
        let draft = generator.generate_global(&GlobalReviewContext {
            month: "2025-06".parse().unwrap(),
            global_health: 60,
            total_projects: 3,
            critical_risks: vec!["Budget cut".to_string()],
            lines: vec![
                LineBrief {
                    name: "Legal".to_string(),
                    project_count: 1,
                    active_risks: 1,
                    health: 20,
                },
                LineBrief {
                    name: "Consultoría".to_string(),
                    project_count: 2,
                    active_risks: 0,
                    health: 80,
                },
            ],
        });
        assert!(draft.attention_areas.contains("Legal"));
        assert!(draft.milestones.contains("Consultoría"));
        assert_eq!(draft.origin, DraftOrigin::Offline);
    }

    #[test]
    fn fallback_carries_reason() {
        let generator = OfflineReviewGenerator::new(ReportLanguage::Spanish);
        let draft = generator.fallback_monthly("transport".to_string());
        assert_eq!(draft.next_steps, "Proceda con la revisión manual.");
        assert_eq!(
            draft.origin,
            DraftOrigin::Fallback {
                reason: "transport".to_string()
            }
        );
    }
}
