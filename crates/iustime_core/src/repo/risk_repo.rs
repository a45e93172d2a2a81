//! Risk repository contract and SQLite implementation.

use crate::model::{Level, LineId, Risk, RiskId, RiskStatus, TaskId};
use crate::repo::{
    ensure_connection_ready, missing_line_on_fk, not_found, parse_enum, parse_optional_uuid,
    parse_uuid, EntityKind, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const RISK_SELECT_SQL: &str = "SELECT
    id,
    line_id,
    task_id,
    description,
    responsible,
    required_action,
    status,
    priority,
    impact,
    mitigation_strategy
FROM risks";

#[derive(Debug, Clone, Default)]
pub struct RiskListQuery {
    pub line_id: Option<LineId>,
    pub task_id: Option<TaskId>,
}

impl RiskListQuery {
    pub fn for_line(line_id: LineId) -> Self {
        Self {
            line_id: Some(line_id),
            task_id: None,
        }
    }
}

pub trait RiskRepository {
    fn create_risk(&self, risk: &Risk) -> RepoResult<RiskId>;
    fn update_risk(&self, risk: &Risk) -> RepoResult<()>;
    fn get_risk(&self, id: RiskId) -> RepoResult<Option<Risk>>;
    fn list_risks(&self, query: &RiskListQuery) -> RepoResult<Vec<Risk>>;
    fn delete_risk(&self, id: RiskId) -> RepoResult<()>;
}

pub struct SqliteRiskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRiskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["risks"])?;
        Ok(Self { conn })
    }
}

impl RiskRepository for SqliteRiskRepository<'_> {
    fn create_risk(&self, risk: &Risk) -> RepoResult<RiskId> {
        risk.validate()?;
        self.conn
            .execute(
                "INSERT INTO risks (
                    id,
                    line_id,
                    task_id,
                    description,
                    responsible,
                    required_action,
                    status,
                    priority,
                    impact,
                    mitigation_strategy
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                params![
                    risk.id.to_string(),
                    risk.line_id.to_string(),
                    risk.task_id.map(|id| id.to_string()),
                    risk.description.as_str(),
                    risk.responsible.as_str(),
                    risk.required_action.as_str(),
                    risk.status.as_str(),
                    risk.priority.as_str(),
                    risk.impact.as_str(),
                    risk.mitigation_strategy.as_deref(),
                ],
            )
            .map_err(|err| missing_line_on_fk(err, risk.line_id))?;
        Ok(risk.id)
    }

    fn update_risk(&self, risk: &Risk) -> RepoResult<()> {
        risk.validate()?;
        let changed = self
            .conn
            .execute(
                "UPDATE risks
                 SET
                    line_id = ?1,
                    task_id = ?2,
                    description = ?3,
                    responsible = ?4,
                    required_action = ?5,
                    status = ?6,
                    priority = ?7,
                    impact = ?8,
                    mitigation_strategy = ?9,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?10;",
                params![
                    risk.line_id.to_string(),
                    risk.task_id.map(|id| id.to_string()),
                    risk.description.as_str(),
                    risk.responsible.as_str(),
                    risk.required_action.as_str(),
                    risk.status.as_str(),
                    risk.priority.as_str(),
                    risk.impact.as_str(),
                    risk.mitigation_strategy.as_deref(),
                    risk.id.to_string(),
                ],
            )
            .map_err(|err| missing_line_on_fk(err, risk.line_id))?;
        if changed == 0 {
            return Err(not_found(EntityKind::Risk, risk.id));
        }
        Ok(())
    }

    fn get_risk(&self, id: RiskId) -> RepoResult<Option<Risk>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RISK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_risk_row(row)?));
        }
        Ok(None)
    }

    fn list_risks(&self, query: &RiskListQuery) -> RepoResult<Vec<Risk>> {
        let mut sql = format!("{RISK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(line_id) = query.line_id {
            sql.push_str(" AND line_id = ?");
            bind_values.push(Value::Text(line_id.to_string()));
        }
        if let Some(task_id) = query.task_id {
            sql.push_str(" AND task_id = ?");
            bind_values.push(Value::Text(task_id.to_string()));
        }
        sql.push_str(" ORDER BY rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut risks = Vec::new();
        while let Some(row) = rows.next()? {
            risks.push(parse_risk_row(row)?);
        }
        Ok(risks)
    }

    fn delete_risk(&self, id: RiskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM risks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(not_found(EntityKind::Risk, id));
        }
        Ok(())
    }
}

fn parse_risk_row(row: &Row<'_>) -> RepoResult<Risk> {
    let id_text: String = row.get("id")?;
    let line_text: String = row.get("line_id")?;
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    let impact_text: String = row.get("impact")?;

    let risk = Risk {
        id: parse_uuid(&id_text, "risks.id")?,
        line_id: parse_uuid(&line_text, "risks.line_id")?,
        task_id: parse_optional_uuid(row.get("task_id")?, "risks.task_id")?,
        description: row.get("description")?,
        responsible: row.get("responsible")?,
        required_action: row.get("required_action")?,
        status: parse_enum(&status_text, "risks.status", RiskStatus::parse)?,
        priority: parse_enum(&priority_text, "risks.priority", Level::parse)?,
        impact: parse_enum(&impact_text, "risks.impact", Level::parse)?,
        mitigation_strategy: row.get("mitigation_strategy")?,
    };
    risk.validate()?;
    Ok(risk)
}
