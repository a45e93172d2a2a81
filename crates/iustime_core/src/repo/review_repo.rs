//! Monthly and global review repository.
//!
//! # Invariants
//! - Saving is an upsert keyed by `(line_id, month)` for monthly reviews and
//!   by `month` for global reviews; the stored row is returned.
//! - A monthly review keeps its first id across upserts.

use crate::model::{GlobalReview, LineId, MonthlyReview, ReviewMonth};
use crate::repo::{
    ensure_connection_ready, missing_line_on_fk, parse_uuid, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const MONTHLY_SELECT_SQL: &str = "SELECT
    id,
    line_id,
    month,
    summary,
    achievements,
    issues,
    next_steps,
    updated_at
FROM monthly_reviews";

const GLOBAL_SELECT_SQL: &str = "SELECT
    month,
    vision,
    milestones,
    attention_areas,
    strategy,
    last_updated
FROM global_reviews";

pub trait ReviewRepository {
    fn upsert_monthly_review(&self, review: &MonthlyReview) -> RepoResult<MonthlyReview>;
    fn get_monthly_review(
        &self,
        line_id: LineId,
        month: ReviewMonth,
    ) -> RepoResult<Option<MonthlyReview>>;
    /// Newest month first; all lines when `line_id` is `None`.
    fn list_monthly_reviews(&self, line_id: Option<LineId>) -> RepoResult<Vec<MonthlyReview>>;
    fn upsert_global_review(&self, review: &GlobalReview) -> RepoResult<GlobalReview>;
    fn get_global_review(&self, month: ReviewMonth) -> RepoResult<Option<GlobalReview>>;
    /// Newest month first.
    fn list_global_reviews(&self) -> RepoResult<Vec<GlobalReview>>;
}

pub struct SqliteReviewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReviewRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["monthly_reviews", "global_reviews"])?;
        Ok(Self { conn })
    }
}

impl ReviewRepository for SqliteReviewRepository<'_> {
    fn upsert_monthly_review(&self, review: &MonthlyReview) -> RepoResult<MonthlyReview> {
        review.validate()?;
        self.conn
            .execute(
                "INSERT INTO monthly_reviews (
                    id,
                    line_id,
                    month,
                    summary,
                    achievements,
                    issues,
                    next_steps,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(line_id, month) DO UPDATE SET
                    summary = excluded.summary,
                    achievements = excluded.achievements,
                    issues = excluded.issues,
                    next_steps = excluded.next_steps,
                    updated_at = excluded.updated_at;",
                params![
                    review.id.to_string(),
                    review.line_id.to_string(),
                    review.month.to_string(),
                    review.summary.as_str(),
                    review.achievements.as_str(),
                    review.issues.as_str(),
                    review.next_steps.as_str(),
                    review.updated_at,
                ],
            )
            .map_err(|err| missing_line_on_fk(err, review.line_id))?;
        self.get_monthly_review(review.line_id, review.month)?
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "monthly review {} / {} missing after upsert",
                    review.line_id, review.month
                ))
            })
    }

    fn get_monthly_review(
        &self,
        line_id: LineId,
        month: ReviewMonth,
    ) -> RepoResult<Option<MonthlyReview>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MONTHLY_SELECT_SQL} WHERE line_id = ?1 AND month = ?2;"
        ))?;
        let mut rows = stmt.query(params![line_id.to_string(), month.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_monthly_row(row)?));
        }
        Ok(None)
    }

    fn list_monthly_reviews(&self, line_id: Option<LineId>) -> RepoResult<Vec<MonthlyReview>> {
        let mut sql = format!("{MONTHLY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(line_id) = line_id {
            sql.push_str(" AND line_id = ?");
            bind_values.push(Value::Text(line_id.to_string()));
        }
        sql.push_str(" ORDER BY month DESC, rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(parse_monthly_row(row)?);
        }
        Ok(reviews)
    }

    fn upsert_global_review(&self, review: &GlobalReview) -> RepoResult<GlobalReview> {
        review.validate()?;
        self.conn.execute(
            "INSERT INTO global_reviews (
                month,
                vision,
                milestones,
                attention_areas,
                strategy,
                last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(month) DO UPDATE SET
                vision = excluded.vision,
                milestones = excluded.milestones,
                attention_areas = excluded.attention_areas,
                strategy = excluded.strategy,
                last_updated = excluded.last_updated;",
            params![
                review.month.to_string(),
                review.vision.as_str(),
                review.milestones.as_str(),
                review.attention_areas.as_str(),
                review.strategy.as_str(),
                review.last_updated,
            ],
        )?;
        self.get_global_review(review.month)?.ok_or_else(|| {
            RepoError::InvalidData(format!("global review {} missing after upsert", review.month))
        })
    }

    fn get_global_review(&self, month: ReviewMonth) -> RepoResult<Option<GlobalReview>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GLOBAL_SELECT_SQL} WHERE month = ?1;"))?;
        let mut rows = stmt.query([month.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_global_row(row)?));
        }
        Ok(None)
    }

    fn list_global_reviews(&self) -> RepoResult<Vec<GlobalReview>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GLOBAL_SELECT_SQL} ORDER BY month DESC;"))?;
        let mut rows = stmt.query([])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(parse_global_row(row)?);
        }
        Ok(reviews)
    }
}

fn parse_month(value: &str, column: &'static str) -> RepoResult<ReviewMonth> {
    value
        .parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid month `{value}` in {column}")))
}

fn parse_monthly_row(row: &Row<'_>) -> RepoResult<MonthlyReview> {
    let id_text: String = row.get("id")?;
    let line_text: String = row.get("line_id")?;
    let month_text: String = row.get("month")?;
    let review = MonthlyReview {
        id: parse_uuid(&id_text, "monthly_reviews.id")?,
        line_id: parse_uuid(&line_text, "monthly_reviews.line_id")?,
        month: parse_month(&month_text, "monthly_reviews.month")?,
        summary: row.get("summary")?,
        achievements: row.get("achievements")?,
        issues: row.get("issues")?,
        next_steps: row.get("next_steps")?,
        updated_at: row.get("updated_at")?,
    };
    review.validate()?;
    Ok(review)
}

fn parse_global_row(row: &Row<'_>) -> RepoResult<GlobalReview> {
    let month_text: String = row.get("month")?;
    let review = GlobalReview {
        month: parse_month(&month_text, "global_reviews.month")?,
        vision: row.get("vision")?,
        milestones: row.get("milestones")?,
        attention_areas: row.get("attention_areas")?,
        strategy: row.get("strategy")?,
        last_updated: row.get("last_updated")?,
    };
    review.validate()?;
    Ok(review)
}
