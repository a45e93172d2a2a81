//! Monthly and global review use-cases.
//!
//! # Invariants
//! - Generation always persists a review; a failed AI call stores the
//!   fallback draft and reports its origin.
//! - Saving stamps `updated_at` / `last_updated` with the current time.

use crate::ai::{DraftOrigin, GlobalReviewContext, ReviewContext, ReviewGenerator};
use crate::model::{now_epoch_ms, GlobalReview, LineId, MonthlyReview, ReviewMonth};
use crate::repo::review_repo::ReviewRepository;
use crate::service::ServiceResult;
use serde::Serialize;

/// Stored review together with where its text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generated<T> {
    pub review: T,
    pub origin: DraftOrigin,
}

pub struct ReviewService<R: ReviewRepository, G: ReviewGenerator> {
    repo: R,
    generator: G,
}

impl<R: ReviewRepository, G: ReviewGenerator> ReviewService<R, G> {
    pub fn new(repo: R, generator: G) -> Self {
        Self { repo, generator }
    }

    /// Drafts the review of `line_id` for `month` and stores it, replacing
    /// any earlier text for the same month.
    pub fn generate_monthly_review(
        &self,
        line_id: LineId,
        month: ReviewMonth,
        context: &ReviewContext,
    ) -> ServiceResult<Generated<MonthlyReview>> {
        let draft = self.generator.generate_monthly(context);
        let mut review = self
            .repo
            .get_monthly_review(line_id, month)?
            .unwrap_or_else(|| MonthlyReview::blank(line_id, month));
        review.summary = draft.summary;
        review.achievements = draft.achievements;
        review.issues = draft.issues;
        review.next_steps = draft.next_steps;

        let review = self.save_monthly_review(&review)?;
        log::info!(
            "event=review_generate module=service status=ok scope=monthly origin={}",
            draft.origin.as_str()
        );
        Ok(Generated {
            review,
            origin: draft.origin,
        })
    }

    pub fn save_monthly_review(&self, review: &MonthlyReview) -> ServiceResult<MonthlyReview> {
        let mut review = review.clone();
        review.updated_at = now_epoch_ms();
        Ok(self.repo.upsert_monthly_review(&review)?)
    }

    pub fn get_monthly_review(
        &self,
        line_id: LineId,
        month: ReviewMonth,
    ) -> ServiceResult<Option<MonthlyReview>> {
        Ok(self.repo.get_monthly_review(line_id, month)?)
    }

    pub fn list_monthly_reviews(&self, line_id: Option<LineId>) -> ServiceResult<Vec<MonthlyReview>> {
        Ok(self.repo.list_monthly_reviews(line_id)?)
    }

    pub fn generate_global_review(
        &self,
        month: ReviewMonth,
        context: &GlobalReviewContext,
    ) -> ServiceResult<Generated<GlobalReview>> {
        let draft = self.generator.generate_global(context);
        let mut review = self
            .repo
            .get_global_review(month)?
            .unwrap_or_else(|| GlobalReview::blank(month));
        review.vision = draft.vision;
        review.milestones = draft.milestones;
        review.attention_areas = draft.attention_areas;
        review.strategy = draft.strategy;

        let review = self.save_global_review(&review)?;
        log::info!(
            "event=review_generate module=service status=ok scope=global origin={}",
            draft.origin.as_str()
        );
        Ok(Generated {
            review,
            origin: draft.origin,
        })
    }

    pub fn save_global_review(&self, review: &GlobalReview) -> ServiceResult<GlobalReview> {
        let mut review = review.clone();
        review.last_updated = now_epoch_ms();
        Ok(self.repo.upsert_global_review(&review)?)
    }

    pub fn get_global_review(&self, month: ReviewMonth) -> ServiceResult<Option<GlobalReview>> {
        Ok(self.repo.get_global_review(month)?)
    }

    pub fn list_global_reviews(&self) -> ServiceResult<Vec<GlobalReview>> {
        Ok(self.repo.list_global_reviews()?)
    }
}
