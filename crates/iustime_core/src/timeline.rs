//! Two-week timeline placement.
//!
//! # Invariants
//! - A window always starts on a Monday and spans exactly 14 days.
//! - Bars never extend outside the window and are at least one day wide.

use crate::model::{Task, TaskId, WorkStatus};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;

pub const WINDOW_DAYS: i64 = 14;

/// Visible two-week range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineWindow {
    start: NaiveDate,
}

impl TimelineWindow {
    /// Window starting on the Monday of `anchor`'s week.
    pub fn containing(anchor: NaiveDate) -> Self {
        let from_monday = i64::from(anchor.weekday().num_days_from_monday());
        Self {
            start: anchor - Duration::days(from_monday),
        }
    }

    pub fn today() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last visible day (a Sunday).
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(WINDOW_DAYS - 1)
    }

    pub fn previous(&self) -> Self {
        Self {
            start: self.start - Duration::days(WINDOW_DAYS),
        }
    }

    pub fn next(&self) -> Self {
        Self {
            start: self.start + Duration::days(WINDOW_DAYS),
        }
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        (0..WINDOW_DAYS)
            .map(|offset| self.start + Duration::days(offset))
            .collect()
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end() && end >= self.start
    }

    /// Places `[start, end]` on the window grid, or `None` when outside it.
    pub fn place(&self, start: NaiveDate, end: NaiveDate) -> Option<TimelineBar> {
        if !self.overlaps(start, end) {
            return None;
        }
        let mut offset = (start - self.start).num_days();
        let mut duration = (end - start).num_days() + 1;
        let clipped_start = offset < 0;
        if clipped_start {
            duration += offset;
            offset = 0;
        }
        let max_duration = WINDOW_DAYS - offset;
        let clipped_end = duration > max_duration;
        if clipped_end {
            duration = max_duration;
        }
        Some(TimelineBar {
            offset: offset as u32,
            duration: duration.max(1) as u32,
            clipped_start,
            clipped_end,
        })
    }
}

/// Grid placement of one task, in whole days from the window start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineBar {
    pub offset: u32,
    pub duration: u32,
    /// Task starts before the window.
    pub clipped_start: bool,
    /// Task ends after the window.
    pub clipped_end: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineRow {
    pub task_id: TaskId,
    pub title: String,
    pub status: WorkStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar: TimelineBar,
}

/// Rows for every task visible in `window`, ordered by start date, then
/// title, then id.
pub fn timeline_rows(window: &TimelineWindow, tasks: &[Task]) -> Vec<TimelineRow> {
    let mut rows: Vec<TimelineRow> = tasks
        .iter()
        .filter_map(|task| {
            window
                .place(task.start_date, task.end_date)
                .map(|bar| TimelineRow {
                    task_id: task.id,
                    title: task.title.clone(),
                    status: task.status,
                    start_date: task.start_date,
                    end_date: task.end_date,
                    bar,
                })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    rows
}
