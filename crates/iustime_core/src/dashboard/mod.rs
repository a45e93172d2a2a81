//! Aggregate figures derived from in-memory records.
//!
//! # Invariants
//! - Dashboards are pure functions of their inputs; nothing is cached.
//! - Percentages are rounded half-up.

pub mod global;
pub mod line;

pub use global::{global_dashboard, GlobalDashboard, LineStats, RiskDistribution};
pub use line::{line_dashboard, LineDashboard, ProjectTaskStats, StatusCount};
