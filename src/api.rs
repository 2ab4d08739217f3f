//! Data Transfer Objects exposed by the planning surfaces.
//!
//! These types define the JSON shapes consumed by the frontend and the
//! persisted solver artefacts; the internal model lives in
//! [`crate::models`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::visit::VisitId;

/// Result of a per-cluster visit composition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionResponse {
    pub visit_ids: Vec<VisitId>,
    pub warnings: Vec<String>,
}

/// Result of a weekly planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningRunResponse {
    pub selected_visit_ids: Vec<VisitId>,
    /// Visits considered but not executed this week (diagnostic data, not
    /// an error).
    pub skipped_visit_ids: Vec<VisitId>,
    /// Remaining aggregate daypart capacity after the run.
    pub capacity_remaining: BTreeMap<String, i64>,
    /// Concrete weekday per selected visit (daily-planning feature).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub day_assignments: BTreeMap<VisitId, NaiveDate>,
}

/// Result of a seasonal planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalRunResponse {
    /// Visits that received a provisional week.
    pub planned: BTreeMap<VisitId, u32>,
    /// Visits the planner left unplanned.
    pub unplanned: Vec<VisitId>,
    pub objective: i64,
}

/// One cell of the deadline view: demand accounted at its deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineCell {
    pub required: i64,
    pub assigned: i64,
    pub shortfall: i64,
    pub spare: i64,
}

/// One cell of the week view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekCell {
    pub spare: i64,
    pub planned: i64,
    pub shortage: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekView {
    /// ISO week labels, e.g. `2025-W23`.
    pub weeks: Vec<String>,
    /// Row label (`Skill - Part` or `Totalen`) -> week label -> cell.
    pub rows: BTreeMap<String, BTreeMap<String, WeekCell>>,
}

/// Persisted seasonal-planner result grid.
///
/// `deadline_view` maps skill -> daypart -> deadline -> cell;
/// `week_view` is the per-week planning grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapacityGridDocument {
    pub deadline_view: BTreeMap<String, BTreeMap<String, BTreeMap<String, DeadlineCell>>>,
    pub week_view: WeekView,
}
