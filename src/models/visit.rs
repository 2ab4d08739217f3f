//! Visits, clusters and projects.
//!
//! A [`Cluster`] exclusively owns its [`Visit`]s; a visit holds non-owning
//! id references into the catalogue and the researcher pool.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::catalog::{FunctionId, PvwId, SpeciesId};
use crate::models::user::{BatExperience, UserId};

pub type ProjectId = i64;
pub type ClusterId = i64;
pub type VisitId = i64;

/// Part of day a visit is executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartOfDay {
    Ochtend,
    Dag,
    Avond,
}

impl PartOfDay {
    pub const ALL: [PartOfDay; 3] = [PartOfDay::Ochtend, PartOfDay::Dag, PartOfDay::Avond];

    pub fn label(&self) -> &'static str {
        match self {
            PartOfDay::Ochtend => "Ochtend",
            PartOfDay::Dag => "Dag",
            PartOfDay::Avond => "Avond",
        }
    }

    /// Chronological rank within a day, used for visit numbering.
    pub fn rank(&self) -> u8 {
        match self {
            PartOfDay::Ochtend => 0,
            PartOfDay::Dag => 1,
            PartOfDay::Avond => 2,
        }
    }

    pub fn parse(label: &str) -> Option<PartOfDay> {
        match label.trim() {
            "Ochtend" => Some(PartOfDay::Ochtend),
            "Dag" => Some(PartOfDay::Dag),
            "Avond" => Some(PartOfDay::Avond),
            _ => None,
        }
    }
}

/// Visit lifecycle state.
///
/// `Open → (Planned ↔ Open) → Executed → (Approved | Redo)`; cancellation
/// is possible from any non-terminal state. The seasonal planner only
/// touches `provisional_week` and never transitions state; the weekly
/// solver moves visits between `Open` and `Planned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitStatus {
    Open,
    Planned,
    Executed,
    Approved,
    Redo,
    Cancelled,
}

#[derive(Debug, Error)]
#[error("illegal visit status transition {from:?} -> {to:?}")]
pub struct StatusTransitionError {
    pub from: VisitStatus,
    pub to: VisitStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Town or area appended to cluster addresses for travel lookups.
    pub location: Option<String>,
    /// Quote projects are excluded from weekly planning.
    pub quote: bool,
}

/// A physical site. Soft-deletable; deleted clusters are invisible to the
/// solvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub project_id: ProjectId,
    pub cluster_number: i32,
    /// Free text address or decimal/DMS coordinates.
    pub address: Option<String>,
    pub deleted: bool,
}

impl Cluster {
    /// Full address used for travel-time lookups.
    ///
    /// Plain street addresses get the project location appended; anything
    /// that already looks like coordinates is passed through untouched.
    pub fn travel_address(&self, project: Option<&Project>) -> Option<String> {
        let addr = self.address.as_deref()?.trim();
        if addr.is_empty() {
            return None;
        }
        if looks_like_coordinates(addr) {
            return Some(addr.to_string());
        }
        match project.and_then(|p| p.location.as_deref()) {
            Some(loc) => Some(format!("{}, {}", addr, loc)),
            None => Some(addr.to_string()),
        }
    }
}

/// Decimal "52.1, 4.3" or DMS "52°…" coordinate detection.
fn looks_like_coordinates(addr: &str) -> bool {
    let decimal = || {
        let mut parts = addr.splitn(2, ',');
        let a = parts.next().unwrap_or("").trim();
        let b = parts.next().unwrap_or("").trim();
        !a.is_empty() && !b.is_empty() && a.parse::<f64>().is_ok() && b.parse::<f64>().is_ok()
    };
    let dms = || {
        let lead: String = addr.chars().take_while(|c| c.is_ascii_digit()).collect();
        !lead.is_empty() && addr[lead.len()..].starts_with('°')
    };
    decimal() || dms()
}

/// A compound field event covering one or more protocol visit windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub cluster_id: ClusterId,
    /// Cohort id shared by all visits of one composition run.
    pub group_id: Option<Uuid>,
    /// Chronological number within the cluster.
    pub visit_nr: u32,

    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub duration_minutes: Option<i32>,
    pub part_of_day: Option<PartOfDay>,
    /// Human-readable Dutch start time, e.g. "1 uur na zonsondergang".
    pub start_time_text: Option<String>,

    pub required_researchers: u32,
    pub expertise_level: Option<BatExperience>,

    pub min_temperature_celsius: Option<i32>,
    pub max_wind_force_bft: Option<i32>,
    pub max_precipitation: Option<String>,

    pub wbc: bool,
    pub fiets: bool,
    pub hub: bool,
    pub dvp: bool,
    pub sleutel: bool,
    pub vog: bool,

    pub requires_morning_visit: bool,
    pub requires_evening_visit: bool,
    pub requires_june_visit: bool,
    pub requires_maternity_period_visit: bool,

    pub remarks_planning: Option<String>,
    pub remarks_field: Option<String>,

    /// Written by the seasonal planner only.
    pub provisional_week: Option<u32>,
    pub provisional_locked: bool,
    /// Written by the weekly solver only.
    pub planned_week: Option<u32>,
    pub planned_date: Option<NaiveDate>,

    pub priority: bool,
    /// Custom visits are planned manually and bypass the solvers.
    pub custom_function_name: Option<String>,
    pub custom_species_name: Option<String>,

    pub status: VisitStatus,

    pub function_ids: Vec<FunctionId>,
    pub species_ids: Vec<SpeciesId>,
    pub protocol_visit_window_ids: Vec<PvwId>,
    pub researcher_ids: Vec<UserId>,
}

impl Visit {
    pub fn is_custom(&self) -> bool {
        self.custom_function_name.is_some() || self.custom_species_name.is_some()
    }

    /// Weekly solver claims this visit for the given week.
    pub fn mark_planned(
        &mut self,
        week: u32,
        date: Option<NaiveDate>,
        researchers: Vec<UserId>,
    ) -> Result<(), StatusTransitionError> {
        if self.status != VisitStatus::Open {
            return Err(StatusTransitionError { from: self.status, to: VisitStatus::Planned });
        }
        self.planned_week = Some(week);
        self.planned_date = date;
        self.researcher_ids = researchers;
        self.status = VisitStatus::Planned;
        Ok(())
    }

    /// Weekly solver releases a previously planned visit.
    pub fn clear_planning(&mut self) -> Result<(), StatusTransitionError> {
        if self.status != VisitStatus::Planned {
            return Err(StatusTransitionError { from: self.status, to: VisitStatus::Open });
        }
        self.planned_week = None;
        self.planned_date = None;
        self.researcher_ids.clear();
        self.status = VisitStatus::Open;
        Ok(())
    }

    /// External execution report.
    pub fn mark_executed(&mut self) -> Result<(), StatusTransitionError> {
        if self.status != VisitStatus::Planned {
            return Err(StatusTransitionError { from: self.status, to: VisitStatus::Executed });
        }
        self.status = VisitStatus::Executed;
        Ok(())
    }

    /// External review outcome.
    pub fn mark_reviewed(&mut self, approved: bool) -> Result<(), StatusTransitionError> {
        let to = if approved { VisitStatus::Approved } else { VisitStatus::Redo };
        if self.status != VisitStatus::Executed {
            return Err(StatusTransitionError { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), StatusTransitionError> {
        match self.status {
            VisitStatus::Approved | VisitStatus::Cancelled => {
                Err(StatusTransitionError { from: self.status, to: VisitStatus::Cancelled })
            }
            _ => {
                self.status = VisitStatus::Cancelled;
                Ok(())
            }
        }
    }
}
