//! Weekly Assignment Solver.
//!
//! Given a Monday, picks which eligible visits to execute that week and
//! assigns concrete researchers plus a weekday to each, honouring
//! qualifications, capacity buckets, per-day uniqueness, travel limits
//! and the soft teaming preferences.

mod eligibility;
mod qualification;
mod solver;

pub use eligibility::{
    allowed_day_indices, bucketize_travel, eligible_visits, priority_key, spare_by_daypart,
};
pub use qualification::qualifies_user_for_visit;
pub use solver::{
    solve_week, PlanningRunError, SolutionQuality, VisitAssignment, WeeklyContext, WeeklyOutcome,
};

use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};

use crate::models::availability::{AvailabilityWeek, CapacityBuckets};
use crate::models::user::UserId;
use crate::models::visit::{PartOfDay, Visit};

/// Copy availability rows into per-user capacity buckets for one week.
pub fn capacity_buckets_for_week(
    availability: &HashMap<(UserId, u32), AvailabilityWeek>,
    week: u32,
) -> (HashMap<UserId, u32>, HashMap<UserId, CapacityBuckets>) {
    let mut weekly = HashMap::new();
    let mut daypart = HashMap::new();
    for ((user_id, w), aw) in availability {
        if *w != week {
            continue;
        }
        weekly.insert(*user_id, aw.total_days());
        daypart.insert(*user_id, CapacityBuckets::from_availability(aw));
    }
    (weekly, daypart)
}

/// Subtract capacity already consumed by visits planned in this week with
/// an assigned crew, so a re-run does not double-book anyone.
pub fn apply_existing_assignments(
    all_visits: &[Visit],
    week: u32,
    weekly_caps: &mut HashMap<UserId, u32>,
    daypart_caps: &mut HashMap<UserId, CapacityBuckets>,
) {
    for v in all_visits {
        if v.planned_week != Some(week) || v.researcher_ids.is_empty() {
            continue;
        }
        let Some(part) = v.part_of_day else { continue };
        for user_id in &v.researcher_ids {
            if let Some(cap) = weekly_caps.get_mut(user_id) {
                *cap = cap.saturating_sub(1);
            }
            if let Some(buckets) = daypart_caps.get_mut(user_id) {
                buckets.consume(part);
            }
        }
    }
}

/// Aggregate remaining daypart capacity after a run, with the fixed spare
/// reserve withheld.
pub fn remaining_capacity_report(
    availability: &HashMap<(UserId, u32), AvailabilityWeek>,
    week: u32,
    selected: &[&Visit],
) -> BTreeMap<String, i64> {
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();
    let mut flex: i64 = 0;
    for ((_, w), aw) in availability {
        if *w != week {
            continue;
        }
        *totals.entry("Ochtend".into()).or_default() += i64::from(aw.morning_days);
        *totals.entry("Dag".into()).or_default() += i64::from(aw.daytime_days);
        *totals.entry("Avond".into()).or_default() += i64::from(aw.nighttime_days);
        flex += i64::from(aw.flex_days);
    }
    for part in PartOfDay::ALL {
        let entry = totals.entry(part.label().to_string()).or_default();
        *entry = (*entry - spare_by_daypart(part)).max(0);
    }
    totals.insert("Flex".into(), flex);

    for v in selected {
        let Some(part) = v.part_of_day else { continue };
        let required = i64::from(v.required_researchers.max(1));
        let entry = totals.entry(part.label().to_string()).or_default();
        let dedicated = (*entry).min(required);
        *entry -= dedicated;
        let short = required - dedicated;
        if short > 0 {
            let flex_entry = totals.entry("Flex".into()).or_default();
            *flex_entry = (*flex_entry - short).max(0);
        }
    }
    totals
}

/// Write a weekly outcome back onto the visit store.
///
/// Selected visits transition `Open -> Planned` with the chosen crew;
/// `planned_date` is only recorded under the daily-planning feature.
pub fn apply_outcome(
    visits: &mut [Visit],
    outcome: &WeeklyOutcome,
    daily_planning: bool,
) -> Result<(), crate::models::visit::StatusTransitionError> {
    let mut by_id: HashMap<i64, &mut Visit> = visits.iter_mut().map(|v| (v.id, v)).collect();
    for assignment in &outcome.selected {
        if let Some(v) = by_id.get_mut(&assignment.visit_id) {
            let week = assignment.day.iso_week().week();
            let date = daily_planning.then_some(assignment.day);
            v.mark_planned(week, date, assignment.researcher_ids.clone())?;
        }
    }
    Ok(())
}
