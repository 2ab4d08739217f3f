//! Candidate selection for a weekly planning run: window and status
//! filters, protocol frequency lockout, protocol ordering, and the
//! bit-packed priority key.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::models::catalog::{Catalog, ProtocolId};
use crate::models::visit::{ClusterId, Visit, VisitStatus};

/// How far back locked visits control protocol frequency, in weeks.
const FREQUENCY_LOOKBACK_WEEKS: u32 = 8;

/// 0-based weekday indices (Mon=0..Fri=4) on which the visit can run.
pub fn allowed_day_indices(week_monday: NaiveDate, visit: &Visit) -> Vec<usize> {
    let week_friday = week_monday + Duration::days(4);
    let from = visit.from_date.max(week_monday);
    let to = visit.to_date.min(week_friday);
    if from > to {
        return vec![];
    }
    let mut indices = Vec::new();
    let mut cur = from;
    while cur <= to {
        let idx = (cur - week_monday).num_days();
        if (0..=4).contains(&idx) {
            indices.push(idx as usize);
        }
        cur += Duration::days(1);
    }
    indices
}

/// Bit-packed priority weight; higher is more important.
fn priority_weight(catalog: &Catalog, week_monday: NaiveDate, v: &Visit) -> i64 {
    let current_week = week_monday.iso_week().week();
    let two_weeks_out = week_monday + Duration::days(14);

    let anchor = v.provisional_week == Some(current_week);
    let priority = v.priority;
    let urgent = v.to_date <= two_weeks_out;
    let family_priority = v
        .species_ids
        .first()
        .and_then(|id| catalog.family_of_species(*id))
        .and_then(|f| f.priority)
        .map(|p| p <= 3)
        .unwrap_or(false);
    let smp = v
        .function_ids
        .first()
        .and_then(|id| catalog.function(*id))
        .map(|f| f.name.trim_start().to_uppercase().starts_with("SMP"))
        .unwrap_or(false);
    let vrfg = crate::services::skills::any_function_contains(
        catalog,
        v,
        &["Vliegroute", "Foerageergebied"],
    );

    (i64::from(anchor) << 8)
        | (i64::from(priority) << 7)
        | (i64::from(urgent) << 6)
        | (i64::from(family_priority) << 5)
        | (i64::from(smp) << 4)
        | (i64::from(vrfg) << 3)
        | (i64::from(v.hub) << 2)
        | (i64::from(v.sleutel) << 1)
        | i64::from(v.fiets || v.dvp || v.wbc)
}

/// Stable descending priority key: `(-weight, to_date, from_date, id)`.
pub fn priority_key(
    catalog: &Catalog,
    week_monday: NaiveDate,
    v: &Visit,
) -> (i64, NaiveDate, NaiveDate, i64) {
    (-priority_weight(catalog, week_monday, v), v.to_date, v.from_date, v.id)
}

/// `(protocol, cluster)` pairs blocked by a recent locked visit.
///
/// A protocol whose last assigned visit started too recently (optimistic
/// gap measured to the target Friday) blocks all of its candidates on the
/// same cluster.
fn blocked_pairs(
    catalog: &Catalog,
    all_visits: &[Visit],
    week_monday: NaiveDate,
) -> HashSet<(ProtocolId, ClusterId)> {
    let week_num = week_monday.iso_week().week();
    let lookback_start = week_num.saturating_sub(FREQUENCY_LOOKBACK_WEEKS).max(1);
    let lookback_end = week_num.saturating_sub(1);
    let week_friday = week_monday + Duration::days(4);
    let horizon_floor = week_monday - Duration::weeks(10);

    let mut blocked = HashSet::new();
    if lookback_end < lookback_start {
        return blocked;
    }

    for v in all_visits {
        let Some(planned_week) = v.planned_week else { continue };
        if planned_week < lookback_start || planned_week > lookback_end {
            continue;
        }
        if v.researcher_ids.is_empty() {
            continue;
        }
        if v.to_date < horizon_floor {
            continue;
        }

        for pvw_id in &v.protocol_visit_window_ids {
            let Some((protocol, _)) = catalog.visit_window(*pvw_id) else { continue };
            let required_gap = protocol.min_gap_days();
            if required_gap <= 0 {
                continue;
            }
            let ref_date = v.from_date;
            let days_diff = (week_friday - ref_date).num_days();
            if days_diff < required_gap {
                blocked.insert((protocol.id, v.cluster_id));
            }
        }
    }
    blocked
}

/// Select and priority-sort the candidate visits for a week.
///
/// `all_visits` is the full visit store (needed for the frequency
/// lookback); `quote_clusters` marks clusters whose project is a quote.
pub fn eligible_visits<'a>(
    catalog: &Catalog,
    all_visits: &'a [Visit],
    quote_clusters: &HashSet<ClusterId>,
    week_monday: NaiveDate,
) -> Vec<&'a Visit> {
    let week_friday = week_monday + Duration::days(4);
    let week_num = week_monday.iso_week().week();
    let blocked = blocked_pairs(catalog, all_visits, week_monday);

    let mut candidates: Vec<&Visit> = all_visits
        .iter()
        .filter(|v| v.status == VisitStatus::Open)
        .filter(|v| v.from_date <= week_friday && v.to_date >= week_monday)
        .filter(|v| !quote_clusters.contains(&v.cluster_id))
        .filter(|v| !v.is_custom())
        // Authorized by the seasonal plan (current or overdue), or not yet
        // simulated at all.
        .filter(|v| v.provisional_week.map(|w| w <= week_num).unwrap_or(true))
        // Already planned with a crew means executed planning exists.
        .filter(|v| v.planned_week.is_none() || v.researcher_ids.is_empty())
        .filter(|v| v.part_of_day.is_some())
        .collect();

    // Frequency lockout.
    candidates.retain(|v| {
        let is_blocked = v.protocol_visit_window_ids.iter().any(|pvw_id| {
            catalog
                .visit_window(*pvw_id)
                .map(|(p, _)| blocked.contains(&(p.id, v.cluster_id)))
                .unwrap_or(false)
        });
        if is_blocked {
            debug!(visit = v.id, "weekly: dropped by protocol frequency lockout");
        }
        !is_blocked
    });

    // Protocol ordering: only the lowest open visit index per protocol may
    // run; later indices wait for their predecessor.
    let mut min_index: HashMap<ProtocolId, u32> = HashMap::new();
    for v in &candidates {
        for pvw_id in &v.protocol_visit_window_ids {
            if let Some((p, w)) = catalog.visit_window(*pvw_id) {
                min_index
                    .entry(p.id)
                    .and_modify(|m| *m = (*m).min(w.visit_index))
                    .or_insert(w.visit_index);
            }
        }
    }
    candidates.retain(|v| {
        let out_of_order = v.protocol_visit_window_ids.iter().any(|pvw_id| {
            catalog
                .visit_window(*pvw_id)
                .map(|(p, w)| min_index.get(&p.id).map(|m| w.visit_index > *m).unwrap_or(false))
                .unwrap_or(false)
        });
        if out_of_order {
            debug!(visit = v.id, "weekly: skipped out-of-order protocol visit");
        }
        !out_of_order
    });

    candidates.sort_by_key(|v| priority_key(catalog, week_monday, v));
    candidates
}

/// Travel minutes bucketised for reporting; `None` when beyond the hard
/// travel limit.
pub fn bucketize_travel(minutes: i64) -> Option<u8> {
    if minutes < 0 {
        return None;
    }
    match minutes {
        0..=15 => Some(1),
        16..=30 => Some(2),
        31..=45 => Some(3),
        46..=60 => Some(4),
        61..=75 => Some(6),
        _ => None,
    }
}

/// Fixed spare reserve withheld from the aggregate weekly capacity report.
pub fn spare_by_daypart(part: crate::models::visit::PartOfDay) -> i64 {
    match part {
        crate::models::visit::PartOfDay::Ochtend => 1,
        crate::models::visit::PartOfDay::Dag => 2,
        crate::models::visit::PartOfDay::Avond => 2,
    }
}
