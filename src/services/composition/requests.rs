//! Request graph: node explosion and compatibility edges.
//!
//! Every required protocol visit window becomes one request node. Edges
//! connect requests that may share a single field visit.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

use crate::models::calendar;
use crate::models::catalog::{Catalog, Protocol, ProtocolId, PvwId, TimingReference};
use crate::models::visit::PartOfDay;

/// A single required visit occurrence (node in the request graph).
#[derive(Debug, Clone)]
pub struct VisitRequest {
    pub protocol_id: ProtocolId,
    pub visit_index: u32,
    pub pvw_id: PvwId,
    /// Window normalised to the planning year.
    pub window_from: NaiveDate,
    pub window_to: NaiveDate,
    /// Allowed dayparts; `None` means unconstrained.
    pub part_options: Option<BTreeSet<PartOfDay>>,
    /// Preceding request of the same protocol: `(request index, gap days)`.
    pub predecessor: Option<(usize, i64)>,
    /// Earliest start after static predecessor propagation.
    pub effective_window_from: NaiveDate,
}

impl VisitRequest {
    /// Stable identifier used in ordering and diagnostics.
    pub fn key(&self) -> (ProtocolId, u32) {
        (self.protocol_id, self.visit_index)
    }

    pub fn window_len_days(&self) -> i64 {
        (self.window_to - self.window_from).num_days()
    }
}

/// Allowed dayparts from the timing reference alone.
fn base_part_options(p: &Protocol) -> Option<BTreeSet<PartOfDay>> {
    let set = |parts: &[PartOfDay]| Some(parts.iter().copied().collect());
    match p.start_timing_reference? {
        TimingReference::Daytime => set(&[PartOfDay::Dag]),
        TimingReference::AbsoluteTime => set(&[PartOfDay::Avond]),
        TimingReference::SunsetToSunrise => set(&[PartOfDay::Avond, PartOfDay::Ochtend]),
        TimingReference::Sunset => {
            if p.end_timing_reference == Some(TimingReference::Sunrise) {
                set(&[PartOfDay::Avond, PartOfDay::Ochtend])
            } else {
                set(&[PartOfDay::Avond])
            }
        }
        TimingReference::Sunrise => {
            // Starting at or after sunrise is effectively day work.
            if p.start_time_relative_minutes.map(|m| m >= 0).unwrap_or(false) {
                set(&[PartOfDay::Dag])
            } else {
                set(&[PartOfDay::Ochtend])
            }
        }
    }
}

/// Explode protocols into request nodes with effective start propagation.
///
/// Windows whose normalised dates are inverted are skipped with a warning.
pub fn generate_requests(
    catalog: &Catalog,
    protocol_ids: &[ProtocolId],
    year: i32,
    warnings: &mut Vec<String>,
) -> Vec<VisitRequest> {
    let mut requests: Vec<VisitRequest> = Vec::new();

    for pid in protocol_ids {
        let Some(p) = catalog.protocol(*pid) else { continue };
        if p.visit_windows.is_empty() {
            continue;
        }

        let mut windows: Vec<_> = p.visit_windows.iter().collect();
        windows.sort_by_key(|w| w.visit_index);

        let min_gap_days = p.min_gap_days();
        let base_parts = base_part_options(p);
        let mut prev_request: Option<usize> = None;

        for w in windows {
            let wf = calendar::to_year(w.window_from, year);
            let wt = calendar::to_year(w.window_to, year);
            if wf > wt {
                warnings.push(format!(
                    "protocol {} visit {}: window {}..{} is invalid after year normalisation",
                    p.id, w.visit_index, wf, wt
                ));
                continue;
            }

            let mut parts = base_parts.clone();

            // At-least-one morning/evening flags bind the first occurrence;
            // later occurrences stay flexible so they can still merge.
            if w.visit_index == 1 {
                if p.requires_morning_visit {
                    parts = intersect_or_pin(parts, PartOfDay::Ochtend);
                }
                if p.requires_evening_visit {
                    parts = intersect_or_pin(parts, PartOfDay::Avond);
                }
                // A conflicting flag/timing combination falls back to the
                // timing-derived options.
                if matches!(&parts, Some(s) if s.is_empty()) {
                    parts = base_parts.clone();
                }
            }

            let predecessor = if w.visit_index > 1 {
                prev_request.map(|idx| (idx, min_gap_days))
            } else {
                None
            };

            requests.push(VisitRequest {
                protocol_id: p.id,
                visit_index: w.visit_index,
                pvw_id: w.id,
                window_from: wf,
                window_to: wt,
                part_options: parts,
                predecessor,
                effective_window_from: wf,
            });
            prev_request = Some(requests.len() - 1);
        }
    }

    // Propagate static predecessor delays. Requests of one protocol are
    // generated in index order, so a single forward pass suffices.
    for i in 0..requests.len() {
        if let Some((pred_idx, gap)) = requests[i].predecessor {
            let min_valid = requests[pred_idx].effective_window_from + Duration::days(gap);
            if min_valid > requests[i].effective_window_from {
                requests[i].effective_window_from = min_valid;
            }
        }
        if requests[i].effective_window_from > requests[i].window_to {
            warnings.push(format!(
                "protocol {} visit {}: gap pushes effective start {} past window end {}",
                requests[i].protocol_id,
                requests[i].visit_index,
                requests[i].effective_window_from,
                requests[i].window_to
            ));
        }
    }

    requests
}

fn intersect_or_pin(
    parts: Option<BTreeSet<PartOfDay>>,
    pin: PartOfDay,
) -> Option<BTreeSet<PartOfDay>> {
    match parts {
        None => Some(BTreeSet::from([pin])),
        Some(set) => Some(set.into_iter().filter(|p| *p == pin).collect()),
    }
}

/// Biological compatibility of two protocols.
pub fn bio_compatible(catalog: &Catalog, p1: &Protocol, p2: &Protocol) -> bool {
    let smp1 = catalog.is_smp_protocol(p1);
    let smp2 = catalog.is_smp_protocol(p2);

    // SMP gating: SMP work never mixes with regular work, and SMP pairs
    // stay within one family.
    if smp1 || smp2 {
        if !(smp1 && smp2) {
            return false;
        }
        return same_family(catalog, p1, p2);
    }

    // Rugstreeppad functions are visited sequentially, never combined.
    let is_rugstreeppad = |p: &Protocol| {
        catalog
            .species_of(p)
            .map(|s| s.name == "Rugstreeppad")
            .unwrap_or(false)
    };
    if (is_rugstreeppad(p1) || is_rugstreeppad(p2)) && p1.function_id != p2.function_id {
        return false;
    }

    if same_family(catalog, p1, p2) {
        return true;
    }

    allowed_cross_family(catalog, p1, p2)
}

fn same_family(catalog: &Catalog, p1: &Protocol, p2: &Protocol) -> bool {
    let sp1 = catalog.species_of(p1);
    let sp2 = catalog.species_of(p2);
    if let (Some(a), Some(b)) = (&sp1, &sp2) {
        if a.family_id == b.family_id {
            return true;
        }
    }
    let n1 = catalog.normalized_family_name(p1);
    let n2 = catalog.normalized_family_name(p2);
    !n1.is_empty() && n1 == n2
}

/// Cross-family pairs that may still share a visit.
fn allowed_cross_family(catalog: &Catalog, p1: &Protocol, p2: &Protocol) -> bool {
    let n1 = catalog.normalized_family_name(p1);
    let n2 = catalog.normalized_family_name(p2);
    let pair = (n1.as_str(), n2.as_str());
    matches!(pair, ("vleermuis", "zwaluw") | ("zwaluw", "vleermuis"))
}

fn parts_intersect(
    a: &Option<BTreeSet<PartOfDay>>,
    b: &Option<BTreeSet<PartOfDay>>,
) -> bool {
    match (a, b) {
        (Some(sa), Some(sb)) => !sa.is_disjoint(sb),
        _ => true,
    }
}

/// Full pairwise compatibility matrix.
///
/// Two requests are compatible when they come from different protocols,
/// their protocols are biologically compatible, their windows overlap at
/// least `min_effective_window_days`, and their daypart domains intersect.
pub fn build_compatibility(
    catalog: &Catalog,
    requests: &[VisitRequest],
    min_effective_window_days: i64,
) -> Vec<Vec<bool>> {
    let n = requests.len();
    let mut matrix = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let r1 = &requests[i];
            let r2 = &requests[j];
            if r1.protocol_id == r2.protocol_id {
                continue;
            }
            let (Some(p1), Some(p2)) =
                (catalog.protocol(r1.protocol_id), catalog.protocol(r2.protocol_id))
            else {
                continue;
            };
            if !bio_compatible(catalog, p1, p2) {
                continue;
            }
            let overlap =
                calendar::overlap_days(r1.window_from, r1.window_to, r2.window_from, r2.window_to);
            if overlap < min_effective_window_days {
                continue;
            }
            if !parts_intersect(&r1.part_options, &r2.part_options) {
                continue;
            }
            matrix[i][j] = true;
            matrix[j][i] = true;
        }
    }
    matrix
}
