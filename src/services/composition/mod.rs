//! Visit Composition Solver.
//!
//! Turns a set of protocols targeted at one cluster into the minimum set
//! of compound visit events that covers every required protocol visit
//! window, respecting biological compatibility, sequencing gaps,
//! minimum-effective-window and part-of-day rules.
//!
//! Pipeline:
//! 1. request generation (node explosion)
//! 2. compatibility graph
//! 3. greedy clique partition with dynamic delay propagation
//! 4. group scheduling (topological walk, window propagation)
//! 5. visit construction

mod partition;
mod properties;
mod requests;

pub use partition::VisitGroup;
pub use properties::{
    end_time_minutes, extract_whitelisted_remarks, start_time_minutes, start_time_text_for,
    strictest_precipitation,
};
pub use requests::{bio_compatible, build_compatibility, generate_requests, VisitRequest};

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::catalog::{Catalog, ProtocolId};
use crate::models::visit::{Cluster, Visit, VisitStatus};
use crate::settings::SolverSettings;

#[derive(Debug, Error)]
pub enum CompositionError {
    /// The constraint system has no clique cover within the windows.
    #[error("visit composition infeasible: {detail}")]
    Infeasible { detail: String },
    #[error("unknown protocol id {0}")]
    UnknownProtocol(ProtocolId),
}

/// Defaults applied to every visit produced by one composition run.
#[derive(Debug, Clone, Default)]
pub struct CompositionDefaults {
    pub required_researchers: Option<u32>,
    pub expertise_level: Option<crate::models::user::BatExperience>,
    pub wbc: bool,
    pub fiets: bool,
    pub hub: bool,
    pub dvp: bool,
    pub sleutel: bool,
    pub remarks_field: Option<String>,
}

#[derive(Debug)]
pub struct CompositionOutcome {
    pub visits: Vec<Visit>,
    pub warnings: Vec<String>,
}

/// Compose visits for a cluster from the given protocols.
///
/// Every required `(protocol, visit_index)` window ends up covered by
/// exactly one emitted visit. Visit numbering starts at `next_visit_nr`
/// and follows the chronological order of the emitted events; a fresh
/// `group_id` marks the cohort.
pub fn compose(
    catalog: &Catalog,
    cluster: &Cluster,
    protocol_ids: &[ProtocolId],
    today: NaiveDate,
    next_visit_nr: u32,
    defaults: &CompositionDefaults,
    settings: &SolverSettings,
) -> Result<CompositionOutcome, CompositionError> {
    for pid in protocol_ids {
        if catalog.protocol(*pid).is_none() {
            return Err(CompositionError::UnknownProtocol(*pid));
        }
    }
    if protocol_ids.is_empty() {
        return Ok(CompositionOutcome { visits: vec![], warnings: vec![] });
    }

    let mut warnings = Vec::new();
    let year = today.year();

    let requests = generate_requests(catalog, protocol_ids, year, &mut warnings);
    debug!(
        cluster = cluster.id,
        requests = requests.len(),
        protocols = protocol_ids.len(),
        "composition: generated requests"
    );
    if requests.is_empty() {
        return Ok(CompositionOutcome { visits: vec![], warnings });
    }

    // A request whose effective start already exceeds its window end can
    // never be covered.
    for r in &requests {
        if r.effective_window_from > r.window_to {
            return Err(CompositionError::Infeasible {
                detail: format!(
                    "protocol {} visit {} cannot start before its window closes",
                    r.protocol_id, r.visit_index
                ),
            });
        }
    }

    let compat = build_compatibility(catalog, &requests, settings.min_effective_window_days);
    let mut groups =
        partition::partition_into_cliques(&requests, &compat, settings.min_effective_window_days);
    debug!(cluster = cluster.id, groups = groups.len(), "composition: partitioned");

    if let Some(bad) = partition::schedule_groups(catalog, &requests, &mut groups) {
        let members: Vec<String> = groups[bad]
            .request_indices
            .iter()
            .map(|&r| format!("p{}v{}", requests[r].protocol_id, requests[r].visit_index))
            .collect();
        return Err(CompositionError::Infeasible {
            detail: format!(
                "dependency gaps push visit [{}] out of its window",
                members.join(", ")
            ),
        });
    }

    for g in &groups {
        let len = (g.final_window_to - g.final_window_from).num_days();
        if len < settings.min_effective_window_days {
            warnings.push(format!(
                "tight window: visit {}..{} spans only {} days",
                g.final_window_from, g.final_window_to, len
            ));
        }
    }

    let visits = construct_visits(catalog, cluster, &requests, groups, next_visit_nr, defaults);
    info!(
        cluster = cluster.id,
        visits = visits.len(),
        warnings = warnings.len(),
        "composition: done"
    );
    Ok(CompositionOutcome { visits, warnings })
}

fn construct_visits(
    catalog: &Catalog,
    cluster: &Cluster,
    requests: &[VisitRequest],
    mut groups: Vec<VisitGroup>,
    next_visit_nr: u32,
    defaults: &CompositionDefaults,
) -> Vec<Visit> {
    // Chronological numbering: window start, then earliest member window,
    // then part-of-day rank.
    groups.sort_by_key(|g| {
        let series_start = g
            .request_indices
            .iter()
            .map(|&r| requests[r].window_from)
            .min()
            .expect("group has members");
        let part_rank = g.assigned_part.map(|p| p.rank()).unwrap_or(3);
        (g.final_window_from, series_start, part_rank)
    });

    let series_group_id = Uuid::new_v4();
    let mut visits = Vec::with_capacity(groups.len());
    let mut visit_nr = next_visit_nr;

    for g in &groups {
        let mut members: Vec<usize> = g.request_indices.clone();
        members.sort_by_key(|&r| requests[r].key());

        // Deduplicate protocols preserving member order.
        let mut protocol_ids: Vec<ProtocolId> = Vec::new();
        let mut visit_indices: BTreeMap<i64, u32> = BTreeMap::new();
        for &r in &members {
            let req = &requests[r];
            if !protocol_ids.contains(&req.protocol_id) {
                protocol_ids.push(req.protocol_id);
            }
            visit_indices.insert(req.protocol_id, req.visit_index);
        }
        let protocols: Vec<_> = protocol_ids
            .iter()
            .filter_map(|pid| catalog.protocol(*pid))
            .collect();

        // Weather floor: warmest minimum, calmest maximum, strictest rain.
        let min_temp = protocols.iter().filter_map(|p| p.min_temperature_celsius).max();
        let max_wind = protocols.iter().filter_map(|p| p.max_wind_force_bft).min();
        let precip_options: Vec<&str> = protocols
            .iter()
            .filter_map(|p| p.max_precipitation.as_deref())
            .collect();
        let max_precipitation = strictest_precipitation(&precip_options);

        let timing = properties::derive_timing(catalog, &protocols, g.assigned_part, &visit_indices);
        let mut start_time_text = timing.start_time_text;

        // RD Paarverblijf visit 1 always reads as a midnight start.
        let has_rd_paar_v1 = members.iter().any(|&r| {
            let req = &requests[r];
            req.visit_index == 1
                && catalog.protocol(req.protocol_id).is_some_and(|p| {
                    catalog.function_of(p).map(|f| f.name == "Paarverblijf").unwrap_or(false)
                        && catalog
                            .species_of(p)
                            .map(|s| s.abbreviation.as_deref() == Some("RD"))
                            .unwrap_or(false)
                })
        });
        if has_rd_paar_v1 {
            start_time_text = Some("00:00".to_string());
        }

        let remark_texts: Vec<&str> = protocols
            .iter()
            .filter_map(|p| p.visit_conditions_text.as_deref())
            .collect();
        let remarks = extract_whitelisted_remarks(&remark_texts);
        let remarks_planning =
            if remarks.is_empty() { None } else { Some(remarks.join(" | ")) };
        let remarks_field = defaults
            .remarks_field
            .clone()
            .or_else(|| build_field_remarks(catalog, requests, &members));

        // Relations deduplicated in member order.
        let mut function_ids = Vec::new();
        let mut species_ids = Vec::new();
        for p in &protocols {
            if !function_ids.contains(&p.function_id) {
                function_ids.push(p.function_id);
            }
            if !species_ids.contains(&p.species_id) {
                species_ids.push(p.species_id);
            }
        }

        visits.push(Visit {
            id: 0,
            cluster_id: cluster.id,
            group_id: Some(series_group_id),
            visit_nr,
            from_date: g.final_window_from,
            to_date: g.final_window_to,
            duration_minutes: timing.duration_minutes,
            part_of_day: g.assigned_part,
            start_time_text,
            required_researchers: defaults.required_researchers.unwrap_or(1),
            expertise_level: defaults.expertise_level,
            min_temperature_celsius: min_temp,
            max_wind_force_bft: max_wind,
            max_precipitation,
            wbc: defaults.wbc,
            fiets: defaults.fiets,
            hub: defaults.hub,
            dvp: defaults.dvp,
            sleutel: defaults.sleutel,
            vog: false,
            requires_morning_visit: protocols.iter().any(|p| p.requires_morning_visit),
            requires_evening_visit: protocols.iter().any(|p| p.requires_evening_visit),
            requires_june_visit: protocols.iter().any(|p| p.requires_june_visit),
            requires_maternity_period_visit: protocols
                .iter()
                .any(|p| p.requires_maternity_period_visit),
            remarks_planning,
            remarks_field,
            provisional_week: None,
            provisional_locked: false,
            planned_week: None,
            planned_date: None,
            priority: false,
            custom_function_name: None,
            custom_species_name: None,
            status: VisitStatus::Open,
            function_ids,
            species_ids,
            protocol_visit_window_ids: members.iter().map(|&r| requests[r].pvw_id).collect(),
            researcher_ids: vec![],
        });
        visit_nr += 1;
    }

    visits
}

/// Field remarks: species grouped per function with the covered visit
/// indices, e.g. `Paarverblijf: GD (1/2), MV (1)`.
fn build_field_remarks(
    catalog: &Catalog,
    requests: &[VisitRequest],
    members: &[usize],
) -> Option<String> {
    let mut fn_map: BTreeMap<String, BTreeMap<String, Vec<u32>>> = BTreeMap::new();
    for &r in members {
        let req = &requests[r];
        let p = catalog.protocol(req.protocol_id)?;
        let fn_name = catalog.function_of(p)?.name.clone();
        let sp = catalog.species_of(p)?;
        let sp_label = sp.abbreviation.clone().unwrap_or_else(|| sp.name.clone());
        fn_map.entry(fn_name).or_default().entry(sp_label).or_default().push(req.visit_index);
    }
    if fn_map.is_empty() {
        return None;
    }
    let mut lines = Vec::new();
    for (fn_name, sp_map) in fn_map {
        let entries: Vec<String> = sp_map
            .into_iter()
            .map(|(sp, mut idxs)| {
                idxs.sort_unstable();
                let idxs: Vec<String> = idxs.iter().map(|i| i.to_string()).collect();
                format!("{} ({})", sp, idxs.join("/"))
            })
            .collect();
        lines.push(format!("{}: {}", fn_name, entries.join(", ")));
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
