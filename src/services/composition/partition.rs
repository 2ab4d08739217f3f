//! Greedy clique partition with dynamic delay propagation, followed by
//! group scheduling over the resulting dependency DAG.

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeSet, HashMap};

use crate::models::catalog::Catalog;
use crate::models::visit::PartOfDay;

use super::requests::VisitRequest;

/// Window length below which a request anchors merges regardless of the
/// start-spread cap.
const ANCHOR_WINDOW_DAYS: i64 = 35;
/// Start spread (days) beyond which the intersection thresholds apply.
const MAX_START_SPREAD_DAYS: i64 = 7;
const SPREAD_INTERSECTION_MIN: i64 = 50;
const SPREAD_INTERSECTION_MIN_WITH_PRED: i64 = 25;

/// A finalized clique of requests; becomes one visit.
#[derive(Debug, Clone)]
pub struct VisitGroup {
    pub request_indices: Vec<usize>,
    pub final_window_from: NaiveDate,
    pub final_window_to: NaiveDate,
    pub assigned_part: Option<PartOfDay>,
}

/// Map of request index -> successor request index (same protocol, next
/// visit index).
fn successor_map(requests: &[VisitRequest]) -> HashMap<usize, usize> {
    let mut by_key: HashMap<(i64, u32), usize> = HashMap::new();
    for (i, r) in requests.iter().enumerate() {
        by_key.insert((r.protocol_id, r.visit_index), i);
    }
    let mut map = HashMap::new();
    for (i, r) in requests.iter().enumerate() {
        if let Some(&succ) = by_key.get(&(r.protocol_id, r.visit_index + 1)) {
            map.insert(i, succ);
        }
    }
    map
}

/// Greedy seed-and-grow clique partition.
///
/// Seeds are unlocked requests ordered by dynamic effective start, then
/// remaining slack, then id. Candidates join when they stay compatible
/// with every member, keep the running intersection long enough, do not
/// pull their own predecessor into the clique, and survive the forward
/// feasibility lookahead for every member's successor.
pub fn partition_into_cliques(
    requests: &[VisitRequest],
    compat: &[Vec<bool>],
    min_effective_window_days: i64,
) -> Vec<VisitGroup> {
    let n = requests.len();
    let successors = successor_map(requests);

    let mut remaining: BTreeSet<usize> = (0..n).collect();
    let mut assigned_group: HashMap<usize, usize> = HashMap::new();
    // Group index -> effective start used for dynamic delay propagation.
    let mut group_start: Vec<NaiveDate> = Vec::new();
    let mut groups: Vec<VisitGroup> = Vec::new();

    while !remaining.is_empty() {
        let dynamic_start = |idx: usize,
                             assigned: &HashMap<usize, usize>,
                             group_start: &Vec<NaiveDate>|
         -> NaiveDate {
            let req = &requests[idx];
            let base = req.effective_window_from;
            if let Some((pred_idx, gap)) = req.predecessor {
                if let Some(&g_idx) = assigned.get(&pred_idx) {
                    let pred_start = group_start[g_idx];
                    return base.max(pred_start + Duration::days(gap));
                }
            }
            base
        };

        // Seed selection: unlocked requests first.
        let unlocked: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&idx| match requests[idx].predecessor {
                None => true,
                Some((pred_idx, _)) => assigned_group.contains_key(&pred_idx),
            })
            .collect();
        let pool: Vec<usize> = if unlocked.is_empty() {
            remaining.iter().copied().collect()
        } else {
            unlocked
        };

        let seed = *pool
            .iter()
            .min_by_key(|&&idx| {
                let start = dynamic_start(idx, &assigned_group, &group_start);
                let slack = (requests[idx].window_to - start).num_days();
                (start, slack, requests[idx].key())
            })
            .expect("pool is non-empty");

        let seed_start = dynamic_start(seed, &assigned_group, &group_start);
        let mut clique: Vec<usize> = vec![seed];
        let mut max_start = seed_start;
        let mut min_start = seed_start;
        let mut min_end = requests[seed].window_to;

        let mut candidates: Vec<usize> =
            remaining.iter().copied().filter(|&idx| idx != seed).collect();
        candidates.sort_by_key(|&idx| {
            let start = dynamic_start(idx, &assigned_group, &group_start);
            (
                if compat[seed][idx] { 0 } else { 1 },
                (start - max_start).num_days().abs(),
                requests[idx].window_len_days(),
                requests[idx].key(),
            )
        });

        for cand in candidates {
            let cand_req = &requests[cand];

            // Predecessor and successor of one protocol can never share a
            // visit event; an unassigned predecessor locks the candidate.
            if let Some((pred_idx, _)) = cand_req.predecessor {
                if clique.contains(&pred_idx) {
                    continue;
                }
                if !assigned_group.contains_key(&pred_idx) {
                    continue;
                }
            }

            if !clique.iter().all(|&m| compat[m][cand]) {
                continue;
            }

            let cand_start = dynamic_start(cand, &assigned_group, &group_start);
            let new_max_start = max_start.max(cand_start);
            let new_min_start = min_start.min(cand_start);
            let new_min_end = min_end.min(cand_req.window_to);
            let intersection = (new_min_end - new_max_start).num_days();
            if intersection < min_effective_window_days {
                continue;
            }

            // A very short window anywhere in the merge is an anchor: take
            // the merge even when it drags earlier starts.
            let has_anchor = cand_req.window_len_days() < ANCHOR_WINDOW_DAYS
                || clique
                    .iter()
                    .any(|&m| requests[m].window_len_days() < ANCHOR_WINDOW_DAYS);

            let spread = (new_max_start - new_min_start).num_days();
            let threshold = if cand_req.predecessor.is_some() {
                SPREAD_INTERSECTION_MIN_WITH_PRED
            } else {
                SPREAD_INTERSECTION_MIN
            };
            if !has_anchor && spread > MAX_START_SPREAD_DAYS && intersection < threshold {
                continue;
            }

            // Forward feasibility: merging must leave every member's
            // successor a reachable window.
            let mut feasible = true;
            for &member in clique.iter().chain(std::iter::once(&cand)) {
                if let Some(&succ) = successors.get(&member) {
                    let gap = requests[succ].predecessor.map(|(_, g)| g).unwrap_or(0);
                    let projected = new_max_start + Duration::days(gap);
                    if projected > requests[succ].window_to {
                        feasible = false;
                        break;
                    }
                }
            }
            if !feasible {
                continue;
            }

            clique.push(cand);
            max_start = new_max_start;
            min_start = new_min_start;
            min_end = new_min_end;
        }

        let group_idx = groups.len();
        for &idx in &clique {
            assigned_group.insert(idx, group_idx);
            remaining.remove(&idx);
        }
        group_start.push(max_start);
        groups.push(VisitGroup {
            request_indices: clique,
            final_window_from: max_start,
            final_window_to: min_end,
            assigned_part: None,
        });
    }

    groups
}

/// Finalise group windows along the dependency order and choose a part of
/// day per group.
///
/// Returns the index of a group whose window collapsed (`from > to`), if
/// any; the caller treats that as an infeasible composition.
pub fn schedule_groups(
    catalog: &Catalog,
    requests: &[VisitRequest],
    groups: &mut [VisitGroup],
) -> Option<usize> {
    let mut req_to_group: HashMap<usize, usize> = HashMap::new();
    for (g_idx, g) in groups.iter().enumerate() {
        for &r in &g.request_indices {
            req_to_group.insert(r, g_idx);
        }
    }

    // Group dependency edges from request predecessors.
    let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); groups.len()];
    for (g_idx, g) in groups.iter().enumerate() {
        for &r in &g.request_indices {
            if let Some((pred_idx, _)) = requests[r].predecessor {
                let pred_group = req_to_group[&pred_idx];
                if pred_group != g_idx {
                    deps[g_idx].insert(pred_group);
                }
            }
        }
    }

    // Topological order (depth-first; the predecessor structure is acyclic
    // because visit indices strictly increase along a protocol).
    let mut order: Vec<usize> = Vec::with_capacity(groups.len());
    let mut visited = vec![false; groups.len()];
    fn visit_dfs(
        g: usize,
        deps: &[BTreeSet<usize>],
        visited: &mut [bool],
        order: &mut Vec<usize>,
    ) {
        if visited[g] {
            return;
        }
        visited[g] = true;
        for &d in &deps[g] {
            visit_dfs(d, deps, visited, order);
        }
        order.push(g);
    }
    for g in 0..groups.len() {
        visit_dfs(g, &deps, &mut visited, &mut order);
    }

    let mut infeasible = None;
    for &g_idx in &order {
        let members = groups[g_idx].request_indices.clone();
        let mut wf = members
            .iter()
            .map(|&r| requests[r].window_from)
            .max()
            .expect("group has members");
        let wt = members
            .iter()
            .map(|&r| requests[r].window_to)
            .min()
            .expect("group has members");

        for &r in &members {
            if let Some((pred_idx, gap)) = requests[r].predecessor {
                let pred_group = req_to_group[&pred_idx];
                if pred_group != g_idx {
                    let earliest = groups[pred_group].final_window_from + Duration::days(gap);
                    if earliest > wf {
                        wf = earliest;
                    }
                }
            }
        }

        if wf > wt && infeasible.is_none() {
            infeasible = Some(g_idx);
        }

        groups[g_idx].final_window_from = wf;
        groups[g_idx].final_window_to = wt;
        groups[g_idx].assigned_part = choose_part(catalog, requests, &members);
    }

    infeasible
}

/// Intersect the members' daypart domains and pick one.
///
/// Paarverblijf groups prefer the evening; everything else prefers the
/// morning.
fn choose_part(
    catalog: &Catalog,
    requests: &[VisitRequest],
    members: &[usize],
) -> Option<PartOfDay> {
    let mut common: Option<BTreeSet<PartOfDay>> = None;
    for &r in members {
        let Some(opts) = &requests[r].part_options else { continue };
        common = Some(match common.take() {
            None => opts.clone(),
            Some(mut acc) => {
                acc.retain(|p| opts.contains(p));
                acc
            }
        });
    }
    // All members unconstrained: leave the part undecided.
    let common = common?;
    if common.is_empty() {
        return None;
    }

    let has_paarverblijf = members.iter().any(|&r| {
        catalog
            .protocol(requests[r].protocol_id)
            .and_then(|p| catalog.function_of(p))
            .map(|f| f.name == "Paarverblijf")
            .unwrap_or(false)
    });

    let preference = if has_paarverblijf {
        [PartOfDay::Avond, PartOfDay::Ochtend, PartOfDay::Dag]
    } else {
        [PartOfDay::Ochtend, PartOfDay::Avond, PartOfDay::Dag]
    };
    preference.iter().copied().find(|p| common.contains(p))
}
