//! Seasonal Planner.
//!
//! Assigns each open visit a provisional ISO week within the current year,
//! maximising a hierarchical objective (activation, urgency, priority,
//! sequencing slack, capacity overflow, intern/supervisor coverage,
//! project diversity, quadratic load smoothness) against aggregate
//! skill/daypart supply.
//!
//! The planner never assigns researchers; it only balances demand against
//! supply per skill bucket and writes `provisional_week`.

mod grid;
mod model;

pub use grid::build_capacity_grid;
pub use model::{SeasonModel, SeasonVisitVar};

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::availability::AvailabilityWeek;
use crate::models::catalog::Catalog;
use crate::models::user::{User, UserId};
use crate::models::visit::{Cluster, Visit, VisitId};

/// Objective weights, matching the planning model one to one.
pub(crate) const REWARD_ACTIVE: i64 = 100_000;
pub(crate) const REWARD_URGENT: i64 = 150_000;
pub(crate) const REWARD_PRIORITY: i64 = 50_000;
pub(crate) const PENALTY_OVERFLOW: i64 = 200_000;
pub(crate) const PENALTY_INTERN_SHORTFALL: i64 = 200_000;
pub(crate) const PENALTY_SUPERVISOR_SHORTFALL: i64 = 100;
pub(crate) const PENALTY_DIVERSITY: i64 = 10;
pub(crate) const PENALTY_SUCCESSOR_RISK: i64 = 500;
pub(crate) const PENALTY_WEEK_SLACK: i64 = 10;

const DEFAULT_BUDGET: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SeasonalError {
    /// Pinned weeks or sequencing constraints admit no solution.
    #[error("seasonal planning infeasible: {detail}")]
    Infeasible { detail: String },
}

pub struct SeasonalInput<'a> {
    pub start_date: NaiveDate,
    pub visits: &'a [Visit],
    pub clusters: &'a [Cluster],
    pub users: &'a [User],
    pub availability: &'a HashMap<(UserId, u32), AvailabilityWeek>,
}

#[derive(Debug)]
pub struct SeasonalOutcome {
    /// Chosen week per considered visit; `None` means left unplanned.
    pub assignments: BTreeMap<VisitId, Option<u32>>,
    pub objective: i64,
}

/// Write the outcome back onto the visits.
///
/// Locked visits that already carry a provisional week are untouched.
pub fn apply_outcome(visits: &mut [Visit], outcome: &SeasonalOutcome) {
    for v in visits.iter_mut() {
        if let Some(assignment) = outcome.assignments.get(&v.id) {
            if !v.provisional_locked || v.provisional_week.is_none() {
                v.provisional_week = *assignment;
            }
        }
    }
}

/// Run the seasonal planner with the default 30 second budget.
pub fn solve_season(
    catalog: &Catalog,
    input: &SeasonalInput<'_>,
) -> Result<SeasonalOutcome, SeasonalError> {
    solve_season_with_budget(catalog, input, DEFAULT_BUDGET)
}

pub fn solve_season_with_budget(
    catalog: &Catalog,
    input: &SeasonalInput<'_>,
    budget: Duration,
) -> Result<SeasonalOutcome, SeasonalError> {
    let started = Instant::now();
    let model = SeasonModel::build(catalog, input);
    debug!(
        vars = model.vars.len(),
        pairs = model.seq_pairs.len(),
        "seasonal: model built"
    );

    // Pinned assignments are hard; a pin outside the candidate domain (or
    // a pinned pair violating sequencing) makes the whole run infeasible.
    let mut assign: Vec<Option<u32>> = vec![None; model.vars.len()];
    for (i, var) in model.vars.iter().enumerate() {
        if let Some(week) = var.pinned {
            if !var.candidates.contains_key(&week) {
                return Err(SeasonalError::Infeasible {
                    detail: format!(
                        "visit {} is pinned to week {} outside its window",
                        var.visit_id, week
                    ),
                });
            }
            assign[i] = Some(week);
        }
    }
    for pair in &model.seq_pairs {
        if let (Some(w1), Some(w2)) = (assign[pair.earlier], assign[pair.later]) {
            if model.vars[pair.earlier].pinned.is_some()
                && model.vars[pair.later].pinned.is_some()
                && !seq_ok(w1, w2, pair.gap_weeks)
            {
                return Err(SeasonalError::Infeasible {
                    detail: format!(
                        "pinned visits {} and {} violate protocol sequencing",
                        model.vars[pair.earlier].visit_id, model.vars[pair.later].visit_id
                    ),
                });
            }
        }
    }

    // Greedy construction: earliest deadlines first, best-scoring week
    // (or unassigned) per visit.
    let mut order: Vec<usize> = (0..model.vars.len()).collect();
    order.sort_by_key(|&i| (model.vars[i].deadline_week.unwrap_or(u32::MAX), model.vars[i].visit_id));

    for &i in &order {
        if assign[i].is_some() {
            continue;
        }
        let (best_week, _) = best_choice(&model, &mut assign, i);
        assign[i] = best_week;
    }

    // Steepest-descent improvement until no move helps or the budget is
    // spent.
    let mut current = score(&model, &assign);
    loop {
        let mut improved = false;
        for &i in &order {
            if model.vars[i].pinned.is_some() {
                continue;
            }
            if started.elapsed() >= budget {
                break;
            }
            let before = assign[i];
            let (best, best_score) = best_choice(&model, &mut assign, i);
            if best_score > current && best != before {
                assign[i] = best;
                current = best_score;
                improved = true;
            } else {
                assign[i] = before;
            }
        }
        if !improved || started.elapsed() >= budget {
            break;
        }
    }

    let assignments: BTreeMap<VisitId, Option<u32>> = model
        .vars
        .iter()
        .enumerate()
        .map(|(i, var)| (var.visit_id, assign[i]))
        .collect();

    info!(
        objective = current,
        active = assign.iter().filter(|a| a.is_some()).count(),
        total = assign.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "seasonal: solved"
    );

    Ok(SeasonalOutcome { assignments, objective: current })
}

fn seq_ok(w_earlier: u32, w_later: u32, gap_weeks: i64) -> bool {
    if w_later <= w_earlier {
        return false;
    }
    i64::from(w_later) >= i64::from(w_earlier) + gap_weeks.max(0)
}

/// Candidate weeks for `i` that keep every sequencing pair satisfied
/// against the current assignment.
fn seq_feasible(model: &SeasonModel, assign: &[Option<u32>], i: usize, week: u32) -> bool {
    for pair in &model.seq_pairs {
        if pair.earlier == i {
            if let Some(w_later) = assign[pair.later] {
                if !seq_ok(week, w_later, pair.gap_weeks) {
                    return false;
                }
            }
        } else if pair.later == i {
            if let Some(w_earlier) = assign[pair.earlier] {
                if !seq_ok(w_earlier, week, pair.gap_weeks) {
                    return false;
                }
            }
        }
    }
    true
}

/// Best assignment (week or none) for one visit, by full objective.
///
/// `assign[i]` is left unchanged on return; the caller applies the choice.
fn best_choice(model: &SeasonModel, assign: &mut [Option<u32>], i: usize) -> (Option<u32>, i64) {
    let saved = assign[i];
    assign[i] = None;
    let mut best: Option<u32> = None;
    let mut best_score = score(model, assign);

    let weeks: Vec<u32> = model.vars[i].candidates.keys().copied().collect();
    for week in weeks {
        if !seq_feasible(model, assign, i, week) {
            continue;
        }
        assign[i] = Some(week);
        let s = score(model, assign);
        if s > best_score {
            best_score = s;
            best = Some(week);
        }
        assign[i] = None;
    }
    assign[i] = saved;
    (best, best_score)
}

/// Full objective evaluation of an assignment.
pub(crate) fn score(model: &SeasonModel, assign: &[Option<u32>]) -> i64 {
    let mut total: i64 = 0;

    let mut demand_skill: HashMap<(&str, u32), i64> = HashMap::new();
    let mut demand_skill_part: HashMap<(&str, u32, u8), i64> = HashMap::new();
    let mut demand_global: HashMap<u32, i64> = model.custom_global_demand.clone();
    let mut demand_global_part: HashMap<(u32, u8), i64> = model.custom_part_demand.clone();
    let mut intern_demand: HashMap<u32, i64> = HashMap::new();
    let mut supervisor_demand: HashMap<u32, i64> = HashMap::new();
    let mut load: HashMap<u32, i64> = HashMap::new();
    let mut project_counts: HashMap<(u32, i64), i64> = HashMap::new();

    for (i, var) in model.vars.iter().enumerate() {
        let Some(week) = assign[i] else { continue };
        total += REWARD_ACTIVE;
        if var.urgent {
            total += REWARD_URGENT;
        }
        if var.priority {
            total += REWARD_PRIORITY;
        }
        if var.count_slack {
            total -= PENALTY_WEEK_SLACK * i64::from(week);
        }

        let overlap = var.candidates.get(&week).copied().unwrap_or(1);
        let weight = crate::models::calendar::window_weight(overlap);
        let demand = var.required * weight;

        *demand_skill.entry((var.skill.as_str(), week)).or_default() += demand;
        *demand_global.entry(week).or_default() += demand;
        if let Some(part) = var.part_key {
            *demand_skill_part.entry((var.skill.as_str(), week, part)).or_default() += demand;
            *demand_global_part.entry((week, part)).or_default() += demand;
        }
        if var.sleutel {
            *intern_demand.entry(week).or_default() += weight;
        }
        if var.supervisor_demand {
            *supervisor_demand.entry(week).or_default() += weight;
        }
        *load.entry(week).or_default() += var.required;
        if let Some(pid) = var.project_id {
            *project_counts.entry((week, pid)).or_default() += 1;
        }
    }

    for ((skill, week), demand) in &demand_skill {
        let supply = model.skill_supply_total(skill, *week);
        total -= PENALTY_OVERFLOW * (demand - supply).max(0);
    }
    for ((skill, week, part), demand) in &demand_skill_part {
        let supply = model.skill_supply_part(skill, *week, *part);
        total -= PENALTY_OVERFLOW * (demand - supply).max(0);
    }
    for (week, demand) in &demand_global {
        let supply = model.global_supply.get(week).copied().unwrap_or(0);
        total -= PENALTY_OVERFLOW * (demand - supply).max(0);
    }
    for ((week, part), demand) in &demand_global_part {
        let supply = model.global_part_supply.get(&(*week, *part)).copied().unwrap_or(0);
        total -= PENALTY_OVERFLOW * (demand - supply).max(0);
    }
    for (week, demand) in &intern_demand {
        let supply = model.intern_supply.get(week).copied().unwrap_or(0);
        total -= PENALTY_INTERN_SHORTFALL * (demand - supply).max(0);
    }
    for (week, demand) in &supervisor_demand {
        let supply = model.supervisor_supply.get(week).copied().unwrap_or(0);
        total -= PENALTY_SUPERVISOR_SHORTFALL * (demand - supply).max(0);
    }
    for (_, count) in &project_counts {
        total -= PENALTY_DIVERSITY * (count - 1).max(0);
    }
    for (_, l) in &load {
        total -= (l * l) / 10;
    }

    for pair in &model.seq_pairs {
        if assign[pair.later].is_none() {
            continue;
        }
        let Some(w1) = assign[pair.earlier] else { continue };
        if let Some(latest) = pair.latest_allowed {
            total -= PENALTY_SUCCESSOR_RISK * (i64::from(w1) - latest).max(0);
        }
    }

    total
}
