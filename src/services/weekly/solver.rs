//! Weekly assignment search.
//!
//! Greedy first-fit construction in priority order followed by bounded
//! improvement moves (schedule, re-day, swap) over the weighted
//! objective, with a solution-quality gate on the optimistic bound.

use chrono::{Duration as ChronoDuration, NaiveDate};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::availability::CapacityBuckets;
use crate::models::catalog::{normalize_family_name, Catalog};
use crate::models::user::{Language, User, UserId};
use crate::models::visit::{ClusterId, PartOfDay, Visit, VisitId};
use crate::settings::SolverSettings;

use super::eligibility::allowed_day_indices;

const BASE_REWARD: i64 = 10_000;
const RANK_STEP: i64 = 100;
const TRAVEL_TIME_WEIGHT: i64 = 2;
const LOAD_BALANCE_WEIGHT: i64 = 1;
const LARGE_TEAM_THRESHOLD: u32 = 3;
const LARGE_TEAM_PENALTY: i64 = 60;
const COUPLING_PENALTY: i64 = 30;
const PROJECT_DIVERSITY_PENALTY: i64 = 10;
const LANGUAGE_TEAMING_PENALTY: i64 = 50;
const DAILY_SPREAD_PENALTY: i64 = 25;
/// Consecutive dayparts require clusters within this many travel minutes.
const CONSECUTIVE_TRAVEL_LIMIT: i64 = 30;

#[derive(Debug, Error)]
pub enum PlanningRunError {
    #[error("weekly planning produced no feasible solution")]
    NoFeasibleSolution,
    #[error("weekly planning solution rejected: quality=WEAK gap={gap:.4}")]
    WeakSolution { gap: f64 },
}

/// Quality classification of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionQuality {
    Optimal,
    Excellent,
    Good,
    Ok,
    Weak,
}

impl SolutionQuality {
    fn classify(optimal: bool, gap: f64) -> Self {
        if optimal {
            SolutionQuality::Optimal
        } else if gap <= 0.01 {
            SolutionQuality::Excellent
        } else if gap <= 0.05 {
            SolutionQuality::Good
        } else if gap <= 0.15 {
            SolutionQuality::Ok
        } else {
            SolutionQuality::Weak
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisitAssignment {
    pub visit_id: VisitId,
    pub day: NaiveDate,
    pub researcher_ids: Vec<UserId>,
}

#[derive(Debug)]
pub struct WeeklyOutcome {
    pub selected: Vec<VisitAssignment>,
    pub skipped_visit_ids: Vec<VisitId>,
    pub objective: i64,
    pub bound: i64,
    pub gap: f64,
    pub quality: SolutionQuality,
}

pub struct WeeklyContext<'a> {
    pub catalog: &'a Catalog,
    pub settings: &'a SolverSettings,
    pub week_monday: NaiveDate,
    /// Eligible visits in descending priority order.
    pub visits: Vec<&'a Visit>,
    /// Non-deleted researchers in id order.
    pub users: Vec<&'a User>,
    pub weekly_caps: HashMap<UserId, u32>,
    pub daypart_caps: HashMap<UserId, CapacityBuckets>,
    /// Researcher-to-cluster driving minutes; absent pairs are unknown.
    pub travel_minutes: HashMap<(VisitId, UserId), i64>,
    /// Cluster-to-cluster driving minutes for consecutive dayparts.
    pub cluster_travel: HashMap<(ClusterId, ClusterId), i64>,
    /// Cluster -> project, for the diversity penalty.
    pub project_by_cluster: HashMap<ClusterId, i64>,
}

/// Per-visit schedule decision: chosen weekday and team (user indices).
type Schedule = Vec<Option<(usize, Vec<usize>)>>;

pub fn solve_week(ctx: &WeeklyContext<'_>) -> Result<WeeklyOutcome, PlanningRunError> {
    let started = Instant::now();
    let n_visits = ctx.visits.len();
    let n_users = ctx.users.len();
    let complexity = (n_visits * n_users) as f64;
    let timeout = Duration::from_secs_f64((complexity * 0.008).clamp(5.0, 45.0));
    let deadline = started + timeout;

    let model = Model::build(ctx);
    let mut schedule: Schedule = vec![None; n_visits];

    // Greedy first-fit in priority order.
    for v in 0..n_visits {
        'days: for &day in &model.allowed_days[v] {
            let mut team = Vec::new();
            for u in 0..n_users {
                if model.can_assign(&schedule, v, day, u, &team) {
                    team.push(u);
                    if team.len() as u32 == model.required[v] {
                        schedule[v] = Some((day, team));
                        break 'days;
                    }
                }
            }
        }
    }

    let mut current = model.score(&schedule);
    debug!(objective = current, "weekly: greedy construction done");

    // Improvement sweeps until stable or out of budget.
    loop {
        let mut improved = false;

        // Try to schedule skipped visits.
        for v in 0..n_visits {
            if schedule[v].is_some() || Instant::now() >= deadline {
                continue;
            }
            if let Some((day, team, s)) = model.best_placement(&schedule, v, current) {
                schedule[v] = Some((day, team));
                current = s;
                improved = true;
            }
        }

        // Move a visit to a different weekday.
        for v in 0..n_visits {
            if Instant::now() >= deadline {
                break;
            }
            let Some((day, team)) = schedule[v].clone() else { continue };
            for &alt in &model.allowed_days[v] {
                if alt == day {
                    continue;
                }
                schedule[v] = None;
                if team.iter().all(|&u| model.can_assign_team_member(&schedule, v, alt, u, &team)) {
                    schedule[v] = Some((alt, team.clone()));
                    let s = model.score(&schedule);
                    if s > current {
                        current = s;
                        improved = true;
                        break;
                    }
                }
                schedule[v] = Some((day, team.clone()));
            }
        }

        // Swap one researcher for an unused qualified one.
        for v in 0..n_visits {
            if Instant::now() >= deadline {
                break;
            }
            let Some((day, team)) = schedule[v].clone() else { continue };
            'slots: for slot in 0..team.len() {
                for u in 0..n_users {
                    if team.contains(&u) {
                        continue;
                    }
                    let mut candidate = team.clone();
                    candidate.remove(slot);
                    schedule[v] = None;
                    let ok = model.can_assign(&schedule, v, day, u, &candidate);
                    if ok {
                        candidate.insert(slot, u);
                        schedule[v] = Some((day, candidate));
                        let s = model.score(&schedule);
                        if s > current {
                            current = s;
                            improved = true;
                            break 'slots;
                        }
                    }
                    schedule[v] = Some((day, team.clone()));
                }
            }
        }

        if !improved || Instant::now() >= deadline {
            break;
        }
    }

    let objective = current;
    let bound = model.optimistic_bound();
    let scheduled_count = schedule.iter().filter(|s| s.is_some()).count();
    let gap = ((bound - objective) as f64 / (bound.abs().max(1)) as f64).max(0.0);
    let quality = SolutionQuality::classify(objective >= bound, gap);
    let elapsed = started.elapsed();
    let time_limit_reached = elapsed.as_secs_f64() >= timeout.as_secs_f64() * 0.99;

    info!(
        visits = n_visits,
        users = n_users,
        scheduled = scheduled_count,
        objective,
        bound,
        gap,
        quality = ?quality,
        elapsed_ms = elapsed.as_millis() as u64,
        limit_s = timeout.as_secs_f64(),
        "weekly: solved"
    );

    if quality == SolutionQuality::Weak && time_limit_reached {
        return Err(PlanningRunError::WeakSolution { gap });
    }

    let mut selected = Vec::new();
    let mut skipped = Vec::new();
    for (v, slot) in schedule.iter().enumerate() {
        match slot {
            Some((day, team)) => selected.push(VisitAssignment {
                visit_id: ctx.visits[v].id,
                day: ctx.week_monday + ChronoDuration::days(*day as i64),
                researcher_ids: team.iter().map(|&u| ctx.users[u].id).collect(),
            }),
            None => skipped.push(ctx.visits[v].id),
        }
    }

    Ok(WeeklyOutcome { selected, skipped_visit_ids: skipped, objective, bound, gap, quality })
}

/// Precomputed immutable solver model.
struct Model<'a> {
    ctx: &'a WeeklyContext<'a>,
    allowed_days: Vec<Vec<usize>>,
    qualified: Vec<Vec<bool>>,
    base_reward: Vec<i64>,
    required: Vec<u32>,
    part: Vec<PartOfDay>,
    is_large: Vec<bool>,
    coupling_relevant: Vec<bool>,
    max_visits_per_day: u32,
}

impl<'a> Model<'a> {
    fn build(ctx: &'a WeeklyContext<'a>) -> Self {
        let n = ctx.visits.len();
        let max_travel = i64::from(ctx.settings.constraint_max_travel_time_minutes);

        let allowed_days = ctx
            .visits
            .iter()
            .map(|v| allowed_day_indices(ctx.week_monday, v))
            .collect();

        let qualified = ctx
            .visits
            .iter()
            .map(|v| {
                ctx.users
                    .iter()
                    .map(|u| {
                        if !super::qualification::qualifies_user_for_visit(ctx.catalog, u, v) {
                            return false;
                        }
                        // Hard travel cut.
                        match ctx.travel_minutes.get(&(v.id, u.id)) {
                            Some(&minutes) => minutes <= max_travel,
                            None => true,
                        }
                    })
                    .collect()
            })
            .collect();

        let base_reward = (0..n)
            .map(|rank| BASE_REWARD + (n as i64 - rank as i64) * RANK_STEP)
            .collect();

        let coupling_relevant = ctx
            .visits
            .iter()
            .map(|v| {
                v.required_researchers > 1
                    && v.species_ids
                        .first()
                        .and_then(|id| ctx.catalog.family_of_species(*id))
                        .map(|f| normalize_family_name(&f.name) == "vleermuis")
                        .unwrap_or(false)
            })
            .collect();

        Self {
            allowed_days,
            qualified,
            base_reward,
            required: ctx.visits.iter().map(|v| v.required_researchers.max(1)).collect(),
            part: ctx
                .visits
                .iter()
                .map(|v| v.part_of_day.expect("eligible visits carry a part of day"))
                .collect(),
            is_large: ctx
                .visits
                .iter()
                .map(|v| v.required_researchers >= LARGE_TEAM_THRESHOLD)
                .collect(),
            coupling_relevant,
            max_visits_per_day: if ctx.settings.feature_strict_availability { 2 } else { 1 },
            ctx,
        }
    }

    fn user_load(&self, schedule: &Schedule, u: usize) -> u32 {
        schedule
            .iter()
            .filter(|slot| matches!(slot, Some((_, team)) if team.contains(&u)))
            .count() as u32
    }

    /// Whether `u` can join visit `v` on `day` given the partial team.
    fn can_assign(&self, schedule: &Schedule, v: usize, day: usize, u: usize, team: &[usize]) -> bool {
        if !self.qualified[v][u] || team.contains(&u) {
            return false;
        }
        self.can_assign_team_member(schedule, v, day, u, team)
    }

    /// Capacity and coordination checks for one member (assumes
    /// qualification already verified).
    fn can_assign_team_member(
        &self,
        schedule: &Schedule,
        v: usize,
        day: usize,
        u: usize,
        _team: &[usize],
    ) -> bool {
        let user = self.ctx.users[u];
        let cap = self.ctx.weekly_caps.get(&user.id).copied().unwrap_or(0);
        if self.user_load(schedule, u) >= cap {
            return false;
        }

        // Per-day uniqueness.
        let day_count = schedule
            .iter()
            .filter(|slot| matches!(slot, Some((d, team)) if *d == day && team.contains(&u)))
            .count() as u32;
        if day_count >= self.max_visits_per_day {
            return false;
        }

        // Daypart buckets: dedicated plus flex must cover every part.
        let caps = self.ctx.daypart_caps.get(&user.id).copied().unwrap_or_default();
        let mut counts = [0u32; 3];
        counts[part_index(self.part[v])] += 1;
        for (w, slot) in schedule.iter().enumerate() {
            if let Some((_, team)) = slot {
                if team.contains(&u) {
                    counts[part_index(self.part[w])] += 1;
                }
            }
        }
        let flex_needed: u32 = [
            counts[0].saturating_sub(caps.morning),
            counts[1].saturating_sub(caps.daytime),
            counts[2].saturating_sub(caps.evening),
        ]
        .iter()
        .sum();
        if flex_needed > caps.flex {
            return false;
        }

        // Consecutive-daypart proximity (strict availability mode).
        if self.ctx.settings.feature_strict_availability
            && self.ctx.settings.constraint_consecutive_travel_penalty
            && !self.consecutive_travel_ok(schedule, v, day, u)
        {
            return false;
        }

        true
    }

    fn consecutive_travel_ok(&self, schedule: &Schedule, v: usize, day: usize, u: usize) -> bool {
        let part_v = self.part[v];
        let cluster_v = self.ctx.visits[v].cluster_id;
        for (w, slot) in schedule.iter().enumerate() {
            let Some((day_w, team)) = slot else { continue };
            if !team.contains(&u) {
                continue;
            }
            let part_w = self.part[w];
            let cluster_w = self.ctx.visits[w].cluster_id;
            let pair = if *day_w == day {
                match (part_v, part_w) {
                    (PartOfDay::Ochtend, PartOfDay::Dag)
                    | (PartOfDay::Dag, PartOfDay::Avond) => Some((cluster_v, cluster_w)),
                    (PartOfDay::Dag, PartOfDay::Ochtend)
                    | (PartOfDay::Avond, PartOfDay::Dag) => Some((cluster_w, cluster_v)),
                    _ => None,
                }
            } else if *day_w == day + 1 && part_v == PartOfDay::Avond && part_w == PartOfDay::Ochtend
            {
                Some((cluster_v, cluster_w))
            } else if day == *day_w + 1
                && part_w == PartOfDay::Avond
                && part_v == PartOfDay::Ochtend
            {
                Some((cluster_w, cluster_v))
            } else {
                None
            };

            if let Some(key) = pair {
                if let Some(&minutes) = self.ctx.cluster_travel.get(&key) {
                    if minutes > CONSECUTIVE_TRAVEL_LIMIT {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Best feasible `(day, team)` for an unscheduled visit, if any
    /// strictly improves the objective.
    fn best_placement(
        &self,
        schedule: &Schedule,
        v: usize,
        current: i64,
    ) -> Option<(usize, Vec<usize>, i64)> {
        let mut best: Option<(usize, Vec<usize>, i64)> = None;
        let mut trial = schedule.to_vec();
        for &day in &self.allowed_days[v] {
            // Candidates cheapest-travel first, then id order.
            let mut candidates: Vec<usize> = (0..self.ctx.users.len())
                .filter(|&u| self.qualified[v][u])
                .collect();
            candidates.sort_by_key(|&u| {
                let travel = self
                    .ctx
                    .travel_minutes
                    .get(&(self.ctx.visits[v].id, self.ctx.users[u].id))
                    .copied()
                    .unwrap_or(0);
                (travel, self.ctx.users[u].id)
            });

            let mut team = Vec::new();
            for u in candidates {
                if self.can_assign(schedule, v, day, u, &team) {
                    team.push(u);
                    if team.len() as u32 == self.required[v] {
                        break;
                    }
                }
            }
            if team.len() as u32 != self.required[v] {
                continue;
            }
            trial[v] = Some((day, team.clone()));
            let s = self.score(&trial);
            trial[v] = None;
            let beats = best.as_ref().map(|(_, _, bs)| s > *bs).unwrap_or(s > current);
            if beats {
                best = Some((day, team, s));
            }
        }
        best
    }

    /// Optimistic bound: every visit scheduled, no penalties.
    fn optimistic_bound(&self) -> i64 {
        self.base_reward.iter().sum()
    }

    /// Full objective evaluation.
    fn score(&self, schedule: &Schedule) -> i64 {
        let ctx = self.ctx;
        let mut total = 0i64;

        let mut user_loads: HashMap<usize, i64> = HashMap::new();
        let mut user_large: HashMap<usize, i64> = HashMap::new();
        let mut user_projects: HashMap<(usize, i64), i64> = HashMap::new();

        for (v, slot) in schedule.iter().enumerate() {
            let Some((_, team)) = slot else { continue };
            total += self.base_reward[v];

            let mut has_supervised = false;
            let mut has_supervisor = false;
            let mut has_en = false;
            let mut has_nl = false;

            for &u in team {
                let user = ctx.users[u];
                if let Some(&minutes) = ctx.travel_minutes.get(&(ctx.visits[v].id, user.id)) {
                    total -= TRAVEL_TIME_WEIGHT * minutes;
                }
                *user_loads.entry(u).or_default() += 1;
                if self.is_large[v] {
                    *user_large.entry(u).or_default() += 1;
                }
                if let Some(&project) = ctx.project_by_cluster.get(&ctx.visits[v].cluster_id) {
                    *user_projects.entry((u, project)).or_default() += 1;
                }
                if user.needs_supervision() {
                    has_supervised = true;
                }
                if user.is_supervisor() {
                    has_supervisor = true;
                }
                match user.language {
                    Language::En => has_en = true,
                    Language::Nl => has_nl = true,
                }
            }

            if self.coupling_relevant[v] && has_supervised && !has_supervisor {
                total -= COUPLING_PENALTY;
            }
            if ctx.settings.constraint_english_dutch_teaming && has_en && !has_nl {
                total -= LANGUAGE_TEAMING_PENALTY;
            }
        }

        for (&u, &load) in &user_loads {
            let cap = i64::from(ctx.weekly_caps.get(&ctx.users[u].id).copied().unwrap_or(5).max(1));
            let weighted = LOAD_BALANCE_WEIGHT * 5 / cap;
            total -= weighted * load * load;
        }

        if ctx.settings.constraint_large_team_penalty {
            for (_, &count) in &user_large {
                total -= LARGE_TEAM_PENALTY * (count - 1).max(0);
            }
        }

        for (_, &count) in &user_projects {
            total -= PROJECT_DIVERSITY_PENALTY * (count - 1).max(0);
        }

        if ctx.settings.feature_daily_planning {
            let mut by_cluster: HashMap<ClusterId, Vec<usize>> = HashMap::new();
            for (v, slot) in schedule.iter().enumerate() {
                if let Some((day, _)) = slot {
                    by_cluster.entry(ctx.visits[v].cluster_id).or_default().push(*day);
                }
            }
            for (_, days) in &by_cluster {
                for i in 0..days.len() {
                    for j in (i + 1)..days.len() {
                        if (days[i] as i64 - days[j] as i64).abs() <= 1 {
                            total -= DAILY_SPREAD_PENALTY;
                        }
                    }
                }
            }
        }

        total
    }
}

fn part_index(part: PartOfDay) -> usize {
    match part {
        PartOfDay::Ochtend => 0,
        PartOfDay::Dag => 1,
        PartOfDay::Avond => 2,
    }
}
