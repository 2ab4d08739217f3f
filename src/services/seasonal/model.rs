//! Season model: decision variables, sequencing pairs and the aggregate
//! supply/demand maps the objective is scored against.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use crate::models::calendar;
use crate::models::catalog::{Catalog, ProtocolId};
use crate::models::visit::{PartOfDay, Visit, VisitId};
use crate::services::skills;

use super::SeasonalInput;

pub(crate) const PART_MORNING: u8 = 0;
pub(crate) const PART_DAYTIME: u8 = 1;
pub(crate) const PART_EVENING: u8 = 2;

pub(crate) fn part_key(part: PartOfDay) -> u8 {
    match part {
        PartOfDay::Ochtend => PART_MORNING,
        PartOfDay::Dag => PART_DAYTIME,
        PartOfDay::Avond => PART_EVENING,
    }
}

/// One plannable visit in the season model.
#[derive(Debug, Clone)]
pub struct SeasonVisitVar {
    pub visit_id: VisitId,
    pub skill: String,
    pub part_key: Option<u8>,
    pub required: i64,
    pub priority: bool,
    pub urgent: bool,
    pub deadline_week: Option<u32>,
    /// Participates in the prefer-early slack penalty.
    pub count_slack: bool,
    pub project_id: Option<i64>,
    pub sleutel: bool,
    /// Multi-person bat visit wanting supervisor coverage.
    pub supervisor_demand: bool,
    /// Hard anchor: already planned, or manually locked provisional week.
    pub pinned: Option<u32>,
    /// Candidate weeks with their Mon–Fri overlap in days.
    pub candidates: BTreeMap<u32, i64>,
}

/// Sequencing constraint between two visits sharing a protocol.
#[derive(Debug, Clone)]
pub struct SeqPair {
    pub earlier: usize,
    pub later: usize,
    pub gap_weeks: i64,
    /// Latest earlier-week that leaves the tight-windowed successor
    /// enough room; weeks beyond it accrue successor risk.
    pub latest_allowed: Option<i64>,
}

#[derive(Debug)]
pub struct SeasonModel {
    pub vars: Vec<SeasonVisitVar>,
    pub seq_pairs: Vec<SeqPair>,
    /// (skill, week) -> [morning, daytime, evening, flex] person-days.
    pub skill_supply: HashMap<(String, u32), [i64; 4]>,
    pub intern_supply: HashMap<u32, i64>,
    pub supervisor_supply: HashMap<u32, i64>,
    pub global_supply: HashMap<u32, i64>,
    pub global_part_supply: HashMap<(u32, u8), i64>,
    /// Demand fixed by custom (manually planned) visits.
    pub custom_global_demand: HashMap<u32, i64>,
    pub custom_part_demand: HashMap<(u32, u8), i64>,
    pub year: i32,
    pub current_week: u32,
}

impl SeasonModel {
    pub fn skill_supply_total(&self, skill: &str, week: u32) -> i64 {
        self.skill_supply
            .get(&(skill.to_string(), week))
            .map(|s| s.iter().sum())
            .unwrap_or(0)
    }

    /// Daypart supply: dedicated days plus flex.
    pub fn skill_supply_part(&self, skill: &str, week: u32, part: u8) -> i64 {
        self.skill_supply
            .get(&(skill.to_string(), week))
            .map(|s| s[part as usize] + s[3])
            .unwrap_or(0)
    }

    pub fn build(catalog: &Catalog, input: &SeasonalInput<'_>) -> Self {
        let year = input.start_date.year();
        let current_week = input.start_date.iso_week().week();

        let mut model = SeasonModel {
            vars: Vec::new(),
            seq_pairs: Vec::new(),
            skill_supply: HashMap::new(),
            intern_supply: HashMap::new(),
            supervisor_supply: HashMap::new(),
            global_supply: HashMap::new(),
            global_part_supply: HashMap::new(),
            custom_global_demand: HashMap::new(),
            custom_part_demand: HashMap::new(),
            year,
            current_week,
        };

        model.build_supply(input);
        model.build_vars(catalog, input);
        model.build_seq_pairs(catalog, input);
        model
    }

    fn build_supply(&mut self, input: &SeasonalInput<'_>) {
        let mut users: Vec<_> = input.users.iter().filter(|u| !u.deleted).collect();
        users.sort_by_key(|u| u.id);

        for u in users {
            let user_skills = skills::user_skill_set(u);
            for week in self.current_week..=53 {
                let Some(aw) = input.availability.get(&(u.id, week)) else { continue };
                let m = i64::from(aw.morning_days);
                let d = i64::from(aw.daytime_days);
                let n = i64::from(aw.nighttime_days);
                let f = i64::from(aw.flex_days);
                let total = m + d + n + f;
                if total <= 0 {
                    continue;
                }

                for skill in &user_skills {
                    let entry = self
                        .skill_supply
                        .entry((skill.clone(), week))
                        .or_insert([0; 4]);
                    entry[0] += m;
                    entry[1] += d;
                    entry[2] += n;
                    entry[3] += f;
                }

                if u.is_intern() {
                    *self.intern_supply.entry(week).or_default() += total;
                }
                if u.is_supervisor() {
                    *self.supervisor_supply.entry(week).or_default() += total;
                }
                *self.global_supply.entry(week).or_default() += total;
                *self.global_part_supply.entry((week, PART_MORNING)).or_default() += m + f;
                *self.global_part_supply.entry((week, PART_DAYTIME)).or_default() += d + f;
                *self.global_part_supply.entry((week, PART_EVENING)).or_default() += n + f;
            }
        }
    }

    fn build_vars(&mut self, catalog: &Catalog, input: &SeasonalInput<'_>) {
        let project_by_cluster: HashMap<i64, i64> =
            input.clusters.iter().map(|c| (c.id, c.project_id)).collect();

        let mut visits: Vec<&Visit> = input.visits.iter().collect();
        visits.sort_by_key(|v| v.id);

        for v in visits {
            // Custom visits carry their demand as a fixed load on the
            // weeks they already occupy and are not re-planned.
            if v.is_custom() {
                self.add_custom_demand(v);
                continue;
            }

            let candidates = candidate_weeks(self.year, self.current_week, v);
            let pinned = if let Some(week) = v.planned_week {
                Some(week)
            } else if v.provisional_locked {
                v.provisional_week
            } else {
                None
            };

            let urgent = {
                let days = (v.to_date - input.start_date).num_days();
                (0..=14).contains(&days)
            };
            let deadline_week = Some(calendar::clamped_week(v.to_date, self.year));
            let count_slack = deadline_week.map(|w| w >= self.current_week).unwrap_or(false);

            let supervisor_demand = v.required_researchers > 1
                && v.species_ids
                    .first()
                    .and_then(|id| catalog.family_of_species(*id))
                    .map(|f| {
                        crate::models::catalog::normalize_family_name(&f.name) == "vleermuis"
                    })
                    .unwrap_or(false);

            self.vars.push(SeasonVisitVar {
                visit_id: v.id,
                skill: skills::required_skill_tag(catalog, v),
                part_key: v.part_of_day.map(part_key),
                required: i64::from(v.required_researchers.max(1)),
                priority: v.priority,
                urgent,
                deadline_week,
                count_slack,
                project_id: project_by_cluster.get(&v.cluster_id).copied(),
                sleutel: v.sleutel,
                supervisor_demand,
                pinned,
                candidates,
            });
        }
    }

    fn add_custom_demand(&mut self, v: &Visit) {
        let Some(target_week) = v.planned_week.or(v.provisional_week) else { return };
        let Some((w_mon, w_fri)) = calendar::work_week_bounds(self.year, target_week) else {
            return;
        };
        let overlap = calendar::overlap_days_inclusive(v.from_date, v.to_date, w_mon, w_fri);
        if overlap < 1 {
            return;
        }
        let cost = if v.researcher_ids.is_empty() {
            i64::from(v.required_researchers.max(1))
        } else {
            v.researcher_ids.len() as i64
        };
        let demand = cost * calendar::window_weight(overlap);
        *self.custom_global_demand.entry(target_week).or_default() += demand;
        if let Some(part) = v.part_of_day.map(part_key) {
            *self.custom_part_demand.entry((target_week, part)).or_default() += demand;
        }
    }

    fn build_seq_pairs(&mut self, catalog: &Catalog, input: &SeasonalInput<'_>) {
        // Protocol -> visit index map per modelled visit.
        let visit_by_id: HashMap<VisitId, &Visit> =
            input.visits.iter().map(|v| (v.id, v)).collect();
        let mut proto_maps: Vec<BTreeMap<ProtocolId, u32>> = Vec::with_capacity(self.vars.len());
        for var in &self.vars {
            let mut map = BTreeMap::new();
            if let Some(v) = visit_by_id.get(&var.visit_id) {
                for pvw_id in &v.protocol_visit_window_ids {
                    if let Some((p, w)) = catalog.visit_window(*pvw_id) {
                        map.entry(p.id).or_insert(w.visit_index);
                    }
                }
            }
            proto_maps.push(map);
        }

        // Cluster -> modelled visit indices.
        let mut by_cluster: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, var) in self.vars.iter().enumerate() {
            if let Some(v) = visit_by_id.get(&var.visit_id) {
                if !proto_maps[i].is_empty() {
                    by_cluster.entry(v.cluster_id).or_default().push(i);
                }
            }
        }

        for (_, members) in by_cluster {
            for a_pos in 0..members.len() {
                for b_pos in (a_pos + 1)..members.len() {
                    let (a, b) = (members[a_pos], members[b_pos]);
                    let shared: Vec<ProtocolId> = proto_maps[a]
                        .keys()
                        .filter(|pid| proto_maps[b].contains_key(*pid))
                        .copied()
                        .collect();
                    for pid in shared {
                        let idx_a = proto_maps[a][&pid];
                        let idx_b = proto_maps[b][&pid];
                        if idx_a == idx_b {
                            continue;
                        }
                        let (earlier, later) = if idx_a < idx_b { (a, b) } else { (b, a) };
                        let Some(protocol) = catalog.protocol(pid) else { continue };
                        let gap_weeks = calendar::gap_weeks(protocol.min_gap_days());
                        let latest_allowed = self.successor_risk_bound(
                            catalog,
                            visit_by_id[&self.vars[later].visit_id],
                            pid,
                            gap_weeks,
                        );
                        self.seq_pairs.push(SeqPair { earlier, later, gap_weeks, latest_allowed });
                    }
                }
            }
        }
    }

    /// Risk bound for a tight-windowed successor: only successors whose
    /// protocol window spans at most two weeks, with a positive gap,
    /// constrain the earlier visit.
    fn successor_risk_bound(
        &self,
        catalog: &Catalog,
        later: &Visit,
        pid: ProtocolId,
        gap_weeks: i64,
    ) -> Option<i64> {
        if gap_weeks <= 0 {
            return None;
        }
        let pvw = later
            .protocol_visit_window_ids
            .iter()
            .filter_map(|id| catalog.visit_window(*id))
            .find(|(p, _)| p.id == pid)
            .map(|(_, w)| w);

        let window_weeks = match pvw {
            Some(w) => ((w.window_to - w.window_from).num_days() + 1 + 6) / 7,
            None => ((later.to_date - later.from_date).num_days() + 1 + 6) / 7,
        };
        if window_weeks > 2 {
            return None;
        }

        let deadline = pvw
            .map(|w| calendar::to_year(w.window_to, self.year))
            .unwrap_or(later.to_date);
        let deadline_week = i64::from(calendar::clamped_week(deadline, self.year));
        let latest = deadline_week - gap_weeks;
        if latest < 1 {
            return None;
        }
        Some(latest)
    }
}

/// Candidate weeks of a visit within the planning year and horizon.
fn candidate_weeks(year: i32, current_week: u32, v: &Visit) -> BTreeMap<u32, i64> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).expect("jan 1 exists");
    let dec31 = NaiveDate::from_ymd_opt(year, 12, 31).expect("dec 31 exists");
    let eff_start = v.from_date.max(jan1);
    let eff_end = v.to_date.min(dec31);
    if eff_start > eff_end {
        return BTreeMap::new();
    }

    let start_iso = eff_start.iso_week();
    let start_w = if start_iso.year() == year { start_iso.week() } else { 1 };
    let mut end_w = calendar::clamped_week(eff_end, year);
    // A late-December end date can fall in ISO week 1 of the next year.
    if end_w < start_w && end_w < 5 {
        end_w = 53;
    }

    let mut candidates = BTreeMap::new();
    for week in start_w.max(current_week)..=end_w.min(53) {
        let Some((w_mon, w_fri)) = calendar::work_week_bounds(year, week) else { continue };
        let overlap = calendar::overlap_days_inclusive(eff_start, eff_end, w_mon, w_fri);
        if overlap >= 1 {
            candidates.insert(week, overlap);
        }
    }
    candidates
}
