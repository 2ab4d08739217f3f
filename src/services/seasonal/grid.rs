//! Capacity grid artefact: the seasonal plan aggregated against supply,
//! in the persisted `deadline_view` / `week_view` document shape.

use chrono::Datelike;
use std::collections::{BTreeSet, HashMap};

use crate::api::{CapacityGridDocument, WeekCell};
use crate::models::calendar;
use crate::models::catalog::Catalog;
use crate::services::skills;

use super::model::{part_key, PART_DAYTIME, PART_EVENING, PART_MORNING};
use super::SeasonalInput;

const TOTALS_ROW: &str = "Totalen";
const CUSTOM_SKILL: &str = "Custom";

fn part_label(part: u8) -> &'static str {
    match part {
        PART_MORNING => "Ochtend",
        PART_DAYTIME => "Dag",
        PART_EVENING => "Avond",
        _ => "Onbekend",
    }
}

fn week_label(year: i32, week: u32) -> String {
    format!("{}-W{:02}", year, week)
}

/// Build the capacity grid from the current provisional/planned weeks.
pub fn build_capacity_grid(catalog: &Catalog, input: &SeasonalInput<'_>) -> CapacityGridDocument {
    let year = input.start_date.year();
    let current_week = input.start_date.iso_week().week();

    // Potential demand per candidate week (independent of the chosen
    // provisional weeks).
    let mut demand_by_week: HashMap<u32, i64> = HashMap::new();
    let mut demand_by_skill: HashMap<(String, u32), i64> = HashMap::new();
    let mut demand_by_skill_part: HashMap<(String, String, u32), i64> = HashMap::new();
    let mut demand_weeks: BTreeSet<u32> = BTreeSet::new();

    for v in input.visits.iter().filter(|v| !v.is_custom()) {
        let skill = skills::required_skill_tag(catalog, v);
        let part = v.part_of_day.map(|p| part_label(part_key(p))).unwrap_or("Onbekend");
        let required = i64::from(v.required_researchers.max(1));

        let jan1 = chrono::NaiveDate::from_ymd_opt(year, 1, 1).expect("jan 1 exists");
        let dec31 = chrono::NaiveDate::from_ymd_opt(year, 12, 31).expect("dec 31 exists");
        let eff_start = v.from_date.max(jan1);
        let eff_end = v.to_date.min(dec31);
        if eff_start > eff_end {
            continue;
        }
        let start_iso = eff_start.iso_week();
        let start_w = if start_iso.year() == year { start_iso.week() } else { 1 };
        let mut end_w = calendar::clamped_week(eff_end, year);
        if end_w < start_w && end_w < 5 {
            end_w = 53;
        }
        for week in start_w.max(current_week)..=end_w.min(53) {
            let Some((w_mon, w_fri)) = calendar::work_week_bounds(year, week) else { continue };
            let overlap = calendar::overlap_days_inclusive(eff_start, eff_end, w_mon, w_fri);
            if overlap < 1 {
                continue;
            }
            let demand = required * calendar::window_weight(overlap);
            demand_weeks.insert(week);
            *demand_by_week.entry(week).or_default() += demand;
            *demand_by_skill.entry((skill.clone(), week)).or_default() += demand;
            *demand_by_skill_part
                .entry((skill.clone(), part.to_string(), week))
                .or_default() += demand;
        }
    }

    // Supply per skill and per (skill, part) with flex counted into every
    // part.
    let mut supply_map: HashMap<(String, u32), i64> = HashMap::new();
    let mut supply_map_part: HashMap<(String, String, u32), i64> = HashMap::new();
    let mut global_supply: HashMap<u32, i64> = HashMap::new();

    let mut horizon: BTreeSet<u32> = demand_weeks.clone();
    horizon.insert(current_week);
    for v in input.visits {
        if let Some(w) = v.provisional_week.or(v.planned_week) {
            horizon.insert(w);
        }
    }
    let weeks: Vec<u32> = match (horizon.first(), horizon.last()) {
        (Some(&lo), Some(&hi)) => (lo..=hi).collect(),
        _ => vec![],
    };

    let mut users: Vec<_> = input.users.iter().filter(|u| !u.deleted).collect();
    users.sort_by_key(|u| u.id);
    for &week in &weeks {
        for u in &users {
            let Some(aw) = input.availability.get(&(u.id, week)) else { continue };
            let m = i64::from(aw.morning_days);
            let d = i64::from(aw.daytime_days);
            let n = i64::from(aw.nighttime_days);
            let f = i64::from(aw.flex_days);
            let total = m + d + n + f;
            if total <= 0 {
                continue;
            }
            *global_supply.entry(week).or_default() += total;
            for skill in skills::user_skill_set(u) {
                *supply_map.entry((skill.clone(), week)).or_default() += total;
                for (part, days) in [("Ochtend", m + f), ("Dag", d + f), ("Avond", n + f)] {
                    *supply_map_part
                        .entry((skill.clone(), part.to_string(), week))
                        .or_default() += days;
                }
            }
        }
    }

    // Deadline view and planned demand per week row.
    let mut doc = CapacityGridDocument::default();
    let mut planned_total_by_week: HashMap<u32, i64> = HashMap::new();

    for v in input.visits {
        let (skill, is_planned) = if v.is_custom() {
            (CUSTOM_SKILL.to_string(), v.provisional_week.or(v.planned_week).is_some())
        } else {
            (skills::required_skill_tag(catalog, v), v.provisional_week.is_some())
        };
        let part = v
            .part_of_day
            .map(|p| part_label(part_key(p)).to_string())
            .unwrap_or_else(|| "Onbekend".to_string());
        let cost = if v.researcher_ids.is_empty() {
            i64::from(v.required_researchers.max(1))
        } else {
            v.researcher_ids.len() as i64
        };
        let deadline = v.to_date.format("%Y-%m-%d").to_string();

        let cell = doc
            .deadline_view
            .entry(skill.clone())
            .or_default()
            .entry(part.clone())
            .or_default()
            .entry(deadline)
            .or_default();
        cell.required += cost;
        if is_planned {
            cell.assigned += cost;
            let deadline_week = calendar::clamped_week(v.to_date, year);
            let part_supply = supply_map_part
                .get(&(skill.clone(), part.clone(), deadline_week))
                .copied()
                .unwrap_or(0);
            cell.spare = (part_supply - cell.assigned).max(0);

            if let Some(week) = v.provisional_week.or(v.planned_week) {
                *planned_total_by_week.entry(week).or_default() += cost;
                let label = format!("{} - {}", skill, part);
                let row_cell = doc
                    .week_view
                    .rows
                    .entry(label)
                    .or_default()
                    .entry(week_label(year, week))
                    .or_default();
                row_cell.planned += cost;
            }
        } else {
            cell.shortfall += cost;
        }
    }

    // Rows exist for every skill/part with potential demand, even when
    // nothing is planned there yet.
    for (skill, part, _) in demand_by_skill_part.keys() {
        doc.week_view.rows.entry(format!("{} - {}", skill, part)).or_default();
    }

    doc.week_view.weeks = weeks.iter().map(|&w| week_label(year, w)).collect();

    for &week in &weeks {
        let label = week_label(year, week);
        let global = global_supply.get(&week).copied().unwrap_or(0);
        let planned = planned_total_by_week.get(&week).copied().unwrap_or(0);
        let total_demand = demand_by_week.get(&week).copied().unwrap_or(0);

        doc.week_view.rows.entry(TOTALS_ROW.to_string()).or_default().insert(
            label.clone(),
            WeekCell {
                spare: (global - planned).max(0),
                planned: planned.min(global),
                shortage: (total_demand - global).max(0),
            },
        );

        let row_labels: Vec<String> = doc
            .week_view
            .rows
            .keys()
            .filter(|k| k.as_str() != TOTALS_ROW && k.contains(" - "))
            .cloned()
            .collect();
        for row_label in row_labels {
            let (skill, part) = row_label.split_once(" - ").expect("row label shape");
            let cell = doc
                .week_view
                .rows
                .get_mut(&row_label)
                .expect("row exists")
                .entry(label.clone())
                .or_default();
            let (part_supply, demand) = if matches!(part, "Ochtend" | "Dag" | "Avond") {
                (
                    supply_map_part
                        .get(&(skill.to_string(), part.to_string(), week))
                        .copied()
                        .unwrap_or(0),
                    demand_by_skill_part
                        .get(&(skill.to_string(), part.to_string(), week))
                        .copied()
                        .unwrap_or(0),
                )
            } else {
                (
                    supply_map.get(&(skill.to_string(), week)).copied().unwrap_or(0),
                    demand_by_skill.get(&(skill.to_string(), week)).copied().unwrap_or(0),
                )
            };
            cell.spare = (part_supply - cell.planned).max(0);
            cell.shortage = (demand - part_supply).max(0);
        }
    }

    doc
}
