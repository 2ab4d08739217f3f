//! Request handlers for the planning API.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::api::{
    CapacityGridDocument, CompositionResponse, PlanningRunResponse, SeasonalRunResponse,
};
use crate::models::catalog::ProtocolId;
use crate::models::visit::{Visit, VisitStatus};
use crate::services::composition::{self, CompositionDefaults};
use crate::services::seasonal::{self, SeasonalInput};
use crate::services::travel_time::TravelTimeOracle;
use crate::services::weekly;

use super::error::AppError;
use super::state::AppState;

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub protocol_ids: Vec<ProtocolId>,
    #[serde(default)]
    pub required_researchers: Option<u32>,
    #[serde(default)]
    pub wbc: bool,
    #[serde(default)]
    pub fiets: bool,
    #[serde(default)]
    pub hub: bool,
    #[serde(default)]
    pub dvp: bool,
    #[serde(default)]
    pub sleutel: bool,
}

/// Compose visits for a cluster from the selected protocols.
pub async fn compose_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<i64>,
    Json(body): Json<ComposeRequest>,
) -> Result<Json<CompositionResponse>, AppError> {
    if body.protocol_ids.is_empty() {
        return Err(AppError::BadRequest("protocol_ids must not be empty".into()));
    }

    let cluster = state.repo.get_cluster(cluster_id).await?;
    let catalog = state.repo.load_catalog().await?;
    let next_nr = state.repo.next_visit_nr(cluster_id).await?;

    let defaults = CompositionDefaults {
        required_researchers: body.required_researchers,
        expertise_level: None,
        wbc: body.wbc,
        fiets: body.fiets,
        hub: body.hub,
        dvp: body.dvp,
        sleutel: body.sleutel,
        remarks_field: None,
    };

    let outcome = composition::compose(
        &catalog,
        &cluster,
        &body.protocol_ids,
        today(),
        next_nr,
        &defaults,
        &state.settings,
    )?;

    let stored = state.repo.persist_visits(outcome.visits).await?;
    Ok(Json(CompositionResponse {
        visit_ids: stored.iter().map(|v| v.id).collect(),
        warnings: outcome.warnings,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SeasonQuery {
    pub start_date: Option<NaiveDate>,
    /// When false, solve without persisting (simulation).
    #[serde(default = "default_true")]
    pub persist: bool,
}

fn default_true() -> bool {
    true
}

/// Run the seasonal planner over the remaining season.
pub async fn run_season(
    State(state): State<AppState>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<SeasonalRunResponse>, AppError> {
    let start_date = query.start_date.unwrap_or_else(today);

    let catalog = state.repo.load_catalog().await?;
    let clusters = state.repo.load_clusters().await?;
    let users = state.repo.load_users().await?;
    let availability: HashMap<_, _> = state
        .repo
        .load_all_availability()
        .await?
        .into_iter()
        .map(|a| ((a.user_id, a.week), a))
        .collect();
    let visits: Vec<Visit> = state
        .repo
        .load_visits()
        .await?
        .into_iter()
        .filter(|v| v.to_date >= start_date && v.status != VisitStatus::Cancelled)
        .collect();

    let input = SeasonalInput {
        start_date,
        visits: &visits,
        clusters: &clusters,
        users: &users,
        availability: &availability,
    };
    let outcome = seasonal::solve_season(&catalog, &input)?;

    let mut changed: Vec<Visit> = visits
        .iter()
        .filter(|v| outcome.assignments.contains_key(&v.id))
        .cloned()
        .collect();
    seasonal::apply_outcome(&mut changed, &outcome);
    if query.persist {
        state.repo.update_visits(&changed).await?;
    }

    let mut planned = BTreeMap::new();
    let mut unplanned = Vec::new();
    for v in &changed {
        match v.provisional_week {
            Some(week) => {
                planned.insert(v.id, week);
            }
            None => unplanned.push(v.id),
        }
    }
    Ok(Json(SeasonalRunResponse { planned, unplanned, objective: outcome.objective }))
}

/// Capacity grid for the current seasonal plan (read-only).
pub async fn capacity_grid(
    State(state): State<AppState>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<CapacityGridDocument>, AppError> {
    let start_date = query.start_date.unwrap_or_else(today);

    let catalog = state.repo.load_catalog().await?;
    let clusters = state.repo.load_clusters().await?;
    let users = state.repo.load_users().await?;
    let availability: HashMap<_, _> = state
        .repo
        .load_all_availability()
        .await?
        .into_iter()
        .map(|a| ((a.user_id, a.week), a))
        .collect();
    let visits: Vec<Visit> = state
        .repo
        .load_visits()
        .await?
        .into_iter()
        .filter(|v| v.to_date >= start_date && v.status != VisitStatus::Cancelled)
        .collect();

    let input = SeasonalInput {
        start_date,
        visits: &visits,
        clusters: &clusters,
        users: &users,
        availability: &availability,
    };
    Ok(Json(seasonal::build_capacity_grid(&catalog, &input)))
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub monday: NaiveDate,
    /// Skip travel lookups (faster simulations).
    #[serde(default = "default_true")]
    pub include_travel_time: bool,
}

/// Run the weekly assignment solver for the week starting at `monday`.
pub async fn run_week(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<PlanningRunResponse>, AppError> {
    let monday = query.monday;
    if monday.weekday() != Weekday::Mon {
        return Err(AppError::BadRequest(format!("{} is not a Monday", monday)));
    }
    let week = monday.iso_week().week();

    let catalog = state.repo.load_catalog().await?;
    let clusters = state.repo.load_clusters().await?;
    let projects = state.repo.load_projects().await?;
    let users = state.repo.load_users().await?;
    let all_visits = state.repo.load_visits().await?;
    let availability: HashMap<_, _> = state
        .repo
        .load_availability(week)
        .await?
        .into_iter()
        .map(|a| ((a.user_id, a.week), a))
        .collect();

    let quote_clusters: HashSet<i64> = {
        let quote_projects: HashSet<i64> =
            projects.iter().filter(|p| p.quote).map(|p| p.id).collect();
        clusters.iter().filter(|c| quote_projects.contains(&c.project_id)).map(|c| c.id).collect()
    };
    let project_by_cluster: HashMap<i64, i64> =
        clusters.iter().map(|c| (c.id, c.project_id)).collect();

    let eligible = weekly::eligible_visits(&catalog, &all_visits, &quote_clusters, monday);

    let (mut weekly_caps, mut daypart_caps) = {
        let availability_map = &availability;
        weekly::capacity_buckets_for_week(availability_map, week)
    };
    weekly::apply_existing_assignments(&all_visits, week, &mut weekly_caps, &mut daypart_caps);

    // Travel lookups happen once, before the solver runs.
    let mut travel_minutes: HashMap<(i64, i64), i64> = HashMap::new();
    let mut cluster_travel: HashMap<(i64, i64), i64> = HashMap::new();
    if query.include_travel_time {
        let oracle =
            TravelTimeOracle::new(state.settings.google_maps_api_key.clone(), state.repo.clone());
        let project_of = |cluster_id: i64| {
            clusters
                .iter()
                .find(|c| c.id == cluster_id)
                .and_then(|c| projects.iter().find(|p| p.id == c.project_id))
        };
        let cluster_address = |cluster_id: i64| {
            clusters
                .iter()
                .find(|c| c.id == cluster_id)
                .and_then(|c| c.travel_address(project_of(cluster_id)))
        };

        // Researcher -> cluster pairs for every qualified combination.
        let mut pairs = Vec::new();
        let mut pair_keys: Vec<((i64, i64), (String, String))> = Vec::new();
        for v in &eligible {
            let Some(dest) = cluster_address(v.cluster_id) else { continue };
            for u in &users {
                if !weekly::qualifies_user_for_visit(&catalog, u, v) {
                    continue;
                }
                let Some(origin) = u.address.clone() else { continue };
                let key = (origin.clone(), dest.clone());
                pairs.push(key.clone());
                pair_keys.push(((v.id, u.id), key));
            }
        }

        // Cluster -> cluster pairs for the consecutive-daypart rule.
        let mut cluster_pair_keys: Vec<((i64, i64), (String, String))> = Vec::new();
        if state.settings.feature_strict_availability {
            for v1 in &eligible {
                for v2 in &eligible {
                    if v1.id == v2.id || v1.cluster_id == v2.cluster_id {
                        continue;
                    }
                    let (Some(a1), Some(a2)) =
                        (cluster_address(v1.cluster_id), cluster_address(v2.cluster_id))
                    else {
                        continue;
                    };
                    let key = (a1, a2);
                    pairs.push(key.clone());
                    cluster_pair_keys.push(((v1.cluster_id, v2.cluster_id), key));
                }
            }
        }

        let resolved = oracle.travel_minutes_batch(&pairs).await;
        for (id_pair, key) in pair_keys {
            if let Some(&minutes) = resolved.get(&key) {
                travel_minutes.insert(id_pair, i64::from(minutes));
            }
        }
        for (cluster_pair, key) in cluster_pair_keys {
            if let Some(&minutes) = resolved.get(&key) {
                cluster_travel.insert(cluster_pair, i64::from(minutes));
            }
        }
    }

    let ctx = weekly::WeeklyContext {
        catalog: &catalog,
        settings: &state.settings,
        week_monday: monday,
        visits: eligible,
        users: users.iter().collect(),
        weekly_caps,
        daypart_caps,
        travel_minutes,
        cluster_travel,
        project_by_cluster,
    };
    let outcome = weekly::solve_week(&ctx)?;

    let mut changed: Vec<Visit> = outcome
        .selected
        .iter()
        .filter_map(|a| all_visits.iter().find(|v| v.id == a.visit_id).cloned())
        .collect();
    weekly::apply_outcome(&mut changed, &outcome, state.settings.feature_daily_planning)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    state.repo.update_visits(&changed).await?;

    let selected_refs: Vec<&Visit> = changed.iter().collect();
    let capacity_remaining = weekly::remaining_capacity_report(&availability, week, &selected_refs);

    let day_assignments: BTreeMap<i64, NaiveDate> = if state.settings.feature_daily_planning {
        outcome.selected.iter().map(|a| (a.visit_id, a.day)).collect()
    } else {
        BTreeMap::new()
    };

    Ok(Json(PlanningRunResponse {
        selected_visit_ids: outcome.selected.iter().map(|a| a.visit_id).collect(),
        skipped_visit_ids: outcome.skipped_visit_ids.clone(),
        capacity_remaining,
        day_assignments,
    }))
}
