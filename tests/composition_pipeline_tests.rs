//! End-to-end composition: catalogue in, persisted visits out.

mod support;

use std::collections::HashSet;

use support::*;
use vwp_rust::db::PlanningRepository;
use vwp_rust::models::visit::PartOfDay;
use vwp_rust::services::composition::{compose, CompositionDefaults, CompositionError};
use vwp_rust::settings::SolverSettings;

#[tokio::test]
async fn test_compose_and_persist_for_cluster() {
    let repo = seeded_repository();
    let catalog = repo.load_catalog().await.unwrap();
    let cluster = repo.get_cluster(1).await.unwrap();
    let next_nr = repo.next_visit_nr(1).await.unwrap();
    assert_eq!(next_nr, 1);

    let outcome = compose(
        &catalog,
        &cluster,
        &[1, 2],
        d(2025, 4, 1),
        next_nr,
        &CompositionDefaults::default(),
        &SolverSettings::default(),
    )
    .unwrap();

    // Coverage: all three windows of the two protocols, each exactly once.
    let covered: Vec<i64> = outcome
        .visits
        .iter()
        .flat_map(|v| v.protocol_visit_window_ids.clone())
        .collect();
    assert_eq!(covered.len(), 3);
    assert_eq!(covered.iter().collect::<HashSet<_>>().len(), 3);

    // The swallow nest merges with one bat occurrence (allow-listed
    // families, overlapping windows, both sunset); three windows end up
    // in two events.
    assert_eq!(outcome.visits.len(), 2);
    assert!(outcome.visits.iter().all(|v| v.part_of_day == Some(PartOfDay::Avond)));
    assert!(outcome.visits.iter().all(|v| v.group_id.is_some()));
    assert_eq!(outcome.visits[0].group_id, outcome.visits[1].group_id);

    let stored = repo.persist_visits(outcome.visits).await.unwrap();
    assert!(stored.iter().all(|v| v.id > 0));
    assert_eq!(repo.next_visit_nr(1).await.unwrap(), 3);

    // Sequencing between the two bat occurrences survives persistence.
    let mut visits = repo.load_visits_for_cluster(1).await.unwrap();
    visits.sort_by_key(|v| v.visit_nr);
    let gap = (visits[1].from_date - visits[0].from_date).num_days();
    assert!(gap >= 21, "bat protocol gap must hold, got {}", gap);
}

#[tokio::test]
async fn test_compose_rejects_unknown_protocol() {
    let repo = seeded_repository();
    let catalog = repo.load_catalog().await.unwrap();
    let cluster = repo.get_cluster(1).await.unwrap();

    let err = compose(
        &catalog,
        &cluster,
        &[999],
        d(2025, 4, 1),
        1,
        &CompositionDefaults::default(),
        &SolverSettings::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CompositionError::UnknownProtocol(999)));
}

#[tokio::test]
async fn test_compose_applies_defaults() {
    let repo = seeded_repository();
    let catalog = repo.load_catalog().await.unwrap();
    let cluster = repo.get_cluster(1).await.unwrap();

    let defaults = CompositionDefaults {
        required_researchers: Some(2),
        sleutel: true,
        ..Default::default()
    };
    let outcome = compose(
        &catalog,
        &cluster,
        &[2],
        d(2025, 4, 1),
        1,
        &defaults,
        &SolverSettings::default(),
    )
    .unwrap();

    assert_eq!(outcome.visits.len(), 1);
    assert_eq!(outcome.visits[0].required_researchers, 2);
    assert!(outcome.visits[0].sleutel);
    // Weather floor carries over from the protocol.
    assert_eq!(outcome.visits[0].min_temperature_celsius, Some(10));
    assert_eq!(outcome.visits[0].max_precipitation.as_deref(), Some("droog"));
}
