//! Travel-time oracle against the repository cache (no network).

use std::sync::Arc;

use vwp_rust::db::{LocalRepository, PlanningRepository};
use vwp_rust::services::travel_time::TravelTimeOracle;

#[tokio::test]
async fn test_batch_resolves_from_cache_without_api_key() {
    let repo = Arc::new(LocalRepository::new());
    repo.cache_put_many(&[
        ("Stationsweg 1, Leiden".into(), "Dorpsduinen 12, Wijk aan Zee".into(), 42),
    ])
    .await
    .unwrap();

    let oracle = TravelTimeOracle::new(None, repo);
    let pairs = vec![
        ("Stationsweg 1, Leiden".to_string(), "Dorpsduinen 12, Wijk aan Zee".to_string()),
        // Duplicate entries collapse into one lookup.
        ("Stationsweg 1, Leiden".to_string(), "Dorpsduinen 12, Wijk aan Zee".to_string()),
        // Unknown pair without an API key stays unresolved.
        ("Elders 1".to_string(), "Nergens 2".to_string()),
    ];
    let resolved = oracle.travel_minutes_batch(&pairs).await;

    assert_eq!(resolved.len(), 1);
    assert_eq!(
        resolved
            .get(&("Stationsweg 1, Leiden".to_string(), "Dorpsduinen 12, Wijk aan Zee".to_string()))
            .copied(),
        Some(42)
    );
}

#[tokio::test]
async fn test_empty_batch_short_circuits() {
    let repo = Arc::new(LocalRepository::new());
    let oracle = TravelTimeOracle::new(Some("key".into()), repo);
    let resolved = oracle.travel_minutes_batch(&[]).await;
    assert!(resolved.is_empty());
}
