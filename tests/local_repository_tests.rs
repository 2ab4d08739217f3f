//! Behaviour of the in-memory repository backend.

mod support;

use support::*;
use vwp_rust::db::{LocalRepository, PlanningRepository, RepositoryError};
use vwp_rust::models::user::User;

#[tokio::test]
async fn test_visit_ids_and_numbering() {
    let repo = seeded_repository();
    assert_eq!(repo.next_visit_nr(1).await.unwrap(), 1);

    let stored = repo
        .persist_visits(vec![
            open_visit(0, 1, d(2025, 6, 1), d(2025, 7, 1)),
            open_visit(0, 1, d(2025, 7, 1), d(2025, 8, 1)),
        ])
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored[0].id > 0);
    assert_ne!(stored[0].id, stored[1].id);
}

#[tokio::test]
async fn test_update_visits_is_atomic() {
    let repo = seeded_repository();
    let stored = repo
        .persist_visits(vec![open_visit(0, 1, d(2025, 6, 1), d(2025, 7, 1))])
        .await
        .unwrap();

    let mut known = stored[0].clone();
    known.priority = true;
    let mut unknown = known.clone();
    unknown.id = 9999;

    let err = repo.update_visits(&[known.clone(), unknown]).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Transaction(_)));

    // The known visit must not have been updated by the failed batch.
    let reloaded = repo.get_visit(known.id).await.unwrap();
    assert!(!reloaded.priority);

    repo.update_visits(&[known.clone()]).await.unwrap();
    assert!(repo.get_visit(known.id).await.unwrap().priority);
}

#[tokio::test]
async fn test_soft_deleted_users_are_hidden() {
    let repo = LocalRepository::new();
    repo.seed_user(bat_user(1));
    let mut gone = bat_user(2);
    gone.deleted = true;
    repo.seed_user(gone);

    let users: Vec<User> = repo.load_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, 1);
}

#[tokio::test]
async fn test_travel_cache_roundtrip() {
    let repo = LocalRepository::new();
    assert_eq!(repo.cache_get("A", "B").await, None);

    repo.cache_put_many(&[
        ("A".into(), "B".into(), 25),
        ("B".into(), "A".into(), 30),
    ])
    .await
    .unwrap();

    assert_eq!(repo.cache_get("A", "B").await, Some(25));
    assert_eq!(repo.cache_get("B", "A").await, Some(30));
    assert_eq!(repo.cache_get("A", "C").await, None);
}

#[tokio::test]
async fn test_missing_cluster_is_not_found() {
    let repo = LocalRepository::new();
    let err = repo.get_cluster(42).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { entity: "cluster", id: 42 }));
}
