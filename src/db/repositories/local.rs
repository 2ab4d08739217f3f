//! In-memory repository for unit testing and local development.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::db::repository::{PlanningRepository, RepositoryError, RepositoryResult};
use crate::models::availability::AvailabilityWeek;
use crate::models::catalog::{Catalog, Protocol, ProtocolId};
use crate::models::user::User;
use crate::models::visit::{Cluster, ClusterId, Project, Visit, VisitId};

#[derive(Default)]
struct Store {
    catalog: Catalog,
    projects: Vec<Project>,
    clusters: Vec<Cluster>,
    visits: Vec<Visit>,
    users: Vec<User>,
    availability: Vec<AvailabilityWeek>,
    travel_cache: HashMap<(String, String), u32>,
    next_visit_id: VisitId,
    next_cluster_id: ClusterId,
}

/// Thread-safe in-memory repository.
#[derive(Default)]
pub struct LocalRepository {
    store: RwLock<Store>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for tests and local development.

    pub fn seed_catalog(&self, catalog: Catalog) {
        self.store.write().catalog = catalog;
    }

    pub fn seed_project(&self, project: Project) {
        self.store.write().projects.push(project);
    }

    pub fn seed_cluster(&self, cluster: Cluster) {
        let mut store = self.store.write();
        store.next_cluster_id = store.next_cluster_id.max(cluster.id);
        store.clusters.push(cluster);
    }

    pub fn seed_user(&self, user: User) {
        self.store.write().users.push(user);
    }

    pub fn seed_availability(&self, row: AvailabilityWeek) {
        self.store.write().availability.push(row);
    }

    pub fn seed_visit(&self, visit: Visit) {
        let mut store = self.store.write();
        store.next_visit_id = store.next_visit_id.max(visit.id);
        store.visits.push(visit);
    }
}

#[async_trait]
impl PlanningRepository for LocalRepository {
    async fn load_catalog(&self) -> RepositoryResult<Catalog> {
        Ok(self.store.read().catalog.clone())
    }

    async fn load_protocols(&self, ids: Option<&[ProtocolId]>) -> RepositoryResult<Vec<Protocol>> {
        let store = self.store.read();
        let protocols = store.catalog.protocols();
        Ok(match ids {
            None => protocols.to_vec(),
            Some(ids) => protocols.iter().filter(|p| ids.contains(&p.id)).cloned().collect(),
        })
    }

    async fn load_projects(&self) -> RepositoryResult<Vec<Project>> {
        Ok(self.store.read().projects.clone())
    }

    async fn load_clusters(&self) -> RepositoryResult<Vec<Cluster>> {
        Ok(self.store.read().clusters.iter().filter(|c| !c.deleted).cloned().collect())
    }

    async fn get_cluster(&self, id: ClusterId) -> RepositoryResult<Cluster> {
        self.store
            .read()
            .clusters
            .iter()
            .find(|c| c.id == id && !c.deleted)
            .cloned()
            .ok_or(RepositoryError::NotFound { entity: "cluster", id })
    }

    async fn insert_cluster(&self, mut cluster: Cluster) -> RepositoryResult<Cluster> {
        let mut store = self.store.write();
        store.next_cluster_id += 1;
        cluster.id = store.next_cluster_id;
        store.clusters.push(cluster.clone());
        Ok(cluster)
    }

    async fn load_visits(&self) -> RepositoryResult<Vec<Visit>> {
        Ok(self.store.read().visits.clone())
    }

    async fn load_visits_for_cluster(&self, cluster_id: ClusterId) -> RepositoryResult<Vec<Visit>> {
        Ok(self
            .store
            .read()
            .visits
            .iter()
            .filter(|v| v.cluster_id == cluster_id)
            .cloned()
            .collect())
    }

    async fn get_visit(&self, id: VisitId) -> RepositoryResult<Visit> {
        self.store
            .read()
            .visits
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound { entity: "visit", id })
    }

    async fn next_visit_nr(&self, cluster_id: ClusterId) -> RepositoryResult<u32> {
        let store = self.store.read();
        Ok(store
            .visits
            .iter()
            .filter(|v| v.cluster_id == cluster_id)
            .map(|v| v.visit_nr)
            .max()
            .map(|nr| nr + 1)
            .unwrap_or(1))
    }

    async fn persist_visits(&self, visits: Vec<Visit>) -> RepositoryResult<Vec<Visit>> {
        let mut store = self.store.write();
        let mut stored = Vec::with_capacity(visits.len());
        for mut v in visits {
            store.next_visit_id += 1;
            v.id = store.next_visit_id;
            store.visits.push(v.clone());
            stored.push(v);
        }
        Ok(stored)
    }

    async fn update_visits(&self, visits: &[Visit]) -> RepositoryResult<()> {
        let mut store = self.store.write();
        // Validate first so the batch stays atomic.
        for v in visits {
            if !store.visits.iter().any(|existing| existing.id == v.id) {
                return Err(RepositoryError::Transaction(format!(
                    "cannot update unknown visit {}",
                    v.id
                )));
            }
        }
        for v in visits {
            if let Some(existing) = store.visits.iter_mut().find(|existing| existing.id == v.id) {
                *existing = v.clone();
            }
        }
        Ok(())
    }

    async fn load_users(&self) -> RepositoryResult<Vec<User>> {
        let mut users: Vec<User> =
            self.store.read().users.iter().filter(|u| !u.deleted).cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn load_availability(&self, week: u32) -> RepositoryResult<Vec<AvailabilityWeek>> {
        Ok(self
            .store
            .read()
            .availability
            .iter()
            .filter(|a| a.week == week)
            .cloned()
            .collect())
    }

    async fn load_all_availability(&self) -> RepositoryResult<Vec<AvailabilityWeek>> {
        Ok(self.store.read().availability.clone())
    }

    async fn cache_get(&self, origin: &str, destination: &str) -> Option<u32> {
        self.store
            .read()
            .travel_cache
            .get(&(origin.to_string(), destination.to_string()))
            .copied()
    }

    async fn cache_put_many(&self, entries: &[(String, String, u32)]) -> RepositoryResult<()> {
        let mut store = self.store.write();
        for (origin, destination, minutes) in entries {
            store.travel_cache.insert((origin.clone(), destination.clone()), *minutes);
        }
        Ok(())
    }
}
