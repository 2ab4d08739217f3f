//! Repository trait and error types.
//!
//! The solvers consume immutable snapshots through this interface; any
//! mutation (`persist_visits`, `update_visits`) is atomic per call so a
//! failed planning run never leaves partial state behind.

use async_trait::async_trait;

use crate::models::availability::AvailabilityWeek;
use crate::models::catalog::{Catalog, Protocol, ProtocolId};
use crate::models::user::User;
use crate::models::visit::{Cluster, ClusterId, Project, Visit, VisitId};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {entity} {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<crate::models::catalog::CatalogError> for RepositoryError {
    fn from(err: crate::models::catalog::CatalogError) -> Self {
        RepositoryError::Validation(err.to_string())
    }
}

/// Persistence interface consumed by the planning core.
///
/// Soft-deleted rows are never returned.
#[async_trait]
pub trait PlanningRepository: Send + Sync {
    /// Catalogue snapshot with families, species, functions and protocols.
    async fn load_catalog(&self) -> RepositoryResult<Catalog>;

    /// Protocols by id, or the whole catalogue when `ids` is `None`.
    async fn load_protocols(&self, ids: Option<&[ProtocolId]>) -> RepositoryResult<Vec<Protocol>>;

    async fn load_projects(&self) -> RepositoryResult<Vec<Project>>;
    async fn load_clusters(&self) -> RepositoryResult<Vec<Cluster>>;
    async fn get_cluster(&self, id: ClusterId) -> RepositoryResult<Cluster>;
    async fn insert_cluster(&self, cluster: Cluster) -> RepositoryResult<Cluster>;

    async fn load_visits(&self) -> RepositoryResult<Vec<Visit>>;
    async fn load_visits_for_cluster(&self, cluster_id: ClusterId) -> RepositoryResult<Vec<Visit>>;
    async fn get_visit(&self, id: VisitId) -> RepositoryResult<Visit>;

    /// Next free visit number within a cluster.
    async fn next_visit_nr(&self, cluster_id: ClusterId) -> RepositoryResult<u32>;

    /// Insert new visits atomically, assigning ids. Returns the stored
    /// rows.
    async fn persist_visits(&self, visits: Vec<Visit>) -> RepositoryResult<Vec<Visit>>;

    /// Update existing visits atomically; fails the whole batch when any
    /// visit is unknown.
    async fn update_visits(&self, visits: &[Visit]) -> RepositoryResult<()>;

    /// Non-deleted researchers in id order.
    async fn load_users(&self) -> RepositoryResult<Vec<User>>;

    async fn load_availability(&self, week: u32) -> RepositoryResult<Vec<AvailabilityWeek>>;
    async fn load_all_availability(&self) -> RepositoryResult<Vec<AvailabilityWeek>>;

    /// Cached travel minutes for a pair, if known.
    async fn cache_get(&self, origin: &str, destination: &str) -> Option<u32>;

    /// Store travel lookups; `(origin, destination, minutes)` triples.
    async fn cache_put_many(&self, entries: &[(String, String, u32)]) -> RepositoryResult<()>;
}
