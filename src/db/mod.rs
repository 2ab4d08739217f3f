//! Persistence layer: repository pattern over the planning data.
//!
//! The solvers only ever talk to the [`repository::PlanningRepository`]
//! trait; the default backend is an in-memory store suited to tests and
//! local development. A SQL-backed implementation can be swapped in
//! behind the same trait.

#[cfg(not(feature = "local-repo"))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repositories;
pub mod repository;

pub use factory::{RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
pub use repository::{PlanningRepository, RepositoryError, RepositoryResult};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn PlanningRepository>> = OnceLock::new();

/// Initialize the global repository singleton for the selected backend.
pub fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }
    let repo = RepositoryFactory::create(RepositoryType::from_env())
        .map_err(|e| anyhow::Error::msg(e.to_string()))?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn PlanningRepository>> {
    if REPOSITORY.get().is_none() {
        let _ = init_repository();
    }
    REPOSITORY
        .get()
        .context("Repository not initialized. Call init_repository() first.")
}
