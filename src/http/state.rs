//! Shared application state for request handlers.

use std::sync::Arc;

use crate::db::PlanningRepository;
use crate::settings::SolverSettings;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn PlanningRepository>,
    pub settings: Arc<SolverSettings>,
}

impl AppState {
    pub fn new(repo: Arc<dyn PlanningRepository>, settings: SolverSettings) -> Self {
        Self { repo, settings: Arc::new(settings) }
    }
}
