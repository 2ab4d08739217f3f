//! Business logic: the three solvers and their supporting services.
//!
//! - [`composition`]: Visit Composition Solver (per-cluster clique cover)
//! - [`seasonal`]: Seasonal Planner (provisional ISO weeks)
//! - [`weekly`]: Weekly Assignment Solver (researchers and weekdays)
//! - [`skills`]: visit/user skill tag projection shared by the planners
//! - [`travel_time`]: batched, cache-through travel-minute lookups
//! - [`duplication`]: cluster duplication with visit series remapping

pub mod composition;
pub mod duplication;
pub mod seasonal;
pub mod skills;
pub mod travel_time;
pub mod weekly;
