//! # VWP Rust Backend
//!
//! Field-visit planning engine for ecological survey work.
//!
//! This crate provides the planning core of the Veldwerkplanning (VWP)
//! system: given survey protocols, physical site clusters and researcher
//! availability it composes compound visit events, assigns each visit a
//! provisional calendar week for the season, and assigns concrete
//! researchers plus weekdays for a single work week.
//!
//! ## Features
//!
//! - **Visit composition**: clique partitioning of protocol visit windows
//!   into a minimum set of compatible field visits
//! - **Seasonal planning**: provisional ISO-week assignment under aggregate
//!   skill/daypart capacity with a hierarchical objective
//! - **Weekly assignment**: researcher and weekday selection honouring
//!   qualifications, capacity buckets and travel limits
//! - **Travel times**: batched, cache-through lookup of driving minutes
//! - **HTTP API**: RESTful endpoints for the planning frontend
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`models`]: calendar utilities and the shared survey data model
//! - [`services`]: the three solvers and their supporting services
//! - [`db`]: repository pattern and the in-memory persistence backend
//! - [`api`]: Data Transfer Objects (DTOs) for API responses
//! - [`settings`]: process-wide solver settings, read once from the
//!   environment
//! - [`http`]: Axum-based HTTP server and request handlers

pub mod api;

pub mod db;
pub mod models;
pub mod settings;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
