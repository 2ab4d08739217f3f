//! Travel-time oracle.
//!
//! Batched driving-minute lookups against the Google Directions API with
//! mandatory cache-through: known pairs come from the repository cache,
//! missing pairs are fetched with bounded concurrency and written back.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::db::repository::PlanningRepository;

const DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";
/// Upper bound on concurrent Directions requests.
const MAX_CONCURRENT_LOOKUPS: usize = 10;

/// Batched travel-minute lookups keyed by `(origin, destination)`.
pub struct TravelTimeOracle {
    client: reqwest::Client,
    api_key: Option<String>,
    repo: Arc<dyn PlanningRepository>,
}

impl TravelTimeOracle {
    pub fn new(api_key: Option<String>, repo: Arc<dyn PlanningRepository>) -> Self {
        Self { client: reqwest::Client::new(), api_key, repo }
    }

    /// Resolve travel minutes for the given pairs.
    ///
    /// Pairs that cannot be resolved (no API key, no route, lookup
    /// failure) are absent from the result; callers treat missing pairs
    /// as unknown.
    pub async fn travel_minutes_batch(
        &self,
        pairs: &[(String, String)],
    ) -> HashMap<(String, String), u32> {
        let mut unique: Vec<(String, String)> = pairs.to_vec();
        unique.sort();
        unique.dedup();
        if unique.is_empty() {
            return HashMap::new();
        }

        let mut results: HashMap<(String, String), u32> = HashMap::new();
        let mut missing: Vec<(String, String)> = Vec::new();
        for pair in unique {
            match self.repo.cache_get(&pair.0, &pair.1).await {
                Some(minutes) => {
                    results.insert(pair, minutes);
                }
                None => missing.push(pair),
            }
        }
        if missing.is_empty() {
            return results;
        }

        let Some(api_key) = self.api_key.clone() else {
            warn!("travel time API key not set; skipping {} lookups", missing.len());
            return results;
        };

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_LOOKUPS));
        let mut tasks: JoinSet<Option<((String, String), u32)>> = JoinSet::new();
        for pair in missing {
            let client = self.client.clone();
            let api_key = api_key.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await.ok()?;
                let minutes = fetch_travel_minutes(&client, &api_key, &pair.0, &pair.1).await?;
                Some((pair, minutes))
            });
        }

        let mut fresh: Vec<(String, String, u32)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some((pair, minutes))) = joined {
                fresh.push((pair.0.clone(), pair.1.clone(), minutes));
                results.insert(pair, minutes);
            }
        }

        if !fresh.is_empty() {
            if let Err(e) = self.repo.cache_put_many(&fresh).await {
                error!(error = %e, "failed to write travel time cache");
            }
        }

        results
    }
}

/// One Directions request; `None` on any failure or missing route.
async fn fetch_travel_minutes(
    client: &reqwest::Client,
    api_key: &str,
    origin: &str,
    destination: &str,
) -> Option<u32> {
    let response = client
        .get(DIRECTIONS_URL)
        .query(&[
            ("origin", origin),
            ("destination", destination),
            ("mode", "driving"),
            ("key", api_key),
        ])
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, origin, destination, "travel time lookup failed");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!(status = %response.status(), origin, destination, "travel time lookup rejected");
        return None;
    }

    let body: Value = response.json().await.ok()?;
    let seconds = body
        .get("routes")?
        .get(0)?
        .get("legs")?
        .get(0)?
        .get("duration")?
        .get("value")?
        .as_i64()?;
    Some((seconds.max(0) / 60) as u32)
}
