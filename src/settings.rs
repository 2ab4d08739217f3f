//! Process-wide solver settings.
//!
//! Settings are read once from the environment at start-up and are
//! immutable afterwards. Solvers take an explicit `&SolverSettings` so
//! tests can construct ad-hoc instances; the global accessor exists for
//! the HTTP layer.

use std::sync::OnceLock;

/// Feature flags and tunables consumed by the solvers.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Minimum acceptable effective window length in days.
    pub min_effective_window_days: i64,
    /// Specific-day availability; allows double visits per day.
    pub feature_strict_availability: bool,
    /// Granular day assignment (`planned_date`) by the weekly solver.
    pub feature_daily_planning: bool,
    /// English speakers need a Dutch-speaking buddy.
    pub constraint_english_dutch_teaming: bool,
    /// Penalise multiple large-team visits per researcher per week.
    pub constraint_large_team_penalty: bool,
    /// Ban long travel between consecutive dayparts.
    pub constraint_consecutive_travel_penalty: bool,
    /// Hard travel cutoff in minutes.
    pub constraint_max_travel_time_minutes: i32,
    pub season_planner_timeout_quick_seconds: f64,
    pub season_planner_timeout_thorough_seconds: f64,
    pub google_maps_api_key: Option<String>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            min_effective_window_days: 10,
            feature_strict_availability: false,
            feature_daily_planning: false,
            constraint_english_dutch_teaming: false,
            constraint_large_team_penalty: true,
            constraint_consecutive_travel_penalty: true,
            constraint_max_travel_time_minutes: 75,
            season_planner_timeout_quick_seconds: 60.0,
            season_planner_timeout_thorough_seconds: 180.0,
            google_maps_api_key: None,
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl SolverSettings {
    /// Read settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_effective_window_days: env_parse(
                "MIN_EFFECTIVE_WINDOW_DAYS",
                defaults.min_effective_window_days,
            ),
            feature_strict_availability: env_bool(
                "FEATURE_STRICT_AVAILABILITY",
                defaults.feature_strict_availability,
            ),
            feature_daily_planning: env_bool(
                "FEATURE_DAILY_PLANNING",
                defaults.feature_daily_planning,
            ),
            constraint_english_dutch_teaming: env_bool(
                "CONSTRAINT_ENGLISH_DUTCH_TEAMING",
                defaults.constraint_english_dutch_teaming,
            ),
            constraint_large_team_penalty: env_bool(
                "CONSTRAINT_LARGE_TEAM_PENALTY",
                defaults.constraint_large_team_penalty,
            ),
            constraint_consecutive_travel_penalty: env_bool(
                "CONSTRAINT_CONSECUTIVE_TRAVEL_PENALTY",
                defaults.constraint_consecutive_travel_penalty,
            ),
            constraint_max_travel_time_minutes: env_parse(
                "CONSTRAINT_MAX_TRAVEL_TIME_MINUTES",
                defaults.constraint_max_travel_time_minutes,
            ),
            season_planner_timeout_quick_seconds: env_parse(
                "SEASON_PLANNER_TIMEOUT_QUICK_SECONDS",
                defaults.season_planner_timeout_quick_seconds,
            ),
            season_planner_timeout_thorough_seconds: env_parse(
                "SEASON_PLANNER_TIMEOUT_THOROUGH_SECONDS",
                defaults.season_planner_timeout_thorough_seconds,
            ),
            google_maps_api_key: std::env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }
}

static SETTINGS: OnceLock<SolverSettings> = OnceLock::new();

/// Global settings singleton, initialised from the environment on first
/// access.
pub fn get_settings() -> &'static SolverSettings {
    SETTINGS.get_or_init(SolverSettings::from_env)
}
