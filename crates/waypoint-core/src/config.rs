use std::time::Duration;

use serde::Deserialize;

use crate::models::{CoreError, CoreErrorKind};
use crate::orchestration::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_INITIAL_RESPONSE_TIME: Duration = Duration::from_secs(5);
pub const DEFAULT_COMPLETE_RESPONSE_TIME: Duration = Duration::from_secs(30);

pub const ENV_INITIAL_RESPONSE_MS: &str = "WAYPOINT_INITIAL_RESPONSE_MS";
pub const ENV_COMPLETE_RESPONSE_MS: &str = "WAYPOINT_COMPLETE_RESPONSE_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "WAYPOINT_POLL_INTERVAL_MS";
pub const ENV_MAX_CONCURRENCY: &str = "WAYPOINT_MAX_CONCURRENCY";

/// Response-time budget and rendering limits for the two-phase coordinator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoordinatorConfig {
    /// Deadline for phase one, i.e. the quick response.
    pub initial_response_time: Duration,
    /// Overall deadline for the complete response, measured from query receipt.
    pub complete_response_time: Duration,
    pub poll_interval: Duration,
    pub max_concurrency: Option<usize>,
    pub max_listed_lodging: usize,
    pub max_listed_points_of_interest: usize,
    /// How many points of interest get transit suggestions.
    pub transit_destinations: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            initial_response_time: DEFAULT_INITIAL_RESPONSE_TIME,
            complete_response_time: DEFAULT_COMPLETE_RESPONSE_TIME,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_concurrency: None,
            max_listed_lodging: 3,
            max_listed_points_of_interest: 5,
            transit_destinations: 3,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    initial_response_ms: Option<u64>,
    complete_response_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_concurrency: Option<usize>,
    max_listed_lodging: Option<usize>,
    max_listed_points_of_interest: Option<usize>,
    transit_destinations: Option<usize>,
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.complete_response_time <= self.initial_response_time {
            return Err(invalid_config(format!(
                "complete response time ({} ms) must exceed initial response time ({} ms)",
                self.complete_response_time.as_millis(),
                self.initial_response_time.as_millis()
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid_config("poll interval must be greater than zero"));
        }
        if self.max_concurrency == Some(0) {
            return Err(invalid_config("max concurrency must be at least one when set"));
        }
        Ok(())
    }

    /// Defaults overlaid with the fields present in `raw`. Durations are in milliseconds.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let file: ConfigFile = serde_json::from_str(raw)
            .map_err(|error| invalid_config(format!("malformed configuration: {error}")))?;

        let mut config = Self::default();
        if let Some(ms) = file.initial_response_ms {
            config.initial_response_time = Duration::from_millis(ms);
        }
        if let Some(ms) = file.complete_response_ms {
            config.complete_response_time = Duration::from_millis(ms);
        }
        if let Some(ms) = file.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if file.max_concurrency.is_some() {
            config.max_concurrency = file.max_concurrency;
        }
        if let Some(limit) = file.max_listed_lodging {
            config.max_listed_lodging = limit;
        }
        if let Some(limit) = file.max_listed_points_of_interest {
            config.max_listed_points_of_interest = limit;
        }
        if let Some(limit) = file.transit_destinations {
            config.transit_destinations = limit;
        }
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), CoreError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies `WAYPOINT_*` overrides read through `lookup`.
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), CoreError> {
        if let Some(ms) = parse_override::<u64>(&lookup, ENV_INITIAL_RESPONSE_MS)? {
            self.initial_response_time = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_override::<u64>(&lookup, ENV_COMPLETE_RESPONSE_MS)? {
            self.complete_response_time = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_override::<u64>(&lookup, ENV_POLL_INTERVAL_MS)? {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(limit) = parse_override::<usize>(&lookup, ENV_MAX_CONCURRENCY)? {
            self.max_concurrency = Some(limit);
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, CoreError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| invalid_config(format!("{key} must be a non-negative integer, got '{raw}'")))
}

fn invalid_config(message: impl Into<String>) -> CoreError {
    CoreError::new(CoreErrorKind::InvalidConfig, message)
}
