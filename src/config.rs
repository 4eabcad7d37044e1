//! Server configuration parsed from environment variables.
//!
//! Every knob has a default, so a bare `cargo run` works. Unparseable values
//! fall back to the default rather than aborting startup.

use std::time::Duration;

use canvas::replica::DEFAULT_HISTORY_CAPACITY;
use canvas::wire::DEFAULT_MAX_STROKE_POINTS;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STROKE_IDLE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STROKE_SWEEP_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_CANVAS_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

/// Tuning knobs for the canvas actor and gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Retention bound of the operation log.
    pub history_capacity: usize,
    /// Per-stroke point cap; oldest points are dropped beyond it.
    pub max_stroke_points: usize,
    /// Idle time after which a staged stroke is discarded.
    pub stroke_idle_timeout: Duration,
    /// Period of the stale-stroke sweep. Always shorter than the timeout.
    pub stroke_sweep_interval: Duration,
    /// Bounded command queue into the canvas actor.
    pub canvas_queue_capacity: usize,
    /// Bounded outbound queue per connected client.
    pub client_queue_capacity: usize,
    /// CORS origins; `None` allows any origin.
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_stroke_points: DEFAULT_MAX_STROKE_POINTS,
            stroke_idle_timeout: Duration::from_secs(DEFAULT_STROKE_IDLE_TIMEOUT_SECS),
            stroke_sweep_interval: Duration::from_secs(DEFAULT_STROKE_SWEEP_INTERVAL_SECS),
            canvas_queue_capacity: DEFAULT_CANVAS_QUEUE_CAPACITY,
            client_queue_capacity: DEFAULT_CLIENT_QUEUE_CAPACITY,
            allowed_origins: None,
        }
    }
}

impl Config {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `HISTORY_CAPACITY`: default 1000
    /// - `MAX_STROKE_POINTS`: default 10000
    /// - `STROKE_IDLE_TIMEOUT_SECS`: default 30
    /// - `STROKE_SWEEP_INTERVAL_SECS`: default 10
    /// - `CANVAS_QUEUE_CAPACITY`: default 1024
    /// - `CLIENT_QUEUE_CAPACITY`: default 256
    /// - `ALLOWED_ORIGINS`: comma-separated; any origin when unset
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str, default: u64| lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default);
        let parse_usize = |key: &str, default: usize| lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default);

        let stroke_idle_timeout = Duration::from_secs(parse("STROKE_IDLE_TIMEOUT_SECS", DEFAULT_STROKE_IDLE_TIMEOUT_SECS).max(1));
        let stroke_sweep_interval = sweep_interval_for(
            Duration::from_secs(parse("STROKE_SWEEP_INTERVAL_SECS", DEFAULT_STROKE_SWEEP_INTERVAL_SECS)),
            stroke_idle_timeout,
        );

        Self {
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            history_capacity: parse_usize("HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY).max(1),
            max_stroke_points: parse_usize("MAX_STROKE_POINTS", DEFAULT_MAX_STROKE_POINTS).max(1),
            stroke_idle_timeout,
            stroke_sweep_interval,
            canvas_queue_capacity: parse_usize("CANVAS_QUEUE_CAPACITY", DEFAULT_CANVAS_QUEUE_CAPACITY).max(1),
            client_queue_capacity: parse_usize("CLIENT_QUEUE_CAPACITY", DEFAULT_CLIENT_QUEUE_CAPACITY).max(1),
            allowed_origins: lookup("ALLOWED_ORIGINS").and_then(|raw| parse_origins(&raw)),
        }
    }
}

/// The sweep must run strictly more often than the timeout, or a stale
/// stroke could outlive it by up to a full interval. Out-of-range values
/// fall back to half the timeout.
fn sweep_interval_for(requested: Duration, timeout: Duration) -> Duration {
    if requested.is_zero() || requested >= timeout {
        timeout / 2
    } else {
        requested
    }
}

fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!origins.is_empty()).then_some(origins)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
