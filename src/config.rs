//! Runtime settings, read from the environment with defaults.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ArenaConfig {
    pub host: String,
    pub port: u16,
    /// Pause between a round completing and the next one being paired.
    pub round_advance_delay: Duration,
    /// How long a completed session stays visible to late spectators.
    pub session_retention: Duration,
    /// A tournament session still awaiting players after this long is forfeited
    /// to the side that showed up.
    pub awaiting_timeout: Duration,
    /// Persistence attempts per hand-off before giving up until the next retry.
    pub persist_attempts: u32,
    pub persist_backoff: Duration,
    pub sweep_interval: Duration,
    /// Append finished games here as JSON lines; in-memory when unset.
    pub results_path: Option<PathBuf>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            round_advance_delay: Duration::from_secs(10),
            session_retention: Duration::from_secs(300),
            awaiting_timeout: Duration::from_secs(15 * 60),
            persist_attempts: 3,
            persist_backoff: Duration::from_millis(250),
            sweep_interval: Duration::from_secs(30),
            results_path: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ArenaConfig {
    /// Override defaults with HOST, PORT, ROUND_ADVANCE_DELAY_SECS, SESSION_RETENTION_SECS,
    /// AWAITING_PLAYERS_TIMEOUT_SECS, PERSIST_ATTEMPTS, PERSIST_BACKOFF_MS,
    /// SWEEP_INTERVAL_SECS and RESULTS_PATH. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(d.host),
            port: env_parse("PORT").unwrap_or(d.port),
            round_advance_delay: env_parse("ROUND_ADVANCE_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.round_advance_delay),
            session_retention: env_parse("SESSION_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.session_retention),
            awaiting_timeout: env_parse("AWAITING_PLAYERS_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.awaiting_timeout),
            persist_attempts: env_parse::<u32>("PERSIST_ATTEMPTS")
                .map(|n| n.max(1))
                .unwrap_or(d.persist_attempts),
            persist_backoff: env_parse("PERSIST_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.persist_backoff),
            sweep_interval: env_parse("SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.sweep_interval),
            results_path: std::env::var_os("RESULTS_PATH").map(PathBuf::from),
        }
    }
}
