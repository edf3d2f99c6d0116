use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,order_tracker=debug";

/// Which order store backs the service
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreKind {
    Scylla,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scylla" => Ok(StoreKind::Scylla),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store kind: {}", other)),
        }
    }
}

/// Timing knobs of the tracking core
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Pause between the end of one tick and the start of the next
    pub poll_interval: Duration,
    /// Delay before a newly created order moves to processing
    pub pending_delay: Duration,
    /// Delay before processing -> shipped and shipped -> delivered
    pub stage_delay: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            pending_delay: Duration::from_millis(2000),
            stage_delay: Duration::from_millis(3000),
        }
    }
}

/// Service configuration, read from the environment (and `.env` if present)
#[derive(Debug, Clone)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub store: StoreKind,
    pub scylla_uri: String,
    pub scylla_keyspace: String,
    pub port: u16,
    /// Browser origin allowed to call the API, `*` for any
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            store: StoreKind::Scylla,
            scylla_uri: "127.0.0.1:9042".to_string(),
            scylla_keyspace: "orders_ks".to_string(),
            port: 5000,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing or unparseable values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        let millis = |key: &str, default: Duration| {
            parse_or(&lookup, key, default.as_millis() as u64).map_or(default, Duration::from_millis)
        };

        Self {
            tracker: TrackerConfig {
                poll_interval: millis("POLL_INTERVAL_MS", defaults.tracker.poll_interval),
                pending_delay: millis("PENDING_DELAY_MS", defaults.tracker.pending_delay),
                stage_delay: millis("STAGE_DELAY_MS", defaults.tracker.stage_delay),
            },
            store: parse_or(&lookup, "ORDER_STORE", defaults.store).unwrap_or(defaults.store),
            scylla_uri: lookup("SCYLLA_URI").unwrap_or(defaults.scylla_uri),
            scylla_keyspace: lookup("SCYLLA_KEYSPACE").unwrap_or(defaults.scylla_keyspace),
            port: parse_or(&lookup, "PORT", defaults.port).unwrap_or(defaults.port),
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        }
    }
}

/// Log filter from `RUST_LOG`, or the default when unset or malformed.
///
/// Runs before the subscriber exists, so `.env` must already be loaded.
pub fn log_filter(lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    lookup("RUST_LOG")
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Some(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, value = %raw, error = %e, "Ignoring invalid config value");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tracing::level_filters::LevelFilter;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = Config::from_lookup(|_| None);

        assert_eq!(config.tracker.poll_interval, Duration::from_secs(1));
        assert_eq!(config.tracker.pending_delay, Duration::from_secs(2));
        assert_eq!(config.tracker.stage_delay, Duration::from_secs(3));
        assert_eq!(config.store, StoreKind::Scylla);
        assert_eq!(config.port, 5000);
        assert_eq!(config.cors_origin, "http://localhost:3000");
    }

    #[test]
    fn test_overrides_from_env() {
        let config = Config::from_lookup(lookup_from(&[
            ("POLL_INTERVAL_MS", "250"),
            ("STAGE_DELAY_MS", "500"),
            ("ORDER_STORE", "Memory"),
            ("SCYLLA_URI", "scylla:9042"),
            ("PORT", "8080"),
            ("CORS_ORIGIN", "https://shop.example.com"),
        ]));

        assert_eq!(config.tracker.poll_interval, Duration::from_millis(250));
        assert_eq!(config.tracker.pending_delay, Duration::from_secs(2));
        assert_eq!(config.tracker.stage_delay, Duration::from_millis(500));
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.scylla_uri, "scylla:9042");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origin, "https://shop.example.com");
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("POLL_INTERVAL_MS", "soon"),
            ("ORDER_STORE", "mongodb"),
            ("PORT", "-1"),
        ]));

        assert_eq!(config.tracker.poll_interval, Duration::from_secs(1));
        assert_eq!(config.store, StoreKind::Scylla);
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_log_filter_defaults_to_info_with_debug_for_crate() {
        let filter = log_filter(|_| None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_log_filter_honours_rust_log_from_dotenv() {
        let dotenv = "RUST_LOG=warn\nPORT=5000\n";
        let pairs: HashMap<String, String> = dotenvy::from_read_iter(dotenv.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();

        let filter = log_filter(move |key: &str| pairs.get(key).cloned());
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_malformed_log_filter_falls_back_to_default() {
        let filter = log_filter(lookup_from(&[("RUST_LOG", "order_tracker=loud")]));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
