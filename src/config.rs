use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use hyper::Uri;

use crate::error::ConfigError;
use crate::payload::Payload;
use crate::receiver::DEFAULT_JOURNAL_CAPACITY;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/message/send";
pub const DEFAULT_COUNT: usize = 10;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_TO: &str = "910000000000@s.whatsapp.net";
pub const DEFAULT_MESSAGE: &str = "Hello from sendloop";

pub const DEFAULT_RECEIVER_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_CONNECTIONS: usize = 25_000;

const COUNT: &str = "SENDLOOP_COUNT";
const DELAY: &str = "SENDLOOP_DELAY_SECS";
const URL: &str = "SENDLOOP_URL";
const TO: &str = "SENDLOOP_TO";
const MESSAGE: &str = "SENDLOOP_MESSAGE";
const ON_FAILURE: &str = "SENDLOOP_ON_FAILURE";

const RECEIVER_ADDR: &str = "SENDLOOP_RECEIVER_ADDR";
const RECEIVER_MAX_CONNECTIONS: &str = "SENDLOOP_RECEIVER_MAX_CONNECTIONS";
const RECEIVER_MAX_LATENCY: &str = "SENDLOOP_RECEIVER_MAX_LATENCY_MS";
const RECEIVER_JOURNAL_CAPACITY: &str = "SENDLOOP_RECEIVER_JOURNAL_CAPACITY";

/// What the sender does when a request gets no response at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the run and report the failure.
    #[default]
    Abort,
    /// Print the failure and go on with the next message.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            _ => Err("expected `abort` or `continue`".to_string()),
        }
    }
}

/// Parameters of one sender run.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Uri,
    pub message_count: usize,
    pub delay: Duration,
    pub payload: Payload,
    pub on_failure: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Uri::from_static(DEFAULT_ENDPOINT),
            message_count: DEFAULT_COUNT,
            delay: DEFAULT_DELAY,
            payload: Payload::new(DEFAULT_TO, DEFAULT_MESSAGE),
            on_failure: FailurePolicy::default(),
        }
    }
}

impl Config {
    /// Reads the process arguments and `SENDLOOP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(env::args().skip(1), |key| env::var(key).ok())
    }

    /// The first positional argument, when present, overrides `SENDLOOP_COUNT`.
    pub fn from_source<A, L>(args: A, lookup: L) -> Result<Self, ConfigError>
    where
        A: IntoIterator<Item = String>,
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        let count = args.into_iter().next().map(|c| ("message count", c));
        if let Some((key, value)) = count.or_else(|| lookup(COUNT).map(|c| (COUNT, c))) {
            config.message_count = value
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(key, &value, e))?;
        }

        if let Some(value) = lookup(DELAY) {
            config.delay = parse_delay(&value)?;
        }
        if let Some(value) = lookup(URL) {
            config.endpoint = parse_endpoint(&value)?;
        }
        if let Some(to) = lookup(TO) {
            config.payload.to = to;
        }
        if let Some(message) = lookup(MESSAGE) {
            config.payload.message = message;
        }
        if let Some(value) = lookup(ON_FAILURE) {
            config.on_failure = value
                .parse()
                .map_err(|e| ConfigError::invalid(ON_FAILURE, &value, e))?;
        }

        Ok(config)
    }
}

fn parse_delay(value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(DELAY, value, e))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::invalid(DELAY, value, e))
}

pub fn parse_endpoint(value: &str) -> Result<Uri, ConfigError> {
    let uri: Uri = value.trim().parse().map_err(|e| ConfigError::Url {
        value: value.to_string(),
        reason: format!("{}", e),
    })?;

    if uri.scheme_str() != Some("http") {
        return Err(ConfigError::Url {
            value: value.to_string(),
            reason: "only http:// endpoints are supported".to_string(),
        });
    }
    if uri.authority().is_none() {
        return Err(ConfigError::Url {
            value: value.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(uri)
}

/// Settings of the local messaging endpoint.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub addr: SocketAddr,
    pub max_connections: usize,
    pub max_latency: Duration,
    pub journal_capacity: usize,
}

impl ReceiverConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    pub fn from_source<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let addr = lookup(RECEIVER_ADDR)
            .unwrap_or_else(|| DEFAULT_RECEIVER_ADDR.to_string());
        let addr = addr
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(RECEIVER_ADDR, &addr, e))?;

        let max_connections = match lookup(RECEIVER_MAX_CONNECTIONS) {
            Some(value) => parse_max_connections(&value)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let max_latency = match lookup(RECEIVER_MAX_LATENCY) {
            Some(value) => value
                .trim()
                .parse()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::invalid(RECEIVER_MAX_LATENCY, &value, e))?,
            None => Duration::ZERO,
        };

        let journal_capacity = match lookup(RECEIVER_JOURNAL_CAPACITY) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(RECEIVER_JOURNAL_CAPACITY, &value, e))?,
            None => DEFAULT_JOURNAL_CAPACITY,
        };

        Ok(Self {
            addr,
            max_connections,
            max_latency,
            journal_capacity,
        })
    }
}

fn parse_max_connections(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(RECEIVER_MAX_CONNECTIONS, value, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::invalid(RECEIVER_MAX_CONNECTIONS, value, e)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn with_env(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        Config::from_source(args(&[]), env(pairs))
    }

    fn receiver_with_env(pairs: &[(&str, &str)]) -> Result<ReceiverConfig, ConfigError> {
        ReceiverConfig::from_source(env(pairs))
    }

    #[test]
    fn defaults_match_the_local_endpoint() {
        let config = with_env(&[]).unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:3000/message/send");
        assert_eq!(config.message_count, 10);
        assert_eq!(config.delay, Duration::from_secs(1));
        assert_eq!(config.on_failure, FailurePolicy::Abort);
        assert!(config.payload.is_complete());
    }

    #[test]
    fn reads_environment() {
        let config = with_env(&[
            ("SENDLOOP_COUNT", "3"),
            ("SENDLOOP_DELAY_SECS", "0.25"),
            ("SENDLOOP_URL", "http://localhost:8080/send"),
            ("SENDLOOP_TO", "123@s.whatsapp.net"),
            ("SENDLOOP_MESSAGE", "ping"),
            ("SENDLOOP_ON_FAILURE", "Continue"),
        ])
        .unwrap();

        assert_eq!(config.message_count, 3);
        assert_eq!(config.delay, Duration::from_millis(250));
        assert_eq!(config.endpoint, "http://localhost:8080/send");
        assert_eq!(config.payload, Payload::new("123@s.whatsapp.net", "ping"));
        assert_eq!(config.on_failure, FailurePolicy::Continue);
    }

    #[test]
    fn argument_overrides_count_variable() {
        let config = Config::from_source(args(&["7"]), env(&[("SENDLOOP_COUNT", "3")]))
            .unwrap();
        assert_eq!(config.message_count, 7);
    }

    #[test]
    fn zero_messages_is_allowed() {
        let config = Config::from_source(args(&["0"]), env(&[])).unwrap();
        assert_eq!(config.message_count, 0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_source(args(&["ten"]), env(&[])).is_err());
        assert!(Config::from_source(args(&["-1"]), env(&[])).is_err());
        assert!(with_env(&[("SENDLOOP_DELAY_SECS", "-1")]).is_err());
        assert!(with_env(&[("SENDLOOP_DELAY_SECS", "NaN")]).is_err());
        assert!(with_env(&[("SENDLOOP_ON_FAILURE", "retry")]).is_err());
    }

    #[test]
    fn error_names_the_setting() {
        let err = with_env(&[("SENDLOOP_DELAY_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("SENDLOOP_DELAY_SECS"));
    }

    #[test]
    fn endpoint_must_be_absolute_http() {
        assert!(parse_endpoint("http://127.0.0.1:3000/message/send").is_ok());
        assert!(parse_endpoint("https://example.com/message/send").is_err());
        assert!(parse_endpoint("/message/send").is_err());
        assert!(parse_endpoint("not a url").is_err());
    }

    #[test]
    fn receiver_defaults_and_overrides() {
        let config = receiver_with_env(&[]).unwrap();
        assert_eq!(config.addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.max_latency, Duration::ZERO);
        assert_eq!(config.journal_capacity, DEFAULT_JOURNAL_CAPACITY);

        let config = receiver_with_env(&[
            ("SENDLOOP_RECEIVER_ADDR", "0.0.0.0:4000"),
            ("SENDLOOP_RECEIVER_MAX_CONNECTIONS", "5"),
            ("SENDLOOP_RECEIVER_MAX_LATENCY_MS", "500"),
            ("SENDLOOP_RECEIVER_JOURNAL_CAPACITY", "0"),
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 4000);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.max_latency, Duration::from_millis(500));
        assert_eq!(config.journal_capacity, 0);
    }

    #[test]
    fn receiver_rejects_bad_values() {
        let cases = [
            ("SENDLOOP_RECEIVER_MAX_CONNECTIONS", "0"),
            ("SENDLOOP_RECEIVER_MAX_CONNECTIONS", "many"),
            ("SENDLOOP_RECEIVER_ADDR", "localhost"),
            ("SENDLOOP_RECEIVER_ADDR", "127.0.0.1:99999"),
            ("SENDLOOP_RECEIVER_MAX_LATENCY_MS", "-5"),
            ("SENDLOOP_RECEIVER_MAX_LATENCY_MS", "1.5"),
            ("SENDLOOP_RECEIVER_JOURNAL_CAPACITY", "all"),
        ];

        for (key, value) in cases {
            let err = receiver_with_env(&[(key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }
}
