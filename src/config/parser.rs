use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of Actix Web workers for the HTTP front end
pub const DEFAULT_WORKERS: usize = 2;

/// Pattern used to pull the player count out of a vanilla `list` reply,
/// e.g. `There are 2 of a max of 20 players online: alex, steve`.
pub const DEFAULT_OCCUPANCY_PATTERN: &str = r"There are (\d+) of a max";

/// Durations are written as whole milliseconds in configuration files.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Connection settings for the occupancy-query protocol endpoint.
///
/// # Examples
///
/// ```
/// use gameserver_supervisor::config::ProtocolConfig;
///
/// let protocol = ProtocolConfig {
///     password: "hunter2".to_string(),
///     ..ProtocolConfig::default()
/// };
/// assert_eq!(protocol.port, 25575);
/// assert_eq!(protocol.query_command, "list");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtocolConfig {
    /// Host the endpoint listens on
    pub host: String,
    /// Port the endpoint listens on
    pub port: u16,
    /// Shared secret used to authenticate
    pub password: String,
    /// Authentication attempts per connect
    pub connect_retries: u32,
    /// Fixed delay between connect attempts
    #[serde(with = "duration_ms")]
    pub retry_backoff: Duration,
    /// Bound on waiting for one authentication acknowledgment
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Bound on waiting for the response to one command
    #[serde(with = "duration_ms")]
    pub command_timeout: Duration,
    /// Command that lists online players
    pub query_command: String,
    /// Regex whose first capture group is the occupancy count
    pub occupancy_pattern: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25575,
            password: String::new(),
            connect_retries: 3,
            retry_backoff: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            query_command: "list".to_string(),
            occupancy_pattern: DEFAULT_OCCUPANCY_PATTERN.to_string(),
        }
    }
}

/// Restrictions on who may issue lifecycle commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandConfig {
    /// Only commands originating from this channel are honoured.
    /// `None` accepts commands from any origin.
    pub channel_id: Option<String>,
}

impl CommandConfig {
    /// Whether a command from `origin` may change server state
    pub fn allows(&self, origin: &str) -> bool {
        match &self.channel_id {
            Some(channel) => channel == origin,
            None => true,
        }
    }
}

/// Configuration for the optional HTTP command front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Address to bind
    #[serde(default = "default_http_address")]
    pub address: String,
    /// Port to bind
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Number of Actix Web workers
    #[serde(default)]
    pub workers: Option<usize>,
    /// Bearer token required on every request, if set
    #[serde(default)]
    pub token: Option<String>,
}

fn default_http_address() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            port: default_http_port(),
            workers: None,
            token: None,
        }
    }
}

/// Immutable settings for one supervised server.
///
/// # JSON Schema
///
/// All durations are milliseconds. Every field has a default except
/// `protocol.password`, which validation requires to be non-empty.
///
/// ```json
/// {
///   "serverName": "Minecraft",
///   "serviceName": "minecraft",
///   "pollInterval": 60000,
///   "shutdownDelay": 900000,
///   "protocol": { "host": "localhost", "port": 25575, "password": "secret" },
///   "command": { "channelId": "1234" },
///   "http": { "address": "0.0.0.0", "port": 8080, "token": "abc" }
/// }
/// ```
///
/// # Examples
///
/// ```
/// use gameserver_supervisor::config::SupervisorConfig;
/// use std::time::Duration;
///
/// let config = SupervisorConfig::parse_from_str(r#"{
///     "serviceName": "survival",
///     "shutdownDelay": 600000,
///     "protocol": { "password": "secret" }
/// }"#).unwrap();
///
/// assert_eq!(config.service_name, "survival");
/// assert_eq!(config.shutdown_delay, Duration::from_secs(600));
/// assert_eq!(config.poll_interval, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// Human-readable name used in notifications
    pub server_name: String,
    /// Identifier of the managed process (e.g. the service unit name)
    pub service_name: String,
    /// Time between poll ticks while running
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Idle time after which the server is stopped
    #[serde(with = "duration_ms")]
    pub shutdown_delay: Duration,
    /// Wait between a successful start call and the confirming status check
    #[serde(with = "duration_ms")]
    pub confirmation_window: Duration,
    /// Delay after entering Running before the first poll tick
    #[serde(with = "duration_ms")]
    pub warmup_delay: Duration,
    /// Upper bound on any single backend call
    #[serde(with = "duration_ms")]
    pub backend_timeout: Duration,
    /// Consecutive probe failures that trigger a degraded notification
    pub probe_failure_alert_threshold: u32,
    /// Occupancy protocol settings
    pub protocol: ProtocolConfig,
    /// Command origin restrictions
    pub command: CommandConfig,
    /// HTTP front end settings, if it should run
    pub http: Option<HttpConfig>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            server_name: "Minecraft".to_string(),
            service_name: "minecraft".to_string(),
            poll_interval: Duration::from_secs(60),
            shutdown_delay: Duration::from_secs(15 * 60),
            confirmation_window: Duration::from_secs(3),
            warmup_delay: Duration::from_secs(30),
            backend_timeout: Duration::from_secs(60),
            probe_failure_alert_threshold: 3,
            protocol: ProtocolConfig::default(),
            command: CommandConfig::default(),
            http: None,
        }
    }
}

impl SupervisorConfig {
    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the file cannot be read or does not
    /// match the expected schema.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::parse_from_yaml_str(&content)
        } else {
            Self::parse_from_str(&content)
        }
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the string is not valid JSON or does
    /// not match the expected schema.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the string is not valid YAML or does
    /// not match the expected schema.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// Builds a configuration from environment variables.
    ///
    /// Recognised variables: `SERVICE_NAME`, `CHECK_INTERVAL` and
    /// `SHUTDOWN_DELAY` (milliseconds), `RCON_HOST`, `RCON_PORT`,
    /// `RCON_PASSWORD` and `CHANNEL_ID`. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if a numeric variable is not a number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup("SERVICE_NAME") {
            config.service_name = name;
        }
        if let Some(ms) = lookup("CHECK_INTERVAL") {
            config.poll_interval = Duration::from_millis(parse_number("CHECK_INTERVAL", &ms)?);
        }
        if let Some(ms) = lookup("SHUTDOWN_DELAY") {
            config.shutdown_delay = Duration::from_millis(parse_number("SHUTDOWN_DELAY", &ms)?);
        }
        if let Some(host) = lookup("RCON_HOST") {
            config.protocol.host = host;
        }
        if let Some(port) = lookup("RCON_PORT") {
            config.protocol.port = parse_number("RCON_PORT", &port)?;
        }
        if let Some(password) = lookup("RCON_PASSWORD") {
            config.protocol.password = password;
        }
        config.command.channel_id = lookup("CHANNEL_ID");

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::ConfigParse(format!("{} must be a number: {}", key, e)))
}
