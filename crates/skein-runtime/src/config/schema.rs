//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [plugins]
//! dir = "plugins"
//! disabled = ["trivia"]
//!
//! [plugins.settings.echo]
//! greeting = "hi"
//!
//! [[connections]]
//! name = "libera"
//! server = "irc.libera.chat"
//! port = 6697
//! ssl = true
//! nick = "skein"
//! channels = ["#skein"]
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_core::{ConnectionInfo, NickServ, ReconnectPolicy};
use skein_framework::SieveConfig;
use skein_transport::{DEFAULT_ENCODINGS, Endpoint, TransportOptions};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeinConfig {
    pub logging: LoggingConfig,
    pub plugins: PluginsConfig,
    pub connections: Vec<ConnectionConfig>,
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Required for `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Module path → level, e.g. `skein_transport = "trace"`.
    pub filters: HashMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include file and line.
    pub file_location: bool,
}

// =============================================================================
// Plugins
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Directory of `*.toml` unit manifests, rescanned periodically.
    pub dir: Option<PathBuf>,
    /// How often every plugin source is polled for changed stamps.
    pub scan_interval_secs: u64,
    /// Units that are never loaded.
    pub disabled: Vec<String>,
    /// Unit name → free-form table handed to `PluginConfig<T>`.
    pub settings: HashMap<String, Value>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            scan_interval_secs: 5,
            disabled: Vec::new(),
            settings: HashMap::new(),
        }
    }
}

impl PluginsConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

// =============================================================================
// Connections
// =============================================================================

/// One IRC server session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Unique name, also the storage scope.
    pub name: String,
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub nick: String,
    /// Username for `USER`; the nick when unset.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_realname")]
    pub realname: String,
    #[serde(default)]
    pub server_password: Option<String>,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub ignore_cert: bool,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Strings replaced by `[censored]` when outgoing lines are logged.
    #[serde(default)]
    pub censored_strings: Vec<String>,
    /// Read inactivity timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub nickserv: Option<NickServConfig>,
    #[serde(default = "default_true")]
    pub accept_invites: bool,
    #[serde(default)]
    pub sieve: SieveConfig,
}

fn default_port() -> u16 {
    6667
}

fn default_realname() -> String {
    "skein".to_owned()
}

fn default_command_prefix() -> String {
    ".".to_owned()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_encodings() -> Vec<String> {
    DEFAULT_ENCODINGS.iter().map(|s| (*s).to_owned()).collect()
}

fn default_true() -> bool {
    true
}

impl ConnectionConfig {
    /// A connection with every optional field at its default.
    pub fn new(name: impl Into<String>, server: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            port: default_port(),
            nick: nick.into(),
            user: None,
            realname: default_realname(),
            server_password: None,
            ssl: false,
            ignore_cert: false,
            channels: Vec::new(),
            command_prefix: default_command_prefix(),
            censored_strings: Vec::new(),
            timeout_secs: default_timeout_secs(),
            encodings: default_encodings(),
            reconnect: ReconnectConfig::default(),
            nickserv: None,
            accept_invites: true,
            sieve: SieveConfig::default(),
        }
    }

    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.nick)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.server.clone(),
            port: self.port,
            tls: self.ssl,
            ignore_cert: self.ignore_cert,
        }
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            encodings: self.encodings.clone(),
            ..TransportOptions::default()
        }
        .with_read_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// The static facts hooks see through the connection handle.
    pub fn to_info(&self) -> ConnectionInfo {
        let mut info = ConnectionInfo::new(&self.name, &self.server, &self.nick)
            .with_channels(self.channels.iter().cloned())
            .with_prefix(&self.command_prefix);
        info.port = self.port;
        info.accept_invites = self.accept_invites;
        info.nickserv = self.nickserv.as_ref().map(|ns| NickServ {
            service: ns.service.clone(),
            command: ns.command.clone(),
            password: ns.password.clone(),
        });
        info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Unlimited when unset.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 300_000,
            backoff_multiplier: 2.0,
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NickServConfig {
    pub password: String,
    #[serde(default = "default_nickserv_service")]
    pub service: String,
    #[serde(default = "default_nickserv_command")]
    pub command: String,
}

fn default_nickserv_service() -> String {
    "NickServ".to_owned()
}

fn default_nickserv_command() -> String {
    "IDENTIFY".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_defaults_from_toml() {
        let config: ConnectionConfig = toml::from_str(
            r#"
            name = "libera"
            server = "irc.libera.chat"
            nick = "skein"
            [nickserv]
            password = "hunter2"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6667);
        assert_eq!(config.command_prefix, ".");
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.user(), "skein");
        assert!(config.accept_invites);
        assert_eq!(config.encodings[0], "utf-8");
        assert_eq!(config.reconnect.max_retries, None);

        let info = config.to_info();
        assert_eq!(info.name, "libera");
        let nickserv = info.nickserv.unwrap();
        assert_eq!(nickserv.service, "NickServ");
        assert_eq!(nickserv.command, "IDENTIFY");
    }

    #[test]
    fn test_transport_settings() {
        let mut config = ConnectionConfig::new("n", "irc.example.net", "skein");
        config.ssl = true;
        config.port = 6697;
        config.timeout_secs = 60;

        let endpoint = config.endpoint();
        assert_eq!(endpoint.addr(), "irc.example.net:6697");
        assert!(endpoint.tls);
        assert_eq!(config.transport_options().read_timeout, Duration::from_secs(60));
    }
}
