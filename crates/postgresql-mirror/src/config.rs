//! Mirror target configuration.
//!
//! Mirroring is enabled when either `DATABASE_MIRROR_URL` or `MIRROR_DB_HOST`
//! is present. The structured `MIRROR_DB_*` variables are only consulted when
//! no URL is set. Sources are queried on every call so that toggling the
//! configuration takes effect without a restart.

use crate::error::{MirrorError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::config::SslMode;

pub const MIRROR_URL_VAR: &str = "DATABASE_MIRROR_URL";
pub const MIRROR_HOST_VAR: &str = "MIRROR_DB_HOST";
pub const MIRROR_PORT_VAR: &str = "MIRROR_DB_PORT";
pub const MIRROR_USER_VAR: &str = "MIRROR_DB_USER";
pub const MIRROR_PASSWORD_VAR: &str = "MIRROR_DB_PASSWORD";
pub const MIRROR_DBNAME_VAR: &str = "MIRROR_DB_NAME";
pub const MIRROR_SSLMODE_VAR: &str = "MIRROR_DB_SSLMODE";
pub const MIRROR_CONNECT_TIMEOUT_VAR: &str = "MIRROR_DB_CONNECT_TIMEOUT";

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DBNAME: &str = "postgres";

/// Structured connection parameters, used when no URL is configured.
#[derive(Clone, PartialEq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: String,
    pub sslmode: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            dbname: DEFAULT_DBNAME.to_string(),
            sslmode: None,
            connect_timeout: None,
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Where mirrored writes go.
#[derive(Clone, PartialEq)]
pub enum MirrorTarget {
    /// Connection URL or libpq-style connection string, used as-is.
    Url(String),
    Params(ConnectionParams),
}

impl MirrorTarget {
    /// Build a driver configuration for this target.
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config> {
        match self {
            MirrorTarget::Url(url) => Ok(url.parse::<tokio_postgres::Config>()?),
            MirrorTarget::Params(params) => {
                let mut config = tokio_postgres::Config::new();
                config
                    .host(&params.host)
                    .port(params.port)
                    .dbname(&params.dbname);
                if let Some(user) = &params.user {
                    config.user(user);
                }
                if let Some(password) = &params.password {
                    config.password(password);
                }
                if let Some(sslmode) = &params.sslmode {
                    config.ssl_mode(parse_ssl_mode(sslmode)?.0);
                }
                if let Some(timeout) = params.connect_timeout {
                    config.connect_timeout(timeout);
                }
                Ok(config)
            }
        }
    }

    /// TLS handling requested by the target. Without an explicit `sslmode`
    /// TLS is attempted and plain TCP accepted, as libpq's `prefer` does.
    pub fn tls_mode(&self) -> Result<TlsMode> {
        match self {
            MirrorTarget::Url(url) => {
                let config = url.parse::<tokio_postgres::Config>()?;
                Ok(match config.get_ssl_mode() {
                    SslMode::Disable => TlsMode::Disable,
                    _ => TlsMode::Encrypt,
                })
            }
            MirrorTarget::Params(params) => match &params.sslmode {
                Some(sslmode) => Ok(parse_ssl_mode(sslmode)?.1),
                None => Ok(TlsMode::Encrypt),
            },
        }
    }

    /// Connect timeout requested by the target itself, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self {
            MirrorTarget::Url(url) => url
                .parse::<tokio_postgres::Config>()
                .ok()
                .and_then(|config| config.get_connect_timeout().copied()),
            MirrorTarget::Params(params) => params.connect_timeout,
        }
    }

    /// Host description safe for log lines.
    pub fn describe(&self) -> String {
        match self {
            MirrorTarget::Url(url) => match url.parse::<tokio_postgres::Config>() {
                Ok(config) => {
                    let hosts: Vec<String> = config
                        .get_hosts()
                        .iter()
                        .map(|host| match host {
                            tokio_postgres::config::Host::Tcp(name) => name.clone(),
                            #[cfg(unix)]
                            tokio_postgres::config::Host::Unix(path) => path.display().to_string(),
                        })
                        .collect();
                    format!(
                        "{}/{}",
                        hosts.join(","),
                        config.get_dbname().unwrap_or_default()
                    )
                }
                Err(_) => "<unparseable mirror URL>".to_string(),
            },
            MirrorTarget::Params(params) => {
                format!("{}:{}/{}", params.host, params.port, params.dbname)
            }
        }
    }
}

impl fmt::Debug for MirrorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // URLs routinely embed credentials
            MirrorTarget::Url(_) => f.debug_tuple("Url").field(&self.describe()).finish(),
            MirrorTarget::Params(params) => f.debug_tuple("Params").field(params).finish(),
        }
    }
}

/// How the mirror connection negotiates TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain TCP only.
    Disable,
    /// Encrypted channel without certificate verification, like libpq's
    /// `prefer` and `require`.
    Encrypt,
    /// Certificate chain and host name verified against the web PKI roots.
    VerifyFull,
}

fn parse_ssl_mode(value: &str) -> Result<(SslMode, TlsMode)> {
    match value.trim().to_ascii_lowercase().as_str() {
        "disable" => Ok((SslMode::Disable, TlsMode::Disable)),
        "allow" | "prefer" => Ok((SslMode::Prefer, TlsMode::Encrypt)),
        "require" => Ok((SslMode::Require, TlsMode::Encrypt)),
        "verify-ca" | "verify-full" => Ok((SslMode::Require, TlsMode::VerifyFull)),
        other => Err(MirrorError::Config(format!(
            "Unsupported {MIRROR_SSLMODE_VAR} value: {other}"
        ))),
    }
}

/// Supplies the current mirror target; `None` means mirroring is disabled.
pub trait MirrorConfigSource: Send + Sync {
    fn target(&self) -> Option<MirrorTarget>;
}

/// Fixed configuration, e.g. from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct StaticMirrorConfig {
    target: Option<MirrorTarget>,
}

impl StaticMirrorConfig {
    pub fn new(target: Option<MirrorTarget>) -> Self {
        Self { target }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}

impl MirrorConfigSource for StaticMirrorConfig {
    fn target(&self) -> Option<MirrorTarget> {
        self.target.clone()
    }
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads the `DATABASE_MIRROR_URL` / `MIRROR_DB_*` variables on every call.
#[derive(Clone)]
pub struct EnvMirrorConfig {
    lookup: Lookup,
}

impl EnvMirrorConfig {
    pub fn from_process_env() -> Self {
        Self {
            lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Use a custom variable lookup instead of the process environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self::with_lookup(move |key| vars.get(key).cloned())
    }

    // Blank values count as unset.
    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }
}

impl fmt::Debug for EnvMirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvMirrorConfig").finish_non_exhaustive()
    }
}

impl MirrorConfigSource for EnvMirrorConfig {
    fn target(&self) -> Option<MirrorTarget> {
        if let Some(url) = self.var(MIRROR_URL_VAR) {
            return Some(MirrorTarget::Url(url));
        }

        let host = self.var(MIRROR_HOST_VAR)?;
        let mut params = ConnectionParams::new(host);

        if let Some(port) = self.var(MIRROR_PORT_VAR) {
            match port.trim().parse() {
                Ok(port) => params.port = port,
                Err(_) => tracing::warn!(
                    "[DatabaseMirror] Ignoring invalid {MIRROR_PORT_VAR}={port}, using {DEFAULT_PORT}"
                ),
            }
        }
        params.user = self.var(MIRROR_USER_VAR);
        params.password = self.var(MIRROR_PASSWORD_VAR);
        if let Some(dbname) = self.var(MIRROR_DBNAME_VAR) {
            params.dbname = dbname;
        }
        params.sslmode = self.var(MIRROR_SSLMODE_VAR);
        if let Some(timeout) = self.var(MIRROR_CONNECT_TIMEOUT_VAR) {
            match timeout.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => params.connect_timeout = Some(Duration::from_secs(secs)),
                _ => tracing::warn!(
                    "[DatabaseMirror] Ignoring invalid {MIRROR_CONNECT_TIMEOUT_VAR}={timeout}"
                ),
            }
        }

        Some(MirrorTarget::Params(params))
    }
}
