//! Connection options.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::error::Error;
use crate::protocol::constant::collation_for_charset;

/// SSL connection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Don't use SSL
    Disable,
    /// Try SSL, fall back to unencrypted if not supported
    #[default]
    Prefer,
    /// Require SSL connection
    Require,
}

/// Connection options for MySQL.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the MySQL server.
    ///
    /// Default: `3306`
    pub port: u16,

    /// Unix socket path. Takes precedence over `host` and `port`.
    ///
    /// Default: `None`
    pub socket: Option<String>,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Password for authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Database to select during the handshake.
    ///
    /// Default: `None`
    pub database: Option<String>,

    /// Connection character set. Must be a name MySQL knows, e.g. `utf8mb4`.
    ///
    /// Default: `"utf8mb4"`
    pub charset: String,

    /// Timeout for establishing the TCP/Unix connection.
    ///
    /// Default: `None`
    pub connect_timeout: Option<Duration>,

    /// Timeout for each socket read during a command.
    ///
    /// Default: `None`
    pub read_timeout: Option<Duration>,

    /// Timeout for each socket write during a command.
    ///
    /// Default: `None`
    pub write_timeout: Option<Duration>,

    /// SSL connection mode.
    ///
    /// Default: `SslMode::Prefer`
    pub ssl_mode: SslMode,

    /// Set `TCP_NODELAY` on TCP connections.
    ///
    /// Default: `true`
    pub tcp_nodelay: bool,

    /// Maximum packet size announced in the handshake response.
    ///
    /// Default: `16 MiB`
    pub max_allowed_packet: u32,

    /// Autocommit mode applied after connecting. `None` keeps the server default.
    ///
    /// Default: `Some(false)`
    pub autocommit: Option<bool>,

    /// `sql_mode` set after connecting.
    ///
    /// Default: `None`
    pub sql_mode: Option<String>,

    /// Statement executed once after connecting.
    ///
    /// Default: `None`
    pub init_command: Option<String>,

    /// Pool the connection takes its buffers from.
    ///
    /// Default: the process-wide pool
    pub buffer_pool: Arc<BufferPool>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 3306,
            socket: None,
            user: String::new(),
            password: None,
            database: None,
            charset: "utf8mb4".to_string(),
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            ssl_mode: SslMode::Prefer,
            tcp_nodelay: true,
            max_allowed_packet: 16 * 1024 * 1024,
            autocommit: Some(false),
            sql_mode: None,
            init_command: None,
            buffer_pool: Arc::clone(&GLOBAL_BUFFER_POOL),
        }
    }
}

impl Opts {
    /// Collation id sent in the handshake for `charset`.
    pub fn collation(&self) -> Result<u8, Error> {
        collation_for_charset(&self.charset)
            .ok_or_else(|| Error::InvalidUsage(format!("Unknown charset: {}", self.charset)))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "true" | "True" | "1" | "yes" | "on" => Ok(true),
        "false" | "False" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidUsage(format!("Invalid {}: {}", key, value))),
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, Error> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| Error::InvalidUsage(format!("Invalid {}: {}", key, value)))
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a MySQL connection URL.
    ///
    /// Format: `mysql://[user[:password]@]host[:port][/database][?param1=value1&param2=value2&..]`
    ///
    /// Supported query parameters:
    /// - `ssl_mode` / `sslmode`: disable, prefer, require
    /// - `socket`: Unix socket path
    /// - `charset`: connection character set
    /// - `connect_timeout`, `read_timeout`, `write_timeout`: seconds (fractions allowed)
    /// - `tcp_nodelay`: true/True/1/yes/on or false/False/0/no/off
    /// - `max_allowed_packet`: bytes
    /// - `autocommit`: boolean, or `server` to keep the server default
    /// - `sql_mode`, `init_command`: strings
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if url.scheme() != "mysql" {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'mysql://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(3306),
            user: url.username().to_string(),
            password: url.password().map(|s| s.to_string()),
            database: url.path().strip_prefix('/').and_then(|s| {
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            }),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "ssl_mode" | "sslmode" => {
                    opts.ssl_mode = match value.as_ref() {
                        "disable" => SslMode::Disable,
                        "prefer" => SslMode::Prefer,
                        "require" => SslMode::Require,
                        _ => {
                            return Err(Error::InvalidUsage(format!(
                                "Invalid ssl_mode: expected one of ['disable', 'prefer', 'require'], got {}",
                                value
                            )));
                        }
                    };
                }
                "socket" => {
                    opts.socket = Some(value.to_string());
                }
                "charset" => {
                    opts.charset = value.to_string();
                }
                "connect_timeout" => {
                    opts.connect_timeout = Some(parse_seconds(&key, &value)?);
                }
                "read_timeout" => {
                    opts.read_timeout = Some(parse_seconds(&key, &value)?);
                }
                "write_timeout" => {
                    opts.write_timeout = Some(parse_seconds(&key, &value)?);
                }
                "tcp_nodelay" => {
                    opts.tcp_nodelay = parse_bool(&key, &value)?;
                }
                "max_allowed_packet" => {
                    opts.max_allowed_packet = value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid max_allowed_packet: {}", value))
                    })?;
                }
                "autocommit" => {
                    opts.autocommit = if value == "server" {
                        None
                    } else {
                        Some(parse_bool(&key, &value)?)
                    };
                }
                "sql_mode" => {
                    opts.sql_mode = Some(value.to_string());
                }
                "init_command" => {
                    opts.init_command = Some(value.to_string());
                }
                _ => {
                    return Err(Error::InvalidUsage(format!(
                        "Unknown connection parameter: {}",
                        key
                    )));
                }
            }
        }

        opts.collation()?;
        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
        Self::try_from(&url)
    }
}
