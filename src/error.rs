//! Error types for zero-mysql.

use thiserror::Error;

/// Result type for zero-mysql operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Client-side code for a failed write: "MySQL server has gone away".
pub const CR_SERVER_GONE_ERROR: u16 = 2006;

/// Client-side code for a failed read: "Lost connection to MySQL server during query".
pub const CR_SERVER_LOST: u16 = 2013;

/// Server error codes that mean the credentials were rejected.
const ACCESS_DENIED_CODES: [u16; 3] = [
    1044, // ER_DBACCESS_DENIED_ERROR
    1045, // ER_ACCESS_DENIED_ERROR
    1698, // ER_ACCESS_DENIED_NO_PASSWORD_ERROR
];

/// An ERR packet sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// MySQL error number (e.g. 1064)
    pub code: u16,
    /// Five-character SQLSTATE, empty if the server did not send one
    pub sql_state: String,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.sql_state.is_empty() {
            write!(f, "({}) {}", self.code, self.message)
        } else {
            write!(f, "({}, {}) {}", self.code, self.sql_state, self.message)
        }
    }
}

impl ServerError {
    /// Whether the code is one of the access-denied errors.
    pub fn is_access_denied(&self) -> bool {
        ACCESS_DENIED_CODES.contains(&self.code)
    }
}

/// Error type for zero-mysql.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response; the connection stays usable
    #[error("MySQL error: {0}")]
    Server(ServerError),

    /// The server rejected the credentials during the handshake
    #[error("Access denied: {0}")]
    AccessDenied(ServerError),

    /// The server asked for an authentication plugin this client does not implement
    #[error("Authentication plugin not supported: {0}")]
    AuthPluginUnsupported(String),

    /// Protocol error (malformed packet, unexpected response, sequence mismatch)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error while establishing the connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached EOF while a packet was being read
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Transport failure during a command (2006 gone away, 2013 lost)
    #[error("Operational error ({code}): {message}")]
    Operational {
        /// `CR_SERVER_GONE_ERROR` or `CR_SERVER_LOST`, or the server code of an out-of-band ERR
        code: u16,
        /// Description of the failure
        message: String,
    },

    /// A command was issued while the connection cannot accept one
    #[error("Invalid connection state: {0}")]
    InvalidConnectionState(String),

    /// A value could not be decoded into the requested Rust type
    #[error("Decode error: {0}")]
    Decode(String),

    /// TLS error
    #[cfg(feature = "tokio-tls")]
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// Invalid usage (e.g., bad option, nested transactions)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// "MySQL server has gone away" for a failed write.
    pub fn gone_away(cause: impl std::fmt::Display) -> Self {
        Error::Operational {
            code: CR_SERVER_GONE_ERROR,
            message: format!("MySQL server has gone away ({cause})"),
        }
    }

    /// "Lost connection to MySQL server during query" for a failed read.
    pub fn lost(cause: impl std::fmt::Display) -> Self {
        Error::Operational {
            code: CR_SERVER_LOST,
            message: format!("Lost connection to MySQL server during query ({cause})"),
        }
    }

    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_)
            | Error::ConnectionClosed
            | Error::Operational { .. }
            | Error::Protocol(_) => true,
            #[cfg(feature = "tokio-tls")]
            Error::Tls(_) => true,
            _ => false,
        }
    }

    /// MySQL error number, for server errors and client transport errors.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Server(err) | Error::AccessDenied(err) => Some(err.code),
            Error::Operational { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The SQLSTATE if this is a server error.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Error::Server(err) | Error::AccessDenied(err) if !err.sql_state.is_empty() => {
                Some(&err.sql_state)
            }
            _ => None,
        }
    }

    /// Reclassify an error raised while a command was in flight.
    ///
    /// Transport failures become `Operational`: 2006 when `writing`, 2013 otherwise.
    pub(crate) fn into_command_error(self, writing: bool) -> Self {
        match self {
            Error::Io(err) if writing => Error::gone_away(err),
            Error::Io(err) => Error::lost(err),
            Error::ConnectionClosed if writing => Error::gone_away("connection closed"),
            Error::ConnectionClosed => Error::lost("connection closed"),
            other => other,
        }
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}

/// Lets `Conn::new` take an `Opts` directly.
impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}
