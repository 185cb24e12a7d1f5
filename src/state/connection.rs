//! Connection phase state machine: greeting, optional TLS upgrade and authentication.

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::opts::{Opts, SslMode};
use crate::protocol::auth::{
    FAST_AUTH_SUCCESS, PERFORM_FULL_AUTH, REQUEST_PUBLIC_KEY, cleartext_password,
    encrypt_password, initial_response,
};
use crate::protocol::constant::{CapabilityFlags, StatusFlags, auth_plugin};
use crate::protocol::handshake::{
    AUTH_MORE_DATA_HEADER, AUTH_SWITCH_HEADER, AuthSwitchRequest, Greeting, HandshakeResponse,
};
use crate::protocol::response::{ERR_HEADER, OK_HEADER, OkPacket, parse_err};

use super::StateMachine;
use super::action::Action;

/// Connection state during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initial,
    WaitingGreeting,
    TlsUpgrade,
    WaitingAuthResult,
    WaitingPublicKey,
    Ready,
    Failed,
}

/// Handshake state machine.
pub struct ConnectionStateMachine {
    state: ConnectionState,
    user: String,
    password: Vec<u8>,
    database: Option<String>,
    collation: u8,
    ssl_mode: SslMode,
    max_allowed_packet: u32,
    tls_available: bool,
    secure: bool,
    capabilities: CapabilityFlags,
    greeting: Option<Greeting>,
    auth_plugin: String,
    auth_data: Vec<u8>,
    status_flags: StatusFlags,
}

impl ConnectionStateMachine {
    /// Create a handshake state machine.
    ///
    /// `tls_available` says whether the caller can perform `Action::UpgradeTls`.
    /// `secure_transport` is true for Unix sockets, which may carry cleartext passwords.
    pub fn new(opts: &Opts, tls_available: bool, secure_transport: bool) -> Result<Self> {
        Ok(Self {
            state: ConnectionState::Initial,
            user: opts.user.clone(),
            password: opts.password.clone().unwrap_or_default().into_bytes(),
            database: opts.database.clone(),
            collation: opts.collation()?,
            ssl_mode: opts.ssl_mode,
            max_allowed_packet: opts.max_allowed_packet,
            tls_available,
            secure: secure_transport,
            capabilities: CapabilityFlags::default(),
            greeting: None,
            auth_plugin: String::new(),
            auth_data: Vec::new(),
            status_flags: StatusFlags::default(),
        })
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Negotiated capabilities (client request ∩ server).
    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    /// The server greeting, once received.
    pub fn greeting(&self) -> Option<&Greeting> {
        self.greeting.as_ref()
    }

    /// Status flags from the OK that ended authentication.
    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }

    /// Authentication plugin in use at the end of the handshake.
    pub fn auth_plugin(&self) -> &str {
        &self.auth_plugin
    }

    /// Whether the connection was upgraded to TLS.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    fn fail(&mut self, err: Error) -> Error {
        self.state = ConnectionState::Failed;
        err
    }

    fn handle_greeting(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let payload = &buffer_set.read_buffer;
        if payload.first() == Some(&ERR_HEADER) {
            return Err(handshake_error(payload));
        }
        let greeting = Greeting::parse(payload)?;
        tracing::debug!(
            server_version = %greeting.server_version,
            connection_id = greeting.connection_id,
            plugin = %greeting.auth_plugin_name,
            "received server greeting"
        );

        if !greeting.capabilities.has(CapabilityFlags::CLIENT_PROTOCOL_41) {
            return Err(Error::Unsupported(
                "server does not support protocol 4.1".into(),
            ));
        }

        let server_ssl = greeting.capabilities.has(CapabilityFlags::CLIENT_SSL);
        let use_tls = match self.ssl_mode {
            SslMode::Disable => false,
            SslMode::Prefer => server_ssl && self.tls_available && !self.secure,
            SslMode::Require => {
                if !self.tls_available {
                    return Err(Error::Unsupported(
                        "TLS requested but tokio-tls feature not enabled".into(),
                    ));
                }
                if !server_ssl {
                    return Err(Error::Unsupported(
                        "TLS required but not supported by server".into(),
                    ));
                }
                true
            }
        };

        let mut requested = CapabilityFlags::new(CapabilityFlags::CLIENT_DEFAULT);
        if self.database.is_some() {
            requested.set(CapabilityFlags::CLIENT_CONNECT_WITH_DB);
        }
        if use_tls {
            requested.set(CapabilityFlags::CLIENT_SSL);
        }
        self.capabilities = requested.intersect(greeting.capabilities);
        self.auth_plugin = greeting.auth_plugin_name.clone();
        self.auth_data = greeting.auth_data.clone();
        self.greeting = Some(greeting);

        if use_tls {
            buffer_set.write_buffer.clear();
            self.handshake_response().write_ssl_request(&mut buffer_set.write_buffer);
            self.state = ConnectionState::TlsUpgrade;
            return Ok(Action::UpgradeTls);
        }

        self.write_handshake_response(buffer_set)
    }

    fn handshake_response(&self) -> HandshakeResponse<'_> {
        HandshakeResponse {
            capabilities: self.capabilities,
            max_packet_size: self.max_allowed_packet,
            collation: self.collation,
            user: &self.user,
            auth_response: &[],
            database: self.database.as_deref(),
            auth_plugin_name: &self.auth_plugin,
        }
    }

    fn write_handshake_response(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let auth_response =
            match initial_response(&self.auth_plugin, &self.password, &self.auth_data, self.secure) {
                Ok(response) => response,
                Err(Error::AuthPluginUnsupported(name)) => {
                    // The server switches plugins if the account needs another one.
                    tracing::debug!(plugin = %name, "unknown default plugin, offering mysql_native_password");
                    self.auth_plugin = auth_plugin::MYSQL_NATIVE_PASSWORD.to_string();
                    initial_response(&self.auth_plugin, &self.password, &self.auth_data, self.secure)?
                }
                Err(e) => return Err(e),
            };

        buffer_set.write_buffer.clear();
        HandshakeResponse {
            auth_response: &auth_response,
            ..self.handshake_response()
        }
        .write(&mut buffer_set.write_buffer)?;
        self.state = ConnectionState::WaitingAuthResult;
        Ok(Action::WriteAndReadPacket)
    }

    fn handle_auth_result(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let payload = &buffer_set.read_buffer;
        match payload.first().copied() {
            Some(OK_HEADER) => {
                let ok = OkPacket::parse(payload, self.capabilities)?;
                self.status_flags = ok.status_flags;
                self.state = ConnectionState::Ready;
                tracing::debug!(plugin = %self.auth_plugin, "authenticated");
                Ok(Action::Finished)
            }
            Some(ERR_HEADER) => Err(handshake_error(payload)),
            Some(AUTH_SWITCH_HEADER) => {
                let switch = AuthSwitchRequest::parse(payload)?;
                tracing::debug!(plugin = %switch.plugin_name, "server requested auth switch");
                let response =
                    initial_response(&switch.plugin_name, &self.password, &switch.auth_data, self.secure)?;
                self.auth_plugin = switch.plugin_name;
                self.auth_data = switch.auth_data;
                buffer_set.write_buffer.clear();
                buffer_set.write_buffer.extend_from_slice(&response);
                Ok(Action::WriteAndReadPacket)
            }
            Some(AUTH_MORE_DATA_HEADER) => self.handle_auth_more_data(buffer_set),
            Some(other) => Err(Error::Protocol(format!(
                "unexpected packet 0x{other:02X} during authentication"
            ))),
            None => Err(Error::Protocol("empty packet during authentication".into())),
        }
    }

    fn handle_auth_more_data(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let data = buffer_set.read_buffer.get(1..).unwrap_or_default();
        match self.auth_plugin.as_str() {
            auth_plugin::CACHING_SHA2_PASSWORD => match data.first().copied() {
                Some(FAST_AUTH_SUCCESS) => {
                    tracing::debug!("caching_sha2_password fast auth succeeded");
                    Ok(Action::ReadPacket)
                }
                Some(PERFORM_FULL_AUTH) => {
                    tracing::debug!("caching_sha2_password full auth");
                    self.full_auth(buffer_set)
                }
                // Some servers send the public key without being asked.
                Some(b'-') => self.send_encrypted_password(buffer_set),
                _ => Err(Error::Protocol(
                    "unexpected caching_sha2_password auth data".into(),
                )),
            },
            auth_plugin::SHA256_PASSWORD => self.send_encrypted_password(buffer_set),
            other => Err(Error::Protocol(format!(
                "unexpected auth data for plugin {other}"
            ))),
        }
    }

    fn full_auth(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        buffer_set.write_buffer.clear();
        if self.secure {
            buffer_set
                .write_buffer
                .extend_from_slice(&cleartext_password(&self.password));
            return Ok(Action::WriteAndReadPacket);
        }
        buffer_set.write_buffer.push(REQUEST_PUBLIC_KEY);
        self.state = ConnectionState::WaitingPublicKey;
        Ok(Action::WriteAndReadPacket)
    }

    fn handle_public_key(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        match buffer_set.read_buffer.first().copied() {
            Some(AUTH_MORE_DATA_HEADER) => {
                self.state = ConnectionState::WaitingAuthResult;
                self.send_encrypted_password(buffer_set)
            }
            Some(ERR_HEADER) => Err(handshake_error(&buffer_set.read_buffer)),
            _ => Err(Error::Protocol("expected server public key".into())),
        }
    }

    fn send_encrypted_password(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let pem = buffer_set.read_buffer.get(1..).unwrap_or_default();
        let encrypted = encrypt_password(&self.password, &self.auth_data, pem)?;
        buffer_set.write_buffer.clear();
        buffer_set.write_buffer.extend_from_slice(&encrypted);
        Ok(Action::WriteAndReadPacket)
    }
}

impl StateMachine for ConnectionStateMachine {
    fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let result = match self.state {
            ConnectionState::Initial => {
                self.state = ConnectionState::WaitingGreeting;
                Ok(Action::ReadPacket)
            }
            ConnectionState::WaitingGreeting => self.handle_greeting(buffer_set),
            ConnectionState::TlsUpgrade => {
                self.secure = true;
                tracing::debug!("connection upgraded to TLS");
                self.write_handshake_response(buffer_set)
            }
            ConnectionState::WaitingAuthResult => self.handle_auth_result(buffer_set),
            ConnectionState::WaitingPublicKey => self.handle_public_key(buffer_set),
            ConnectionState::Ready | ConnectionState::Failed => Err(Error::Protocol(format!(
                "Unexpected step in state {:?}",
                self.state
            ))),
        };
        result.map_err(|e| self.fail(e))
    }
}

/// Convert an ERR received during the handshake.
fn handshake_error(payload: &[u8]) -> Error {
    match parse_err(payload) {
        Ok(err) if err.is_access_denied() => Error::AccessDenied(err),
        Ok(err) => Error::Server(err),
        Err(e) => e,
    }
}
