//! Connection phase packets: the server greeting, SSLRequest,
//! HandshakeResponse41 and AuthSwitchRequest.

use crate::error::{Error, Result};
use crate::protocol::codec::{
    read_bytes, read_cstr, read_u8, read_u16, read_u32, write_bytes, write_cstr, write_lenenc_bytes,
    write_u8, write_u32,
};
use crate::protocol::constant::{CapabilityFlags, StatusFlags, auth_plugin};

/// The only greeting version this client speaks.
const PROTOCOL_VERSION: u8 = 10;

/// First byte of an AuthSwitchRequest.
pub const AUTH_SWITCH_HEADER: u8 = 0xFE;
/// First byte of an AuthMoreData packet.
pub const AUTH_MORE_DATA_HEADER: u8 = 0x01;

/// Initial handshake packet (protocol v10) sent by the server.
#[derive(Debug, Clone)]
pub struct Greeting {
    pub server_version: String,
    pub connection_id: u32,
    /// Scramble, both parts concatenated, without the trailing NUL
    pub auth_data: Vec<u8>,
    pub capabilities: CapabilityFlags,
    pub collation: u8,
    pub status_flags: StatusFlags,
    pub auth_plugin_name: String,
}

impl Greeting {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (version, data) = read_u8(payload)?;
        if version != PROTOCOL_VERSION {
            return Err(Error::Protocol(format!(
                "unsupported handshake protocol version {version}"
            )));
        }
        let (server_version, data) = read_cstr(data)?;
        let (connection_id, data) = read_u32(data)?;
        let (auth_part1, data) = read_bytes(data, 8)?;
        let (_filler, data) = read_u8(data)?;
        let (caps_lower, data) = read_u16(data)?;

        let mut greeting = Greeting {
            server_version: server_version.to_string(),
            connection_id,
            auth_data: auth_part1.to_vec(),
            capabilities: CapabilityFlags::new(u32::from(caps_lower)),
            collation: 0,
            status_flags: StatusFlags::default(),
            auth_plugin_name: auth_plugin::MYSQL_NATIVE_PASSWORD.to_string(),
        };
        if data.is_empty() {
            return Ok(greeting);
        }

        let (collation, data) = read_u8(data)?;
        let (status, data) = read_u16(data)?;
        let (caps_upper, data) = read_u16(data)?;
        let (auth_data_len, data) = read_u8(data)?;
        let (_reserved, data) = read_bytes(data, 10)?;
        let capabilities = CapabilityFlags::new(u32::from(caps_lower) | (u32::from(caps_upper) << 16));
        greeting.collation = collation;
        greeting.status_flags = StatusFlags::new(status);
        greeting.capabilities = capabilities;

        let mut data = data;
        if capabilities.has(CapabilityFlags::CLIENT_SECURE_CONNECTION) {
            let part2_len = usize::from(auth_data_len).saturating_sub(8).max(13);
            let (part2, rest) = read_bytes(data, part2_len.min(data.len()))?;
            let part2 = part2.strip_suffix(&[0]).unwrap_or(part2);
            greeting.auth_data.extend_from_slice(part2);
            data = rest;
        }

        if capabilities.has(CapabilityFlags::CLIENT_PLUGIN_AUTH) && !data.is_empty() {
            // Some servers omit the terminating NUL on the plugin name.
            let name = match read_cstr(data) {
                Ok((name, _)) => name.to_string(),
                Err(_) => String::from_utf8_lossy(data).into_owned(),
            };
            greeting.auth_plugin_name = name;
        }

        Ok(greeting)
    }
}

/// Fields of the HandshakeResponse41 (and its SSLRequest prefix).
#[derive(Debug, Clone)]
pub struct HandshakeResponse<'a> {
    pub capabilities: CapabilityFlags,
    pub max_packet_size: u32,
    pub collation: u8,
    pub user: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin_name: &'a str,
}

impl HandshakeResponse<'_> {
    /// Write the 32-byte SSLRequest packet.
    pub fn write_ssl_request(&self, out: &mut Vec<u8>) {
        write_u32(out, self.capabilities.0);
        write_u32(out, self.max_packet_size);
        write_u8(out, self.collation);
        write_bytes(out, &[0u8; 23]);
    }

    /// Write the full HandshakeResponse41 packet.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        self.write_ssl_request(out);
        write_cstr(out, self.user);

        if self.capabilities.has(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
            write_lenenc_bytes(out, self.auth_response);
        } else {
            let len = u8::try_from(self.auth_response.len()).map_err(|_| {
                Error::Protocol("auth response longer than 255 bytes".into())
            })?;
            write_u8(out, len);
            write_bytes(out, self.auth_response);
        }

        if let Some(database) = self.database
            && self.capabilities.has(CapabilityFlags::CLIENT_CONNECT_WITH_DB)
        {
            write_cstr(out, database);
        }

        if self.capabilities.has(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            write_cstr(out, self.auth_plugin_name);
        }
        Ok(())
    }
}

/// AuthSwitchRequest: the server asks for a different plugin.
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest {
    pub plugin_name: String,
    pub auth_data: Vec<u8>,
}

impl AuthSwitchRequest {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, data) = read_u8(payload)?;
        if header != AUTH_SWITCH_HEADER {
            return Err(Error::Protocol(format!(
                "expected AuthSwitchRequest, got header 0x{header:02X}"
            )));
        }
        let (plugin_name, data) = read_cstr(data)?;
        let auth_data = data.strip_suffix(&[0]).unwrap_or(data);
        Ok(Self {
            plugin_name: plugin_name.to_string(),
            auth_data: auth_data.to_vec(),
        })
    }
}
