//! Generic response packets: OK, ERR and EOF.

use crate::error::{Error, Result, ServerError};
use crate::protocol::codec::{read_bytes, read_lenenc_bytes, read_lenenc_int, read_lenenc_str, read_u8, read_u16};
use crate::protocol::constant::{CapabilityFlags, StatusFlags};
use crate::protocol::packet::MAX_FRAME_LEN;

/// First byte of an OK packet.
pub const OK_HEADER: u8 = 0x00;
/// First byte of an EOF packet (and of an OK packet that ends a result set).
pub const EOF_HEADER: u8 = 0xFE;
/// First byte of an ERR packet.
pub const ERR_HEADER: u8 = 0xFF;
/// First byte of a LOCAL INFILE request.
pub const LOCAL_INFILE_HEADER: u8 = 0xFB;

/// Session state change types reported through `CLIENT_SESSION_TRACK`.
mod session_track {
    pub const SYSTEM_VARIABLES: u8 = 0x00;
    pub const SCHEMA: u8 = 0x01;
}

/// One entry of the session-state block in an OK packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// The default schema changed
    Schema(String),
    /// A tracked system variable changed
    SystemVariable {
        name: String,
        value: String,
    },
    /// A change type this client does not interpret
    Other(u8),
}

/// OK packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: StatusFlags,
    pub warnings: u16,
    pub info: String,
    pub session_changes: Vec<SessionChange>,
}

impl OkPacket {
    /// Parse an OK packet (header `0x00`, or `0xFE` when it terminates a result set).
    pub fn parse(payload: &[u8], capabilities: CapabilityFlags) -> Result<Self> {
        let (header, data) = read_u8(payload)?;
        if header != OK_HEADER && header != EOF_HEADER {
            return Err(Error::Protocol(format!(
                "expected OK packet, got header 0x{header:02X}"
            )));
        }
        let (affected_rows, data) = read_lenenc_int(data)?;
        let (last_insert_id, data) = read_lenenc_int(data)?;
        let (status, data) = read_u16(data)?;
        let (warnings, data) = read_u16(data)?;
        let status_flags = StatusFlags::new(status);

        let mut ok = OkPacket {
            affected_rows,
            last_insert_id,
            status_flags,
            warnings,
            info: String::new(),
            session_changes: Vec::new(),
        };

        if capabilities.has(CapabilityFlags::CLIENT_SESSION_TRACK) {
            if data.is_empty() {
                return Ok(ok);
            }
            let (info, data) = read_lenenc_bytes(data)?;
            ok.info = String::from_utf8_lossy(info).into_owned();
            if status_flags.has(StatusFlags::SERVER_SESSION_STATE_CHANGED) && !data.is_empty() {
                let (state, _) = read_lenenc_bytes(data)?;
                ok.session_changes = parse_session_changes(state)?;
            }
        } else {
            ok.info = String::from_utf8_lossy(data).into_owned();
        }

        Ok(ok)
    }
}

fn parse_session_changes(mut data: &[u8]) -> Result<Vec<SessionChange>> {
    let mut changes = Vec::new();
    while !data.is_empty() {
        let (kind, rest) = read_u8(data)?;
        let (entry, rest) = read_lenenc_bytes(rest)?;
        data = rest;
        let change = match kind {
            session_track::SCHEMA => {
                let (name, _) = read_lenenc_str(entry)?;
                SessionChange::Schema(name.to_string())
            }
            session_track::SYSTEM_VARIABLES => {
                let (name, entry) = read_lenenc_str(entry)?;
                let (value, _) = read_lenenc_str(entry)?;
                SessionChange::SystemVariable {
                    name: name.to_string(),
                    value: value.to_string(),
                }
            }
            other => {
                tracing::trace!(kind = other, "skipping session-track entry");
                SessionChange::Other(other)
            }
        };
        changes.push(change);
    }
    Ok(changes)
}

/// Parse an ERR packet into a `ServerError`.
pub fn parse_err(payload: &[u8]) -> Result<ServerError> {
    let (header, data) = read_u8(payload)?;
    if header != ERR_HEADER {
        return Err(Error::Protocol(format!(
            "expected ERR packet, got header 0x{header:02X}"
        )));
    }
    let (code, data) = read_u16(data)?;
    let (sql_state, message) = match data.split_first() {
        Some((b'#', rest)) => {
            let (state, rest) = read_bytes(rest, 5)?;
            (String::from_utf8_lossy(state).into_owned(), rest)
        }
        _ => (String::new(), data),
    };
    Ok(ServerError {
        code,
        sql_state,
        message: String::from_utf8_lossy(message).into_owned(),
    })
}

/// EOF packet (pre-`CLIENT_DEPRECATE_EOF` servers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EofPacket {
    pub warnings: u16,
    pub status_flags: StatusFlags,
}

impl EofPacket {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, data) = read_u8(payload)?;
        if header != EOF_HEADER {
            return Err(Error::Protocol(format!(
                "expected EOF packet, got header 0x{header:02X}"
            )));
        }
        let (warnings, data) = read_u16(data)?;
        let (status, _) = read_u16(data)?;
        Ok(Self {
            warnings,
            status_flags: StatusFlags::new(status),
        })
    }

    pub fn into_ok(self) -> OkPacket {
        OkPacket {
            status_flags: self.status_flags,
            warnings: self.warnings,
            ..OkPacket::default()
        }
    }
}

/// Whether `payload` is a classic EOF packet.
pub fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_HEADER) && payload.len() < 9
}

/// Whether `payload` ends a result set: an EOF, or an OK with `0xFE` header
/// under `CLIENT_DEPRECATE_EOF`.
pub fn is_result_set_terminator(payload: &[u8], capabilities: CapabilityFlags) -> bool {
    if capabilities.has(CapabilityFlags::CLIENT_DEPRECATE_EOF) {
        payload.first() == Some(&EOF_HEADER) && payload.len() < MAX_FRAME_LEN
    } else {
        is_eof(payload)
    }
}

/// Parse whichever terminator the negotiated capabilities imply.
pub fn parse_terminator(payload: &[u8], capabilities: CapabilityFlags) -> Result<OkPacket> {
    if capabilities.has(CapabilityFlags::CLIENT_DEPRECATE_EOF) {
        OkPacket::parse(payload, capabilities)
    } else {
        EofPacket::parse(payload).map(EofPacket::into_ok)
    }
}
