//! MySQL client/server protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `packet`: Frame header, sequence numbering and payload splitting
//! - `codec`: Fixed-width and length-encoded primitives
//! - `handshake`, `auth`: Connection phase packets and authentication plugins
//! - `command`: Command packets sent by the client
//! - `response`, `column`, `row`: OK/ERR/EOF packets and result sets
//! - `constant`: Capability, status and column flags, column types, charsets

pub mod auth;
pub mod codec;
pub mod column;
pub mod command;
pub mod constant;
pub mod handshake;
pub mod packet;
pub mod response;
pub mod row;

// Re-export commonly used types
pub use column::ColumnDefinition;
pub use command::Command;
pub use constant::{CapabilityFlags, ColumnType, StatusFlags};
pub use response::OkPacket;
pub use row::{RowFormat, RowPayload};
