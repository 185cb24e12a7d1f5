//! Column definition packets (ColumnDefinition41).

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::{read_lenenc_int, read_lenenc_str};
use crate::protocol::constant::{ColumnFlags, ColumnType};

/// Fixed-width tail that follows the six strings of a column definition.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct ColumnDefinitionTail {
    charset: U16,
    column_length: U32,
    column_type: u8,
    flags: U16,
    decimals: u8,
    _reserved: [u8; 2],
}

/// Metadata for one result-set column or statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    /// Collation id of the column
    pub charset: u16,
    /// Maximum display length
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl ColumnDefinition {
    /// Parse a ColumnDefinition41 payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (_catalog, data) = read_lenenc_str(payload)?;
        let (schema, data) = read_lenenc_str(data)?;
        let (table, data) = read_lenenc_str(data)?;
        let (org_table, data) = read_lenenc_str(data)?;
        let (name, data) = read_lenenc_str(data)?;
        let (org_name, data) = read_lenenc_str(data)?;
        let (fixed_len, data) = read_lenenc_int(data)?;
        if fixed_len < 0x0a {
            return Err(Error::Protocol(format!(
                "column definition: fixed-length block too short: {fixed_len}"
            )));
        }

        // Older servers omit the two reserved bytes.
        let mut tail_bytes = [0u8; 12];
        let available = data.len().min(12);
        if available < 10 {
            return Err(Error::Protocol(format!(
                "column definition: truncated tail: {available} bytes"
            )));
        }
        tail_bytes[..available].copy_from_slice(&data[..available]);
        let tail = ColumnDefinitionTail::read_from_bytes(&tail_bytes)
            .map_err(|e| Error::Protocol(format!("column definition tail: {e:?}")))?;

        let column_type = ColumnType::from_u8(tail.column_type).ok_or_else(|| {
            Error::Protocol(format!("unknown column type 0x{:02X}", tail.column_type))
        })?;

        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
            org_table: org_table.to_string(),
            name: name.to_string(),
            org_name: org_name.to_string(),
            charset: tail.charset.get(),
            column_length: tail.column_length.get(),
            column_type,
            flags: ColumnFlags::new(tail.flags.get()),
            decimals: tail.decimals,
        })
    }

    /// Whether the column holds raw bytes rather than text.
    pub fn is_binary(&self) -> bool {
        const BINARY_COLLATION: u16 = 63;
        self.charset == BINARY_COLLATION
            && matches!(
                self.column_type,
                ColumnType::MYSQL_TYPE_TINY_BLOB
                    | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
                    | ColumnType::MYSQL_TYPE_LONG_BLOB
                    | ColumnType::MYSQL_TYPE_BLOB
                    | ColumnType::MYSQL_TYPE_VAR_STRING
                    | ColumnType::MYSQL_TYPE_STRING
                    | ColumnType::MYSQL_TYPE_VARCHAR
                    | ColumnType::MYSQL_TYPE_GEOMETRY
                    | ColumnType::MYSQL_TYPE_BIT
            )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::codec::{write_lenenc_bytes, write_u16, write_u32};

    /// Build a column definition payload for tests across the crate.
    pub(crate) fn column_payload(name: &str, column_type: ColumnType, flags: u16, charset: u16) -> Vec<u8> {
        let mut out = Vec::new();
        write_lenenc_bytes(&mut out, b"def");
        write_lenenc_bytes(&mut out, b"test");
        write_lenenc_bytes(&mut out, b"t");
        write_lenenc_bytes(&mut out, b"t");
        write_lenenc_bytes(&mut out, name.as_bytes());
        write_lenenc_bytes(&mut out, name.as_bytes());
        out.push(0x0c);
        write_u16(&mut out, charset);
        write_u32(&mut out, 11);
        out.push(column_type as u8);
        write_u16(&mut out, flags);
        out.push(0);
        out.extend_from_slice(&[0, 0]);
        out
    }

    #[test]
    fn parse_column_definition() {
        let payload = column_payload(
            "id",
            ColumnType::MYSQL_TYPE_LONG,
            ColumnFlags::UNSIGNED_FLAG | ColumnFlags::NOT_NULL_FLAG,
            63,
        );
        let col = ColumnDefinition::parse(&payload).unwrap();
        assert_eq!(col.name, "id");
        assert_eq!(col.schema, "test");
        assert_eq!(col.table, "t");
        assert_eq!(col.column_type, ColumnType::MYSQL_TYPE_LONG);
        assert!(col.flags.is_unsigned());
        assert_eq!(col.column_length, 11);
        assert!(!col.is_binary());
    }

    #[test]
    fn parse_without_reserved_bytes() {
        let mut payload = column_payload("b", ColumnType::MYSQL_TYPE_BLOB, 0, 63);
        payload.truncate(payload.len() - 2);
        let col = ColumnDefinition::parse(&payload).unwrap();
        assert!(col.is_binary());
    }

    #[test]
    fn unknown_column_type() {
        let mut payload = column_payload("x", ColumnType::MYSQL_TYPE_LONG, 0, 45);
        let type_pos = payload.len() - 6;
        payload[type_pos] = 0x40;
        assert!(ColumnDefinition::parse(&payload).is_err());
    }
}
