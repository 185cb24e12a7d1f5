//! Text and binary result rows.
//!
//! Rows are split into per-column byte slices borrowed from the read
//! buffer. Interpreting the bytes is left to `FromWireValue`.

use crate::error::{Error, Result};
use crate::protocol::codec::{read_bytes, read_lenenc_bytes, read_lenenc_nullable, read_u8};
use crate::protocol::column::ColumnDefinition;
use crate::protocol::constant::ColumnType;

/// Wire format of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// Text protocol (COM_QUERY): every value is a string
    Text,
    /// Binary protocol (COM_STMT_EXECUTE): values use their type's packed encoding
    Binary,
}

/// A decoded row: one optional byte slice per column.
#[derive(Debug, Clone)]
pub struct RowPayload<'a> {
    format: RowFormat,
    values: Vec<Option<&'a [u8]>>,
}

impl<'a> RowPayload<'a> {
    pub fn format(&self) -> RowFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw bytes of column `idx`, `None` for NULL.
    pub fn get(&self, idx: usize) -> Option<&'a [u8]> {
        self.values.get(idx).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&'a [u8]>> + '_ {
        self.values.iter().copied()
    }

    /// Parse a text-protocol row: one lenenc string per column, `0xFB` for NULL.
    pub fn parse_text(payload: &'a [u8], num_columns: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(num_columns);
        let mut data = payload;
        for _ in 0..num_columns {
            let (value, rest) = read_lenenc_nullable(data)?;
            values.push(value);
            data = rest;
        }
        if !data.is_empty() {
            return Err(Error::Protocol(format!(
                "text row: {} trailing bytes",
                data.len()
            )));
        }
        Ok(Self {
            format: RowFormat::Text,
            values,
        })
    }

    /// Parse a binary-protocol row.
    ///
    /// Layout: header `0x00`, a NULL bitmap with a 2-bit offset, then the
    /// non-NULL values in column order.
    pub fn parse_binary(payload: &'a [u8], columns: &[ColumnDefinition]) -> Result<Self> {
        let (header, data) = read_u8(payload)?;
        if header != 0x00 {
            return Err(Error::Protocol(format!(
                "binary row: unexpected header 0x{header:02X}"
            )));
        }
        let (bitmap, mut data) = read_bytes(data, null_bitmap_len(columns.len(), 2))?;

        let mut values = Vec::with_capacity(columns.len());
        for (idx, col) in columns.iter().enumerate() {
            if is_null(bitmap, idx, 2) {
                values.push(None);
                continue;
            }
            let (value, rest) = split_binary_value(data, col.column_type)?;
            values.push(Some(value));
            data = rest;
        }
        Ok(Self {
            format: RowFormat::Binary,
            values,
        })
    }
}

/// Bytes needed for a NULL bitmap of `num_columns` bits starting at `offset`.
pub fn null_bitmap_len(num_columns: usize, offset: usize) -> usize {
    (num_columns + 7 + offset) / 8
}

fn is_null(bitmap: &[u8], idx: usize, offset: usize) -> bool {
    let bit = idx + offset;
    bitmap
        .get(bit / 8)
        .is_some_and(|byte| byte & (1 << (bit % 8)) != 0)
}

/// Split one binary-encoded value off the front of `data`.
///
/// Date and time values are returned without their length prefix.
fn split_binary_value(data: &[u8], column_type: ColumnType) -> Result<(&[u8], &[u8])> {
    match column_type {
        ColumnType::MYSQL_TYPE_NULL => Ok((&data[..0], data)),
        ColumnType::MYSQL_TYPE_TINY => read_bytes(data, 1),
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => read_bytes(data, 2),
        ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_FLOAT => read_bytes(data, 4),
        ColumnType::MYSQL_TYPE_LONGLONG | ColumnType::MYSQL_TYPE_DOUBLE => read_bytes(data, 8),
        t if t.is_temporal() => {
            let (len, rest) = read_u8(data)?;
            read_bytes(rest, usize::from(len))
        }
        _ => read_lenenc_bytes(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::column::tests::column_payload;
    use crate::protocol::codec::write_lenenc_bytes;

    fn col(column_type: ColumnType) -> ColumnDefinition {
        ColumnDefinition::parse(&column_payload("c", column_type, 0, 45)).unwrap()
    }

    #[test]
    fn text_row_with_null() {
        let mut payload = Vec::new();
        write_lenenc_bytes(&mut payload, b"42");
        payload.push(0xFB);
        write_lenenc_bytes(&mut payload, b"");
        let row = RowPayload::parse_text(&payload, 3).unwrap();
        assert_eq!(row.format(), RowFormat::Text);
        assert_eq!(row.get(0), Some(&b"42"[..]));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(2), Some(&b""[..]));
    }

    #[test]
    fn text_row_column_count_mismatch() {
        let mut payload = Vec::new();
        write_lenenc_bytes(&mut payload, b"a");
        write_lenenc_bytes(&mut payload, b"b");
        assert!(RowPayload::parse_text(&payload, 1).is_err());
        assert!(RowPayload::parse_text(&payload, 3).is_err());
    }

    #[test]
    fn bitmap_sizes() {
        assert_eq!(null_bitmap_len(1, 2), 1);
        assert_eq!(null_bitmap_len(6, 2), 1);
        assert_eq!(null_bitmap_len(7, 2), 2);
        assert_eq!(null_bitmap_len(8, 0), 1);
        assert_eq!(null_bitmap_len(9, 0), 2);
    }

    #[test]
    fn binary_row_mixed_types() {
        let columns = vec![
            col(ColumnType::MYSQL_TYPE_LONGLONG),
            col(ColumnType::MYSQL_TYPE_VAR_STRING),
            col(ColumnType::MYSQL_TYPE_TINY),
            col(ColumnType::MYSQL_TYPE_DATETIME),
            col(ColumnType::MYSQL_TYPE_DOUBLE),
        ];
        let mut payload = vec![0x00];
        // column 2 (TINY) is NULL: bit 2 + 2 = 4
        payload.push(1 << 4);
        payload.extend_from_slice(&7i64.to_le_bytes());
        write_lenenc_bytes(&mut payload, b"abc");
        payload.extend_from_slice(&[4, 0xE8, 0x07, 1, 2]);
        payload.extend_from_slice(&1.5f64.to_le_bytes());

        let row = RowPayload::parse_binary(&payload, &columns).unwrap();
        assert_eq!(row.len(), 5);
        assert_eq!(row.get(0), Some(&7i64.to_le_bytes()[..]));
        assert_eq!(row.get(1), Some(&b"abc"[..]));
        assert_eq!(row.get(2), None);
        assert_eq!(row.get(3), Some(&[0xE8, 0x07, 1, 2][..]));
        assert_eq!(row.get(4), Some(&1.5f64.to_le_bytes()[..]));
    }

    #[test]
    fn binary_row_truncated() {
        let columns = vec![col(ColumnType::MYSQL_TYPE_LONG)];
        let payload = [0x00, 0x00, 0x01, 0x02];
        assert!(RowPayload::parse_binary(&payload, &columns).is_err());
    }
}
