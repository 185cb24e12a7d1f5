//! String type implementations (&str, String).

use crate::error::{Error, Result};
use crate::protocol::codec::write_lenenc_bytes;
use crate::protocol::column::ColumnDefinition;
use crate::protocol::constant::ColumnType;
use crate::value::Value;

use super::{FromWireValue, ToWireValue, is_string_like};

fn utf8(bytes: &[u8]) -> Result<&str> {
    simdutf8::compat::from_utf8(bytes).map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))
}

impl<'a> FromWireValue<'a> for &'a str {
    fn from_text(_col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self> {
        utf8(bytes)
    }

    fn from_binary(col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self> {
        if !is_string_like(col.column_type) {
            return Err(Error::Decode(format!(
                "cannot borrow {:?} as str",
                col.column_type
            )));
        }
        utf8(bytes)
    }
}

impl FromWireValue<'_> for String {
    fn from_text(_col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        utf8(bytes).map(|s| s.to_owned())
    }

    /// Non-string columns are rendered the way the text protocol sends them.
    fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        if is_string_like(col.column_type) {
            return utf8(bytes).map(|s| s.to_owned());
        }
        Value::from_binary(col, bytes)?
            .to_text()
            .ok_or_else(|| Error::Decode("unexpected NULL value".into()))
    }
}

impl ToWireValue for str {
    fn column_type(&self) -> ColumnType {
        ColumnType::MYSQL_TYPE_VAR_STRING
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        write_lenenc_bytes(buf, self.as_bytes());
        Ok(())
    }
}

impl ToWireValue for String {
    fn column_type(&self) -> ColumnType {
        ColumnType::MYSQL_TYPE_VAR_STRING
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        self.as_str().encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::column::tests::column_payload;

    fn col(column_type: ColumnType) -> ColumnDefinition {
        ColumnDefinition::parse(&column_payload("c", column_type, 0, 45)).unwrap()
    }

    #[test]
    fn text_accepts_any_column() {
        let c = col(ColumnType::MYSQL_TYPE_LONGLONG);
        assert_eq!(String::from_text(&c, b"123").unwrap(), "123");
        assert_eq!(<&str>::from_text(&c, "日本".as_bytes()).unwrap(), "日本");
        assert!(String::from_text(&c, &[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn binary_numbers_render_as_text() {
        let c = col(ColumnType::MYSQL_TYPE_LONGLONG);
        assert_eq!(String::from_binary(&c, &(-9i64).to_le_bytes()).unwrap(), "-9");
        assert!(<&str>::from_binary(&c, &(-9i64).to_le_bytes()).is_err());

        let s = col(ColumnType::MYSQL_TYPE_VAR_STRING);
        assert_eq!(<&str>::from_binary(&s, b"abc").unwrap(), "abc");
    }

    #[test]
    fn encode_lenenc() {
        let mut buf = Vec::new();
        "héllo".encode(&mut buf).unwrap();
        assert_eq!(buf[0], 6);
        assert_eq!(&buf[1..], "héllo".as_bytes());
    }
}
