//! Byte type implementations (`&[u8]`, `Vec<u8>`).

use crate::error::{Error, Result};
use crate::protocol::codec::write_lenenc_bytes;
use crate::protocol::column::ColumnDefinition;
use crate::protocol::constant::ColumnType;

use super::{FromWireValue, ToWireValue, is_string_like};

impl<'a> FromWireValue<'a> for &'a [u8] {
    fn from_text(_col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self> {
        Ok(bytes)
    }

    fn from_binary(col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self> {
        if !is_string_like(col.column_type) {
            return Err(Error::Decode(format!(
                "cannot decode {:?} as bytes",
                col.column_type
            )));
        }
        Ok(bytes)
    }
}

impl FromWireValue<'_> for Vec<u8> {
    fn from_text(_col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }

    fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        <&[u8]>::from_binary(col, bytes).map(<[u8]>::to_vec)
    }
}

impl ToWireValue for [u8] {
    fn column_type(&self) -> ColumnType {
        ColumnType::MYSQL_TYPE_BLOB
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        write_lenenc_bytes(buf, self);
        Ok(())
    }
}

impl ToWireValue for Vec<u8> {
    fn column_type(&self) -> ColumnType {
        ColumnType::MYSQL_TYPE_BLOB
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        self.as_slice().encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::column::tests::column_payload;

    #[test]
    fn blob_roundtrip_types() {
        let blob = ColumnDefinition::parse(&column_payload("b", ColumnType::MYSQL_TYPE_BLOB, 0, 63))
            .unwrap();
        let raw = [0u8, 0xFF, 0x27];
        assert_eq!(<&[u8]>::from_binary(&blob, &raw).unwrap(), &raw);
        assert_eq!(Vec::<u8>::from_text(&blob, &raw).unwrap(), raw.to_vec());

        let int = ColumnDefinition::parse(&column_payload("i", ColumnType::MYSQL_TYPE_LONG, 0, 63))
            .unwrap();
        assert!(Vec::<u8>::from_binary(&int, &[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn encode_blob() {
        let mut buf = Vec::new();
        vec![1u8, 2, 3].encode(&mut buf).unwrap();
        assert_eq!(buf, [3, 1, 2, 3]);
    }
}
