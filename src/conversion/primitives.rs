//! Primitive type implementations (bool, integers, floats).

use crate::error::{Error, Result};
use crate::protocol::column::ColumnDefinition;
use crate::protocol::constant::ColumnType;

use super::{FromWireValue, ToWireValue};

fn text_str(bytes: &[u8]) -> Result<&str> {
    simdutf8::compat::from_utf8(bytes).map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))
}

/// Read a binary integer whose width and signedness come from the column.
fn binary_integer(col: &ColumnDefinition, bytes: &[u8]) -> Result<i128> {
    let unsigned = col.flags.is_unsigned();
    let invalid = || {
        Error::Decode(format!(
            "invalid {:?} length: {}",
            col.column_type,
            bytes.len()
        ))
    };
    let value = match col.column_type {
        ColumnType::MYSQL_TYPE_TINY => {
            let arr: [u8; 1] = bytes.try_into().map_err(|_| invalid())?;
            if unsigned {
                i128::from(arr[0])
            } else {
                i128::from(arr[0] as i8)
            }
        }
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
            let arr: [u8; 2] = bytes.try_into().map_err(|_| invalid())?;
            if unsigned || col.column_type == ColumnType::MYSQL_TYPE_YEAR {
                i128::from(u16::from_le_bytes(arr))
            } else {
                i128::from(i16::from_le_bytes(arr))
            }
        }
        ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| invalid())?;
            if unsigned {
                i128::from(u32::from_le_bytes(arr))
            } else {
                i128::from(i32::from_le_bytes(arr))
            }
        }
        ColumnType::MYSQL_TYPE_LONGLONG => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| invalid())?;
            if unsigned {
                i128::from(u64::from_le_bytes(arr))
            } else {
                i128::from(i64::from_le_bytes(arr))
            }
        }
        other => {
            return Err(Error::Decode(format!(
                "cannot decode {:?} as integer",
                other
            )));
        }
    };
    Ok(value)
}

// === Boolean ===

impl FromWireValue<'_> for bool {
    fn from_text(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        if !col.column_type.is_integer() && col.column_type != ColumnType::MYSQL_TYPE_BIT {
            return Err(Error::Decode(format!(
                "cannot decode {:?} as bool",
                col.column_type
            )));
        }
        match bytes {
            b"0" | [0] => Ok(false),
            b"1" | [1] => Ok(true),
            _ => Err(Error::Decode(format!(
                "invalid boolean: {:?}",
                String::from_utf8_lossy(bytes)
            ))),
        }
    }

    fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        if col.column_type == ColumnType::MYSQL_TYPE_BIT {
            return Ok(bytes.iter().any(|b| *b != 0));
        }
        Ok(binary_integer(col, bytes)? != 0)
    }
}

impl ToWireValue for bool {
    fn column_type(&self) -> ColumnType {
        ColumnType::MYSQL_TYPE_TINY
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(u8::from(*self));
        Ok(())
    }
}

// === Integer types ===

macro_rules! impl_integer {
    ($($T:ty => $column_type:ident, $unsigned:expr;)+) => {
        $(
            impl FromWireValue<'_> for $T {
                fn from_text(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
                    if !col.column_type.is_integer() {
                        return Err(Error::Decode(format!(
                            "cannot decode {:?} as {}",
                            col.column_type,
                            stringify!($T)
                        )));
                    }
                    let s = text_str(bytes)?;
                    s.parse().map_err(|e| {
                        Error::Decode(format!("invalid {} {:?}: {}", stringify!($T), s, e))
                    })
                }

                fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
                    let value = binary_integer(col, bytes)?;
                    <$T>::try_from(value).map_err(|_| {
                        Error::Decode(format!("{} out of range for {}", value, stringify!($T)))
                    })
                }
            }

            impl ToWireValue for $T {
                fn column_type(&self) -> ColumnType {
                    ColumnType::$column_type
                }

                fn is_unsigned(&self) -> bool {
                    $unsigned
                }

                fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
                    buf.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }
            }
        )+
    };
}

impl_integer! {
    i8 => MYSQL_TYPE_TINY, false;
    i16 => MYSQL_TYPE_SHORT, false;
    i32 => MYSQL_TYPE_LONG, false;
    i64 => MYSQL_TYPE_LONGLONG, false;
    u8 => MYSQL_TYPE_TINY, true;
    u16 => MYSQL_TYPE_SHORT, true;
    u32 => MYSQL_TYPE_LONG, true;
    u64 => MYSQL_TYPE_LONGLONG, true;
}

// === Float types ===

fn is_numeric(column_type: ColumnType) -> bool {
    column_type.is_integer()
        || matches!(
            column_type,
            ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL
        )
}

fn binary_f64(col: &ColumnDefinition, bytes: &[u8]) -> Result<f64> {
    match col.column_type {
        ColumnType::MYSQL_TYPE_FLOAT => {
            let arr: [u8; 4] = bytes
                .try_into()
                .map_err(|_| Error::Decode(format!("invalid f32 length: {}", bytes.len())))?;
            Ok(f64::from(f32::from_le_bytes(arr)))
        }
        ColumnType::MYSQL_TYPE_DOUBLE => {
            let arr: [u8; 8] = bytes
                .try_into()
                .map_err(|_| Error::Decode(format!("invalid f64 length: {}", bytes.len())))?;
            Ok(f64::from_le_bytes(arr))
        }
        // DECIMAL is sent as a string even in the binary protocol
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            let s = text_str(bytes)?;
            s.parse()
                .map_err(|e| Error::Decode(format!("invalid decimal {:?}: {}", s, e)))
        }
        t if t.is_integer() => Ok(binary_integer(col, bytes)? as f64),
        other => Err(Error::Decode(format!("cannot decode {:?} as float", other))),
    }
}

impl FromWireValue<'_> for f64 {
    fn from_text(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        if !is_numeric(col.column_type) {
            return Err(Error::Decode(format!(
                "cannot decode {:?} as f64",
                col.column_type
            )));
        }
        let s = text_str(bytes)?;
        s.parse()
            .map_err(|e| Error::Decode(format!("invalid f64 {:?}: {}", s, e)))
    }

    fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        binary_f64(col, bytes)
    }
}

impl FromWireValue<'_> for f32 {
    fn from_text(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        if !is_numeric(col.column_type) {
            return Err(Error::Decode(format!(
                "cannot decode {:?} as f32",
                col.column_type
            )));
        }
        let s = text_str(bytes)?;
        s.parse()
            .map_err(|e| Error::Decode(format!("invalid f32 {:?}: {}", s, e)))
    }

    fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        if col.column_type == ColumnType::MYSQL_TYPE_FLOAT {
            let arr: [u8; 4] = bytes
                .try_into()
                .map_err(|_| Error::Decode(format!("invalid f32 length: {}", bytes.len())))?;
            return Ok(f32::from_le_bytes(arr));
        }
        Ok(binary_f64(col, bytes)? as f32)
    }
}

impl ToWireValue for f32 {
    fn column_type(&self) -> ColumnType {
        ColumnType::MYSQL_TYPE_FLOAT
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl ToWireValue for f64 {
    fn column_type(&self) -> ColumnType {
        ColumnType::MYSQL_TYPE_DOUBLE
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}
