//! Type encoding and decoding for the MySQL wire protocol.
//!
//! This module provides traits and implementations for converting between
//! Rust types and MySQL column values in both the text protocol
//! (COM_QUERY) and the binary protocol (COM_STMT_EXECUTE).

mod bytes;
mod primitives;
mod row;
mod string;

use crate::error::{Error, Result};
use crate::protocol::column::ColumnDefinition;
use crate::protocol::constant::ColumnType;
use crate::value::Value;
pub use row::FromRow;

/// Trait for decoding MySQL values into Rust types.
///
/// - `from_null()` - Handle NULL values
/// - `from_text()` - Decode a text-protocol value (always a string on the wire)
/// - `from_binary()` - Decode a binary-protocol value
///
/// The column definition lets implementations check the column type and
/// reject incompatible columns with clear error messages.
pub trait FromWireValue<'a>: Sized {
    /// Decode from NULL value.
    ///
    /// Default implementation returns an error. Override for types that can
    /// represent NULL (like `Option<T>`).
    fn from_null() -> Result<Self> {
        Err(Error::Decode("unexpected NULL value".into()))
    }

    /// Decode from text-protocol bytes.
    fn from_text(col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self>;

    /// Decode from binary-protocol bytes.
    ///
    /// Integers and floats are little-endian with a width given by the column
    /// type. Dates and times arrive without their length prefix.
    fn from_binary(col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self>;
}

/// Trait for encoding Rust values as COM_STMT_EXECUTE parameters.
pub trait ToWireValue {
    /// The type sent in the parameter type block.
    fn column_type(&self) -> ColumnType;

    /// Whether the unsigned bit (0x80) is set in the parameter type block.
    fn is_unsigned(&self) -> bool {
        false
    }

    /// NULL values are flagged in the bitmap and write no value bytes.
    fn is_null(&self) -> bool {
        false
    }

    /// Append the binary encoding of the value.
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()>;
}

/// Trait for encoding multiple parameters.
pub trait ToParams {
    /// Number of parameters.
    fn param_count(&self) -> usize;

    /// Set bit `i` of `bitmap` for every NULL parameter `i`.
    fn write_null_bitmap(&self, bitmap: &mut [u8]);

    /// Write the `(type, flags)` pair of every parameter.
    fn write_types(&self, out: &mut Vec<u8>);

    /// Write the values of the non-NULL parameters.
    fn write_values(&self, out: &mut Vec<u8>) -> Result<()>;
}

fn write_type<T: ToWireValue + ?Sized>(value: &T, out: &mut Vec<u8>) {
    out.push(value.column_type() as u8);
    out.push(if value.is_unsigned() { 0x80 } else { 0x00 });
}

fn set_null_bit<T: ToWireValue + ?Sized>(value: &T, idx: usize, bitmap: &mut [u8]) {
    if value.is_null()
        && let Some(byte) = bitmap.get_mut(idx / 8)
    {
        *byte |= 1 << (idx % 8);
    }
}

fn write_value<T: ToWireValue + ?Sized>(value: &T, out: &mut Vec<u8>) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }
    value.encode(out)
}

/// Column types whose binary encoding is a length-encoded string.
pub(crate) fn is_string_like(column_type: ColumnType) -> bool {
    !(column_type.is_integer()
        || column_type.is_temporal()
        || matches!(
            column_type,
            ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_NULL
        ))
}

// === Option<T> - NULL handling ===

impl<'a, T: FromWireValue<'a>> FromWireValue<'a> for Option<T> {
    fn from_null() -> Result<Self> {
        Ok(None)
    }

    fn from_text(col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self> {
        T::from_text(col, bytes).map(Some)
    }

    fn from_binary(col: &ColumnDefinition, bytes: &'a [u8]) -> Result<Self> {
        T::from_binary(col, bytes).map(Some)
    }
}

impl<T: ToWireValue> ToWireValue for Option<T> {
    fn column_type(&self) -> ColumnType {
        match self {
            Some(v) => v.column_type(),
            None => ColumnType::MYSQL_TYPE_NULL,
        }
    }

    fn is_unsigned(&self) -> bool {
        self.as_ref().is_some_and(ToWireValue::is_unsigned)
    }

    fn is_null(&self) -> bool {
        self.as_ref().is_none_or(ToWireValue::is_null)
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Some(v) => v.encode(buf),
            None => Ok(()),
        }
    }
}

// === Reference support ===

impl<T: ToWireValue + ?Sized> ToWireValue for &T {
    fn column_type(&self) -> ColumnType {
        (*self).column_type()
    }

    fn is_unsigned(&self) -> bool {
        (*self).is_unsigned()
    }

    fn is_null(&self) -> bool {
        (*self).is_null()
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        (*self).encode(buf)
    }
}

// === Value ===

impl FromWireValue<'_> for Value {
    fn from_null() -> Result<Self> {
        Ok(Value::Null)
    }

    fn from_text(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        Value::from_text(col, bytes)
    }

    fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        Value::from_binary(col, bytes)
    }
}

impl ToWireValue for Value {
    fn column_type(&self) -> ColumnType {
        match self {
            Value::Null => ColumnType::MYSQL_TYPE_NULL,
            Value::Int(_) | Value::UInt(_) => ColumnType::MYSQL_TYPE_LONGLONG,
            Value::Float(_) => ColumnType::MYSQL_TYPE_FLOAT,
            Value::Double(_) => ColumnType::MYSQL_TYPE_DOUBLE,
            Value::Bytes(_) => ColumnType::MYSQL_TYPE_VAR_STRING,
            Value::Date { .. } => ColumnType::MYSQL_TYPE_DATE,
            Value::DateTime { .. } => ColumnType::MYSQL_TYPE_DATETIME,
            Value::Time { .. } => ColumnType::MYSQL_TYPE_TIME,
        }
    }

    fn is_unsigned(&self) -> bool {
        matches!(self, Value::UInt(_))
    }

    fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Value::Null => {}
            Value::Int(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::UInt(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::Bytes(b) => crate::protocol::codec::write_lenenc_bytes(buf, b),
            Value::Date { year, month, day } => {
                buf.push(4);
                buf.extend_from_slice(&year.to_le_bytes());
                buf.push(*month);
                buf.push(*day);
            }
            Value::DateTime {
                year,
                month,
                day,
                hour,
                minute,
                second,
                micro,
            } => {
                buf.push(if *micro == 0 { 7 } else { 11 });
                buf.extend_from_slice(&year.to_le_bytes());
                buf.extend_from_slice(&[*month, *day, *hour, *minute, *second]);
                if *micro != 0 {
                    buf.extend_from_slice(&micro.to_le_bytes());
                }
            }
            Value::Time {
                negative,
                days,
                hours,
                minutes,
                seconds,
                micros,
            } => {
                buf.push(if *micros == 0 { 8 } else { 12 });
                buf.push(u8::from(*negative));
                buf.extend_from_slice(&days.to_le_bytes());
                buf.extend_from_slice(&[*hours, *minutes, *seconds]);
                if *micros != 0 {
                    buf.extend_from_slice(&micros.to_le_bytes());
                }
            }
        }
        Ok(())
    }
}

// === ToParams implementations ===

impl ToParams for () {
    fn param_count(&self) -> usize {
        0
    }

    fn write_null_bitmap(&self, _bitmap: &mut [u8]) {}

    fn write_types(&self, _out: &mut Vec<u8>) {}

    fn write_values(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

impl<T: ToParams + ?Sized> ToParams for &T {
    fn param_count(&self) -> usize {
        (*self).param_count()
    }

    fn write_null_bitmap(&self, bitmap: &mut [u8]) {
        (*self).write_null_bitmap(bitmap)
    }

    fn write_types(&self, out: &mut Vec<u8>) {
        (*self).write_types(out)
    }

    fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
        (*self).write_values(out)
    }
}

impl<T: ToWireValue> ToParams for [T] {
    fn param_count(&self) -> usize {
        self.len()
    }

    fn write_null_bitmap(&self, bitmap: &mut [u8]) {
        for (idx, value) in self.iter().enumerate() {
            set_null_bit(value, idx, bitmap);
        }
    }

    fn write_types(&self, out: &mut Vec<u8>) {
        for value in self {
            write_type(value, out);
        }
    }

    fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
        for value in self {
            write_value(value, out)?;
        }
        Ok(())
    }
}

impl<T: ToWireValue> ToParams for Vec<T> {
    fn param_count(&self) -> usize {
        self.as_slice().param_count()
    }

    fn write_null_bitmap(&self, bitmap: &mut [u8]) {
        self.as_slice().write_null_bitmap(bitmap)
    }

    fn write_types(&self, out: &mut Vec<u8>) {
        self.as_slice().write_types(out)
    }

    fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
        self.as_slice().write_values(out)
    }
}

// Tuple implementations via macro
macro_rules! impl_to_params {
    ($count:expr, $($idx:tt: $T:ident),+) => {
        impl<$($T: ToWireValue),+> ToParams for ($($T,)+) {
            fn param_count(&self) -> usize {
                $count
            }

            fn write_null_bitmap(&self, bitmap: &mut [u8]) {
                $(set_null_bit(&self.$idx, $idx, bitmap);)+
            }

            fn write_types(&self, out: &mut Vec<u8>) {
                $(write_type(&self.$idx, out);)+
            }

            fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
                $(write_value(&self.$idx, out)?;)+
                Ok(())
            }
        }
    };
}

impl_to_params!(1, 0: T0);
impl_to_params!(2, 0: T0, 1: T1);
impl_to_params!(3, 0: T0, 1: T1, 2: T2);
impl_to_params!(4, 0: T0, 1: T1, 2: T2, 3: T3);
impl_to_params!(5, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4);
impl_to_params!(6, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5);
impl_to_params!(7, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6);
impl_to_params!(8, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7);
impl_to_params!(9, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8);
impl_to_params!(10, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9);
impl_to_params!(11, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9, 10: T10);
impl_to_params!(12, 0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9, 10: T10, 11: T11);
