//! Owned column values.

use crate::error::{Error, Result};
use crate::protocol::codec::{read_u8, read_u16, read_u32};
use crate::protocol::column::ColumnDefinition;
use crate::protocol::constant::ColumnType;

/// An owned MySQL value.
///
/// Text-protocol results keep non-numeric values as `Bytes`; binary-protocol
/// results decode dates and times into their structured variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Date {
        year: u16,
        month: u8,
        day: u8,
    },
    DateTime {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        micro: u32,
    },
    Time {
        negative: bool,
        days: u32,
        hours: u8,
        minutes: u8,
        seconds: u8,
        micros: u32,
    },
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Bytes(s.into_bytes())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decode a text-protocol value.
    pub fn from_text(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        let column_type = col.column_type;
        if column_type.is_integer() {
            let s = simdutf8::compat::from_utf8(bytes)
                .map_err(|e| Error::Decode(format!("invalid UTF-8: {e}")))?;
            return if col.flags.is_unsigned() {
                s.parse()
                    .map(Value::UInt)
                    .map_err(|e| Error::Decode(format!("invalid integer {s:?}: {e}")))
            } else {
                s.parse()
                    .map(Value::Int)
                    .map_err(|e| Error::Decode(format!("invalid integer {s:?}: {e}")))
            };
        }
        match column_type {
            ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                let s = simdutf8::compat::from_utf8(bytes)
                    .map_err(|e| Error::Decode(format!("invalid UTF-8: {e}")))?;
                s.parse()
                    .map(Value::Double)
                    .map_err(|e| Error::Decode(format!("invalid float {s:?}: {e}")))
            }
            ColumnType::MYSQL_TYPE_NULL => Ok(Value::Null),
            _ => Ok(Value::Bytes(bytes.to_vec())),
        }
    }

    /// Decode a binary-protocol value.
    pub fn from_binary(col: &ColumnDefinition, bytes: &[u8]) -> Result<Self> {
        let unsigned = col.flags.is_unsigned();
        let value = match col.column_type {
            ColumnType::MYSQL_TYPE_TINY => {
                let b = fixed::<1>(bytes)?;
                if unsigned {
                    Value::UInt(u64::from(b[0]))
                } else {
                    Value::Int(i64::from(b[0] as i8))
                }
            }
            ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                let b = fixed::<2>(bytes)?;
                if unsigned || col.column_type == ColumnType::MYSQL_TYPE_YEAR {
                    Value::UInt(u64::from(u16::from_le_bytes(b)))
                } else {
                    Value::Int(i64::from(i16::from_le_bytes(b)))
                }
            }
            ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => {
                let b = fixed::<4>(bytes)?;
                if unsigned {
                    Value::UInt(u64::from(u32::from_le_bytes(b)))
                } else {
                    Value::Int(i64::from(i32::from_le_bytes(b)))
                }
            }
            ColumnType::MYSQL_TYPE_LONGLONG => {
                let b = fixed::<8>(bytes)?;
                if unsigned {
                    Value::UInt(u64::from_le_bytes(b))
                } else {
                    Value::Int(i64::from_le_bytes(b))
                }
            }
            ColumnType::MYSQL_TYPE_FLOAT => Value::Float(f32::from_le_bytes(fixed::<4>(bytes)?)),
            ColumnType::MYSQL_TYPE_DOUBLE => Value::Double(f64::from_le_bytes(fixed::<8>(bytes)?)),
            ColumnType::MYSQL_TYPE_NULL => Value::Null,
            ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => {
                match decode_datetime(bytes)? {
                    Value::DateTime {
                        year, month, day, ..
                    } => Value::Date { year, month, day },
                    other => other,
                }
            }
            ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_DATETIME2
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2 => decode_datetime(bytes)?,
            ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => decode_time(bytes)?,
            _ => Value::Bytes(bytes.to_vec()),
        };
        Ok(value)
    }

    /// Text form of the value, as the text protocol would have sent it.
    ///
    /// Returns `None` for `Null`.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            Value::Null => return None,
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Date { year, month, day } => format!("{year:04}-{month:02}-{day:02}"),
            Value::DateTime {
                year,
                month,
                day,
                hour,
                minute,
                second,
                micro,
            } => {
                let mut s = format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                );
                if *micro != 0 {
                    s.push_str(&format!(".{micro:06}"));
                }
                s
            }
            Value::Time {
                negative,
                days,
                hours,
                minutes,
                seconds,
                micros,
            } => {
                let total_hours = u64::from(*days) * 24 + u64::from(*hours);
                let sign = if *negative { "-" } else { "" };
                let mut s = format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}");
                if *micros != 0 {
                    s.push_str(&format!(".{micros:06}"));
                }
                s
            }
        };
        Some(text)
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("expected {N} bytes, got {}", bytes.len())))
}

fn decode_datetime(bytes: &[u8]) -> Result<Value> {
    if !matches!(bytes.len(), 0 | 4 | 7 | 11) {
        return Err(Error::Decode(format!(
            "invalid datetime length {}",
            bytes.len()
        )));
    }
    let (year, month, day, time) = if bytes.is_empty() {
        (0, 0, 0, &[][..])
    } else {
        let (year, rest) = read_u16(bytes)?;
        let (month, rest) = read_u8(rest)?;
        let (day, time) = read_u8(rest)?;
        (year, month, day, time)
    };
    let (hour, minute, second, micro) = if time.is_empty() {
        (0, 0, 0, 0)
    } else {
        let (hour, rest) = read_u8(time)?;
        let (minute, rest) = read_u8(rest)?;
        let (second, rest) = read_u8(rest)?;
        let micro = if rest.is_empty() { 0 } else { read_u32(rest)?.0 };
        (hour, minute, second, micro)
    };
    Ok(Value::DateTime {
        year,
        month,
        day,
        hour,
        minute,
        second,
        micro,
    })
}

fn decode_time(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Time {
            negative: false,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
            micros: 0,
        });
    }
    if !matches!(bytes.len(), 8 | 12) {
        return Err(Error::Decode(format!("invalid time length {}", bytes.len())));
    }
    let (negative, data) = read_u8(bytes)?;
    let (days, data) = read_u32(data)?;
    let (hours, data) = read_u8(data)?;
    let (minutes, data) = read_u8(data)?;
    let (seconds, data) = read_u8(data)?;
    let micros = if data.is_empty() { 0 } else { read_u32(data)?.0 };
    Ok(Value::Time {
        negative: negative == 1,
        days,
        hours,
        minutes,
        seconds,
        micros,
    })
}
