//! String escaping and SQL literals.
//!
//! MySQL has two quoting rules depending on the `NO_BACKSLASH_ESCAPES`
//! sql_mode: backslash escapes, or doubling of single quotes only.

use crate::error::{Error, Result};
use crate::protocol::constant::StatusFlags;
use crate::value::Value;

/// Escaping rule in effect for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeMode {
    /// Default: special characters are escaped with a backslash
    #[default]
    Backslash,
    /// `NO_BACKSLASH_ESCAPES`: only `'` is escaped, by doubling it
    QuoteDoubling,
}

impl EscapeMode {
    /// The mode selected by the server status flags.
    pub fn from_status(status: StatusFlags) -> Self {
        if status.no_backslash_escapes() {
            EscapeMode::QuoteDoubling
        } else {
            EscapeMode::Backslash
        }
    }

    /// Escape `s` without surrounding quotes.
    pub fn escape_string(self, s: &str) -> String {
        match self {
            EscapeMode::Backslash => escape_backslash(s),
            EscapeMode::QuoteDoubling => s.replace('\'', "''"),
        }
    }

    /// Escape `s` and wrap it in single quotes.
    pub fn quote(self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        out.push_str(&self.escape_string(s));
        out.push('\'');
        out
    }

    /// Render `value` as an SQL literal.
    ///
    /// Non-UTF-8 bytes become a hex literal. Non-finite floats have no SQL
    /// literal and are rejected.
    pub fn literal(self, value: &Value) -> Result<String> {
        let literal = match value {
            Value::Null => "NULL".to_string(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) if v.is_finite() => format!("{v:e}"),
            Value::Double(v) if v.is_finite() => format!("{v:e}"),
            Value::Float(_) | Value::Double(_) => {
                return Err(Error::InvalidUsage(format!(
                    "{value:?} cannot be written as an SQL literal"
                )));
            }
            Value::Bytes(bytes) => match simdutf8::basic::from_utf8(bytes) {
                Ok(s) => self.quote(s),
                Err(_) => {
                    let mut out = String::with_capacity(bytes.len() * 2 + 3);
                    out.push_str("X'");
                    for b in bytes {
                        out.push_str(&format!("{b:02X}"));
                    }
                    out.push('\'');
                    out
                }
            },
            Value::Date { .. } | Value::DateTime { .. } | Value::Time { .. } => {
                let text = value.to_text().unwrap_or_default();
                self.quote(&text)
            }
        };
        Ok(literal)
    }
}

fn escape_backslash(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backslash_mode() {
        let mode = EscapeMode::default();
        assert_eq!(mode.quote("foo'bar"), "'foo\\'bar'");
        assert_eq!(
            mode.escape_string("a\\b\n\r\0\x1a\"c"),
            "a\\\\b\\n\\r\\0\\Z\\\"c"
        );
    }

    #[test]
    fn quote_doubling_mode() {
        let status = StatusFlags::new(StatusFlags::SERVER_STATUS_NO_BACKSLASH_ESCAPES);
        let mode = EscapeMode::from_status(status);
        assert_eq!(mode, EscapeMode::QuoteDoubling);
        assert_eq!(mode.quote("foo'bar"), "'foo''bar'");
        assert_eq!(mode.escape_string("a\\b"), "a\\b");
    }

    #[test]
    fn literals() {
        let mode = EscapeMode::Backslash;
        assert_eq!(mode.literal(&Value::Null).unwrap(), "NULL");
        assert_eq!(mode.literal(&Value::Int(-3)).unwrap(), "-3");
        assert_eq!(mode.literal(&Value::Double(1.5)).unwrap(), "1.5e0");
        assert!(mode.literal(&Value::Double(f64::NAN)).is_err());
        assert_eq!(mode.literal(&Value::from("it's")).unwrap(), "'it\\'s'");
        assert_eq!(
            mode.literal(&Value::Bytes(vec![0xFF, 0x00])).unwrap(),
            "X'FF00'"
        );
        let date = Value::Date {
            year: 2024,
            month: 5,
            day: 6,
        };
        assert_eq!(mode.literal(&date).unwrap(), "'2024-05-06'");
    }
}
