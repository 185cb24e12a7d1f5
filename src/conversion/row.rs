//! Row decoding traits and implementations.

use crate::conversion::FromWireValue;
use crate::error::{Error, Result};
use crate::protocol::column::ColumnDefinition;
use crate::protocol::row::{RowFormat, RowPayload};
use crate::value::Value;

/// Trait for decoding a MySQL row into a Rust type.
pub trait FromRow<'a>: Sized {
    /// Decode a row. The row knows whether it came from the text or binary protocol.
    fn from_row(cols: &[ColumnDefinition], row: &RowPayload<'a>) -> Result<Self>;
}

/// Decode a single column value.
fn decode_column<'a, T: FromWireValue<'a>>(
    col: &ColumnDefinition,
    format: RowFormat,
    value: Option<&'a [u8]>,
) -> Result<T> {
    match (value, format) {
        (None, _) => T::from_null(),
        (Some(bytes), RowFormat::Text) => T::from_text(col, bytes),
        (Some(bytes), RowFormat::Binary) => T::from_binary(col, bytes),
    }
}

/// Implementation for empty tuple - used for statements that don't return rows
impl FromRow<'_> for () {
    fn from_row(_cols: &[ColumnDefinition], _row: &RowPayload<'_>) -> Result<Self> {
        Ok(())
    }
}

/// Every column as an owned `Value`.
impl FromRow<'_> for Vec<Value> {
    fn from_row(cols: &[ColumnDefinition], row: &RowPayload<'_>) -> Result<Self> {
        if cols.len() != row.len() {
            return Err(Error::Decode(format!(
                "row has {} values for {} columns",
                row.len(),
                cols.len()
            )));
        }
        cols.iter()
            .zip(row.iter())
            .map(|(col, value)| decode_column(col, row.format(), value))
            .collect()
    }
}

// === Tuple implementations ===

macro_rules! impl_from_row_tuple {
    ($count:literal: $($idx:tt => $T:ident),+) => {
        impl<'a, $($T: FromWireValue<'a>),+> FromRow<'a> for ($($T,)+) {
            fn from_row(cols: &[ColumnDefinition], row: &RowPayload<'a>) -> Result<Self> {
                if cols.len() < $count || row.len() < $count {
                    return Err(Error::Decode("not enough columns for tuple".into()));
                }
                Ok(($(
                    decode_column(&cols[$idx], row.format(), row.get($idx))?,
                )+))
            }
        }
    };
}

impl_from_row_tuple!(1: 0 => T1);
impl_from_row_tuple!(2: 0 => T1, 1 => T2);
impl_from_row_tuple!(3: 0 => T1, 1 => T2, 2 => T3);
impl_from_row_tuple!(4: 0 => T1, 1 => T2, 2 => T3, 3 => T4);
impl_from_row_tuple!(5: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5);
impl_from_row_tuple!(6: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6);
impl_from_row_tuple!(7: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7);
impl_from_row_tuple!(8: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7, 7 => T8);
impl_from_row_tuple!(9: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7, 7 => T8, 8 => T9);
impl_from_row_tuple!(10: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7, 7 => T8, 8 => T9, 9 => T10);
impl_from_row_tuple!(11: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7, 7 => T8, 8 => T9, 9 => T10, 10 => T11);
impl_from_row_tuple!(12: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7, 7 => T8, 8 => T9, 9 => T10, 10 => T11, 11 => T12);
