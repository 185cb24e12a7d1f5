//! Result handlers.
//!
//! A handler receives a command's response as it is decoded, straight out of
//! the read buffer. Rows are only valid for the duration of the callback.

use crate::conversion::FromRow;
use crate::error::Result;
use crate::protocol::column::ColumnDefinition;
use crate::protocol::response::OkPacket;
use crate::protocol::row::RowPayload;
use crate::value::Value;

/// Handler for command responses, text (COM_QUERY) or binary (COM_STMT_EXECUTE) rows.
///
/// Callback patterns by statement type:
/// - SELECT with rows: `result_start` → `row*` → `result_end`
/// - SELECT with 0 rows: `result_start` → `result_end`
/// - INSERT/UPDATE/DELETE and other statements: `result_end` only
///
/// For multi-statement queries like `"SELECT 1; UPDATE foo SET x=1"`:
/// ```text
/// result_start → row* → result_end   // SELECT 1
/// result_end                          // UPDATE
/// ```
pub trait ResultHandler {
    /// Called when a result set begins.
    fn result_start(&mut self, cols: &[ColumnDefinition]) -> Result<()> {
        let _ = cols;
        Ok(())
    }

    /// Called for each data row.
    fn row(&mut self, cols: &[ColumnDefinition], row: &RowPayload<'_>) -> Result<()>;

    /// Called with the OK (or EOF) that ends each statement's response.
    fn result_end(&mut self, ok: &OkPacket) -> Result<()> {
        let _ = ok;
        Ok(())
    }
}

/// A handler that discards all results.
#[derive(Debug, Default)]
pub struct DropHandler {
    affected_rows: u64,
    last_insert_id: u64,
}

impl DropHandler {
    /// Create a new drop handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows affected, summed over every statement.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Last insert id of the last statement that reported one.
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }
}

impl ResultHandler for DropHandler {
    fn row(&mut self, _cols: &[ColumnDefinition], _row: &RowPayload<'_>) -> Result<()> {
        Ok(())
    }

    fn result_end(&mut self, ok: &OkPacket) -> Result<()> {
        self.affected_rows += ok.affected_rows;
        if ok.last_insert_id != 0 {
            self.last_insert_id = ok.last_insert_id;
        }
        Ok(())
    }
}

/// Handler that collects typed rows.
///
/// # Example
///
/// ```ignore
/// let mut handler: CollectHandler<(i32, String)> = CollectHandler::new();
/// conn.query("SELECT id, name FROM users", &mut handler).await?;
/// for (id, name) in handler.into_rows() {
///     println!("{}: {}", id, name);
/// }
/// ```
#[derive(Default)]
pub struct CollectHandler<T> {
    rows: Vec<T>,
}

impl<T> CollectHandler<T> {
    /// Create a new collect handler.
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Get collected rows.
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    /// Take collected rows.
    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    /// Get the number of collected rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows were collected.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: for<'a> FromRow<'a>> ResultHandler for CollectHandler<T> {
    fn row(&mut self, cols: &[ColumnDefinition], row: &RowPayload<'_>) -> Result<()> {
        let typed_row = T::from_row(cols, row)?;
        self.rows.push(typed_row);
        Ok(())
    }
}

/// Handler that collects only the first row.
#[derive(Default)]
pub struct FirstRowHandler<T> {
    row: Option<T>,
}

impl<T> FirstRowHandler<T> {
    /// Create a new first row handler.
    pub fn new() -> Self {
        Self { row: None }
    }

    /// Get the first row if present.
    pub fn get(&self) -> Option<&T> {
        self.row.as_ref()
    }

    /// Take the first row.
    pub fn into_row(self) -> Option<T> {
        self.row
    }
}

impl<T: for<'a> FromRow<'a>> ResultHandler for FirstRowHandler<T> {
    fn row(&mut self, cols: &[ColumnDefinition], row: &RowPayload<'_>) -> Result<()> {
        if self.row.is_none() {
            let typed_row = T::from_row(cols, row)?;
            self.row = Some(typed_row);
        }
        Ok(())
    }
}

/// A fully materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Vec<Value>>,
    /// The EOF/OK that terminated the rows
    pub status: OkPacket,
}

impl ResultSet {
    /// Index of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// One statement's response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The statement returned no rows
    Ok(OkPacket),
    /// The statement returned a result set
    ResultSet(ResultSet),
}

/// Handler that materializes every statement's response as owned values.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    current: Option<ResultSet>,
    responses: Vec<Response>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_responses(self) -> Vec<Response> {
        self.responses
    }
}

impl ResultHandler for ResponseCollector {
    fn result_start(&mut self, cols: &[ColumnDefinition]) -> Result<()> {
        self.current = Some(ResultSet {
            columns: cols.to_vec(),
            ..ResultSet::default()
        });
        Ok(())
    }

    fn row(&mut self, cols: &[ColumnDefinition], row: &RowPayload<'_>) -> Result<()> {
        let values = Vec::<Value>::from_row(cols, row)?;
        if let Some(current) = &mut self.current {
            current.rows.push(values);
        }
        Ok(())
    }

    fn result_end(&mut self, ok: &OkPacket) -> Result<()> {
        let response = match self.current.take() {
            Some(mut result_set) => {
                result_set.status = ok.clone();
                Response::ResultSet(result_set)
            }
            None => Response::Ok(ok.clone()),
        };
        self.responses.push(response);
        Ok(())
    }
}
