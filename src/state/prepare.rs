//! COM_STMT_PREPARE state machine.
//!
//! Reads the PREPARE_OK header, then the parameter and column definitions.

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::protocol::column::ColumnDefinition;
use crate::protocol::command::{Command, PrepareOk};
use crate::protocol::constant::CapabilityFlags;
use crate::protocol::response::{ERR_HEADER, is_eof, parse_err};

use super::StateMachine;
use super::action::Action;

/// A server-side prepared statement.
///
/// Valid only on the connection that prepared it. Close it with
/// `Conn::close_statement` when it is no longer needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    id: u32,
    params: Vec<ColumnDefinition>,
    columns: Vec<ColumnDefinition>,
}

impl PreparedStatement {
    /// Server-assigned statement id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of `?` placeholders.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ColumnDefinition] {
        &self.params
    }

    /// Result columns, empty for statements that return no rows.
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    WaitingPrepareOk,
    Params { remaining: u16 },
    ParamsEof,
    Columns { remaining: u16 },
    ColumnsEof,
    Finished,
}

/// State machine for COM_STMT_PREPARE.
pub struct PrepareStateMachine<'a> {
    state: State,
    sql: &'a str,
    capabilities: CapabilityFlags,
    statement_id: u32,
    num_columns: u16,
    params: Vec<ColumnDefinition>,
    columns: Vec<ColumnDefinition>,
}

impl<'a> PrepareStateMachine<'a> {
    pub fn new(sql: &'a str, capabilities: CapabilityFlags) -> Self {
        Self {
            state: State::Initial,
            sql,
            capabilities,
            statement_id: 0,
            num_columns: 0,
            params: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// The prepared statement, once the machine has finished.
    pub fn take_statement(&mut self) -> Option<PreparedStatement> {
        if self.state != State::Finished {
            return None;
        }
        Some(PreparedStatement {
            id: self.statement_id,
            params: std::mem::take(&mut self.params),
            columns: std::mem::take(&mut self.columns),
        })
    }

    fn deprecate_eof(&self) -> bool {
        self.capabilities.has(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }

    /// Move on after the parameter block (or skip it when empty).
    fn after_params(&mut self) -> Action {
        if self.num_columns > 0 {
            self.state = State::Columns {
                remaining: self.num_columns,
            };
            Action::ReadPacket
        } else {
            self.state = State::Finished;
            Action::Finished
        }
    }

    fn after_columns(&mut self) -> Action {
        self.state = State::Finished;
        Action::Finished
    }

    fn handle_prepare_ok(&mut self, payload: &[u8]) -> Result<Action> {
        if payload.first() == Some(&ERR_HEADER) {
            return Err(Error::Server(parse_err(payload)?));
        }
        let ok = PrepareOk::parse(payload)?;
        tracing::debug!(
            statement_id = ok.statement_id,
            params = ok.num_params,
            columns = ok.num_columns,
            "statement prepared"
        );
        self.statement_id = ok.statement_id;
        self.num_columns = ok.num_columns;
        self.params.reserve(ok.num_params as usize);
        self.columns.reserve(ok.num_columns as usize);

        if ok.num_params > 0 {
            self.state = State::Params {
                remaining: ok.num_params,
            };
            Ok(Action::ReadPacket)
        } else {
            Ok(self.after_params())
        }
    }

    fn expect_eof(payload: &[u8], what: &str) -> Result<()> {
        if is_eof(payload) {
            Ok(())
        } else {
            Err(Error::Protocol(format!("expected EOF after {what}")))
        }
    }
}

impl StateMachine for PrepareStateMachine<'_> {
    fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        match self.state {
            State::Initial => {
                buffer_set.write_buffer.clear();
                Command::StmtPrepare(self.sql).write(&mut buffer_set.write_buffer)?;
                self.state = State::WaitingPrepareOk;
                Ok(Action::WriteAndReadPacket)
            }
            State::WaitingPrepareOk => self.handle_prepare_ok(&buffer_set.read_buffer),
            State::Params { remaining } => {
                self.params
                    .push(ColumnDefinition::parse(&buffer_set.read_buffer)?);
                if remaining > 1 {
                    self.state = State::Params {
                        remaining: remaining - 1,
                    };
                    Ok(Action::ReadPacket)
                } else if self.deprecate_eof() {
                    Ok(self.after_params())
                } else {
                    self.state = State::ParamsEof;
                    Ok(Action::ReadPacket)
                }
            }
            State::ParamsEof => {
                Self::expect_eof(&buffer_set.read_buffer, "parameter definitions")?;
                Ok(self.after_params())
            }
            State::Columns { remaining } => {
                self.columns
                    .push(ColumnDefinition::parse(&buffer_set.read_buffer)?);
                if remaining > 1 {
                    self.state = State::Columns {
                        remaining: remaining - 1,
                    };
                    Ok(Action::ReadPacket)
                } else if self.deprecate_eof() {
                    Ok(self.after_columns())
                } else {
                    self.state = State::ColumnsEof;
                    Ok(Action::ReadPacket)
                }
            }
            State::ColumnsEof => {
                Self::expect_eof(&buffer_set.read_buffer, "column definitions")?;
                Ok(self.after_columns())
            }
            State::Finished => Err(Error::Protocol(
                "Unexpected step after statement was prepared".into(),
            )),
        }
    }
}
