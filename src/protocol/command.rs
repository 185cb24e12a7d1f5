//! Command packets sent by the client, and the COM_STMT_PREPARE response.

use crate::conversion::ToParams;
use crate::error::{Error, Result};
use crate::protocol::codec::{read_u8, read_u16, read_u32, write_bytes, write_u8, write_u32};
use crate::protocol::constant::CommandByte;

/// A command the connection can dispatch.
#[derive(Clone, Copy)]
pub enum Command<'a> {
    /// COM_QUERY
    Query(&'a str),
    /// COM_INIT_DB
    InitDb(&'a str),
    /// COM_PING
    Ping,
    /// COM_RESET_CONNECTION
    ResetConnection,
    /// COM_STMT_PREPARE
    StmtPrepare(&'a str),
    /// COM_STMT_EXECUTE
    StmtExecute {
        statement_id: u32,
        /// Parameter count reported by COM_STMT_PREPARE
        num_params: usize,
        params: &'a (dyn ToParams + Sync),
    },
    /// COM_STMT_RESET
    StmtReset(u32),
    /// COM_STMT_CLOSE (no response)
    StmtClose(u32),
    /// COM_QUIT (no response)
    Quit,
}

impl Command<'_> {
    /// Encode the command payload into `out`.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        match *self {
            Command::Query(sql) => write_query(out, sql),
            Command::InitDb(db) => write_init_db(out, db),
            Command::Ping => write_simple(out, CommandByte::Ping),
            Command::ResetConnection => write_simple(out, CommandByte::ResetConnection),
            Command::StmtPrepare(sql) => write_prepare(out, sql),
            Command::StmtExecute {
                statement_id,
                num_params,
                params,
            } => write_execute(out, statement_id, num_params, params)?,
            Command::StmtReset(id) => write_statement_command(out, CommandByte::StmtReset, id),
            Command::StmtClose(id) => write_statement_command(out, CommandByte::StmtClose, id),
            Command::Quit => write_simple(out, CommandByte::Quit),
        }
        Ok(())
    }

    /// Whether the server answers this command.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Command::StmtClose(_) | Command::Quit)
    }

    /// Name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Query(_) => "COM_QUERY",
            Command::InitDb(_) => "COM_INIT_DB",
            Command::Ping => "COM_PING",
            Command::ResetConnection => "COM_RESET_CONNECTION",
            Command::StmtPrepare(_) => "COM_STMT_PREPARE",
            Command::StmtExecute { .. } => "COM_STMT_EXECUTE",
            Command::StmtReset(_) => "COM_STMT_RESET",
            Command::StmtClose(_) => "COM_STMT_CLOSE",
            Command::Quit => "COM_QUIT",
        }
    }
}

impl std::fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Query(sql) => f.debug_tuple("Query").field(sql).finish(),
            Command::InitDb(db) => f.debug_tuple("InitDb").field(db).finish(),
            Command::StmtPrepare(sql) => f.debug_tuple("StmtPrepare").field(sql).finish(),
            Command::StmtExecute {
                statement_id,
                num_params,
                ..
            } => f
                .debug_struct("StmtExecute")
                .field("statement_id", statement_id)
                .field("num_params", num_params)
                .finish_non_exhaustive(),
            Command::StmtReset(id) => f.debug_tuple("StmtReset").field(id).finish(),
            Command::StmtClose(id) => f.debug_tuple("StmtClose").field(id).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Write a command that has no arguments.
pub fn write_simple(out: &mut Vec<u8>, command: CommandByte) {
    write_u8(out, command as u8);
}

/// Write COM_QUERY.
pub fn write_query(out: &mut Vec<u8>, sql: &str) {
    write_u8(out, CommandByte::Query as u8);
    write_bytes(out, sql.as_bytes());
}

/// Write COM_INIT_DB.
pub fn write_init_db(out: &mut Vec<u8>, database: &str) {
    write_u8(out, CommandByte::InitDb as u8);
    write_bytes(out, database.as_bytes());
}

/// Write COM_STMT_PREPARE.
pub fn write_prepare(out: &mut Vec<u8>, sql: &str) {
    write_u8(out, CommandByte::StmtPrepare as u8);
    write_bytes(out, sql.as_bytes());
}

/// Write COM_STMT_CLOSE or COM_STMT_RESET.
pub fn write_statement_command(out: &mut Vec<u8>, command: CommandByte, statement_id: u32) {
    write_u8(out, command as u8);
    write_u32(out, statement_id);
}

/// Write COM_STMT_EXECUTE.
///
/// `expected_params` is the parameter count the server reported at prepare time.
pub fn write_execute<P: ToParams + ?Sized>(
    out: &mut Vec<u8>,
    statement_id: u32,
    expected_params: usize,
    params: &P,
) -> Result<()> {
    let count = params.param_count();
    if count != expected_params {
        return Err(Error::InvalidUsage(format!(
            "statement expects {expected_params} parameters, got {count}"
        )));
    }

    write_u8(out, CommandByte::StmtExecute as u8);
    write_u32(out, statement_id);
    write_u8(out, 0x00); // CURSOR_TYPE_NO_CURSOR
    write_u32(out, 1); // iteration count

    if count > 0 {
        let bitmap_start = out.len();
        out.resize(bitmap_start + count.div_ceil(8), 0);
        params.write_null_bitmap(&mut out[bitmap_start..]);
        write_u8(out, 0x01); // new-params-bound
        params.write_types(out);
        params.write_values(out)?;
    }
    Ok(())
}

/// COM_STMT_PREPARE_OK header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOk {
    pub statement_id: u32,
    pub num_columns: u16,
    pub num_params: u16,
    pub warnings: u16,
}

impl PrepareOk {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (status, data) = read_u8(payload)?;
        if status != 0x00 {
            return Err(Error::Protocol(format!(
                "expected COM_STMT_PREPARE_OK, got header 0x{status:02X}"
            )));
        }
        let (statement_id, data) = read_u32(data)?;
        let (num_columns, data) = read_u16(data)?;
        let (num_params, data) = read_u16(data)?;
        let (_filler, data) = read_u8(data)?;
        let warnings = match read_u16(data) {
            Ok((warnings, _)) => warnings,
            Err(_) => 0,
        };
        Ok(Self {
            statement_id,
            num_columns,
            num_params,
            warnings,
        })
    }
}
