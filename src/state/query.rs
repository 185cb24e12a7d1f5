//! Command/response state machine.
//!
//! Drives one command: writes it, then decodes OK, ERR and result-set
//! responses until the server reports no more results.

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::handler::ResultHandler;
use crate::protocol::codec::read_lenenc_int;
use crate::protocol::column::ColumnDefinition;
use crate::protocol::command::Command;
use crate::protocol::constant::CapabilityFlags;
use crate::protocol::response::{
    ERR_HEADER, LOCAL_INFILE_HEADER, OK_HEADER, OkPacket, is_eof, is_result_set_terminator,
    parse_err, parse_terminator,
};
use crate::protocol::row::{RowFormat, RowPayload};

use super::StateMachine;
use super::action::Action;

/// Command state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    /// A command without a response was written
    Written,
    WaitingResponse,
    ColumnDefinitions { remaining: u64 },
    ColumnsEof,
    Rows,
    Finished,
}

/// State machine for every command except COM_STMT_PREPARE.
pub struct CommandStateMachine<'a, H> {
    state: State,
    command: Command<'a>,
    handler: &'a mut H,
    capabilities: CapabilityFlags,
    format: RowFormat,
    columns: Vec<ColumnDefinition>,
    ok_packets: Vec<OkPacket>,
    /// First error returned by the handler; reported once the response is drained
    handler_error: Option<Error>,
}

impl<'a, H: ResultHandler> CommandStateMachine<'a, H> {
    /// Create a state machine for `command`.
    ///
    /// Rows are decoded as binary for COM_STMT_EXECUTE and as text otherwise.
    pub fn new(command: Command<'a>, handler: &'a mut H, capabilities: CapabilityFlags) -> Self {
        let format = match command {
            Command::StmtExecute { .. } => RowFormat::Binary,
            _ => RowFormat::Text,
        };
        Self {
            state: State::Initial,
            command,
            handler,
            capabilities,
            format,
            columns: Vec::new(),
            ok_packets: Vec::new(),
            handler_error: None,
        }
    }

    /// OK packets (and EOFs converted to OK) of every statement, in order.
    pub fn take_ok_packets(&mut self) -> Vec<OkPacket> {
        std::mem::take(&mut self.ok_packets)
    }

    fn deprecate_eof(&self) -> bool {
        self.capabilities.has(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }

    fn start(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        buffer_set.write_buffer.clear();
        self.command.write(&mut buffer_set.write_buffer)?;
        tracing::debug!(command = self.command.name(), "dispatching command");
        if self.command.expects_response() {
            self.state = State::WaitingResponse;
            Ok(Action::WriteAndReadPacket)
        } else {
            self.state = State::Written;
            Ok(Action::Write)
        }
    }

    /// Run a handler callback unless an earlier one failed.
    ///
    /// A failed callback does not stop the machine: the remaining frames of the
    /// response still have to be read before the connection can take another command.
    fn notify(&mut self, callback: impl FnOnce(&mut H, &[ColumnDefinition]) -> Result<()>) {
        if self.handler_error.is_some() {
            return;
        }
        if let Err(err) = callback(&mut *self.handler, &self.columns) {
            tracing::debug!(error = %err, "result handler failed, draining response");
            self.handler_error = Some(err);
        }
    }

    /// Record a statement's final OK and decide whether another result follows.
    fn end_statement(&mut self, ok: OkPacket) -> Result<Action> {
        self.notify(|handler, _| handler.result_end(&ok));
        let more = ok.status_flags.more_results_exist();
        self.ok_packets.push(ok);
        if more {
            self.state = State::WaitingResponse;
            return Ok(Action::ReadPacket);
        }
        self.state = State::Finished;
        match self.handler_error.take() {
            Some(err) => Err(err),
            None => Ok(Action::Finished),
        }
    }

    fn handle_response(&mut self, payload: &[u8]) -> Result<Action> {
        match payload.first().copied() {
            Some(OK_HEADER) => {
                let ok = OkPacket::parse(payload, self.capabilities)?;
                self.end_statement(ok)
            }
            Some(ERR_HEADER) => Err(Error::Server(parse_err(payload)?)),
            Some(LOCAL_INFILE_HEADER) => Err(Error::Protocol(
                "LOCAL INFILE requests are not supported".into(),
            )),
            Some(_) if is_eof(payload) => Err(Error::Protocol(
                "unexpected EOF packet before result set".into(),
            )),
            Some(_) => {
                let (count, _) = read_lenenc_int(payload)?;
                if count == 0 {
                    return Err(Error::Protocol("result set with zero columns".into()));
                }
                self.columns.clear();
                self.state = State::ColumnDefinitions { remaining: count };
                Ok(Action::ReadPacket)
            }
            None => Err(Error::Protocol("empty response packet".into())),
        }
    }

    fn handle_column(&mut self, payload: &[u8], remaining: u64) -> Result<Action> {
        self.columns.push(ColumnDefinition::parse(payload)?);
        let remaining = remaining - 1;
        if remaining > 0 {
            self.state = State::ColumnDefinitions { remaining };
        } else if self.deprecate_eof() {
            self.notify(|handler, columns| handler.result_start(columns));
            self.state = State::Rows;
        } else {
            self.state = State::ColumnsEof;
        }
        Ok(Action::ReadPacket)
    }

    fn handle_columns_eof(&mut self, payload: &[u8]) -> Result<Action> {
        if !is_eof(payload) {
            return Err(Error::Protocol(
                "expected EOF after column definitions".into(),
            ));
        }
        self.notify(|handler, columns| handler.result_start(columns));
        self.state = State::Rows;
        Ok(Action::ReadPacket)
    }

    fn handle_row(&mut self, payload: &[u8]) -> Result<Action> {
        if payload.first() == Some(&ERR_HEADER) {
            return Err(Error::Server(parse_err(payload)?));
        }
        if is_result_set_terminator(payload, self.capabilities) {
            let ok = parse_terminator(payload, self.capabilities)?;
            return self.end_statement(ok);
        }
        let row = match self.format {
            RowFormat::Text => RowPayload::parse_text(payload, self.columns.len())?,
            RowFormat::Binary => RowPayload::parse_binary(payload, &self.columns)?,
        };
        self.notify(|handler, columns| handler.row(columns, &row));
        Ok(Action::ReadPacket)
    }
}

impl<H: ResultHandler> StateMachine for CommandStateMachine<'_, H> {
    fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let payload = buffer_set.read_buffer.as_slice();
        match self.state {
            State::Initial => self.start(buffer_set),
            State::Written => {
                self.state = State::Finished;
                Ok(Action::Finished)
            }
            State::WaitingResponse => self.handle_response(payload),
            State::ColumnDefinitions { remaining } => self.handle_column(payload, remaining),
            State::ColumnsEof => self.handle_columns_eof(payload),
            State::Rows => self.handle_row(payload),
            State::Finished => Err(Error::Protocol(format!(
                "Unexpected step in state {:?}",
                self.state
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{CollectHandler, DropHandler, Response, ResponseCollector};
    use crate::protocol::codec::write_lenenc_bytes;
    use crate::protocol::column::tests::column_payload;
    use crate::protocol::constant::{ColumnType, StatusFlags};
    use crate::value::Value;

    const CAPS: u32 = CapabilityFlags::CLIENT_DEFAULT;

    fn ok(status: u16, affected: u8) -> Vec<u8> {
        let [lo, hi] = status.to_le_bytes();
        vec![0x00, affected, 0x00, lo, hi, 0x00, 0x00]
    }

    fn terminator(status: u16) -> Vec<u8> {
        let [lo, hi] = status.to_le_bytes();
        vec![0xFE, 0x00, 0x00, lo, hi, 0x00, 0x00]
    }

    fn text_row(values: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in values {
            write_lenenc_bytes(&mut out, v);
        }
        out
    }

    /// Feed `packets` to the machine after the initial write.
    fn run<H: ResultHandler>(
        machine: &mut CommandStateMachine<'_, H>,
        packets: Vec<Vec<u8>>,
    ) -> Result<Vec<Action>> {
        let mut buffers = BufferSet::new();
        let mut actions = vec![machine.step(&mut buffers)?];
        for packet in packets {
            buffers.read_buffer = packet;
            actions.push(machine.step(&mut buffers)?);
        }
        Ok(actions)
    }

    #[test]
    fn text_result_set() {
        let mut handler = CollectHandler::<(i64, String)>::new();
        let mut machine = CommandStateMachine::new(
            Command::Query("SELECT id, name FROM t"),
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let actions = run(
            &mut machine,
            vec![
                vec![2],
                column_payload("id", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63),
                column_payload("name", ColumnType::MYSQL_TYPE_VAR_STRING, 0, 45),
                text_row(&[b"1", b"ann"]),
                text_row(&[b"2", b"bob"]),
                terminator(StatusFlags::SERVER_STATUS_AUTOCOMMIT),
            ],
        )
        .unwrap();
        assert_eq!(actions.first(), Some(&Action::WriteAndReadPacket));
        assert_eq!(actions.last(), Some(&Action::Finished));
        assert_eq!(machine.take_ok_packets().len(), 1);
        assert_eq!(
            handler.into_rows(),
            vec![(1, "ann".to_string()), (2, "bob".to_string())]
        );
    }

    #[test]
    fn legacy_eof_framing() {
        let caps = CapabilityFlags::new(CAPS & !CapabilityFlags::CLIENT_DEPRECATE_EOF);
        let mut handler = ResponseCollector::new();
        let mut machine = CommandStateMachine::new(Command::Query("SELECT 1"), &mut handler, caps);
        let eof = vec![0xFE, 0x00, 0x00, 0x02, 0x00];
        run(
            &mut machine,
            vec![
                vec![1],
                column_payload("1", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63),
                eof.clone(),
                text_row(&[b"1"]),
                eof,
            ],
        )
        .unwrap();
        let oks = machine.take_ok_packets();
        assert!(oks[0].status_flags.autocommit());
        let responses = handler.into_responses();
        match responses.as_slice() {
            [Response::ResultSet(rs)] => assert_eq!(rs.rows, vec![vec![Value::Int(1)]]),
            other => panic!("unexpected responses {other:?}"),
        }
    }

    #[test]
    fn multi_statement() {
        let mut handler = ResponseCollector::new();
        let mut machine = CommandStateMachine::new(
            Command::Query("UPDATE t SET a=1; SELECT 2"),
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let actions = run(
            &mut machine,
            vec![
                ok(StatusFlags::SERVER_MORE_RESULTS_EXISTS, 3),
                vec![1],
                column_payload("2", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63),
                text_row(&[b"2"]),
                terminator(0),
            ],
        )
        .unwrap();
        assert_eq!(actions[1], Action::ReadPacket);
        assert_eq!(actions.last(), Some(&Action::Finished));
        let responses = handler.into_responses();
        assert_eq!(responses.len(), 2);
        assert!(matches!(&responses[0], Response::Ok(ok) if ok.affected_rows == 3));
        assert!(matches!(&responses[1], Response::ResultSet(rs) if rs.rows.len() == 1));
    }

    #[test]
    fn server_error() {
        let mut handler = DropHandler::new();
        let mut machine = CommandStateMachine::new(
            Command::Query("SELEC 1"),
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let mut err = vec![0xFF, 0x28, 0x04];
        err.extend_from_slice(b"#42000You have an error in your SQL syntax");
        let result = run(&mut machine, vec![err]);
        match result {
            Err(Error::Server(e)) => {
                assert_eq!(e.code, 1064);
                assert_eq!(e.sql_state, "42000");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn local_infile_is_fatal() {
        let mut handler = DropHandler::new();
        let mut machine = CommandStateMachine::new(
            Command::Query("LOAD DATA LOCAL INFILE 'x' INTO TABLE t"),
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let err = run(&mut machine, vec![b"\xFBx".to_vec()]).unwrap_err();
        assert!(err.is_connection_broken());
    }

    #[test]
    fn binary_rows_for_execute() {
        let params = (1i64,);
        let mut handler = CollectHandler::<(i32,)>::new();
        let mut machine = CommandStateMachine::new(
            Command::StmtExecute {
                statement_id: 1,
                num_params: 1,
                params: &params,
            },
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let mut row = vec![0x00, 0x00];
        row.extend_from_slice(&5i32.to_le_bytes());
        run(
            &mut machine,
            vec![
                vec![1],
                column_payload("n", ColumnType::MYSQL_TYPE_LONG, 0, 63),
                row,
                terminator(0),
            ],
        )
        .unwrap();
        assert_eq!(handler.into_rows(), vec![(5,)]);
    }

    #[test]
    fn commands_without_response() {
        let mut handler = DropHandler::new();
        let mut machine = CommandStateMachine::new(
            Command::StmtClose(4),
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let actions = run(&mut machine, vec![]).unwrap();
        assert_eq!(actions, vec![Action::Write]);
        let mut buffers = BufferSet::new();
        assert_eq!(machine.step(&mut buffers).unwrap(), Action::Finished);
    }

    #[test]
    fn handler_error_drains_response() {
        let mut handler = CollectHandler::<(i64,)>::new();
        let mut machine = CommandStateMachine::new(
            Command::Query("SELECT 'abc' UNION ALL SELECT 'def'; SELECT 1"),
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let mut buffers = BufferSet::new();
        assert_eq!(
            machine.step(&mut buffers).unwrap(),
            Action::WriteAndReadPacket
        );
        let packets = vec![
            vec![1],
            column_payload("v", ColumnType::MYSQL_TYPE_VAR_STRING, 0, 45),
            text_row(&[b"abc"]),
            text_row(&[b"def"]),
            terminator(StatusFlags::SERVER_MORE_RESULTS_EXISTS),
            vec![1],
            column_payload("1", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63),
            text_row(&[b"1"]),
        ];
        for packet in packets {
            buffers.read_buffer = packet;
            assert_eq!(machine.step(&mut buffers).unwrap(), Action::ReadPacket);
        }
        buffers.read_buffer = terminator(StatusFlags::SERVER_STATUS_AUTOCOMMIT);
        let err = machine.step(&mut buffers).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err:?}");
        assert!(!err.is_connection_broken());
        assert_eq!(machine.take_ok_packets().len(), 2);
        assert!(machine.step(&mut buffers).is_err());
    }

    #[test]
    fn text_value_with_eight_byte_length() {
        let value = vec![b'a'; 16 * 1024 * 1024];
        let mut handler = CollectHandler::<(Vec<u8>,)>::new();
        let mut machine = CommandStateMachine::new(
            Command::Query("SELECT REPEAT('a', 16777216)"),
            &mut handler,
            CapabilityFlags::new(CAPS),
        );
        let row = text_row(&[&value]);
        assert_eq!(row[0], 0xFE);
        let actions = run(
            &mut machine,
            vec![
                vec![1],
                column_payload("v", ColumnType::MYSQL_TYPE_LONG_BLOB, 0, 63),
                row,
                terminator(StatusFlags::SERVER_STATUS_AUTOCOMMIT),
            ],
        )
        .unwrap();
        assert_eq!(actions[3], Action::ReadPacket);
        assert_eq!(actions.last(), Some(&Action::Finished));
        let rows = handler.into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.len(), value.len());
    }
}
