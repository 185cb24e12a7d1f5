//! Asynchronous MySQL connection.

use std::time::Duration;

use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::buffer_pool::PooledBufferSet;
use crate::buffer_set::BufferSet;
use crate::conversion::{FromRow, ToParams};
use crate::error::{Error, Result};
use crate::handler::{
    CollectHandler, DropHandler, FirstRowHandler, Response, ResponseCollector, ResultHandler,
};
use crate::opts::Opts;
use crate::protocol::command::Command;
use crate::protocol::constant::CapabilityFlags;
use crate::protocol::packet::Framer;
use crate::session::SessionState;
use crate::state::{
    Action, CommandStateMachine, ConnectionStateMachine, PrepareStateMachine, PreparedStatement,
    StateMachine,
};
use crate::value::Value;

use super::stream::Stream;

/// Asynchronous MySQL connection.
///
/// Commands take `&mut self`, so one connection runs one command at a time.
/// Wrap it in [`SharedConn`](super::SharedConn) to share it between tasks.
pub struct Conn {
    stream: Stream,
    buffer_set: PooledBufferSet,
    framer: Framer,
    session: SessionState,
    capabilities: CapabilityFlags,
    server_version: String,
    connection_id: u32,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    in_flight: bool,
    is_broken: bool,
    is_closed: bool,
}

impl Conn {
    /// Connect to a MySQL server.
    ///
    /// Opens the socket, authenticates, then applies `sql_mode`,
    /// `init_command` and the autocommit setting from `opts`.
    /// `connect_timeout` bounds the whole sequence.
    pub async fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        match opts.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, Self::establish(opts))
                .await
                .map_err(|elapsed| {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, elapsed))
                })?,
            None => Self::establish(opts).await,
        }
    }

    async fn establish(opts: Opts) -> Result<Self> {
        let stream = Self::connect_stream(&opts).await?;
        let mut conn = Self::new_with_stream(stream, &opts).await?;
        conn.setup(&opts).await?;
        Ok(conn)
    }

    async fn connect_stream(opts: &Opts) -> Result<Stream> {
        if let Some(socket_path) = &opts.socket {
            #[cfg(unix)]
            {
                return Ok(Stream::unix(UnixStream::connect(socket_path).await?));
            }
            #[cfg(not(unix))]
            {
                return Err(Error::Unsupported(format!(
                    "Unix socket {socket_path} is not available on this platform"
                )));
            }
        }
        if opts.host.is_empty() {
            return Err(Error::InvalidUsage("host is empty".into()));
        }
        let tcp = TcpStream::connect((opts.host.as_str(), opts.port)).await?;
        tcp.set_nodelay(opts.tcp_nodelay)?;
        Ok(Stream::tcp(tcp))
    }

    /// Authenticate over an already connected stream.
    pub async fn new_with_stream(mut stream: Stream, opts: &Opts) -> Result<Self> {
        let mut buffer_set = opts.buffer_pool.get_buffer_set();
        let mut framer = Framer::new();
        let mut state_machine =
            ConnectionStateMachine::new(opts, cfg!(feature = "tokio-tls"), stream.is_unix())?;

        loop {
            let buffers: &mut BufferSet = &mut buffer_set;
            match state_machine.step(buffers)? {
                Action::ReadPacket => {
                    stream
                        .read_packet(&mut framer, &mut buffers.read_buffer)
                        .await?;
                }
                Action::Write => {
                    stream
                        .write_packet(&mut framer, &buffers.write_buffer, &mut buffers.frame_buffer)
                        .await?;
                }
                Action::WriteAndReadPacket => {
                    stream
                        .write_packet(&mut framer, &buffers.write_buffer, &mut buffers.frame_buffer)
                        .await?;
                    stream
                        .read_packet(&mut framer, &mut buffers.read_buffer)
                        .await?;
                }
                Action::UpgradeTls => {
                    stream
                        .write_packet(&mut framer, &buffers.write_buffer, &mut buffers.frame_buffer)
                        .await?;
                    #[cfg(feature = "tokio-tls")]
                    {
                        stream = stream.upgrade_to_tls(&opts.host).await?;
                    }
                    #[cfg(not(feature = "tokio-tls"))]
                    {
                        return Err(Error::Unsupported(
                            "TLS requested but tokio-tls feature not enabled".into(),
                        ));
                    }
                }
                Action::Finished => break,
            }
        }

        let greeting = state_machine
            .greeting()
            .ok_or_else(|| Error::Protocol("handshake finished without a greeting".into()))?;
        tracing::debug!(
            server_version = %greeting.server_version,
            connection_id = greeting.connection_id,
            plugin = state_machine.auth_plugin(),
            secure = state_machine.is_secure(),
            "connected"
        );

        Ok(Self {
            stream,
            buffer_set,
            framer,
            session: SessionState::new(
                opts.database.clone(),
                opts.charset.clone(),
                state_machine.status_flags(),
            ),
            capabilities: state_machine.capabilities(),
            server_version: greeting.server_version.clone(),
            connection_id: greeting.connection_id,
            read_timeout: opts.read_timeout,
            write_timeout: opts.write_timeout,
            in_flight: false,
            is_broken: false,
            is_closed: false,
        })
    }

    async fn setup(&mut self, opts: &Opts) -> Result<()> {
        if let Some(sql_mode) = &opts.sql_mode {
            let sql = format!("SET sql_mode = {}", self.escape(sql_mode));
            self.query_drop(&sql).await?;
        }
        if let Some(init_command) = &opts.init_command {
            self.query_drop(init_command).await?;
        }
        if let Some(autocommit) = opts.autocommit
            && autocommit != self.get_autocommit()
        {
            self.autocommit(autocommit).await?;
        }
        Ok(())
    }

    // === Accessors ===

    /// Session state cached from the last completed command.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The cached `SERVER_STATUS_AUTOCOMMIT` bit.
    pub fn get_autocommit(&self) -> bool {
        self.session.autocommit()
    }

    pub fn in_transaction(&self) -> bool {
        self.session.in_transaction()
    }

    pub fn current_database(&self) -> Option<&str> {
        self.session.database()
    }

    pub fn charset(&self) -> &str {
        self.session.charset()
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Server thread id of this connection.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Capabilities negotiated during the handshake.
    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    pub fn affected_rows(&self) -> u64 {
        self.session.affected_rows()
    }

    pub fn last_insert_id(&self) -> u64 {
        self.session.last_insert_id()
    }

    pub fn warning_count(&self) -> u16 {
        self.session.warning_count()
    }

    /// Check if the connection is broken.
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    // === Escaping ===

    /// Quote `s` as a string literal for the session's escaping rule.
    pub fn escape(&self, s: &str) -> String {
        self.session.escape_mode().quote(s)
    }

    /// Escape `s` without surrounding quotes.
    pub fn escape_string(&self, s: &str) -> String {
        self.session.escape_mode().escape_string(s)
    }

    /// Render `value` as an SQL literal.
    pub fn literal(&self, value: &Value) -> Result<String> {
        self.session.escape_mode().literal(value)
    }

    // === Command cycle ===

    fn check_ready(&mut self) -> Result<()> {
        if self.is_closed {
            return Err(Error::InvalidConnectionState("connection is closed".into()));
        }
        if self.in_flight {
            self.is_broken = true;
            return Err(Error::InvalidConnectionState(
                "a previous command was cancelled mid-flight".into(),
            ));
        }
        if self.is_broken {
            return Err(Error::InvalidConnectionState("connection is broken".into()));
        }
        Ok(())
    }

    /// Drive a state machine to completion.
    async fn drive<S: StateMachine>(&mut self, state_machine: &mut S) -> Result<()> {
        self.check_ready()?;
        self.framer.reset();
        self.in_flight = true;
        let result = self.drive_inner(state_machine).await;
        self.in_flight = false;
        if let Err(e) = &result
            && e.is_connection_broken()
        {
            tracing::warn!(error = %e, connection_id = self.connection_id, "connection marked broken");
            self.is_broken = true;
        }
        result
    }

    async fn drive_inner<S: StateMachine>(&mut self, state_machine: &mut S) -> Result<()> {
        loop {
            match state_machine.step(&mut self.buffer_set)? {
                Action::ReadPacket => self.read_packet().await?,
                Action::Write => self.write_packet().await?,
                Action::WriteAndReadPacket => {
                    self.write_packet().await?;
                    self.read_packet().await?;
                }
                Action::UpgradeTls => {
                    return Err(Error::Protocol(
                        "Unexpected TLS upgrade after the handshake".into(),
                    ));
                }
                Action::Finished => return Ok(()),
            }
        }
    }

    async fn read_packet(&mut self) -> Result<()> {
        let read = self
            .stream
            .read_packet(&mut self.framer, &mut self.buffer_set.read_buffer);
        let result = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .unwrap_or_else(|_| Err(Error::lost("read timed out"))),
            None => read.await,
        };
        result.map_err(|e| e.into_command_error(false))
    }

    async fn write_packet(&mut self) -> Result<()> {
        let buffers: &mut BufferSet = &mut self.buffer_set;
        let write =
            self.stream
                .write_packet(&mut self.framer, &buffers.write_buffer, &mut buffers.frame_buffer);
        let result = match self.write_timeout {
            Some(timeout) => tokio::time::timeout(timeout, write)
                .await
                .unwrap_or_else(|_| Err(Error::gone_away("write timed out"))),
            None => write.await,
        };
        result.map_err(|e| e.into_command_error(true))
    }

    async fn run_command<H: ResultHandler>(
        &mut self,
        command: Command<'_>,
        handler: &mut H,
    ) -> Result<()> {
        let mut state_machine = CommandStateMachine::new(command, handler, self.capabilities);
        let result = self.drive(&mut state_machine).await;
        for ok in state_machine.take_ok_packets() {
            self.session.apply_ok(&ok);
        }
        result
    }

    /// Send any command and materialize every response.
    pub async fn send_command(&mut self, command: Command<'_>) -> Result<Vec<Response>> {
        let mut collector = ResponseCollector::new();
        self.run_command(command, &mut collector).await?;
        Ok(collector.into_responses())
    }

    // === Text protocol ===

    /// Execute a text query with a handler.
    pub async fn query<H: ResultHandler>(&mut self, sql: &str, handler: &mut H) -> Result<()> {
        self.run_command(Command::Query(sql), handler).await
    }

    /// Execute a text query and discard results, returning the affected row count.
    pub async fn query_drop(&mut self, sql: &str) -> Result<u64> {
        let mut handler = DropHandler::new();
        self.query(sql, &mut handler).await?;
        Ok(handler.affected_rows())
    }

    /// Execute a text query and collect typed rows.
    pub async fn query_collect<T: for<'a> FromRow<'a>>(&mut self, sql: &str) -> Result<Vec<T>> {
        let mut handler = CollectHandler::<T>::new();
        self.query(sql, &mut handler).await?;
        Ok(handler.into_rows())
    }

    /// Execute a text query and return the first typed row.
    pub async fn query_first<T: for<'a> FromRow<'a>>(&mut self, sql: &str) -> Result<Option<T>> {
        let mut handler = FirstRowHandler::<T>::new();
        self.query(sql, &mut handler).await?;
        Ok(handler.into_row())
    }

    // === Prepared statements ===

    /// Prepare a statement on the server.
    pub async fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        let mut state_machine = PrepareStateMachine::new(sql, self.capabilities);
        self.drive(&mut state_machine).await?;
        state_machine
            .take_statement()
            .ok_or_else(|| Error::Protocol("No prepared statement".into()))
    }

    /// Execute a prepared statement with a handler.
    pub async fn exec<P: ToParams + Sync, H: ResultHandler>(
        &mut self,
        stmt: &PreparedStatement,
        params: P,
        handler: &mut H,
    ) -> Result<()> {
        let command = Command::StmtExecute {
            statement_id: stmt.id(),
            num_params: stmt.param_count(),
            params: &params,
        };
        self.run_command(command, handler).await
    }

    /// Execute a prepared statement and discard results, returning the affected row count.
    pub async fn exec_drop<P: ToParams + Sync>(
        &mut self,
        stmt: &PreparedStatement,
        params: P,
    ) -> Result<u64> {
        let mut handler = DropHandler::new();
        self.exec(stmt, params, &mut handler).await?;
        Ok(handler.affected_rows())
    }

    /// Execute a prepared statement and collect typed rows.
    pub async fn exec_collect<T: for<'a> FromRow<'a>, P: ToParams + Sync>(
        &mut self,
        stmt: &PreparedStatement,
        params: P,
    ) -> Result<Vec<T>> {
        let mut handler = CollectHandler::<T>::new();
        self.exec(stmt, params, &mut handler).await?;
        Ok(handler.into_rows())
    }

    /// Execute a prepared statement and return the first typed row.
    pub async fn exec_first<T: for<'a> FromRow<'a>, P: ToParams + Sync>(
        &mut self,
        stmt: &PreparedStatement,
        params: P,
    ) -> Result<Option<T>> {
        let mut handler = FirstRowHandler::<T>::new();
        self.exec(stmt, params, &mut handler).await?;
        Ok(handler.into_row())
    }

    /// Deallocate a prepared statement. The server sends no reply.
    pub async fn close_statement(&mut self, stmt: PreparedStatement) -> Result<()> {
        let mut handler = DropHandler::new();
        self.run_command(Command::StmtClose(stmt.id()), &mut handler)
            .await
    }

    /// Reset a prepared statement's server-side state.
    pub async fn reset_statement(&mut self, stmt: &PreparedStatement) -> Result<()> {
        let mut handler = DropHandler::new();
        self.run_command(Command::StmtReset(stmt.id()), &mut handler)
            .await
    }

    // === Session ===

    /// Check that the server is alive.
    pub async fn ping(&mut self) -> Result<()> {
        let mut handler = DropHandler::new();
        self.run_command(Command::Ping, &mut handler).await
    }

    /// Reset the session without re-authenticating.
    ///
    /// Rolls back any open transaction and drops temporary tables, user
    /// variables and prepared statements.
    pub async fn reset_connection(&mut self) -> Result<()> {
        let mut handler = DropHandler::new();
        self.run_command(Command::ResetConnection, &mut handler)
            .await
    }

    /// Change the default database.
    pub async fn select_db(&mut self, database: &str) -> Result<()> {
        let mut handler = DropHandler::new();
        self.run_command(Command::InitDb(database), &mut handler)
            .await?;
        self.session.set_database(Some(database.to_string()));
        Ok(())
    }

    /// Turn autocommit on or off.
    pub async fn autocommit(&mut self, on: bool) -> Result<()> {
        let sql = if on {
            "SET AUTOCOMMIT = 1"
        } else {
            "SET AUTOCOMMIT = 0"
        };
        self.query_drop(sql).await?;
        Ok(())
    }

    pub async fn begin(&mut self) -> Result<()> {
        self.query_drop("BEGIN").await?;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.query_drop("COMMIT").await?;
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.query_drop("ROLLBACK").await?;
        Ok(())
    }

    /// Execute a closure within a transaction.
    ///
    /// The transaction is committed if the closure returns `Ok` and has not
    /// ended it already, and rolled back if it returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUsage` if called while already in a transaction.
    pub async fn run_transaction<F, R>(&mut self, f: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Conn) -> Result<R>,
    {
        if self.in_transaction() {
            return Err(Error::InvalidUsage(
                "nested transactions are not supported".into(),
            ));
        }

        self.begin().await?;
        match f(&mut *self).await {
            Ok(value) => {
                if self.in_transaction() {
                    self.commit().await?;
                }
                Ok(value)
            }
            Err(e) => {
                if !self.is_broken
                    && self.in_transaction()
                    && let Err(rollback_err) = self.rollback().await
                {
                    tracing::warn!(error = %rollback_err, "rollback after failed transaction");
                }
                Err(e)
            }
        }
    }

    /// Close the connection gracefully.
    ///
    /// Sends COM_QUIT when the connection is still healthy, then shuts the
    /// socket down. Calling it again does nothing.
    pub async fn close(&mut self) -> Result<()> {
        if self.is_closed {
            return Ok(());
        }
        if !self.is_broken && !self.in_flight {
            let mut handler = DropHandler::new();
            if let Err(e) = self.run_command(Command::Quit, &mut handler).await {
                tracing::debug!(error = %e, "COM_QUIT failed");
            }
        }
        self.is_closed = true;
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(error = %e, "socket shutdown failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CR_SERVER_GONE_ERROR, CR_SERVER_LOST};
    use crate::opts::SslMode;
    use crate::protocol::codec::write_lenenc_bytes;
    use crate::protocol::column::tests::column_payload;
    use crate::protocol::constant::{ColumnType, StatusFlags};
    use crate::protocol::handshake::tests::greeting_payload;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const AUTOCOMMIT: u16 = StatusFlags::SERVER_STATUS_AUTOCOMMIT;

    /// Scripted server side of one connection.
    struct FakeServer {
        stream: TcpStream,
        seq: u8,
    }

    impl FakeServer {
        async fn read(&mut self) -> Vec<u8> {
            let mut header = [0u8; 4];
            self.stream.read_exact(&mut header).await.unwrap();
            let len = usize::from(header[0]) | usize::from(header[1]) << 8 | usize::from(header[2]) << 16;
            self.seq = header[3].wrapping_add(1);
            let mut payload = vec![0u8; len];
            self.stream.read_exact(&mut payload).await.unwrap();
            payload
        }

        async fn send(&mut self, payload: &[u8]) {
            let len = (payload.len() as u32).to_le_bytes();
            let mut frame = vec![len[0], len[1], len[2], self.seq];
            frame.extend_from_slice(payload);
            self.stream.write_all(&frame).await.unwrap();
            self.seq = self.seq.wrapping_add(1);
        }

        async fn ok(&mut self, status: u16) {
            let [lo, hi] = status.to_le_bytes();
            self.send(&[0x00, 0x00, 0x00, lo, hi, 0x00, 0x00]).await;
        }

        async fn single_value(&mut self, value: &[u8], status: u16) {
            self.send(&[1]).await;
            self.send(&column_payload("v", ColumnType::MYSQL_TYPE_VAR_STRING, 0, 45))
                .await;
            let mut row = Vec::new();
            write_lenenc_bytes(&mut row, value);
            self.send(&row).await;
            let [lo, hi] = status.to_le_bytes();
            self.send(&[0xFE, 0x00, 0x00, lo, hi, 0x00, 0x00]).await;
        }
    }

    fn test_opts(port: u16) -> Opts {
        Opts {
            host: "127.0.0.1".into(),
            port,
            user: "app".into(),
            ssl_mode: SslMode::Disable,
            autocommit: None,
            ..Opts::default()
        }
    }

    /// Accept one client and complete the handshake.
    async fn start() -> (TcpListener, Opts) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, test_opts(port))
    }

    async fn accept(listener: &TcpListener) -> FakeServer {
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = FakeServer { stream, seq: 0 };
        server
            .send(&greeting_payload(
                CapabilityFlags::CLIENT_DEFAULT,
                "mysql_native_password",
            ))
            .await;
        let response = server.read().await;
        assert!(response.len() > 32);
        server.ok(AUTOCOMMIT).await;
        server
    }

    #[tokio::test]
    async fn connect_and_query() {
        let (listener, opts) = start().await;
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            assert_eq!(server.read().await, b"\x03SELECT 'x'");
            server.single_value("x".as_bytes(), AUTOCOMMIT).await;
            assert_eq!(server.read().await, [0x01]);
        });

        let mut conn = Conn::new(opts).await.unwrap();
        assert_eq!(conn.server_version(), "8.0.36");
        assert_eq!(conn.connection_id(), 42);
        assert!(conn.get_autocommit());

        let rows: Vec<(String,)> = conn.query_collect("SELECT 'x'").await.unwrap();
        assert_eq!(rows, vec![("x".to_string(),)]);

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn autocommit_applied_after_connect() {
        let (listener, mut opts) = start().await;
        opts.autocommit = Some(false);
        opts.sql_mode = Some("ANSI".into());
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            assert_eq!(server.read().await, b"\x03SET sql_mode = 'ANSI'");
            server.ok(AUTOCOMMIT).await;
            assert_eq!(server.read().await, b"\x03SET AUTOCOMMIT = 0");
            server.ok(0).await;
        });

        let conn = Conn::new(opts).await.unwrap();
        assert!(!conn.get_autocommit());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_keeps_connection() {
        let (listener, opts) = start().await;
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            server.read().await;
            let mut err = vec![0xFF, 0x7A, 0x04, b'#'];
            err.extend_from_slice(b"42S02Table 'x' doesn't exist");
            server.send(&err).await;
            assert_eq!(server.read().await, [0x0e]);
            server.ok(AUTOCOMMIT).await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        let err = conn.query_drop("SELECT * FROM x").await.unwrap_err();
        assert_eq!(err.code(), Some(1146));
        assert_eq!(err.sql_state(), Some("42S02"));
        assert!(!conn.is_broken());
        conn.ping().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn decode_error_keeps_connection() {
        let (listener, opts) = start().await;
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            assert_eq!(server.read().await, b"\x03SELECT 'abc'");
            server.send(&[1]).await;
            server
                .send(&column_payload("v", ColumnType::MYSQL_TYPE_VAR_STRING, 0, 45))
                .await;
            for _ in 0..2 {
                let mut row = Vec::new();
                write_lenenc_bytes(&mut row, b"abc");
                server.send(&row).await;
            }
            let [lo, hi] = AUTOCOMMIT.to_le_bytes();
            server.send(&[0xFE, 0x00, 0x00, lo, hi, 0x00, 0x00]).await;
            assert_eq!(server.read().await, [0x0e]);
            server.ok(AUTOCOMMIT).await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        let err = conn
            .query_collect::<(i64,)>("SELECT 'abc'")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err:?}");
        assert!(!conn.is_broken());
        conn.ping().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn lost_connection_marks_broken() {
        let (listener, opts) = start().await;
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            server.read().await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        let err = conn.query_drop("SELECT SLEEP(10)").await.unwrap_err();
        assert!(matches!(err.code(), Some(CR_SERVER_LOST | CR_SERVER_GONE_ERROR)));
        assert!(conn.is_broken());
        server.await.unwrap();

        let err = conn.ping().await.unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionState(_)));
    }

    #[tokio::test]
    async fn read_timeout() {
        let (listener, mut opts) = start().await;
        opts.read_timeout = Some(Duration::from_millis(50));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            server.read().await;
            let _ = done_rx.await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        let err = conn.ping().await.unwrap_err();
        assert_eq!(err.code(), Some(CR_SERVER_LOST));
        assert!(conn.is_broken());
        let _ = done_tx.send(());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_command_poisons_connection() {
        let (listener, opts) = start().await;
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            server.read().await;
            let _ = done_rx.await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        let cancelled = tokio::time::timeout(Duration::from_millis(50), conn.ping()).await;
        assert!(cancelled.is_err());

        let err = conn.ping().await.unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionState(_)));
        assert!(conn.is_broken());
        let _ = done_tx.send(());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn escape_follows_no_backslash_escapes() {
        let (listener, opts) = start().await;
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            server.read().await;
            server
                .ok(AUTOCOMMIT | StatusFlags::SERVER_STATUS_NO_BACKSLASH_ESCAPES)
                .await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        assert_eq!(conn.escape("foo'bar"), "'foo\\'bar'");
        conn.query_drop("SET sql_mode = 'NO_BACKSLASH_ESCAPES'")
            .await
            .unwrap();
        assert_eq!(conn.escape("foo'bar"), "'foo''bar'");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn select_db_updates_session() {
        let (listener, opts) = start().await;
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            assert_eq!(server.read().await, b"\x02shop");
            server.ok(AUTOCOMMIT).await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        assert_eq!(conn.current_database(), None);
        conn.select_db("shop").await.unwrap();
        assert_eq!(conn.current_database(), Some("shop"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let (listener, opts) = start().await;
        let in_trans = AUTOCOMMIT | StatusFlags::SERVER_STATUS_IN_TRANS;
        let server = tokio::spawn(async move {
            let mut server = accept(&listener).await;
            assert_eq!(server.read().await, b"\x03BEGIN");
            server.ok(in_trans).await;
            assert_eq!(server.read().await, b"\x03ROLLBACK");
            server.ok(AUTOCOMMIT).await;
        });

        let mut conn = Conn::new(opts).await.unwrap();
        let result: Result<()> = conn
            .run_transaction(async |_conn: &mut Conn| Err(Error::InvalidUsage("abort".into())))
            .await;
        assert!(matches!(result, Err(Error::InvalidUsage(_))));
        assert!(!conn.in_transaction());
        server.await.unwrap();
    }
}
