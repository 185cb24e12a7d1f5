//! Per-connection session state.

use crate::escape::EscapeMode;
use crate::protocol::constant::StatusFlags;
use crate::protocol::response::{OkPacket, SessionChange};

/// Session state cached from the server's OK and EOF packets.
///
/// Updated once per completed command, never while a response is being decoded.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    database: Option<String>,
    charset: String,
    status_flags: StatusFlags,
    affected_rows: u64,
    last_insert_id: u64,
    warning_count: u16,
}

impl SessionState {
    pub fn new(database: Option<String>, charset: String, status_flags: StatusFlags) -> Self {
        Self {
            database,
            charset,
            status_flags,
            ..Self::default()
        }
    }

    /// Apply the OK (or EOF converted to OK) that ended a statement.
    pub fn apply_ok(&mut self, ok: &OkPacket) {
        self.status_flags = ok.status_flags;
        self.affected_rows = ok.affected_rows;
        self.last_insert_id = ok.last_insert_id;
        self.warning_count = ok.warnings;

        for change in &ok.session_changes {
            match change {
                SessionChange::Schema(name) => {
                    self.database = (!name.is_empty()).then(|| name.clone());
                }
                SessionChange::SystemVariable { name, value } => {
                    if name == "character_set_client" {
                        self.charset = value.clone();
                    }
                }
                SessionChange::Other(kind) => {
                    tracing::warn!(kind, "ignoring unknown session-track entry");
                }
            }
        }
    }

    /// Record the database chosen by COM_INIT_DB.
    pub fn set_database(&mut self, database: Option<String>) {
        self.database = database;
    }

    pub fn autocommit(&self) -> bool {
        self.status_flags.autocommit()
    }

    pub fn in_transaction(&self) -> bool {
        self.status_flags.in_transaction()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn warning_count(&self) -> u16 {
        self.warning_count
    }

    /// Escaping rule for the current `NO_BACKSLASH_ESCAPES` bit.
    pub fn escape_mode(&self) -> EscapeMode {
        EscapeMode::from_status(self.status_flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(status: u16, changes: Vec<SessionChange>) -> OkPacket {
        OkPacket {
            affected_rows: 3,
            last_insert_id: 9,
            status_flags: StatusFlags::new(status),
            warnings: 1,
            info: String::new(),
            session_changes: changes,
        }
    }

    #[test]
    fn apply_ok_updates_counters_and_flags() {
        let mut session = SessionState::new(None, "utf8mb4".into(), StatusFlags::default());
        assert!(!session.autocommit());
        session.apply_ok(&ok(StatusFlags::SERVER_STATUS_AUTOCOMMIT, vec![]));
        assert!(session.autocommit());
        assert_eq!(session.affected_rows(), 3);
        assert_eq!(session.last_insert_id(), 9);
        assert_eq!(session.warning_count(), 1);
        assert_eq!(session.escape_mode(), EscapeMode::Backslash);

        session.apply_ok(&ok(StatusFlags::SERVER_STATUS_NO_BACKSLASH_ESCAPES, vec![]));
        assert!(!session.autocommit());
        assert_eq!(session.escape_mode(), EscapeMode::QuoteDoubling);
    }

    #[test]
    fn session_track_changes() {
        let mut session = SessionState::new(Some("a".into()), "utf8mb4".into(), StatusFlags::default());
        session.apply_ok(&ok(
            0,
            vec![
                SessionChange::Schema("b".into()),
                SessionChange::SystemVariable {
                    name: "character_set_client".into(),
                    value: "latin1".into(),
                },
                SessionChange::Other(5),
            ],
        ));
        assert_eq!(session.database(), Some("b"));
        assert_eq!(session.charset(), "latin1");

        session.apply_ok(&ok(0, vec![SessionChange::Schema(String::new())]));
        assert_eq!(session.database(), None);
    }
}
