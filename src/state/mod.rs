//! Sans-I/O state machines for the MySQL protocol.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! They produce `Action` values that tell the caller what to do next.

pub mod action;
pub mod connection;
pub mod prepare;
pub mod query;

pub use action::Action;
pub use connection::{ConnectionState, ConnectionStateMachine};
pub use prepare::{PrepareStateMachine, PreparedStatement};
pub use query::CommandStateMachine;

use crate::buffer_set::BufferSet;
use crate::error::Result;

/// A protocol state machine driven by a connection.
pub trait StateMachine {
    /// Advance the state machine.
    ///
    /// The first call starts the exchange. Later calls see the packet the
    /// previous action read in `buffer_set.read_buffer`.
    fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Action>;
}
