//! Asynchronous MySQL client using Tokio.

mod conn;
mod shared;
mod stream;

pub use conn::Conn;
pub use shared::{LockPolicy, SharedConn};
pub use stream::Stream;
