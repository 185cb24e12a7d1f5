//! A connection shared between tasks.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

use super::Conn;

/// What a caller does when another task holds the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Wait for the current command to finish
    #[default]
    Block,
    /// Fail with `InvalidConnectionState` instead of waiting
    FailFast,
}

/// A `Conn` behind an async mutex, so commands from different tasks never interleave.
///
/// ```ignore
/// let shared = SharedConn::new(conn, LockPolicy::Block);
/// let handle = shared.clone();
/// tokio::spawn(async move {
///     handle.lock().await?.ping().await
/// });
/// ```
#[derive(Clone)]
pub struct SharedConn {
    inner: Arc<Mutex<Conn>>,
    policy: LockPolicy,
}

impl SharedConn {
    pub fn new(conn: Conn, policy: LockPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(conn)),
            policy,
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Exclusive access to the connection for one or more commands.
    pub async fn lock(&self) -> Result<MutexGuard<'_, Conn>> {
        match self.policy {
            LockPolicy::Block => Ok(self.inner.lock().await),
            LockPolicy::FailFast => self.inner.try_lock().map_err(|busy| {
                Error::InvalidConnectionState(format!("connection is in use: {busy}"))
            }),
        }
    }
}
