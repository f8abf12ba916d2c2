//! Outstanding stdio requests awaiting their response line.

use crate::protocol::{McpError, RequestId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Completion signal for one request: the raw response message or a failure
pub(crate) type Completion = Result<Value, McpError>;

/// Map of request id → waiting caller.
///
/// Each entry is resolved at most once: resolving, cancelling and closing
/// all remove the sender before using it. Once closed, no new entry can be
/// registered. The lock is never held across an await, so every operation
/// is synchronous and usable from `Drop`.
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    waiters: HashMap<RequestId, oneshot::Sender<Completion>>,
    closed: bool,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id` and hand back the receiving half of its completion signal
    pub(crate) fn register(&self, id: RequestId) -> Result<oneshot::Receiver<Completion>, McpError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(McpError::TransportClosed);
        }

        let (tx, rx) = oneshot::channel();
        if inner.waiters.insert(id.clone(), tx).is_some() {
            tracing::warn!(id = %id, "replaced a pending request with a duplicate id");
        }
        Ok(rx)
    }

    /// Deliver a response message. Returns `false` when nobody waits for `id`.
    pub(crate) fn resolve(&self, id: &RequestId, message: Value) -> bool {
        let waiter = self.lock().waiters.remove(id);
        match waiter {
            // The caller may have given up in the meantime; that is fine.
            Some(tx) => {
                let _ = tx.send(Ok(message));
                true
            }
            None => false,
        }
    }

    /// Forget `id` without resolving it
    pub(crate) fn cancel(&self, id: &RequestId) {
        self.lock().waiters.remove(id);
    }

    /// Fail every outstanding request with [`McpError::TransportClosed`] and
    /// refuse new ones. Returns how many requests were failed.
    pub(crate) fn close(&self) -> usize {
        let waiters = {
            let mut inner = self.lock();
            inner.closed = true;
            std::mem::take(&mut inner.waiters)
        };

        let count = waiters.len();
        for (_, tx) in waiters {
            let _ = tx.send(Err(McpError::TransportClosed));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().waiters.len()
    }
}

/// Removes one entry from the table when the waiting call ends, however it
/// ends: response, timeout, failed write, or the caller dropping the future.
pub(crate) struct PendingEntry {
    pending: Arc<PendingRequests>,
    id: RequestId,
}

impl PendingEntry {
    pub(crate) fn new(pending: Arc<PendingRequests>, id: RequestId) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        // No-op when the reader already resolved the entry.
        self.pending.cancel(&self.id);
    }
}
