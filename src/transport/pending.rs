//! Single-resolution signaling requests
//!
//! A [`PendingRequest`] is handed to a listener and consumed by
//! [`PendingRequest::resolve`], so it can produce at most one result.
//! Dropping it unresolved resolves the waiting side with an error, so a
//! request is never left hanging.

use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::{BroadcastError, Result};

/// Responder side of an in-flight round trip
#[must_use = "a pending request must be resolved"]
pub struct PendingRequest<T> {
    name: &'static str,
    tx: Option<oneshot::Sender<Result<T>>>,
}

/// Waiting side of an in-flight round trip
pub struct PendingReply<T> {
    name: &'static str,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> PendingRequest<T> {
    pub fn new(name: &'static str) -> (Self, PendingReply<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { name, tx: Some(tx) }, PendingReply { name, rx })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn resolve(mut self, result: Result<T>) {
        if let Some(tx) = self.tx.take() {
            // Waiter gone means the caller gave up; nothing left to notify
            let _ = tx.send(result);
        }
    }

    pub fn succeed(self, value: T) {
        self.resolve(Ok(value))
    }

    pub fn fail(self, error: BroadcastError) {
        self.resolve(Err(error))
    }
}

impl<T> Drop for PendingRequest<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(BroadcastError::InvalidState(format!(
                "{} request dropped without a result",
                self.name
            ))));
        }
    }
}

impl<T> PendingReply<T> {
    /// Wait for the result, failing with a signaling error after `timeout`
    pub async fn wait(self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BroadcastError::InvalidState(format!(
                "{} request abandoned",
                self.name
            ))),
            Err(_) => Err(BroadcastError::Signaling(format!(
                "{} request timed out after {:?}",
                self.name, timeout
            ))),
        }
    }
}
