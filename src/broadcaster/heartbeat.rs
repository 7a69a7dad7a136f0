//! Periodic heartbeat over the data producer

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::DataProducer;

/// Handle to the running heartbeat task
pub(crate) struct Heartbeat {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Send one heartbeat now, then one per `interval` until stopped
    pub fn spawn(data_producer: Arc<DataProducer>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            run(data_producer, interval, task_token).await;
        });
        Self { token, handle }
    }

    /// Cancel and wait until the task has exited
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                warn!("Heartbeat task ended abnormally: {}", e);
            }
        }
    }

    /// Cancel without waiting; used where awaiting is impossible
    pub fn abort(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

async fn run(data_producer: Arc<DataProducer>, interval: Duration, token: CancellationToken) {
    info!(
        "Heartbeat started on data producer {} (every {:?})",
        data_producer.id(),
        interval
    );

    loop {
        if token.is_cancelled() {
            break;
        }

        let message = heartbeat_message();
        match data_producer.send(Bytes::from(message)).await {
            Ok(()) => debug!("Heartbeat sent on data producer {}", data_producer.id()),
            Err(e) => warn!("Failed to send heartbeat: {}", e),
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Heartbeat stopped on data producer {}", data_producer.id());
}

/// Local time in `ctime` layout, newline terminated
pub fn heartbeat_message() -> String {
    chrono::Local::now()
        .format("%a %b %e %H:%M:%S %Y\n")
        .to_string()
}
