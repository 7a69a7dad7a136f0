//! Receive transport: data consumers

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::base::TransportBase;
use super::listener::DataConsumerListener;
use super::TransportDirection;
use crate::error::Result;
use crate::registry::{DataConsumer, DataConsumerInit};

/// Options for [`RecvTransport::consume_data`], taken from the server's
/// data consumer description
#[derive(Debug, Clone)]
pub struct ConsumeDataOptions {
    pub id: String,
    pub data_producer_id: String,
    pub stream_id: u16,
    pub label: String,
    pub protocol: String,
    pub app_data: Value,
}

/// Receive-direction transport
pub struct RecvTransport {
    base: TransportBase,
}

impl RecvTransport {
    pub fn new(base: TransportBase) -> Self {
        debug_assert_eq!(base.direction(), TransportDirection::Recv);
        Self { base }
    }

    pub fn base(&self) -> &TransportBase {
        &self.base
    }

    pub fn id(&self) -> &str {
        self.base.id()
    }

    /// Attach to a server-side data consumer
    pub async fn consume_data(
        &self,
        options: ConsumeDataOptions,
        listener: Arc<dyn DataConsumerListener>,
    ) -> Result<Arc<DataConsumer>> {
        self.base.ensure_open()?;
        self.base.ensure_connected().await?;

        self.base
            .engine()
            .open_data_receiver(options.stream_id, &options.label, &options.protocol)
            .await?;

        info!(
            "Data consumer created: {} (label={}, stream={})",
            options.id, options.label, options.stream_id
        );
        Ok(Arc::new(DataConsumer::new(
            DataConsumerInit {
                id: options.id,
                data_producer_id: options.data_producer_id,
                label: options.label,
                protocol: options.protocol,
                stream_id: options.stream_id,
                app_data: options.app_data,
            },
            self.base.engine().clone(),
            listener,
        )))
    }

    pub fn close(&self) {
        self.base.close()
    }
}

impl std::fmt::Debug for RecvTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.base, f)
    }
}
