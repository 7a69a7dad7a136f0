//! Broadcaster configuration

mod schema;
mod store;

pub use schema::{BroadcasterConfig, DEFAULT_HEARTBEAT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
