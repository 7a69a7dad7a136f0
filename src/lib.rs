//! SFU broadcaster
//!
//! Client side of a mediasoup-style SFU broadcaster: capability
//! negotiation, one send and one receive WebRTC transport per session,
//! audio/video producers, a data channel with a periodic heartbeat, and
//! the HTTP signaling that registers all of it with the server.
//!
//! ICE/DTLS/SCTP and media capture are supplied by the embedding
//! application through [`transport::TransportEngine`] and
//! [`media::MediaSource`].

pub mod broadcaster;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod logging;
pub mod media;
pub mod registry;
pub mod signaling;
pub mod transport;

pub use broadcaster::Broadcaster;
pub use config::BroadcasterConfig;
pub use error::{BroadcastError, Result};
