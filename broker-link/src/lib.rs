//! Managed hpfeeds broker connections.
//!
//! This crate owns the connection lifecycle for a single hpfeeds broker
//! session: TCP connect, the INFO/AUTH handshake, channel subscription,
//! fire-and-forget publishing and idempotent close. It knows nothing about
//! sensor payloads; messages are handed to the caller as opaque bytes.
//!
//! # Overview
//!
//! - [`BrokerLink`]: one broker session. Two independent instances are used by
//!   the collector, one per [`LinkRole`].
//! - [`RawMessage`]: a PUBLISH frame received on a subscribed channel.
//! - [`ProtocolError`]: an out-of-band notification raised when the broker
//!   signals an error or the session breaks. Notifications travel on their own
//!   channel so they are observable even while no message is being received.
//! - [`frame`]: the hpfeeds wire format.
//!
//! # Example
//!
//! ```no_run
//! use broker_link::{BrokerLink, LinkConfig, LinkRole};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), broker_link::LinkError> {
//!     let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
//!
//!     let config = LinkConfig::new(LinkRole::Inbound, "localhost", 10000, "collector", "secret");
//!     let link = BrokerLink::new(config, notify_tx);
//!     let mut messages = link.connect().await?;
//!     link.subscribe(["dionaea.capture"]).await?;
//!
//!     while let Some(message) = messages.recv().await {
//!         println!("{} published {} bytes on {}", message.identifier, message.payload.len(), message.channel);
//!     }
//!
//!     if let Ok(error) = notify_rx.try_recv() {
//!         eprintln!("session ended: {error}");
//!     }
//!     link.close().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod frame;
pub mod link;
pub mod traits;

pub use error::{FrameError, LinkError, ProtocolError, ProtocolErrorKind, Result};
pub use frame::{Frame, Opcode};
pub use link::{BrokerLink, LinkConfig, LinkRole, LinkState, RawMessage};
pub use traits::{Close, Publish};
