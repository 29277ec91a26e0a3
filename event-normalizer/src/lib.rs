//! Honeypot payload normalization.
//!
//! Sensors publish JSON in their own shapes on their own hpfeeds channels.
//! This crate turns one such payload into zero or more [`NormalizedEvent`]s
//! sharing a single canonical key set (see [`CANONICAL_KEYS`]).
//!
//! # Architecture
//!
//! ```text
//! (channel, identifier, payload)
//!         │
//!         ▼
//! EventNormalizer ── exact channel lookup ──► ChannelDecoder
//!         │                                        │
//!         │ unknown / ignored channel              ▼
//!         ▼                               Vec<NormalizedEvent>
//!     no events
//! ```
//!
//! New sensor types are added by implementing [`ChannelDecoder`] and
//! registering it; nothing else changes.
//!
//! # Example
//!
//! ```
//! use event_normalizer::EventNormalizer;
//!
//! let normalizer = EventNormalizer::with_default_decoders();
//! let payload = br#"{"saddr": "1.2.3.4", "sport": "4455", "daddr": "10.0.0.5", "dport": 445, "md5": "abc"}"#;
//!
//! let events = normalizer.decode("dionaea.capture", "sensorA", payload).unwrap();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].src_ip(), Some("1.2.3.4"));
//! ```

pub mod decoder;
pub mod decoders;
pub mod error;
pub mod event;
pub mod registry;

pub use decoder::{ChannelDecoder, EventBuilder, Payload};
pub use decoders::{default_decoders, DEFAULT_CHANNELS};
pub use error::{DecodeError, NormalizerError};
pub use event::{NormalizedEvent, CANONICAL_KEYS};
pub use registry::EventNormalizer;
