//! # mhn-collector
//!
//! Relays honeypot telemetry from a local hpfeeds broker to an upstream
//! aggregator.
//!
//! For every message received on the inbound link the collector:
//!
//! 1. decodes the sensor payload into canonical events ([`event_normalizer`]),
//! 2. attaches `src_geo` / `dest_geo` geolocation ([`geo_enrich`]),
//! 3. attaches `mhn_uuid` and `mhn_ip`, and removes `dest_ip`,
//! 4. publishes the JSON document on the outbound channel ([`broker_link`]).
//!
//! Failures are contained to the message they happen in. A protocol error on
//! either link, or an interrupt, closes both links exactly once and ends the
//! run.
//!
//! ## Modules
//!
//! - [`config`]: the JSON configuration file
//! - [`pipeline`]: [`RelayPipeline`] and the outgoing document
//! - [`shutdown`]: [`ShutdownCoordinator`] and the run loop
//! - [`app`]: startup order and the complete run
//! - [`provision`], [`public_ip`]: startup collaborators
//! - [`logging`]: subscriber setup for the binary

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod provision;
pub mod public_ip;
pub mod shutdown;

pub use app::{run, run_until, RunSummary};
pub use config::CollectorConfig;
pub use error::{CollectorError, ConfigError, RelayError, Result};
pub use pipeline::{OutgoingEvent, RelayOutcome, RelayPipeline, RelaySettings, RelayStats};
pub use shutdown::{CoordinatorState, ShutdownCoordinator, ShutdownReason};
