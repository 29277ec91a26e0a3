//! Per-message relay: decode, enrich, transform, publish.
//!
//! Every message is processed in isolation. A failure at any stage,
//! including a panic inside a decoder or lookup source, drops only the
//! message or event it happened in; the pipeline itself never fails.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use broker_link::{Publish, RawMessage};
use bytes::Bytes;
use event_normalizer::{EventNormalizer, NormalizedEvent};
use geo_enrich::{GeoEnricher, GeoRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RelayError;

/// Keys the relay owns on an outgoing event. Decoder output under these
/// names is discarded.
pub const RESERVED_KEYS: [&str; 5] = ["dest_ip", "src_geo", "dest_geo", "mhn_uuid", "mhn_ip"];

/// The document published upstream for one event.
///
/// Serializes as the event's own fields, flattened, followed by the relay's
/// fields. `dest_ip` is never present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEvent {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub src_geo: GeoRecord,
    pub dest_geo: GeoRecord,
    pub mhn_uuid: String,
    pub mhn_ip: Option<String>,
}

impl OutgoingEvent {
    pub fn new(
        event: NormalizedEvent,
        src_geo: GeoRecord,
        dest_geo: GeoRecord,
        mhn_uuid: impl Into<String>,
        mhn_ip: Option<String>,
    ) -> Self {
        let mut fields = event.into_map();
        for key in RESERVED_KEYS {
            fields.remove(key);
        }
        Self {
            fields,
            src_geo,
            dest_geo,
            mhn_uuid: mhn_uuid.into(),
            mhn_ip,
        }
    }
}

/// Fixed inputs of the relay.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Outbound channel every event is published on
    pub channel: String,
    /// Deployment identity
    pub mhn_uuid: String,
    /// Public address of this collector, if known
    pub mhn_ip: Option<String>,
}

/// What happened to one message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub published: usize,
    pub dropped: usize,
}

/// Running totals since the pipeline was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub messages: u64,
    pub published: u64,
    pub dropped: u64,
}

/// Relays inbound messages to a publisher.
pub struct RelayPipeline<P> {
    normalizer: EventNormalizer,
    enricher: GeoEnricher,
    publisher: P,
    settings: RelaySettings,
    messages: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl<P: Publish> RelayPipeline<P> {
    pub fn new(
        normalizer: EventNormalizer,
        enricher: GeoEnricher,
        publisher: P,
        settings: RelaySettings,
    ) -> Self {
        Self {
            normalizer,
            enricher,
            publisher,
            settings,
            messages: AtomicU64::new(0),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Relay one message. Never fails; failures are logged and counted.
    pub fn process(&self, message: &RawMessage) -> RelayOutcome {
        let span = tracing::info_span!(
            "relay",
            identifier = %message.identifier,
            channel = %message.channel
        );
        let _entered = span.enter();

        self.messages.fetch_add(1, Ordering::Relaxed);
        let mut outcome = RelayOutcome::default();

        let events = match contain(|| self.decode(message)) {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(
                    identifier = %message.identifier,
                    channel = %message.channel,
                    error = %e,
                    "Dropping message"
                );
                outcome.dropped = 1;
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return outcome;
            }
        };

        for event in events {
            match contain(|| self.forward(event)) {
                Ok(()) => outcome.published += 1,
                Err(e) => {
                    tracing::error!(
                        identifier = %message.identifier,
                        channel = %message.channel,
                        error = %e,
                        "Dropping event"
                    );
                    outcome.dropped += 1;
                }
            }
        }

        self.published
            .fetch_add(outcome.published as u64, Ordering::Relaxed);
        self.dropped.fetch_add(outcome.dropped as u64, Ordering::Relaxed);
        tracing::trace!(published = outcome.published, "Message relayed");
        outcome
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            messages: self.messages.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    fn decode(&self, message: &RawMessage) -> Result<Vec<NormalizedEvent>, RelayError> {
        Ok(self
            .normalizer
            .decode(&message.channel, &message.identifier, &message.payload)?)
    }

    fn forward(&self, event: NormalizedEvent) -> Result<(), RelayError> {
        let src_geo = self.enricher.lookup(event.src_ip());
        let dest_geo = self.enricher.lookup(event.dest_ip());

        let outgoing = OutgoingEvent::new(
            event,
            src_geo,
            dest_geo,
            self.settings.mhn_uuid.as_str(),
            self.settings.mhn_ip.clone(),
        );
        let payload = serde_json::to_vec(&outgoing)?;

        self.publisher
            .publish(&self.settings.channel, Bytes::from(payload));
        Ok(())
    }
}

/// Run one stage, turning a panic into [`RelayError::Unexpected`].
fn contain<T>(stage: impl FnOnce() -> Result<T, RelayError>) -> Result<T, RelayError> {
    catch_unwind(AssertUnwindSafe(stage))
        .unwrap_or_else(|panic| Err(RelayError::Unexpected(panic_message(panic.as_ref()))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-text payload".to_string()
    }
}
