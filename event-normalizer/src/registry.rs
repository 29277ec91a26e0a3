//! Channel-to-decoder routing table.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::decoder::ChannelDecoder;
use crate::decoders::default_decoders;
use crate::error::{DecodeError, NormalizerError};
use crate::event::NormalizedEvent;

/// Registry of channel decoders, built once at startup.
#[derive(Default)]
pub struct EventNormalizer {
    routes: HashMap<String, Arc<dyn ChannelDecoder>>,
    ignored: BTreeSet<String>,
}

impl EventNormalizer {
    /// An empty registry: every channel yields no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding a decoder for every known sensor channel.
    pub fn with_default_decoders() -> Self {
        let mut normalizer = Self::new();
        for decoder in default_decoders() {
            normalizer.register(decoder);
        }
        normalizer
    }

    /// Route every channel `decoder` declares to it.
    ///
    /// A channel already routed elsewhere is taken over by the new decoder.
    pub fn register(&mut self, decoder: Box<dyn ChannelDecoder>) -> &mut Self {
        let decoder: Arc<dyn ChannelDecoder> = Arc::from(decoder);
        for channel in decoder.channels() {
            if let Some(previous) = self.routes.insert(channel.to_string(), decoder.clone()) {
                tracing::warn!(
                    channel,
                    previous = previous.name(),
                    decoder = decoder.name(),
                    "Decoder replaced"
                );
            }
        }
        self
    }

    /// Accept `channel` and drop its messages. Takes precedence over a decoder.
    pub fn ignore(&mut self, channel: impl Into<String>) -> &mut Self {
        self.ignored.insert(channel.into());
        self
    }

    /// Decode one payload. Unknown and ignored channels yield no events.
    pub fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        if self.ignored.contains(channel) {
            tracing::trace!(channel, "Channel ignored");
            return Ok(Vec::new());
        }

        let Some(decoder) = self.routes.get(channel) else {
            tracing::debug!(channel, "No decoder for channel");
            return Ok(Vec::new());
        };

        let events = decoder.decode(channel, identifier, payload)?;
        tracing::trace!(
            channel,
            decoder = decoder.name(),
            count = events.len(),
            "Decoded payload"
        );
        Ok(events)
    }

    /// Check that every channel has a decoder or an ignore entry.
    pub fn validate<S: AsRef<str>>(&self, channels: &[S]) -> Result<(), NormalizerError> {
        let unhandled: Vec<String> = channels
            .iter()
            .map(AsRef::as_ref)
            .filter(|channel| !self.handles(channel))
            .map(str::to_string)
            .collect();

        if unhandled.is_empty() {
            Ok(())
        } else {
            Err(NormalizerError::UnhandledChannels(unhandled))
        }
    }

    /// Whether `channel` has a decoder or an ignore entry
    pub fn handles(&self, channel: &str) -> bool {
        self.routes.contains_key(channel) || self.ignored.contains(channel)
    }

    /// Channels with a decoder, sorted
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        channels.sort_unstable();
        channels
    }

    /// Channels explicitly ignored, sorted
    pub fn ignored_channels(&self) -> Vec<&str> {
        self.ignored.iter().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for EventNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNormalizer")
            .field("channels", &self.channels())
            .field("ignored", &self.ignored)
            .finish()
    }
}
