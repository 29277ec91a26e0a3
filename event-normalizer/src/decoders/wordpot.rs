//! Wordpot WordPress honeypot.

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `wordpot.events`
pub struct WordpotDecoder;

impl ChannelDecoder for WordpotDecoder {
    fn channels(&self) -> &[&'static str] {
        &["wordpot.events"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;
        let signature = if p.get("username").is_some() {
            "WordPress login attempt"
        } else {
            "WordPress probe"
        };

        let event = EventBuilder::new(channel, identifier, p.required_str("source_ip")?)
            .dest_ip(p.str("dest_ip"))
            .src_port(p.port("source_port"))
            .dest_port(p.port("dest_port"))
            .transport(Some("tcp"))
            .protocol(Some("http"))
            .product("Wordpot", "wordpot")
            .signature(signature)
            .set("url", p.value("url"))
            .set("username", p.value("username"))
            .set("password", p.value("password"))
            .set("plugin", p.value("plugin"))
            .set("theme", p.value("theme"))
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "WordpotDecoder"
    }
}
