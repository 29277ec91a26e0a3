//! Shockpot Shellshock (CVE-2014-6271) honeypot.

use serde_json::Value;

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `shockpot.events`
pub struct ShockpotDecoder;

impl ChannelDecoder for ShockpotDecoder {
    fn channels(&self) -> &[&'static str] {
        &["shockpot.events"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;
        let is_shellshock = p
            .get("is_shellshock")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let signature = if is_shellshock {
            "Shellshock Exploit Attempted"
        } else {
            "Connection to Honeypot"
        };

        let event = EventBuilder::new(channel, identifier, p.required_str("source_ip")?)
            .dest_ip(p.str("dest_host"))
            .src_port(p.port("source_port"))
            .dest_port(p.port("dest_port"))
            .transport(Some("tcp"))
            .protocol(Some("http"))
            .product("Shockpot", "shockpot")
            .signature(signature)
            .set("url", p.value("url"))
            .set("method", p.value("method"))
            .set("command", p.value("command"))
            .set("is_shellshock", is_shellshock)
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "ShockpotDecoder"
    }
}
