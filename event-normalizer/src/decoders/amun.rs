//! Amun vulnerability-emulation honeypot.

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `amun.events`
pub struct AmunDecoder;

impl ChannelDecoder for AmunDecoder {
    fn channels(&self) -> &[&'static str] {
        &["amun.events"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;

        let event = EventBuilder::new(channel, identifier, p.required_str("attackerIP")?)
            .dest_ip(p.str("victimIP"))
            .src_port(p.port("attackerPort"))
            .dest_port(p.port("victimPort"))
            .transport(Some("tcp"))
            .product("Amun", "amun")
            .signature("Connection to Honeypot")
            .set("connection_type", p.value("connectionType"))
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "AmunDecoder"
    }
}
