//! Beeswarm hive (honeypot side of the Beeswarm deployment).

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `beeswarm.hive`
pub struct BeeswarmDecoder;

impl ChannelDecoder for BeeswarmDecoder {
    fn channels(&self) -> &[&'static str] {
        &["beeswarm.hive"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;

        let event = EventBuilder::new(channel, identifier, p.required_str("attacker_ip")?)
            .dest_ip(p.str("honey_ip"))
            .src_port(p.port("attacker_source_port"))
            .dest_port(p.port("honey_port"))
            .transport(Some("tcp"))
            .protocol(p.str("protocol"))
            .product("Beeswarm", "beeswarm")
            .signature("Connection to Honeypot")
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "BeeswarmDecoder"
    }
}
