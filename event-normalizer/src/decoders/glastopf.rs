//! Glastopf web application honeypot.

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `glastopf.events`
///
/// The attacker endpoint arrives as `source: [address, port]`.
pub struct GlastopfDecoder;

impl ChannelDecoder for GlastopfDecoder {
    fn channels(&self) -> &[&'static str] {
        &["glastopf.events"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;
        let (src_ip, src_port) = p.endpoint("source")?;

        let event = EventBuilder::new(channel, identifier, src_ip)
            .src_port(src_port)
            .dest_port(Some(80))
            .transport(Some("tcp"))
            .protocol(Some("http"))
            .product("Glastopf", "glastopf")
            .signature("Connection to Honeypot")
            .set("request_url", p.value("request_url"))
            .set("pattern", p.value("pattern"))
            .set("filename", p.value("filename"))
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "GlastopfDecoder"
    }
}
