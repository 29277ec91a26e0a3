//! Dionaea malware-capture honeypot.
//!
//! `dionaea.capture` reports downloaded binaries, `dionaea.connections`
//! reports every connection the honeypot accepts or makes.

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

const CAPTURE: &str = "dionaea.capture";
const CONNECTIONS: &str = "dionaea.connections";

/// Decoder for Dionaea capture and connection events
pub struct DionaeaDecoder;

impl ChannelDecoder for DionaeaDecoder {
    fn channels(&self) -> &[&'static str] {
        &[CAPTURE, CONNECTIONS]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let payload = Payload::parse(payload)?;
        let event = if channel == CAPTURE {
            capture(channel, identifier, &payload)?
        } else {
            connection(channel, identifier, &payload)?
        };
        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "DionaeaDecoder"
    }
}

fn capture(channel: &str, identifier: &str, p: &Payload) -> Result<NormalizedEvent, DecodeError> {
    Ok(EventBuilder::new(channel, identifier, p.required_str("saddr")?)
        .dest_ip(p.str("daddr"))
        .src_port(p.port("sport"))
        .dest_port(p.port("dport"))
        .transport(Some("tcp"))
        .product("Dionaea", "dionaea")
        .signature("Malware sample captured")
        .set("url", p.value("url"))
        .set("md5", p.value("md5"))
        .set("sha512", p.value("sha512"))
        .build())
}

fn connection(
    channel: &str,
    identifier: &str,
    p: &Payload,
) -> Result<NormalizedEvent, DecodeError> {
    // "connect" is the honeypot dialing out, e.g. to fetch a payload
    let direction = match p.str("connection_type") {
        Some("connect") => "outbound",
        _ => "inbound",
    };

    Ok(EventBuilder::new(channel, identifier, p.required_str("remote_host")?)
        .dest_ip(p.str("local_host"))
        .src_port(p.port("remote_port"))
        .dest_port(p.port("local_port"))
        .transport(p.str("connection_transport"))
        .protocol(p.str("connection_protocol"))
        .product("Dionaea", "dionaea")
        .direction(direction)
        .signature("Connection to Honeypot")
        .set("remote_hostname", p.value("remote_hostname"))
        .set("connection_type", p.value("connection_type"))
        .build())
}
