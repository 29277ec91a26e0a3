//! Conpot ICS/SCADA honeypot.

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `conpot.events`
///
/// The attacker endpoint arrives as `remote: [address, port]`; `data_type`
/// names the emulated protocol (modbus, s7comm, http, snmp ...).
pub struct ConpotDecoder;

impl ChannelDecoder for ConpotDecoder {
    fn channels(&self) -> &[&'static str] {
        &["conpot.events"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;
        let (src_ip, src_port) = p.endpoint("remote")?;
        let transport = match p.str("data_type") {
            Some("snmp") | Some("bacnet") | Some("ipmi") => "udp",
            _ => "tcp",
        };

        let event = EventBuilder::new(channel, identifier, src_ip)
            .dest_ip(p.str("public_ip"))
            .src_port(src_port)
            .transport(Some(transport))
            .protocol(p.str("data_type"))
            .product("Conpot", "conpot")
            .signature("Connection to Honeypot")
            .set("request", p.value("request"))
            .set("conpot_event_id", p.value("id"))
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "ConpotDecoder"
    }
}
