//! Snort and Suricata network IDS alerts.
//!
//! Both sensors publish the same alert layout through their hpfeeds output
//! plugins; only the product name differs.

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

const SNORT: &str = "snort.alerts";
const SURICATA: &str = "suricata.events";

/// Decoder for `snort.alerts` and `suricata.events`
pub struct IdsAlertDecoder;

impl ChannelDecoder for IdsAlertDecoder {
    fn channels(&self) -> &[&'static str] {
        &[SNORT, SURICATA]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;
        let (vendor_product, app) = if channel == SURICATA {
            ("Suricata", "suricata")
        } else {
            ("Snort", "snort")
        };
        let transport = p.str("protocol").map(str::to_ascii_lowercase);
        let priority = p.get("priority").and_then(parse_priority);

        let event = EventBuilder::new(channel, identifier, p.required_str("source_ip")?)
            .dest_ip(p.str("destination_ip"))
            .src_port(p.port("source_port"))
            .dest_port(p.port("destination_port"))
            .transport(transport.as_deref())
            .product(vendor_product, app)
            .severity(severity(priority))
            .signature(p.str("signature").unwrap_or("IDS alert"))
            .set("classification", p.value("classification"))
            .set("priority", priority)
            .set("header", p.value("header"))
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "IdsAlertDecoder"
    }
}

fn parse_priority(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Rule priority 1 is the most severe
fn severity(priority: Option<u64>) -> &'static str {
    match priority {
        Some(1) => "high",
        Some(2) => "medium",
        Some(_) => "low",
        None => "high",
    }
}
