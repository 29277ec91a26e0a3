//! p0f passive OS fingerprinting.

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Fingerprint fields copied through as `p0f_<name>`
const FINGERPRINT_FIELDS: [&str; 7] = ["os", "app", "link", "uptime", "dist", "params", "raw_sig"];

/// Decoder for `p0f.events`
pub struct P0fDecoder;

impl ChannelDecoder for P0fDecoder {
    fn channels(&self) -> &[&'static str] {
        &["p0f.events"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;

        let mut builder = EventBuilder::new(channel, identifier, p.required_str("client_ip")?)
            .dest_ip(p.str("server_ip"))
            .src_port(p.port("client_port"))
            .dest_port(p.port("server_port"))
            .transport(Some("tcp"))
            .product("p0f", "p0f")
            .severity("info")
            .signature("Packet Observed by p0f");

        for field in FINGERPRINT_FIELDS {
            builder = builder.set(&format!("p0f_{field}"), p.value(field));
        }

        Ok(vec![builder.build()])
    }

    fn name(&self) -> &'static str {
        "P0fDecoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode() {
        let payload = br#"{
            "client_ip": "1.2.3.4", "client_port": 51000,
            "server_ip": "10.0.0.5", "server_port": 22,
            "os": "Linux 3.11 and newer", "dist": 7,
            "params": "none", "raw_sig": "4:57+7:0:1460:mss*20,7:mss,sok,ts,nop,ws:df,id+:0"
        }"#;

        let events = P0fDecoder.decode("p0f.events", "sensorP", payload).unwrap();
        let event = &events[0];

        assert_eq!(event.src_ip(), Some("1.2.3.4"));
        assert_eq!(event.get("severity"), Some(&json!("info")));
        assert_eq!(event.get("p0f_os"), Some(&json!("Linux 3.11 and newer")));
        assert_eq!(event.get("p0f_dist"), Some(&json!(7)));
        assert_eq!(event.get("p0f_uptime"), Some(&serde_json::Value::Null));
        // p0f's own `app` guess must not clobber the canonical key
        assert_eq!(event.get("app"), Some(&json!("p0f")));
    }

    #[test]
    fn test_requires_client_ip() {
        let result = P0fDecoder.decode("p0f.events", "s", br#"{"server_ip": "10.0.0.5"}"#);
        assert!(matches!(result, Err(DecodeError::MissingField("client_ip"))));
    }
}
