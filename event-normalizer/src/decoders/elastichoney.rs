//! Elastichoney Elasticsearch honeypot.

use serde_json::Value;

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `elastichoney.events`
pub struct ElastichoneyDecoder;

impl ChannelDecoder for ElastichoneyDecoder {
    fn channels(&self) -> &[&'static str] {
        &["elastichoney.events"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;
        let user_agent = p
            .get("headers")
            .and_then(|headers| headers.get("user_agent"))
            .cloned()
            .unwrap_or(Value::Null);

        let event = EventBuilder::new(channel, identifier, p.required_str("source")?)
            .dest_ip(p.str("honeypot"))
            .dest_port(Some(9200))
            .transport(Some("tcp"))
            .protocol(Some("http"))
            .product("ElasticHoney", "elastichoney")
            .signature("ElasticSearch Exploit Attempted")
            .set("url", p.value("url"))
            .set("method", p.value("method"))
            .set("form", p.value("form"))
            .set("payload", p.value("payload"))
            .set("user_agent", user_agent)
            .set("elastichoney_type", p.value("type"))
            .build();

        Ok(vec![event])
    }

    fn name(&self) -> &'static str {
        "ElastichoneyDecoder"
    }
}
