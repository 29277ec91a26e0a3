//! Kippo SSH honeypot sessions.
//!
//! One session event per message, plus one event per URL the attacker tried
//! to download during the session.

use serde_json::Value;

use crate::decoder::{ChannelDecoder, EventBuilder, Payload};
use crate::error::DecodeError;
use crate::event::NormalizedEvent;

/// Decoder for `kippo.sessions`
pub struct KippoDecoder;

impl ChannelDecoder for KippoDecoder {
    fn channels(&self) -> &[&'static str] {
        &["kippo.sessions"]
    }

    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError> {
        let p = Payload::parse(payload)?;
        let src_ip = p.required_str("peerIP")?;

        let base = EventBuilder::new(channel, identifier, src_ip)
            .dest_ip(p.str("hostIP"))
            .src_port(p.port("peerPort"))
            .dest_port(p.port("hostPort"))
            .transport(Some("tcp"))
            .protocol(Some("ssh"))
            .product("Kippo", "kippo")
            .set("session", p.value("session"));

        let (username, password) = login(&p);
        let session = base
            .clone()
            .signature("SSH session on kippo honeypot")
            .set("ssh_version", p.value("version"))
            .set("ssh_username", username)
            .set("ssh_password", password)
            .set("credentials", p.value("credentials"))
            .set("commands", p.value("commands"))
            .build();

        let mut events = vec![session];
        if let Some(Value::Array(urls)) = p.get("urls") {
            events.extend(urls.iter().filter_map(Value::as_str).map(|url| {
                base.clone()
                    .signature("File download attempted on kippo honeypot")
                    .set("url", url)
                    .build()
            }));
        }
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "KippoDecoder"
    }
}

/// Credentials of the successful login, `loggedin: [user, password]`
fn login(p: &Payload) -> (Value, Value) {
    match p.get("loggedin") {
        Some(Value::Array(pair)) => (
            pair.first().cloned().unwrap_or(Value::Null),
            pair.get(1).cloned().unwrap_or(Value::Null),
        ),
        _ => (Value::Null, Value::Null),
    }
}
