//! Channel decoder capability and the helpers decoders share.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::event::{NormalizedEvent, CANONICAL_KEYS};

/// Decodes the payloads of one sensor family.
///
/// Implementations declare the channels they own; the
/// [`EventNormalizer`](crate::EventNormalizer) routes by exact channel name.
pub trait ChannelDecoder: Send + Sync {
    /// Channels this decoder handles
    fn channels(&self) -> &[&'static str];

    /// Decode one payload published by `identifier` on `channel`
    fn decode(
        &self,
        channel: &str,
        identifier: &str,
        payload: &[u8],
    ) -> Result<Vec<NormalizedEvent>, DecodeError>;

    /// Decoder name for logging
    fn name(&self) -> &'static str;
}

/// A parsed sensor payload.
#[derive(Debug, Clone)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Parse a JSON object payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DecodeError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Value under `key`, or `null`
    pub fn value(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Non-empty string under `key`
    pub fn required_str(&self, key: &'static str) -> Result<&str, DecodeError> {
        match self.get(key) {
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.trim()),
            None | Some(Value::String(_)) => Err(DecodeError::MissingField(key)),
            Some(other) => Err(DecodeError::InvalidField {
                field: key,
                reason: format!("expected a string, got {}", json_kind(other)),
            }),
        }
    }

    /// Port under `key`, accepting numbers and numeric strings
    pub fn port(&self, key: &str) -> Option<u16> {
        self.get(key).and_then(port)
    }

    /// `[address, port]` pair under `key`
    pub fn endpoint(&self, key: &'static str) -> Result<(&str, Option<u16>), DecodeError> {
        let items = match self.get(key) {
            Some(Value::Array(items)) => items,
            None => return Err(DecodeError::MissingField(key)),
            Some(other) => {
                return Err(DecodeError::InvalidField {
                    field: key,
                    reason: format!("expected [address, port], got {}", json_kind(other)),
                })
            }
        };
        let address = items
            .first()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(DecodeError::MissingField(key))?;
        Ok((address, items.get(1).and_then(port)))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Interpret a JSON value as a port number.
pub fn port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builds an event in the canonical shape.
///
/// Every canonical key starts as `null`; `direction`, `ids_type` and
/// `severity` start as `inbound`, `network` and `high`.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: NormalizedEvent,
}

impl EventBuilder {
    pub fn new(channel: &str, identifier: &str, src_ip: &str) -> Self {
        let mut event = NormalizedEvent::new();
        for key in CANONICAL_KEYS {
            event.insert(key, Value::Null);
        }
        event.insert("type", channel);
        event.insert("sensor", identifier);
        event.insert("src_ip", src_ip);
        event.insert("direction", "inbound");
        event.insert("ids_type", "network");
        event.insert("severity", "high");
        Self { event }
    }

    pub fn dest_ip(self, value: Option<&str>) -> Self {
        self.set("dest_ip", value)
    }

    pub fn src_port(self, value: Option<u16>) -> Self {
        self.set("src_port", value)
    }

    pub fn dest_port(self, value: Option<u16>) -> Self {
        self.set("dest_port", value)
    }

    pub fn transport(self, value: Option<&str>) -> Self {
        self.set("transport", value)
    }

    pub fn protocol(self, value: Option<&str>) -> Self {
        self.set("protocol", value)
    }

    /// `vendor_product` and `app` together
    pub fn product(self, vendor_product: &str, app: &str) -> Self {
        self.set("vendor_product", vendor_product).set("app", app)
    }

    pub fn direction(self, value: &str) -> Self {
        self.set("direction", value)
    }

    pub fn severity(self, value: &str) -> Self {
        self.set("severity", value)
    }

    pub fn signature(self, value: &str) -> Self {
        self.set("signature", value)
    }

    /// Any key, canonical or sensor-specific
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.event.insert(key, value);
        self
    }

    pub fn build(self) -> NormalizedEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::number(json!(445), Some(445))]
    #[case::string(json!("4455"), Some(4455))]
    #[case::padded_string(json!(" 22 "), Some(22))]
    #[case::out_of_range(json!(70000), None)]
    #[case::negative(json!(-1), None)]
    #[case::float(json!(80.5), None)]
    #[case::word(json!("http"), None)]
    #[case::null(json!(null), None)]
    fn test_port(#[case] value: Value, #[case] expected: Option<u16>) {
        assert_eq!(port(&value), expected);
    }

    #[rstest]
    #[case::array(&b"[1, 2]"[..], "array")]
    #[case::string(&b"\"text\""[..], "string")]
    #[case::number(&b"42"[..], "number")]
    fn test_parse_rejects_non_objects(#[case] bytes: &[u8], #[case] kind: &str) {
        match Payload::parse(bytes) {
            Err(DecodeError::NotAnObject(actual)) => assert_eq!(actual, kind),
            other => panic!("Expected NotAnObject, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            Payload::parse(b"{not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(Payload::parse(b""), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_required_str() {
        let payload = Payload::parse(br#"{"a": "x", "b": "  ", "c": 5, "d": null}"#).unwrap();

        assert_eq!(payload.required_str("a").unwrap(), "x");
        for key in ["b", "d", "missing"] {
            assert!(matches!(
                payload.required_str(key),
                Err(DecodeError::MissingField(_))
            ));
        }
        match payload.required_str("c") {
            Err(DecodeError::InvalidField { field, reason }) => {
                assert_eq!(field, "c");
                assert_eq!(reason, "expected a string, got number");
            }
            other => panic!("Expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn test_endpoint() {
        let payload =
            Payload::parse(br#"{"source": ["1.2.3.4", 5555], "bad": [], "odd": ["5.6.7.8"], "odd_scalar": "1.2.3.4"}"#)
                .unwrap();

        assert_eq!(payload.endpoint("source").unwrap(), ("1.2.3.4", Some(5555)));
        assert_eq!(payload.endpoint("odd").unwrap(), ("5.6.7.8", None));
        assert!(payload.endpoint("bad").is_err());
        assert!(payload.endpoint("missing").is_err());
        assert!(matches!(
            payload.endpoint("odd_scalar"),
            Err(DecodeError::InvalidField { field: "odd_scalar", .. })
        ));
    }

    #[test]
    fn test_null_is_treated_as_absent() {
        let payload = Payload::parse(br#"{"url": null}"#).unwrap();
        assert!(payload.get("url").is_none());
        assert_eq!(payload.value("url"), Value::Null);
    }

    #[test]
    fn test_builder_starts_with_every_canonical_key() {
        let event = EventBuilder::new("amun.events", "sensorA", "1.2.3.4").build();

        for key in CANONICAL_KEYS {
            assert!(event.contains_key(key), "{key} missing");
        }
        assert_eq!(event.event_type(), Some("amun.events"));
        assert_eq!(event.get("sensor"), Some(&json!("sensorA")));
        assert_eq!(event.get("direction"), Some(&json!("inbound")));
        assert_eq!(event.get("dest_ip"), Some(&Value::Null));
    }

    #[test]
    fn test_builder_setters() {
        let event = EventBuilder::new("p0f.events", "s", "1.2.3.4")
            .dest_ip(Some("10.0.0.1"))
            .src_port(None)
            .dest_port(Some(80))
            .product("p0f", "p0f")
            .severity("info")
            .set("p0f_os", "Linux")
            .build();

        assert_eq!(event.dest_ip(), Some("10.0.0.1"));
        assert_eq!(event.get("src_port"), Some(&Value::Null));
        assert_eq!(event.get("dest_port"), Some(&json!(80)));
        assert_eq!(event.get("app"), Some(&json!("p0f")));
        assert_eq!(event.get("severity"), Some(&json!("info")));
        assert_eq!(event.get("p0f_os"), Some(&json!("Linux")));
    }
}
