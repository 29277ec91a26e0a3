//! Relay pipeline behavior with in-memory sources and publisher.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use broker_link::{Publish, RawMessage};
use bytes::Bytes;
use event_normalizer::EventNormalizer;
use geo_enrich::{GeoEnricher, LookupError, OrgSource, PlaceSource, RawPlace, RawText};
use mhn_collector::{OutgoingEvent, RelayOutcome, RelayPipeline, RelaySettings};
use serde_json::Value;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const OUT_CHANNEL: &str = "mhn-community-v2.events";
const UUID: &str = "8d9e3c5a-1f2b-4c6d-9e8f-0a1b2c3d4e5f";

#[derive(Default, Clone)]
struct Recorder(Arc<Mutex<Vec<(String, Bytes)>>>);

impl Publish for Recorder {
    fn publish(&self, channel: &str, payload: Bytes) {
        self.0.lock().unwrap().push((channel.to_string(), payload));
    }
}

impl Recorder {
    fn documents(&self) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, payload)| {
                assert_eq!(channel, OUT_CHANNEL);
                serde_json::from_slice(payload).unwrap()
            })
            .collect()
    }
}

/// Knows 1.2.3.4 (São Paulo) and nothing else
struct KnownAttacker;

impl PlaceSource for KnownAttacker {
    fn place(&self, ip: IpAddr) -> Result<Option<RawPlace>, LookupError> {
        if ip != IpAddr::from([1, 2, 3, 4]) {
            return Ok(None);
        }
        Ok(Some(RawPlace {
            city: Some(RawText::from_bytes(b"S\xe3o Paulo".to_vec())),
            region_name: Some("São Paulo".into()),
            region: Some("SP".into()),
            time_zone: Some("America/Sao_Paulo".into()),
            latitude: Some(-23.547_500_000_000_001),
            longitude: Some(-46.636_110_000_000_003),
            country_code: Some("BR".into()),
            country_code3: Some("BRA".into()),
            country_name: Some("Brazil".into()),
            ..Default::default()
        }))
    }
}

impl OrgSource for KnownAttacker {
    fn org(&self, ip: IpAddr) -> Result<Option<RawText>, LookupError> {
        if ip == IpAddr::from([1, 2, 3, 4]) {
            Ok(Some("AS64500 Exemplo Telecomunicações".into()))
        } else {
            Ok(None)
        }
    }
}

fn pipeline(publisher: Recorder) -> RelayPipeline<Recorder> {
    RelayPipeline::new(
        EventNormalizer::with_default_decoders(),
        GeoEnricher::new(KnownAttacker, KnownAttacker),
        publisher,
        RelaySettings {
            channel: OUT_CHANNEL.to_string(),
            mhn_uuid: UUID.to_string(),
            mhn_ip: Some("203.0.113.7".to_string()),
        },
    )
}

fn message(identifier: &str, channel: &str, payload: &[u8]) -> RawMessage {
    RawMessage {
        identifier: identifier.to_string(),
        channel: channel.to_string(),
        payload: Bytes::copy_from_slice(payload),
    }
}

const CAPTURE: &[u8] = br#"{"saddr": "1.2.3.4", "sport": "4455", "daddr": "10.0.0.5", "dport": "445", "md5": "abc"}"#;

#[test]
fn test_dionaea_capture_is_enriched_and_scrubbed() {
    let recorder = Recorder::default();
    let pipeline = pipeline(recorder.clone());

    let outcome = pipeline.process(&message("sensorA", "dionaea.capture", CAPTURE));
    assert_eq!(outcome, RelayOutcome { published: 1, dropped: 0 });

    let documents = recorder.documents();
    let document = &documents[0];

    assert_eq!(document["src_ip"], "1.2.3.4");
    assert_eq!(document["sensor"], "sensorA");
    assert_eq!(document["type"], "dionaea.capture");
    assert_eq!(document["src_geo"]["country_code"], "BR");
    assert_eq!(document["src_geo"]["city"], "São Paulo");
    assert_eq!(document["src_geo"]["org"], "AS64500 Exemplo Telecomunicações");
    assert!(document["dest_geo"]["country_code"].is_null());
    assert_eq!(document["mhn_uuid"], UUID);
    assert_eq!(document["mhn_ip"], "203.0.113.7");
    assert!(document.get("dest_ip").is_none());
}

#[test]
fn test_failing_message_does_not_affect_neighbours() {
    let recorder = Recorder::default();
    let pipeline = pipeline(recorder.clone());

    let messages = [
        message("sensorA", "amun.events", br#"{"attackerIP": "1.2.3.4", "attackerPort": 1}"#),
        message("sensorB", "dionaea.capture", b"{truncated"),
        message("sensorC", "amun.events", br#"{"attackerIP": "5.6.7.8", "attackerPort": 3}"#),
    ];
    for m in &messages {
        pipeline.process(m);
    }

    let documents = recorder.documents();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["sensor"], "sensorA");
    assert_eq!(documents[1]["sensor"], "sensorC");
    assert_eq!(pipeline.stats().dropped, 1);
}

#[test]
fn test_dest_ip_never_published() {
    let recorder = Recorder::default();
    let pipeline = pipeline(recorder.clone());

    let samples: [(&str, &[u8]); 4] = [
        ("dionaea.capture", CAPTURE),
        ("kippo.sessions", br#"{"peerIP": "1.2.3.4", "hostIP": "10.0.0.5", "urls": ["http://x/y"]}"#),
        ("snort.alerts", br#"{"source_ip": "1.2.3.4", "destination_ip": "10.0.0.5"}"#),
        ("p0f.events", br#"{"client_ip": "1.2.3.4", "server_ip": "10.0.0.5"}"#),
    ];
    for (channel, payload) in samples {
        pipeline.process(&message("sensorA", channel, payload));
    }

    let documents = recorder.documents();
    assert_eq!(documents.len(), 5);
    for document in documents {
        assert!(document.get("dest_ip").is_none(), "{document}");
        assert!(document["dest_geo"].is_object());
    }
}

#[test]
fn test_outgoing_json_round_trip_is_exact() {
    let recorder = Recorder::default();
    let pipeline = pipeline(recorder.clone());
    pipeline.process(&message("sensorA", "dionaea.capture", CAPTURE));

    let payload = recorder.0.lock().unwrap()[0].1.clone();
    let decoded: OutgoingEvent = serde_json::from_slice(&payload).unwrap();

    assert_eq!(decoded.src_geo.city.as_deref(), Some("São Paulo"));
    assert_eq!(decoded.src_geo.latitude, Some(-23.547_500_000_000_001));
    assert_eq!(decoded.src_geo.longitude, Some(-46.636_110_000_000_003));
    assert_eq!(decoded.mhn_uuid, UUID);

    let reencoded = serde_json::to_vec(&decoded).unwrap();
    let again: OutgoingEvent = serde_json::from_slice(&reencoded).unwrap();
    assert_eq!(again, decoded);
    assert_eq!(
        serde_json::from_slice::<Value>(&reencoded).unwrap(),
        serde_json::from_slice::<Value>(&payload).unwrap()
    );
}

/// Counts events at WARN or above
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() <= Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_warnings(f: impl FnOnce()) -> usize {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
    tracing::subscriber::with_default(subscriber, f);
    count.load(Ordering::SeqCst)
}

#[test]
fn test_unregistered_channel_is_silent() {
    let recorder = Recorder::default();
    let pipeline = pipeline(recorder.clone());

    let warnings = count_warnings(|| {
        let outcome = pipeline.process(&message("sensorA", "cowrie.sessions", b"{}"));
        assert_eq!(outcome, RelayOutcome::default());
    });

    assert_eq!(warnings, 0);
    assert!(recorder.documents().is_empty());
}

#[test]
fn test_decode_failure_is_logged() {
    let pipeline = pipeline(Recorder::default());

    let warnings = count_warnings(|| {
        pipeline.process(&message("sensorB", "dionaea.capture", b"{truncated"));
    });

    assert_eq!(warnings, 1);
}
