//! Startup and the main run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use broker_link::{BrokerLink, Close, LinkRole, RawMessage};
use event_normalizer::EventNormalizer;
use geo_enrich::GeoEnricher;
use tokio::sync::mpsc;

use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::pipeline::{RelayPipeline, RelaySettings, RelayStats};
use crate::provision::{AuthRecord, CredentialProvisioner, JsonFileProvisioner};
use crate::public_ip::discover_public_ip;
use crate::shutdown::{interrupt_signal, ShutdownCoordinator, ShutdownReason};

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: ShutdownReason,
    pub stats: RelayStats,
    /// Events dropped because the outbound queue was full
    pub queue_drops: u64,
}

/// Open the geolocation databases and run until interrupted.
pub async fn run(config: &CollectorConfig) -> Result<RunSummary> {
    let interrupt = interrupt_signal();
    let enricher = GeoEnricher::open(&config.ip_geo_db, &config.ip_asn_db)?;
    run_until(config, enricher, interrupt).await
}

/// Run the collector until `interrupt` resolves or a link fails.
///
/// Startup order: decoder registry check, credential provisioning, public IP
/// discovery, inbound connect (with the configured retries), outbound
/// connect, subscription. A failure to connect either link is returned as an
/// error after closing whatever was already open. `interrupt` is watched from
/// the start; resolving during startup closes any open link and ends the run
/// with [`ShutdownReason::Interrupt`].
pub async fn run_until<F>(
    config: &CollectorConfig,
    enricher: GeoEnricher,
    interrupt: F,
) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    let mhn_uuid = config.deployment_id()?.to_string();
    let normalizer = build_normalizer(config)?;

    provision(config);

    let (notify_tx, mut notifications) = mpsc::unbounded_channel();
    let inbound = Arc::new(BrokerLink::new(config.inbound_link(), notify_tx.clone()));
    let outbound = Arc::new(BrokerLink::new(config.outbound_link(), notify_tx));
    let mut coordinator = ShutdownCoordinator::new(vec![
        inbound.clone() as Arc<dyn Close>,
        outbound.clone() as Arc<dyn Close>,
    ]);

    let discovery = discover_public_ip(&config.ip_discovery_url, config.ip_discovery_timeout());
    let Some(mhn_ip) = unless_interrupted(interrupt.as_mut(), discovery).await else {
        return Ok(interrupted_during_startup(&mut coordinator).await);
    };
    let mhn_ip = mhn_ip.map(|ip| ip.to_string());

    let started = unless_interrupted(interrupt.as_mut(), start_links(config, &inbound, &outbound));
    let mut messages = match started.await {
        Some(Ok(messages)) => messages,
        Some(Err(e)) => {
            coordinator
                .shutdown(ShutdownReason::StartupFailure(e.to_string()))
                .await;
            return Err(e);
        }
        None => return Ok(interrupted_during_startup(&mut coordinator).await),
    };

    let pipeline = RelayPipeline::new(
        normalizer,
        enricher,
        outbound.clone(),
        RelaySettings {
            channel: config.rchannel.clone(),
            mhn_uuid,
            mhn_ip,
        },
    );

    tracing::info!(
        inbound = %config.inbound_link().endpoint(),
        outbound = %config.outbound_link().endpoint(),
        rchannel = %config.rchannel,
        channels = config.channels.len(),
        "Collector running"
    );

    let reason = coordinator
        .run(&mut messages, &mut notifications, interrupt.as_mut(), |message| {
            pipeline.process(&message);
        })
        .await;

    let summary = RunSummary {
        reason,
        stats: pipeline.stats(),
        queue_drops: outbound.dropped_count(),
    };
    tracing::info!(
        reason = %summary.reason,
        messages = summary.stats.messages,
        published = summary.stats.published,
        dropped = summary.stats.dropped,
        queue_drops = summary.queue_drops,
        "Collector stopped"
    );
    Ok(summary)
}

/// Drive one startup step unless `interrupt` resolves first.
async fn unless_interrupted<I, T>(interrupt: Pin<&mut I>, step: impl Future<Output = T>) -> Option<T>
where
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;

        _ = interrupt => None,
        value = step => Some(value),
    }
}

async fn interrupted_during_startup(coordinator: &mut ShutdownCoordinator) -> RunSummary {
    tracing::info!("Interrupted during startup");
    coordinator.shutdown(ShutdownReason::Interrupt).await;
    RunSummary {
        reason: ShutdownReason::Interrupt,
        stats: RelayStats::default(),
        queue_drops: 0,
    }
}

fn build_normalizer(config: &CollectorConfig) -> Result<EventNormalizer> {
    let mut normalizer = EventNormalizer::with_default_decoders();
    for channel in &config.ignore_channels {
        normalizer.ignore(channel.as_str());
    }
    normalizer.validate(&config.channels)?;
    Ok(normalizer)
}

/// Provisioning failures are logged, never fatal.
fn provision(config: &CollectorConfig) {
    let Some(path) = &config.auth_keys_file else {
        tracing::warn!("AUTH_KEYS_FILE not set, skipping credential provisioning");
        return;
    };

    let record = AuthRecord::subscriber(&config.ident, &config.secret, &config.channels);
    if let Err(e) = JsonFileProvisioner::new(path).ensure(&record) {
        tracing::error!(error = %e, "Credential provisioning failed, continuing");
    }
}

async fn start_links(
    config: &CollectorConfig,
    inbound: &BrokerLink,
    outbound: &BrokerLink,
) -> Result<mpsc::Receiver<RawMessage>> {
    let messages = connect_inbound(config, inbound).await?;

    outbound
        .connect()
        .await
        .map_err(|source| CollectorError::Connect {
            role: LinkRole::Outbound,
            source,
        })?;

    inbound
        .subscribe(&config.channels)
        .await
        .map_err(CollectorError::Subscribe)?;

    Ok(messages)
}

async fn connect_inbound(
    config: &CollectorConfig,
    link: &BrokerLink,
) -> Result<mpsc::Receiver<RawMessage>> {
    let mut attempt = 0;
    loop {
        match link.connect().await {
            Ok(messages) => return Ok(messages),
            Err(source) if attempt < config.connect_retries && source.is_connection_failure() => {
                attempt += 1;
                tracing::warn!(
                    error = %source,
                    attempt,
                    retries = config.connect_retries,
                    "Inbound connect failed, retrying"
                );
                tokio::time::sleep(config.connect_retry_delay()).await;
            }
            Err(source) => {
                return Err(CollectorError::Connect {
                    role: LinkRole::Inbound,
                    source,
                })
            }
        }
    }
}
