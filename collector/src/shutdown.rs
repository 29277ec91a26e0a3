//! Run loop and coordinated shutdown.
//!
//! The coordinator moves through `Running → ErrorSignaled → ShuttingDown →
//! Stopped` exactly once. Whatever ends the run (an interrupt, a protocol
//! error on either link, the inbound stream ending, a startup failure) both
//! links are closed exactly once before `Stopped` is reached.

use std::future::Future;
use std::sync::Arc;

use broker_link::{Close, ProtocolError, RawMessage};
use tokio::sync::mpsc;

/// Lifecycle of a [`ShutdownCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    ErrorSignaled,
    ShuttingDown,
    Stopped,
}

/// Why the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / SIGTERM
    Interrupt,
    /// A link reported a broken session
    Protocol(ProtocolError),
    /// The inbound link stopped delivering messages
    InboundClosed,
    /// Startup could not complete
    StartupFailure(String),
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupted"),
            ShutdownReason::Protocol(error) => write!(f, "{error}"),
            ShutdownReason::InboundClosed => write!(f, "inbound stream ended"),
            ShutdownReason::StartupFailure(reason) => write!(f, "startup failed: {reason}"),
        }
    }
}

/// Owns the links for the duration of a run and closes them once.
pub struct ShutdownCoordinator {
    links: Vec<Arc<dyn Close>>,
    state: CoordinatorState,
    reason: Option<ShutdownReason>,
}

impl ShutdownCoordinator {
    pub fn new(links: Vec<Arc<dyn Close>>) -> Self {
        Self {
            links,
            state: CoordinatorState::Running,
            reason: None,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// The first signaled reason
    pub fn reason(&self) -> Option<&ShutdownReason> {
        self.reason.as_ref()
    }

    /// Record why the run is ending. Only the first signal counts.
    pub fn signal(&mut self, reason: ShutdownReason) -> bool {
        if self.state != CoordinatorState::Running {
            tracing::debug!(%reason, state = ?self.state, "Shutdown already signaled");
            return false;
        }
        tracing::info!(%reason, "Shutdown signaled");
        self.reason = Some(reason);
        self.state = CoordinatorState::ErrorSignaled;
        true
    }

    /// Signal `reason` if nothing was signaled yet, then close every link.
    ///
    /// Idempotent: later calls return immediately.
    pub async fn shutdown(&mut self, reason: ShutdownReason) {
        self.signal(reason);
        if self.state != CoordinatorState::ErrorSignaled {
            return;
        }

        self.state = CoordinatorState::ShuttingDown;
        for link in &self.links {
            link.close().await;
        }
        self.state = CoordinatorState::Stopped;
        tracing::info!("Links closed");
    }

    /// Feed inbound messages to `handle` until something ends the run, then
    /// shut down.
    ///
    /// `handle` runs to completion for each message; an interrupt or protocol
    /// error is noticed before the next message is taken. Protocol errors win
    /// over queued messages.
    pub async fn run<F, H>(
        &mut self,
        messages: &mut mpsc::Receiver<RawMessage>,
        errors: &mut mpsc::UnboundedReceiver<ProtocolError>,
        interrupt: F,
        mut handle: H,
    ) -> ShutdownReason
    where
        F: Future<Output = ()>,
        H: FnMut(RawMessage),
    {
        tokio::pin!(interrupt);

        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut interrupt => break ShutdownReason::Interrupt,
                Some(error) = errors.recv() => {
                    tracing::error!(role = %error.role, error = %error.kind, "Protocol error");
                    break ShutdownReason::Protocol(error);
                }
                message = messages.recv() => match message {
                    Some(message) => handle(message),
                    None => break ShutdownReason::InboundClosed,
                },
            }
        };

        self.shutdown(reason.clone()).await;
        reason
    }
}

/// Listen for SIGINT and SIGTERM (Ctrl-C elsewhere).
///
/// The handlers are installed when this is called, not when the returned
/// future is first polled, so a signal arriving during startup is not lost.
/// Must be called from within the runtime.
#[cfg(unix)]
pub fn interrupt_signal() -> impl Future<Output = ()> + Send + 'static {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn listen(kind: SignalKind, name: &'static str) -> Option<Signal> {
        signal(kind)
            .map_err(|e| tracing::error!(error = %e, signal = name, "Failed to listen for signal"))
            .ok()
    }

    async fn received(signal: Option<Signal>) {
        match signal {
            Some(mut signal) => {
                signal.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    let interrupt = listen(SignalKind::interrupt(), "SIGINT");
    let terminate = listen(SignalKind::terminate(), "SIGTERM");

    async move {
        tokio::select! {
            _ = received(interrupt) => {}
            _ = received(terminate) => {}
        }
    }
}

#[cfg(not(unix))]
pub fn interrupt_signal() -> impl Future<Output = ()> + Send + 'static {
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    async move {
        if rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use broker_link::{LinkRole, ProtocolErrorKind};
    use bytes::Bytes;

    #[derive(Default)]
    struct CountingLink(AtomicUsize);

    #[async_trait]
    impl Close for CountingLink {
        async fn close(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn links() -> (Arc<CountingLink>, Arc<CountingLink>, ShutdownCoordinator) {
        let inbound = Arc::new(CountingLink::default());
        let outbound = Arc::new(CountingLink::default());
        let coordinator = ShutdownCoordinator::new(vec![inbound.clone(), outbound.clone()]);
        (inbound, outbound, coordinator)
    }

    fn raw(n: u8) -> RawMessage {
        RawMessage {
            identifier: "sensorA".to_string(),
            channel: "amun.events".to_string(),
            payload: Bytes::from(vec![n]),
        }
    }

    #[tokio::test]
    async fn test_states_are_linear_and_close_happens_once() {
        let (inbound, outbound, mut coordinator) = links();
        assert_eq!(coordinator.state(), CoordinatorState::Running);

        assert!(coordinator.signal(ShutdownReason::Interrupt));
        assert_eq!(coordinator.state(), CoordinatorState::ErrorSignaled);
        assert!(!coordinator.signal(ShutdownReason::InboundClosed));

        coordinator.shutdown(ShutdownReason::InboundClosed).await;
        coordinator.shutdown(ShutdownReason::InboundClosed).await;

        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert_eq!(coordinator.reason(), Some(&ShutdownReason::Interrupt));
        assert_eq!(inbound.0.load(Ordering::SeqCst), 1);
        assert_eq!(outbound.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_protocol_error_stops_before_queued_messages() {
        let (inbound, outbound, mut coordinator) = links();
        let (message_tx, mut messages) = mpsc::channel(8);
        let (error_tx, mut errors) = mpsc::unbounded_channel();

        message_tx.send(raw(1)).await.unwrap();
        error_tx
            .send(ProtocolError {
                role: LinkRole::Outbound,
                kind: ProtocolErrorKind::Broker("access denied".to_string()),
            })
            .unwrap();
        message_tx.send(raw(2)).await.unwrap();

        let mut handled = Vec::new();
        let reason = coordinator
            .run(&mut messages, &mut errors, std::future::pending(), |m| {
                handled.push(m.payload[0])
            })
            .await;

        assert!(matches!(reason, ShutdownReason::Protocol(ref e) if e.role == LinkRole::Outbound));
        assert!(handled.is_empty());
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert_eq!(inbound.0.load(Ordering::SeqCst), 1);
        assert_eq!(outbound.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_messages_processed_in_order_until_inbound_closes() {
        let (_inbound, _outbound, mut coordinator) = links();
        let (message_tx, mut messages) = mpsc::channel(8);
        let (_error_tx, mut errors) = mpsc::unbounded_channel();

        for n in 1..=3 {
            message_tx.send(raw(n)).await.unwrap();
        }
        drop(message_tx);

        let mut handled = Vec::new();
        let reason = coordinator
            .run(&mut messages, &mut errors, std::future::pending(), |m| {
                handled.push(m.payload[0])
            })
            .await;

        assert_eq!(reason, ShutdownReason::InboundClosed);
        assert_eq!(handled, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_interrupt() {
        let (inbound, _outbound, mut coordinator) = links();
        let (_message_tx, mut messages) = mpsc::channel::<RawMessage>(8);
        let (_error_tx, mut errors) = mpsc::unbounded_channel();

        let reason = coordinator
            .run(&mut messages, &mut errors, async {}, |_| {})
            .await;

        assert_eq!(reason, ShutdownReason::Interrupt);
        assert_eq!(inbound.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_startup_failure_closes_links() {
        let (inbound, outbound, mut coordinator) = links();

        coordinator
            .shutdown(ShutdownReason::StartupFailure("outbound refused".to_string()))
            .await;

        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert_eq!(inbound.0.load(Ordering::SeqCst), 1);
        assert_eq!(outbound.0.load(Ordering::SeqCst), 1);
    }
}
