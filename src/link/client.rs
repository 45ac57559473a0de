// src/link/client.rs
//! Self-healing GGA client
//!
//! A single background task owns the connection. It connects, reads lines
//! under a per-line timeout, decodes GGA sentences and publishes
//! [`LinkEvent`]s to every subscriber. Failures never escape the task:
//!
//! - connect error: wait `retry_interval`, try again
//! - read timeout or peer close: reconnect right away
//! - read error: treated like a connect error
//! - [`GgaClient::dispose`]: leave for good

use super::transport::{Connector, LineSource, TcpConnector};
use crate::gps::{nmea, Fix};
use std::{
    fmt, io,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch},
    time::{sleep, timeout},
};
use tracing::{debug, info, trace, warn};

/// How long a connected receiver may stay silent before the link is dropped
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2000);
/// Pause between failed connection attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

const RUNNING: u8 = 0;
const DISPOSED: u8 = 1;

/// Timing knobs for the connection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub read_timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Receiver address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What subscribers receive, in stream order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Fix(Fix),
}

/// Connectivity flag and subscriber list.
///
/// Kept under one lock so a transition and the events around it reach every
/// subscriber in the same order.
#[derive(Default)]
struct EventHub {
    connected: bool,
    subscribers: Vec<mpsc::UnboundedSender<LinkEvent>>,
}

impl EventHub {
    fn publish(&mut self, event: LinkEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Fires `Connected`/`Disconnected` only when the flag actually flips
    fn set_connected(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        self.publish(if connected {
            LinkEvent::Connected
        } else {
            LinkEvent::Disconnected
        });
    }
}

/// State shared between the handle and the background task
struct Shared {
    lifecycle: AtomicU8,
    hub: Mutex<EventHub>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == RUNNING
    }

    fn hub(&self) -> MutexGuard<'_, EventHub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_connected(&self, connected: bool) {
        let mut hub = self.hub();
        // after dispose only the final `Disconnected` may go out
        if connected && !self.is_running() {
            return;
        }
        hub.set_connected(connected);
    }

    fn publish_fix(&self, fix: Fix) {
        let mut hub = self.hub();
        if self.is_running() {
            hub.publish(LinkEvent::Fix(fix));
        }
    }

    /// Running -> Disposed. Returns false if someone got there first.
    fn dispose(&self) -> bool {
        if self
            .lifecycle
            .compare_exchange(RUNNING, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        {
            let mut hub = self.hub();
            hub.set_connected(false);
            // closes every subscriber's stream once drained
            hub.subscribers.clear();
        }
        self.shutdown.send_replace(true);
        true
    }
}

/// Handle to a GGA link.
///
/// Create it, [`subscribe`](Self::subscribe), then [`start`](Self::start).
/// Subscribing before starting guarantees the first `Connected` is seen.
/// Dropping the handle disposes the link.
pub struct GgaClient {
    shared: Arc<Shared>,
    endpoint: Endpoint,
    settings: LinkSettings,
    connector: Option<Box<dyn Connector>>,
}

impl GgaClient {
    /// TCP client with the default timings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_connector(TcpConnector, Endpoint::new(host, port), LinkSettings::default())
    }

    pub fn with_connector(
        connector: impl Connector + 'static,
        endpoint: Endpoint,
        settings: LinkSettings,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                lifecycle: AtomicU8::new(RUNNING),
                hub: Mutex::new(EventHub::default()),
                shutdown,
            }),
            endpoint,
            settings,
            connector: Some(Box::new(connector)),
        }
    }

    /// Register a subscriber. The channel closes after dispose.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut hub = self.shared.hub();
        if self.shared.is_running() {
            hub.subscribers.push(tx);
        }
        rx
    }

    /// Spawn the connection loop on the current tokio runtime.
    ///
    /// Returns immediately. Starting twice, or after dispose, does nothing;
    /// a disposed link cannot be restarted, build a new client instead.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&mut self) {
        if !self.shared.is_running() {
            debug!(endpoint = %self.endpoint, "start ignored, link disposed");
            return;
        }
        let Some(connector) = self.connector.take() else {
            debug!(endpoint = %self.endpoint, "start ignored, link already running");
            return;
        };

        let shutdown = self.shared.shutdown.subscribe();
        tokio::spawn(run_link(
            connector,
            self.endpoint.clone(),
            self.settings,
            Arc::clone(&self.shared),
            shutdown,
        ));
    }

    /// Stop the loop and close the connection. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.shared.dispose() {
            info!(endpoint = %self.endpoint, "GGA link disposed");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.hub().connected
    }

    /// False once disposed
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn settings(&self) -> LinkSettings {
        self.settings
    }
}

impl Drop for GgaClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// How one connection attempt ended
#[derive(Debug)]
enum SessionEnd {
    /// No line within the read timeout
    Stalled,
    /// Peer closed the stream
    Closed,
    ConnectFailed(io::Error),
    ReadFailed(io::Error),
}

async fn run_link(
    connector: Box<dyn Connector>,
    endpoint: Endpoint,
    settings: LinkSettings,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(%endpoint, "GGA link started");
    let mut failures: u32 = 0;

    while shared.is_running() {
        let end = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            end = run_session(connector.as_ref(), &endpoint, &settings, &shared) => end,
        };

        // the session's socket is gone by now
        shared.set_connected(false);

        match end {
            SessionEnd::Stalled => {
                failures = 0;
                let silent_ms = settings.read_timeout.as_millis() as u64;
                info!(%endpoint, silent_ms, "receiver went silent, reconnecting");
                continue;
            }
            SessionEnd::Closed => {
                failures = 0;
                info!(%endpoint, "receiver closed the connection, reconnecting");
                continue;
            }
            SessionEnd::ConnectFailed(e) => {
                failures += 1;
                if failures == 1 {
                    warn!(%endpoint, error = %e, "connection failed, retrying");
                } else {
                    debug!(%endpoint, error = %e, attempt = failures, "connection failed, retrying");
                }
            }
            SessionEnd::ReadFailed(e) => {
                failures = 1;
                warn!(%endpoint, error = %e, "read failed, reconnecting");
            }
        }

        tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            _ = sleep(settings.retry_interval) => {}
        }
    }

    debug!(%endpoint, "GGA link stopped");
}

/// One connect plus read loop. Only returns on failure.
async fn run_session(
    connector: &dyn Connector,
    endpoint: &Endpoint,
    settings: &LinkSettings,
    shared: &Shared,
) -> SessionEnd {
    debug!(%endpoint, "connecting");
    let mut lines: Box<dyn LineSource> =
        match connector.connect(&endpoint.host, endpoint.port).await {
            Ok(lines) => lines,
            Err(e) => return SessionEnd::ConnectFailed(e),
        };

    shared.set_connected(true);
    info!(%endpoint, "connected to receiver");

    loop {
        let line = match timeout(settings.read_timeout, lines.read_line()).await {
            Err(_) => return SessionEnd::Stalled,
            Ok(Err(e)) => return SessionEnd::ReadFailed(e),
            Ok(Ok(None)) => return SessionEnd::Closed,
            Ok(Ok(Some(line))) => line,
        };

        // terminators are already gone; anything else is part of the sentence
        let line = line.as_str();
        if line.is_empty() {
            continue;
        }
        trace!(line, "sentence received");

        match nmea::parse_gga(line) {
            Ok(fix) => shared.publish_fix(fix),
            // other talkers and line noise are expected
            Err(e) => debug!(error = %e, line, "sentence discarded"),
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // an error means the handle is gone, which also means stop
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    const GNGGA: &str =
        "$GNGGA,033632.40,5458.46129,N,08255.44558,E,1,04,4.21,103.1,M,-38.0,M,,*61";
    const NO_FIX: &str = "$GPGGA,123519,,,,,0,00,99.99,,M,,M,,*45";
    const GPGGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    enum Step {
        Refuse,
        /// Serve the lines, then go silent
        Serve(Vec<&'static str>),
        /// Serve the lines, then hang up
        ServeThenClose(Vec<&'static str>),
        /// Serve the lines, then fail the read
        ServeThenFail(Vec<&'static str>),
        /// Never complete the connect
        Hang,
    }

    /// Plays back one step per connection attempt; once the script runs out
    /// every connection succeeds and stays silent.
    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        attempts: Arc<Mutex<Vec<Instant>>>,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> (Self, Arc<Mutex<Vec<Instant>>>) {
            let attempts = Arc::new(Mutex::new(Vec::new()));
            let scripted = Self {
                steps: Mutex::new(steps.into()),
                attempts: Arc::clone(&attempts),
            };
            (scripted, attempts)
        }
    }

    enum Tail {
        Silent,
        Close,
        Fail,
    }

    struct Replay {
        lines: VecDeque<String>,
        tail: Tail,
    }

    impl Replay {
        fn boxed(lines: Vec<&'static str>, tail: Tail) -> Box<dyn LineSource> {
            Box::new(Self {
                lines: lines.into_iter().map(String::from).collect(),
                tail,
            })
        }
    }

    #[async_trait]
    impl Connector for Scripted {
        async fn connect(&self, _host: &str, _port: u16) -> io::Result<Box<dyn LineSource>> {
            self.attempts.lock().unwrap().push(Instant::now());
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Refuse) => Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
                Some(Step::Serve(lines)) => Ok(Replay::boxed(lines, Tail::Silent)),
                Some(Step::ServeThenClose(lines)) => Ok(Replay::boxed(lines, Tail::Close)),
                Some(Step::ServeThenFail(lines)) => Ok(Replay::boxed(lines, Tail::Fail)),
                Some(Step::Hang) => std::future::pending().await,
                None => Ok(Replay::boxed(Vec::new(), Tail::Silent)),
            }
        }
    }

    #[async_trait]
    impl LineSource for Replay {
        async fn read_line(&mut self) -> io::Result<Option<String>> {
            if let Some(line) = self.lines.pop_front() {
                return Ok(Some(line));
            }
            match self.tail {
                Tail::Silent => std::future::pending::<io::Result<Option<String>>>().await,
                Tail::Close => Ok(None),
                Tail::Fail => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            }
        }
    }

    fn scripted_client(steps: Vec<Step>) -> (GgaClient, Arc<Mutex<Vec<Instant>>>) {
        let (connector, attempts) = Scripted::new(steps);
        let client = GgaClient::with_connector(
            connector,
            Endpoint::new("receiver", 5555),
            LinkSettings::default(),
        );
        (client, attempts)
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<LinkEvent>) -> LinkEvent {
        timeout(Duration::from_secs(60), events.recv())
            .await
            .expect("no event in time")
            .expect("event stream closed")
    }

    fn gap(attempts: &Arc<Mutex<Vec<Instant>>>, first: usize) -> Duration {
        let attempts = attempts.lock().unwrap();
        attempts[first + 1] - attempts[first]
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixes_published_in_order() {
        let (mut client, _) =
            scripted_client(vec![Step::Serve(vec![GNGGA, "garbage", "", NO_FIX, GPGGA])]);
        let mut events = client.subscribe();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert!(client.is_connected());

        match next_event(&mut events).await {
            LinkEvent::Fix(fix) => {
                assert!(fix.is_determined);
                assert!((fix.latitude - 54.974355).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(next_event(&mut events).await, LinkEvent::Fix(Fix::undetermined()));
        match next_event(&mut events).await {
            LinkEvent::Fix(fix) => assert!((fix.latitude - 48.1173).abs() < 1e-6),
            other => panic!("unexpected {:?}", other),
        }

        client.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_padded_sentence_is_discarded() {
        let padded =
            " \t$GNGGA,033632.40,5458.46129,N,08255.44558,E,1,04,4.21,103.1,M,-38.0,M,,*61 ";
        let (mut client, _) = scripted_client(vec![Step::Serve(vec![padded, GPGGA])]);
        let mut events = client.subscribe();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        // the first fix comes from the unpadded sentence behind it
        match next_event(&mut events).await {
            LinkEvent::Fix(fix) => assert!((fix.latitude - 48.1173).abs() < 1e-6),
            other => panic!("unexpected {:?}", other),
        }

        client.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reconnects_without_delay() {
        let (mut client, attempts) =
            scripted_client(vec![Step::Serve(vec![]), Step::Serve(vec![GNGGA])]);
        let settings = client.settings();
        let mut events = client.subscribe();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert_eq!(next_event(&mut events).await, LinkEvent::Disconnected);
        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert!(matches!(next_event(&mut events).await, LinkEvent::Fix(_)));

        // only the read timeout elapsed between the two attempts
        let elapsed = gap(&attempts, 0);
        assert!(elapsed >= settings.read_timeout);
        assert!(elapsed < settings.read_timeout + settings.retry_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_waits_retry_interval() {
        let (mut client, attempts) =
            scripted_client(vec![Step::Refuse, Step::Serve(vec![GNGGA])]);
        let settings = client.settings();
        let mut events = client.subscribe();
        client.start();

        // never connected, so no `Disconnected` for the refusal
        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert!(matches!(next_event(&mut events).await, LinkEvent::Fix(_)));

        assert!(gap(&attempts, 0) >= settings.retry_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_reconnects_without_delay() {
        let (mut client, attempts) =
            scripted_client(vec![Step::ServeThenClose(vec![GNGGA]), Step::Serve(vec![GPGGA])]);
        let mut events = client.subscribe();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert!(matches!(next_event(&mut events).await, LinkEvent::Fix(_)));
        assert_eq!(next_event(&mut events).await, LinkEvent::Disconnected);
        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert!(matches!(next_event(&mut events).await, LinkEvent::Fix(_)));

        assert_eq!(gap(&attempts, 0), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_waits_retry_interval() {
        let (mut client, attempts) =
            scripted_client(vec![Step::ServeThenFail(vec![]), Step::Serve(vec![])]);
        let settings = client.settings();
        let mut events = client.subscribe();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert_eq!(next_event(&mut events).await, LinkEvent::Disconnected);
        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);

        assert!(gap(&attempts, 0) >= settings.retry_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_twice_single_disconnect() {
        let (mut client, _) = scripted_client(vec![Step::Serve(vec![GNGGA])]);
        let mut events = client.subscribe();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert!(matches!(next_event(&mut events).await, LinkEvent::Fix(_)));

        client.dispose();
        client.dispose();

        assert!(!client.is_running());
        assert!(!client.is_connected());
        assert_eq!(events.recv().await, Some(LinkEvent::Disconnected));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_during_retry_delay() {
        let (mut client, attempts) = scripted_client(vec![Step::Refuse, Step::Refuse]);
        let mut events = client.subscribe();
        client.start();

        // let the first attempt fail and the loop park in its delay
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(attempts.lock().unwrap().len(), 1);

        client.dispose();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(attempts.lock().unwrap().len(), 1);
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_while_connecting() {
        let (mut client, attempts) = scripted_client(vec![Step::Hang]);
        let mut events = client.subscribe();
        client.start();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(attempts.lock().unwrap().len(), 1);
        assert!(!client.is_connected());

        client.dispose();
        tokio::time::sleep(Duration::from_secs(5)).await;

        // never connected, so the stream just ends
        assert_eq!(attempts.lock().unwrap().len(), 1);
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_dispose_is_ignored() {
        let (mut client, attempts) = scripted_client(vec![Step::Serve(vec![GNGGA])]);
        client.dispose();
        client.start();

        let mut events = client.subscribe();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(attempts.lock().unwrap().is_empty());
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_ignored() {
        let (mut client, attempts) = scripted_client(vec![Step::Serve(vec![GNGGA])]);
        let mut events = client.subscribe();
        client.start();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        assert!(matches!(next_event(&mut events).await, LinkEvent::Fix(_)));
        assert_eq!(attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_subscriber_sees_the_same_stream() {
        let (mut client, _) = scripted_client(vec![Step::Serve(vec![GNGGA, GPGGA])]);
        let mut first = client.subscribe();
        let mut second = client.subscribe();
        client.start();

        for _ in 0..3 {
            assert_eq!(next_event(&mut first).await, next_event(&mut second).await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_disposes() {
        let (mut client, _) = scripted_client(vec![Step::Serve(vec![])]);
        let mut events = client.subscribe();
        client.start();

        assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
        drop(client);

        assert_eq!(events.recv().await, Some(LinkEvent::Disconnected));
        assert_eq!(events.recv().await, None);
    }

    #[test]
    fn test_default_settings() {
        let settings = LinkSettings::default();
        assert_eq!(settings.read_timeout, Duration::from_millis(2000));
        assert_eq!(settings.retry_interval, Duration::from_millis(1000));
        assert_eq!(Endpoint::new("gps.local", 5555).to_string(), "gps.local:5555");
    }
}
