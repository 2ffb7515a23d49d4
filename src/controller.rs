use bon::Builder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::InteractionError;
use crate::handlers::{HandshakeHandler, HandshakeReport};
use crate::hw::{ChannelMap, DeviceSession, InboundNotification, NotificationStopReason, resolve_channels};
use crate::protocol::EndpointId;
use crate::reading::{FrameDecoder, Reading};
use crate::reassembly::BulkReassembler;
use crate::utils::HexBytes;
use crate::watchdog::{
    CommandPolicy, DemoCadence, LivenessClock, NoCommands, Watchdog, WatchdogConfig,
    WatchdogSummary,
};

/// Capacity of the queue between the notification pump and the live loop.
pub const NOTIFICATION_QUEUE_DEPTH: usize = 64;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum SessionPhase {
    #[display("discovering")]
    Discovering,
    #[display("initializing")]
    Initializing,
    #[display("live")]
    Live,
}

/// Receives every decoded reading, in arrival order.
pub trait ReadingObserver: Send {
    fn on_reading(&mut self, reading: &Reading);
}

impl ReadingObserver for Vec<Reading> {
    fn on_reading(&mut self, reading: &Reading) {
        self.push(reading.clone());
    }
}

/// Channels found during discovery and which of them accepted a subscription.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DiscoveryReport {
    channels: ChannelMap,
    subscribed: Vec<String>,
    failed: Vec<String>,
}

impl DiscoveryReport {
    #[must_use]
    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// Channels delivering notifications.
    #[must_use]
    pub fn subscribed(&self) -> &[String] {
        &self.subscribed
    }

    /// Channels whose subscription was refused; they deliver nothing.
    #[must_use]
    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}

/// Why the live loop ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum LiveStopReason {
    #[display("reached max readings ({_0})")]
    ReachedLimit(u64),
    #[display("interrupted by user")]
    Interrupted,
    #[display("notification stream closed")]
    StreamClosed,
    #[display("cancelled")]
    Cancelled,
}

/// Counts for one live loop run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LiveSummary {
    notifications: u64,
    readings: u64,
    anomalies: u64,
    stop_reason: LiveStopReason,
}

impl LiveSummary {
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    /// Readings delivered to the observer.
    #[must_use]
    pub fn readings(&self) -> u64 {
        self.readings
    }

    /// Frames that could not be decoded.
    #[must_use]
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    #[must_use]
    pub fn stop_reason(&self) -> LiveStopReason {
        self.stop_reason
    }
}

/// Drives one inverter session from discovery to live decoding.
///
/// The controller is the only owner of the bulk reassembly buffer. The
/// liveness clock is the one piece of state it shares with the watchdog.
#[derive(Debug)]
pub struct SessionController<'a> {
    session: &'a DeviceSession,
    clock: &'a LivenessClock,
    phase: SessionPhase,
    discovery: DiscoveryReport,
    reassembler: BulkReassembler,
    notifications: u64,
    readings: u64,
    anomalies: u64,
}

impl<'a> SessionController<'a> {
    /// A controller that has not looked at the GATT table yet.
    #[must_use]
    pub fn new(session: &'a DeviceSession, clock: &'a LivenessClock) -> Self {
        Self {
            session,
            clock,
            phase: SessionPhase::Discovering,
            discovery: DiscoveryReport::default(),
            reassembler: BulkReassembler::new(),
            notifications: 0,
            readings: 0,
            anomalies: 0,
        }
    }

    /// [`Self::new`] followed by [`Self::discover_channels`].
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::MissingRequiredEndpoints`] when the device
    /// lacks the control, secondary or bulk channel.
    pub async fn discover(
        session: &'a DeviceSession,
        clock: &'a LivenessClock,
    ) -> Result<Self, InteractionError> {
        let mut controller = Self::new(session, clock);
        controller.discover_channels().await?;
        Ok(controller)
    }

    /// Resolves the Phoenix channels and enables notifications on every
    /// channel of their group, then moves to [`SessionPhase::Initializing`].
    /// Subscription failures are logged and skipped.
    ///
    /// A controller that fails here stays in [`SessionPhase::Discovering`].
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::MissingRequiredEndpoints`] when the device
    /// lacks the control, secondary or bulk channel.
    #[instrument(skip_all, level = "info", fields(device_id = self.session.device().device_id()))]
    pub async fn discover_channels(&mut self) -> Result<&DiscoveryReport, InteractionError> {
        let channels = resolve_channels(self.session.services())?;

        let mut subscribed = Vec::new();
        let mut failed = Vec::new();
        for uuid in channels.group_channels() {
            match self.session.subscribe_uuid(uuid).await {
                Ok(()) => {
                    debug!(%uuid, "notifications enabled");
                    subscribed.push(uuid.clone());
                }
                Err(error) => {
                    warn!(%uuid, error = %error, "could not enable notifications; channel excluded");
                    failed.push(uuid.clone());
                }
            }
        }
        info!(
            subscribed = subscribed.len(),
            failed = failed.len(),
            "channels discovered"
        );

        self.discovery = DiscoveryReport {
            channels,
            subscribed,
            failed,
        };
        self.phase = SessionPhase::Initializing;
        Ok(&self.discovery)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn discovery(&self) -> &DiscoveryReport {
        &self.discovery
    }

    /// Sends the handshake and enters the live phase without waiting for replies.
    pub async fn initialize(&mut self) -> HandshakeReport {
        let report = HandshakeHandler::run(self.session).await;
        self.phase = SessionPhase::Live;
        report
    }

    /// Routes one notification by channel and publishes any decoded readings.
    ///
    /// Returns how many readings reached the observer.
    pub fn handle_notification(
        &mut self,
        notification: &InboundNotification,
        observer: &mut dyn ReadingObserver,
    ) -> usize {
        self.route(notification, observer, usize::MAX)
    }

    /// Like [`Self::handle_notification`], but publishes at most `budget`
    /// readings. Frames past the budget are discarded.
    fn route(
        &mut self,
        notification: &InboundNotification,
        observer: &mut dyn ReadingObserver,
        budget: usize,
    ) -> usize {
        let uuid = notification.uuid();
        let payload = notification.payload();
        trace!(%uuid, payload = %HexBytes(payload), "inbound notification");
        self.notifications += 1;

        let frames: Vec<Vec<u8>> = match self.discovery.channels.endpoint_for_notification(uuid) {
            Some(EndpointId::Bulk) => self
                .reassembler
                .feed(payload)
                .into_iter()
                .map(Vec::from)
                .collect(),
            Some(EndpointId::Secondary) => return 0,
            _ => vec![payload.to_vec()],
        };

        let mut published = 0;
        for (index, frame) in frames.iter().enumerate() {
            if published >= budget {
                debug!(discarded = frames.len() - index, "reading limit reached mid-notification");
                break;
            }
            if self.publish(frame, observer) {
                published += 1;
            }
        }
        published
    }

    fn publish(&mut self, frame: &[u8], observer: &mut dyn ReadingObserver) -> bool {
        match FrameDecoder::decode(frame) {
            Ok(reading) => {
                if matches!(reading, Reading::Unrecognized { .. }) {
                    debug!(frame = %HexBytes(frame), "unrecognized reading");
                }
                self.clock.touch();
                self.readings += 1;
                observer.on_reading(&reading);
                true
            }
            Err(error) => {
                self.anomalies += 1;
                warn!(frame = %HexBytes(frame), error = %error, "dropping undecodable frame");
                false
            }
        }
    }

    /// Consumes notifications until cancelled, interrupted, the queue closes,
    /// or `max_readings` readings have been published.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting for Ctrl+C fails.
    #[instrument(skip_all, level = "info", fields(?max_readings))]
    pub async fn run_live(
        &mut self,
        notifications: &mut mpsc::Receiver<InboundNotification>,
        observer: &mut dyn ReadingObserver,
        max_readings: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<LiveSummary, InteractionError> {
        let start_notifications = self.notifications;
        let start_readings = self.readings;
        let start_anomalies = self.anomalies;

        let stop_reason = loop {
            let remaining = match max_readings {
                Some(limit) => {
                    let published = self.readings - start_readings;
                    if published >= limit {
                        break LiveStopReason::ReachedLimit(limit);
                    }
                    usize::try_from(limit - published).unwrap_or(usize::MAX)
                }
                None => usize::MAX,
            };
            tokio::select! {
                () = cancel.cancelled() => break LiveStopReason::Cancelled,
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|source| InteractionError::CtrlC { source })?;
                    break LiveStopReason::Interrupted;
                }
                maybe_notification = notifications.recv() => {
                    let Some(notification) = maybe_notification else {
                        break LiveStopReason::StreamClosed;
                    };
                    self.route(&notification, observer, remaining);
                }
            }
        };

        Ok(LiveSummary {
            notifications: self.notifications - start_notifications,
            readings: self.readings - start_readings,
            anomalies: self.anomalies - start_anomalies,
            stop_reason,
        })
    }
}

/// Settings for a full monitoring session.
#[derive(Debug, Clone, Copy, Builder)]
pub struct SessionOptions {
    #[builder(default)]
    watchdog: WatchdogConfig,
    max_readings: Option<u64>,
    #[builder(default = true)]
    demo_cadence: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionOptions {
    #[must_use]
    pub fn watchdog(&self) -> WatchdogConfig {
        self.watchdog
    }

    #[must_use]
    pub fn max_readings(&self) -> Option<u64> {
        self.max_readings
    }

    /// Whether the watchdog cycles the power mode.
    #[must_use]
    pub fn demo_cadence(&self) -> bool {
        self.demo_cadence
    }

    fn policy(&self) -> Box<dyn CommandPolicy> {
        if self.demo_cadence {
            Box::new(DemoCadence)
        } else {
            Box::new(NoCommands)
        }
    }
}

/// Everything that happened during [`run_session`].
#[derive(Debug, Clone)]
pub struct SessionSummary {
    discovery: DiscoveryReport,
    handshake: HandshakeReport,
    live: LiveSummary,
    watchdog: WatchdogSummary,
    notification_stop: NotificationStopReason,
}

impl SessionSummary {
    #[must_use]
    pub fn discovery(&self) -> &DiscoveryReport {
        &self.discovery
    }

    #[must_use]
    pub fn handshake(&self) -> &HandshakeReport {
        &self.handshake
    }

    #[must_use]
    pub fn live(&self) -> &LiveSummary {
        &self.live
    }

    #[must_use]
    pub fn watchdog(&self) -> &WatchdogSummary {
        &self.watchdog
    }

    /// Why the transport stopped delivering notifications.
    #[must_use]
    pub fn notification_stop(&self) -> NotificationStopReason {
        self.notification_stop
    }
}

/// Runs discovery, the handshake, then the live loop alongside the watchdog.
///
/// The notification pump starts before the handshake so early replies are
/// queued rather than lost. Everything stops together once the live loop ends.
///
/// # Errors
///
/// Returns an error when discovery fails, the notification stream cannot be
/// opened, or waiting for Ctrl+C fails.
#[instrument(skip_all, level = "info")]
pub async fn run_session(
    session: &DeviceSession,
    options: &SessionOptions,
    observer: &mut dyn ReadingObserver,
) -> Result<SessionSummary, InteractionError> {
    let clock = LivenessClock::new(options.watchdog.startup_grace());
    let mut controller = SessionController::new(session, &clock);
    controller.discover_channels().await?;
    let (sender, mut receiver) = mpsc::channel(NOTIFICATION_QUEUE_DEPTH);
    let cancel = CancellationToken::new();
    let watchdog = Watchdog::new(options.watchdog, &clock, options.policy());

    let pump = session.forward_notifications(sender, cancel.clone());
    let drive = async {
        let handshake = controller.initialize().await;
        let live = async {
            let live = controller
                .run_live(&mut receiver, observer, options.max_readings, &cancel)
                .await;
            cancel.cancel();
            live
        };
        let (live, watchdog_summary) = tokio::join!(live, watchdog.run(session, cancel.clone()));
        (handshake, live, watchdog_summary)
    };

    let (notification_stop, (handshake, live, watchdog_summary)) = tokio::join!(pump, drive);
    let live = live?;
    let notification_stop = notification_stop?;
    info!(
        readings = live.readings(),
        stop_reason = %live.stop_reason(),
        "session finished"
    );

    Ok(SessionSummary {
        discovery: controller.discovery,
        handshake,
        live,
        watchdog: watchdog_summary,
        notification_stop,
    })
}
