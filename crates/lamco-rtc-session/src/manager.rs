//! Session Manager
//!
//! Owns the frame conversion engine and drives one remote video session
//! through the [`ConnectionState`] lifecycle.
//!
//! # Architecture
//!
//! ```text
//!  SessionManager (handle)            session driver task
//!  ───────────────────────            ───────────────────────────────────
//!  start / stop / hints ──command──>  select! {
//!                                       commands
//!  state() <──────watch──────────       transport events (tagged by attempt)
//!                                       inbound signaling
//!                                       keepalive tick + watchdog
//!                                       retry timer, connect deadline
//!                                     }
//!                                         │ Lifecycle::apply -> SideEffects
//!                                         ▼
//!                                  SignalingConnector, MediaTransport,
//!                                  ResourceMonitor, FrameConverter
//! ```
//!
//! The driver is the single owner of the signaling link, the transport and
//! every timer. Frames never pass through it: the transport observer hands
//! them straight to the [`FrameConverter`] while the state is `Connected`.
//!
//! # Cancellation
//!
//! A user stop cancels the keepalive and retry timers, attempts a bye, closes
//! the transport and stops the resource monitor before cached frames are
//! released. Transport callbacks from a closed attempt are ignored; each
//! attempt is tagged with a generation number.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::OptionFuture;
use lamco_rtc_frame::{
    AdaptationMode, ConverterEvent, ConverterStats, DecodedFrame, FrameConverter, PixelFormat, ProcessingMode,
    ResourceMonitor, TransportFrame,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::backoff::Backoff;
use crate::camera::{CameraPosition, CameraProfile};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::signaling::{SignalingConnector, SignalingLink, SignalingMessage};
use crate::state::{ConnectionState, Lifecycle, LifecycleEvent, SideEffect};
use crate::status::{StatusCallback, StatusEvent};
use crate::transport::{MediaHints, MediaTransport, TransportObserver, TransportState};

/// Requests from the handle to the driver
enum Command {
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        user_initiated: bool,
        reply: oneshot::Sender<()>,
    },
    SendBye {
        reply: oneshot::Sender<Result<()>>,
    },
    Renegotiate {
        hints: MediaHints,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Transport callbacks queued to the driver
#[derive(Debug)]
enum TransportEvent {
    State(TransportState),
    Signal(SignalingMessage),
}

/// State shared by the handle, the driver and the transport observer
struct Shared {
    callback: Mutex<Option<StatusCallback>>,
    compatibility: AtomicBool,
    auto_adapt: AtomicBool,
    /// Current attempt; observers of older attempts are ignored
    generation: AtomicU64,
    /// Frames are converted only while connected
    delivering: AtomicBool,
}

impl Shared {
    fn notify(&self, event: StatusEvent) {
        // Clone out so the callback runs without the lock held
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(&event);
        }
    }
}

/// Remote video session
///
/// Created inside a tokio runtime; the lifecycle runs on a spawned driver
/// task. Dropping the manager stops the session in the background, while
/// [`SessionManager::shutdown`] waits for teardown to finish.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use lamco_rtc_session::{
///     ConnectionState, MediaTransport, SessionConfig, SessionManager, SignalingConnector,
/// };
///
/// # async fn example(
/// #     connector: Arc<dyn SignalingConnector>,
/// #     transport: Box<dyn MediaTransport>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let manager = SessionManager::new(SessionConfig::default(), connector, transport)?;
/// manager.start().await?;
/// manager
///     .wait_for_state(ConnectionState::Connected, Duration::from_secs(10))
///     .await?;
///
/// let frame = manager.latest_frame(None)?;
/// println!("{}x{}", frame.dimensions().0, frame.dimensions().1);
///
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    config: SessionConfig,
    converter: FrameConverter,
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    shared: Arc<Shared>,
    driver: JoinHandle<()>,
}

impl SessionManager {
    /// Create a manager and spawn its driver task
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` listing every configuration issue, or
    /// `InvalidState` when called outside a tokio runtime.
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn SignalingConnector>,
        transport: Box<dyn MediaTransport>,
    ) -> Result<Self> {
        if let Err(issues) = config.validate() {
            return Err(SessionError::InvalidConfig(issues.join("; ")));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SessionError::invalid_state("SessionManager requires a tokio runtime"))?;

        info!("Creating SessionManager for {}", config.endpoint);

        let converter = FrameConverter::new(config.converter.clone())?;
        let shared = Arc::new(Shared {
            callback: Mutex::new(None),
            compatibility: AtomicBool::new(config.compatibility_signaling),
            auto_adapt: AtomicBool::new(config.auto_adapt_to_camera),
            generation: AtomicU64::new(0),
            delivering: AtomicBool::new(false),
        });

        let forward = Arc::clone(&shared);
        converter.set_event_callback(Some(Arc::new(move |event: &ConverterEvent| {
            forward.notify(StatusEvent::from(event.clone()));
        })));

        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver {
            lifecycle: Lifecycle::new(Backoff::new(config.backoff.clone(), config.max_reconnect_attempts)),
            hints: current_hints(&converter),
            config: config.clone(),
            converter: converter.clone(),
            connector,
            transport,
            shared: Arc::clone(&shared),
            state_tx,
            commands: command_rx,
            events_tx: event_tx,
            events: event_rx,
            link: None,
            transport_open: false,
            keepalive: None,
            last_inbound: Instant::now(),
            retry_at: None,
            connect_deadline: None,
            monitor: None,
        };
        let driver = runtime.spawn(driver.run());

        Ok(Self {
            config,
            converter,
            commands: command_tx,
            state_rx,
            shared,
            driver,
        })
    }

    /// Begin connecting
    ///
    /// Accepted from `Disconnected` and `Error`; the attempt budget starts
    /// fresh.
    pub async fn start(&self) -> Result<()> {
        self.request(|reply| Command::Start { reply }).await?
    }

    /// Stop the session
    ///
    /// A user-initiated stop sends a best-effort bye, tears everything down
    /// and ends in `Disconnected`; no timer fires after it returns. Any other
    /// stop is handled as a lost connection and reconnects.
    pub async fn stop(&self, user_initiated: bool) -> Result<()> {
        self.request(|reply| Command::Stop { user_initiated, reply }).await
    }

    /// Send a bye on the open signaling channel without changing state
    pub async fn send_bye(&self) -> Result<()> {
        self.request(|reply| Command::SendBye { reply }).await?
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until the state equals `target`
    ///
    /// Returns immediately if it already does.
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> Result<()> {
        let mut rx = self.state_rx.clone();
        tokio::time::timeout(timeout, rx.wait_for(|state| *state == target))
            .await
            .map_err(|_| SessionError::Timeout("connection state"))?
            .map_err(|_| Self::driver_gone())?;
        Ok(())
    }

    /// Latest converted frame, reformatted to `hint` if given
    pub fn latest_frame(&self, hint: Option<PixelFormat>) -> Result<DecodedFrame> {
        Ok(self.converter.latest_frame(hint)?)
    }

    /// Frame pipeline statistics
    pub fn stats(&self) -> ConverterStats {
        self.converter.stats()
    }

    /// Smoothed incoming frame rate
    pub fn estimated_fps(&self) -> f64 {
        self.converter.estimated_fps()
    }

    /// Whether frames have arrived since the last reset
    pub fn is_receiving_frames(&self) -> bool {
        self.converter.is_receiving_frames()
    }

    /// Format of the most recent incoming frame
    pub fn detected_format(&self) -> PixelFormat {
        self.converter.detected_format()
    }

    /// Conversion path taken for the most recent frame
    pub fn processing_mode(&self) -> ProcessingMode {
        self.converter.processing_mode()
    }

    /// Change the output resolution and renegotiate
    pub async fn set_target_resolution(&self, width: u32, height: u32) -> Result<()> {
        self.converter.set_target_resolution(width, height)?;
        self.renegotiate().await
    }

    /// Change the output frame rate and renegotiate
    pub async fn set_target_frame_rate(&self, fps: u32) -> Result<()> {
        self.converter.set_target_frame_rate(fps);
        self.renegotiate().await
    }

    /// Change the adaptation mode and renegotiate
    pub async fn set_adaptation_mode(&self, mode: AdaptationMode) -> Result<()> {
        self.converter.set_adaptation_mode(mode);
        self.renegotiate().await
    }

    /// Current adaptation mode
    pub fn adaptation_mode(&self) -> AdaptationMode {
        self.converter.adaptation_mode()
    }

    /// Match the output to a local camera's native profile
    ///
    /// The conversion engine always adapts; hints are pushed to the
    /// transport only while camera auto-adaptation is enabled.
    pub async fn adapt_to_native_camera(&self, position: CameraPosition) -> Result<()> {
        let profile = CameraProfile::native(position);
        info!(
            "Adapting to {:?} camera: {} {}x{}@{}",
            position, profile.format, profile.resolution.0, profile.resolution.1, profile.fps
        );

        self.converter.adapt_to_native_format(profile.format, profile.resolution)?;
        self.converter.set_target_frame_rate(profile.fps);

        let native = profile.hints();
        let effective = current_hints(&self.converter);
        if effective != native {
            debug!(
                "Camera hints {:?} limited to {:?} by {} mode",
                native,
                effective,
                self.converter.adaptation_mode()
            );
        }

        if self.auto_adapt_to_camera() {
            self.renegotiate().await
        } else {
            debug!("Camera auto-adaptation disabled, hints not pushed");
            Ok(())
        }
    }

    /// Enable or disable pushing camera hints to the transport
    pub fn set_auto_adapt_to_camera(&self, enable: bool) {
        self.shared.auto_adapt.store(enable, Ordering::Relaxed);
    }

    /// Whether camera changes push hints to the transport
    pub fn auto_adapt_to_camera(&self) -> bool {
        self.shared.auto_adapt.load(Ordering::Relaxed)
    }

    /// Toggle compatibility signaling
    ///
    /// Announced to the peer on the next (re)connect.
    pub fn set_compatibility_signaling(&self, enable: bool) {
        info!("Compatibility signaling {}", if enable { "enabled" } else { "disabled" });
        self.shared.compatibility.store(enable, Ordering::Relaxed);
    }

    /// Whether compatibility signaling is announced
    pub fn compatibility_signaling(&self) -> bool {
        self.shared.compatibility.load(Ordering::Relaxed)
    }

    /// Install or remove the status callback
    pub fn set_status_callback(&self, callback: Option<StatusCallback>) {
        *self.shared.callback.lock() = callback;
    }

    /// Forward a free-form status line to the status callback
    pub fn update_connection_status(&self, status: impl Into<String>) {
        let status = status.into();
        debug!("Connection status: {}", status);
        self.shared.notify(StatusEvent::Message(status));
    }

    /// The owned conversion engine
    pub fn converter(&self) -> &FrameConverter {
        &self.converter
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Stop the session and wait for the driver to finish
    pub async fn shutdown(self) {
        let state = self.state();
        if state.is_active() {
            info!("Shutting down SessionManager, closing {} session", state);
        } else {
            info!("Shutting down SessionManager");
        }

        let Self { commands, driver, .. } = self;
        drop(commands);

        if let Err(e) = driver.await {
            warn!("Session driver ended abnormally: {}", e);
        }

        info!("SessionManager shutdown complete");
    }

    async fn renegotiate(&self) -> Result<()> {
        let hints = current_hints(&self.converter);
        self.request(|reply| Command::Renegotiate { hints, reply }).await?
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| Self::driver_gone())?;
        reply_rx.await.map_err(|_| Self::driver_gone())
    }

    fn driver_gone() -> SessionError {
        SessionError::invalid_state("session driver stopped")
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state())
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

fn current_hints(converter: &FrameConverter) -> MediaHints {
    let policy = converter.effective_policy();
    MediaHints::new(policy.resolution.0, policy.resolution.1, policy.fps)
}

/// Observer registered with the transport for one attempt
struct TransportBridge {
    generation: u64,
    shared: Arc<Shared>,
    converter: FrameConverter,
    events: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl TransportBridge {
    fn is_current(&self) -> bool {
        self.shared.generation.load(Ordering::Acquire) == self.generation
    }
}

impl TransportObserver for TransportBridge {
    fn on_state_change(&self, state: TransportState) {
        let _ = self.events.send((self.generation, TransportEvent::State(state)));
    }

    fn on_frame(&self, frame: TransportFrame) {
        if self.is_current() && self.shared.delivering.load(Ordering::Acquire) {
            self.converter.on_frame(frame);
        } else {
            trace!("Frame ignored outside a connected session");
        }
    }

    fn on_signaling_message(&self, message: SignalingMessage) {
        let _ = self.events.send((self.generation, TransportEvent::Signal(message)));
    }
}

/// Session driver; sole owner of the link, the transport and the timers
struct Driver {
    config: SessionConfig,
    converter: FrameConverter,
    connector: Arc<dyn SignalingConnector>,
    transport: Box<dyn MediaTransport>,
    lifecycle: Lifecycle,
    shared: Arc<Shared>,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::Receiver<Command>,
    events_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    events: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
    hints: MediaHints,
    link: Option<SignalingLink>,
    transport_open: bool,
    keepalive: Option<Interval>,
    last_inbound: Instant,
    retry_at: Option<Instant>,
    connect_deadline: Option<Instant>,
    monitor: Option<ResourceMonitor>,
}

impl Driver {
    async fn run(mut self) {
        debug!("Session driver started");

        loop {
            let retry_at = self.retry_at;
            let connect_deadline = self.connect_deadline;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some((generation, event)) = self.events.recv() => {
                    self.handle_transport_event(generation, event).await;
                }
                Some(inbound) = OptionFuture::from(self.link.as_mut().map(|link| link.recv())) => {
                    self.handle_inbound(inbound).await;
                }
                Some(_) = OptionFuture::from(self.keepalive.as_mut().map(|keepalive| keepalive.tick())) => {
                    self.on_keepalive_tick().await;
                }
                Some(()) = OptionFuture::from(retry_at.map(sleep_until)) => {
                    self.retry_at = None;
                    self.dispatch(LifecycleEvent::RetryDue).await;
                }
                Some(()) = OptionFuture::from(connect_deadline.map(sleep_until)) => {
                    self.connect_deadline = None;
                    warn!("Session not connected within {:?}", self.config.connect_timeout);
                    self.dispatch(LifecycleEvent::ConnectionLost {
                        reason: SessionError::Timeout("connect").to_string(),
                    })
                    .await;
                }
            }
        }

        debug!("Command channel closed, tearing session down");
        self.dispatch(LifecycleEvent::StopRequested).await;
        if let Some(monitor) = self.monitor.take() {
            monitor.stop().await;
        }
        debug!("Session driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let state = self.lifecycle.state();
                let result = if state.can_start() {
                    info!("Starting session with {}", self.config.endpoint);
                    self.dispatch(LifecycleEvent::StartRequested).await;
                    Ok(())
                } else {
                    Err(SessionError::invalid_state(format!("cannot start while {state}")))
                };
                let _ = reply.send(result);
            }
            Command::Stop { user_initiated, reply } => {
                if user_initiated {
                    info!("Stopping session");
                    self.dispatch(LifecycleEvent::StopRequested).await;
                } else {
                    self.dispatch(LifecycleEvent::ConnectionLost {
                        reason: "stopped by the system".to_string(),
                    })
                    .await;
                }
                let _ = reply.send(());
            }
            Command::SendBye { reply } => {
                let result = match &self.link {
                    Some(link) => tokio::time::timeout(self.config.bye_timeout, link.send(&SignalingMessage::Bye))
                        .await
                        .map_err(|_| SessionError::Timeout("bye"))
                        .and_then(|sent| sent),
                    None => Err(SessionError::invalid_state("no signaling channel open")),
                };
                let _ = reply.send(result);
            }
            Command::Renegotiate { hints, reply } => {
                let _ = reply.send(self.renegotiate(hints).await);
            }
        }
    }

    async fn renegotiate(&mut self, hints: MediaHints) -> Result<()> {
        if hints == self.hints {
            return Ok(());
        }
        self.hints = hints;

        if !self.transport_open {
            debug!("Hints {:?} stored for the next attempt", hints);
            return Ok(());
        }

        match self.transport.set_constraints(hints).await {
            Ok(()) => {
                info!("Renegotiated {}x{}@{}", hints.width, hints.height, hints.fps);
                Ok(())
            }
            Err(e) => {
                warn!("Renegotiation failed, reconnecting: {}", e);
                self.dispatch(LifecycleEvent::ConnectionLost { reason: e.to_string() })
                    .await;
                Err(e)
            }
        }
    }

    async fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.shared.generation.load(Ordering::Acquire) {
            trace!("Dropping {:?} from closed attempt {}", event, generation);
            return;
        }

        match event {
            TransportEvent::State(state) => {
                debug!("Transport state: {}", state);
                if state.is_connected() {
                    self.dispatch(LifecycleEvent::TransportConnected).await;
                } else if state.is_lost() {
                    self.dispatch(LifecycleEvent::ConnectionLost {
                        reason: format!("transport {state}"),
                    })
                    .await;
                }
            }
            TransportEvent::Signal(message) => {
                if message.is_session_description() {
                    debug!("Sending local {}", message.kind());
                }
                self.send_signal(&message).await;
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: Option<Result<SignalingMessage>>) {
        let message = match inbound {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                self.last_inbound = Instant::now();
                warn!("Ignoring malformed signaling message: {}", e);
                return;
            }
            None => {
                self.link = None;
                info!("Signaling channel closed by remote");
                self.dispatch(LifecycleEvent::ConnectionLost {
                    reason: SessionError::SignalingChannelClosed.to_string(),
                })
                .await;
                return;
            }
        };

        self.last_inbound = Instant::now();
        trace!("Inbound {}", message.kind());

        match message {
            SignalingMessage::Ping => self.send_signal(&SignalingMessage::Pong).await,
            SignalingMessage::Pong | SignalingMessage::Hello { .. } => {}
            SignalingMessage::Bye => {
                info!("Remote peer ended the session");
                self.dispatch(LifecycleEvent::ConnectionLost {
                    reason: "remote bye".to_string(),
                })
                .await;
            }
            SignalingMessage::Offer { .. } | SignalingMessage::Answer { .. } => {
                match self.transport.handle_remote_signal(&message).await {
                    Ok(()) => {
                        debug!("Applied remote {}", message.kind());
                        self.dispatch(LifecycleEvent::Negotiated).await;
                    }
                    Err(e) => {
                        error!("Remote {} rejected: {}", message.kind(), e);
                        self.dispatch(LifecycleEvent::NegotiationFailed { reason: e.to_string() })
                            .await;
                    }
                }
            }
            SignalingMessage::Candidate { .. } => {
                if let Err(e) = self.transport.handle_remote_signal(&message).await {
                    warn!("Remote candidate rejected: {}", e);
                }
            }
        }
    }

    async fn on_keepalive_tick(&mut self) {
        let silence = self.last_inbound.elapsed();
        if silence > self.config.watchdog_window {
            warn!("No inbound signaling for {:?}, connection is stale", silence);
            self.dispatch(LifecycleEvent::ConnectionLost {
                reason: format!("no inbound traffic for {silence:?}"),
            })
            .await;
            return;
        }

        self.send_signal(&SignalingMessage::Ping).await;
    }

    async fn send_signal(&mut self, message: &SignalingMessage) {
        let Some(link) = &self.link else {
            trace!("No signaling channel, dropping {}", message.kind());
            return;
        };

        match tokio::time::timeout(self.config.connect_timeout, link.send(message)).await {
            Ok(Ok(())) => trace!("Sent {}", message.kind()),
            Ok(Err(e)) => warn!("Failed to send {}: {}", message.kind(), e),
            Err(_) => warn!("Timed out sending {}", message.kind()),
        }
    }

    /// Apply an event and execute its effects, including any follow-up
    /// events the effects produce
    async fn dispatch(&mut self, event: LifecycleEvent) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let from = self.lifecycle.state();
            debug!("Lifecycle event {:?} in {}", event, from);

            for effect in self.lifecycle.apply(event) {
                if let Some(follow_up) = self.execute(effect).await {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    async fn execute(&mut self, effect: SideEffect) -> Option<LifecycleEvent> {
        match effect {
            SideEffect::OpenSession => {
                if let Err(e) = self.open_session().await {
                    warn!("Connection attempt failed: {}", e);
                    return Some(if e.is_recoverable() {
                        LifecycleEvent::ConnectionLost { reason: e.to_string() }
                    } else {
                        LifecycleEvent::NegotiationFailed { reason: e.to_string() }
                    });
                }
            }
            SideEffect::StartKeepalive => {
                let period = self.config.keepalive_interval;
                let mut keepalive = interval_at(Instant::now() + period, period);
                keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.keepalive = Some(keepalive);
                self.last_inbound = Instant::now();
                self.connect_deadline = None;
            }
            SideEffect::StopKeepalive => self.keepalive = None,
            SideEffect::CancelRetry => self.retry_at = None,
            SideEffect::TeardownSession {
                send_bye,
                release_frames,
            } => self.teardown(send_bye, release_frames).await,
            SideEffect::ScheduleRetry { attempt, delay } => {
                info!(
                    "Reconnect attempt {}/{} in {:?}",
                    attempt,
                    self.lifecycle.max_attempts(),
                    delay
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            SideEffect::Notify(state) => self.publish(state),
        }
        None
    }

    async fn open_session(&mut self) -> Result<()> {
        let timeout = self.config.connect_timeout;
        self.connect_deadline = Some(Instant::now() + timeout);

        let link = tokio::time::timeout(timeout, self.connector.connect(&self.config.endpoint))
            .await
            .map_err(|_| SessionError::Timeout("signaling connect"))??;

        let hello = SignalingMessage::Hello {
            client: self.config.client_name.clone(),
            compatibility: self.shared.compatibility.load(Ordering::Relaxed),
        };
        tokio::time::timeout(timeout, link.send(&hello))
            .await
            .map_err(|_| SessionError::Timeout("hello"))??;

        self.last_inbound = Instant::now();
        self.link = Some(link);

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let bridge = Arc::new(TransportBridge {
            generation,
            shared: Arc::clone(&self.shared),
            converter: self.converter.clone(),
            events: self.events_tx.clone(),
        });

        self.transport_open = true;
        self.transport.open(bridge, self.hints).await?;

        if self.monitor.is_none() {
            self.monitor = Some(ResourceMonitor::start(&self.converter));
        }

        debug!("Attempt {} opened", generation);
        Ok(())
    }

    async fn teardown(&mut self, send_bye: bool, release_frames: bool) {
        self.connect_deadline = None;
        self.shared.delivering.store(false, Ordering::Release);

        if let Some(link) = self.link.take() {
            if send_bye {
                match tokio::time::timeout(self.config.bye_timeout, link.send(&SignalingMessage::Bye)).await {
                    Ok(Ok(())) => debug!("Sent bye"),
                    Ok(Err(e)) => warn!("Failed to send bye: {}", e),
                    Err(_) => warn!("Timed out sending bye"),
                }
            }
        }

        // Retire the attempt before closing so late callbacks are ignored
        self.shared.generation.fetch_add(1, Ordering::AcqRel);

        if self.transport_open {
            self.transport.close().await;
            self.transport_open = false;
        }

        if release_frames {
            if let Some(monitor) = self.monitor.take() {
                monitor.stop().await;
            }
            self.converter.clear_cache();
            debug!("Cached frames released");
        }
    }

    fn publish(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Error => error!(
                "Session failed ({} reconnect attempts used), restart required",
                self.lifecycle.attempt()
            ),
            ConnectionState::Connected => info!("Session connected"),
            other => info!("Session {}", other),
        }

        self.shared
            .delivering
            .store(state == ConnectionState::Connected, Ordering::Release);
        self.state_tx.send_replace(state);
        self.shared.notify(StatusEvent::ConnectionChanged(state));
    }
}
