//! Frame conversion engine
//!
//! [`FrameConverter`] is the renderer-side sink of the media transport. Each
//! incoming [`TransportFrame`] goes through:
//!
//! 1. format detection and the rate gate, under the state lock
//! 2. scoped buffer locking, conversion and scaling, outside the lock
//! 3. insertion into the decoded-frame cache, under the lock again
//!
//! Frame-path failures never propagate: they are counted as dropped frames
//! and logged at debug level.
//!
//! # Locking
//!
//! All mutable frame-path state (gate, cache, counters, targets) sits behind
//! one `parking_lot::Mutex` held only for bookkeeping. Conversion, scaling and
//! buffer release always happen with the lock released. The hardware context
//! has its own lock, waited on for a bounded time before the software path
//! takes over.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use lamco_rtc_frame::{ConverterConfig, FrameConverter, PixelFormat, TransportFrame, FOURCC_BGRA};
//!
//! let converter = FrameConverter::new(ConverterConfig::default()).unwrap();
//! converter.on_frame(TransportFrame::new(FOURCC_BGRA, 2, 2, vec![0; 16], Duration::ZERO));
//!
//! let frame = converter.latest_frame(None).unwrap();
//! assert_eq!(frame.format(), PixelFormat::PackedBgra);
//! assert_eq!(converter.stats().frame_count, 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::accounting::ResourceAccounting;
use crate::adaptation::{AdaptationMode, AdaptationPolicy};
use crate::buffer::PixelBuffer;
use crate::cache::{FrameCache, Lookup};
use crate::config::ConverterConfig;
use crate::convert::{self, ScaleFilter};
use crate::error::{FrameError, Result};
use crate::format::PixelFormat;
use crate::frame::{DecodedFrame, TransportFrame};
use crate::gate::{DropReason, RateGate};
use crate::hardware::{HardwareConverter, HardwareSlot};
use crate::lock::ScopedBufferLock;
use crate::stats::{ConverterStats, FpsEstimator, ProcessingMode};

/// Notifications raised by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterEvent {
    /// The incoming pixel format changed
    FormatChanged(PixelFormat),
    /// The conversion path changed
    ProcessingModeChanged(ProcessingMode),
    /// The resource sweep found the leak threshold exceeded
    LeakDetected {
        /// Outstanding buffers at detection time
        outstanding: u64,
        /// Configured threshold
        threshold: u64,
    },
}

/// Callback receiving [`ConverterEvent`]s
///
/// Invoked from the frame path and the resource sweep with no engine lock
/// held. It must not block.
pub type ConverterCallback = Arc<dyn Fn(&ConverterEvent) + Send + Sync>;

/// What happened to one incoming frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Converted and cached
    Delivered(ProcessingMode),
    /// Refused by the rate gate
    Gated(DropReason),
    /// Conversion or caching failed
    Failed,
}

/// Result of one resource sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed for exceeding the cache TTL
    pub expired: usize,
    /// Entries force-released to get back under the leak threshold
    pub forced: usize,
    /// Locks dropped on force-released buffers
    pub force_unlocked: usize,
    /// Set when the leak threshold was exceeded
    pub leak: Option<FrameError>,
}

/// Most recent frame as tightly packed BGRA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgraImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height * 4` bytes
    pub data: Vec<u8>,
}

struct ConverterState {
    gate: RateGate,
    fps: FpsEstimator,
    cache: FrameCache,
    resolution: (u32, u32),
    target_fps: u32,
    output_format: Option<PixelFormat>,
    mode: AdaptationMode,
    policy: AdaptationPolicy,
    detected_format: PixelFormat,
    processing_mode: ProcessingMode,
    frame_count: u64,
    processed_count: u64,
    dropped_count: u64,
    sequence: u64,
}

impl ConverterState {
    fn new(config: &ConverterConfig) -> Self {
        let resolution = (config.target_width, config.target_height);
        let policy = config
            .adaptation_mode
            .resolve(resolution, config.target_fps, config.output_format);
        Self {
            gate: RateGate::new(policy.fps, config.gate_tolerance),
            fps: FpsEstimator::new(config.fps_smoothing),
            cache: FrameCache::new(config.cache_capacity),
            resolution,
            target_fps: config.target_fps,
            output_format: config.output_format,
            mode: config.adaptation_mode,
            policy,
            detected_format: PixelFormat::Unknown,
            processing_mode: ProcessingMode::Idle,
            frame_count: 0,
            processed_count: 0,
            dropped_count: 0,
            sequence: 0,
        }
    }

    fn refresh_policy(&mut self) {
        self.policy = self.mode.resolve(self.resolution, self.target_fps, self.output_format);
        self.gate.set_target_fps(self.policy.fps);
    }

    fn zero_counters(&mut self) {
        self.frame_count = 0;
        self.processed_count = 0;
        self.dropped_count = 0;
    }
}

pub(crate) struct Inner {
    config: ConverterConfig,
    state: Mutex<ConverterState>,
    accounting: Arc<ResourceAccounting>,
    hardware: HardwareSlot,
    receiving: AtomicBool,
    callback: Mutex<Option<ConverterCallback>>,
}

/// Per-frame conversion engine
///
/// Cheap to clone; clones share one engine.
#[derive(Clone)]
pub struct FrameConverter {
    inner: Arc<Inner>,
}

impl FrameConverter {
    /// Create an engine, rejecting invalid configuration
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|issues| FrameError::InvalidParameter(issues.join("; ")))?;

        info!(
            "Creating frame converter: {}x{}@{} output {} ({} mode)",
            config.target_width,
            config.target_height,
            config.target_fps,
            config.output_format.map_or("as received", PixelFormat::as_str),
            config.adaptation_mode
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ConverterState::new(&config)),
                accounting: ResourceAccounting::new(),
                hardware: HardwareSlot::new(config.hardware_wait),
                receiving: AtomicBool::new(false),
                callback: Mutex::new(None),
                config,
            }),
        })
    }

    /// Create an engine with default configuration
    pub fn with_default() -> Result<Self> {
        Self::new(ConverterConfig::default())
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Engine configuration
    pub fn config(&self) -> &ConverterConfig {
        &self.inner.config
    }

    /// Shared resource accounting
    pub fn accounting(&self) -> &Arc<ResourceAccounting> {
        &self.inner.accounting
    }

    /// Install the hardware conversion context
    pub fn set_hardware_converter(&self, converter: Box<dyn HardwareConverter>) {
        self.inner.hardware.install(converter);
    }

    /// Times the hardware context has been (re)configured
    pub fn hardware_configure_count(&self) -> u64 {
        self.inner.hardware.configure_count()
    }

    /// Register the event callback, replacing any previous one
    pub fn set_event_callback(&self, callback: Option<ConverterCallback>) {
        *self.inner.callback.lock() = callback;
    }

    /// Feed one frame from the transport
    ///
    /// Never fails; the outcome is reported for callers that care and is
    /// reflected in [`stats`](Self::stats) either way.
    pub fn on_frame(&self, frame: TransportFrame) -> FrameOutcome {
        self.inner.receiving.store(true, Ordering::Relaxed);
        let format = frame.format();

        let mut events = Vec::new();
        let admitted = {
            let mut st = self.inner.state.lock();
            st.frame_count += 1;
            if st.detected_format != format {
                st.detected_format = format;
                events.push(ConverterEvent::FormatChanged(format));
            }
            match st.gate.admit(frame.timestamp) {
                Ok(()) => {
                    st.sequence += 1;
                    Ok((st.sequence, st.policy, st.mode))
                }
                Err(reason) => {
                    st.dropped_count += 1;
                    Err(reason)
                }
            }
        };
        if let Some(ConverterEvent::FormatChanged(f)) = events.first() {
            debug!("Incoming pixel format changed to {}", f);
        }

        let (sequence, policy, mode) = match admitted {
            Ok(v) => v,
            Err(reason) => {
                trace!("Frame at {:?} gated: {:?}", frame.timestamp, reason);
                self.emit(&events);
                return FrameOutcome::Gated(reason);
            }
        };

        let pts = frame.timestamp;
        let outcome = match self.process(frame, &policy, mode) {
            Ok((buffer, processing)) => {
                let decoded = DecodedFrame::new(sequence, buffer);
                let mut st = self.inner.state.lock();
                match st.cache.insert(decoded, now()) {
                    Ok(evicted) => {
                        st.processed_count += 1;
                        st.fps.record(pts);
                        if st.processing_mode != processing {
                            st.processing_mode = processing;
                            events.push(ConverterEvent::ProcessingModeChanged(processing));
                        }
                        drop(st);
                        // Release the evicted buffer outside the lock
                        drop(evicted);
                        FrameOutcome::Delivered(processing)
                    }
                    Err(e) => {
                        st.dropped_count += 1;
                        drop(st);
                        debug!("Frame not cached: {}", e);
                        FrameOutcome::Failed
                    }
                }
            }
            Err(e) => {
                self.inner.state.lock().dropped_count += 1;
                debug!("Dropped {} frame: {}", format, e);
                FrameOutcome::Failed
            }
        };

        self.emit(&events);
        outcome
    }

    /// Lock, convert and scale one admitted frame
    fn process(
        &self,
        frame: TransportFrame,
        policy: &AdaptationPolicy,
        mode: AdaptationMode,
    ) -> Result<(Arc<PixelBuffer>, ProcessingMode)> {
        let accounting = &self.inner.accounting;
        let metadata = frame.metadata();
        let source = Arc::new(
            PixelBuffer::new(frame.format(), frame.width, frame.height, frame.data)?
                .with_metadata(metadata)
                .tracked(accounting),
        );

        // Unknown layouts cannot be converted or scaled
        if source.format() == PixelFormat::Unknown {
            return Ok((source, ProcessingMode::Passthrough));
        }

        let guard = ScopedBufferLock::acquire(Some(&source), accounting)?;
        let src = guard.buffer();

        let (converted, mut processing) = match policy.output_format {
            Some(to) if to != src.format() => {
                let (buffer, processing) = self.convert_buffer(src, to, policy.allow_hardware)?;
                (Some(buffer), processing)
            }
            _ => (None, ProcessingMode::Passthrough),
        };

        let current = converted.as_ref().unwrap_or(src);
        let mut target = convert::fit_dimensions(
            current.dimensions(),
            policy.resolution,
            self.inner.config.preserve_aspect,
            self.inner.config.allow_upscale,
        );
        if target != current.dimensions() && current.format().is_yuv() {
            target = convert::align_even(target, current.dimensions());
        }

        let scaled = if target == current.dimensions() {
            None
        } else {
            let filter = match mode {
                AdaptationMode::Performance => ScaleFilter::Nearest,
                _ => ScaleFilter::Bilinear,
            };
            if processing == ProcessingMode::Passthrough {
                processing = ProcessingMode::Software;
            }
            Some(convert::scale(current, target.0, target.1, filter)?)
        };

        let output = match scaled.or(converted) {
            Some(buffer) => Arc::new(buffer.with_metadata(metadata).tracked(accounting)),
            None => {
                drop(guard);
                source
            }
        };
        Ok((output, processing))
    }

    /// Convert with the hardware context when allowed, else in software
    fn convert_buffer(&self, src: &PixelBuffer, to: PixelFormat, allow_hardware: bool) -> Result<(PixelBuffer, ProcessingMode)> {
        if allow_hardware {
            match self.inner.hardware.convert(src, to) {
                Ok(buffer) => return Ok((buffer, ProcessingMode::Hardware)),
                Err(e) => trace!("Hardware path unavailable, using software: {}", e),
            }
        }
        Ok((convert::convert(src, to)?, ProcessingMode::Software))
    }

    fn emit(&self, events: &[ConverterEvent]) {
        if events.is_empty() {
            return;
        }
        let callback = self.inner.callback.lock().clone();
        if let Some(callback) = callback {
            for event in events {
                callback(event);
            }
        }
    }

    /// Most recent frame, converted to `hint` when given
    ///
    /// Without a hint the frame comes back in the format it was cached in,
    /// which is the arrival format unless an output format is forced.
    /// Fails with [`FrameError::NoFrameAvailable`] before the first frame and
    /// right after the cache is cleared. A conversion on behalf of the hint
    /// produces a new buffer; the cached entry is left untouched.
    ///
    /// Pixel data is immutable, so a cached buffer that another consumer
    /// holds locked is read without taking the lock.
    pub fn latest_frame(&self, hint: Option<PixelFormat>) -> Result<DecodedFrame> {
        let (found, allow_hardware) = {
            let st = self.inner.state.lock();
            (st.cache.lookup(hint)?, st.policy.allow_hardware)
        };

        match found {
            Lookup::Hit(frame) => Ok(frame),
            Lookup::Convert { frame, to } => {
                let accounting = &self.inner.accounting;
                let guard = match ScopedBufferLock::acquire(Some(frame.buffer()), accounting) {
                    Ok(guard) => Some(guard),
                    Err(FrameError::BufferAlreadyLocked) => {
                        trace!("Frame #{} locked by another consumer, reading shared", frame.sequence());
                        None
                    }
                    Err(e) => return Err(e),
                };
                let (buffer, _) = self.convert_buffer(frame.buffer(), to, allow_hardware)?;
                drop(guard);
                let buffer = buffer.with_metadata(*frame.metadata()).tracked(accounting);
                Ok(DecodedFrame::new(frame.sequence(), Arc::new(buffer)))
            }
        }
    }

    /// Most recent frame as packed BGRA bytes
    pub fn latest_frame_bgra(&self) -> Result<BgraImage> {
        let frame = self.latest_frame(Some(PixelFormat::PackedBgra))?;
        let (width, height) = frame.dimensions();
        let len = PixelFormat::PackedBgra
            .buffer_size(width, height)
            .ok_or_else(|| FrameError::invalid_buffer(format!("BGRA {width}x{height} is too large")))?;
        Ok(BgraImage {
            width,
            height,
            data: frame.buffer().data()[..len].to_vec(),
        })
    }

    /// Change the output resolution box, effective from the next frame
    pub fn set_target_resolution(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidParameter(format!("target resolution {width}x{height}")));
        }
        let mut st = self.inner.state.lock();
        st.resolution = (width, height);
        st.refresh_policy();
        debug!("Target resolution set to {}x{}", width, height);
        Ok(())
    }

    /// Change the target delivery rate, effective from the next frame
    ///
    /// 0 disables rate gating.
    pub fn set_target_frame_rate(&self, fps: u32) {
        let mut st = self.inner.state.lock();
        st.target_fps = fps;
        st.refresh_policy();
        debug!(
            "Target frame rate set to {} (effective {}, min interval {:?})",
            fps,
            st.policy.fps,
            st.gate.min_interval()
        );
    }

    /// Switch adaptation mode, effective from the next frame
    pub fn set_adaptation_mode(&self, mode: AdaptationMode) {
        let mut st = self.inner.state.lock();
        if st.mode == mode {
            return;
        }
        st.mode = mode;
        st.refresh_policy();
        info!(
            "Adaptation mode changed to {}: {}x{}@{}",
            mode, st.policy.resolution.0, st.policy.resolution.1, st.policy.fps
        );
    }

    /// Current adaptation mode
    pub fn adaptation_mode(&self) -> AdaptationMode {
        self.inner.state.lock().mode
    }

    /// Targets currently in force after applying the adaptation mode
    pub fn effective_policy(&self) -> AdaptationPolicy {
        self.inner.state.lock().policy
    }

    /// Reconfigure the expected format and resolution in one step
    ///
    /// Used when the upstream camera's native characteristics change: the
    /// output format follows `format`, the target box becomes `resolution`,
    /// and frames produced under the old settings are released.
    pub fn adapt_to_native_format(&self, format: PixelFormat, resolution: (u32, u32)) -> Result<()> {
        if format == PixelFormat::Unknown {
            return Err(FrameError::InvalidParameter("native format cannot be Unknown".into()));
        }
        if resolution.0 == 0 || resolution.1 == 0 {
            return Err(FrameError::InvalidParameter(format!(
                "native resolution {}x{}",
                resolution.0, resolution.1
            )));
        }

        let stale = {
            let mut st = self.inner.state.lock();
            st.output_format = Some(format);
            st.resolution = resolution;
            st.refresh_policy();
            st.gate.reset();
            st.cache.clear()
        };
        info!(
            "Adapted to native format {} {}x{}, released {} cached frames",
            format,
            resolution.0,
            resolution.1,
            stale.len()
        );
        Ok(())
    }

    /// Counters and estimates
    pub fn stats(&self) -> ConverterStats {
        let counters = self.inner.accounting.snapshot();
        let st = self.inner.state.lock();
        ConverterStats {
            frame_count: st.frame_count,
            processed_count: st.processed_count,
            dropped_frame_count: st.dropped_count,
            estimated_fps: st.fps.fps(),
            outstanding_buffers: counters.outstanding_buffers(),
            outstanding_locks: counters.outstanding_locks(),
            forced_releases: counters.forced_releases,
            leak_events: counters.leak_events,
            cached_frames: st.cache.len(),
            detected_format: st.detected_format,
            processing_mode: st.processing_mode,
        }
    }

    /// Smoothed delivery rate
    pub fn estimated_fps(&self) -> f64 {
        self.inner.state.lock().fps.fps()
    }

    /// Whether at least one frame arrived since creation or the last reset
    pub fn is_receiving_frames(&self) -> bool {
        self.inner.receiving.load(Ordering::Relaxed)
    }

    /// Format of the most recent incoming frame
    pub fn detected_format(&self) -> PixelFormat {
        self.inner.state.lock().detected_format
    }

    /// Conversion path taken for the most recent frame
    pub fn processing_mode(&self) -> ProcessingMode {
        self.inner.state.lock().processing_mode
    }

    /// Release all cached frames and zero counters except lifetime totals
    pub fn clear_cache(&self) {
        let released = {
            let mut st = self.inner.state.lock();
            st.zero_counters();
            st.cache.clear()
        };
        let count = released.len();
        drop(released);
        self.inner.accounting.reset();
        debug!("Frame cache cleared, released {} frames", count);
    }

    /// [`clear_cache`](Self::clear_cache), plus gate, estimator and detection
    /// state
    pub fn reset(&self) {
        let released = {
            let mut st = self.inner.state.lock();
            st.zero_counters();
            st.gate.reset();
            st.fps.reset();
            st.sequence = 0;
            st.detected_format = PixelFormat::Unknown;
            st.processing_mode = ProcessingMode::Idle;
            st.cache.clear()
        };
        let count = released.len();
        drop(released);
        self.inner.accounting.reset();
        self.inner.receiving.store(false, Ordering::Relaxed);
        debug!("Frame converter reset, released {} frames", count);
    }

    /// Run one resource sweep
    ///
    /// Expires entries older than the cache TTL, then, if outstanding
    /// buffers or locks exceed the leak threshold, records one leak event and
    /// force-releases one cached entry per outstanding resource above the
    /// threshold, oldest first. Buffers still locked when force-released are
    /// unlocked and the unlock is counted.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let config = &self.inner.config;
        let accounting = &self.inner.accounting;

        let expired = self.inner.state.lock().cache.expire(now, config.cache_ttl);
        let mut report = SweepReport {
            expired: expired.len(),
            ..SweepReport::default()
        };
        drop(expired);

        let counters = accounting.snapshot();
        let outstanding = counters.outstanding_buffers().max(counters.outstanding_locks());
        if outstanding <= config.leak_threshold {
            if report.expired > 0 {
                debug!("Expired {} cached frames", report.expired);
            }
            return report;
        }

        accounting.record_leak_event();
        let excess = usize::try_from(outstanding - config.leak_threshold).unwrap_or(usize::MAX);
        let (forced, oldest_age) = {
            let mut st = self.inner.state.lock();
            let age = st.cache.oldest_age(now);
            (st.cache.take_oldest(excess), age)
        };

        for frame in &forced {
            accounting.record_forced_release();
            if frame.buffer().force_unlock() {
                accounting.record_unlock();
                report.force_unlocked += 1;
            }
        }
        report.forced = forced.len();
        drop(forced);

        let leak = FrameError::ResourceLeakDetected {
            outstanding,
            threshold: config.leak_threshold,
        };
        warn!(
            "{}: forced release of {} cached frames ({} unlocked, oldest {:?})",
            leak, report.forced, report.force_unlocked, oldest_age
        );
        report.leak = Some(leak);

        self.emit(&[ConverterEvent::LeakDetected {
            outstanding,
            threshold: config.leak_threshold,
        }]);
        report
    }
}

impl std::fmt::Debug for FrameConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameConverter")
            .field("config", &self.inner.config)
            .field("hardware", &self.inner.hardware.is_installed())
            .field("receiving", &self.is_receiving_frames())
            .finish_non_exhaustive()
    }
}

/// Current instant on the runtime clock (paused in tests)
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
