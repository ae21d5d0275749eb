//! Hardware conversion seam
//!
//! A [`HardwareConverter`] wraps a platform color-conversion context. The
//! engine owns at most one, behind a mutex the frame path waits on for a
//! bounded time only. The context is configured lazily for a
//! source/destination pair and reconfigured only when that pair changes.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::error::{FrameError, Result};
use crate::format::PixelFormat;

/// Platform color-conversion context
pub trait HardwareConverter: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether the context can convert `from` into `to`
    fn supports(&self, from: PixelFormat, to: PixelFormat) -> bool;

    /// Prepare the context for a conversion pair
    fn configure(&mut self, from: PixelFormat, to: PixelFormat) -> Result<()>;

    /// Convert a buffer using the configured pair
    ///
    /// The result need not carry the source metadata; the engine reapplies
    /// it.
    fn convert(&mut self, src: &PixelBuffer, to: PixelFormat) -> Result<PixelBuffer>;
}

struct Slot {
    converter: Box<dyn HardwareConverter>,
    configured: Option<(PixelFormat, PixelFormat)>,
    configure_count: u64,
}

/// Engine-owned holder for the hardware context
pub(crate) struct HardwareSlot {
    inner: Mutex<Option<Slot>>,
    wait: Duration,
}

impl HardwareSlot {
    pub(crate) fn new(wait: Duration) -> Self {
        Self {
            inner: Mutex::new(None),
            wait,
        }
    }

    pub(crate) fn install(&self, converter: Box<dyn HardwareConverter>) {
        debug!("Installing hardware converter: {}", converter.name());
        *self.inner.lock() = Some(Slot {
            converter,
            configured: None,
            configure_count: 0,
        });
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Times the context has been (re)configured
    pub(crate) fn configure_count(&self) -> u64 {
        self.inner.lock().as_ref().map_or(0, |s| s.configure_count)
    }

    /// Convert with the hardware context
    ///
    /// Fails with `HardwareUnavailable` when no context is installed or the
    /// context stays busy past the wait bound, and with
    /// `ConversionUnsupported` when it rejects the pair.
    pub(crate) fn convert(&self, src: &PixelBuffer, to: PixelFormat) -> Result<PixelBuffer> {
        let from = src.format();
        if from == PixelFormat::Unknown {
            return Err(FrameError::unsupported(from, to));
        }

        let mut guard = self
            .inner
            .try_lock_for(self.wait)
            .ok_or_else(|| FrameError::hardware("conversion context busy"))?;
        let slot = guard
            .as_mut()
            .ok_or_else(|| FrameError::hardware("no conversion context"))?;

        if !slot.converter.supports(from, to) {
            return Err(FrameError::unsupported(from, to));
        }
        if slot.configured != Some((from, to)) {
            slot.configured = None;
            slot.converter.configure(from, to)?;
            slot.configured = Some((from, to));
            slot.configure_count += 1;
            debug!("Configured {} for {} -> {}", slot.converter.name(), from, to);
        }

        slot.converter.convert(src, to)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::convert;

    /// Hardware stand-in backed by the software path
    pub(crate) struct SoftwareBacked {
        pub(crate) configures: Arc<AtomicU64>,
        pub(crate) fail_configure: bool,
    }

    impl SoftwareBacked {
        pub(crate) fn new() -> Self {
            Self {
                configures: Arc::new(AtomicU64::new(0)),
                fail_configure: false,
            }
        }
    }

    impl HardwareConverter for SoftwareBacked {
        fn name(&self) -> &str {
            "software-backed"
        }

        fn supports(&self, from: PixelFormat, to: PixelFormat) -> bool {
            from.is_yuv() && to == PixelFormat::PackedBgra
        }

        fn configure(&mut self, _from: PixelFormat, _to: PixelFormat) -> Result<()> {
            self.configures.fetch_add(1, Ordering::Relaxed);
            if self.fail_configure {
                return Err(FrameError::hardware("session setup failed"));
            }
            Ok(())
        }

        fn convert(&mut self, src: &PixelBuffer, to: PixelFormat) -> Result<PixelBuffer> {
            convert::convert(src, to)
        }
    }

    fn yuv(format: PixelFormat) -> PixelBuffer {
        PixelBuffer::new(format, 2, 2, vec![128; 6]).expect("buffer")
    }

    #[test]
    fn test_lazy_configure_once_per_pair() {
        let slot = HardwareSlot::new(Duration::from_millis(5));
        slot.install(Box::new(SoftwareBacked::new()));
        assert_eq!(slot.configure_count(), 0);

        for _ in 0..3 {
            slot.convert(&yuv(PixelFormat::FullRangeYuv420), PixelFormat::PackedBgra)
                .expect("convert");
        }
        assert_eq!(slot.configure_count(), 1);

        slot.convert(&yuv(PixelFormat::VideoRangeYuv420), PixelFormat::PackedBgra)
            .expect("convert");
        assert_eq!(slot.configure_count(), 2);
    }

    #[test]
    fn test_unsupported_pair() {
        let slot = HardwareSlot::new(Duration::from_millis(5));
        slot.install(Box::new(SoftwareBacked::new()));
        let src = PixelBuffer::new(PixelFormat::PackedBgra, 1, 1, vec![0; 4]).expect("buffer");
        let err = slot.convert(&src, PixelFormat::FullRangeYuv420).expect_err("unsupported");
        assert!(matches!(err, FrameError::ConversionUnsupported { .. }));
    }

    #[test]
    fn test_missing_context() {
        let slot = HardwareSlot::new(Duration::from_millis(5));
        assert!(!slot.is_installed());
        let err = slot
            .convert(&yuv(PixelFormat::FullRangeYuv420), PixelFormat::PackedBgra)
            .expect_err("none installed");
        assert!(matches!(err, FrameError::HardwareUnavailable(_)));
    }

    #[test]
    fn test_configure_failure_retries_next_time() {
        let slot = HardwareSlot::new(Duration::from_millis(5));
        let mut hw = SoftwareBacked::new();
        hw.fail_configure = true;
        let configures = Arc::clone(&hw.configures);
        slot.install(Box::new(hw));

        for _ in 0..2 {
            assert!(slot
                .convert(&yuv(PixelFormat::FullRangeYuv420), PixelFormat::PackedBgra)
                .is_err());
        }
        assert_eq!(configures.load(Ordering::Relaxed), 2);
        assert_eq!(slot.configure_count(), 0);
    }

    #[test]
    fn test_busy_context_times_out() {
        let slot = HardwareSlot::new(Duration::from_millis(5));
        slot.install(Box::new(SoftwareBacked::new()));

        let _held = slot.inner.lock();
        let err = slot
            .convert(&yuv(PixelFormat::FullRangeYuv420), PixelFormat::PackedBgra)
            .expect_err("busy");
        assert_eq!(err, FrameError::hardware("conversion context busy"));
    }
}
