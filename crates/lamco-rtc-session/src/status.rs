//! Status notifications for a presentation layer

use std::sync::Arc;

use lamco_rtc_frame::{ConverterEvent, PixelFormat, ProcessingMode};

use crate::state::ConnectionState;

/// Event delivered to the status callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The connection state changed
    ConnectionChanged(ConnectionState),
    /// The incoming pixel format changed
    FormatChanged(PixelFormat),
    /// The conversion path changed
    ProcessingModeChanged(ProcessingMode),
    /// The resource sweep forced cleanup
    ResourceLeak {
        /// Outstanding buffers at detection time
        outstanding: u64,
        /// Configured threshold
        threshold: u64,
    },
    /// Free-form status line
    Message(String),
}

impl From<ConverterEvent> for StatusEvent {
    fn from(event: ConverterEvent) -> Self {
        match event {
            ConverterEvent::FormatChanged(format) => Self::FormatChanged(format),
            ConverterEvent::ProcessingModeChanged(mode) => Self::ProcessingModeChanged(mode),
            ConverterEvent::LeakDetected { outstanding, threshold } => Self::ResourceLeak { outstanding, threshold },
        }
    }
}

/// Status callback
///
/// Called from the session driver and the frame path; it must not block.
pub type StatusCallback = Arc<dyn Fn(&StatusEvent) + Send + Sync>;
