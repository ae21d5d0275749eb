//! Session Configuration
//!
//! Provides configuration options for the connection lifecycle manager with a
//! builder pattern for ergonomic construction.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use lamco_rtc_session::{BackoffConfig, SessionConfig};
//!
//! // Using builder pattern
//! let config = SessionConfig::builder()
//!     .endpoint("ws://192.168.1.20:8080")
//!     .keepalive_interval(Duration::from_secs(2))
//!     .max_reconnect_attempts(3)
//!     .backoff(BackoffConfig {
//!         initial_delay: Duration::from_millis(250),
//!         ..Default::default()
//!     })
//!     .build();
//!
//! // Using struct literal with defaults
//! let config = SessionConfig {
//!     compatibility_signaling: true,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use lamco_rtc_frame::ConverterConfig;

/// Reconnection backoff schedule
///
/// The delay before attempt `n` (1-based) is
/// `min(initial_delay * multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry (default: 500ms)
    pub initial_delay: Duration,

    /// Growth factor between retries (default: 2.0)
    pub multiplier: f64,

    /// Upper bound for any single delay (default: 8s)
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffConfig {
    /// Constant delay between retries
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }
}

/// Configuration for a remote video session
///
/// Use [`SessionConfig::builder()`] for ergonomic construction or struct
/// literal syntax with [`Default::default()`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Signaling server address (default: "ws://127.0.0.1:8080")
    pub endpoint: String,

    /// Name announced to the remote peer (default: "lamco-rtc")
    pub client_name: String,

    /// Period of keepalive pings while connected (default: 5s)
    pub keepalive_interval: Duration,

    /// Inbound silence after which the connection is considered stale
    /// (default: 15s)
    ///
    /// Must be longer than the keepalive interval.
    pub watchdog_window: Duration,

    /// Time allowed to open signaling and reach `Connected` (default: 10s)
    pub connect_timeout: Duration,

    /// Time allowed for the best-effort bye message (default: 500ms)
    pub bye_timeout: Duration,

    /// Reconnect attempts before giving up (default: 5)
    pub max_reconnect_attempts: u32,

    /// Delay schedule between reconnect attempts
    pub backoff: BackoffConfig,

    /// Push camera-native hints to the transport on camera changes
    /// (default: true)
    pub auto_adapt_to_camera: bool,

    /// Announce compatibility signaling to the remote peer (default: false)
    ///
    /// Can be toggled at runtime; it is announced on every (re)connect.
    pub compatibility_signaling: bool,

    /// Frame conversion engine configuration
    pub converter: ConverterConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080".to_string(),
            client_name: "lamco-rtc".to_string(),
            keepalive_interval: Duration::from_secs(5),
            watchdog_window: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            bye_timeout: Duration::from_millis(500),
            max_reconnect_attempts: 5,
            backoff: BackoffConfig::default(),
            auto_adapt_to_camera: true,
            compatibility_signaling: false,
            converter: ConverterConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Validate configuration and return any issues
    ///
    /// Returns `Ok(())` if configuration is valid, or a list of issues.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.endpoint.is_empty() {
            issues.push("endpoint cannot be empty".to_string());
        }

        if self.client_name.is_empty() {
            issues.push("client_name cannot be empty".to_string());
        }

        if self.keepalive_interval < Duration::from_millis(100) {
            issues.push("keepalive_interval should be at least 100ms".to_string());
        }

        if self.watchdog_window <= self.keepalive_interval {
            issues.push("watchdog_window must be longer than keepalive_interval".to_string());
        }

        if self.connect_timeout < Duration::from_millis(100) {
            issues.push("connect_timeout should be at least 100ms".to_string());
        }

        if self.bye_timeout.is_zero() {
            issues.push("bye_timeout must be non-zero".to_string());
        }

        if self.backoff.initial_delay.is_zero() {
            issues.push("backoff.initial_delay must be non-zero".to_string());
        }

        if self.backoff.multiplier < 1.0 {
            issues.push("backoff.multiplier must be at least 1.0".to_string());
        }

        if self.backoff.max_delay < self.backoff.initial_delay {
            issues.push("backoff.max_delay must not be below initial_delay".to_string());
        }

        if let Err(converter_issues) = self.converter.validate() {
            issues.extend(converter_issues.into_iter().map(|i| format!("converter: {i}")));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`SessionConfig`]
///
/// Provides a fluent interface for constructing configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    endpoint: Option<String>,
    client_name: Option<String>,
    keepalive_interval: Option<Duration>,
    watchdog_window: Option<Duration>,
    connect_timeout: Option<Duration>,
    bye_timeout: Option<Duration>,
    max_reconnect_attempts: Option<u32>,
    backoff: Option<BackoffConfig>,
    auto_adapt_to_camera: Option<bool>,
    compatibility_signaling: Option<bool>,
    converter: Option<ConverterConfig>,
}

impl SessionConfigBuilder {
    /// Set signaling server address
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set client name announced to the peer
    #[must_use]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Set keepalive period
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Set watchdog window
    #[must_use]
    pub fn watchdog_window(mut self, window: Duration) -> Self {
        self.watchdog_window = Some(window);
        self
    }

    /// Set connect/negotiation timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set bye send timeout
    #[must_use]
    pub fn bye_timeout(mut self, timeout: Duration) -> Self {
        self.bye_timeout = Some(timeout);
        self
    }

    /// Set maximum reconnect attempts
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Set reconnect backoff schedule
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Set whether camera changes push hints to the transport
    #[must_use]
    pub fn auto_adapt_to_camera(mut self, enable: bool) -> Self {
        self.auto_adapt_to_camera = Some(enable);
        self
    }

    /// Set whether compatibility signaling is announced
    #[must_use]
    pub fn compatibility_signaling(mut self, enable: bool) -> Self {
        self.compatibility_signaling = Some(enable);
        self
    }

    /// Set frame conversion configuration
    #[must_use]
    pub fn converter(mut self, converter: ConverterConfig) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Build the configuration
    ///
    /// Returns a [`SessionConfig`] with builder values overriding defaults.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        let defaults = SessionConfig::default();

        SessionConfig {
            endpoint: self.endpoint.unwrap_or(defaults.endpoint),
            client_name: self.client_name.unwrap_or(defaults.client_name),
            keepalive_interval: self.keepalive_interval.unwrap_or(defaults.keepalive_interval),
            watchdog_window: self.watchdog_window.unwrap_or(defaults.watchdog_window),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            bye_timeout: self.bye_timeout.unwrap_or(defaults.bye_timeout),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            backoff: self.backoff.unwrap_or(defaults.backoff),
            auto_adapt_to_camera: self.auto_adapt_to_camera.unwrap_or(defaults.auto_adapt_to_camera),
            compatibility_signaling: self
                .compatibility_signaling
                .unwrap_or(defaults.compatibility_signaling),
            converter: self.converter.unwrap_or(defaults.converter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.backoff.initial_delay, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .endpoint("ws://10.0.0.2:9000")
            .max_reconnect_attempts(2)
            .compatibility_signaling(true)
            .build();

        assert_eq!(config.endpoint, "ws://10.0.0.2:9000");
        assert_eq!(config.max_reconnect_attempts, 2);
        assert!(config.compatibility_signaling);
        // Unset values keep defaults
        assert_eq!(config.client_name, "lamco-rtc");
    }

    #[test]
    fn test_validation() {
        let config = SessionConfig {
            endpoint: String::new(),
            watchdog_window: Duration::from_secs(1),
            keepalive_interval: Duration::from_secs(2),
            ..Default::default()
        };
        let issues = config.validate().expect_err("invalid");
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_validation_includes_converter() {
        let config = SessionConfig {
            converter: ConverterConfig {
                cache_capacity: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let issues = config.validate().expect_err("invalid");
        assert!(issues.iter().any(|i| i.starts_with("converter: ")));
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = BackoffConfig::fixed(Duration::from_secs(1));
        assert_eq!(backoff.initial_delay, backoff.max_delay);
        assert_eq!(backoff.multiplier, 1.0);
    }
}
