//! Broker configuration.

use std::time::Duration;

/// Default client-facing TCP port.
pub const DEFAULT_CLIENT_PORT: u16 = 50505;

/// Default worker-facing TCP port.
pub const DEFAULT_WORKER_PORT: u16 = 50510;

/// Default floor on the polling interval.
pub const DEFAULT_MIN_RATE_MS: u64 = 250;

/// Default ceiling on the polling interval.
pub const DEFAULT_MAX_RATE_MS: u64 = 60_000;

/// Configuration errors caught before the broker binds.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("polling rates must be positive (got min={min} ms, max={max} ms)")]
    NonPositiveRate { min: u64, max: u64 },
    #[error("min polling rate {min} ms exceeds max {max} ms")]
    InvertedRates { min: u64, max: u64 },
}

/// Floor and ceiling for the broker's adaptive polling interval, in
/// milliseconds.
///
/// The broker adjusts its poll timeout between these bounds based on
/// traffic. A short-lived or highly responsive broker wants a low ceiling;
/// the defaults favor idling cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingRates {
    min_rate_ms: u64,
    max_rate_ms: u64,
}

impl PollingRates {
    /// Validates that both rates are positive and `min <= max`.
    pub fn new(min_rate_ms: u64, max_rate_ms: u64) -> Result<Self, ConfigError> {
        if min_rate_ms == 0 || max_rate_ms == 0 {
            return Err(ConfigError::NonPositiveRate {
                min: min_rate_ms,
                max: max_rate_ms,
            });
        }
        if min_rate_ms > max_rate_ms {
            return Err(ConfigError::InvertedRates {
                min: min_rate_ms,
                max: max_rate_ms,
            });
        }
        Ok(Self {
            min_rate_ms,
            max_rate_ms,
        })
    }

    pub fn min_rate(&self) -> Duration {
        Duration::from_millis(self.min_rate_ms)
    }

    pub fn max_rate(&self) -> Duration {
        Duration::from_millis(self.max_rate_ms)
    }
}

impl Default for PollingRates {
    fn default() -> Self {
        Self {
            min_rate_ms: DEFAULT_MIN_RATE_MS,
            max_rate_ms: DEFAULT_MAX_RATE_MS,
        }
    }
}

/// Whether `start` installs handlers for interrupt/terminate signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalHandling {
    /// Signals take their default action; the broker does not intervene.
    None,
    /// Install handlers that trigger an orderly shutdown.
    #[default]
    Capture,
}

/// Everything the broker needs before binding its two endpoints.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Bind host for the client endpoint.
    pub client_host: String,
    /// Preferred client port; falls back to ephemeral on conflict.
    pub client_port: u16,
    /// Bind host for the worker endpoint.
    pub worker_host: String,
    /// Preferred worker port; falls back to ephemeral on conflict.
    pub worker_port: u16,
    /// Host name handed to factory-launched workers on their command line.
    /// The bind host is not necessarily the name workers should dial.
    pub external_worker_host: String,
    pub polling: PollingRates,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            client_host: "127.0.0.1".to_string(),
            client_port: DEFAULT_CLIENT_PORT,
            worker_host: "127.0.0.1".to_string(),
            worker_port: DEFAULT_WORKER_PORT,
            external_worker_host: "127.0.0.1".to_string(),
            polling: PollingRates::default(),
        }
    }
}

impl BrokerSettings {
    /// Settings for tests and embedding: loopback, ephemeral ports.
    pub fn ephemeral() -> Self {
        Self {
            client_port: 0,
            worker_port: 0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_validate() {
        assert!(PollingRates::new(0, 100).is_err());
        assert!(PollingRates::new(100, 0).is_err());
        assert!(PollingRates::new(200, 100).is_err());
        assert!(PollingRates::new(100, 100).is_ok());
    }

    #[test]
    fn test_equal_rates_give_fixed_interval() {
        let rates = PollingRates::new(500, 500).unwrap();
        assert_eq!(rates.min_rate(), rates.max_rate());
    }

    #[test]
    fn test_default_settings() {
        let settings = BrokerSettings::default();
        assert_eq!(settings.client_port, DEFAULT_CLIENT_PORT);
        assert_eq!(settings.worker_port, DEFAULT_WORKER_PORT);
        assert_eq!(settings.external_worker_host, "127.0.0.1");
    }
}
