//! Transport configuration.
//!
//! Every value has a default; [`TransportConfig::from_env`] overrides them
//! from the environment:
//!
//! - `COURIER_CLIPBOARD_ATTEMPTS`: clipboard write attempts (default: 4)
//! - `COURIER_CLIPBOARD_BASE_DELAY_MS`: first backoff delay (default: 100)
//! - `COURIER_CLIPBOARD_TIMEOUT_MS`: per-attempt clipboard timeout (default: 1000)
//! - `COURIER_READY_TIMEOUT_MS`: target readiness wait (default: 10000)
//! - `COURIER_STRATEGY_TIMEOUT_MS`: per-strategy injection timeout (default: 5000)
//! - `COURIER_BRIDGE_TIMEOUT_MS`: bridge request timeout (default: 3000)

use crate::retry::RetryConfig;

const DEFAULT_CLIPBOARD_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_STRATEGY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BRIDGE_TIMEOUT_MS: u64 = 3_000;

/// Clipboard access settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardConfig {
    /// Backoff for focus-related write failures.
    pub retry: RetryConfig,
    /// Timeout for a single clipboard operation.
    pub op_timeout_ms: u64,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            op_timeout_ms: DEFAULT_CLIPBOARD_TIMEOUT_MS,
        }
    }
}

/// Cascading injector settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorConfig {
    /// How long to wait for the target to report ready before going ahead
    /// anyway.
    pub ready_timeout_ms: u64,
    /// Readiness polling interval.
    pub poll_interval_ms: u64,
    /// Budget for one strategy.
    pub strategy_timeout_ms: u64,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            strategy_timeout_ms: DEFAULT_STRATEGY_TIMEOUT_MS,
        }
    }
}

/// Request bridge settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Default timeout for a request.
    pub request_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_BRIDGE_TIMEOUT_MS,
        }
    }
}

/// All transport settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportConfig {
    /// Clipboard settings.
    pub clipboard: ClipboardConfig,
    /// Injector settings.
    pub injector: InjectorConfig,
    /// Bridge settings.
    pub bridge: BridgeConfig,
}

impl TransportConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// missing or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let attempts = lookup("COURIER_CLIPBOARD_ATTEMPTS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.clipboard.retry.max_attempts);

        Self {
            clipboard: ClipboardConfig {
                retry: RetryConfig {
                    max_attempts: attempts,
                    initial_delay_ms: read(
                        "COURIER_CLIPBOARD_BASE_DELAY_MS",
                        defaults.clipboard.retry.initial_delay_ms,
                    ),
                    ..defaults.clipboard.retry
                },
                op_timeout_ms: read("COURIER_CLIPBOARD_TIMEOUT_MS", defaults.clipboard.op_timeout_ms),
            },
            injector: InjectorConfig {
                ready_timeout_ms: read("COURIER_READY_TIMEOUT_MS", defaults.injector.ready_timeout_ms),
                strategy_timeout_ms: read(
                    "COURIER_STRATEGY_TIMEOUT_MS",
                    defaults.injector.strategy_timeout_ms,
                ),
                ..defaults.injector
            },
            bridge: BridgeConfig {
                request_timeout_ms: read("COURIER_BRIDGE_TIMEOUT_MS", defaults.bridge.request_timeout_ms),
            },
        }
    }
}
