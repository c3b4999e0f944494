//! Cascading injector.
//!
//! ```text
//! Idle ─► Probing ─► Strategy(0) ─► Strategy(1) ─► … ─► Succeeded
//!            │            │              │                   ▲
//!            │            └──── ok ──────┴───────────────────┘
//!            └ not ready after timeout: go on anyway
//!                                    all failed ─► ExhaustedFallback
//! ```
//!
//! Strategies run one at a time in priority order. Each one is bounded by
//! its own timeout and isolated from panics, so a misbehaving strategy only
//! moves the cascade to the next one. Units a failed strategy did place are
//! not offered to the next strategy. When every strategy fails the units
//! still unplaced are handed back with a manual export instead of being
//! dropped.

mod channel;
mod strategy;
mod structured;
mod view;

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use base64::Engine;
use courier_core::{collect_media, ClipboardPayload, ElementKind, ElementNode, PayloadMetadata};
use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use channel::ClipboardChannel;
pub use strategy::{InjectionStrategy, Progress};
pub use structured::{place_at, place_at_root, StructuredCreate};
pub use view::DirectViewInsertion;

use strategy::placements;

use crate::config::InjectorConfig;
use crate::error::{FailureKind, InjectionError};
use crate::target::TargetRuntime;

/// Cascade state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum InjectorState {
    /// Nothing started.
    Idle,
    /// Waiting for the target to report ready.
    Probing,
    /// Running the strategy at this position.
    Strategy {
        /// Position in the cascade.
        index: usize,
        /// Strategy name.
        method: String,
    },
    /// A strategy placed the tree.
    Succeeded,
    /// Every strategy failed.
    ExhaustedFallback,
}

/// Successful injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionReport {
    /// Always true.
    pub success: bool,
    /// Name of the strategy that succeeded.
    pub method: String,
    /// Top-level placements made, across every strategy that contributed.
    pub count: usize,
    /// States visited.
    #[serde(skip)]
    pub states: Vec<InjectorState>,
}

/// One failed strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttempt {
    /// Strategy name.
    pub method: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Error message.
    pub message: String,
}

/// The tree in a form the user can save or copy by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualExport {
    /// Pretty-printed payload JSON, re-importable with the marker intact.
    pub json: String,
    /// The same JSON as a `data:` URI for download links.
    pub data_uri: String,
}

impl ManualExport {
    /// Export a payload.
    #[must_use]
    pub fn for_payload(payload: &ClipboardPayload) -> Self {
        let json = payload.encode_pretty().unwrap_or_else(|e| {
            warn!("Manual export serialization failed: {e}");
            String::from("{}")
        });
        let encoded = base64::engine::general_purpose::STANDARD.encode(json.as_bytes());
        Self {
            data_uri: format!("data:application/json;base64,{encoded}"),
            json,
        }
    }

    /// Export a bare tree with fresh metadata.
    #[must_use]
    pub fn for_tree(tree: &ElementNode) -> Self {
        let payload =
            ClipboardPayload::new(tree.clone(), collect_media(tree), PayloadMetadata::default());
        Self::for_payload(&payload)
    }
}

/// Every strategy failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionFailure {
    /// Overall category, used for messaging.
    pub kind: FailureKind,
    /// What could not be placed: the whole tree, or a page holding only
    /// the units no strategy placed.
    pub tree: ElementNode,
    /// Units placed before the cascade ran out of strategies.
    pub placed: usize,
    /// Per-strategy failures in cascade order.
    pub attempts: Vec<StrategyAttempt>,
    /// Manual recovery path.
    pub manual_export: ManualExport,
    /// States visited.
    #[serde(skip)]
    pub states: Vec<InjectorState>,
}

/// Tries strategies in priority order until one succeeds.
pub struct Injector {
    strategies: Vec<Box<dyn InjectionStrategy>>,
    config: InjectorConfig,
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("strategies", &self.strategy_names())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl Injector {
    /// Structured create, clipboard channel, direct view insertion.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(InjectorConfig::default())
    }

    /// Default cascade with custom timeouts.
    #[must_use]
    pub fn with_config(config: InjectorConfig) -> Self {
        Self::with_strategies(
            vec![
                Box::new(StructuredCreate),
                Box::new(ClipboardChannel),
                Box::new(DirectViewInsertion),
            ],
            config,
        )
    }

    /// Custom cascade.
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn InjectionStrategy>>, config: InjectorConfig) -> Self {
        Self { strategies, config }
    }

    /// Strategy names in cascade order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Replay `tree` into `runtime`.
    ///
    /// # Errors
    ///
    /// Returns an [`InjectionFailure`] carrying the unplaced part of the tree
    /// and a manual export when every strategy fails. The cascade is not
    /// retried.
    pub async fn inject(
        &self,
        tree: &ElementNode,
        runtime: &dyn TargetRuntime,
    ) -> Result<InjectionReport, Box<InjectionFailure>> {
        let mut states = vec![InjectorState::Idle, InjectorState::Probing];
        let ready = self.wait_until_ready(runtime).await;
        if !ready {
            warn!(
                "Target not ready after {}ms, attempting injection anyway",
                self.config.ready_timeout_ms
            );
        }

        let units = placements(tree);
        let progress = Progress::default();
        let mut attempts = Vec::new();
        for (index, strategy) in self.strategies.iter().enumerate() {
            let method = strategy.name();
            states.push(InjectorState::Strategy {
                index,
                method: method.to_string(),
            });
            let start = progress.placed().min(units.len());
            debug!(
                "Injection strategy {}/{}: {method} from unit {start} of {}",
                index + 1,
                self.strategies.len(),
                units.len()
            );

            let result = self
                .run_strategy(strategy.as_ref(), &units[start..], runtime, &progress)
                .await;
            let placed = progress.placed();
            let result = if !units.is_empty() && placed >= units.len() {
                Ok(())
            } else {
                result.and(Err(InjectionError::Unknown(format!(
                    "strategy placed {placed} of {} units",
                    units.len()
                ))))
            };
            match result {
                Ok(()) => {
                    states.push(InjectorState::Succeeded);
                    info!("Injected {} placements via {method}", units.len());
                    return Ok(InjectionReport {
                        success: true,
                        method: method.to_string(),
                        count: units.len(),
                        states,
                    });
                }
                Err(error) => {
                    if placed > start {
                        warn!(
                            "Injection strategy {method} failed after placing {} units: {error}",
                            placed - start
                        );
                    } else {
                        warn!("Injection strategy {method} failed: {error}");
                    }
                    attempts.push(StrategyAttempt {
                        method: method.to_string(),
                        kind: error.kind(),
                        message: error.to_string(),
                    });
                }
            }
        }

        states.push(InjectorState::ExhaustedFallback);
        let kind = classify(ready, &attempts);
        let placed = progress.placed().min(units.len());
        warn!(
            "All {} injection strategies failed ({kind}), {placed} of {} units placed",
            attempts.len(),
            units.len()
        );
        let remaining = unplaced(tree, placed);
        Err(Box::new(InjectionFailure {
            kind,
            manual_export: ManualExport::for_tree(&remaining),
            tree: remaining,
            placed,
            attempts,
            states,
        }))
    }

    async fn wait_until_ready(&self, runtime: &dyn TargetRuntime) -> bool {
        let deadline = Instant::now() + Duration::from_millis(self.config.ready_timeout_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            if runtime.is_ready().await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    async fn run_strategy(
        &self,
        strategy: &dyn InjectionStrategy,
        units: &[&ElementNode],
        runtime: &dyn TargetRuntime,
        progress: &Progress,
    ) -> Result<(), InjectionError> {
        let timeout_ms = self.config.strategy_timeout_ms;
        let guarded = AssertUnwindSafe(strategy.inject(units, runtime, progress)).catch_unwind();
        match tokio::time::timeout(Duration::from_millis(timeout_ms), guarded).await {
            Err(_) => Err(InjectionError::Timeout(timeout_ms)),
            Ok(Err(panic)) => Err(InjectionError::Unknown(format!(
                "strategy panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Ok(Ok(result)) => result,
        }
    }
}

/// The part of `tree` left after `placed` units landed.
fn unplaced(tree: &ElementNode, placed: usize) -> ElementNode {
    let mut rest = tree.clone();
    if placed > 0 && tree.element_kind() == ElementKind::Page {
        rest.children.drain(..placed.min(rest.children.len()));
    }
    rest
}

/// Not-ready wins when the target never came up; otherwise the first failure
/// that is more specific than a missing API.
fn classify(ready: bool, attempts: &[StrategyAttempt]) -> FailureKind {
    if !ready {
        return FailureKind::TargetNotReady;
    }
    attempts
        .iter()
        .map(|a| a.kind)
        .find(|k| *k != FailureKind::ApiUnavailable)
        .or_else(|| attempts.first().map(|a| a.kind))
        .unwrap_or(FailureKind::Unknown)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
