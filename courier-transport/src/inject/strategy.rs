//! The strategy seam of the cascade.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use courier_core::ElementNode;

use crate::error::InjectionError;
use crate::target::TargetRuntime;

/// One way of replaying placement units into a target runtime.
///
/// A strategy receives only the units no earlier strategy managed to place
/// and must call [`Progress::placed_one`] after each one lands, so a
/// strategy that fails halfway never causes the next one to place the same
/// units again. New strategies plug into
/// [`Injector::with_strategies`](super::Injector::with_strategies) without
/// touching the cascade.
#[async_trait]
pub trait InjectionStrategy: Send + Sync {
    /// Method name reported on success, e.g. `structured-create`.
    fn name(&self) -> &'static str;

    /// Place `units` in order into `runtime`.
    async fn inject(
        &self,
        units: &[&ElementNode],
        runtime: &dyn TargetRuntime,
        progress: &Progress,
    ) -> Result<(), InjectionError>;
}

/// Units placed so far in one cascade run.
///
/// Owned by the cascade, so the count survives a strategy that errors,
/// panics or is cut off by its timeout.
#[derive(Debug, Default)]
pub struct Progress(AtomicUsize);

impl Progress {
    /// Record one placed unit.
    pub fn placed_one(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Units placed so far.
    #[must_use]
    pub fn placed(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Top-level units of a tree: a page contributes its children, anything
/// else is placed whole.
pub(crate) fn placements(tree: &ElementNode) -> Vec<&ElementNode> {
    match tree.element_kind() {
        courier_core::ElementKind::Page => tree.children.iter().collect(),
        _ => vec![tree],
    }
}
