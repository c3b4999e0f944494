//! Append straight to the target's view collection.

use async_trait::async_trait;
use courier_core::ElementNode;

use super::strategy::{InjectionStrategy, Progress};
use crate::error::InjectionError;
use crate::target::TargetRuntime;

/// Bypasses the command layer. Last resort before manual export: the host
/// sees the nodes rendered but its undo history does not.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectViewInsertion;

#[async_trait]
impl InjectionStrategy for DirectViewInsertion {
    fn name(&self) -> &'static str {
        "direct-view-insertion"
    }

    async fn inject(
        &self,
        units: &[&ElementNode],
        runtime: &dyn TargetRuntime,
        progress: &Progress,
    ) -> Result<(), InjectionError> {
        for node in units {
            runtime.append_to_view(node).await?;
            progress.placed_one();
        }
        Ok(())
    }
}
