//! Hand the tree to the target's own paste channel.

use async_trait::async_trait;
use courier_core::ElementNode;
use tracing::debug;

use super::strategy::{InjectionStrategy, Progress};
use crate::error::InjectionError;
use crate::target::TargetRuntime;

/// Pushes each placement into the runtime's internal clipboard and runs its
/// native paste command, leaving placement to the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipboardChannel;

#[async_trait]
impl InjectionStrategy for ClipboardChannel {
    fn name(&self) -> &'static str {
        "clipboard-channel"
    }

    async fn inject(
        &self,
        units: &[&ElementNode],
        runtime: &dyn TargetRuntime,
        progress: &Progress,
    ) -> Result<(), InjectionError> {
        for node in units {
            debug!("Internal paste of {} {}", node.element_kind(), node.id);
            runtime.internal_paste(node).await?;
            progress.placed_one();
        }
        Ok(())
    }
}
