//! Instantiate nodes through the target's command/model API.

use async_trait::async_trait;
use courier_core::{ElementKind, ElementNode};
use tracing::debug;

use super::strategy::{InjectionStrategy, Progress};
use crate::error::InjectionError;
use crate::target::{InsertionPoint, TargetRuntime};

/// Resolves an insertion point (selection, last container, document root)
/// and creates each placement there.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredCreate;

#[async_trait]
impl InjectionStrategy for StructuredCreate {
    fn name(&self) -> &'static str {
        "structured-create"
    }

    async fn inject(
        &self,
        units: &[&ElementNode],
        runtime: &dyn TargetRuntime,
        progress: &Progress,
    ) -> Result<(), InjectionError> {
        let point = runtime
            .insertion_point()
            .await
            .ok_or(InjectionError::NoInsertionPoint)?;
        debug!(
            "Structured create at {:?} {} ({})",
            point.source, point.handle.id, point.handle.kind
        );

        for node in units {
            runtime.create_node(&place_at(node, &point), &point).await?;
            progress.placed_one();
        }
        Ok(())
    }
}

/// Make `node` a valid child of the insertion point.
///
/// At the document root see [`place_at_root`]. Inside a section, widgets
/// and sections get a full-width column and a pasted section becomes inner.
/// Inside a column, a section becomes inner. Anything else is handed to the
/// host as it is.
#[must_use]
pub fn place_at(node: &ElementNode, point: &InsertionPoint) -> ElementNode {
    if point.is_root() {
        return place_at_root(node);
    }
    match (point.handle.kind, node.element_kind()) {
        (ElementKind::Section, ElementKind::Widget) => full_width_column().with_child(node.clone()),
        (ElementKind::Section, ElementKind::Section) => {
            full_width_column().with_child(node.clone().with_inner(true))
        }
        (ElementKind::Column, ElementKind::Section) => node.clone().with_inner(true),
        _ => node.clone(),
    }
}

/// Make a node valid as a top-level document child.
///
/// Widgets are wrapped in a section with one full-width column, columns in a
/// section. An inner section is promoted to a normal one. Sections and
/// containers are placed as they are.
#[must_use]
pub fn place_at_root(node: &ElementNode) -> ElementNode {
    match node.element_kind() {
        ElementKind::Widget => ElementNode::section()
            .with_child(full_width_column().with_child(node.clone())),
        ElementKind::Column => ElementNode::section().with_child(node.clone()),
        ElementKind::Section if node.is_inner => node.clone().with_inner(false),
        _ => node.clone(),
    }
}

fn full_width_column() -> ElementNode {
    ElementNode::column().with_setting("_column_size", 100)
}
