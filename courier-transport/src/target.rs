//! The target runtime capability the injector replays trees into.

use async_trait::async_trait;
use courier_core::{ElementKind, ElementNode};
use serde::{Deserialize, Serialize};

use crate::error::InjectionError;

/// Opaque reference to a node in the target document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetHandle {
    /// Target-side identifier.
    pub id: String,
    /// Kind of the referenced node.
    pub kind: ElementKind,
}

impl TargetHandle {
    /// Create a handle.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// How an insertion point was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertionSource {
    /// The user's current selection.
    Selection,
    /// The last container the user worked in.
    LastContainer,
    /// The top of the document.
    DocumentRoot,
}

/// Where new nodes go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionPoint {
    /// Parent node.
    pub handle: TargetHandle,
    /// How it was resolved.
    pub source: InsertionSource,
}

impl InsertionPoint {
    /// Whether new nodes land at the top level of the document.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.source == InsertionSource::DocumentRoot || self.handle.kind == ElementKind::Page
    }
}

/// The host application on the paste side.
///
/// Only readiness, insertion-point lookup and structured creation are
/// required. The clipboard-channel and direct-view operations default to
/// [`InjectionError::ApiUnavailable`] so the injector moves on to the next
/// strategy.
#[async_trait]
pub trait TargetRuntime: Send + Sync {
    /// Whether the runtime has finished loading.
    async fn is_ready(&self) -> bool;

    /// Container holding the current selection.
    async fn selected_container(&self) -> Option<TargetHandle> {
        None
    }

    /// Last container the user interacted with.
    async fn last_container(&self) -> Option<TargetHandle> {
        None
    }

    /// Document root.
    async fn document_root(&self) -> Option<TargetHandle> {
        None
    }

    /// Resolve where to insert: selection, then last container, then the
    /// document root.
    async fn insertion_point(&self) -> Option<InsertionPoint> {
        if let Some(handle) = self.selected_container().await {
            return Some(InsertionPoint {
                handle,
                source: InsertionSource::Selection,
            });
        }
        if let Some(handle) = self.last_container().await {
            return Some(InsertionPoint {
                handle,
                source: InsertionSource::LastContainer,
            });
        }
        self.document_root().await.map(|handle| InsertionPoint {
            handle,
            source: InsertionSource::DocumentRoot,
        })
    }

    /// Instantiate `tree` under `at` through the command/model API.
    async fn create_node(
        &self,
        tree: &ElementNode,
        at: &InsertionPoint,
    ) -> Result<(), InjectionError>;

    /// Push `tree` into the runtime's own clipboard and run its paste
    /// command.
    async fn internal_paste(&self, _tree: &ElementNode) -> Result<(), InjectionError> {
        Err(InjectionError::ApiUnavailable("internal paste channel".into()))
    }

    /// Append `tree` straight to the rendering view collection.
    async fn append_to_view(&self, _tree: &ElementNode) -> Result<(), InjectionError> {
        Err(InjectionError::ApiUnavailable("view collection".into()))
    }
}
