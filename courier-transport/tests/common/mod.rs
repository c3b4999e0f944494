//! Mock collaborators with call counters.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{ElementKind, ElementNode, NoticeLevel};
use courier_transport::{
    ClipboardError, HostClipboard, InjectionError, InjectionStrategy, InsertionPoint,
    NoticeAction, NotificationSink, Progress, TargetHandle, TargetRuntime,
};

/// Clipboard that always accepts.
#[derive(Default)]
pub struct MemoryClipboard {
    pub text: Mutex<Option<String>>,
    pub writes: AtomicUsize,
}

impl MemoryClipboard {
    pub fn holding(text: &str) -> Self {
        let clipboard = Self::default();
        *clipboard.text.lock().expect("lock") = Some(text.to_string());
        clipboard
    }
}

#[async_trait]
impl HostClipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        *self.text.lock().expect("lock") = Some(text.to_string());
        Ok(())
    }

    async fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        Ok(self.text.lock().expect("lock").clone())
    }

    async fn acquire_focus(&self) -> bool {
        true
    }
}

/// How [`MockRuntime::create_node`] behaves.
#[derive(Clone)]
pub enum CreateBehavior {
    Succeed,
    Fail(InjectionError),
    /// Accept this many creates, then fail.
    FailAfter(usize, InjectionError),
}

/// Target runtime recording every call.
pub struct MockRuntime {
    pub ready: bool,
    pub root: Option<TargetHandle>,
    pub create: CreateBehavior,
    pub internal_paste_ok: bool,
    pub view_ok: bool,
    pub ready_probes: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub internal_paste_calls: AtomicUsize,
    pub view_calls: AtomicUsize,
    pub created: Mutex<Vec<ElementNode>>,
}

impl MockRuntime {
    /// Ready, with a document root, accepting everything.
    pub fn accepting() -> Self {
        Self {
            ready: true,
            root: Some(TargetHandle::new("document", ElementKind::Page)),
            create: CreateBehavior::Succeed,
            internal_paste_ok: true,
            view_ok: true,
            ready_probes: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            internal_paste_calls: AtomicUsize::new(0),
            view_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Ready, but every operation fails.
    pub fn refusing() -> Self {
        Self {
            root: None,
            internal_paste_ok: false,
            view_ok: false,
            ..Self::accepting()
        }
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TargetRuntime for MockRuntime {
    async fn is_ready(&self) -> bool {
        self.ready_probes.fetch_add(1, Ordering::Relaxed);
        self.ready
    }

    async fn document_root(&self) -> Option<TargetHandle> {
        self.root.clone()
    }

    async fn create_node(&self, tree: &ElementNode, _at: &InsertionPoint) -> Result<(), InjectionError> {
        let call = self.create_calls.fetch_add(1, Ordering::Relaxed);
        match &self.create {
            CreateBehavior::Fail(e) => Err(e.clone()),
            CreateBehavior::FailAfter(accepted, e) if call >= *accepted => Err(e.clone()),
            _ => {
                self.created.lock().expect("lock").push(tree.clone());
                Ok(())
            }
        }
    }

    async fn internal_paste(&self, tree: &ElementNode) -> Result<(), InjectionError> {
        self.internal_paste_calls.fetch_add(1, Ordering::Relaxed);
        if self.internal_paste_ok {
            self.created.lock().expect("lock").push(tree.clone());
            Ok(())
        } else {
            Err(InjectionError::ApiUnavailable("no internal clipboard".into()))
        }
    }

    async fn append_to_view(&self, tree: &ElementNode) -> Result<(), InjectionError> {
        self.view_calls.fetch_add(1, Ordering::Relaxed);
        if self.view_ok {
            self.created.lock().expect("lock").push(tree.clone());
            Ok(())
        } else {
            Err(InjectionError::ApiUnavailable("no view collection".into()))
        }
    }
}

/// Scripted strategy.
pub enum Script {
    /// Record this many placements and succeed.
    Place(usize),
    Fail(InjectionError),
    Panic,
    /// Sleep, then place every unit.
    Sleep(Duration),
}

pub struct ScriptedStrategy {
    pub name: &'static str,
    pub script: Script,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub fn new(name: &'static str, script: Script) -> (Box<dyn InjectionStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = Self {
            name,
            script,
            calls: calls.clone(),
        };
        (Box::new(strategy), calls)
    }
}

#[async_trait]
impl InjectionStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn inject(
        &self,
        units: &[&ElementNode],
        _runtime: &dyn TargetRuntime,
        progress: &Progress,
    ) -> Result<(), InjectionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.script {
            Script::Place(n) => {
                (0..*n).for_each(|_| progress.placed_one());
                Ok(())
            }
            Script::Fail(e) => Err(e.clone()),
            Script::Panic => panic!("strategy blew up"),
            Script::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                units.iter().for_each(|_| progress.placed_one());
                Ok(())
            }
        }
    }
}

/// Sink recording every notice shown.
#[derive(Default)]
pub struct RecordingSink {
    pub shown: Mutex<Vec<(NoticeLevel, String, Vec<NoticeAction>)>>,
}

impl RecordingSink {
    pub fn levels(&self) -> Vec<NoticeLevel> {
        self.shown
            .lock()
            .expect("lock")
            .iter()
            .map(|(level, _, _)| *level)
            .collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, title, _)| title.clone())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn show(&self, level: NoticeLevel, title: &str, _message: &str, actions: &[NoticeAction]) {
        self.shown
            .lock()
            .expect("lock")
            .push((level, title.to_string(), actions.to_vec()));
    }
}
