//! Cascading injector behaviour against mock runtimes and strategies.

mod common;

use std::time::Duration;

use common::{CreateBehavior, MockRuntime, Script, ScriptedStrategy};
use courier_core::{ClipboardPayload, ElementKind, ElementNode};
use courier_transport::{
    FailureKind, InjectionError, Injector, InjectorConfig, InjectorState,
};

fn fast_config() -> InjectorConfig {
    InjectorConfig {
        ready_timeout_ms: 30,
        poll_interval_ms: 5,
        strategy_timeout_ms: 200,
    }
}

fn heading() -> ElementNode {
    ElementNode::widget("heading")
        .with_id("w1")
        .with_setting("title", "Hello")
}

#[tokio::test]
async fn test_first_success_short_circuits() {
    let (first, first_calls) = ScriptedStrategy::new("first", Script::Place(1));
    let (second, second_calls) = ScriptedStrategy::new("second", Script::Place(1));
    let (third, third_calls) = ScriptedStrategy::new("third", Script::Place(1));
    let injector = Injector::with_strategies(vec![first, second, third], fast_config());

    let report = injector
        .inject(&heading(), &MockRuntime::accepting())
        .await
        .expect("inject");
    assert!(report.success);
    assert_eq!(report.method, "first");
    assert_eq!(MockRuntime::calls(&first_calls), 1);
    assert_eq!(MockRuntime::calls(&second_calls), 0);
    assert_eq!(MockRuntime::calls(&third_calls), 0);
    assert_eq!(report.states.last(), Some(&InjectorState::Succeeded));
}

#[tokio::test]
async fn test_default_cascade_short_circuits_on_structured_create() {
    let runtime = MockRuntime::accepting();
    let report = Injector::with_config(fast_config())
        .inject(&ElementNode::section().with_id("s1"), &runtime)
        .await
        .expect("inject");
    assert_eq!(report.method, "structured-create");
    assert_eq!(report.count, 1);
    assert_eq!(MockRuntime::calls(&runtime.create_calls), 1);
    assert_eq!(MockRuntime::calls(&runtime.internal_paste_calls), 0);
    assert_eq!(MockRuntime::calls(&runtime.view_calls), 0);
}

#[tokio::test]
async fn test_falls_through_to_clipboard_channel() {
    let runtime = MockRuntime {
        root: None,
        ..MockRuntime::accepting()
    };
    let report = Injector::with_config(fast_config())
        .inject(&heading(), &runtime)
        .await
        .expect("inject");
    assert_eq!(report.method, "clipboard-channel");
    assert_eq!(MockRuntime::calls(&runtime.create_calls), 0);
    assert_eq!(MockRuntime::calls(&runtime.internal_paste_calls), 1);
    assert_eq!(MockRuntime::calls(&runtime.view_calls), 0);
}

#[tokio::test]
async fn test_falls_through_to_direct_view() {
    let runtime = MockRuntime {
        create: CreateBehavior::Fail(InjectionError::Unknown("command bus rejected".into())),
        internal_paste_ok: false,
        ..MockRuntime::accepting()
    };
    let report = Injector::with_config(fast_config())
        .inject(&heading(), &runtime)
        .await
        .expect("inject");
    assert_eq!(report.method, "direct-view-insertion");
    assert_eq!(
        report.states,
        vec![
            InjectorState::Idle,
            InjectorState::Probing,
            InjectorState::Strategy {
                index: 0,
                method: "structured-create".into()
            },
            InjectorState::Strategy {
                index: 1,
                method: "clipboard-channel".into()
            },
            InjectorState::Strategy {
                index: 2,
                method: "direct-view-insertion".into()
            },
            InjectorState::Succeeded,
        ]
    );
}

#[tokio::test]
async fn test_panicking_strategy_is_contained() {
    let (broken, _) = ScriptedStrategy::new("broken", Script::Panic);
    let (working, working_calls) = ScriptedStrategy::new("working", Script::Place(1));
    let injector = Injector::with_strategies(vec![broken, working], fast_config());
    let report = injector
        .inject(&heading(), &MockRuntime::accepting())
        .await
        .expect("inject");
    assert_eq!(report.method, "working");
    assert_eq!(report.count, 1);
    assert_eq!(MockRuntime::calls(&working_calls), 1);
}

#[tokio::test]
async fn test_slow_strategy_times_out() {
    let (slow, _) = ScriptedStrategy::new("slow", Script::Sleep(Duration::from_secs(5)));
    let config = InjectorConfig {
        strategy_timeout_ms: 20,
        ..fast_config()
    };
    let failure = Injector::with_strategies(vec![slow], config)
        .inject(&heading(), &MockRuntime::accepting())
        .await
        .expect_err("should time out");
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.attempts[0].kind, FailureKind::Timeout);
}

#[tokio::test]
async fn test_zero_placements_is_failure() {
    let (empty, _) = ScriptedStrategy::new("empty", Script::Place(0));
    let failure = Injector::with_strategies(vec![empty], fast_config())
        .inject(&heading(), &MockRuntime::accepting())
        .await
        .expect_err("nothing placed");
    assert_eq!(failure.kind, FailureKind::Unknown);
}

#[tokio::test]
async fn test_exhausted_cascade_preserves_tree() {
    let runtime = MockRuntime::refusing();
    let tree = heading();
    let failure = Injector::with_config(fast_config())
        .inject(&tree, &runtime)
        .await
        .expect_err("every strategy fails");

    assert_eq!(failure.kind, FailureKind::NoInsertionPoint);
    assert_eq!(failure.attempts.len(), 3);
    assert_eq!(failure.tree, tree);
    assert_eq!(failure.placed, 0);
    assert_eq!(failure.states.last(), Some(&InjectorState::ExhaustedFallback));

    let exported = ClipboardPayload::decode(&failure.manual_export.json)
        .expect("decode")
        .expect("marked");
    assert_eq!(exported.data, tree);
}

#[tokio::test]
async fn test_not_ready_target_is_attempted_anyway() {
    let runtime = MockRuntime {
        ready: false,
        ..MockRuntime::accepting()
    };
    let report = Injector::with_config(fast_config())
        .inject(&heading(), &runtime)
        .await
        .expect("best effort succeeds");
    assert_eq!(report.method, "structured-create");
    assert!(MockRuntime::calls(&runtime.ready_probes) > 1);
}

#[tokio::test]
async fn test_not_ready_failure_is_classified() {
    let runtime = MockRuntime {
        ready: false,
        ..MockRuntime::refusing()
    };
    let failure = Injector::with_config(fast_config())
        .inject(&heading(), &runtime)
        .await
        .expect_err("fails");
    assert_eq!(failure.kind, FailureKind::TargetNotReady);
}

#[tokio::test]
async fn test_widget_wrapped_at_document_root() {
    let runtime = MockRuntime::accepting();
    Injector::with_config(fast_config())
        .inject(&heading(), &runtime)
        .await
        .expect("inject");
    let created = runtime.created.lock().expect("lock").clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].element_kind(), ElementKind::Section);
    assert_eq!(created[0].children[0].children[0], heading());
}

#[tokio::test]
async fn test_page_injects_children_individually() {
    let runtime = MockRuntime::accepting();
    let page = ElementNode::page()
        .with_child(ElementNode::section().with_id("a"))
        .with_child(ElementNode::section().with_id("b"));
    let report = Injector::with_config(fast_config())
        .inject(&page, &runtime)
        .await
        .expect("inject");
    assert_eq!(report.count, 2);
    assert_eq!(MockRuntime::calls(&runtime.create_calls), 2);
}

fn two_sections() -> ElementNode {
    ElementNode::page()
        .with_child(ElementNode::section().with_id("a"))
        .with_child(ElementNode::section().with_id("b"))
}

fn ids(nodes: &[ElementNode]) -> Vec<String> {
    nodes.iter().map(|n| n.id.as_str().to_string()).collect()
}

#[tokio::test]
async fn test_partial_placement_resumes_with_next_strategy() {
    let runtime = MockRuntime {
        create: CreateBehavior::FailAfter(1, InjectionError::Unknown("command bus rejected".into())),
        ..MockRuntime::accepting()
    };
    let report = Injector::with_config(fast_config())
        .inject(&two_sections(), &runtime)
        .await
        .expect("inject");
    assert_eq!(report.method, "clipboard-channel");
    assert_eq!(report.count, 2);
    assert_eq!(MockRuntime::calls(&runtime.create_calls), 2);
    assert_eq!(MockRuntime::calls(&runtime.internal_paste_calls), 1);
    let created = runtime.created.lock().expect("lock").clone();
    assert_eq!(ids(&created), vec!["a", "b"]);
}

#[tokio::test]
async fn test_partial_placement_exports_only_the_rest() {
    let runtime = MockRuntime {
        create: CreateBehavior::FailAfter(1, InjectionError::Unknown("command bus rejected".into())),
        internal_paste_ok: false,
        view_ok: false,
        ..MockRuntime::accepting()
    };
    let failure = Injector::with_config(fast_config())
        .inject(&two_sections(), &runtime)
        .await
        .expect_err("later strategies refuse");
    assert_eq!(failure.placed, 1);
    assert_eq!(failure.tree.element_kind(), ElementKind::Page);
    assert_eq!(ids(&failure.tree.children), vec!["b"]);
    assert_eq!(ids(&runtime.created.lock().expect("lock")), vec!["a"]);

    let exported = ClipboardPayload::decode(&failure.manual_export.json)
        .expect("decode")
        .expect("marked");
    assert_eq!(ids(&exported.data.children), vec!["b"]);
}

#[tokio::test]
async fn test_strategy_cut_off_by_timeout_keeps_its_progress() {
    let (slow, _) = ScriptedStrategy::new("slow", Script::Sleep(Duration::from_secs(5)));
    let (partial, _) = ScriptedStrategy::new("partial", Script::Place(1));
    let (rest, rest_calls) = ScriptedStrategy::new("rest", Script::Place(1));
    let config = InjectorConfig {
        strategy_timeout_ms: 20,
        ..fast_config()
    };
    let report = Injector::with_strategies(vec![slow, partial, rest], config)
        .inject(&two_sections(), &MockRuntime::accepting())
        .await
        .expect("inject");
    assert_eq!(report.method, "rest");
    assert_eq!(report.count, 2);
    assert_eq!(MockRuntime::calls(&rest_calls), 1);
}
