//! Copy-side pipeline through the pure stages: extract, encode, decode,
//! sanitize, convert.

use courier_core::{
    ClipboardPayload, ElementKind, ElementNode, Extractor, MigrationRule, PayloadMetadata,
    RuleSet, Sanitizer, VersionResolver,
};
use serde_json::json;

/// The builder model of a section with one column holding one heading.
fn builder_model() -> serde_json::Value {
    json!({
        "id": "s1",
        "elType": "section",
        "settings": {},
        "elements": [{
            "id": "c1",
            "elType": "column",
            "settings": {},
            "elements": [{
                "id": "w1",
                "elType": "widget",
                "widgetType": "heading",
                "settings": {"title": "Hello"},
                "elements": []
            }]
        }]
    })
}

#[test]
fn test_end_to_end_copy_side() {
    let extraction = Extractor::new().extract(&builder_model()).expect("extract");
    let tree = extraction.tree.clone();
    assert_eq!(tree.node_count(), 3);
    assert_eq!(tree.element_kind(), ElementKind::Section);

    let text = extraction
        .into_payload(PayloadMetadata::now("https://source.example", "3.5.0"))
        .encode()
        .expect("encode");
    let decoded = ClipboardPayload::decode(&text)
        .expect("decode")
        .expect("marked payload");
    assert_eq!(decoded.data, tree);
    assert_eq!(decoded.element_kind, ElementKind::Section);

    let sanitized = Sanitizer::new().sanitize_with_report(&decoded.data);
    assert_eq!(sanitized.tree, tree);
    assert!(sanitized.report.is_clean());

    let converted = VersionResolver::new().convert(
        &sanitized.tree,
        &decoded.metadata.source_builder_version,
        "3.9.2",
    );
    assert_eq!(converted.rules_applied, 0);
    assert_eq!(converted.tree, tree);
}

#[test]
fn test_marker_discrimination() {
    assert!(ClipboardPayload::decode("plain text").expect("ok").is_none());
    assert!(ClipboardPayload::decode(r#"{"data": {"elType": "section"}}"#)
        .expect("ok")
        .is_none());
    assert!(ClipboardPayload::decode(
        r#"{"marker": {"source": "someone-else"}, "data": {"elType": "section"}}"#
    )
    .expect("ok")
    .is_none());
    // the builder's own clipboard format is not ours either
    assert!(ClipboardPayload::decode(r#"{"type": "elementor", "elements": []}"#)
        .expect("ok")
        .is_none());

    let ours = ClipboardPayload::new(ElementNode::section(), vec![], PayloadMetadata::default())
        .encode()
        .expect("encode");
    assert!(ClipboardPayload::decode(&ours).expect("ok").is_some());
}

#[test]
fn test_sanitizer_removes_script_and_encoded_javascript() {
    let tree = ElementNode::section().with_id("s").with_child(
        ElementNode::column().with_id("c").with_child(
            ElementNode::widget("button")
                .with_id("b")
                .with_setting("text", "Go<script>steal()</script>")
                .with_setting(
                    "link",
                    json!({"url": "%6A%61%76%61%73%63%72%69%70%74:alert(document.cookie)"}),
                ),
        ),
    );
    let out = Sanitizer::new().sanitize(&tree);
    let text = serde_json::to_string(&out).expect("serialize");
    assert!(!text.to_lowercase().contains("<script"));
    let button = out.find("b").expect("button");
    assert_eq!(button.settings["text"], "Go");
    assert_eq!(button.settings["link"]["url"], "");
}

#[test]
fn test_same_family_conversion_is_noop() {
    let tree = ElementNode::widget("icon").with_setting("icon", "fa fa-star");
    let result = VersionResolver::new().convert(&tree, "3.5.0", "3.9.2");
    assert_eq!(result.rules_applied, 0);
    assert_eq!(result.tree, tree);
}

#[test]
fn test_widget_rename_across_families() {
    let rules =
        RuleSet::new().with_rule("2.x_to_3.x", MigrationRule::widget_rename("image-box", "icon-box"));
    let tree = ElementNode::widget("image-box");
    let result = VersionResolver::new()
        .with_rules(rules)
        .convert(&tree, "2.4.0", "3.1.0");
    assert_eq!(result.tree.widget_type(), Some("icon-box"));
    assert_eq!(result.rules_applied, 1);
    assert_eq!(tree.widget_type(), Some("image-box"));
}

#[test]
fn test_rendered_content_survives_round_trip() {
    let model = json!({
        "id": "w9",
        "elType": "widget",
        "widgetType": "heading",
        "settings": "{not json",
        "renderedHtml": "<h2>Fallback</h2>"
    });
    let extraction = Extractor::new().extract(&model).expect("extract");
    assert_eq!(extraction.rendered_content["w9"]["title"], "Fallback");
    let text = extraction
        .into_payload(PayloadMetadata::default())
        .encode()
        .expect("encode");
    let decoded = ClipboardPayload::decode(&text)
        .expect("decode")
        .expect("payload");
    assert_eq!(decoded.rendered_content["w9"]["header_size"], "h2");
}
