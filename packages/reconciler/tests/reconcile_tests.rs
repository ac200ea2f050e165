//! Integration tests for the reconciler

use std::collections::{HashMap, HashSet};
use verso_model::{EditorState, Node, NodeKey, NodeStore, Point, RangeSelection, Selection};
use verso_reconciler::{
    export_html, DirtySets, DomPatch, HostDom, MemoryDom, ReconcileOutcome, Reconciler, Theme,
};

fn key(raw: &str) -> NodeKey {
    NodeKey::from(raw)
}

fn attach(store: &mut NodeStore, parent: &str, mut node: Node) {
    node.parent = Some(key(parent));
    let child = node.key.clone();
    store.insert(node);
    if let Some(data) = store.get_mut(&key(parent)).and_then(|n| n.element_mut()) {
        data.children.push(child);
    }
}

/// root ─ p1 ─ t1 "Hello"
///      ├ p2 ─ t2 "world"
///      └ p3 ─ t3 "!"
fn document() -> NodeStore {
    let mut store = NodeStore::new();
    for (p, t, text) in [("p1", "t1", "Hello"), ("p2", "t2", "world"), ("p3", "t3", "!")] {
        attach(&mut store, "root", Node::paragraph(key(p)));
        attach(&mut store, p, Node::text(key(t), text));
    }
    store
}

fn mounted(state: &EditorState) -> (Reconciler, MemoryDom) {
    let mut dom = MemoryDom::new();
    let mut reconciler = Reconciler::new(dom.root(), Theme::new());
    let outcome = reconciler.mount(state).unwrap();
    dom.apply_all(&outcome.patches).unwrap();
    dom.take_log();
    (reconciler, dom)
}

fn reconcile(
    reconciler: &mut Reconciler,
    dom: &mut MemoryDom,
    prev: &EditorState,
    next: &EditorState,
    leaves: &[&str],
    elements: &[(&str, bool)],
) -> ReconcileOutcome {
    let leaves: HashSet<NodeKey> = leaves.iter().map(|k| key(k)).collect();
    let elements: HashMap<NodeKey, bool> = elements.iter().map(|(k, own)| (key(k), *own)).collect();
    let outcome = reconciler
        .reconcile(prev, next, DirtySets::new(&leaves, &elements))
        .unwrap();
    dom.apply_all(&outcome.patches).unwrap();
    outcome
}

#[test]
fn test_mount_matches_export() {
    let state = EditorState::new(document(), None);
    let (reconciler, dom) = mounted(&state);
    assert_eq!(dom.inner_html(), export_html(&state, &Theme::new()).unwrap());
    assert_eq!(reconciler.mounted_count(), 6);
    assert!(dom.inner_html().starts_with(r#"<p><span data-verso-text="true">Hello</span></p>"#));
}

#[test]
fn test_text_change_is_a_single_patch() {
    let prev = EditorState::new(document(), None);
    let (mut reconciler, mut dom) = mounted(&prev);

    let mut store = prev.store().clone();
    if let Some(text) = store.get_mut(&key("t2")) {
        text.version += 1;
        if let Some(data) = text.text_data_mut() {
            data.text = "there".to_string();
        }
    }
    let next = EditorState::new(store, None);

    let outcome = reconcile(
        &mut reconciler,
        &mut dom,
        &prev,
        &next,
        &["t2"],
        &[("p2", false), ("root", false)],
    );
    assert_eq!(outcome.patches.len(), 1);
    assert!(matches!(&outcome.patches[0], DomPatch::SetText { text, .. } if text == "there"));
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.destroyed, 0);
    assert_eq!(dom.inner_html(), export_html(&next, &Theme::new()).unwrap());
}

#[test]
fn test_append_creates_one_node_at_the_end() {
    let prev = EditorState::new(document(), None);
    let (mut reconciler, mut dom) = mounted(&prev);

    let mut store = prev.store().clone();
    attach(&mut store, "p1", Node::line_break(key("br")));
    let next = EditorState::new(store, None);

    let outcome = reconcile(&mut reconciler, &mut dom, &prev, &next, &["br"], &[("p1", true), ("root", false)]);
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.destroyed, 0);

    let p1 = reconciler.dom_of(&key("p1")).unwrap();
    let br = reconciler.dom_of(&key("br")).unwrap();
    assert_eq!(dom.children(p1).last(), Some(&br));
    assert_eq!(dom.children(p1).len(), 2);
    assert_eq!(dom.tag(br), Some("br"));
}

#[test]
fn test_reorder_moves_instead_of_recreating() {
    let prev = EditorState::new(document(), None);
    let (mut reconciler, mut dom) = mounted(&prev);
    let p3_dom = reconciler.dom_of(&key("p3")).unwrap();

    let mut store = prev.store().clone();
    if let Some(data) = store.get_mut(&NodeKey::root()).and_then(|n| n.element_mut()) {
        data.children = vec![key("p3"), key("p1"), key("p2")];
    }
    let next = EditorState::new(store, None);

    let outcome = reconcile(&mut reconciler, &mut dom, &prev, &next, &[], &[("root", true)]);
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.destroyed, 0);
    assert_eq!(outcome.moved, 1);
    assert_eq!(reconciler.dom_of(&key("p3")), Some(p3_dom));
    assert_eq!(dom.children(dom.root())[0], p3_dom);
    assert_eq!(dom.inner_html(), export_html(&next, &Theme::new()).unwrap());
}

#[test]
fn test_removed_subtree_is_destroyed() {
    let prev = EditorState::new(document(), None);
    let (mut reconciler, mut dom) = mounted(&prev);

    let mut store = prev.store().clone();
    if let Some(data) = store.get_mut(&NodeKey::root()).and_then(|n| n.element_mut()) {
        data.children.retain(|k| k != &key("p2"));
    }
    store.remove(&key("p2"));
    store.remove(&key("t2"));
    let next = EditorState::new(store, None);

    let outcome = reconcile(&mut reconciler, &mut dom, &prev, &next, &[], &[("root", true)]);
    assert_eq!(outcome.destroyed, 2);
    assert_eq!(outcome.patches.len(), 1);
    assert_eq!(reconciler.dom_of(&key("t2")), None);
    assert_eq!(dom.children(dom.root()).len(), 2);
}

#[test]
fn test_selection_is_applied_after_patches() {
    let prev = EditorState::new(document(), None);
    let (mut reconciler, mut dom) = mounted(&prev);

    let selection = Selection::Range(RangeSelection::collapsed(Point::text(key("t1"), 3)));
    let next = prev.with_selection(Some(selection));
    let outcome = reconcile(&mut reconciler, &mut dom, &prev, &next, &[], &[]);

    let text_dom = reconciler.text_dom_of(&key("t1")).unwrap();
    assert!(matches!(outcome.patches.last(), Some(DomPatch::SetSelection { .. })));
    let (anchor, focus) = dom.selection().unwrap();
    assert_eq!(anchor.node, text_dom);
    assert_eq!(focus.offset, 3);
}
