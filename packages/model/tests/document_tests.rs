//! Integration tests for the document model

use verso_model::serializer::{export_state, import_state, parse_json, to_json};
use verso_model::{
    EditorState, ElementKind, GridSelection, KeyGenerator, NodeKey, Point, RangeSelection, Schema,
    Selection,
};

const TABLE_DOCUMENT: &str = r#"{
    "root": { "type": "root", "children": [
        { "type": "table", "children": [
            { "type": "tablerow", "children": [
                { "type": "tablecell", "headerState": 1, "children": [
                    { "type": "paragraph", "children": [ { "type": "text", "text": "A1" } ] } ] },
                { "type": "tablecell", "headerState": 1, "children": [
                    { "type": "paragraph", "children": [ { "type": "text", "text": "B1" } ] } ] }
            ] },
            { "type": "tablerow", "children": [
                { "type": "tablecell", "children": [
                    { "type": "paragraph", "children": [ { "type": "text", "text": "A2" } ] } ] },
                { "type": "tablecell", "children": [
                    { "type": "paragraph", "children": [ { "type": "text", "text": "B2" } ] } ] }
            ] }
        ] }
    ] }
}"#;

fn child(state: &EditorState, key: &NodeKey, index: usize) -> NodeKey {
    state.node(key).unwrap().children()[index].clone()
}

#[test]
fn test_export_then_parse_preserves_structure() {
    let mut keys = KeyGenerator::new("tests");
    let state = parse_json(TABLE_DOCUMENT, &mut keys, &Schema::default()).unwrap();

    let json = to_json(&state).unwrap();
    let reparsed = parse_json(&json, &mut keys, &Schema::default()).unwrap();

    assert_eq!(
        export_state(&state, false).unwrap(),
        export_state(&reparsed, false).unwrap()
    );
    assert_eq!(reparsed.text_content(), "A1\n\nB1\n\nA2\n\nB2");
}

#[test]
fn test_header_cells_survive_import() {
    let mut keys = KeyGenerator::new("tests");
    let state = parse_json(TABLE_DOCUMENT, &mut keys, &Schema::default()).unwrap();
    let table = child(&state, &NodeKey::root(), 0);
    let first_row = child(&state, &table, 0);
    let cell = child(&state, &first_row, 0);

    assert_eq!(
        state.node(&cell).unwrap().element_kind(),
        Some(&ElementKind::TableCell {
            header: true,
            col_span: 1,
            row_span: 1
        })
    );
}

#[test]
fn test_grid_selection_text() {
    let mut keys = KeyGenerator::new("tests");
    let state = parse_json(TABLE_DOCUMENT, &mut keys, &Schema::default()).unwrap();
    let table = child(&state, &NodeKey::root(), 0);
    let a1 = child(&state, &child(&state, &table, 0), 0);
    let b2 = child(&state, &child(&state, &table, 1), 1);

    let grid = GridSelection::new(table, b2, a1);
    assert_eq!(grid.cell_keys(state.store()).unwrap().len(), 4);
    assert_eq!(grid.text_content(state.store()).unwrap(), "A1\tB1\nA2\tB2");

    let selected = state.with_selection(Some(Selection::Grid(grid)));
    assert!(selected.validate().is_ok());
}

#[test]
fn test_selection_is_exported_as_paths() {
    let mut keys = KeyGenerator::new("tests");
    let state = parse_json(TABLE_DOCUMENT, &mut keys, &Schema::default()).unwrap();
    let table = child(&state, &NodeKey::root(), 0);
    let cell = child(&state, &child(&state, &table, 1), 0);
    let paragraph = child(&state, &cell, 0);
    let text = child(&state, &paragraph, 0);

    let selection = RangeSelection::new(Point::text(text.clone(), 0), Point::text(text, 2));
    let state = state.with_selection(Some(Selection::Range(selection)));
    let exported = export_state(&state, true).unwrap();
    let path = &exported.selection.as_ref().unwrap().anchor.path;
    assert_eq!(path, &vec![0, 1, 0, 0, 0]);

    let reimported = import_state(&exported, &mut keys, &Schema::default()).unwrap();
    let range = reimported.selection().and_then(Selection::as_range).unwrap();
    assert_eq!(range.text_content(reimported.store()).unwrap(), "A2");
}
