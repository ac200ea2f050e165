//! # JSON Document Format
//!
//! ```json
//! {
//!   "root": {
//!     "type": "root", "version": 1, "format": "", "indent": 0, "direction": null,
//!     "children": [
//!       { "type": "paragraph", "version": 1, "format": "", "indent": 0, "direction": null,
//!         "children": [
//!           { "type": "text", "version": 1, "text": "Hello", "format": 1,
//!             "style": "", "mode": "normal", "detail": 0 }
//!         ] }
//!     ]
//!   }
//! }
//! ```
//!
//! Keys are not part of the format. Parsing assigns fresh keys from the
//! caller's [`KeyGenerator`], so the same document parsed twice yields two
//! disjoint key sets. An optional selection is stored as child-index paths.

use crate::error::{ModelError, ModelResult};
use crate::format::{Direction, ElementFormat, TextFormat, TextMode};
use crate::key::{KeyGenerator, NodeKey};
use crate::node::{DecoratorData, ElementData, ElementKind, Node, NodeKind, TextData};
use crate::selection::{Point, PointType, RangeSelection, Selection};
use crate::state::EditorState;
use crate::store::NodeStore;
use crate::traversal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default)]
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SerializedNode>>,

    /// Type specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPoint {
    /// Child indices from the root to the point's node
    pub path: Vec<usize>,
    pub offset: usize,
    #[serde(rename = "type")]
    pub point_type: PointType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSelection {
    pub anchor: SerializedPoint,
    pub focus: SerializedPoint,
    #[serde(default)]
    pub format: u32,
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEditorState {
    pub root: SerializedNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SerializedSelection>,
}

/// Node types accepted by the parser beyond the built-in ones
#[derive(Debug, Clone)]
pub struct Schema {
    pub decorator_types: BTreeSet<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            decorator_types: ["horizontalrule", "image"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Schema {
    pub fn with_decorator(mut self, decorator_type: impl Into<String>) -> Self {
        self.decorator_types.insert(decorator_type.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub fn export_node(store: &NodeStore, key: &NodeKey) -> ModelResult<SerializedNode> {
    let node = store.require(key)?;
    let children = match node.element() {
        Some(data) => Some(
            data.children
                .iter()
                .map(|child| export_node(store, child))
                .collect::<ModelResult<Vec<_>>>()?,
        ),
        None => None,
    };
    Ok(SerializedNode {
        node_type: node.type_name().to_string(),
        version: node.version,
        children,
        fields: node_fields(node),
    })
}

fn node_fields(node: &Node) -> Map<String, Value> {
    let mut fields = Map::new();
    match &node.kind {
        NodeKind::Root(data) => element_fields(data, &mut fields),
        NodeKind::Element(kind, data) => {
            element_fields(data, &mut fields);
            match kind {
                ElementKind::Heading { level } => {
                    fields.insert("tag".into(), json!(format!("h{level}")));
                }
                ElementKind::List { ordered, start } => {
                    fields.insert("listType".into(), json!(if *ordered { "number" } else { "bullet" }));
                    fields.insert("start".into(), json!(start));
                    fields.insert("tag".into(), json!(if *ordered { "ol" } else { "ul" }));
                }
                ElementKind::ListItem { value, checked } => {
                    fields.insert("value".into(), json!(value));
                    fields.insert("checked".into(), json!(checked));
                }
                ElementKind::TableCell {
                    header,
                    col_span,
                    row_span,
                } => {
                    fields.insert("headerState".into(), json!(u8::from(*header)));
                    fields.insert("colSpan".into(), json!(col_span));
                    fields.insert("rowSpan".into(), json!(row_span));
                }
                ElementKind::Link { url } => {
                    fields.insert("url".into(), json!(url));
                }
                ElementKind::Paragraph | ElementKind::Quote | ElementKind::Table | ElementKind::TableRow => {}
            }
        }
        NodeKind::Text(data) => {
            fields.insert("text".into(), json!(data.text));
            fields.insert("format".into(), json!(data.format.bits()));
            fields.insert("style".into(), json!(data.style));
            fields.insert("mode".into(), json!(data.mode));
            fields.insert("detail".into(), json!(0));
        }
        NodeKind::LineBreak => {}
        NodeKind::Decorator(data) => {
            fields.insert("payload".into(), data.payload.clone());
            fields.insert("inline".into(), json!(data.inline));
        }
    }
    fields
}

fn element_fields(data: &ElementData, fields: &mut Map<String, Value>) {
    fields.insert("format".into(), json!(data.format));
    fields.insert("indent".into(), json!(data.indent));
    fields.insert("direction".into(), json!(data.direction));
}

pub fn export_selection(store: &NodeStore, selection: &Selection) -> Option<SerializedSelection> {
    let range = selection.as_range()?;
    let point = |p: &Point| {
        traversal::path_to(store, &p.key).map(|path| SerializedPoint {
            path,
            offset: p.offset,
            point_type: p.point_type,
        })
    };
    Some(SerializedSelection {
        anchor: point(&range.anchor)?,
        focus: point(&range.focus)?,
        format: range.format.bits(),
        style: range.style.clone(),
    })
}

pub fn export_state(state: &EditorState, include_selection: bool) -> ModelResult<SerializedEditorState> {
    let root = export_node(state.store(), &NodeKey::root())?;
    let selection = if include_selection {
        state
            .selection()
            .and_then(|selection| export_selection(state.store(), selection))
    } else {
        None
    };
    Ok(SerializedEditorState { root, selection })
}

pub fn to_json(state: &EditorState) -> ModelResult<String> {
    Ok(serde_json::to_string(&export_state(state, false)?)?)
}

pub fn to_json_pretty(state: &EditorState) -> ModelResult<String> {
    Ok(serde_json::to_string_pretty(&export_state(state, false)?)?)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

pub fn parse_json(json: &str, keys: &mut KeyGenerator, schema: &Schema) -> ModelResult<EditorState> {
    let serialized: SerializedEditorState = serde_json::from_str(json)?;
    import_state(&serialized, keys, schema)
}

pub fn import_state(
    serialized: &SerializedEditorState,
    keys: &mut KeyGenerator,
    schema: &Schema,
) -> ModelResult<EditorState> {
    if serialized.root.node_type != "root" {
        return Err(ModelError::InvalidRoot(serialized.root.node_type.clone()));
    }

    let mut store = NodeStore::empty();
    let mut root = Node::root();
    root.version = serialized.root.version;
    if let NodeKind::Root(data) = &mut root.kind {
        read_element_fields(&serialized.root, data)?;
    }
    store.insert(root);
    import_children(&serialized.root, &NodeKey::root(), &mut store, keys, schema)?;

    let selection = match &serialized.selection {
        Some(selection) => Some(import_selection(&store, selection)?),
        None => None,
    };
    let state = EditorState::new(store, selection);
    state.validate()?;
    debug!(nodes = state.store().len(), "parsed editor state");
    Ok(state)
}

fn import_children(
    serialized: &SerializedNode,
    parent: &NodeKey,
    store: &mut NodeStore,
    keys: &mut KeyGenerator,
    schema: &Schema,
) -> ModelResult<()> {
    let mut child_keys = Vec::new();
    for child in serialized.children.iter().flatten() {
        let key = import_node(child, parent, store, keys, schema)?;
        child_keys.push(key);
    }
    if let Some(data) = store.get_mut(parent).and_then(|n| n.element_mut()) {
        data.children = child_keys;
    }
    Ok(())
}

fn import_node(
    serialized: &SerializedNode,
    parent: &NodeKey,
    store: &mut NodeStore,
    keys: &mut KeyGenerator,
    schema: &Schema,
) -> ModelResult<NodeKey> {
    let node_type = serialized.node_type.as_str();
    let kind = match node_type {
        "root" => return Err(ModelError::InvalidRoot(format!("nested {node_type}"))),
        "text" => NodeKind::Text(read_text(serialized)?),
        "linebreak" => NodeKind::LineBreak,
        _ if schema.decorator_types.contains(node_type) => NodeKind::Decorator(DecoratorData {
            decorator_type: node_type.to_string(),
            payload: serialized.fields.get("payload").cloned().unwrap_or(Value::Null),
            inline: field(serialized, "inline")?.unwrap_or(false),
        }),
        _ => {
            let mut data = ElementData::default();
            read_element_fields(serialized, &mut data)?;
            NodeKind::Element(read_element_kind(serialized)?, data)
        }
    };

    let is_element = matches!(kind, NodeKind::Element(..));
    if !is_element && serialized.children.is_some() {
        return Err(ModelError::invalid_field(node_type, "children"));
    }

    let key = keys.next_key();
    let mut node = Node::new(key.clone(), kind);
    node.parent = Some(parent.clone());
    node.version = serialized.version;
    store.insert(node);

    if is_element {
        import_children(serialized, &key, store, keys, schema)?;
    }
    Ok(key)
}

fn read_text(serialized: &SerializedNode) -> ModelResult<TextData> {
    let text: String = field(serialized, "text")?.ok_or_else(|| ModelError::invalid_field("text", "text"))?;
    let bits: u32 = field(serialized, "format")?.unwrap_or(0);
    let format = TextFormat::from_bits(bits).ok_or_else(|| ModelError::invalid_field("text", "format"))?;
    Ok(TextData {
        text,
        format,
        style: field(serialized, "style")?.unwrap_or_default(),
        mode: field::<TextMode>(serialized, "mode")?.unwrap_or_default(),
    })
}

fn read_element_fields(serialized: &SerializedNode, data: &mut ElementData) -> ModelResult<()> {
    data.format = field::<ElementFormat>(serialized, "format")?.unwrap_or_default();
    data.indent = field(serialized, "indent")?.unwrap_or(0);
    data.direction = field::<Direction>(serialized, "direction")?;
    Ok(())
}

fn read_element_kind(serialized: &SerializedNode) -> ModelResult<ElementKind> {
    let node_type = serialized.node_type.as_str();
    let kind = match node_type {
        "paragraph" => ElementKind::Paragraph,
        "heading" => {
            let tag: String = field(serialized, "tag")?.unwrap_or_else(|| "h1".to_string());
            let level = tag
                .strip_prefix('h')
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|level| (1..=6).contains(level))
                .ok_or_else(|| ModelError::invalid_field(node_type, "tag"))?;
            ElementKind::Heading { level }
        }
        "quote" => ElementKind::Quote,
        "list" => {
            let list_type: String = field(serialized, "listType")?.unwrap_or_else(|| "bullet".to_string());
            let ordered = match list_type.as_str() {
                "number" => true,
                "bullet" | "check" => false,
                _ => return Err(ModelError::invalid_field(node_type, "listType")),
            };
            ElementKind::List {
                ordered,
                start: field(serialized, "start")?.unwrap_or(1),
            }
        }
        "listitem" => ElementKind::ListItem {
            value: field(serialized, "value")?.unwrap_or(1),
            checked: field(serialized, "checked")?,
        },
        "table" => ElementKind::Table,
        "tablerow" => ElementKind::TableRow,
        "tablecell" => ElementKind::TableCell {
            header: field::<u32>(serialized, "headerState")?.unwrap_or(0) > 0,
            col_span: field(serialized, "colSpan")?.unwrap_or(1),
            row_span: field(serialized, "rowSpan")?.unwrap_or(1),
        },
        "link" => ElementKind::Link {
            url: field(serialized, "url")?.ok_or_else(|| ModelError::invalid_field(node_type, "url"))?,
        },
        other => return Err(ModelError::UnknownNodeType(other.to_string())),
    };
    Ok(kind)
}

fn import_selection(store: &NodeStore, serialized: &SerializedSelection) -> ModelResult<Selection> {
    let point = |p: &SerializedPoint| -> ModelResult<Point> {
        let node = traversal::node_at_path(store, &p.path)
            .ok_or_else(|| ModelError::Malformed(format!("selection path {:?} does not resolve", p.path)))?;
        Ok(Point {
            key: node.key.clone(),
            offset: p.offset,
            point_type: p.point_type,
        })
    };
    let mut range = RangeSelection::new(point(&serialized.anchor)?, point(&serialized.focus)?);
    range.format = TextFormat::from_bits_truncate(serialized.format);
    range.style = serialized.style.clone();
    Ok(Selection::Range(range))
}

/// Optional typed field; `null` reads as absent
fn field<T: DeserializeOwned>(serialized: &SerializedNode, name: &str) -> ModelResult<Option<T>> {
    match serialized.fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| ModelError::invalid_field(&serialized.node_type, name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "root": {
            "type": "root", "version": 3, "format": "", "indent": 0, "direction": "ltr",
            "children": [
                { "type": "heading", "version": 1, "tag": "h2", "format": "center", "indent": 0,
                  "direction": null,
                  "children": [ { "type": "text", "version": 1, "text": "Title", "format": 1 } ] },
                { "type": "paragraph", "version": 2,
                  "children": [
                    { "type": "text", "version": 1, "text": "a", "mode": "token" },
                    { "type": "linebreak", "version": 1 },
                    { "type": "link", "version": 1, "url": "https://example.com",
                      "children": [ { "type": "text", "version": 1, "text": "b" } ] }
                  ] }
            ]
        }
    }"#;

    #[test]
    fn test_parse_document() {
        let mut keys = KeyGenerator::from_seed("doc");
        let state = parse_json(DOCUMENT, &mut keys, &Schema::default()).unwrap();
        assert_eq!(state.text_content(), "Title\n\na\nb");

        let root = state.root().unwrap();
        assert_eq!(root.version, 3);
        assert_eq!(root.element().unwrap().direction, Some(Direction::Ltr));

        let heading = state.node(&root.children()[0]).unwrap();
        assert_eq!(heading.element_kind(), Some(&ElementKind::Heading { level: 2 }));
        assert_eq!(heading.element().unwrap().format, ElementFormat::Center);
        let title = state.node(&heading.children()[0]).unwrap();
        assert_eq!(title.text_data().unwrap().format, TextFormat::BOLD);
    }

    #[test]
    fn test_parse_assigns_fresh_keys() {
        let mut keys = KeyGenerator::from_seed("doc");
        let first = parse_json(DOCUMENT, &mut keys, &Schema::default()).unwrap();
        let second = parse_json(DOCUMENT, &mut keys, &Schema::default()).unwrap();
        let shared = first
            .store()
            .keys()
            .filter(|k| !k.is_root() && second.store().contains(k))
            .count();
        assert_eq!(shared, 0);
    }

    #[test]
    fn test_export_keeps_versions_and_fields() {
        let mut keys = KeyGenerator::from_seed("doc");
        let state = parse_json(DOCUMENT, &mut keys, &Schema::default()).unwrap();
        let exported = export_state(&state, false).unwrap();
        assert_eq!(exported.root.version, 3);

        let children = exported.root.children.as_ref().unwrap();
        assert_eq!(children[0].fields.get("tag"), Some(&json!("h2")));
        assert_eq!(children[1].version, 2);
        let link = &children[1].children.as_ref().unwrap()[2];
        assert_eq!(link.fields.get("url"), Some(&json!("https://example.com")));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = r#"{"root":{"type":"root","children":[{"type":"widget","children":[]}]}}"#;
        let err = parse_json(json, &mut KeyGenerator::default(), &Schema::default()).unwrap_err();
        assert_eq!(err, ModelError::UnknownNodeType("widget".to_string()));
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let json = r#"{"root":{"type":"paragraph","children":[]}}"#;
        let err = parse_json(json, &mut KeyGenerator::default(), &Schema::default()).unwrap_err();
        assert_eq!(err, ModelError::InvalidRoot("paragraph".to_string()));
    }

    #[test]
    fn test_text_without_text_field_is_rejected() {
        let json = r#"{"root":{"type":"root","children":[{"type":"paragraph","children":[{"type":"text"}]}]}}"#;
        let err = parse_json(json, &mut KeyGenerator::default(), &Schema::default()).unwrap_err();
        assert_eq!(err, ModelError::invalid_field("text", "text"));
    }

    #[test]
    fn test_registered_decorator() {
        let json = r#"{"root":{"type":"root","children":[
            {"type":"youtube","payload":{"id":"xyz"}}
        ]}}"#;
        let schema = Schema::default().with_decorator("youtube");
        let state = parse_json(json, &mut KeyGenerator::default(), &schema).unwrap();
        let video = state.node(&state.root().unwrap().children()[0]).unwrap();
        assert_eq!(video.decorator_data().unwrap().payload, json!({"id": "xyz"}));
    }

    #[test]
    fn test_selection_paths() {
        let json = r#"{"root":{"type":"root","children":[
            {"type":"paragraph","children":[{"type":"text","text":"hello"}]}
        ]},"selection":{"anchor":{"path":[0,0],"offset":1,"type":"text"},
                         "focus":{"path":[0,0],"offset":4,"type":"text"}}}"#;
        let state = parse_json(json, &mut KeyGenerator::default(), &Schema::default()).unwrap();
        let range = state.selection().and_then(Selection::as_range).unwrap();
        assert_eq!(range.text_content(state.store()).unwrap(), "ell");

        let exported = export_state(&state, true).unwrap();
        assert_eq!(exported.selection.unwrap().focus.path, vec![0, 0]);
    }
}
