//! # Document Nodes
//!
//! A node is the atomic unit of document content. The set of variants is
//! closed: every call site matches on [`NodeKind`] exhaustively.
//!
//! ```text
//! Root ── Element(paragraph) ── Text "Hello"
//!      │                     └─ LineBreak
//!      └─ Decorator(image)
//! ```
//!
//! Nodes never own each other. Containers list their children by key and
//! each child points back at its parent by key; both directions resolve
//! through the store the node lives in.

use crate::format::{Direction, ElementFormat, TextFormat, TextMode};
use crate::key::NodeKey;
use serde_json::Value;

/// A versioned document node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key: NodeKey,

    /// Back-reference to the containing element (lookup only)
    pub parent: Option<NodeKey>,

    /// Bumped every time the node is cloned into a new transaction
    pub version: u64,

    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Singleton container at the top of every document
    Root(ElementData),

    /// Container node
    Element(ElementKind, ElementData),

    Text(TextData),

    LineBreak,

    /// Leaf whose content is rendered by the host
    Decorator(DecoratorData),
}

/// Concrete flavour of an element node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Paragraph,
    Heading { level: u8 },
    Quote,
    List { ordered: bool, start: u32 },
    ListItem { value: u32, checked: Option<bool> },
    Table,
    TableRow,
    TableCell { header: bool, col_span: u32, row_span: u32 },
    Link { url: String },
}

impl ElementKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Paragraph => "paragraph",
            ElementKind::Heading { .. } => "heading",
            ElementKind::Quote => "quote",
            ElementKind::List { .. } => "list",
            ElementKind::ListItem { .. } => "listitem",
            ElementKind::Table => "table",
            ElementKind::TableRow => "tablerow",
            ElementKind::TableCell { .. } => "tablecell",
            ElementKind::Link { .. } => "link",
        }
    }

    /// Inline elements live inside blocks alongside text
    pub fn is_inline(&self) -> bool {
        matches!(self, ElementKind::Link { .. })
    }

    /// Whether the element may remain in the tree without children
    pub fn can_be_empty(&self) -> bool {
        !matches!(self, ElementKind::List { .. } | ElementKind::Link { .. })
    }

    /// Selection never escapes these containers through deletion
    pub fn is_shadow_root(&self) -> bool {
        matches!(self, ElementKind::TableCell { .. })
    }

    /// Kind of block created when a paragraph break is inserted at its end
    pub fn kind_after_break(&self) -> ElementKind {
        match self {
            ElementKind::ListItem { value, .. } => ElementKind::ListItem {
                value: value.saturating_add(1),
                checked: None,
            },
            _ => ElementKind::Paragraph,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    /// Child keys in document order
    pub children: Vec<NodeKey>,
    pub format: ElementFormat,
    pub indent: u32,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextData {
    pub text: String,
    pub format: TextFormat,
    /// Inline CSS text
    pub style: String,
    pub mode: TextMode,
}

impl TextData {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Length in characters (the unit of text point offsets)
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Plain text that can merge with a neighbour of identical formatting
    pub fn is_simple(&self) -> bool {
        self.mode == TextMode::Normal
    }

    pub fn can_merge_with(&self, other: &TextData) -> bool {
        self.is_simple()
            && other.is_simple()
            && self.format == other.format
            && self.style == other.style
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoratorData {
    /// Registered decorator type (e.g. "image", "horizontalrule")
    pub decorator_type: String,
    /// Opaque payload handed to the host renderer
    pub payload: Value,
    pub inline: bool,
}

impl Node {
    pub fn new(key: NodeKey, kind: NodeKind) -> Self {
        Self {
            key,
            parent: None,
            version: 0,
            kind,
        }
    }

    pub fn root() -> Self {
        Self::new(NodeKey::root(), NodeKind::Root(ElementData::default()))
    }

    pub fn text(key: NodeKey, text: impl Into<String>) -> Self {
        Self::new(key, NodeKind::Text(TextData::new(text)))
    }

    pub fn new_element(key: NodeKey, kind: ElementKind) -> Self {
        Self::new(key, NodeKind::Element(kind, ElementData::default()))
    }

    pub fn paragraph(key: NodeKey) -> Self {
        Self::new_element(key, ElementKind::Paragraph)
    }

    pub fn line_break(key: NodeKey) -> Self {
        Self::new(key, NodeKind::LineBreak)
    }

    pub fn decorator(key: NodeKey, decorator_type: impl Into<String>, payload: Value, inline: bool) -> Self {
        Self::new(
            key,
            NodeKind::Decorator(DecoratorData {
                decorator_type: decorator_type.into(),
                payload,
                inline,
            }),
        )
    }

    /// Type tag used for transforms, mutation listeners and serialization
    pub fn type_name(&self) -> &str {
        match &self.kind {
            NodeKind::Root(_) => "root",
            NodeKind::Element(kind, _) => kind.type_name(),
            NodeKind::Text(_) => "text",
            NodeKind::LineBreak => "linebreak",
            NodeKind::Decorator(data) => &data.decorator_type,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root(_))
    }

    /// Container capability (root included)
    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Root(_) | NodeKind::Element(..))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self.kind, NodeKind::LineBreak)
    }

    pub fn is_decorator(&self) -> bool {
        matches!(self.kind, NodeKind::Decorator(_))
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_element()
    }

    /// Inline content: text, line breaks, inline decorators, inline elements
    pub fn is_inline(&self) -> bool {
        match &self.kind {
            NodeKind::Root(_) => false,
            NodeKind::Element(kind, _) => kind.is_inline(),
            NodeKind::Text(_) | NodeKind::LineBreak => true,
            NodeKind::Decorator(data) => data.inline,
        }
    }

    /// Non-inline element (paragraph, heading, list item, ...)
    pub fn is_block_element(&self) -> bool {
        matches!(&self.kind, NodeKind::Element(kind, _) if !kind.is_inline())
    }

    pub fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Root(data) | NodeKind::Element(_, data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Root(data) | NodeKind::Element(_, data) => Some(data),
            _ => None,
        }
    }

    pub fn element_kind(&self) -> Option<&ElementKind> {
        match &self.kind {
            NodeKind::Element(kind, _) => Some(kind),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<&TextData> {
        match &self.kind {
            NodeKind::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn text_data_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.kind {
            NodeKind::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn decorator_data(&self) -> Option<&DecoratorData> {
        match &self.kind {
            NodeKind::Decorator(data) => Some(data),
            _ => None,
        }
    }

    /// Child keys (empty for leaves)
    pub fn children(&self) -> &[NodeKey] {
        self.element().map(|data| data.children.as_slice()).unwrap_or(&[])
    }

    pub fn can_be_empty(&self) -> bool {
        match &self.kind {
            NodeKind::Element(kind, _) => kind.can_be_empty(),
            _ => true,
        }
    }

    /// Length of the node as seen by selection offsets: characters for text,
    /// child count for elements, zero for other leaves
    pub fn offset_size(&self) -> usize {
        match &self.kind {
            NodeKind::Text(data) => data.len(),
            NodeKind::Root(data) | NodeKind::Element(_, data) => data.children.len(),
            NodeKind::LineBreak | NodeKind::Decorator(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Node::root().type_name(), "root");
        assert_eq!(Node::paragraph(NodeKey::from("p")).type_name(), "paragraph");
        assert_eq!(Node::text(NodeKey::from("t"), "hi").type_name(), "text");
        let image = Node::decorator(NodeKey::from("d"), "image", Value::Null, false);
        assert_eq!(image.type_name(), "image");
    }

    #[test]
    fn test_inline_classification() {
        let link = Node::new_element(
            NodeKey::from("a"),
            ElementKind::Link {
                url: "https://example.com".to_string(),
            },
        );
        assert!(link.is_inline());
        assert!(link.is_element());
        assert!(!link.is_block_element());
        assert!(!link.can_be_empty());

        let paragraph = Node::paragraph(NodeKey::from("p"));
        assert!(paragraph.is_block_element());
        assert!(paragraph.can_be_empty());
    }

    #[test]
    fn test_text_length_counts_characters() {
        let data = TextData::new("héllo");
        assert_eq!(data.len(), 5);
        assert!(data.is_simple());
    }

    #[test]
    fn test_list_item_break_kind() {
        let item = ElementKind::ListItem {
            value: 2,
            checked: Some(true),
        };
        assert_eq!(
            item.kind_after_break(),
            ElementKind::ListItem {
                value: 3,
                checked: None
            }
        );
        assert_eq!(ElementKind::Quote.kind_after_break(), ElementKind::Paragraph);
    }

    #[test]
    fn test_list_item_break_at_max_value() {
        let item = ElementKind::ListItem {
            value: u32::MAX,
            checked: None,
        };
        assert_eq!(
            item.kind_after_break(),
            ElementKind::ListItem {
                value: u32::MAX,
                checked: None
            }
        );
    }

    #[test]
    fn test_element_constructor_and_accessor() {
        let node = Node::new_element(NodeKey::from("quote"), ElementKind::Quote);
        assert_eq!(node.element_kind(), Some(&ElementKind::Quote));
        assert!(node.element().is_some_and(|data| data.children.is_empty()));
        assert!(Node::paragraph(NodeKey::from("p")).element().is_some());
        assert!(Node::line_break(NodeKey::from("br")).element().is_none());
    }
}
