//! # Node Rendering
//!
//! Maps each node variant to the host element that represents it. The same
//! shapes drive both the incremental reconciler and the one-shot HTML
//! export, so a mounted DOM and an exported document always agree.
//!
//! ```text
//! paragraph        → <p>
//! heading{n}       → <h1>..<h6>
//! quote            → <blockquote>
//! list             → <ul> / <ol start>
//! listitem         → <li value>
//! table/row/cell   → <table> / <tr> / <td> | <th>
//! link             → <a href>
//! text             → <span> | <strong> | <em> | <code> ... wrapping a text node
//! linebreak        → <br>
//! decorator        → <span> | <div> host element, content owned by the host
//! ```

use crate::vdom::HostNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use verso_model::{
    ElementData, ElementKind, EditorState, ModelResult, Node, NodeKey, NodeKind, NodeStore, TextData,
    TextFormat, TextFormatType,
};

pub const TEXT_MARKER: &str = "data-verso-text";
pub const DECORATOR_MARKER: &str = "data-verso-decorator";

/// Class names per theme slot ("paragraph", "h1", "quote", "ul", "ol",
/// "listitem", "link", "table", "tablecell", "tablecellheader", "bold",
/// "italic", ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Theme {
    classes: BTreeMap<String, String>,
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, slot: impl Into<String>, class: impl Into<String>) -> Self {
        self.classes.insert(slot.into(), class.into());
        self
    }

    pub fn class_for(&self, slot: &str) -> Option<&str> {
        self.classes.get(slot).map(String::as_str)
    }
}

/// Tag and attributes of the host element for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostShape {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

impl HostShape {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    fn attr(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }
}

/// Host element for a node. The root has none: it is mounted into the
/// host's container.
pub fn host_shape(node: &Node, theme: &Theme) -> Option<HostShape> {
    match &node.kind {
        NodeKind::Root(_) => None,
        NodeKind::Element(kind, data) => Some(element_shape(kind, data, theme)),
        NodeKind::Text(data) => Some(text_shape(data, theme)),
        NodeKind::LineBreak => Some(HostShape::new("br")),
        NodeKind::Decorator(data) => {
            let mut shape = HostShape::new(if data.inline { "span" } else { "div" });
            shape.attr(DECORATOR_MARKER, data.decorator_type.clone());
            shape.attr("contenteditable", "false");
            if let Some(class) = theme.class_for(&data.decorator_type) {
                shape.attr("class", class);
            }
            Some(shape)
        }
    }
}

fn element_shape(kind: &ElementKind, data: &ElementData, theme: &Theme) -> HostShape {
    let (tag, slot) = match kind {
        ElementKind::Paragraph => ("p".to_string(), "paragraph".to_string()),
        ElementKind::Heading { level } => {
            let tag = format!("h{}", (*level).clamp(1, 6));
            (tag.clone(), tag)
        }
        ElementKind::Quote => ("blockquote".to_string(), "quote".to_string()),
        ElementKind::List { ordered: true, .. } => ("ol".to_string(), "ol".to_string()),
        ElementKind::List { ordered: false, .. } => ("ul".to_string(), "ul".to_string()),
        ElementKind::ListItem { .. } => ("li".to_string(), "listitem".to_string()),
        ElementKind::Table => ("table".to_string(), "table".to_string()),
        ElementKind::TableRow => ("tr".to_string(), "tablerow".to_string()),
        ElementKind::TableCell { header: true, .. } => ("th".to_string(), "tablecellheader".to_string()),
        ElementKind::TableCell { header: false, .. } => ("td".to_string(), "tablecell".to_string()),
        ElementKind::Link { .. } => ("a".to_string(), "link".to_string()),
    };

    let mut shape = HostShape::new(&tag);
    if let Some(class) = theme.class_for(&slot) {
        shape.attr("class", class);
    }

    match kind {
        ElementKind::List {
            ordered: true,
            start,
        } if *start != 1 => shape.attr("start", start.to_string()),
        ElementKind::ListItem { value, checked } => {
            shape.attr("value", value.to_string());
            if let Some(checked) = checked {
                shape.attr("aria-checked", checked.to_string());
            }
        }
        ElementKind::TableCell {
            col_span, row_span, ..
        } => {
            if *col_span > 1 {
                shape.attr("colspan", col_span.to_string());
            }
            if *row_span > 1 {
                shape.attr("rowspan", row_span.to_string());
            }
        }
        ElementKind::Link { url } => shape.attr("href", url.clone()),
        _ => {}
    }

    let mut style = String::new();
    if let Some(align) = data.format.css_value() {
        style.push_str(&format!("text-align: {align};"));
    }
    if data.indent > 0 {
        if !style.is_empty() {
            style.push(' ');
        }
        style.push_str(&format!("padding-inline-start: {}px;", data.indent * 40));
    }
    if !style.is_empty() {
        shape.attr("style", style);
    }
    if let Some(direction) = data.direction {
        shape.attr("dir", direction.as_str());
    }
    shape
}

/// Outer tag chosen by the most significant format
pub fn text_tag(format: TextFormat) -> &'static str {
    if format.has(TextFormatType::Code) {
        "code"
    } else if format.has(TextFormatType::Highlight) {
        "mark"
    } else if format.has(TextFormatType::Subscript) {
        "sub"
    } else if format.has(TextFormatType::Superscript) {
        "sup"
    } else if format.has(TextFormatType::Bold) {
        "strong"
    } else if format.has(TextFormatType::Italic) {
        "em"
    } else {
        "span"
    }
}

fn text_shape(data: &TextData, theme: &Theme) -> HostShape {
    let mut shape = HostShape::new(text_tag(data.format));
    shape.attr(TEXT_MARKER, "true");

    let classes: Vec<&str> = data
        .format
        .names()
        .into_iter()
        .filter_map(|name| theme.class_for(name))
        .collect();
    if !classes.is_empty() {
        shape.attr("class", classes.join(" "));
    }

    let mut style = data.style.trim().to_string();
    let mut decorations = Vec::new();
    if data.format.has(TextFormatType::Underline) {
        decorations.push("underline");
    }
    if data.format.has(TextFormatType::Strikethrough) {
        decorations.push("line-through");
    }
    // Formats not carried by the outer tag
    let tag = text_tag(data.format);
    if data.format.has(TextFormatType::Bold) && tag != "strong" {
        push_style(&mut style, "font-weight: bold;");
    }
    if data.format.has(TextFormatType::Italic) && tag != "em" {
        push_style(&mut style, "font-style: italic;");
    }
    if !decorations.is_empty() {
        push_style(&mut style, &format!("text-decoration: {};", decorations.join(" ")));
    }
    if !style.is_empty() {
        shape.attr("style", style);
    }
    shape
}

fn push_style(style: &mut String, declaration: &str) {
    if !style.is_empty() {
        style.push(' ');
    }
    style.push_str(declaration);
}

/// Detached host tree for a subtree
pub fn export_node(store: &NodeStore, key: &NodeKey, theme: &Theme) -> ModelResult<HostNode> {
    let node = store.require(key)?;
    let Some(shape) = host_shape(node, theme) else {
        let children = export_children(store, node, theme)?;
        return Ok(HostNode::element("div").with_children(children));
    };
    let host = HostNode::element(shape.tag).with_attributes(shape.attributes);
    Ok(match &node.kind {
        NodeKind::Text(data) => host.with_child(HostNode::text(data.text.clone())),
        NodeKind::Root(_) | NodeKind::Element(..) => host.with_children(export_children(store, node, theme)?),
        NodeKind::LineBreak | NodeKind::Decorator(_) => host,
    })
}

fn export_children(store: &NodeStore, node: &Node, theme: &Theme) -> ModelResult<Vec<HostNode>> {
    node.children()
        .iter()
        .map(|child| export_node(store, child, theme))
        .collect()
}

/// Host trees of the root's children
pub fn export_dom(state: &EditorState, theme: &Theme) -> ModelResult<Vec<HostNode>> {
    let root = state.store().require(&NodeKey::root())?;
    export_children(state.store(), root, theme)
}

pub fn export_html(state: &EditorState, theme: &Theme) -> ModelResult<String> {
    Ok(crate::vdom::to_html(&export_dom(state, theme)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use verso_model::{Direction, ElementFormat};

    #[test]
    fn test_text_tags_follow_format() {
        assert_eq!(text_tag(TextFormat::empty()), "span");
        assert_eq!(text_tag(TextFormat::BOLD | TextFormat::ITALIC), "strong");
        assert_eq!(text_tag(TextFormat::CODE | TextFormat::BOLD), "code");
    }

    #[test]
    fn test_text_shape_with_theme() {
        let theme = Theme::new().with_class("bold", "b").with_class("underline", "u");
        let mut data = TextData::new("x");
        data.format = TextFormat::BOLD | TextFormat::UNDERLINE;
        let shape = text_shape(&data, &theme);
        assert_eq!(shape.tag, "strong");
        assert_eq!(shape.attributes.get("class").map(String::as_str), Some("b u"));
        assert_eq!(
            shape.attributes.get("style").map(String::as_str),
            Some("text-decoration: underline;")
        );
    }

    #[test]
    fn test_element_styles() {
        let data = ElementData {
            format: ElementFormat::Center,
            indent: 2,
            direction: Some(Direction::Rtl),
            ..ElementData::default()
        };
        let shape = element_shape(&ElementKind::Heading { level: 3 }, &data, &Theme::new());
        assert_eq!(shape.tag, "h3");
        assert_eq!(
            shape.attributes.get("style").map(String::as_str),
            Some("text-align: center; padding-inline-start: 80px;")
        );
        assert_eq!(shape.attributes.get("dir").map(String::as_str), Some("rtl"));
    }

    #[test]
    fn test_root_has_no_shape() {
        assert!(host_shape(&Node::root(), &Theme::new()).is_none());
    }
}
