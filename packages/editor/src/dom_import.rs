//! # DOM Import
//!
//! Converts host DOM trees (clipboard HTML, exported documents) into
//! detached nodes. Each element is looked up by lowercase tag in the
//! conversion registry; registered conversions are tried from the highest
//! priority down and the first one producing output wins, then the
//! built-in conversions run.
//!
//! ```text
//! <p><strong>Hi</strong> there</p>
//!   p      → paragraph            (children appended into it)
//!   strong → no node, for_child   (bold applied to descendants)
//!   "Hi"   → text, bold
//! ```
//!
//! An element without a conversion produces no node; its children are
//! hoisted into the parent's result.

use crate::errors::EditorResult;
use crate::transaction::Transaction;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;
use verso_model::{ElementFormat, ElementKind, NodeKey, TextFormat, TextFormatType};
use verso_reconciler::render::DECORATOR_MARKER;
use verso_reconciler::HostNode;

pub type ConvertFn = dyn Fn(&HostNode, &mut Transaction<'_>) -> EditorResult<Option<DomConversionOutput>>;

/// Applied to every node created beneath the converted element. Returning
/// `None` drops the node.
pub type ForChildFn = dyn Fn(NodeKey, &mut Transaction<'_>) -> EditorResult<Option<NodeKey>>;

/// Post-processes the converted children of an element
pub type AfterFn = dyn Fn(Vec<NodeKey>, &mut Transaction<'_>) -> EditorResult<Vec<NodeKey>>;

/// Result of converting one host element
#[derive(Clone, Default)]
pub struct DomConversionOutput {
    /// Nodes standing for the element. Children are appended into the
    /// first one when it is an element; with no nodes they are hoisted.
    pub nodes: Vec<NodeKey>,
    pub for_child: Option<Rc<ForChildFn>>,
    pub after: Option<Rc<AfterFn>>,
}

impl DomConversionOutput {
    pub fn node(key: NodeKey) -> Self {
        Self {
            nodes: vec![key],
            ..Default::default()
        }
    }

    pub fn for_child(f: impl Fn(NodeKey, &mut Transaction<'_>) -> EditorResult<Option<NodeKey>> + 'static) -> Self {
        Self {
            for_child: Some(Rc::new(f)),
            ..Default::default()
        }
    }
}

struct Conversion {
    id: u64,
    priority: u32,
    convert: Rc<ConvertFn>,
}

#[derive(Default)]
pub(crate) struct ConversionRegistry {
    by_tag: HashMap<String, Vec<Conversion>>,
}

impl ConversionRegistry {
    pub(crate) fn add(&mut self, id: u64, tag: &str, priority: u32, convert: Rc<ConvertFn>) {
        self.by_tag
            .entry(tag.to_ascii_lowercase())
            .or_default()
            .push(Conversion { id, priority, convert });
    }

    /// Conversions for a tag, highest priority first
    pub(crate) fn candidates(&self, tag: &str) -> Vec<Rc<ConvertFn>> {
        let mut list: Vec<&Conversion> = self.by_tag.get(tag).map(|l| l.iter().collect()).unwrap_or_default();
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
        list.into_iter().map(|c| Rc::clone(&c.convert)).collect()
    }

    pub(crate) fn remove(&mut self, id: u64) {
        for list in self.by_tag.values_mut() {
            list.retain(|c| c.id != id);
        }
    }
}

impl Transaction<'_> {
    /// Detached nodes for a host DOM forest. Top-level results may be
    /// inline; [`Transaction::insert_nodes`] wraps them as needed.
    pub fn generate_nodes_from_dom(&mut self, dom: &[HostNode]) -> EditorResult<Vec<NodeKey>> {
        let mut nodes = Vec::new();
        for host in dom {
            nodes.extend(self.convert_host(host, &[])?);
        }
        Ok(nodes)
    }

    fn convert_host(&mut self, host: &HostNode, inherited: &[Rc<ForChildFn>]) -> EditorResult<Vec<NodeKey>> {
        let (tag, children) = match host {
            HostNode::Text { content } => {
                let Some(text) = collapse_whitespace(content) else {
                    return Ok(Vec::new());
                };
                let key = self.create_text(text);
                return self.apply_for_child(vec![key], inherited);
            }
            HostNode::Element { tag, children, .. } => (tag.as_str(), children),
        };

        let output = self.convert_element(tag, host)?.unwrap_or_default();
        let current = self.apply_for_child(output.nodes, inherited)?;

        let mut scope = inherited.to_vec();
        if let Some(for_child) = &output.for_child {
            scope.push(Rc::clone(for_child));
        }
        let mut converted = Vec::new();
        for child in children {
            converted.extend(self.convert_host(child, &scope)?);
        }
        if let Some(after) = &output.after {
            converted = after(converted, self)?;
        }

        let Some(first) = current.first() else {
            return Ok(converted);
        };
        if self.node(first)?.is_element() {
            self.append(first, &converted)?;
        }
        Ok(current)
    }

    fn convert_element(&mut self, tag: &str, host: &HostNode) -> EditorResult<Option<DomConversionOutput>> {
        let candidates = self.registry().borrow().conversions.candidates(tag);
        for convert in candidates {
            if let Some(output) = convert(host, self)? {
                return Ok(Some(output));
            }
        }
        let output = self.builtin_conversion(tag, host)?;
        if output.is_none() {
            trace!(tag, "no conversion, hoisting children");
        }
        Ok(output)
    }

    fn apply_for_child(&mut self, nodes: Vec<NodeKey>, inherited: &[Rc<ForChildFn>]) -> EditorResult<Vec<NodeKey>> {
        let mut result = Vec::with_capacity(nodes.len());
        'nodes: for mut key in nodes {
            for for_child in inherited {
                match for_child(key, self)? {
                    Some(next) => key = next,
                    None => continue 'nodes,
                }
            }
            result.push(key);
        }
        Ok(result)
    }

    fn builtin_conversion(&mut self, tag: &str, host: &HostNode) -> EditorResult<Option<DomConversionOutput>> {
        if let Some(decorator_type) = host.attr(DECORATOR_MARKER) {
            let key = self.create_decorator(decorator_type, Value::Null, tag == "span");
            return Ok(Some(DomConversionOutput::node(key)));
        }

        let kind = match tag {
            "p" => ElementKind::Paragraph,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ElementKind::Heading {
                level: tag[1..].parse().unwrap_or(1),
            },
            "blockquote" => ElementKind::Quote,
            "ul" => ElementKind::List {
                ordered: false,
                start: 1,
            },
            "ol" => ElementKind::List {
                ordered: true,
                start: numeric_attr(host, "start").unwrap_or(1),
            },
            "li" => ElementKind::ListItem {
                value: numeric_attr(host, "value").unwrap_or(1),
                checked: host.attr("aria-checked").and_then(|v| v.parse().ok()),
            },
            "table" => ElementKind::Table,
            "tr" => ElementKind::TableRow,
            "td" | "th" => ElementKind::TableCell {
                header: tag == "th",
                col_span: numeric_attr(host, "colspan").unwrap_or(1).max(1),
                row_span: numeric_attr(host, "rowspan").unwrap_or(1).max(1),
            },
            "a" => ElementKind::Link {
                url: host.attr("href").unwrap_or_default().to_string(),
            },
            "br" => return Ok(Some(DomConversionOutput::node(self.create_line_break()))),
            _ => {
                let format = tag_format(tag) | style_format(host.attr("style").unwrap_or_default());
                if format.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(DomConversionOutput::for_child(move |key, tx| {
                    if let Some(data) = tx.get(&key).and_then(|n| n.text_data()) {
                        let merged = data.format | format;
                        tx.set_text_format(&key, merged)?;
                    }
                    Ok(Some(key))
                })));
            }
        };

        let is_inline = kind.is_inline();
        let key = self.create_element(kind);
        if !is_inline {
            if let Some(align) = text_align(host.attr("style").unwrap_or_default()) {
                self.writable_element(&key)?.format = align;
            }
        }
        Ok(Some(DomConversionOutput::node(key)))
    }
}

/// Collapse whitespace runs the way a browser renders them. Whitespace
/// that only formats the markup (spanning a newline) yields nothing.
fn collapse_whitespace(content: &str) -> Option<String> {
    if content.trim().is_empty() && content.contains('\n') {
        return None;
    }
    let mut text = String::with_capacity(content.len());
    let mut in_space = false;
    for ch in content.chars() {
        if ch.is_whitespace() && ch != '\u{a0}' {
            if !in_space {
                text.push(' ');
            }
            in_space = true;
        } else {
            text.push(ch);
            in_space = false;
        }
    }
    (!text.is_empty()).then_some(text)
}

fn numeric_attr(host: &HostNode, name: &str) -> Option<u32> {
    host.attr(name).and_then(|v| v.trim().parse().ok())
}

fn tag_format(tag: &str) -> TextFormat {
    let ty = match tag {
        "strong" | "b" => TextFormatType::Bold,
        "em" | "i" => TextFormatType::Italic,
        "u" => TextFormatType::Underline,
        "s" | "del" | "strike" => TextFormatType::Strikethrough,
        "code" => TextFormatType::Code,
        "sub" => TextFormatType::Subscript,
        "sup" => TextFormatType::Superscript,
        "mark" => TextFormatType::Highlight,
        _ => return TextFormat::empty(),
    };
    ty.flag()
}

fn style_declarations(style: &str) -> impl Iterator<Item = (String, String)> + '_ {
    style.split(';').filter_map(|declaration| {
        let (name, value) = declaration.split_once(':')?;
        Some((name.trim().to_ascii_lowercase(), value.trim().to_ascii_lowercase()))
    })
}

fn style_format(style: &str) -> TextFormat {
    let mut format = TextFormat::empty();
    for (name, value) in style_declarations(style) {
        match name.as_str() {
            "font-weight" if value == "bold" || value == "700" || value == "800" || value == "900" => {
                format |= TextFormat::BOLD
            }
            "font-style" if value == "italic" => format |= TextFormat::ITALIC,
            "text-decoration" | "text-decoration-line" => {
                if value.contains("underline") {
                    format |= TextFormat::UNDERLINE;
                }
                if value.contains("line-through") {
                    format |= TextFormat::STRIKETHROUGH;
                }
            }
            "vertical-align" if value == "sub" => format |= TextFormat::SUBSCRIPT,
            "vertical-align" if value == "super" => format |= TextFormat::SUPERSCRIPT,
            _ => {}
        }
    }
    format
}

fn text_align(style: &str) -> Option<ElementFormat> {
    let (_, value) = style_declarations(style).find(|(name, _)| name == "text-align")?;
    Some(match value.as_str() {
        "left" => ElementFormat::Left,
        "start" => ElementFormat::Start,
        "center" => ElementFormat::Center,
        "right" => ElementFormat::Right,
        "end" => ElementFormat::End,
        "justify" => ElementFormat::Justify,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::Fixture;
    use verso_model::NodeKind;

    #[test]
    fn test_paragraph_with_inherited_format() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let dom = HostNode::element("p")
            .with_child(HostNode::element("strong").with_child(HostNode::text("Hi")))
            .with_child(HostNode::text(" there"));

        let nodes = tx.generate_nodes_from_dom(&[dom]).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(tx.node(&nodes[0]).unwrap().type_name(), "paragraph");
        let children = tx.children(&nodes[0]).unwrap();
        assert_eq!(children.len(), 2);
        assert!(tx.text(&children[0]).unwrap().format.has(TextFormatType::Bold));
        assert_eq!(tx.text(&children[1]).unwrap().text, " there");
        assert!(tx.text(&children[1]).unwrap().format.is_empty());
    }

    #[test]
    fn test_unknown_tags_hoist_children() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let dom = HostNode::element("section")
            .with_child(HostNode::element("h2").with_child(HostNode::text("Title")))
            .with_child(HostNode::text("\n  "))
            .with_child(HostNode::element("p").with_child(HostNode::text("Body")));

        let nodes = tx.generate_nodes_from_dom(&[dom]).unwrap();
        let types: Vec<&str> = nodes.iter().map(|k| tx.node(k).unwrap().type_name()).collect();
        assert_eq!(types, vec!["heading", "paragraph"]);
        assert!(matches!(
            tx.node(&nodes[0]).unwrap().kind,
            NodeKind::Element(ElementKind::Heading { level: 2 }, _)
        ));
    }

    #[test]
    fn test_registered_conversion_overrides_builtin() {
        let mut fixture = Fixture::new();
        {
            let mut registry = fixture.registry.borrow_mut();
            let id = registry.allocate();
            registry.conversions.add(
                id,
                "P",
                10,
                Rc::new(|_: &HostNode, tx: &mut Transaction<'_>| -> EditorResult<Option<DomConversionOutput>> {
                    Ok(Some(DomConversionOutput::node(tx.create_element(ElementKind::Quote))))
                }),
            );
        }
        let mut tx = fixture.tx();
        let nodes = tx
            .generate_nodes_from_dom(&[HostNode::element("p").with_child(HostNode::text("q"))])
            .unwrap();
        assert_eq!(tx.node(&nodes[0]).unwrap().type_name(), "quote");
    }

    #[test]
    fn test_span_styles_and_alignment() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let dom = HostNode::element("p").with_attr("style", "text-align: center").with_child(
            HostNode::element("span")
                .with_attr("style", "font-weight: 700; text-decoration: underline line-through")
                .with_child(HostNode::text("x")),
        );
        let nodes = tx.generate_nodes_from_dom(&[dom]).unwrap();
        assert_eq!(tx.node(&nodes[0]).unwrap().element().unwrap().format, ElementFormat::Center);
        let text = tx.children(&nodes[0]).unwrap()[0].clone();
        let format = tx.text(&text).unwrap().format;
        assert_eq!(format, TextFormat::BOLD | TextFormat::UNDERLINE | TextFormat::STRIKETHROUGH);
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(collapse_whitespace("a   b\tc").as_deref(), Some("a b c"));
        assert_eq!(collapse_whitespace("\n    "), None);
        assert_eq!(collapse_whitespace(" "), Some(" ".to_string()));
    }
}
