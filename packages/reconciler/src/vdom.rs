use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Detached host DOM tree, used for HTML export and DOM import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostNode {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        children: Vec<HostNode>,
    },

    Text { content: String },
}

impl HostNode {
    pub fn element(tag: impl Into<String>) -> Self {
        HostNode::Element {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        HostNode::Text {
            content: content.into(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let HostNode::Element {
            ref mut attributes, ..
        } = self
        {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_attributes(mut self, new_attributes: BTreeMap<String, String>) -> Self {
        if let HostNode::Element {
            ref mut attributes, ..
        } = self
        {
            attributes.extend(new_attributes);
        }
        self
    }

    pub fn with_child(mut self, child: HostNode) -> Self {
        if let HostNode::Element {
            ref mut children, ..
        } = self
        {
            children.push(child);
        }
        self
    }

    pub fn with_children(mut self, new_children: Vec<HostNode>) -> Self {
        if let HostNode::Element {
            ref mut children, ..
        } = self
        {
            children.extend(new_children);
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            HostNode::Element { tag, .. } => Some(tag),
            HostNode::Text { .. } => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            HostNode::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            HostNode::Text { .. } => None,
        }
    }

    pub fn children(&self) -> &[HostNode] {
        match self {
            HostNode::Element { children, .. } => children,
            HostNode::Text { .. } => &[],
        }
    }

    /// Concatenated text of the subtree
    pub fn text_content(&self) -> String {
        match self {
            HostNode::Text { content } => content.clone(),
            HostNode::Element { children, .. } => children.iter().map(HostNode::text_content).collect(),
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            HostNode::Text { content } => out.push_str(&escape_text(content)),
            HostNode::Element {
                tag,
                attributes,
                children,
            } => {
                open_tag(out, tag, attributes);
                if is_void(tag) {
                    return;
                }
                for child in children {
                    child.write_html(out);
                }
                close_tag(out, tag);
            }
        }
    }
}

pub fn to_html(nodes: &[HostNode]) -> String {
    nodes.iter().map(HostNode::to_html).collect()
}

pub(crate) fn open_tag(out: &mut String, tag: &str, attributes: &BTreeMap<String, String>) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
}

pub(crate) fn close_tag(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

pub(crate) fn is_void(tag: &str) -> bool {
    matches!(tag, "br" | "hr" | "img")
}

pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_html() {
        let node = HostNode::element("P")
            .with_attr("class", "para")
            .with_child(HostNode::text("a < b"))
            .with_child(HostNode::element("br"));
        assert_eq!(node.tag(), Some("p"));
        assert_eq!(node.to_html(), r#"<p class="para">a &lt; b<br></p>"#);
        assert_eq!(node.text_content(), "a < b");
    }

    #[test]
    fn test_attribute_escaping() {
        let node = HostNode::element("a").with_attr("href", "/?q=\"x\"&y");
        assert_eq!(node.to_html(), r#"<a href="/?q=&quot;x&quot;&amp;y"></a>"#);
    }
}
