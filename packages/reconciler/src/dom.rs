//! # Host DOM
//!
//! The reconciler never touches a real DOM. It emits [`DomPatch`]es that a
//! [`HostDom`] applies in order. Invariants of a patch stream:
//!
//! - ids referenced by a patch exist when the patch is applied (except the
//!   id being created)
//! - inserting an attached node moves it; a node has at most one parent
//! - removing a node removes its whole subtree
//! - the stream for one commit is self-contained
//!
//! [`MemoryDom`] is the in-process host used by the CLI and by tests.

use crate::error::{ReconcileError, ReconcileResult};
use crate::vdom::{close_tag, escape_text, is_void, open_tag};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// Host node identity, allocated by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomId(pub u32);

impl DomId {
    pub const ROOT: DomId = DomId(0);
}

impl fmt::Display for DomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A caret position in the host DOM: a character offset inside a text node,
/// or a child index inside an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomPoint {
    pub node: DomId,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DomPatch {
    CreateElement {
        id: DomId,
        tag: String,
        attributes: BTreeMap<String, String>,
    },

    CreateText { id: DomId, text: String },

    /// Insert `child` into `parent` before `before`, or last when `before`
    /// is `None`
    InsertChild {
        parent: DomId,
        child: DomId,
        before: Option<DomId>,
    },

    /// Reposition an already attached child without recreating it
    MoveChild {
        parent: DomId,
        child: DomId,
        before: Option<DomId>,
    },

    RemoveNode { id: DomId },

    SetText { id: DomId, text: String },

    /// Replace every attribute of an element
    SetAttributes {
        id: DomId,
        attributes: BTreeMap<String, String>,
    },

    SetSelection { anchor: DomPoint, focus: DomPoint },

    ClearSelection,
}

/// Receiver of DOM patches
pub trait HostDom {
    /// Container element the document is mounted into
    fn root(&self) -> DomId;

    fn apply(&mut self, patch: &DomPatch) -> ReconcileResult<()>;

    fn apply_all(&mut self, patches: &[DomPatch]) -> ReconcileResult<()> {
        for patch in patches {
            self.apply(patch)?;
        }
        Ok(())
    }
}

impl<T: HostDom> HostDom for Rc<RefCell<T>> {
    fn root(&self) -> DomId {
        self.borrow().root()
    }

    fn apply(&mut self, patch: &DomPatch) -> ReconcileResult<()> {
        self.borrow_mut().apply(patch)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MemoryContent {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct MemoryNode {
    content: MemoryContent,
    parent: Option<DomId>,
    children: Vec<DomId>,
}

/// In-memory host DOM that records every patch it applies
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: HashMap<DomId, MemoryNode>,
    log: Vec<DomPatch>,
    selection: Option<(DomPoint, DomPoint)>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// Host with an empty, editable root container
    pub fn new() -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("contenteditable".to_string(), "true".to_string());
        let root = MemoryNode {
            content: MemoryContent::Element {
                tag: "div".to_string(),
                attributes,
            },
            parent: None,
            children: Vec::new(),
        };
        let mut nodes = HashMap::new();
        nodes.insert(DomId::ROOT, root);
        Self {
            nodes,
            log: Vec::new(),
            selection: None,
        }
    }

    /// Patches applied so far, in order
    pub fn log(&self) -> &[DomPatch] {
        &self.log
    }

    pub fn take_log(&mut self) -> Vec<DomPatch> {
        std::mem::take(&mut self.log)
    }

    pub fn selection(&self) -> Option<(DomPoint, DomPoint)> {
        self.selection
    }

    /// Nodes currently attached under the root (root excluded)
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn contains(&self, id: DomId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn children(&self, id: DomId) -> &[DomId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, id: DomId) -> Option<&str> {
        match &self.nodes.get(&id)?.content {
            MemoryContent::Element { tag, .. } => Some(tag),
            MemoryContent::Text(_) => None,
        }
    }

    pub fn text(&self, id: DomId) -> Option<&str> {
        match &self.nodes.get(&id)?.content {
            MemoryContent::Text(text) => Some(text),
            MemoryContent::Element { .. } => None,
        }
    }

    /// Markup of the root's children
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children(DomId::ROOT) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, id: DomId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.content {
            MemoryContent::Text(text) => out.push_str(&escape_text(text)),
            MemoryContent::Element { tag, attributes } => {
                open_tag(out, tag, attributes);
                if is_void(tag) {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out);
                }
                close_tag(out, tag);
            }
        }
    }

    fn node_mut(&mut self, id: DomId) -> ReconcileResult<&mut MemoryNode> {
        self.nodes.get_mut(&id).ok_or(ReconcileError::UnknownDomNode(id))
    }

    fn detach(&mut self, child: DomId) -> ReconcileResult<()> {
        let parent = self.node_mut(child)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != child);
        }
        Ok(())
    }

    fn insert(&mut self, parent: DomId, child: DomId, before: Option<DomId>) -> ReconcileResult<()> {
        if !matches!(
            self.nodes.get(&parent).map(|n| &n.content),
            Some(MemoryContent::Element { .. })
        ) {
            return Err(ReconcileError::NotAnElement(parent));
        }
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let index = match before {
            Some(before) => siblings
                .iter()
                .position(|c| *c == before)
                .ok_or(ReconcileError::NotAChild { parent, child: before })?,
            None => siblings.len(),
        };
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove_subtree(&mut self, id: DomId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }
}

impl HostDom for MemoryDom {
    fn root(&self) -> DomId {
        DomId::ROOT
    }

    fn apply(&mut self, patch: &DomPatch) -> ReconcileResult<()> {
        match patch {
            DomPatch::CreateElement { id, tag, attributes } => {
                self.nodes.insert(
                    *id,
                    MemoryNode {
                        content: MemoryContent::Element {
                            tag: tag.clone(),
                            attributes: attributes.clone(),
                        },
                        parent: None,
                        children: Vec::new(),
                    },
                );
            }
            DomPatch::CreateText { id, text } => {
                self.nodes.insert(
                    *id,
                    MemoryNode {
                        content: MemoryContent::Text(text.clone()),
                        parent: None,
                        children: Vec::new(),
                    },
                );
            }
            DomPatch::InsertChild { parent, child, before } | DomPatch::MoveChild { parent, child, before } => {
                self.insert(*parent, *child, *before)?;
            }
            DomPatch::RemoveNode { id } => {
                self.detach(*id)?;
                self.remove_subtree(*id);
            }
            DomPatch::SetText { id, text } => match &mut self.node_mut(*id)?.content {
                MemoryContent::Text(content) => *content = text.clone(),
                MemoryContent::Element { .. } => return Err(ReconcileError::NotText(*id)),
            },
            DomPatch::SetAttributes { id, attributes } => match &mut self.node_mut(*id)?.content {
                MemoryContent::Element {
                    attributes: current, ..
                } => *current = attributes.clone(),
                MemoryContent::Text(_) => return Err(ReconcileError::NotAnElement(*id)),
            },
            DomPatch::SetSelection { anchor, focus } => {
                for point in [anchor, focus] {
                    if !self.nodes.contains_key(&point.node) {
                        return Err(ReconcileError::UnknownDomNode(point.node));
                    }
                }
                self.selection = Some((*anchor, *focus));
            }
            DomPatch::ClearSelection => self.selection = None,
        }
        self.log.push(patch.clone());
        Ok(())
    }
}
