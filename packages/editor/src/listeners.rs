//! # Listener Registry
//!
//! Every handler the editor calls back into lives here: command handlers,
//! node transforms, DOM conversions and the post-commit listeners. Each
//! registration returns an [`Unregister`] handle.

use crate::commands::CommandPriority;
use crate::dom_import::ConversionRegistry;
use crate::errors::{EditorError, EditorResult};
use crate::transaction::Transaction;
use crate::transforms::NodeTransform;
use serde_json::Value;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use verso_model::{EditorState, NodeKey};
use verso_reconciler::DomId;

pub(crate) type CommandFn = dyn Fn(&dyn Any, &mut Transaction<'_>) -> EditorResult<bool>;
pub(crate) type TransformFn = dyn NodeTransform;
pub(crate) type UpdateFn = dyn Fn(&UpdatePayload);
pub(crate) type TextContentFn = dyn Fn(&str);
pub(crate) type MutationFn = dyn Fn(&BTreeMap<NodeKey, NodeMutation>, &UpdatePayload);
pub(crate) type DecoratorFn = dyn Fn(&BTreeMap<NodeKey, Value>);
pub(crate) type EditableFn = dyn Fn(bool);
pub(crate) type RootFn = dyn Fn(Option<DomId>, Option<DomId>);
pub(crate) type ErrorFn = dyn Fn(&EditorError);

/// What a commit changed, handed to update and mutation listeners
#[derive(Debug, Clone)]
pub struct UpdatePayload {
    pub prev_state: Arc<EditorState>,
    pub state: Arc<EditorState>,
    pub dirty_leaves: HashSet<NodeKey>,
    pub dirty_elements: HashMap<NodeKey, bool>,
    pub tags: BTreeSet<String>,
}

impl UpdatePayload {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Only the selection moved
    pub fn is_selection_only(&self) -> bool {
        self.dirty_leaves.is_empty() && self.dirty_elements.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeMutation {
    Created,
    Updated,
    Destroyed,
}

type Entries<F> = Vec<(u64, Rc<F>)>;

fn handlers<F: ?Sized>(entries: &[(u64, Rc<F>)]) -> Vec<Rc<F>> {
    entries.iter().map(|(_, handler)| Rc::clone(handler)).collect()
}

#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    commands: HashMap<&'static str, Vec<(u64, CommandPriority, Rc<CommandFn>)>>,
    transforms: HashMap<String, Entries<TransformFn>>,
    update: Entries<UpdateFn>,
    text_content: Entries<TextContentFn>,
    mutation: HashMap<String, Entries<MutationFn>>,
    decorator: Entries<DecoratorFn>,
    editable: Entries<EditableFn>,
    root: Entries<RootFn>,
    error: Entries<ErrorFn>,
    pub(crate) conversions: ConversionRegistry,
}

impl Registry {
    pub(crate) fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn add_command(&mut self, name: &'static str, priority: CommandPriority, handler: Rc<CommandFn>) -> u64 {
        let id = self.allocate();
        self.commands.entry(name).or_default().push((id, priority, handler));
        id
    }

    /// Handlers for a command, highest priority first. Registration order
    /// breaks ties.
    pub(crate) fn command_handlers(&self, name: &str) -> Vec<Rc<CommandFn>> {
        let mut entries: Vec<&(u64, CommandPriority, Rc<CommandFn>)> =
            self.commands.get(name).map(|list| list.iter().collect()).unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.into_iter().map(|(_, _, handler)| Rc::clone(handler)).collect()
    }

    pub(crate) fn add_transform(&mut self, node_type: &str, handler: Rc<TransformFn>) -> u64 {
        let id = self.allocate();
        self.transforms.entry(node_type.to_string()).or_default().push((id, handler));
        id
    }

    pub(crate) fn transforms_for(&self, node_type: &str) -> Vec<Rc<TransformFn>> {
        self.transforms.get(node_type).map(|list| handlers(list)).unwrap_or_default()
    }

    pub(crate) fn has_transforms(&self) -> bool {
        self.transforms.values().any(|list| !list.is_empty())
    }

    pub(crate) fn add_update(&mut self, handler: Rc<UpdateFn>) -> u64 {
        let id = self.allocate();
        self.update.push((id, handler));
        id
    }

    pub(crate) fn update_listeners(&self) -> Vec<Rc<UpdateFn>> {
        handlers(&self.update)
    }

    pub(crate) fn add_text_content(&mut self, handler: Rc<TextContentFn>) -> u64 {
        let id = self.allocate();
        self.text_content.push((id, handler));
        id
    }

    pub(crate) fn text_content_listeners(&self) -> Vec<Rc<TextContentFn>> {
        handlers(&self.text_content)
    }

    pub(crate) fn add_mutation(&mut self, node_type: &str, handler: Rc<MutationFn>) -> u64 {
        let id = self.allocate();
        self.mutation.entry(node_type.to_string()).or_default().push((id, handler));
        id
    }

    /// Node types with at least one mutation listener, and their listeners
    pub(crate) fn mutation_listeners(&self) -> Vec<(String, Vec<Rc<MutationFn>>)> {
        self.mutation
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(node_type, list)| (node_type.clone(), handlers(list)))
            .collect()
    }

    pub(crate) fn add_decorator(&mut self, handler: Rc<DecoratorFn>) -> u64 {
        let id = self.allocate();
        self.decorator.push((id, handler));
        id
    }

    pub(crate) fn decorator_listeners(&self) -> Vec<Rc<DecoratorFn>> {
        handlers(&self.decorator)
    }

    pub(crate) fn add_editable(&mut self, handler: Rc<EditableFn>) -> u64 {
        let id = self.allocate();
        self.editable.push((id, handler));
        id
    }

    pub(crate) fn editable_listeners(&self) -> Vec<Rc<EditableFn>> {
        handlers(&self.editable)
    }

    pub(crate) fn add_root(&mut self, handler: Rc<RootFn>) -> u64 {
        let id = self.allocate();
        self.root.push((id, handler));
        id
    }

    pub(crate) fn root_listeners(&self) -> Vec<Rc<RootFn>> {
        handlers(&self.root)
    }

    pub(crate) fn add_error(&mut self, handler: Rc<ErrorFn>) -> u64 {
        let id = self.allocate();
        self.error.push((id, handler));
        id
    }

    pub(crate) fn error_listeners(&self) -> Vec<Rc<ErrorFn>> {
        handlers(&self.error)
    }

    fn remove(&mut self, id: u64) {
        for list in self.commands.values_mut() {
            list.retain(|(entry, _, _)| *entry != id);
        }
        for list in self.transforms.values_mut() {
            list.retain(|(entry, _)| *entry != id);
        }
        for list in self.mutation.values_mut() {
            list.retain(|(entry, _)| *entry != id);
        }
        self.update.retain(|(entry, _)| *entry != id);
        self.text_content.retain(|(entry, _)| *entry != id);
        self.decorator.retain(|(entry, _)| *entry != id);
        self.editable.retain(|(entry, _)| *entry != id);
        self.root.retain(|(entry, _)| *entry != id);
        self.error.retain(|(entry, _)| *entry != id);
        self.conversions.remove(id);
    }
}

/// Handle returned by every registration. Dropping it keeps the handler
/// registered; call [`Unregister::unregister`] to remove it.
#[derive(Debug)]
pub struct Unregister {
    registry: Weak<RefCell<Registry>>,
    ids: Vec<u64>,
}

impl Unregister {
    pub(crate) fn new(registry: &Rc<RefCell<Registry>>, id: u64) -> Self {
        Self {
            registry: Rc::downgrade(registry),
            ids: vec![id],
        }
    }

    /// Combine several handles into one
    pub fn merge(handles: impl IntoIterator<Item = Unregister>) -> Self {
        let mut merged = Self {
            registry: Weak::new(),
            ids: Vec::new(),
        };
        for handle in handles {
            if merged.registry.upgrade().is_none() {
                merged.registry = handle.registry;
            }
            merged.ids.extend(handle.ids);
        }
        merged
    }

    pub fn unregister(self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.borrow_mut();
            for id in self.ids {
                registry.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_command() -> Rc<CommandFn> {
        Rc::new(|_, _| Ok(false))
    }

    #[test]
    fn test_command_handlers_sorted_by_priority() {
        let mut registry = Registry::default();
        let low = registry.add_command("x", CommandPriority::Low, noop_command());
        let critical = registry.add_command("x", CommandPriority::Critical, noop_command());
        assert!(low < critical);
        assert_eq!(registry.command_handlers("x").len(), 2);
        assert!(registry.command_handlers("y").is_empty());
    }

    #[test]
    fn test_unregister_removes_handler() {
        let registry = Rc::new(RefCell::new(Registry::default()));
        let id = registry.borrow_mut().add_text_content(Rc::new(|_| {}));
        let other = registry.borrow_mut().add_editable(Rc::new(|_| {}));
        let handle = Unregister::merge([Unregister::new(&registry, id), Unregister::new(&registry, other)]);
        assert_eq!(registry.borrow().text_content_listeners().len(), 1);
        handle.unregister();
        assert!(registry.borrow().text_content_listeners().is_empty());
        assert!(registry.borrow().editable_listeners().is_empty());
    }

    #[test]
    fn test_has_transforms_follows_registration() {
        let mut registry = Registry::default();
        assert!(!registry.has_transforms());
        let transform: Rc<TransformFn> =
            Rc::new(|_: &NodeKey, _: &mut Transaction<'_>| -> EditorResult<()> { Ok(()) });
        let id = registry.add_transform("text", transform);
        assert!(registry.has_transforms());
        registry.remove(id);
        assert!(!registry.has_transforms());
    }
}
