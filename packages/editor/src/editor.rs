//! # Editor
//!
//! Owns the committed [`EditorState`], the pending transaction state, the
//! listener registry and, once mounted, the host DOM.
//!
//! ```text
//! update(f) ──→ pending state ──(flush / discrete / read)──→ commit
//!                  ↑    f runs on a Transaction over it          ↓
//!              coalesces several non-discrete updates      next EditorState
//! ```
//!
//! A failing mutator rolls the pending state back to where it was before
//! that mutator ran; changes from earlier, coalesced updates survive.

use crate::commands::{Command, CommandPriority};
use crate::config::EditorConfig;
use crate::dom_import::DomConversionOutput;
use crate::errors::EditorResult;
use crate::listeners::{NodeMutation, Registry, UpdatePayload, Unregister};
use crate::pipeline::Mounted;
use crate::transaction::{PendingState, Transaction};
use crate::transforms::NodeTransform;
use serde_json::Value;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;
use verso_model::serializer;
use verso_model::{EditorState, KeyGenerator, NodeKey, Schema};
use verso_reconciler::{render, DomId, HostDom, HostNode, ReconcileOutcome, Reconciler};

/// How an update is applied
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Tags handed to update listeners with the commit
    pub tags: Vec<String>,
    /// Skip registered node transforms (normalization still runs)
    pub skip_transforms: bool,
    /// Commit immediately instead of coalescing with later updates
    pub discrete: bool,
}

impl UpdateOptions {
    pub fn discrete() -> Self {
        Self {
            discrete: true,
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

pub struct Editor {
    pub(crate) config: EditorConfig,
    schema: Schema,
    pub(crate) state: Arc<EditorState>,
    pending: Option<PendingState>,
    pub(crate) keys: KeyGenerator,
    pub(crate) registry: Rc<RefCell<Registry>>,
    pub(crate) host: Option<Mounted>,
    pub(crate) editable: bool,
    pub(crate) decorators: BTreeMap<NodeKey, Value>,
    pub(crate) last_outcome: Option<ReconcileOutcome>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            schema: config.schema(),
            keys: KeyGenerator::new(&config.namespace),
            editable: config.editable,
            state: Arc::new(EditorState::empty()),
            pending: None,
            registry: Rc::new(RefCell::new(Registry::default())),
            host: None,
            decorators: BTreeMap::new(),
            last_outcome: None,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Last committed state. Pending updates are not included; use
    /// [`Editor::read`] to see them.
    pub fn state(&self) -> Arc<EditorState> {
        Arc::clone(&self.state)
    }

    pub fn has_pending_update(&self) -> bool {
        self.pending.is_some()
    }

    // -----------------------------------------------------------------------
    // Updates

    /// Queue a change. It is committed together with any other queued
    /// changes on the next flush, discrete update or read.
    pub fn update<F>(&mut self, mutator: F) -> EditorResult<()>
    where
        F: FnOnce(&mut Transaction<'_>) -> EditorResult<()>,
    {
        self.update_with(UpdateOptions::default(), mutator)
    }

    pub fn update_with<F>(&mut self, options: UpdateOptions, mutator: F) -> EditorResult<()>
    where
        F: FnOnce(&mut Transaction<'_>) -> EditorResult<()>,
    {
        let mut pending = self
            .pending
            .take()
            .unwrap_or_else(|| PendingState::from_state(&self.state));
        pending.tags.extend(options.tags);
        pending.skip_transforms |= options.skip_transforms;
        let checkpoint = pending.clone();

        let result = {
            let mut tx = Transaction::new(&mut pending, &mut self.keys, &self.registry, &self.state, self.editable);
            mutator(&mut tx)
        };

        if let Err(error) = result {
            if checkpoint.has_changes(&self.state) {
                self.pending = Some(checkpoint);
            }
            self.report(&error);
            return Err(error);
        }

        self.pending = Some(pending);
        if options.discrete {
            self.flush()?;
        }
        Ok(())
    }

    /// Commit queued changes
    pub fn flush(&mut self) -> EditorResult<()> {
        match self.pending.take() {
            Some(pending) => self.commit(pending),
            None => Ok(()),
        }
    }

    /// Read the latest state, committing queued changes first
    pub fn read<R>(&mut self, reader: impl FnOnce(&EditorState) -> R) -> EditorResult<R> {
        self.flush()?;
        Ok(reader(&self.state))
    }

    /// Parse a serialized state with this editor's key generator and schema.
    /// Nothing is committed.
    pub fn parse_editor_state(&mut self, json: &str) -> EditorResult<EditorState> {
        Ok(serializer::parse_json(json, &mut self.keys, &self.schema)?)
    }

    /// Replace the document and selection, committing immediately
    pub fn set_editor_state(&mut self, state: &EditorState) -> EditorResult<()> {
        state.validate()?;
        self.flush()?;
        self.update_with(UpdateOptions::discrete(), |tx| {
            tx.set_editor_state(state);
            Ok(())
        })
    }

    pub fn to_json(&mut self) -> EditorResult<String> {
        self.flush()?;
        Ok(serializer::to_json(&self.state)?)
    }

    pub fn export_html(&mut self) -> EditorResult<String> {
        self.flush()?;
        Ok(render::export_html(&self.state, &self.config.theme)?)
    }

    /// Dispatch a command in its own discrete update. Returns whether a
    /// handler claimed it.
    pub fn dispatch_command<P: 'static>(&mut self, command: Command<P>, payload: P) -> EditorResult<bool> {
        let mut handled = false;
        self.update_with(UpdateOptions::discrete(), |tx| {
            handled = tx.dispatch_command(command, payload)?;
            Ok(())
        })?;
        Ok(handled)
    }

    /// Insert a host DOM forest at the selection, converting it through the
    /// DOM conversion registry
    pub fn import_dom(&mut self, dom: &[HostNode]) -> EditorResult<()> {
        self.update_with(UpdateOptions::discrete(), |tx| {
            let nodes = tx.generate_nodes_from_dom(dom)?;
            if tx.range_selection().is_none() {
                tx.select_all()?;
                let end = tx.range_selection().map(|r| r.focus.clone());
                if let Some(end) = end {
                    tx.select_caret(end);
                }
            }
            tx.insert_nodes(&nodes)
        })
    }

    // -----------------------------------------------------------------------
    // Registration

    fn handle(&self, id: u64) -> Unregister {
        Unregister::new(&self.registry, id)
    }

    /// Handle a command. Handlers run highest priority first; the first
    /// returning `true` stops propagation.
    pub fn register_command<P: 'static>(
        &self,
        command: Command<P>,
        priority: CommandPriority,
        handler: impl Fn(&P, &mut Transaction<'_>) -> EditorResult<bool> + 'static,
    ) -> Unregister {
        let erased = move |payload: &dyn Any, tx: &mut Transaction<'_>| match payload.downcast_ref::<P>() {
            Some(payload) => handler(payload, tx),
            None => Ok(false),
        };
        let id = self
            .registry
            .borrow_mut()
            .add_command(command.name(), priority, Rc::new(erased));
        self.handle(id)
    }

    /// Run `transform` on every dirty node of `node_type` at commit time
    pub fn register_node_transform(&self, node_type: &str, transform: impl NodeTransform + 'static) -> Unregister {
        let id = self.registry.borrow_mut().add_transform(node_type, Rc::new(transform));
        self.handle(id)
    }

    pub fn register_update_listener(&self, listener: impl Fn(&UpdatePayload) + 'static) -> Unregister {
        let id = self.registry.borrow_mut().add_update(Rc::new(listener));
        self.handle(id)
    }

    /// Called with the document text after commits that change it
    pub fn register_text_content_listener(&self, listener: impl Fn(&str) + 'static) -> Unregister {
        let id = self.registry.borrow_mut().add_text_content(Rc::new(listener));
        self.handle(id)
    }

    /// Called with the created, updated and destroyed nodes of `node_type`
    /// after commits touching any
    pub fn register_mutation_listener(
        &self,
        node_type: &str,
        listener: impl Fn(&BTreeMap<NodeKey, NodeMutation>, &UpdatePayload) + 'static,
    ) -> Unregister {
        let id = self.registry.borrow_mut().add_mutation(node_type, Rc::new(listener));
        self.handle(id)
    }

    pub fn register_decorator_listener(&self, listener: impl Fn(&BTreeMap<NodeKey, Value>) + 'static) -> Unregister {
        let id = self.registry.borrow_mut().add_decorator(Rc::new(listener));
        self.handle(id)
    }

    pub fn register_editable_listener(&self, listener: impl Fn(bool) + 'static) -> Unregister {
        let id = self.registry.borrow_mut().add_editable(Rc::new(listener));
        self.handle(id)
    }

    /// Called with `(new_root, previous_root)` when the host changes
    pub fn register_root_listener(&self, listener: impl Fn(Option<DomId>, Option<DomId>) + 'static) -> Unregister {
        let id = self.registry.borrow_mut().add_root(Rc::new(listener));
        self.handle(id)
    }

    pub fn register_error_listener(
        &self,
        listener: impl Fn(&crate::errors::EditorError) + 'static,
    ) -> Unregister {
        let id = self.registry.borrow_mut().add_error(Rc::new(listener));
        self.handle(id)
    }

    /// Convert host elements with `tag`. Higher priorities are tried first;
    /// returning `None` passes the element on.
    pub fn register_dom_conversion(
        &self,
        tag: &str,
        priority: u32,
        convert: impl Fn(&HostNode, &mut Transaction<'_>) -> EditorResult<Option<DomConversionOutput>> + 'static,
    ) -> Unregister {
        let mut registry = self.registry.borrow_mut();
        let id = registry.allocate();
        registry.conversions.add(id, tag, priority, Rc::new(convert));
        drop(registry);
        self.handle(id)
    }

    // -----------------------------------------------------------------------
    // Host

    /// Mount the document into `dom`, replacing any previous host
    pub fn set_host(&mut self, dom: impl HostDom + 'static) -> EditorResult<()> {
        self.flush()?;
        let mut dom: Box<dyn HostDom> = Box::new(dom);
        let previous = self.host.as_ref().map(|mounted| mounted.dom.root());

        let mut reconciler = Reconciler::new(dom.root(), self.config.theme.clone());
        let outcome = reconciler.mount(&self.state)?;
        dom.apply_all(&outcome.patches)?;
        let root = dom.root();
        debug!(%root, created = outcome.created, "mounted");

        self.host = Some(Mounted { dom, reconciler });
        self.last_outcome = Some(outcome);
        self.notify_root(Some(root), previous);
        Ok(())
    }

    /// Unmount from the current host. Later commits no longer produce DOM
    /// patches.
    pub fn detach_host(&mut self) -> Option<Box<dyn HostDom>> {
        let mounted = self.host.take()?;
        let previous = mounted.dom.root();
        self.notify_root(None, Some(previous));
        Some(mounted.dom)
    }

    pub fn root_dom(&self) -> Option<DomId> {
        self.host.as_ref().map(|mounted| mounted.dom.root())
    }

    /// Host DOM node currently rendering `key`
    pub fn dom_of(&self, key: &NodeKey) -> Option<DomId> {
        self.host.as_ref().and_then(|mounted| mounted.reconciler.dom_of(key))
    }

    fn notify_root(&self, root: Option<DomId>, previous: Option<DomId>) {
        let listeners = self.registry.borrow().root_listeners();
        for listener in listeners {
            listener(root, previous);
        }
    }

    /// Patches and counts of the most recent mount or reconcile
    pub fn last_reconciliation(&self) -> Option<&ReconcileOutcome> {
        self.last_outcome.as_ref()
    }

    /// Mounted decorator nodes and their payloads
    pub fn decorators(&self) -> &BTreeMap<NodeKey, Value> {
        &self.decorators
    }

    // -----------------------------------------------------------------------
    // Editable

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        if self.editable == editable {
            return;
        }
        self.editable = editable;
        let listeners = self.registry.borrow().editable_listeners();
        for listener in listeners {
            listener(editable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EditorError;
    use std::cell::Cell;
    use verso_model::Point;

    fn write_paragraph(tx: &mut Transaction<'_>, text: &str) -> EditorResult<()> {
        let paragraph = tx.create_paragraph();
        let key = tx.create_text(text);
        tx.append(&NodeKey::root(), &[paragraph.clone()])?;
        tx.append(&paragraph, &[key.clone()])?;
        tx.select_caret(Point::text(key, text.chars().count()));
        Ok(())
    }

    #[test]
    fn test_updates_coalesce_until_read() {
        let mut editor = Editor::default();
        let commits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&commits);
        editor.register_update_listener(move |_| counter.set(counter.get() + 1));

        editor.update(|tx| write_paragraph(tx, "one")).unwrap();
        editor.update(|tx| write_paragraph(tx, "two")).unwrap();
        assert!(editor.has_pending_update());
        assert_eq!(editor.state().text_content(), "");

        let text = editor.read(|state| state.text_content()).unwrap();
        assert_eq!(text, "one\n\ntwo");
        assert_eq!(commits.get(), 1);
    }

    #[test]
    fn test_failed_mutator_keeps_earlier_changes() {
        let mut editor = Editor::default();
        let errors = Rc::new(Cell::new(0));
        let counter = Rc::clone(&errors);
        editor.register_error_listener(move |_| counter.set(counter.get() + 1));

        editor.update(|tx| write_paragraph(tx, "kept")).unwrap();
        let result = editor.update(|tx| {
            write_paragraph(tx, "dropped")?;
            Err(EditorError::mutator("abort"))
        });
        assert_eq!(result, Err(EditorError::mutator("abort")));
        assert_eq!(errors.get(), 1);
        assert_eq!(editor.read(|s| s.text_content()).unwrap(), "kept");
    }

    #[test]
    fn test_editable_listener_fires_on_change_only() {
        let mut editor = Editor::default();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        editor.register_editable_listener(move |_| counter.set(counter.get() + 1));
        editor.set_editable(true);
        editor.set_editable(false);
        assert_eq!(calls.get(), 1);
        assert!(!editor.is_editable());
    }
}
