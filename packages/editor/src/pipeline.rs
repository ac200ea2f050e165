//! # Commit Pipeline
//!
//! Turns a pending state into the next committed state:
//! Transforms → Collect → Validate → Freeze → Reconcile → Notify
//!
//! The pipeline:
//! - runs node transforms and text normalization to a fixpoint
//! - drops nodes left detached by the transaction
//! - checks the touched region and the selection
//! - diffs the previous and next state into DOM patches for the host
//! - tells mutation, decorator, text content and update listeners, in that
//!   order
//!
//! Any failure before the state swap leaves the committed state untouched
//! and the pending changes discarded.

use crate::editor::Editor;
use crate::errors::{EditorError, EditorResult};
use crate::listeners::{NodeMutation, UpdatePayload};
use crate::normalize::{collect_garbage, validate_dirty};
use crate::transaction::{PendingState, Transaction};
use crate::transforms::TransformLoop;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};
use verso_model::{EditorState, NodeKey, NodeKind};
use verso_reconciler::{DirtySets, HostDom};

impl Editor {
    /// Commit a pending state. Errors are reported to error listeners
    /// before being returned.
    pub(crate) fn commit(&mut self, mut pending: PendingState) -> EditorResult<()> {
        match self.try_commit(&mut pending) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.report(&error);
                Err(error)
            }
        }
    }

    #[instrument(skip_all, fields(leaves = pending.dirty_leaves.len(), elements = pending.dirty_elements.len()))]
    fn try_commit(&mut self, pending: &mut PendingState) -> EditorResult<()> {
        if !pending.has_changes(&self.state) {
            trace!("nothing to commit");
            return Ok(());
        }

        // 1. Transforms and normalization
        let transforms = TransformLoop {
            cap: self.config.transform_cap(pending.store.len()),
            run_transforms: !pending.skip_transforms && self.registry.borrow().has_transforms(),
        };
        let passes = {
            let mut tx = Transaction::new(pending, &mut self.keys, &self.registry, &self.state, self.editable);
            transforms.run(&mut tx)?
        };

        // 2. Garbage collection
        let collected = collect_garbage(pending);

        // 3. Validation
        validate_dirty(pending)?;

        // 4. Freeze
        let prev = Arc::clone(&self.state);
        let next = Arc::new(EditorState::new(pending.store.clone(), pending.selection.clone()));

        // 5. Reconcile
        if let Some(mounted) = &mut self.host {
            let dirty = DirtySets::new(&pending.dirty_leaves, &pending.dirty_elements);
            let dirty = if pending.full_reconcile { dirty.full() } else { dirty };
            let outcome = mounted.reconciler.reconcile(&prev, &next, dirty)?;
            mounted.dom.apply_all(&outcome.patches)?;
            self.last_outcome = Some(outcome);
        }

        self.state = Arc::clone(&next);
        debug!(passes, collected = collected.len(), "committed");

        // 6. Notify
        let payload = UpdatePayload {
            prev_state: prev,
            state: next,
            dirty_leaves: std::mem::take(&mut pending.dirty_leaves),
            dirty_elements: std::mem::take(&mut pending.dirty_elements),
            tags: std::mem::take(&mut pending.tags),
        };
        let decorators_changed = self.refresh_decorators(&payload, pending.full_reconcile, &collected);
        self.notify(&payload, &collected, decorators_changed);
        Ok(())
    }

    /// Keep the decorator map in step with the committed state. Returns
    /// whether it changed.
    fn refresh_decorators(&mut self, payload: &UpdatePayload, full: bool, collected: &[NodeKey]) -> bool {
        let state = &payload.state;
        let decorator_payload = |key: &NodeKey| match state.node(key).map(|n| &n.kind) {
            Some(NodeKind::Decorator(data)) => Some(data.payload.clone()),
            _ => None,
        };

        if full {
            let next: BTreeMap<NodeKey, serde_json::Value> = state
                .store()
                .keys()
                .filter_map(|key| decorator_payload(key).map(|payload| (key.clone(), payload)))
                .collect();
            let changed = next != self.decorators;
            self.decorators = next;
            return changed;
        }

        let mut changed = false;
        for key in payload.dirty_leaves.iter().chain(collected) {
            match decorator_payload(key) {
                Some(value) => {
                    if self.decorators.get(key) != Some(&value) {
                        self.decorators.insert(key.clone(), value);
                        changed = true;
                    }
                }
                None => changed |= self.decorators.remove(key).is_some(),
            }
        }
        changed
    }

    fn notify(&self, payload: &UpdatePayload, collected: &[NodeKey], decorators_changed: bool) {
        let (mutation, decorator, text_content, update) = {
            let registry = self.registry.borrow();
            (
                registry.mutation_listeners(),
                registry.decorator_listeners(),
                registry.text_content_listeners(),
                registry.update_listeners(),
            )
        };

        if !mutation.is_empty() {
            let records = mutation_records(payload, collected);
            for (node_type, listeners) in &mutation {
                let Some(records) = records.get(node_type.as_str()) else {
                    continue;
                };
                for listener in listeners {
                    listener(records, payload);
                }
            }
        }

        if decorators_changed {
            for listener in &decorator {
                listener(&self.decorators);
            }
        }

        if !text_content.is_empty() && !payload.is_selection_only() {
            let prev = payload.prev_state.text_content();
            let next = payload.state.text_content();
            if prev != next {
                for listener in &text_content {
                    listener(&next);
                }
            }
        }

        for listener in &update {
            listener(payload);
        }
    }

    pub(crate) fn report(&self, error: &EditorError) {
        warn!(%error, "update failed");
        let listeners = self.registry.borrow().error_listeners();
        for listener in listeners {
            listener(error);
        }
    }
}

/// Created, updated and destroyed nodes of a commit, grouped by node type
pub(crate) fn mutation_records(
    payload: &UpdatePayload,
    collected: &[NodeKey],
) -> BTreeMap<String, BTreeMap<NodeKey, NodeMutation>> {
    let prev = payload.prev_state.store();
    let next = payload.state.store();
    let keys: HashSet<&NodeKey> = payload
        .dirty_leaves
        .iter()
        .chain(payload.dirty_elements.keys())
        .chain(collected)
        .collect();

    let mut records: BTreeMap<String, BTreeMap<NodeKey, NodeMutation>> = BTreeMap::new();
    for key in keys {
        let (node_type, mutation) = match (prev.get(key), next.get(key)) {
            (None, Some(node)) => (node.type_name(), NodeMutation::Created),
            (Some(node), None) => (node.type_name(), NodeMutation::Destroyed),
            (Some(_), Some(node)) if !prev.shares_node(next, key) => (node.type_name(), NodeMutation::Updated),
            _ => continue,
        };
        records
            .entry(node_type.to_string())
            .or_default()
            .insert(key.clone(), mutation);
    }
    records
}

/// A host DOM with the reconciler that tracks it
pub(crate) struct Mounted {
    pub(crate) dom: Box<dyn HostDom>,
    pub(crate) reconciler: verso_reconciler::Reconciler,
}
