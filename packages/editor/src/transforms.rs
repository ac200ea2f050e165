//! # Node Transforms
//!
//! Transforms are registered per node type and run at commit time on every
//! dirty node of that type. Anything a transform writes becomes dirty
//! again, so passes repeat until a pass dirties nothing.
//!
//! ```text
//! pass: dirty leaves   → normalize text, run transforms
//!       dirty elements → run transforms
//! repeat while the pass dirtied nodes (bounded by the pass limit)
//! ```
//!
//! Transforms must converge: a transform that writes unconditionally never
//! settles and the commit fails with `TransformNonTermination`.

use crate::errors::{EditorError, EditorResult};
use crate::transaction::Transaction;
use tracing::{trace, warn};
use verso_model::traversal;
use verso_model::NodeKey;

/// Commit-time rewrite of nodes of one type
pub trait NodeTransform {
    fn transform(&self, key: &NodeKey, tx: &mut Transaction<'_>) -> EditorResult<()>;
}

impl<F> NodeTransform for F
where
    F: Fn(&NodeKey, &mut Transaction<'_>) -> EditorResult<()>,
{
    fn transform(&self, key: &NodeKey, tx: &mut Transaction<'_>) -> EditorResult<()> {
        self(key, tx)
    }
}

/// Fixpoint loop over dirty nodes
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransformLoop {
    /// Passes allowed before giving up
    pub(crate) cap: usize,
    /// Registered transforms run; normalization always does
    pub(crate) run_transforms: bool,
}

impl TransformLoop {
    /// Returns the number of passes run
    pub(crate) fn run(&self, tx: &mut Transaction<'_>) -> EditorResult<usize> {
        let mut passes = 0;
        loop {
            let queue = tx.take_transform_queue();
            if queue.is_empty() {
                return Ok(passes);
            }
            if passes == self.cap {
                warn!(passes, "node transforms did not settle");
                return Err(EditorError::TransformNonTermination { iterations: passes });
            }
            passes += 1;

            // Attached nodes in document order, leaves before elements
            let mut ordered: Vec<(bool, Vec<usize>, NodeKey)> = queue
                .into_iter()
                .filter_map(|key| {
                    let is_element = tx.get(&key)?.is_element();
                    let path = traversal::path_to(tx.store(), &key)?;
                    Some((is_element, path, key))
                })
                .collect();
            ordered.sort();
            trace!(pass = passes, nodes = ordered.len(), "transform pass");

            for (is_element, _, key) in ordered {
                if !is_element {
                    tx.normalize_text_node(&key)?;
                }
                if self.run_transforms {
                    apply_transforms(tx, &key)?;
                }
            }
        }
    }
}

fn apply_transforms(tx: &mut Transaction<'_>, key: &NodeKey) -> EditorResult<()> {
    let Some(node) = tx.get(key) else {
        return Ok(());
    };
    let node_type = node.type_name().to_string();
    let transforms = tx.registry().borrow().transforms_for(&node_type);
    for transform in transforms {
        // An earlier transform may have removed or retyped the node
        let still_matches = tx.get(key).is_some_and(|n| n.type_name() == node_type);
        if !still_matches || !tx.is_attached(key) {
            break;
        }
        transform.transform(key, tx)?;
    }
    Ok(())
}
