//! Ordering of raw operations into a safe execution sequence.
//!
//! Deferred operations reference columns or tables touched by other
//! operations of the same pass. Destructive ones (`Drop*`) must run before
//! what they depend on disappears, additive ones (`Create*`/`Add*`) after
//! what they reference exists.

use tracing::debug;

use crate::operations::MigrationOperation;

/// Merges deferred operations around the immediate ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationSequencer;

impl OperationSequencer {
    /// Creates a new sequencer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Orders `raw`: destructive deferred operations first, then immediate
    /// operations, then additive deferred operations. Each group keeps its
    /// emission order.
    #[must_use]
    pub fn sequence(&self, raw: Vec<MigrationOperation>) -> Vec<MigrationOperation> {
        let mut leading = Vec::new();
        let mut immediate = Vec::new();
        let mut trailing = Vec::new();

        for op in raw {
            if !op.deferred {
                immediate.push(op);
            } else if op.kind.is_destructive() {
                leading.push(op);
            } else if op.kind.is_additive() {
                trailing.push(op);
            } else {
                immediate.push(op);
            }
        }

        debug!(
            leading = leading.len(),
            immediate = immediate.len(),
            trailing = trailing.len(),
            "Sequenced operations"
        );

        leading.extend(immediate);
        leading.extend(trailing);
        leading
    }
}
