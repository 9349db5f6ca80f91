//! Rename detection decisions.
//!
//! On the upgrade pass every candidate rename is put to a [`ConfirmRename`]
//! collaborator and the answer is memoized. The downgrade pass never prompts:
//! it replays the memoized answer for the mirrored pair.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::diff::Direction;

/// Answers whether a candidate column pair is a rename.
pub trait ConfirmRename {
    /// Returns true to treat the pair described by `prompt` as a rename.
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> ConfirmRename for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Accepts every rename candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRename;

impl ConfirmRename for AlwaysRename {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

/// Rejects every rename candidate; renames become add + drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRename;

impl ConfirmRename for NeverRename {
    fn confirm(&mut self, _prompt: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RenameKey {
    entity: String,
    old_name: String,
    new_name: String,
}

/// Decides rename candidates for one diff session.
pub struct RenameResolver<'a> {
    confirmer: &'a mut dyn ConfirmRename,
    memo: BTreeMap<RenameKey, bool>,
}

impl<'a> RenameResolver<'a> {
    /// Creates a resolver with an empty memo.
    pub fn new(confirmer: &'a mut dyn ConfirmRename) -> Self {
        Self {
            confirmer,
            memo: BTreeMap::new(),
        }
    }

    /// Decides whether `old_name` became `new_name` in `entity`, where the
    /// names are relative to the pass being run.
    pub fn confirm(
        &mut self,
        direction: Direction,
        entity: &str,
        old_name: &str,
        new_name: &str,
    ) -> bool {
        match direction {
            Direction::Upgrade => {
                let key = RenameKey {
                    entity: entity.to_string(),
                    old_name: old_name.to_string(),
                    new_name: new_name.to_string(),
                };
                if let Some(&decision) = self.memo.get(&key) {
                    return decision;
                }
                let prompt = format!("Rename '{old_name}' to '{new_name}' in {entity}?");
                let decision = self.confirmer.confirm(&prompt);
                info!(entity, old_name, new_name, decision, "Rename decision");
                self.memo.insert(key, decision);
                decision
            }
            Direction::Downgrade => {
                let mirrored = RenameKey {
                    entity: entity.to_string(),
                    old_name: new_name.to_string(),
                    new_name: old_name.to_string(),
                };
                let decision = self.memo.get(&mirrored).copied().unwrap_or(false);
                debug!(entity, old_name, new_name, decision, "Replayed rename decision");
                decision
            }
        }
    }

    /// Confirmed renames as `(entity, old_name, new_name)`, upgrade-relative.
    pub fn confirmed(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.memo.iter().filter(|(_, &decision)| decision).map(|(key, _)| {
            (
                key.entity.as_str(),
                key.old_name.as_str(),
                key.new_name.as_str(),
            )
        })
    }

    /// Name that a confirmed upgrade rename gave to `old_name` in `entity`.
    ///
    /// The downgrade pass uses it to pick the column to rename back, since
    /// several candidates may share the same shape.
    pub fn renamed_to(&self, entity: &str, old_name: &str) -> Option<&str> {
        self.confirmed()
            .find(|&(e, old, _)| e == entity && old == old_name)
            .map(|(_, _, new)| new)
    }
}

impl std::fmt::Debug for RenameResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenameResolver")
            .field("memo", &self.memo)
            .finish_non_exhaustive()
    }
}
