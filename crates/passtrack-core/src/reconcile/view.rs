//! The reconciled in-memory view
//!
//! `conquered` is derived from `conquests` and every mutator keeps the two in
//! step, so readers never observe a set that disagrees with the list. Only
//! the reconciler mutates a view; everyone else gets a [`ViewSnapshot`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::{ConquestRecord, PassId};

#[derive(Debug, Clone, Default)]
pub struct ReconciledView {
    conquered: BTreeSet<PassId>,
    conquests: Vec<ConquestRecord>,
    favorites: BTreeSet<PassId>,
}

impl ReconciledView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conquered_pass_ids(&self) -> &BTreeSet<PassId> {
        &self.conquered
    }

    pub fn conquests(&self) -> &[ConquestRecord] {
        &self.conquests
    }

    pub fn favorite_pass_ids(&self) -> &BTreeSet<PassId> {
        &self.favorites
    }

    pub fn conquest(&self, pass_id: &PassId) -> Option<&ConquestRecord> {
        self.conquests.iter().find(|r| r.pass_id == *pass_id)
    }

    pub fn is_conquered(&self, pass_id: &PassId) -> bool {
        self.conquered.contains(pass_id)
    }

    pub fn is_favorite(&self, pass_id: &PassId) -> bool {
        self.favorites.contains(pass_id)
    }

    /// Whether the derived set matches the record list exactly
    pub fn is_consistent(&self) -> bool {
        self.conquests.len() == self.conquered.len()
            && self
                .conquests
                .iter()
                .all(|r| self.conquered.contains(&r.pass_id))
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            conquered_pass_ids: self.conquered.clone(),
            conquests: self.conquests.clone(),
            favorite_pass_ids: self.favorites.clone(),
        }
    }

    /// Replace the conquest slice wholesale.
    ///
    /// If the source returns the same pass twice the later record wins, in
    /// the position of the first.
    pub(crate) fn replace_conquests(&mut self, records: Vec<ConquestRecord>) {
        self.conquests.clear();
        self.conquered.clear();
        for record in records {
            self.upsert_conquest(record);
        }
    }

    /// Insert a record, or overwrite the one already held for its pass
    pub(crate) fn upsert_conquest(&mut self, record: ConquestRecord) {
        match self
            .conquests
            .iter_mut()
            .find(|r| r.pass_id == record.pass_id)
        {
            Some(existing) => *existing = record,
            None => {
                self.conquered.insert(record.pass_id.clone());
                self.conquests.push(record);
            }
        }
    }

    pub(crate) fn remove_conquest(&mut self, pass_id: &PassId) -> Option<ConquestRecord> {
        let index = self.conquests.iter().position(|r| r.pass_id == *pass_id)?;
        self.conquered.remove(pass_id);
        Some(self.conquests.remove(index))
    }

    pub(crate) fn replace_favorites(&mut self, passes: impl IntoIterator<Item = PassId>) {
        self.favorites = passes.into_iter().collect();
    }

    pub(crate) fn insert_favorite(&mut self, pass_id: PassId) -> bool {
        self.favorites.insert(pass_id)
    }

    pub(crate) fn remove_favorite(&mut self, pass_id: &PassId) -> bool {
        self.favorites.remove(pass_id)
    }

    pub(crate) fn clear(&mut self) {
        self.conquests.clear();
        self.conquered.clear();
        self.favorites.clear();
    }
}

/// Read-only copy of the view handed to UI code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub conquered_pass_ids: BTreeSet<PassId>,
    pub conquests: Vec<ConquestRecord>,
    pub favorite_pass_ids: BTreeSet<PassId>,
}
