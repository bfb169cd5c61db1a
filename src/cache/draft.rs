//! Reversible edits on a cached query result
//!
//! A [`Draft`] wraps the current result while a patch runs. Each edit records
//! its inverse as an [`UndoOp`]; the ops end up in an [`UndoToken`], a plain
//! value that can be inspected, committed, or handed back to the cache to undo
//! the patch. Undo replays the ops newest-first, which restores list order
//! exactly when nothing else touched the result in between.

use board_types::{EntityId, Record};

use super::QueryKey;

/// A cached query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData<E> {
    List(Vec<E>),
    /// Point query
    Item(E),
}

impl<E: Record> QueryData<E> {
    pub fn records(&self) -> &[E] {
        match self {
            QueryData::List(records) => records,
            QueryData::Item(record) => std::slice::from_ref(record),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn find(&self, id: &EntityId) -> Option<&E> {
        self.records().iter().find(|r| r.id() == id)
    }

    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.records().iter().position(|r| r.id() == id)
    }

    fn find_mut(&mut self, id: &EntityId) -> Option<&mut E> {
        match self {
            QueryData::List(records) => records.iter_mut().find(|r| r.id() == id),
            QueryData::Item(record) if record.id() == id => Some(record),
            QueryData::Item(_) => None,
        }
    }
}

/// Inverse of one draft edit.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoOp<E> {
    /// Drop the record inserted at the head
    Remove { id: EntityId },
    /// Put back a record that was removed from `index`
    Reinsert { index: usize, record: E },
    /// Swap whatever is currently keyed `id` back to `previous`
    Restore { id: EntityId, previous: E },
}

impl<E: Record> UndoOp<E> {
    /// Apply to `data`. A target that has since disappeared is skipped, and
    /// so is a reinsert whose record a refetch already brought back.
    pub(crate) fn apply(self, data: &mut QueryData<E>) {
        match self {
            UndoOp::Remove { id } => {
                if let QueryData::List(records) = data {
                    if let Some(pos) = records.iter().position(|r| r.id() == &id) {
                        records.remove(pos);
                    }
                }
            }
            UndoOp::Reinsert { index, record } => {
                if let QueryData::List(records) = data {
                    if records.iter().any(|r| r.id() == record.id()) {
                        return;
                    }
                    let index = index.min(records.len());
                    records.insert(index, record);
                }
            }
            UndoOp::Restore { id, previous } => {
                if let Some(current) = data.find_mut(&id) {
                    *current = previous;
                }
            }
        }
    }
}

/// Reverses exactly one `patch` call.
///
/// Consumed by [`CacheStore::undo`](super::CacheStore::undo) or
/// [`commit`](Self::commit), so it can be settled at most once.
#[must_use = "an undo token must be committed or undone"]
#[derive(Debug, PartialEq)]
pub struct UndoToken<E> {
    key: QueryKey,
    ops: Vec<UndoOp<E>>,
}

impl<E: Record> UndoToken<E> {
    pub(crate) fn new(key: QueryKey, ops: Vec<UndoOp<E>>) -> Self {
        Self { key, ops }
    }

    /// Token for a patch that changed nothing.
    pub(crate) fn noop(key: QueryKey) -> Self {
        Self::new(key, Vec::new())
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn ops(&self) -> &[UndoOp<E>] {
        &self.ops
    }

    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }

    /// The patch is final; drop the inverse.
    pub fn commit(self) {
        tracing::trace!(key = %self.key, ops = self.ops.len(), "patch committed");
    }

    pub(crate) fn into_parts(self) -> (QueryKey, Vec<UndoOp<E>>) {
        (self.key, self.ops)
    }
}

/// Mutable view of a cached result handed to a patch closure.
pub struct Draft<'a, E: Record> {
    data: &'a mut QueryData<E>,
    journal: Vec<UndoOp<E>>,
}

impl<'a, E: Record> Draft<'a, E> {
    pub(crate) fn new(data: &'a mut QueryData<E>) -> Self {
        Self {
            data,
            journal: Vec::new(),
        }
    }

    pub(crate) fn into_journal(self) -> Vec<UndoOp<E>> {
        self.journal
    }

    pub fn records(&self) -> &[E] {
        self.data.records()
    }

    pub fn find(&self, id: &EntityId) -> Option<&E> {
        self.data.find(id)
    }

    /// Insert ahead of every other record. Point queries are left alone.
    pub fn insert_at_head(&mut self, record: E) -> bool {
        let QueryData::List(records) = &mut *self.data else {
            return false;
        };
        let id = record.id().clone();
        records.insert(0, record);
        self.journal.push(UndoOp::Remove { id });
        true
    }

    /// Replace the record keyed `id` in place, keeping its position.
    pub fn replace_by_id(&mut self, id: &EntityId, record: E) -> bool {
        let new_id = record.id().clone();
        let Some(current) = self.data.find_mut(id) else {
            return false;
        };
        let previous = std::mem::replace(current, record);
        self.journal.push(UndoOp::Restore {
            id: new_id,
            previous,
        });
        true
    }

    pub fn remove_by_id(&mut self, id: &EntityId) -> Option<E> {
        let QueryData::List(records) = &mut *self.data else {
            return None;
        };
        let index = records.iter().position(|r| r.id() == id)?;
        let record = records.remove(index);
        self.journal.push(UndoOp::Reinsert {
            index,
            record: record.clone(),
        });
        Some(record)
    }

    /// Remove every listed id in one edit. Returns how many were present.
    pub fn remove_ids(&mut self, ids: &[EntityId]) -> usize {
        ids.iter()
            .filter_map(|id| self.remove_by_id(id))
            .count()
    }

    /// Shallow-merge `patch` onto the record keyed `id`; returns the result.
    pub fn merge_fields(&mut self, id: &EntityId, patch: &E::Patch) -> Option<E> {
        let current = self.data.find_mut(id)?;
        let previous = current.clone();
        current.apply_patch(patch);
        let merged = current.clone();
        self.journal.push(UndoOp::Restore {
            id: id.clone(),
            previous,
        });
        Some(merged)
    }
}
