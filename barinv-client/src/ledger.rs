//! Local inventory ledger
//!
//! Deduplicated, order-sensitive collection of counted products. EAN is
//! the identity: an upsert for a known ean overwrites the entry in place
//! and keeps its position, while a new ean is inserted at the head so the
//! list reads most-recent-first. Both choices are deliberate (they match
//! how operators expect the count list to behave when editing an earlier
//! entry), not incidental.

use barinv_common::types::InventoryItem;

/// Ordered, ean-unique store of counted products. All mutation goes
/// through `upsert`/`remove`/`clear`; no other component touches the
/// collection directly.
#[derive(Debug, Default)]
pub struct InventoryLedger {
    items: Vec<InventoryItem>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Rebuild from persisted items, dropping any duplicate eans beyond
    /// the first occurrence so the uniqueness invariant holds even for a
    /// document written by an older revision.
    pub fn from_items(items: Vec<InventoryItem>) -> Self {
        let mut ledger = Self::new();
        for item in items {
            if ledger.get(&item.ean).is_none() {
                ledger.items.push(item);
            }
        }
        ledger
    }

    /// Record a counted product. Existing ean: overwrite in place,
    /// position preserved. New ean: insert at the head.
    pub fn upsert(&mut self, item: InventoryItem) {
        match self.items.iter_mut().find(|i| i.ean == item.ean) {
            Some(existing) => *existing = item,
            None => self.items.insert(0, item),
        }
    }

    /// Remove a counted product; no-op when absent.
    pub fn remove(&mut self, ean: &str) {
        self.items.retain(|i| i.ean != ean);
    }

    pub fn get(&self, ean: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|i| i.ean == ean)
    }

    /// Materialized ordered view, most recent first.
    pub fn list(&self) -> &[InventoryItem] {
        &self.items
    }

    /// Drop everything. Only called on session completion or an explicit
    /// "new inventory" action, never on transient errors.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
