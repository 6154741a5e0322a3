//! The active context set attached to the next outgoing request.
//!
//! Readers take an `Arc` snapshot and never hold the lock while iterating.
//! Every change installs a new vector under the write lock.

use std::sync::Arc;

use benchmate_core::error::MergeError;
use benchmate_core::event::{DomainEvent, EventBus};
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::item::ContextItem;
use crate::supplier::{ContextSupplier, SupplierError, Workspace};

/// What [`ActiveContext::add`] did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Folded into the existing item with the same merge key.
    Merged,
    /// An equal item was already active; nothing changed.
    Duplicate,
}

#[derive(Default)]
pub struct ActiveContext {
    items: RwLock<Arc<Vec<ContextItem>>>,
    events: Option<Arc<EventBus>>,
}

impl ActiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn add(&self, item: ContextItem) -> Result<AddOutcome, MergeError> {
        let mut guard = self.items.write();
        if guard.contains(&item) {
            debug!(kind = item.kind(), label = item.label(), "Context item already active");
            return Ok(AddOutcome::Duplicate);
        }

        let mut next = guard.as_ref().clone();
        let existing = item
            .merge_key()
            .and_then(|key| next.iter().position(|i| i.merge_key() == Some(key)));
        let outcome = match existing {
            Some(index) => {
                next[index] = next[index].merge_with(std::slice::from_ref(&item))?;
                debug!(label = next[index].label(), "Merged context item");
                AddOutcome::Merged
            }
            None => {
                debug!(kind = item.kind(), label = item.label(), "Added context item");
                next.push(item);
                AddOutcome::Added
            }
        };

        let active = next.len();
        *guard = Arc::new(next);
        drop(guard);
        self.changed(active);
        Ok(outcome)
    }

    /// Remove the entry equal to `item`. A merged entry goes as a whole.
    pub fn remove(&self, item: &ContextItem) -> bool {
        let mut guard = self.items.write();
        let Some(index) = guard.iter().position(|i| i == item) else {
            return false;
        };
        let mut next = guard.as_ref().clone();
        next.remove(index);
        let active = next.len();
        *guard = Arc::new(next);
        drop(guard);
        self.changed(active);
        true
    }

    pub fn clear(&self) {
        *self.items.write() = Arc::new(Vec::new());
        self.changed(0);
    }

    pub fn snapshot(&self) -> Arc<Vec<ContextItem>> {
        self.items.read().clone()
    }

    /// All active items as one block, or `None` when nothing is active.
    pub fn render(&self) -> Option<String> {
        let items = self.snapshot();
        if items.is_empty() {
            return None;
        }
        let blocks: Vec<String> = items.iter().map(ContextItem::render).collect();
        Some(format!("## Active Context\n\n{}", blocks.join("\n\n")))
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Add the supplier's current item, if it has one.
    pub fn add_from(
        &self,
        supplier: &dyn ContextSupplier,
        workspace: &dyn Workspace,
    ) -> Result<Option<AddOutcome>, SupplierError> {
        match supplier.create_active_item(workspace)? {
            Some(item) => Ok(Some(self.add(item)?)),
            None => Ok(None),
        }
    }

    fn changed(&self, active_items: usize) {
        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::ContextChanged {
                active_items,
                timestamp: Utc::now(),
            });
        }
    }
}

impl std::fmt::Debug for ActiveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveContext")
            .field("items", &self.len())
            .finish_non_exhaustive()
    }
}
