//! Active context for the Benchmate assistant.
//!
//! Suppliers turn workbench state (open scripts, images, settings) into
//! [`ContextItem`]s; the [`ActiveContext`] deduplicates them and merges
//! excerpts of the same document so the model sees each document once.

pub mod aggregator;
pub mod item;
pub mod range;
pub mod supplier;

pub use aggregator::{ActiveContext, AddOutcome};
pub use item::{ContextItem, Payload, ScriptExcerpt};
pub use range::{LineRange, RangeError, merge_ranges};
pub use supplier::{
    ContextSupplier, ImageInfo, ImageSupplier, InMemoryWorkspace, ScriptDocument, ScriptSupplier,
    SettingsSupplier, SupplierError, Workspace, gather_available,
};
