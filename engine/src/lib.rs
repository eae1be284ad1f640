//! # Ottoman Engine
//!
//! Optimistic-concurrency reconciliation for CouchDB-style document stores.
//!
//! Every stored document carries a revision token. A write naming a stale
//! revision is rejected as a conflict. This crate decides what happens next:
//! give up, merge field by field against a remembered baseline, or hand both
//! copies to a caller-supplied merge function, and then retry exactly once.
//!
//! ## Design Principles
//!
//! - **No IO**: the save logic is a state machine; drivers do the requests
//! - **Per-instance state**: strategy and baseline belong to one [`Tracked`]
//! - **One retry**: a conflict on the resubmitted write is final
//!
//! ## Core Concepts
//!
//! ### Documents
//!
//! A [`Document`] is a serde type embedding an [`Identity`] (`_id`, `_rev`)
//! and listing its persisted fields with [`document_fields!`].
//!
//! ### Strategies
//!
//! - [`ReconcileStrategy::Propagate`] - surface every conflict (default)
//! - [`ReconcileStrategy::AutoMerge`] - three-way merge per field
//! - [`ReconcileStrategy::ManualMerge`] - caller merges the two copies
//!
//! ### Snapshots
//!
//! A [`Snapshot`] is the state last confirmed by the server. Automatic merge
//! keeps the whole document; manual merge keeps only the identity.
//!
//! ### Saving
//!
//! [`SaveAttempt`] runs write, fetch, merge and resubmit. [`save`] drives it
//! over any synchronous [`Transport`], such as the in-memory
//! [`MemoryDatabase`].
//!
//! ## Quick Start
//!
//! ```rust
//! use ottoman_engine::{
//!     document_fields, load, save, Document, Identity, MemoryDatabase,
//!     ReconcileStrategy, SaveOutcome, Tracked,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Car {
//!     #[serde(flatten)]
//!     identity: Identity,
//!     make: String,
//!     model: String,
//! }
//!
//! impl Document for Car {
//!     fn identity(&self) -> &Identity { &self.identity }
//!     fn identity_mut(&mut self) -> &mut Identity { &mut self.identity }
//!     document_fields!(Car { make, model });
//!     fn default_strategy() -> ReconcileStrategy<Self> { ReconcileStrategy::AutoMerge }
//! }
//!
//! let mut db = MemoryDatabase::new();
//!
//! // 1. Create
//! let mut mine = Tracked::new(Car { make: "Hoopty".into(), model: "Type R".into(), ..Default::default() });
//! save(&mut db, &mut mine).unwrap();
//!
//! // 2. Someone else changes the model
//! let mut theirs: Tracked<Car> = load(&mut db, mine.id().unwrap()).unwrap();
//! theirs.model = "Type S".into();
//! save(&mut db, &mut theirs).unwrap();
//!
//! // 3. A stale local edit merges instead of failing
//! mine.make = "Slightly Better".into();
//! let outcome = save(&mut db, &mut mine).unwrap();
//!
//! assert!(matches!(outcome, SaveOutcome::Reconciled(_)));
//! assert_eq!((mine.make.as_str(), mine.model.as_str()), ("Slightly Better", "Type S"));
//! assert!(mine.rev().unwrap().starts_with("3-"));
//! ```

pub mod document;
pub mod error;
pub mod fields;
pub mod memory;
pub mod reconcile;
pub mod revision;
pub mod save;
pub mod snapshot;
pub mod tracked;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use document::{Document, Identity, IdentityState};
pub use error::{Error, Result};
pub use fields::{Field, FieldSet};
pub use memory::MemoryDatabase;
pub use reconcile::{reconcile, MergeFn, MergeReport, ReconcileStrategy, StrategyKind};
pub use save::{SaveAttempt, SaveOutcome, Step, WriteKind};
pub use snapshot::Snapshot;
pub use tracked::{Tracked, WriteAck};
pub use transport::{load, save, Transport};

/// Type aliases for clarity
pub type DocumentId = String;
pub type Revision = String;
