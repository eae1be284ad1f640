//! Tracked documents.
//!
//! [`Tracked`] couples a document with the per-instance state reconciliation
//! needs: its strategy and its exclusively-owned snapshot.

use crate::{
    reconcile::{self, MergeReport, ReconcileStrategy},
    snapshot::Snapshot,
    Document, DocumentId, Identity, IdentityState, Result, Revision,
};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Server acknowledgement of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub id: DocumentId,
    pub rev: Revision,
}

impl WriteAck {
    pub fn new(id: impl Into<DocumentId>, rev: impl Into<Revision>) -> Self {
        Self {
            id: id.into(),
            rev: rev.into(),
        }
    }
}

/// A document instance with its reconciliation state.
#[derive(Debug, Clone)]
pub struct Tracked<D: Document> {
    doc: D,
    strategy: ReconcileStrategy<D>,
    snapshot: Option<Snapshot<D>>,
}

impl<D: Document> Tracked<D> {
    /// Track a document that has not been synced with the server.
    pub fn new(doc: D) -> Self {
        let strategy = D::default_strategy();
        register_fields(&strategy);
        Self {
            doc,
            strategy,
            snapshot: None,
        }
    }

    /// Track a document just read from the server.
    ///
    /// The document's current state becomes the merge baseline.
    pub fn from_server(doc: D) -> Self {
        let strategy = D::default_strategy();
        register_fields(&strategy);
        let snapshot = Snapshot::capture(&doc, &strategy);
        Self {
            doc,
            strategy,
            snapshot,
        }
    }

    /// Builder-style method to set the strategy.
    pub fn with_strategy(mut self, strategy: ReconcileStrategy<D>) -> Self {
        self.set_strategy(strategy);
        self
    }

    /// Replace the strategy.
    ///
    /// A synced document gets a baseline for the new strategy right away,
    /// derived from its existing full snapshot when it has one and from its
    /// current state otherwise, so switch strategies before making local
    /// edits. A never-synced document gets its baseline at the first commit.
    pub fn set_strategy(&mut self, strategy: ReconcileStrategy<D>) {
        register_fields(&strategy);
        if self.doc.identity().state() == IdentityState::Synced {
            self.snapshot = match self.snapshot.as_ref().and_then(Snapshot::document) {
                Some(base) => Snapshot::capture(base, &strategy),
                None => Snapshot::capture(&self.doc, &strategy),
            };
        }
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> &ReconcileStrategy<D> {
        &self.strategy
    }

    pub fn snapshot(&self) -> Option<&Snapshot<D>> {
        self.snapshot.as_ref()
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn into_inner(self) -> D {
        self.doc
    }

    pub fn identity(&self) -> &Identity {
        self.doc.identity()
    }

    /// Whether a merge baseline exists for this instance.
    pub fn has_baseline(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Fields edited locally since the last sync (automatic merge only).
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.snapshot
            .as_ref()
            .map(|s| s.changed_fields(&self.doc))
            .unwrap_or_default()
    }

    /// Record a confirmed write.
    ///
    /// Applies the server-issued id and revision, then replaces the snapshot
    /// according to the strategy.
    pub fn commit(&mut self, ack: WriteAck) {
        let identity = self.doc.identity_mut();
        identity.id = Some(ack.id);
        identity.rev = Some(ack.rev);
        self.snapshot = Snapshot::capture(&self.doc, &self.strategy);
    }

    /// Merge against the server's current copy using this instance's
    /// strategy and baseline.
    pub fn reconcile(&mut self, theirs: &D) -> Result<MergeReport> {
        reconcile::reconcile(&mut self.doc, self.snapshot.as_ref(), theirs, &self.strategy)
    }
}

/// Build the field set as soon as a strategy that walks it is chosen, so an
/// incomplete set panics here rather than in the middle of a save.
fn register_fields<D: Document>(strategy: &ReconcileStrategy<D>) {
    if matches!(strategy, ReconcileStrategy::AutoMerge) {
        D::field_set();
    }
}

impl<D: Document> Deref for Tracked<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.doc
    }
}

impl<D: Document> DerefMut for Tracked<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.doc
    }
}

impl<D: Document> From<D> for Tracked<D> {
    fn from(doc: D) -> Self {
        Tracked::new(doc)
    }
}
