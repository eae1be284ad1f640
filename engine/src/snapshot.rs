//! Change-tracking snapshots.
//!
//! A snapshot is the last-known-synced state of a document, used as the
//! merge baseline when a later save conflicts. Each tracked document owns its
//! snapshot exclusively; a new one replaces the old after every successful
//! commit and is never mutated in place.

use crate::{reconcile::ReconcileStrategy, Document, Identity};

/// Baseline captured at the last successful sync.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<D> {
    /// Independent copy of every persisted field (automatic merge)
    Full(D),
    /// Only id and revision (manual merge does its own comparison)
    IdentityOnly(Identity),
}

impl<D: Document> Snapshot<D> {
    /// Capture the baseline a document needs under `strategy`.
    ///
    /// Propagating documents keep no baseline at all. The copy is a plain
    /// document value with no strategy of its own, so it is never tracked
    /// itself.
    pub fn capture(doc: &D, strategy: &ReconcileStrategy<D>) -> Option<Self> {
        match strategy {
            ReconcileStrategy::Propagate => None,
            ReconcileStrategy::AutoMerge => Some(Snapshot::Full(doc.clone())),
            ReconcileStrategy::ManualMerge(_) => {
                Some(Snapshot::IdentityOnly(doc.identity().clone()))
            }
        }
    }

    pub fn identity(&self) -> &Identity {
        match self {
            Snapshot::Full(doc) => doc.identity(),
            Snapshot::IdentityOnly(identity) => identity,
        }
    }

    /// The full baseline document, if one was kept.
    pub fn document(&self) -> Option<&D> {
        match self {
            Snapshot::Full(doc) => Some(doc),
            Snapshot::IdentityOnly(_) => None,
        }
    }

    /// Names of fields changed in `doc` since this snapshot was taken.
    ///
    /// Empty for identity-only snapshots, which cannot tell.
    pub fn changed_fields(&self, doc: &D) -> Vec<&'static str> {
        match self {
            Snapshot::Full(base) => D::field_set().diff(base, doc),
            Snapshot::IdentityOnly(_) => Vec::new(),
        }
    }
}
