//! Conflict reconciliation.
//!
//! When the server rejects a write because the supplied revision is stale,
//! the local document can sometimes be merged against the server's current
//! copy and resubmitted. This module decides whether and how.
//!
//! # Algorithm
//!
//! Automatic merge is a three-way merge where the last-synced snapshot plays
//! the role of the common ancestor:
//!
//! 1. For every persisted field, if the local value still equals the
//!    snapshot value the local side did not touch it, so the server value
//!    is taken
//! 2. Otherwise the local edit is kept
//! 3. The revision is always replaced with the server's current revision,
//!    or the resubmitted write would conflict again

use crate::{snapshot::Snapshot, Document, DocumentId, Error, Result, Revision};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Document-supplied merge logic.
///
/// Called with the local document and the server's current copy. It should
/// leave the local document in the state to resubmit.
pub type MergeFn<D> = Arc<dyn Fn(&mut D, &D) + Send + Sync>;

/// How (or whether) a write conflict is resolved for a document instance.
pub enum ReconcileStrategy<D> {
    /// No merge; the conflict is returned to the caller (default)
    Propagate,
    /// Field-by-field merge against the last-synced snapshot
    AutoMerge,
    /// Merge delegated to document-supplied logic
    ManualMerge(MergeFn<D>),
}

impl<D> ReconcileStrategy<D> {
    /// Manual merge through a closure.
    pub fn manual(merge: impl Fn(&mut D, &D) + Send + Sync + 'static) -> Self {
        ReconcileStrategy::ManualMerge(Arc::new(merge))
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            ReconcileStrategy::Propagate => StrategyKind::Propagate,
            ReconcileStrategy::AutoMerge => StrategyKind::AutoMerge,
            ReconcileStrategy::ManualMerge(_) => StrategyKind::ManualMerge,
        }
    }

    /// Whether conflicts may be resolved locally at all.
    pub fn merges(&self) -> bool {
        !matches!(self, ReconcileStrategy::Propagate)
    }
}

impl<D> Default for ReconcileStrategy<D> {
    fn default() -> Self {
        ReconcileStrategy::Propagate
    }
}

impl<D> Clone for ReconcileStrategy<D> {
    fn clone(&self) -> Self {
        match self {
            ReconcileStrategy::Propagate => ReconcileStrategy::Propagate,
            ReconcileStrategy::AutoMerge => ReconcileStrategy::AutoMerge,
            ReconcileStrategy::ManualMerge(merge) => ReconcileStrategy::ManualMerge(merge.clone()),
        }
    }
}

impl<D> fmt::Debug for ReconcileStrategy<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind())
    }
}

/// Data-free tag of a [`ReconcileStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    #[default]
    Propagate,
    AutoMerge,
    ManualMerge,
}

/// What a successful merge did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Strategy that produced the merge
    pub strategy: StrategyKind,
    /// Fields overwritten with the server's value (automatic merge only)
    pub taken: Vec<&'static str>,
    /// Fields whose local edit was kept (automatic merge only)
    pub kept: Vec<&'static str>,
    /// Revision the merged document now carries
    pub revision: Option<Revision>,
}

/// Merge `mine` against the server's current copy.
///
/// Only called once a conflict has been signalled. `snapshot` is the
/// last-synced baseline owned by the document; without one there is nothing
/// to diff against and the conflict cannot be merged.
pub fn reconcile<D: Document>(
    mine: &mut D,
    snapshot: Option<&Snapshot<D>>,
    theirs: &D,
    strategy: &ReconcileStrategy<D>,
) -> Result<MergeReport> {
    let id = conflict_id(mine, theirs);

    match strategy {
        ReconcileStrategy::Propagate => Err(Error::Conflict(id)),
        ReconcileStrategy::AutoMerge => match snapshot {
            Some(Snapshot::Full(base)) => Ok(auto_merge(mine, base, theirs)),
            _ => Err(Error::Unmergeable(id)),
        },
        ReconcileStrategy::ManualMerge(merge) => {
            if snapshot.is_none() {
                return Err(Error::Unmergeable(id));
            }
            merge(&mut *mine, theirs);
            if mine.rev() != theirs.rev() {
                tracing::debug!(id = %id, "merge delegate left a stale revision; replacing it");
            }
            mine.identity_mut().rev = theirs.identity().rev.clone();
            Ok(MergeReport {
                strategy: StrategyKind::ManualMerge,
                taken: Vec::new(),
                kept: Vec::new(),
                revision: mine.identity().rev.clone(),
            })
        }
    }
}

fn auto_merge<D: Document>(mine: &mut D, base: &D, theirs: &D) -> MergeReport {
    let mut taken = Vec::new();
    let mut kept = Vec::new();

    for field in D::field_set().iter() {
        if field.same(mine, base) {
            field.assign(mine, theirs);
            taken.push(field.name());
        } else {
            kept.push(field.name());
        }
    }

    mine.identity_mut().rev = theirs.identity().rev.clone();

    MergeReport {
        strategy: StrategyKind::AutoMerge,
        taken,
        kept,
        revision: mine.identity().rev.clone(),
    }
}

fn conflict_id<D: Document>(mine: &D, theirs: &D) -> DocumentId {
    mine.id().or_else(|| theirs.id()).unwrap_or_default().to_string()
}
