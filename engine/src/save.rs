//! Save orchestration.
//!
//! [`SaveAttempt`] is the state machine behind a single `save` call. It
//! performs no IO: a driver asks it for the next [`Step`], performs the
//! write or fetch against its transport, and feeds the result back. Both the
//! synchronous [`save`](crate::save()) driver and the async HTTP client drive
//! the same machine.
//!
//! ```text
//! Start ──write──▶ Success ─────────────────────────────▶ Done
//!   │
//!   └─conflict─▶ (propagate | never synced) ────────────▶ Failed
//!                  │
//!                  └─▶ fetch ─▶ merge ─▶ write ─▶ Done
//!                                          │
//!                                          └─conflict──▶ Failed
//! ```
//!
//! At most two writes happen per attempt. A conflict on the resubmitted
//! write is terminal.

use crate::{
    reconcile::MergeReport, tracked::WriteAck, Document, DocumentId, Error, Result, Tracked,
};

/// Which request a write step needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// No id yet: POST and let the server assign one
    Create,
    /// PUT to the document's id
    Update,
}

/// The next thing a driver must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Write [`SaveAttempt::document`] with the given request kind
    Write(WriteKind),
    /// Fetch the server's current copy of this id
    Fetch(DocumentId),
    /// Attempt finished; call [`SaveAttempt::finish`]
    Done,
}

/// How a successful save went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The server assigned or accepted a new document
    Created,
    /// An existing document was updated without conflict
    Updated,
    /// A conflict was merged and the resubmitted write succeeded
    Reconciled(MergeReport),
}

#[derive(Debug)]
enum State {
    Writing { resubmit: Option<MergeReport> },
    Fetching { id: DocumentId },
    Done(SaveOutcome),
    Failed,
}

/// State machine for one save call on one tracked document.
#[derive(Debug)]
pub struct SaveAttempt<'a, D: Document> {
    doc: &'a mut Tracked<D>,
    state: State,
}

impl<'a, D: Document> SaveAttempt<'a, D> {
    /// Start saving `doc`.
    pub fn begin(doc: &'a mut Tracked<D>) -> Self {
        Self {
            doc,
            state: State::Writing { resubmit: None },
        }
    }

    pub fn step(&self) -> Step {
        match &self.state {
            State::Writing { .. } => Step::Write(self.write_kind()),
            State::Fetching { id } => Step::Fetch(id.clone()),
            State::Done(_) | State::Failed => Step::Done,
        }
    }

    /// The document body to send on a write step.
    pub fn document(&self) -> &D {
        self.doc.document()
    }

    /// Whether the current write is the one-shot resubmit after a merge.
    pub fn is_resubmit(&self) -> bool {
        matches!(self.state, State::Writing { resubmit: Some(_) })
    }

    /// The write was confirmed by the server.
    pub fn write_succeeded(&mut self, ack: WriteAck) {
        let kind = self.write_kind();
        let resubmit = match std::mem::replace(&mut self.state, State::Failed) {
            State::Writing { resubmit } => resubmit,
            other => {
                self.state = other;
                return;
            }
        };

        self.doc.commit(ack);
        let outcome = match (resubmit, kind) {
            (Some(report), _) => SaveOutcome::Reconciled(report),
            (None, WriteKind::Create) => SaveOutcome::Created,
            (None, WriteKind::Update) => SaveOutcome::Updated,
        };
        self.state = State::Done(outcome);
    }

    /// The server rejected the write as a conflict.
    ///
    /// Moves on to fetching the server copy when the document can be merged;
    /// otherwise the attempt fails with the error the caller should see.
    pub fn write_conflicted(&mut self) -> Result<()> {
        let resubmit = match &self.state {
            State::Writing { resubmit } => resubmit.is_some(),
            _ => return Ok(()),
        };
        self.state = State::Failed;

        // A create has no id to fetch by, so it can only be reported.
        let id = match self.doc.id() {
            Some(id) => id.to_string(),
            None => return Err(Error::Conflict(DocumentId::new())),
        };

        if resubmit {
            tracing::warn!(id = %id, "conflict after merge; giving up");
            return Err(Error::Conflict(id));
        }
        if !self.doc.strategy().merges() {
            return Err(Error::Conflict(id));
        }
        if self.doc.rev().is_none() || !self.doc.has_baseline() {
            tracing::debug!(id = %id, "conflict on never-synced document");
            return Err(Error::Unmergeable(id));
        }

        tracing::debug!(id = %id, strategy = ?self.doc.strategy().kind(), "write conflict; fetching server copy");
        self.state = State::Fetching { id };
        Ok(())
    }

    /// The server's current copy arrived; merge it in and prepare the
    /// resubmit.
    pub fn fetched(&mut self, theirs: D) -> Result<()> {
        if !matches!(self.state, State::Fetching { .. }) {
            return Ok(());
        }
        self.state = State::Failed;

        let report = self.doc.reconcile(&theirs)?;
        tracing::info!(
            id = self.doc.id().unwrap_or_default(),
            rev = report.revision.as_deref().unwrap_or_default(),
            kept = ?report.kept,
            "merged conflicting write"
        );
        self.state = State::Writing {
            resubmit: Some(report),
        };
        Ok(())
    }

    /// Whether the attempt ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Done(_) | State::Failed)
    }

    /// Consume the attempt, returning the outcome if it succeeded.
    pub fn finish(self) -> Option<SaveOutcome> {
        match self.state {
            State::Done(outcome) => Some(outcome),
            _ => None,
        }
    }

    fn write_kind(&self) -> WriteKind {
        if self.doc.id().is_some() {
            WriteKind::Update
        } else {
            WriteKind::Create
        }
    }
}
