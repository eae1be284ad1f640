//! Synchronous transport seam and save driver.

use crate::{
    save::{SaveAttempt, SaveOutcome, Step, WriteKind},
    tracked::WriteAck,
    Document, Error, Result, Tracked,
};

/// Something that can write and read documents with server-side revision
/// checks.
///
/// A stale revision must surface as [`Error::Conflict`] and a missing
/// document as [`Error::NotFound`]; other failures may use any other
/// variant.
pub trait Transport {
    /// Create (`WriteKind::Create`) or update (`WriteKind::Update`) a document.
    fn write<D: Document>(&mut self, kind: WriteKind, doc: &D) -> Result<WriteAck>;

    /// Read the current copy of a document.
    fn fetch<D: Document>(&mut self, id: &str) -> Result<D>;
}

impl<T: Transport> Transport for &mut T {
    fn write<D: Document>(&mut self, kind: WriteKind, doc: &D) -> Result<WriteAck> {
        (**self).write(kind, doc)
    }

    fn fetch<D: Document>(&mut self, id: &str) -> Result<D> {
        (**self).fetch(id)
    }
}

/// Save a tracked document, reconciling one write conflict if its strategy
/// allows.
///
/// On success the document carries the server-issued id and revision and a
/// fresh baseline. A conflict is returned when reconciliation is disabled,
/// impossible (never synced) or exhausted (the resubmit conflicted too).
pub fn save<T: Transport, D: Document>(
    transport: &mut T,
    doc: &mut Tracked<D>,
) -> Result<SaveOutcome> {
    let mut attempt = SaveAttempt::begin(doc);
    loop {
        match attempt.step() {
            Step::Write(kind) => match transport.write(kind, attempt.document()) {
                Ok(ack) => attempt.write_succeeded(ack),
                Err(Error::Conflict(_)) => attempt.write_conflicted()?,
                Err(e) => return Err(e),
            },
            Step::Fetch(id) => {
                let theirs = transport.fetch::<D>(&id)?;
                attempt.fetched(theirs)?;
            }
            Step::Done => break,
        }
    }
    attempt
        .finish()
        .ok_or_else(|| Error::InvalidDocument("save attempt ended without an outcome".into()))
}

/// Fetch a document and start tracking it with its current state as the
/// merge baseline.
pub fn load<T: Transport, D: Document>(transport: &mut T, id: &str) -> Result<Tracked<D>> {
    transport.fetch(id).map(Tracked::from_server)
}
