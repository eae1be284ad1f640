//! In-memory document database.
//!
//! [`MemoryDatabase`] applies the same revision checks a CouchDB-style server
//! does, so reconciliation can be exercised without a network. Documents are
//! kept as JSON objects; deleted documents stay behind as tombstones so their
//! revision history continues when they are recreated.

use crate::{
    revision, save::WriteKind, tracked::WriteAck, transport::Transport, Document, DocumentId,
    Error, Result, Revision,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const ID: &str = "_id";
const REV: &str = "_rev";
const DELETED: &str = "_deleted";

/// A stored document revision.
#[derive(Debug, Clone, PartialEq)]
struct Stored {
    rev: Revision,
    /// Body without `_id` / `_rev`
    body: Map<String, Value>,
    deleted: bool,
}

/// In-memory database with server-side MVCC checks.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    docs: BTreeMap<DocumentId, Stored>,
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document, assigning an id when the body has none.
    ///
    /// A body carrying an `_id` behaves like [`put`](Self::put) to that id.
    pub fn post(&mut self, body: Value) -> Result<WriteAck> {
        let id = match body.get(ID).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        self.put(&id, body)
    }

    /// Create or update the document at `id`.
    ///
    /// Updating a live document requires the body's `_rev` to match the
    /// current revision. A missing or deleted document is created, unless the
    /// body names a revision the database never issued.
    pub fn put(&mut self, id: &str, body: Value) -> Result<WriteAck> {
        let mut body = into_object(body)?;
        body.remove(ID);
        let supplied = match body.remove(REV) {
            Some(Value::String(rev)) => Some(rev),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(Error::InvalidDocument(format!("invalid _rev: {}", other)));
            }
        };
        let deleted = matches!(body.remove(DELETED), Some(Value::Bool(true)));

        let current = self.docs.get(id);
        if deleted && current.map_or(true, |s| s.deleted) {
            return Err(Error::NotFound(id.to_string()));
        }
        let accepted = match (current, supplied.as_deref()) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(stored), None) => stored.deleted,
            (Some(stored), Some(rev)) => stored.rev == rev,
        };
        if !accepted {
            return Err(Error::Conflict(id.to_string()));
        }

        let rev = revision::next(current.map(|s| s.rev.as_str()));
        self.docs.insert(
            id.to_string(),
            Stored {
                rev: rev.clone(),
                body: if deleted { Map::new() } else { body },
                deleted,
            },
        );
        Ok(WriteAck::new(id, rev))
    }

    /// The current body of a live document, including `_id` and `_rev`.
    pub fn get(&self, id: &str) -> Result<Value> {
        let stored = self.live(id)?;
        let mut body = Map::with_capacity(stored.body.len() + 2);
        body.insert(ID.into(), Value::String(id.to_string()));
        body.insert(REV.into(), Value::String(stored.rev.clone()));
        body.extend(stored.body.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Value::Object(body))
    }

    /// Delete a live document, leaving a tombstone.
    pub fn delete(&mut self, id: &str, rev: &str) -> Result<WriteAck> {
        let mut tombstone = Map::new();
        tombstone.insert(REV.into(), Value::String(rev.to_string()));
        tombstone.insert(DELETED.into(), Value::Bool(true));
        self.put(id, Value::Object(tombstone))
    }

    /// Write several documents.
    ///
    /// Each body is posted or put according to whether it has an `_id`;
    /// `"_deleted": true` deletes. Results are per document, in input order.
    /// With `all_or_nothing` the first failure aborts the whole batch and
    /// nothing is written.
    pub fn bulk(&mut self, bodies: Vec<Value>, all_or_nothing: bool) -> Result<Vec<Result<WriteAck>>> {
        let mut scratch = self.clone();
        let results: Vec<_> = bodies.into_iter().map(|body| scratch.post(body)).collect();

        if all_or_nothing {
            if let Some(Err(e)) = results.iter().find(|r| r.is_err()) {
                return Err(e.clone());
            }
        }
        *self = scratch;
        Ok(results)
    }

    /// Current revision of a live document.
    pub fn revision(&self, id: &str) -> Option<&str> {
        self.live(id).ok().map(|s| s.rev.as_str())
    }

    /// Whether a live document exists at `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.live(id).is_ok()
    }

    /// Id and revision of every live document, ordered by id.
    pub fn all_docs(&self) -> Vec<(DocumentId, Revision)> {
        self.docs
            .iter()
            .filter(|(_, s)| !s.deleted)
            .map(|(id, s)| (id.clone(), s.rev.clone()))
            .collect()
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.docs.values().filter(|s| !s.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self, id: &str) -> Result<&Stored> {
        self.docs
            .get(id)
            .filter(|s| !s.deleted)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl Transport for MemoryDatabase {
    fn write<D: Document>(&mut self, kind: WriteKind, doc: &D) -> Result<WriteAck> {
        let body = serde_json::to_value(doc)?;
        match kind {
            WriteKind::Create => self.post(body),
            WriteKind::Update => {
                let id = doc.id().ok_or(Error::MissingId)?;
                self.put(id, body)
            }
        }
    }

    fn fetch<D: Document>(&mut self, id: &str) -> Result<D> {
        Ok(serde_json::from_value(self.get(id)?)?)
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidDocument(format!(
            "document body must be a JSON object, got {}",
            other
        ))),
    }
}
