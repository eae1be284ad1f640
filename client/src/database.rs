//! Document operations against one database.
//!
//! # Algorithm
//!
//! [`Database::save`] drives the engine's [`SaveAttempt`] over HTTP:
//! 1. POST (no id) or PUT (with id) the document
//! 2. On 409, ask the attempt whether the conflict can be reconciled
//! 3. If so, GET the server copy and let the attempt merge it
//! 4. PUT the merged document once more; a second 409 is returned as is
//!
//! Views are defined with [`DesignDocument`]s and read with
//! [`Database::query`]. A query carrying a key list is POSTed.

use crate::{
    design::DesignDocument,
    error::{bulk_error, check, ClientError, Result},
    server::join,
    view::{ViewQuery, ViewResult},
};
use ottoman_engine::{
    revision, Document, DocumentId, Error, Identity, Revision, SaveAttempt, SaveOutcome, Step,
    Tracked, WriteAck, WriteKind,
};
use reqwest::{
    header::{ETAG, IF_NONE_MATCH},
    Client, Method, StatusCode, Url,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body of a successful single-document write.
#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    ok: bool,
    id: DocumentId,
    rev: Revision,
}

/// One entry of a `_bulk_docs` response.
#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    id: DocumentId,
    rev: Option<Revision>,
    error: Option<String>,
    reason: Option<String>,
}

#[derive(Serialize)]
struct BulkRequest<'a, T> {
    docs: &'a [T],
    all_or_nothing: bool,
}

#[derive(Debug, Deserialize)]
struct DatabaseInfo {
    #[serde(default)]
    doc_count: u64,
}

/// Handle to one database on a server.
#[derive(Debug, Clone)]
pub struct Database {
    http: Client,
    root: Url,
    name: String,
}

impl Database {
    pub(crate) fn new(http: Client, root: Url, name: String) -> Self {
        Self { http, root, name }
    }

    /// Full database name, including any server prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Save a tracked document, reconciling one conflict if its strategy
    /// allows.
    ///
    /// On success the document carries the server's id and latest revision
    /// and a fresh merge baseline.
    pub async fn save<D: Document>(&self, doc: &mut Tracked<D>) -> Result<SaveOutcome> {
        let mut attempt = SaveAttempt::begin(doc);
        loop {
            match attempt.step() {
                Step::Write(kind) => match self.write(kind, attempt.document()).await {
                    Ok(ack) => attempt.write_succeeded(ack),
                    Err(ClientError::Document(Error::Conflict(_))) => attempt.write_conflicted()?,
                    Err(e) => return Err(e),
                },
                Step::Fetch(id) => {
                    let theirs = self.read::<D>(&id).await?;
                    attempt.fetched(theirs)?;
                }
                Step::Done => break,
            }
        }
        attempt.finish().ok_or_else(|| {
            Error::InvalidDocument("save attempt ended without an outcome".into()).into()
        })
    }

    /// Fetch a document. A missing document is an error.
    pub async fn fetch<D: Document>(&self, id: &str) -> Result<Tracked<D>> {
        self.read(id).await.map(Tracked::from_server)
    }

    /// Fetch a document, or `None` if it does not exist.
    pub async fn get<D: Document>(&self, id: &str) -> Result<Option<Tracked<D>>> {
        match self.fetch(id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the server copy if it moved past the revision `doc` holds.
    ///
    /// Returns `None` when the server still has that revision. The fresh copy
    /// keeps the instance's strategy and uses its own state as baseline.
    pub async fn fetch_if_changed<D: Document>(
        &self,
        doc: &Tracked<D>,
    ) -> Result<Option<Tracked<D>>> {
        let id = doc.id().ok_or(Error::MissingId)?;
        let mut request = self.http.get(self.doc_url(id));
        if let Some(rev) = doc.rev() {
            request = request.header(IF_NONE_MATCH, format!("\"{}\"", rev));
        }
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        let theirs: D = check(response, id).await?.json().await?;
        tracing::debug!(db = %self.name, id, rev = theirs.rev().unwrap_or_default(), "document changed");
        Ok(Some(
            Tracked::from_server(theirs).with_strategy(doc.strategy().clone()),
        ))
    }

    /// Fetch a document as raw JSON, or `None` if it does not exist.
    pub async fn get_json(&self, id: &str) -> Result<Option<Value>> {
        let response = self.http.get(self.doc_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response, id).await?.json().await?))
    }

    /// Delete the document at the given revision.
    pub async fn delete_document(&self, id: &str, rev: &str) -> Result<WriteAck> {
        let response = self
            .http
            .delete(self.doc_url(id))
            .query(&[("rev", rev)])
            .send()
            .await?;
        let ack = acknowledge(check(response, id).await?.json().await?)?;
        tracing::debug!(db = %self.name, id, rev = %ack.rev, "deleted document");
        Ok(ack)
    }

    /// Copy the document at `source` to `destination` on the server.
    ///
    /// Overwriting an existing destination requires its current revision.
    pub async fn copy_document(
        &self,
        source: &str,
        destination: &str,
        destination_rev: Option<&str>,
    ) -> Result<WriteAck> {
        let copy = Method::from_bytes(b"COPY")
            .map_err(|e| Error::InvalidDocument(e.to_string()))?;
        let target = match destination_rev {
            Some(rev) => format!("{}?rev={}", destination, rev),
            None => destination.to_string(),
        };
        let response = self
            .http
            .request(copy, self.doc_url(source))
            .header("Destination", target)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(source.to_string()).into());
        }
        let ack = acknowledge(check(response, destination).await?.json().await?)?;
        tracing::debug!(db = %self.name, source, id = %ack.id, rev = %ack.rev, "copied document");
        Ok(ack)
    }

    /// Whether a live document exists at `id`.
    pub async fn has_document(&self, id: &str) -> Result<bool> {
        Ok(self.current_revision(id).await?.is_some())
    }

    /// The document's current revision, read from the `ETag` of a HEAD
    /// request.
    pub async fn current_revision(&self, id: &str) -> Result<Option<Revision>> {
        let response = self.http.head(self.doc_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response, id).await?;
        Ok(response
            .headers()
            .get(ETAG)
            .and_then(|etag| etag.to_str().ok())
            .map(revision::from_etag))
    }

    /// Whether the server copy moved past the revision this instance holds.
    ///
    /// A deleted server copy counts as changed.
    pub async fn has_document_changed<D: Document>(&self, doc: &Tracked<D>) -> Result<bool> {
        let id = doc.id().ok_or(Error::MissingId)?;
        let current = self.current_revision(id).await?;
        Ok(current.as_deref() != doc.rev())
    }

    /// Number of live documents.
    pub async fn count_documents(&self) -> Result<u64> {
        let response = self.http.get(join(&self.root, &[self.name.as_str()])).send().await?;
        let info: DatabaseInfo = check(response, &self.name).await?.json().await?;
        Ok(info.doc_count)
    }

    /// Id and revision of every document, ordered by id.
    pub async fn all_document_ids(&self) -> Result<Vec<(DocumentId, Revision)>> {
        let result = self.all_documents(&ViewQuery::new()).await?;
        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| {
                let rev = row.value.get("rev")?.as_str()?.to_string();
                Some((row.id?, rev))
            })
            .collect())
    }

    /// Query `_all_docs`.
    pub async fn all_documents(&self, query: &ViewQuery) -> Result<ViewResult> {
        self.get_view(&[self.name.as_str(), "_all_docs"], query).await
    }

    /// Query a view defined in design document `design`.
    pub async fn query(&self, design: &str, view: &str, query: &ViewQuery) -> Result<ViewResult> {
        self.get_view(&[self.name.as_str(), "_design", design, "_view", view], query)
            .await
    }

    /// Build the index of a view without reading any rows.
    pub async fn touch_view(&self, design: &str, view: &str) -> Result<()> {
        self.query(design, view, &ViewQuery::new().limit(0)).await?;
        Ok(())
    }

    /// Read the design document called `name`, if there is one.
    pub async fn design_document(&self, name: &str) -> Result<Option<DesignDocument>> {
        let response = self.http.get(self.design_url(name)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response, name).await?.json().await?))
    }

    /// Store `design` unless the server already has the same definition.
    ///
    /// An existing design document is replaced at its current revision.
    /// Returns whether anything was written.
    pub async fn sync_design_document(&self, design: &DesignDocument) -> Result<bool> {
        let existing = self.design_document(design.name()).await?;
        if existing.as_ref().is_some_and(|stored| stored.same_definition(design)) {
            return Ok(false);
        }

        let mut body = design.clone();
        body.set_rev(existing.and_then(|stored| stored.rev().map(str::to_string)));
        let response = self
            .http
            .put(self.design_url(design.name()))
            .json(&body)
            .send()
            .await?;
        let ack = acknowledge(check(response, design.id()).await?.json().await?)?;
        tracing::info!(db = %self.name, design = design.name(), rev = %ack.rev, "synced design document");
        Ok(true)
    }

    /// Sync several design documents. Returns how many were written.
    pub async fn sync_design_documents(&self, designs: &[DesignDocument]) -> Result<usize> {
        let mut written = 0;
        for design in designs {
            if self.sync_design_document(design).await? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Write several documents in one request.
    ///
    /// Each successfully written document is committed (new revision and
    /// baseline); the rest keep their state and report their error. Nothing
    /// is merged. With `all_or_nothing` a server that refuses the batch
    /// fails the whole call.
    pub async fn save_all<D: Document>(
        &self,
        docs: &mut [Tracked<D>],
        all_or_nothing: bool,
    ) -> Result<Vec<ottoman_engine::Result<WriteAck>>> {
        let bodies: Vec<&D> = docs.iter().map(|doc| doc.document()).collect();
        let items = self.bulk(&bodies, all_or_nothing).await?;

        let mut results = Vec::with_capacity(items.len());
        for (doc, item) in docs.iter_mut().zip(items) {
            if let Ok(ack) = &item {
                doc.commit(ack.clone());
            }
            results.push(item);
        }
        Ok(results)
    }

    /// [`save_all`](Self::save_all) in batches of at most `chunk_size`
    /// documents, one request per batch. Results keep input order.
    pub async fn save_in_chunks<D: Document>(
        &self,
        docs: &mut [Tracked<D>],
        chunk_size: usize,
    ) -> Result<Vec<ottoman_engine::Result<WriteAck>>> {
        let mut results = Vec::with_capacity(docs.len());
        for chunk in docs.chunks_mut(chunk_size.max(1)) {
            results.extend(self.save_all(chunk, false).await?);
        }
        Ok(results)
    }

    /// Delete every document whose id falls in `start..=end`.
    pub async fn delete_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<ottoman_engine::Result<WriteAck>>> {
        let listed = self
            .all_documents(&ViewQuery::new().start_key(start).end_key(end))
            .await?;
        let identities: Vec<Identity> = listed
            .rows
            .into_iter()
            .filter_map(|row| {
                let rev = row.value.get("rev")?.as_str()?.to_string();
                Some(Identity::with_rev(row.id?, rev))
            })
            .collect();
        if identities.is_empty() {
            return Ok(Vec::new());
        }
        self.delete_all(&identities).await
    }

    /// Delete several documents in one request.
    pub async fn delete_all(
        &self,
        identities: &[Identity],
    ) -> Result<Vec<ottoman_engine::Result<WriteAck>>> {
        let tombstones = identities
            .iter()
            .map(|identity| -> Result<Value> {
                let id = identity.id().ok_or(Error::MissingId)?;
                Ok(json!({"_id": id, "_rev": identity.rev(), "_deleted": true}))
            })
            .collect::<Result<Vec<_>>>()?;
        self.bulk(&tombstones, false).await
    }

    async fn bulk<T: Serialize>(
        &self,
        docs: &[T],
        all_or_nothing: bool,
    ) -> Result<Vec<ottoman_engine::Result<WriteAck>>> {
        let response = self
            .http
            .post(join(&self.root, &[self.name.as_str(), "_bulk_docs"]))
            .json(&BulkRequest {
                docs,
                all_or_nothing,
            })
            .send()
            .await?;
        let items: Vec<BulkItem> = check(response, &self.name).await?.json().await?;
        tracing::debug!(db = %self.name, count = items.len(), "bulk write");

        Ok(items
            .into_iter()
            .map(|item| match (item.rev, item.error) {
                (_, Some(error)) => Err(bulk_error(item.id, &error, item.reason)),
                (Some(rev), None) => Ok(WriteAck::new(item.id, rev)),
                (None, None) => Err(Error::InvalidDocument(format!(
                    "{}: bulk response without revision",
                    item.id
                ))),
            })
            .collect())
    }

    async fn write<D: Document>(&self, kind: WriteKind, doc: &D) -> Result<WriteAck> {
        let request = match kind {
            WriteKind::Create => self.http.post(join(&self.root, &[self.name.as_str()])),
            WriteKind::Update => {
                let id = doc.id().ok_or(Error::MissingId)?;
                self.http.put(self.doc_url(id))
            }
        };
        let subject = doc.id().unwrap_or(&self.name);
        let response = request.json(doc).send().await?;
        let ack = acknowledge(check(response, subject).await?.json().await?)?;
        tracing::debug!(db = %self.name, id = %ack.id, rev = %ack.rev, ?kind, "wrote document");
        Ok(ack)
    }

    async fn read<D: Document>(&self, id: &str) -> Result<D> {
        let response = self.http.get(self.doc_url(id)).send().await?;
        Ok(check(response, id).await?.json().await?)
    }

    async fn get_view(&self, path: &[&str], query: &ViewQuery) -> Result<ViewResult> {
        let url = join(&self.root, path);
        let request = match query.key_list() {
            Some(keys) => self.http.post(url).json(&json!({ "keys": keys })),
            None => self.http.get(url),
        };
        let response = request.query(&query.to_params()).send().await?;
        Ok(check(response, &path.join("/")).await?.json().await?)
    }

    fn doc_url(&self, id: &str) -> Url {
        join(&self.root, &[self.name.as_str(), id])
    }

    fn design_url(&self, name: &str) -> Url {
        join(&self.root, &[self.name.as_str(), "_design", name])
    }
}

fn acknowledge(response: WriteResponse) -> Result<WriteAck> {
    if !response.ok {
        return Err(ClientError::Status {
            status: StatusCode::OK.as_u16(),
            reason: format!("write of {} not acknowledged", response.id),
        });
    }
    Ok(WriteAck::new(response.id, response.rev))
}
