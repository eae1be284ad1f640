//! View and `_all_docs` queries.

use ottoman_engine::{Document, DocumentId, Tracked};
use serde::Deserialize;
use serde_json::Value;

/// Query parameters for a view or `_all_docs` request.
///
/// Keys are JSON-encoded into the query string. A list of [`keys`](Self::keys)
/// is sent as a request body instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    key: Option<Value>,
    keys: Option<Vec<Value>>,
    start_key: Option<Value>,
    end_key: Option<Value>,
    limit: Option<u64>,
    skip: Option<u64>,
    descending: bool,
    include_docs: bool,
}

impl ViewQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only rows with exactly this key.
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Only rows with one of these keys, in the given order.
    pub fn keys<K: Into<Value>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn start_key(mut self, key: impl Into<Value>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    pub fn end_key(mut self, key: impl Into<Value>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Return each row's document alongside its key and value.
    pub fn include_docs(mut self) -> Self {
        self.include_docs = true;
        self
    }

    /// The key list, if the query has one.
    pub fn key_list(&self) -> Option<&[Value]> {
        self.keys.as_deref()
    }

    /// Query string pairs, in a stable order. The key list is not included.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(key) = &self.key {
            params.push(("key", key.to_string()));
        }
        if let Some(key) = &self.start_key {
            params.push(("startkey", key.to_string()));
        }
        if let Some(key) = &self.end_key {
            params.push(("endkey", key.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("skip", skip.to_string()));
        }
        if self.descending {
            params.push(("descending", "true".to_string()));
        }
        if self.include_docs {
            params.push(("include_docs", "true".to_string()));
        }
        params
    }
}

/// One row of a view result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewRow {
    /// Source document id; absent for reduced rows
    #[serde(default)]
    pub id: Option<DocumentId>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    /// Present when the query asked for documents
    #[serde(default)]
    pub doc: Option<Value>,
}

/// A view or `_all_docs` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewResult {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub offset: u64,
    pub rows: Vec<ViewRow>,
}

impl ViewResult {
    /// Ids of the rows that came from a document.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().filter_map(|row| row.id.as_deref())
    }

    /// Decode the included documents, tracked with their returned state as
    /// baseline. Rows without a document are skipped.
    pub fn documents<D: Document>(&self) -> ottoman_engine::Result<Vec<Tracked<D>>> {
        self.rows
            .iter()
            .filter_map(|row| row.doc.as_ref().filter(|doc| !doc.is_null()))
            .map(|doc| -> ottoman_engine::Result<Tracked<D>> {
                Ok(Tracked::from_server(serde_json::from_value(doc.clone())?))
            })
            .collect()
    }
}
