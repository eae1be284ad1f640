//! Revision tokens.
//!
//! Revisions are opaque to the reconciliation core, which only ever copies
//! them around. Servers speaking the CouchDB protocol mint tokens of the form
//! `<generation>-<hash>`, where the generation grows by one on every write.
//! The helpers here understand that format so the in-memory database can mint
//! compatible tokens and tests can reason about write counts.

use crate::Revision;

/// Parse the generation prefix of a `<generation>-<hash>` token.
///
/// Returns `None` for tokens not in that format.
pub fn generation(rev: &str) -> Option<u64> {
    let (gen, hash) = rev.split_once('-')?;
    if hash.is_empty() {
        return None;
    }
    gen.parse().ok()
}

/// Mint the revision following `prev` (or the first revision when `None`).
pub fn next(prev: Option<&str>) -> Revision {
    let gen = prev.and_then(generation).unwrap_or(0) + 1;
    format!("{}-{}", gen, uuid::Uuid::new_v4().simple())
}

/// Strip the quotes an HTTP `ETag` header puts around a revision.
pub fn from_etag(etag: &str) -> Revision {
    etag.trim().trim_matches('"').to_string()
}
