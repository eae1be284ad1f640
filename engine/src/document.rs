//! Document identity and the document trait.

use crate::{fields::FieldSet, reconcile::ReconcileStrategy, DocumentId, Revision};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Lifecycle state derived from a document's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityState {
    /// No id yet; the server assigns one on create
    New,
    /// Has an id but no revision: never synced with the server
    Unsynced,
    /// Has both an id and a revision
    Synced,
}

/// The id and revision token of a document.
///
/// Serialized as the protocol's `_id` and `_rev` members, each omitted when
/// absent. Embed it in a document with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
}

impl Identity {
    /// Identity of a document that does not exist on the server yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity with a caller-chosen id and no revision.
    pub fn with_id(id: impl Into<DocumentId>) -> Self {
        Self {
            id: Some(id.into()),
            rev: None,
        }
    }

    /// Identity with both id and revision.
    pub fn with_rev(id: impl Into<DocumentId>, rev: impl Into<Revision>) -> Self {
        Self {
            id: Some(id.into()),
            rev: Some(rev.into()),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<DocumentId>) {
        self.id = Some(id.into());
    }

    pub fn set_rev(&mut self, rev: impl Into<Revision>) {
        self.rev = Some(rev.into());
    }

    pub fn state(&self) -> IdentityState {
        match (&self.id, &self.rev) {
            (None, _) => IdentityState::New,
            (Some(_), None) => IdentityState::Unsynced,
            (Some(_), Some(_)) => IdentityState::Synced,
        }
    }
}

/// A typed document that can be persisted and reconciled.
///
/// Implementors expose their identity and an explicit list of persisted
/// fields. The field list drives the automatic merge, so every persisted
/// member except the identity itself belongs in it.
///
/// ```rust
/// use ottoman_engine::{document_fields, Document, Identity};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Car {
///     #[serde(flatten)]
///     identity: Identity,
///     make: String,
///     horse_powers: u32,
/// }
///
/// impl Document for Car {
///     fn identity(&self) -> &Identity {
///         &self.identity
///     }
///
///     fn identity_mut(&mut self) -> &mut Identity {
///         &mut self.identity
///     }
///
///     document_fields!(Car { make, horse_powers });
/// }
///
/// let names: Vec<_> = Car::field_set().names().collect();
/// assert_eq!(names, ["make", "horse_powers"]);
/// ```
pub trait Document: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    /// Every persisted field of the type, excluding the identity.
    fn field_set() -> &'static FieldSet<Self>;

    /// Strategy given to instances that do not set one explicitly.
    fn default_strategy() -> ReconcileStrategy<Self> {
        ReconcileStrategy::Propagate
    }

    fn id(&self) -> Option<&str> {
        self.identity().id()
    }

    fn rev(&self) -> Option<&str> {
        self.identity().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(flatten)]
        identity: Identity,
        text: String,
    }

    #[test]
    fn identity_states() {
        assert_eq!(Identity::new().state(), IdentityState::New);
        assert_eq!(Identity::with_id("a").state(), IdentityState::Unsynced);
        assert_eq!(Identity::with_rev("a", "1-x").state(), IdentityState::Synced);

        let rev_only = Identity {
            id: None,
            rev: Some("1-x".into()),
        };
        assert_eq!(rev_only.state(), IdentityState::New);
    }

    #[test]
    fn setters() {
        let mut identity = Identity::new();
        identity.set_id("note-1");
        identity.set_rev("1-abc");
        assert_eq!(identity.id(), Some("note-1"));
        assert_eq!(identity.rev(), Some("1-abc"));
    }

    #[test]
    fn absent_members_are_omitted() {
        let note = Note {
            identity: Identity::new(),
            text: "hello".into(),
        };
        assert_eq!(serde_json::to_value(&note).unwrap(), json!({"text": "hello"}));
    }

    #[test]
    fn identity_uses_protocol_member_names() {
        let note = Note {
            identity: Identity::with_rev("note-1", "2-abc"),
            text: "hello".into(),
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(
            value,
            json!({"_id": "note-1", "_rev": "2-abc", "text": "hello"})
        );

        let parsed: Note = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, note);
    }

    #[test]
    fn missing_identity_deserializes_as_new() {
        let parsed: Note = serde_json::from_value(json!({"text": "x"})).unwrap();
        assert_eq!(parsed.identity.state(), IdentityState::New);
    }
}
