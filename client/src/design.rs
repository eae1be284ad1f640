//! Design documents.
//!
//! A design document stores view definitions as map/reduce source strings
//! under the id `_design/<name>`. The server compiles and indexes them; this
//! crate only defines, stores and queries them.

use ottoman_engine::{DocumentId, Identity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DESIGN_PREFIX: &str = "_design/";

/// Map and optional reduce source of one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub map: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
}

/// A `_design/<name>` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(flatten)]
    identity: Identity,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub views: BTreeMap<String, ViewDefinition>,
}

fn default_language() -> String {
    "javascript".to_string()
}

impl DesignDocument {
    /// An empty design document called `name`.
    pub fn new(name: &str) -> Self {
        Self {
            identity: Identity::with_id(format!("{}{}", DESIGN_PREFIX, name)),
            language: default_language(),
            views: BTreeMap::new(),
        }
    }

    /// Builder-style method to add a map-only view.
    pub fn view(mut self, name: impl Into<String>, map: impl Into<String>) -> Self {
        self.views.insert(
            name.into(),
            ViewDefinition {
                map: map.into(),
                reduce: None,
            },
        );
        self
    }

    /// Builder-style method to add a view with a reduce function.
    pub fn view_with_reduce(
        mut self,
        name: impl Into<String>,
        map: impl Into<String>,
        reduce: impl Into<String>,
    ) -> Self {
        self.views.insert(
            name.into(),
            ViewDefinition {
                map: map.into(),
                reduce: Some(reduce.into()),
            },
        );
        self
    }

    /// Name without the `_design/` prefix.
    pub fn name(&self) -> &str {
        let id = self.identity.id().unwrap_or_default();
        id.strip_prefix(DESIGN_PREFIX).unwrap_or(id)
    }

    pub fn id(&self) -> &str {
        self.identity.id().unwrap_or_default()
    }

    pub fn rev(&self) -> Option<&str> {
        self.identity.rev()
    }

    pub(crate) fn set_rev(&mut self, rev: Option<String>) {
        self.identity.rev = rev;
    }

    /// Whether both documents define the same views in the same language.
    pub fn same_definition(&self, other: &DesignDocument) -> bool {
        self.language == other.language && self.views == other.views
    }
}

/// Id of the design document called `name`.
pub fn design_id(name: &str) -> DocumentId {
    format!("{}{}", DESIGN_PREFIX, name)
}
