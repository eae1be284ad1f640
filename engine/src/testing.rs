//! Document types shared by unit tests.

use crate::{document_fields, Document, Identity, ReconcileStrategy};
use serde::{Deserialize, Serialize};

/// A car that merges automatically, like most test documents here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Car {
    #[serde(flatten)]
    pub identity: Identity,
    pub make: String,
    pub model: String,
    pub horse_powers: u32,
}

impl Car {
    pub fn new(make: &str, model: &str, horse_powers: u32) -> Self {
        Self {
            identity: Identity::new(),
            make: make.into(),
            model: model.into(),
            horse_powers,
        }
    }
}

impl Document for Car {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    document_fields!(Car {
        make,
        model,
        horse_powers
    });

    fn default_strategy() -> ReconcileStrategy<Self> {
        ReconcileStrategy::AutoMerge
    }
}

/// A document using the default (propagating) strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    #[serde(flatten)]
    pub identity: Identity,
    pub text: String,
}

impl Document for Memo {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    document_fields!(Memo { text });
}
