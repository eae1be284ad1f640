//! # Ottoman Client
//!
//! Async client for CouchDB-compatible servers, built on the reconciliation
//! logic in `ottoman-engine`.
//!
//! Saving a [`Tracked`](ottoman_engine::Tracked) document through
//! [`Database::save`] writes it, and on a revision conflict merges it with
//! the server copy according to the document's strategy before writing it
//! once more.
//!
//! ```rust,no_run
//! use ottoman_client::{CouchServer, Result};
//! use ottoman_engine::{document_fields, Document, Identity, ReconcileStrategy, Tracked};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Car {
//!     #[serde(flatten)]
//!     identity: Identity,
//!     make: String,
//! }
//!
//! impl Document for Car {
//!     fn identity(&self) -> &Identity { &self.identity }
//!     fn identity_mut(&mut self) -> &mut Identity { &mut self.identity }
//!     document_fields!(Car { make });
//! }
//!
//! # async fn run() -> Result<()> {
//! let server = CouchServer::new("http://localhost:5984")?;
//! let db = server.ensure_database("cars").await?;
//!
//! let mut car = Tracked::new(Car { make: "Hoopty".into(), ..Default::default() })
//!     .with_strategy(ReconcileStrategy::AutoMerge);
//! db.save(&mut car).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod design;
pub mod error;
pub mod server;
pub mod view;

pub use config::{Config, ConfigError};
pub use database::Database;
pub use design::{DesignDocument, ViewDefinition};
pub use error::{ClientError, Result};
pub use server::CouchServer;
pub use view::{ViewQuery, ViewResult, ViewRow};
