//! Server-level operations: databases.

use crate::{
    config::{Config, ConfigError},
    database::Database,
    error::{check, Result},
};
use reqwest::{Client, StatusCode, Url};

/// Handle to a CouchDB-compatible server.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct CouchServer {
    http: Client,
    root: Url,
    prefix: String,
}

impl CouchServer {
    /// Connect to the server at `url` with a default HTTP client.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_client(Client::new(), url)
    }

    /// Use an existing HTTP client.
    pub fn with_client(http: Client, url: &str) -> Result<Self> {
        let root = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
        if root.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(url.to_string()).into());
        }
        Ok(Self {
            http,
            root,
            prefix: String::new(),
        })
    }

    /// Build a server handle from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(http, &config.url)?.with_prefix(&config.prefix))
    }

    /// Prepend `prefix` to every database name used through this handle.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn url(&self) -> &Url {
        &self.root
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Handle to a database. Does not check that it exists.
    pub fn database(&self, name: &str) -> Database {
        Database::new(self.http.clone(), self.root.clone(), self.full_name(name))
    }

    /// Whether the database exists.
    pub async fn has_database(&self, name: &str) -> Result<bool> {
        let name = self.full_name(name);
        let response = self.http.head(join(&self.root, &[name.as_str()])).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => check(response, &name).await.map(|_| true),
        }
    }

    /// Create a database. Fails if it already exists.
    pub async fn create_database(&self, name: &str) -> Result<Database> {
        let db = self.database(name);
        let response = self.http.put(join(&self.root, &[db.name()])).send().await?;
        check(response, db.name()).await?;
        tracing::info!(database = db.name(), "created database");
        Ok(db)
    }

    pub async fn delete_database(&self, name: &str) -> Result<()> {
        let name = self.full_name(name);
        let response = self.http.delete(join(&self.root, &[name.as_str()])).send().await?;
        check(response, &name).await?;
        tracing::info!(database = %name, "deleted database");
        Ok(())
    }

    /// Names of the databases under this handle's prefix, with the prefix
    /// stripped.
    pub async fn database_names(&self) -> Result<Vec<String>> {
        let response = self.http.get(join(&self.root, &["_all_dbs"])).send().await?;
        let names: Vec<String> = check(response, "_all_dbs").await?.json().await?;
        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }

    /// Open a database, creating it first if it does not exist.
    pub async fn ensure_database(&self, name: &str) -> Result<Database> {
        if self.has_database(name).await? {
            Ok(self.database(name))
        } else {
            self.create_database(name).await
        }
    }

    /// Create an empty database, deleting any existing one with that name.
    pub async fn fresh_database(&self, name: &str) -> Result<Database> {
        if self.has_database(name).await? {
            self.delete_database(name).await?;
        }
        self.create_database(name).await
    }

    fn full_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// Append path segments to `base`, percent-encoding each one.
pub(crate) fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
