/// Configuration for the Postgres rule and action store.
#[derive(Debug, Clone)]
pub struct PostgresStoreConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Table name prefix (e.g. "remedy_").
    pub prefix: String,
}

impl PostgresStoreConfig {
    /// Create a new configuration with the given URL and the default prefix.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: "remedy_".to_owned(),
        }
    }

    /// Set the table prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}
