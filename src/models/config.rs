//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Upper bound the queue service allows for one event batch.
pub const MAX_QUEUE_BATCH_SIZE: usize = 10;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upload bucket and file stage prefixes
    #[serde(default)]
    pub import: ImportConfig,

    /// Row message channel settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Catalog tables and batch consumer settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Notification topic settings
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or fall back to defaults.
    ///
    /// The load error is handed back instead of logged, so callers can
    /// report it once their logger is up.
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Option<AppError>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override values from environment-style variables.
    ///
    /// `lookup` returns the raw value of a variable, if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = var("BUCKET_NAME") {
            self.import.bucket = bucket;
        }
        if let Some(prefix) = var("UPLOADED_PREFIX") {
            self.import.uploaded_prefix = prefix;
        }
        if let Some(prefix) = var("PARSED_PREFIX") {
            self.import.parsed_prefix = prefix;
        }
        if let Some(secs) = var("UPLOAD_EXPIRY_SECS") {
            self.import.upload_expiry_secs = parse_number("UPLOAD_EXPIRY_SECS", &secs)?;
        }
        if let Some(url) = var("SQS_QUEUE_URL") {
            self.queue.url = url;
        }
        if let Some(table) = var("TABLE_NAME_PRODUCTS") {
            self.catalog.products_table = table;
        }
        if let Some(table) = var("TABLE_NAME_STOCKS") {
            self.catalog.stocks_table = table;
        }
        if let Some(n) = var("BATCH_SIZE") {
            self.catalog.batch_size = parse_number("BATCH_SIZE", &n)?;
        }
        if let Some(n) = var("MAX_CONCURRENCY") {
            self.catalog.max_concurrency = parse_number("MAX_CONCURRENCY", &n)?;
        }
        if let Some(n) = var("WRITE_CONCURRENCY") {
            self.catalog.write_concurrency = parse_number("WRITE_CONCURRENCY", &n)?;
        }
        if let Some(arn) = var("SNS_TOPIC_ARN") {
            self.notifications.topic_arn = arn;
        }
        if let Some(threshold) = var("PRICE_THRESHOLD") {
            self.notifications.price_threshold = parse_number("PRICE_THRESHOLD", &threshold)?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let import = &self.import;
        if import.bucket.trim().is_empty() {
            return Err(AppError::config("import.bucket is empty"));
        }
        for (name, prefix) in [
            ("import.uploaded_prefix", &import.uploaded_prefix),
            ("import.parsed_prefix", &import.parsed_prefix),
        ] {
            if prefix.len() < 2 || !prefix.ends_with('/') {
                return Err(AppError::config(format!(
                    "{name} must be a non-empty path ending in '/'"
                )));
            }
        }
        if import.uploaded_prefix == import.parsed_prefix {
            return Err(AppError::config(
                "import.uploaded_prefix and import.parsed_prefix must differ",
            ));
        }
        if import.upload_expiry_secs == 0 {
            return Err(AppError::config("import.upload_expiry_secs must be > 0"));
        }
        if import.max_concurrency == 0 {
            return Err(AppError::config("import.max_concurrency must be > 0"));
        }

        if self.queue.max_receive_count == 0 {
            return Err(AppError::config("queue.max_receive_count must be > 0"));
        }

        let catalog = &self.catalog;
        if catalog.products_table.trim().is_empty() || catalog.stocks_table.trim().is_empty() {
            return Err(AppError::config("catalog table names must not be empty"));
        }
        if catalog.products_table == catalog.stocks_table {
            return Err(AppError::config(
                "catalog.products_table and catalog.stocks_table must differ",
            ));
        }
        if catalog.batch_size == 0 || catalog.batch_size > MAX_QUEUE_BATCH_SIZE {
            return Err(AppError::config(format!(
                "catalog.batch_size must be between 1 and {MAX_QUEUE_BATCH_SIZE}"
            )));
        }
        if catalog.max_concurrency < 2 {
            return Err(AppError::config("catalog.max_concurrency must be >= 2"));
        }
        if catalog.write_concurrency == 0 {
            return Err(AppError::config("catalog.write_concurrency must be > 0"));
        }

        if self.notifications.subject.trim().is_empty() {
            return Err(AppError::config("notifications.subject is empty"));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::config(format!("{name} is not a valid number: '{raw}'")))
}

/// Upload bucket and stage prefixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Bucket receiving uploaded files
    #[serde(default = "defaults::bucket")]
    pub bucket: String,

    /// Prefix of files waiting to be parsed
    #[serde(default = "defaults::uploaded_prefix")]
    pub uploaded_prefix: String,

    /// Prefix of fully processed files
    #[serde(default = "defaults::parsed_prefix")]
    pub parsed_prefix: String,

    /// Lifetime of a presigned upload URL
    #[serde(default = "defaults::upload_expiry")]
    pub upload_expiry_secs: u64,

    /// Content type required for uploads
    #[serde(default = "defaults::upload_content_type")]
    pub upload_content_type: String,

    /// Objects of one event processed in parallel
    #[serde(default = "defaults::import_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            bucket: defaults::bucket(),
            uploaded_prefix: defaults::uploaded_prefix(),
            parsed_prefix: defaults::parsed_prefix(),
            upload_expiry_secs: defaults::upload_expiry(),
            upload_content_type: defaults::upload_content_type(),
            max_concurrency: defaults::import_concurrency(),
        }
    }
}

/// Row message channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue URL (empty for local runs)
    #[serde(default)]
    pub url: String,

    /// Deliveries before a message is moved to the dead-letter queue
    #[serde(default = "defaults::max_receive_count")]
    pub max_receive_count: u32,

    /// Visibility timeout; must exceed the writer's invocation timeout
    #[serde(default = "defaults::visibility_timeout")]
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_receive_count: defaults::max_receive_count(),
            visibility_timeout_secs: defaults::visibility_timeout(),
        }
    }
}

/// Catalog tables and batch consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "defaults::products_table")]
    pub products_table: String,

    #[serde(default = "defaults::stocks_table")]
    pub stocks_table: String,

    /// Messages per writer invocation
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// How long the host may wait to fill a batch
    #[serde(default = "defaults::batching_window")]
    pub max_batching_window_secs: u64,

    /// Concurrent writer invocations allowed by the event source
    #[serde(default = "defaults::max_concurrency")]
    pub max_concurrency: usize,

    /// Rows of one batch written in parallel
    #[serde(default = "defaults::write_concurrency")]
    pub write_concurrency: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            products_table: defaults::products_table(),
            stocks_table: defaults::stocks_table(),
            batch_size: defaults::batch_size(),
            max_batching_window_secs: defaults::batching_window(),
            max_concurrency: defaults::max_concurrency(),
            write_concurrency: defaults::write_concurrency(),
        }
    }
}

/// Notification topic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Topic ARN (empty for local runs)
    #[serde(default)]
    pub topic_arn: String,

    #[serde(default = "defaults::subject")]
    pub subject: String,

    /// Prices at or above this are routed to "expensive" subscribers
    #[serde(default = "defaults::price_threshold")]
    pub price_threshold: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            topic_arn: String::new(),
            subject: defaults::subject(),
            price_threshold: defaults::price_threshold(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Import defaults
    pub fn bucket() -> String {
        "product-imports".into()
    }
    pub fn uploaded_prefix() -> String {
        "uploaded/".into()
    }
    pub fn parsed_prefix() -> String {
        "parsed/".into()
    }
    pub fn upload_expiry() -> u64 {
        3600
    }
    pub fn upload_content_type() -> String {
        "text/csv".into()
    }
    pub fn import_concurrency() -> usize {
        4
    }

    // Queue defaults
    pub fn max_receive_count() -> u32 {
        3
    }
    pub fn visibility_timeout() -> u64 {
        180
    }

    // Catalog defaults
    pub fn products_table() -> String {
        "products".into()
    }
    pub fn stocks_table() -> String {
        "stocks".into()
    }
    pub fn batch_size() -> usize {
        5
    }
    pub fn batching_window() -> u64 {
        20
    }
    pub fn max_concurrency() -> usize {
        2
    }
    pub fn write_concurrency() -> usize {
        5
    }

    // Notification defaults
    pub fn subject() -> String {
        "New Product Created".into()
    }
    pub fn price_threshold() -> u64 {
        50
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_same_prefixes() {
        let mut config = Config::default();
        config.import.parsed_prefix = "uploaded/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_prefix_without_slash() {
        let mut config = Config::default();
        config.import.uploaded_prefix = "uploaded".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_batch() {
        let mut config = Config::default();
        config.catalog.batch_size = 11;
        assert!(config.validate().is_err());
        config.catalog.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_write_concurrency() {
        let mut config = Config::default();
        config.catalog.write_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn apply_env_overrides_values() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("BUCKET_NAME", "my-imports"),
                ("TABLE_NAME_PRODUCTS", "p"),
                ("TABLE_NAME_STOCKS", "s"),
                ("SNS_TOPIC_ARN", "arn:aws:sns:eu-west-1:1:createProductTopic"),
                ("PRICE_THRESHOLD", "75"),
                ("MAX_CONCURRENCY", "4"),
                ("SQS_QUEUE_URL", ""),
            ]))
            .unwrap();

        assert_eq!(config.import.bucket, "my-imports");
        assert_eq!(config.catalog.products_table, "p");
        assert_eq!(config.catalog.stocks_table, "s");
        assert_eq!(config.notifications.price_threshold, 75);
        assert_eq!(config.catalog.max_concurrency, 4);
        assert!(config.queue.url.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn apply_env_rejects_bad_number() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("PRICE_THRESHOLD", "fifty")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn load_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [import]
            bucket = "staging-imports"

            [notifications]
            price_threshold = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.import.bucket, "staging-imports");
        assert_eq!(config.import.uploaded_prefix, "uploaded/");
        assert_eq!(config.notifications.price_threshold, 20);
        assert_eq!(config.catalog.batch_size, 5);
    }

    #[test]
    fn load_or_default_returns_error_with_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let (config, error) = Config::load_or_default(dir.path().join("missing.toml"));

        assert!(matches!(error, Some(AppError::Io(_))));
        assert_eq!(config.import.bucket, Config::default().import.bucket);
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[notifications]\nprice_threshold = 20\n").unwrap();

        let (config, error) = Config::load_or_default(&path);

        assert!(error.is_none());
        assert_eq!(config.notifications.price_threshold, 20);
    }
}
