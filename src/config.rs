//! # Connector Configuration
//!
//! Kafka connector settings used to build the WITH clause of source and sink
//! tables. Options are plain key/value maps supplied by the surrounding
//! application and are immutable once handed to the dialect.
//!
//! ```rust
//! use streamweave_sql::config::ConnectorOptions;
//!
//! let options = ConnectorOptions::from_json(
//!   r#"{
//!     "bootstrap_servers": "kafka:9092",
//!     "schema_registry_url": "http://registry:8081",
//!     "topics": { "orders": { "source": { "scan.startup.mode": "earliest-offset" } } }
//!   }"#,
//! )?;
//! assert_eq!(options.format, "avro-confluent");
//! # Ok::<(), streamweave_sql::error::SqlError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SqlError, SqlResult};

/// The only wire format the dialect emits.
pub const SUPPORTED_FORMAT: &str = "avro-confluent";

/// Global connector settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorOptions {
  /// `properties.bootstrap.servers`
  pub bootstrap_servers: String,
  /// Wire format; must be [`SUPPORTED_FORMAT`]
  pub format: String,
  /// Schema registry URL for the Avro format
  pub schema_registry_url: Option<String>,
  /// WITH properties applied to every table
  pub properties: BTreeMap<String, String>,
  /// Per-topic overrides keyed by raw topic name
  pub topics: BTreeMap<String, TopicOptions>,
}

/// Per-topic WITH properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicOptions {
  /// Properties applied when the topic backs a source table
  pub source: BTreeMap<String, String>,
  /// Properties applied when the topic backs a sink table
  pub sink: BTreeMap<String, String>,
  /// Whether these properties may replace global values
  pub allow_override: bool,
}

impl Default for ConnectorOptions {
  fn default() -> Self {
    Self {
      bootstrap_servers: "localhost:9092".to_string(),
      format: SUPPORTED_FORMAT.to_string(),
      schema_registry_url: None,
      properties: BTreeMap::new(),
      topics: BTreeMap::new(),
    }
  }
}

impl ConnectorOptions {
  /// Options pointing at the given brokers.
  pub fn new(bootstrap_servers: impl Into<String>) -> Self {
    Self {
      bootstrap_servers: bootstrap_servers.into(),
      ..Self::default()
    }
  }

  /// Parses options from JSON.
  pub fn from_json(json: &str) -> SqlResult<Self> {
    serde_json::from_str(json)
      .map_err(|e| SqlError::config(format!("invalid connector options: {}", e)))
  }

  /// Sets the schema registry URL.
  pub fn with_schema_registry(mut self, url: impl Into<String>) -> Self {
    self.schema_registry_url = Some(url.into());
    self
  }

  /// Sets the wire format.
  pub fn with_format(mut self, format: impl Into<String>) -> Self {
    self.format = format.into();
    self
  }

  /// Adds a global WITH property.
  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.properties.insert(key.into(), value.into());
    self
  }

  /// Sets the options of one topic.
  pub fn with_topic(mut self, topic: impl Into<String>, options: TopicOptions) -> Self {
    self.topics.insert(topic.into(), options);
    self
  }

  /// Options configured for `topic`, if any.
  pub fn topic(&self, topic: &str) -> Option<&TopicOptions> {
    self.topics.get(topic)
  }

  /// Rejects any wire format other than [`SUPPORTED_FORMAT`].
  pub fn validate_format(&self) -> SqlResult<()> {
    if self.format.eq_ignore_ascii_case(SUPPORTED_FORMAT) {
      Ok(())
    } else {
      Err(SqlError::config(format!(
        "unsupported format '{}'; only '{}' is supported",
        self.format, SUPPORTED_FORMAT
      )))
    }
  }
}

impl TopicOptions {
  /// Adds a source property.
  pub fn source_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.source.insert(key.into(), value.into());
    self
  }

  /// Adds a sink property.
  pub fn sink_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.sink.insert(key.into(), value.into());
    self
  }

  /// Lets these properties replace global values.
  pub fn overriding(mut self) -> Self {
    self.allow_override = true;
    self
  }
}
