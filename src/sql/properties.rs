//! Layered WITH-clause construction and `scan.startup.*` validation.
//!
//! Layers are applied in order: fixed connector keys, global properties,
//! per-topic source/sink properties, caller-supplied additional properties.
//! Protected keys can never change after the fixed layer. Any other key set
//! twice with different values is an error unless the later layer allows
//! overrides.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::{SqlError, SqlResult};

/// Keys owned by the fixed layer.
pub const PROTECTED_KEYS: &[&str] = &[
  "connector",
  "topic",
  "format",
  "properties.bootstrap.servers",
  "avro-confluent.url",
];

/// Key selecting where a source starts reading.
pub const STARTUP_MODE_KEY: &str = "scan.startup.mode";
/// Companion key for the `timestamp` startup mode.
pub const STARTUP_TIMESTAMP_KEY: &str = "scan.startup.timestamp-millis";
/// Companion key for the `specific-offsets` startup mode.
pub const STARTUP_OFFSETS_KEY: &str = "scan.startup.specific-offsets";

/// Accepted values of [`STARTUP_MODE_KEY`].
pub const STARTUP_MODES: &[&str] = &[
  "earliest-offset",
  "latest-offset",
  "group-offsets",
  "timestamp",
  "specific-offsets",
];

static SPECIFIC_OFFSETS: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^partition:\d+,offset:\d+(;partition:\d+,offset:\d+)*$").expect("static pattern")
});

/// A named set of WITH properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyLayer {
  /// Layer name used in conflict messages
  pub name: String,
  /// Properties, applied in key order
  pub properties: BTreeMap<String, String>,
  /// Whether this layer may replace values set by earlier layers
  pub allow_override: bool,
}

impl PropertyLayer {
  /// An empty, non-overriding layer.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  /// Builds a layer from an existing map.
  pub fn from_map(
    name: impl Into<String>,
    properties: BTreeMap<String, String>,
    allow_override: bool,
  ) -> Self {
    Self {
      name: name.into(),
      properties,
      allow_override,
    }
  }

  /// Adds a property.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.properties.insert(key.into(), value.into());
    self
  }

  /// Lets this layer replace earlier values.
  pub fn overriding(mut self) -> Self {
    self.allow_override = true;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
  key: String,
  value: String,
  layer: String,
}

/// Accumulated WITH properties, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithClause {
  entries: Vec<Entry>,
}

fn is_protected(key: &str) -> bool {
  PROTECTED_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

impl WithClause {
  /// Starts a clause from the fixed connector keys.
  pub fn fixed<I, K, V>(properties: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let entries = properties
      .into_iter()
      .map(|(key, value)| Entry {
        key: key.into(),
        value: value.into(),
        layer: "fixed".to_string(),
      })
      .collect();
    Self { entries }
  }

  /// Value for `key`, if set.
  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .entries
      .iter()
      .find(|e| e.key == key)
      .map(|e| e.value.as_str())
  }

  /// Applies one layer on top of the clause.
  pub fn apply(&mut self, layer: &PropertyLayer) -> SqlResult<()> {
    for (key, value) in &layer.properties {
      let existing = self.entries.iter_mut().find(|e| &e.key == key);
      match existing {
        Some(entry) if entry.value == *value => {}
        Some(entry) if is_protected(key) => {
          return Err(SqlError::config(format!(
            "WITH property '{}' is reserved and cannot be overridden by '{}' ('{}' -> '{}')",
            key, layer.name, entry.value, value
          )));
        }
        Some(entry) if layer.allow_override => {
          entry.value = value.clone();
          entry.layer = layer.name.clone();
        }
        Some(entry) => {
          return Err(SqlError::config(format!(
            "WITH property '{}' conflicts: '{}' from '{}' vs '{}' from '{}'",
            key, entry.value, entry.layer, value, layer.name
          )));
        }
        None if is_protected(key) => {
          return Err(SqlError::config(format!(
            "WITH property '{}' is reserved and cannot be set by '{}'",
            key, layer.name
          )));
        }
        None => self.entries.push(Entry {
          key: key.clone(),
          value: value.clone(),
          layer: layer.name.clone(),
        }),
      }
    }
    Ok(())
  }

  /// Checks `scan.startup.mode` and its companion keys.
  pub fn validate_startup_mode(&self) -> SqlResult<()> {
    let Some(mode) = self.get(STARTUP_MODE_KEY) else {
      return Ok(());
    };
    if !STARTUP_MODES.contains(&mode) {
      return Err(SqlError::config(format!(
        "'{}' = '{}' is not one of {}",
        STARTUP_MODE_KEY,
        mode,
        STARTUP_MODES.join(", ")
      )));
    }
    match mode {
      "timestamp" => {
        let millis = self.get(STARTUP_TIMESTAMP_KEY).ok_or_else(|| {
          SqlError::config(format!(
            "startup mode 'timestamp' requires '{}'",
            STARTUP_TIMESTAMP_KEY
          ))
        })?;
        millis.parse::<u64>().map_err(|_| {
          SqlError::config(format!(
            "'{}' must be a non-negative integer, found '{}'",
            STARTUP_TIMESTAMP_KEY, millis
          ))
        })?;
      }
      "specific-offsets" => {
        let offsets = self.get(STARTUP_OFFSETS_KEY).ok_or_else(|| {
          SqlError::config(format!(
            "startup mode 'specific-offsets' requires '{}'",
            STARTUP_OFFSETS_KEY
          ))
        })?;
        if !SPECIFIC_OFFSETS.is_match(offsets) {
          return Err(SqlError::config(format!(
            "'{}' must look like 'partition:0,offset:42;partition:1,offset:300', found '{}'",
            STARTUP_OFFSETS_KEY, offsets
          )));
        }
      }
      _ => {}
    }
    Ok(())
  }

  /// Renders `WITH ('k'='v', ...)`.
  pub fn render(&self) -> String {
    let entries = self
      .entries
      .iter()
      .map(|e| format!("'{}'='{}'", escape(&e.key), escape(&e.value)))
      .collect::<Vec<_>>()
      .join(", ");
    format!("WITH ({})", entries)
  }
}

fn escape(text: &str) -> String {
  text.replace('\'', "''")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  fn base() -> WithClause {
    WithClause::fixed([
      ("connector", "kafka"),
      ("topic", "orders"),
      ("format", "avro-confluent"),
    ])
  }

  #[test]
  fn test_layers_render_in_insertion_order() {
    let mut clause = base();
    clause
      .apply(&PropertyLayer::new("global").with("properties.group.id", "app"))
      .unwrap();
    assert_eq!(
      clause.render(),
      "WITH ('connector'='kafka', 'topic'='orders', 'format'='avro-confluent', \
       'properties.group.id'='app')"
    );
  }

  #[test]
  fn test_protected_keys_cannot_be_overridden() {
    let mut clause = base();
    let err = clause
      .apply(&PropertyLayer::new("additional").with("topic", "other").overriding())
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("reserved"));
    assert!(
      clause
        .apply(&PropertyLayer::new("same").with("topic", "orders"))
        .is_ok()
    );
  }

  #[test]
  fn test_conflicts_require_override_capable_layer() {
    let mut clause = base();
    clause
      .apply(&PropertyLayer::new("global").with("sink.parallelism", "1"))
      .unwrap();

    let err = clause
      .apply(&PropertyLayer::new("topic").with("sink.parallelism", "4"))
      .unwrap_err();
    assert!(err.to_string().contains("conflicts"));

    clause
      .apply(&PropertyLayer::new("topic").with("sink.parallelism", "4").overriding())
      .unwrap();
    assert_eq!(clause.get("sink.parallelism"), Some("4"));
  }

  #[test]
  fn test_startup_mode_validation() {
    let mut clause = base();
    clause
      .apply(&PropertyLayer::new("topic").with(STARTUP_MODE_KEY, "timestamp"))
      .unwrap();
    assert!(clause.validate_startup_mode().is_err());
    clause
      .apply(&PropertyLayer::new("more").with(STARTUP_TIMESTAMP_KEY, "1700000000000"))
      .unwrap();
    assert!(clause.validate_startup_mode().is_ok());

    let mut offsets = base();
    offsets
      .apply(
        &PropertyLayer::new("topic")
          .with(STARTUP_MODE_KEY, "specific-offsets")
          .with(STARTUP_OFFSETS_KEY, "partition:0,offset:42;partition:1"),
      )
      .unwrap();
    assert!(offsets.validate_startup_mode().is_err());

    let mut unknown = base();
    unknown
      .apply(&PropertyLayer::new("topic").with(STARTUP_MODE_KEY, "beginning"))
      .unwrap();
    assert!(unknown.validate_startup_mode().is_err());
  }

  #[test]
  fn test_values_are_quote_escaped() {
    let mut clause = WithClause::default();
    clause
      .apply(&PropertyLayer::new("global").with("properties.sasl.jaas.config", "user='a'"))
      .unwrap();
    assert_eq!(
      clause.render(),
      "WITH ('properties.sasl.jaas.config'='user=''a''')"
    );
  }
}
