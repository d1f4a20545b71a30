//! Column and table definitions for source/sink `CREATE TABLE` statements.
//!
//! Definitions are plain data built by the caller (usually from
//! [`Row::columns`](crate::sql::Row::columns)). This module renders the
//! parenthesized column list: columns, the optional watermark clause and,
//! for sinks, the primary key. The WITH clause lives in
//! [`properties`](crate::sql::properties).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SqlError, SqlResult};
use crate::sql::identifier::{normalize_identifier, quote_identifier, quoted_identifier};
use crate::sql::interval::SqlInterval;
use crate::sql::row::Row;

/// Precision and scale used for decimals without an explicit attribute.
pub const DEFAULT_DECIMAL: (u8, u8) = (38, 18);

/// Scalar column type of a row member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
  /// `bool`
  Boolean,
  /// `i8`
  TinyInt,
  /// `i16`
  SmallInt,
  /// `i32`
  Int,
  /// `i64`
  BigInt,
  /// `f32`
  Float,
  /// `f64`
  Double,
  /// Exact decimal, see [`ColumnDefinition::decimal`]
  Decimal,
  /// Text
  String,
  /// Raw bytes
  Bytes,
  /// Calendar date
  Date,
  /// Timestamp with millisecond precision
  Timestamp,
}

/// Where an event-time column takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTimeSource {
  /// A regular payload field.
  Payload,
  /// The Kafka record timestamp, exposed as a virtual metadata column.
  KafkaTimestamp,
}

/// One column of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
  /// Member name; normalized when rendered.
  pub name: String,
  /// Scalar type
  pub scalar_type: ScalarType,
  /// Whether NULL is allowed
  pub nullable: bool,
  /// Decimal `(precision, scale)`; [`DEFAULT_DECIMAL`] when absent
  pub decimal: Option<(u8, u8)>,
  /// Set when this column drives event time and the watermark
  pub event_time: Option<EventTimeSource>,
}

impl ColumnDefinition {
  /// A non-nullable column.
  pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
    Self {
      name: name.into(),
      scalar_type,
      nullable: false,
      decimal: None,
      event_time: None,
    }
  }

  /// Marks the column nullable.
  pub fn nullable(mut self) -> Self {
    self.nullable = true;
    self
  }

  /// Sets decimal precision and scale.
  pub fn with_decimal(mut self, precision: u8, scale: u8) -> Self {
    self.decimal = Some((precision, scale));
    self
  }

  /// Marks the column as the event-time column.
  pub fn event_time(mut self, source: EventTimeSource) -> Self {
    self.event_time = Some(source);
    self
  }

  fn is_kafka_timestamp(&self) -> bool {
    self.event_time == Some(EventTimeSource::KafkaTimestamp)
  }

  /// Flink type for this column.
  pub fn sql_type(&self) -> SqlResult<String> {
    let ty = match self.scalar_type {
      ScalarType::Boolean => "BOOLEAN".to_string(),
      ScalarType::TinyInt => "TINYINT".to_string(),
      ScalarType::SmallInt => "SMALLINT".to_string(),
      ScalarType::Int => "INT".to_string(),
      ScalarType::BigInt => "BIGINT".to_string(),
      ScalarType::Float => "FLOAT".to_string(),
      ScalarType::Double => "DOUBLE".to_string(),
      ScalarType::String => "STRING".to_string(),
      ScalarType::Bytes => "BYTES".to_string(),
      ScalarType::Date => "DATE".to_string(),
      ScalarType::Decimal => {
        let (precision, scale) = self.decimal.unwrap_or(DEFAULT_DECIMAL);
        if precision == 0 || precision > 38 || scale > precision {
          return Err(SqlError::config(format!(
            "column `{}` has invalid decimal precision/scale ({}, {})",
            self.name, precision, scale
          )));
        }
        format!("DECIMAL({}, {})", precision, scale)
      }
      ScalarType::Timestamp if self.is_kafka_timestamp() => "TIMESTAMP_LTZ(3)".to_string(),
      ScalarType::Timestamp => "TIMESTAMP(3)".to_string(),
    };
    Ok(ty)
  }

  fn render(&self) -> SqlResult<String> {
    let name = quoted_identifier(&self.name);
    let ty = self.sql_type()?;
    if self.is_kafka_timestamp() {
      return Ok(format!("{} {} METADATA FROM 'timestamp' VIRTUAL", name, ty));
    }
    if self.nullable {
      Ok(format!("{} {}", name, ty))
    } else {
      Ok(format!("{} {} NOT NULL", name, ty))
    }
  }
}

/// Whether a table is read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableRole {
  /// Source table; `scan.*` options are validated.
  Source,
  /// Sink table; the primary key is emitted.
  Sink,
}

/// Input for one `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
  /// Table name before normalization
  pub object_name: String,
  /// Kafka topic backing the table
  pub topic_name: String,
  /// Ordered columns
  pub columns: Vec<ColumnDefinition>,
  /// Primary key columns; only rendered for sinks
  pub primary_key: Vec<String>,
  /// Allowed lateness of the event-time column
  pub watermark_delay: Option<Duration>,
  /// Name of a computed processing-time column, if any
  pub proctime_column: Option<String>,
}

impl EntityDefinition {
  /// Creates a definition with explicit columns.
  pub fn new(
    object_name: impl Into<String>,
    topic_name: impl Into<String>,
    columns: Vec<ColumnDefinition>,
  ) -> Self {
    Self {
      object_name: object_name.into(),
      topic_name: topic_name.into(),
      columns,
      primary_key: Vec::new(),
      watermark_delay: None,
      proctime_column: None,
    }
  }

  /// Creates a definition for row type `T` backed by `topic`; the table is
  /// named after the topic.
  pub fn for_row<T: Row>(topic: impl Into<String>) -> Self {
    let topic = topic.into();
    Self::new(topic.clone(), topic, T::columns())
  }

  /// Overrides the table name.
  pub fn with_object_name(mut self, object_name: impl Into<String>) -> Self {
    self.object_name = object_name.into();
    self
  }

  /// Declares primary key columns.
  pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.primary_key = columns.into_iter().map(Into::into).collect();
    self
  }

  /// Sets the watermark delay of the event-time column.
  pub fn with_watermark_delay(mut self, delay: Duration) -> Self {
    self.watermark_delay = Some(delay);
    self
  }

  /// Adds a computed `PROCTIME()` column.
  pub fn with_proctime(mut self, column: impl Into<String>) -> Self {
    self.proctime_column = Some(column.into());
    self
  }

  fn event_time_column(&self) -> SqlResult<Option<&ColumnDefinition>> {
    let mut event_time = self.columns.iter().filter(|c| c.event_time.is_some());
    let first = event_time.next();
    if let Some(second) = event_time.next() {
      return Err(SqlError::config(format!(
        "table `{}` declares more than one event-time column (`{}`, `{}`)",
        self.object_name,
        first.map(|c| c.name.as_str()).unwrap_or_default(),
        second.name
      )));
    }
    if let Some(column) = first {
      if column.scalar_type != ScalarType::Timestamp {
        return Err(SqlError::config(format!(
          "event-time column `{}` must be a timestamp, found {:?}",
          column.name, column.scalar_type
        )));
      }
    }
    Ok(first)
  }

  /// Renders the parenthesized body of `CREATE TABLE`, without the parens.
  pub fn render_body(&self, role: TableRole) -> SqlResult<String> {
    if self.columns.is_empty() {
      return Err(SqlError::config(format!(
        "table `{}` has no columns",
        self.object_name
      )));
    }

    let mut parts = self
      .columns
      .iter()
      .map(ColumnDefinition::render)
      .collect::<SqlResult<Vec<_>>>()?;

    if let Some(proctime) = &self.proctime_column {
      parts.push(format!("{} AS PROCTIME()", quoted_identifier(proctime)));
    }

    let delay = self
      .watermark_delay
      .map(SqlInterval::from_duration)
      .transpose()?;
    match (self.event_time_column()?, delay) {
      (Some(column), delay) => {
        let name = quoted_identifier(&column.name);
        parts.push(match delay {
          Some(delay) => format!("WATERMARK FOR {} AS {} - {}", name, name, delay),
          None => format!("WATERMARK FOR {} AS {}", name, name),
        });
      }
      (None, Some(_)) => {
        return Err(SqlError::config(format!(
          "table `{}` sets a watermark delay but has no event-time column",
          self.object_name
        )));
      }
      (None, None) => {}
    }

    if role == TableRole::Sink && !self.primary_key.is_empty() {
      let keys = self
        .primary_key
        .iter()
        .map(|key| {
          let normalized = normalize_identifier(key);
          let known = self
            .columns
            .iter()
            .any(|c| normalize_identifier(&c.name) == normalized);
          if known {
            Ok(quote_identifier(&normalized))
          } else {
            Err(SqlError::config(format!(
              "primary key column `{}` is not a column of `{}`",
              key, self.object_name
            )))
          }
        })
        .collect::<SqlResult<Vec<_>>>()?;
      parts.push(format!("PRIMARY KEY ({}) NOT ENFORCED", keys.join(", ")));
    }

    Ok(parts.join(", "))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  fn orders() -> EntityDefinition {
    EntityDefinition::new(
      "orders",
      "orders",
      vec![
        ColumnDefinition::new("OrderId", ScalarType::BigInt),
        ColumnDefinition::new("Amount", ScalarType::Decimal).with_decimal(18, 2),
        ColumnDefinition::new("Discount", ScalarType::Decimal).nullable(),
        ColumnDefinition::new("EventTime", ScalarType::Timestamp)
          .event_time(EventTimeSource::Payload),
      ],
    )
  }

  #[test]
  fn test_column_types() {
    let body = orders().render_body(TableRole::Source).unwrap();
    assert_eq!(
      body,
      "`orderid` BIGINT NOT NULL, `amount` DECIMAL(18, 2) NOT NULL, \
       `discount` DECIMAL(38, 18), `eventtime` TIMESTAMP(3) NOT NULL, \
       WATERMARK FOR `eventtime` AS `eventtime`"
    );
  }

  #[test]
  fn test_kafka_timestamp_column_is_virtual_metadata() {
    let entity = EntityDefinition::new(
      "clicks",
      "clicks",
      vec![
        ColumnDefinition::new("Url", ScalarType::String),
        ColumnDefinition::new("Ts", ScalarType::Timestamp)
          .event_time(EventTimeSource::KafkaTimestamp),
      ],
    )
    .with_watermark_delay(Duration::from_millis(5000));
    let body = entity.render_body(TableRole::Source).unwrap();
    assert!(body.contains("`ts` TIMESTAMP_LTZ(3) METADATA FROM 'timestamp' VIRTUAL"));
    assert!(body.ends_with("WATERMARK FOR `ts` AS `ts` - INTERVAL '5' SECOND"));
  }

  #[test]
  fn test_watermark_delay_must_be_whole_unit() {
    let err = orders()
      .with_watermark_delay(Duration::from_millis(1500))
      .render_body(TableRole::Source)
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInterval);
  }

  #[test]
  fn test_watermark_delay_without_event_time() {
    let entity = EntityDefinition::new(
      "t",
      "t",
      vec![ColumnDefinition::new("Id", ScalarType::BigInt)],
    );
    let malformed = entity
      .clone()
      .with_watermark_delay(Duration::from_millis(1500))
      .render_body(TableRole::Source)
      .unwrap_err();
    assert_eq!(malformed.kind(), ErrorKind::MalformedInterval);

    let orphaned = entity
      .with_watermark_delay(Duration::from_secs(5))
      .render_body(TableRole::Source)
      .unwrap_err();
    assert_eq!(orphaned.kind(), ErrorKind::Configuration);
  }

  #[test]
  fn test_primary_key_only_for_sinks() {
    let entity = orders().with_primary_key(["OrderId"]);
    let sink = entity.render_body(TableRole::Sink).unwrap();
    assert!(sink.ends_with("PRIMARY KEY (`orderid`) NOT ENFORCED"));
    let source = entity.render_body(TableRole::Source).unwrap();
    assert!(!source.contains("PRIMARY KEY"));
  }

  #[test]
  fn test_unknown_primary_key_is_rejected() {
    let err = orders()
      .with_primary_key(["Missing"])
      .render_body(TableRole::Sink)
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
  }

  #[test]
  fn test_two_event_time_columns_are_rejected() {
    let mut entity = orders();
    entity.columns.push(
      ColumnDefinition::new("Other", ScalarType::Timestamp).event_time(EventTimeSource::Payload),
    );
    assert!(entity.render_body(TableRole::Source).is_err());
  }

  #[test]
  fn test_proctime_column() {
    let body = orders()
      .with_proctime("proctime")
      .render_body(TableRole::Source)
      .unwrap();
    assert!(body.contains("`proctime` AS PROCTIME()"));
  }
}
