//! # Fluent Query API
//!
//! Typed entry point over [`QueryPlanBuilder`]. Each call records one clause;
//! [`Query::plan`] snapshots the result and can be called repeatedly.
//!
//! ```rust
//! use std::time::Duration;
//! use streamweave_sql::row_type;
//! use streamweave_sql::sql::ast::{record, Param};
//! use streamweave_sql::sql::dsl::{agg, window};
//! use streamweave_sql::sql::query::Query;
//! use streamweave_sql::sql::{EventTimeSource, Row, ScalarType};
//!
//! row_type! {
//!   pub struct Click {
//!     UserId: ScalarType::String,
//!     EventTime: ScalarType::Timestamp [event_time(EventTimeSource::Payload)],
//!   }
//! }
//!
//! let c = Click::param("c");
//! let x = Param::output("x");
//! let plan = Query::from::<Click>()
//!   .tumble("EventTime", Duration::from_secs(60))
//!   .group_by(record([("UserId", c.col("UserId")), ("WindowStart", window::start())]))
//!   .select(record([("UserId", c.col("UserId")), ("Clicks", agg::count())]))
//!   .having(x.col("Clicks").gt(10))
//!   .plan();
//! assert!(plan.has_aggregate() && plan.has_group_by() && plan.has_having());
//! ```

use std::time::Duration;

use crate::sql::ast::Expression;
use crate::sql::plan::{Predicate, QueryPlan, QueryPlanBuilder, SinkMode, WindowSpec, WindowTime};
use crate::sql::row::Row;

/// A query under construction.
#[derive(Debug, Clone, Default)]
pub struct Query {
  builder: QueryPlanBuilder,
}

impl Query {
  /// Starts a query reading from `T`.
  pub fn from<T: Row>() -> Self {
    let mut builder = QueryPlanBuilder::new();
    builder.add_source_of::<T>();
    Self { builder }
  }

  /// Joins `U` on `on`, which typically compares columns of both sides.
  pub fn join<U: Row>(mut self, on: impl Into<Predicate>) -> Self {
    self.builder.add_source_of::<U>().add_join(on);
    self
  }

  /// Adds a filter; repeated filters are combined with AND.
  pub fn filter(mut self, predicate: impl Into<Predicate>) -> Self {
    self.builder.add_where(predicate);
    self
  }

  /// Sets the projection. A projection containing an aggregate marks the
  /// query as aggregating.
  pub fn select(mut self, projection: impl Into<Expression>) -> Self {
    let projection = projection.into();
    if projection.contains_aggregate() {
      self.builder.mark_aggregate();
    }
    self.builder.set_select(projection);
    self
  }

  /// Sets the grouping keys.
  pub fn group_by(mut self, keys: impl Into<Expression>) -> Self {
    self.builder.set_group_by(keys.into()).mark_group_by();
    self
  }

  /// Filters groups; the predicate ranges over the projected output row.
  pub fn having(mut self, predicate: impl Into<Expression>) -> Self {
    self.builder.set_having(predicate.into()).mark_having();
    self
  }

  /// Tumbling window over the event-time column `time_column`.
  pub fn tumble(self, time_column: &str, size: Duration) -> Self {
    self.window(WindowSpec::tumble(WindowTime::Column(time_column.to_string()), size))
  }

  /// Hopping window over the event-time column `time_column`.
  pub fn hop(self, time_column: &str, size: Duration, slide: Duration) -> Self {
    self.window(WindowSpec::hop(
      WindowTime::Column(time_column.to_string()),
      size,
      slide,
    ))
  }

  /// Session window over the event-time column `time_column`.
  pub fn session(self, time_column: &str, gap: Duration) -> Self {
    self.window(WindowSpec::session(WindowTime::Column(time_column.to_string()), gap))
  }

  /// Sets any window, including processing-time windows.
  pub fn window(mut self, spec: WindowSpec) -> Self {
    self.builder.set_window(spec);
    self
  }

  /// Writes to an upsert sink.
  pub fn upsert(mut self) -> Self {
    self.builder.set_sink_mode(SinkMode::Upsert);
    self
  }

  /// Underlying builder.
  pub fn builder(&self) -> &QueryPlanBuilder {
    &self.builder
  }

  /// Snapshots the plan.
  pub fn plan(&self) -> QueryPlan {
    self.builder.build()
  }
}
