//! # Query Plan
//!
//! The plan data model and the mutable builder that accumulates it.
//!
//! A [`QueryPlanBuilder`] receives fluent calls (sources, joins, filters,
//! projection, grouping, having, window) and produces an immutable
//! [`QueryPlan`] on demand. Building never fails: legality is checked by the
//! dialect when the plan is rendered, so incomplete or order-violating plans
//! can still be inspected.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sql::ast::{Expression, Param};
use crate::sql::clause::{build_group_by_clause, build_select_clause, GroupByClause, SelectClause};
use crate::sql::row::Row;

/// A boolean expression closed over one or more row parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
  /// Predicate body
  pub body: Expression,
  /// Parameters referenced by the body, in first-seen order
  pub params: Vec<Param>,
}

impl Predicate {
  /// Wraps `body`, collecting the parameters it references.
  pub fn new(body: Expression) -> Self {
    let params = body.params();
    Self { body, params }
  }
}

impl From<Expression> for Predicate {
  fn from(body: Expression) -> Self {
    Predicate::new(body)
  }
}

/// Window table-valued function kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
  /// Fixed, non-overlapping windows
  Tumble,
  /// Fixed size windows advancing by a slide
  Hop,
  /// Gap-based windows
  Session,
}

/// Time attribute a window ranges over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowTime {
  /// Event-time column of the source
  Column(String),
  /// The source's processing-time column
  Proctime,
}

/// Column name a [`WindowTime::Proctime`] window describes.
pub const PROCTIME_COLUMN: &str = "proctime";

/// Window specification.
///
/// `slide` is only meaningful for [`WindowKind::Hop`]; the constructors set
/// it exactly for hopping windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
  /// Window kind
  pub kind: WindowKind,
  /// Time attribute
  pub time: WindowTime,
  /// Window size, or the gap for session windows
  pub size: Duration,
  /// Slide of hopping windows
  pub slide: Option<Duration>,
}

impl WindowSpec {
  /// Tumbling window of `size`.
  pub fn tumble(time: WindowTime, size: Duration) -> Self {
    Self {
      kind: WindowKind::Tumble,
      time,
      size,
      slide: None,
    }
  }

  /// Hopping window of `size` advancing by `slide`.
  pub fn hop(time: WindowTime, size: Duration, slide: Duration) -> Self {
    Self {
      kind: WindowKind::Hop,
      time,
      size,
      slide: Some(slide),
    }
  }

  /// Session window closed after `gap` of inactivity.
  pub fn session(time: WindowTime, gap: Duration) -> Self {
    Self {
      kind: WindowKind::Session,
      time,
      size: gap,
      slide: None,
    }
  }
}

/// How the sink consumes the query's changelog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkMode {
  /// Insert-only sink
  #[default]
  AppendOnly,
  /// Keyed sink that overwrites rows with the same key
  Upsert,
}

/// Immutable description of one streaming query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
  source_types: Vec<String>,
  source_topics: Vec<String>,
  join_predicates: Vec<Predicate>,
  where_predicates: Vec<Predicate>,
  select_expr: Option<Expression>,
  select_clause: SelectClause,
  group_by_clause: Option<GroupByClause>,
  having: Option<Expression>,
  window: Option<WindowSpec>,
  has_group_by: bool,
  has_aggregate: bool,
  has_having: bool,
  sink_mode: SinkMode,
}

impl QueryPlan {
  /// Row type names, in first-seen order.
  pub fn source_types(&self) -> &[String] {
    &self.source_types
  }

  /// Topics backing each source; empty or aligned with `source_types`.
  pub fn source_topics(&self) -> &[String] {
    &self.source_topics
  }

  /// One predicate per join, in join order.
  pub fn join_predicates(&self) -> &[Predicate] {
    &self.join_predicates
  }

  /// Filter predicates, combined with AND.
  pub fn where_predicates(&self) -> &[Predicate] {
    &self.where_predicates
  }

  /// The projection as written, before clause analysis.
  pub fn select_expr(&self) -> Option<&Expression> {
    self.select_expr.as_ref()
  }

  /// Analyzed projection; a wildcard when nothing was selected.
  pub fn select_clause(&self) -> &SelectClause {
    &self.select_clause
  }

  /// Analyzed grouping keys.
  pub fn group_by_clause(&self) -> Option<&GroupByClause> {
    self.group_by_clause.as_ref()
  }

  /// HAVING predicate, written against the projected output row.
  pub fn having(&self) -> Option<&Expression> {
    self.having.as_ref()
  }

  /// Window specification.
  pub fn window(&self) -> Option<&WindowSpec> {
    self.window.as_ref()
  }

  /// Whether `group_by` was called.
  pub fn has_group_by(&self) -> bool {
    self.has_group_by
  }

  /// Whether the projection aggregates.
  pub fn has_aggregate(&self) -> bool {
    self.has_aggregate
  }

  /// Whether `having` was called.
  pub fn has_having(&self) -> bool {
    self.has_having
  }

  /// Sink mode.
  pub fn sink_mode(&self) -> SinkMode {
    self.sink_mode
  }

  /// Returns a copy of the plan reading from `topics`, one per source.
  pub fn with_source_topics<I, S>(mut self, topics: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.source_topics = topics.into_iter().map(Into::into).collect();
    self
  }

  /// JSON snapshot of the plan.
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }
}

/// Mutable accumulator for a [`QueryPlan`].
///
/// Flags set by the `mark_*` methods are independent of the clauses; keeping
/// them consistent is up to the caller.
#[derive(Debug, Clone, Default)]
pub struct QueryPlanBuilder {
  source_types: Vec<String>,
  join_predicates: Vec<Predicate>,
  where_predicates: Vec<Predicate>,
  select_expr: Option<Expression>,
  group_by: Option<(Expression, GroupByClause)>,
  having: Option<Expression>,
  window: Option<WindowSpec>,
  has_group_by: bool,
  has_aggregate: bool,
  has_having: bool,
  sink_mode: SinkMode,
}

impl QueryPlanBuilder {
  /// An empty builder.
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a source row type; registering it again is a no-op.
  pub fn add_source(&mut self, row: impl Into<String>) -> &mut Self {
    let row = row.into();
    if !self.source_types.contains(&row) {
      self.source_types.push(row);
    }
    self
  }

  /// Registers `T` as a source.
  pub fn add_source_of<T: Row>(&mut self) -> &mut Self {
    self.add_source(T::NAME)
  }

  /// Appends a join predicate.
  pub fn add_join(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
    self.join_predicates.push(predicate.into());
    self
  }

  /// Appends a filter predicate.
  pub fn add_where(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
    self.where_predicates.push(predicate.into());
    self
  }

  /// Sets the projection.
  pub fn set_select(&mut self, expr: Expression) -> &mut Self {
    self.select_expr = Some(expr);
    self
  }

  /// Sets the grouping keys and analyzes them immediately.
  pub fn set_group_by(&mut self, expr: Expression) -> &mut Self {
    let clause = build_group_by_clause(&expr);
    self.group_by = Some((expr, clause));
    self
  }

  /// Sets the HAVING predicate.
  pub fn set_having(&mut self, expr: Expression) -> &mut Self {
    self.having = Some(expr);
    self
  }

  /// Sets the window; the last call wins.
  pub fn set_window(&mut self, spec: WindowSpec) -> &mut Self {
    self.window = Some(spec);
    self
  }

  /// Sets the sink mode.
  pub fn set_sink_mode(&mut self, mode: SinkMode) -> &mut Self {
    self.sink_mode = mode;
    self
  }

  /// Flags the plan as grouped.
  pub fn mark_group_by(&mut self) -> &mut Self {
    self.has_group_by = true;
    self
  }

  /// Flags the plan as aggregating.
  pub fn mark_aggregate(&mut self) -> &mut Self {
    self.has_aggregate = true;
    self
  }

  /// Flags the plan as having a HAVING predicate.
  pub fn mark_having(&mut self) -> &mut Self {
    self.has_having = true;
    self
  }

  /// Snapshots the accumulated state.
  pub fn build(&self) -> QueryPlan {
    let select_clause = self
      .select_expr
      .as_ref()
      .map(build_select_clause)
      .unwrap_or_default();
    QueryPlan {
      source_types: self.source_types.clone(),
      source_topics: Vec::new(),
      join_predicates: self.join_predicates.clone(),
      where_predicates: self.where_predicates.clone(),
      select_expr: self.select_expr.clone(),
      select_clause,
      group_by_clause: self.group_by.as_ref().map(|(_, clause)| clause.clone()),
      having: self.having.clone(),
      window: self.window.clone(),
      has_group_by: self.has_group_by,
      has_aggregate: self.has_aggregate,
      has_having: self.has_having,
      sink_mode: self.sink_mode,
    }
  }
}
