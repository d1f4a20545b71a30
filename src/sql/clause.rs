//! # Clause Analysis
//!
//! Turns a projection or grouping expression into an ordered list of
//! `(alias, expression)` pairs, or detects the wildcard case.
//!
//! - `x` (the row itself) becomes [`Clause::Wildcard`]
//! - `record([("A", ..), ("B", ..)])` becomes one item per member, in
//!   declaration order, aliased by member name
//! - any other expression becomes a single item aliased `value`

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::sql::ast::{Expression, Param};
use crate::sql::identifier::normalize_identifier;

/// Alias given to a projection that is a single scalar.
pub const SCALAR_ALIAS: &str = "value";

/// One aliased projection item or grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseItem {
  /// Output alias
  pub alias: String,
  /// Expression producing the value
  pub expr: Expression,
}

/// Analyzed SELECT or GROUP BY clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
  /// Every column of one parameter, or of all sources when `None`.
  Wildcard(Option<Param>),
  /// Explicit items in declaration order.
  Items(Vec<ClauseItem>),
}

/// Analyzed projection.
pub type SelectClause = Clause;
/// Analyzed grouping keys.
pub type GroupByClause = Clause;

impl Default for Clause {
  fn default() -> Self {
    Clause::Wildcard(None)
  }
}

impl Clause {
  /// Whether this is the wildcard form.
  pub fn is_wildcard(&self) -> bool {
    matches!(self, Clause::Wildcard(_))
  }

  /// Explicit items; empty for the wildcard form.
  pub fn items(&self) -> &[ClauseItem] {
    match self {
      Clause::Wildcard(_) => &[],
      Clause::Items(items) => items,
    }
  }

  /// Item with the given alias.
  pub fn item(&self, alias: &str) -> Option<&ClauseItem> {
    self.items().iter().find(|item| item.alias == alias)
  }
}

fn analyze(expr: &Expression, clause: &str) -> Clause {
  match expr {
    Expression::Param(param) => Clause::Wildcard(Some(param.clone())),
    Expression::Record(members) if members.is_empty() => {
      warn!(
        clause = clause,
        "record construction has no members, falling back to a wildcard"
      );
      Clause::Wildcard(None)
    }
    Expression::Record(members) => {
      let mut seen = HashSet::new();
      for member in members {
        if !seen.insert(normalize_identifier(&member.name)) {
          warn!(
            clause = clause,
            member = %member.name,
            "record member name collides with an earlier member"
          );
        }
      }
      Clause::Items(
        members
          .iter()
          .map(|member| ClauseItem {
            alias: member.name.clone(),
            expr: member.value.clone(),
          })
          .collect(),
      )
    }
    other => Clause::Items(vec![ClauseItem {
      alias: SCALAR_ALIAS.to_string(),
      expr: other.clone(),
    }]),
  }
}

/// Analyzes a projection expression.
pub fn build_select_clause(expr: &Expression) -> SelectClause {
  analyze(expr, "select")
}

/// Analyzes a grouping expression.
pub fn build_group_by_clause(expr: &Expression) -> GroupByClause {
  analyze(expr, "group_by")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sql::ast::{lit, record};

  #[test]
  fn test_identity_is_wildcard() {
    let o = Param::bound("o", "Order");
    assert_eq!(build_select_clause(&o.row()), Clause::Wildcard(Some(o)));
  }

  #[test]
  fn test_record_members_keep_declaration_order() {
    let o = Param::bound("o", "Order");
    let clause = build_select_clause(&record([
      ("Zeta", o.col("Z")),
      ("Alpha", o.col("A")),
      ("Mid", o.col("M") + lit(1)),
    ]));
    let aliases: Vec<_> = clause.items().iter().map(|i| i.alias.as_str()).collect();
    assert_eq!(aliases, ["Zeta", "Alpha", "Mid"]);
    assert_eq!(clause.item("Alpha").map(|i| &i.expr), Some(&o.col("A")));
  }

  #[test]
  fn test_scalar_projection_is_aliased_value() {
    let o = Param::bound("o", "Order");
    let clause = build_group_by_clause(&o.col("CustomerId"));
    assert_eq!(
      clause,
      Clause::Items(vec![ClauseItem {
        alias: SCALAR_ALIAS.to_string(),
        expr: o.col("CustomerId"),
      }])
    );
  }

  #[test]
  fn test_empty_record_degrades_to_wildcard() {
    let clause = build_select_clause(&record(Vec::<(String, Expression)>::new()));
    assert!(clause.is_wildcard());
    assert!(clause.items().is_empty());
  }
}
