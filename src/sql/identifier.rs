//! Identifier hygiene for table and column names.
//!
//! Names come from arbitrary topic names and row member names. They are
//! normalized into `[a-z][a-z0-9_]*` and always emitted backtick-quoted.
//! Normalization is total: it never fails.

use regex::Regex;
use std::sync::LazyLock;

/// Words that would collide with Flink keywords or built-ins when used bare.
pub const RESERVED_WORDS: &[&str] = &["values", "coalesce"];

const DEFAULT_OBJECT_NAME: &str = "object";
const DEFAULT_IDENTIFIER: &str = "column";

static DISALLOWED: LazyLock<Regex> =
  LazyLock::new(|| Regex::new("[^a-z0-9_]").expect("static pattern"));
static REPEATED_UNDERSCORES: LazyLock<Regex> =
  LazyLock::new(|| Regex::new("_{2,}").expect("static pattern"));

/// Normalizes a table/stream name derived from a topic or entity name.
pub fn normalize_object_name(name: &str) -> String {
  normalize(name, DEFAULT_OBJECT_NAME)
}

/// Normalizes a column name or output alias.
pub fn normalize_identifier(name: &str) -> String {
  normalize(name, DEFAULT_IDENTIFIER)
}

fn normalize(name: &str, default: &str) -> String {
  let lowered = name.trim().replace('-', "_").to_lowercase();
  let replaced = DISALLOWED.replace_all(&lowered, "_");
  let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
  let trimmed = collapsed.trim_matches('_');

  let mut normalized = if trimmed.is_empty() {
    default.to_string()
  } else {
    trimmed.to_string()
  };

  let starts_with_digit = normalized.starts_with(|c: char| c.is_ascii_digit());
  if starts_with_digit || RESERVED_WORDS.contains(&normalized.as_str()) {
    normalized.insert_str(0, "t_");
  }
  normalized
}

/// Wraps an identifier in backticks, doubling embedded backticks.
pub fn quote_identifier(identifier: &str) -> String {
  format!("`{}`", identifier.replace('`', "``"))
}

/// Normalizes and quotes a column name or alias.
pub fn quoted_identifier(name: &str) -> String {
  quote_identifier(&normalize_identifier(name))
}

/// Normalizes and quotes a table name.
pub fn quoted_object_name(name: &str) -> String {
  quote_identifier(&normalize_object_name(name))
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn test_normalize_object_name() {
    assert_eq!(normalize_object_name("My-Topic!!"), "my_topic");
    assert_eq!(normalize_object_name("  orders.v2 "), "orders_v2");
    assert_eq!(normalize_object_name("__a--b__"), "a_b");
    assert_eq!(normalize_object_name("2024-orders"), "t_2024_orders");
    assert_eq!(normalize_object_name("!!!"), "object");
    assert_eq!(normalize_object_name(""), "object");
  }

  #[test]
  fn test_reserved_words_are_prefixed() {
    assert_eq!(normalize_identifier("values"), "t_values");
    assert_eq!(normalize_identifier("VALUES"), "t_values");
    assert_eq!(normalize_identifier("Coalesce"), "t_coalesce");
    assert_eq!(quoted_identifier("values"), "`t_values`");
  }

  #[test]
  fn test_normalize_identifier_default() {
    assert_eq!(normalize_identifier("   "), "column");
    assert_eq!(normalize_identifier("OrderId"), "orderid");
  }

  #[test]
  fn test_non_ascii_is_replaced() {
    assert_eq!(normalize_identifier("prix€"), "prix");
    assert_eq!(normalize_identifier("café_latte"), "caf_latte");
  }

  #[test]
  fn test_quote_identifier_escapes_backticks() {
    assert_eq!(quote_identifier("a`b"), "`a``b`");
    assert_eq!(quote_identifier("orders"), "`orders`");
  }

  // Property-based tests using proptest
  proptest! {
    #[test]
    fn test_normalization_is_total_and_idempotent(name in ".*") {
      let normalized = normalize_object_name(&name);
      let shape = Regex::new("^[a-z][a-z0-9_]*$").unwrap();
      prop_assert!(shape.is_match(&normalized), "{:?} -> {:?}", name, normalized);
      prop_assert!(!normalized.ends_with('_'));
      prop_assert_eq!(normalize_object_name(&normalized), normalized.clone());
      prop_assert_eq!(normalize_identifier(&normalized), normalized);
    }

    #[test]
    fn test_quoting_round_trips_backticks(name in "[a-z`]{0,12}") {
      let quoted = quote_identifier(&name);
      let inner = &quoted[1..quoted.len() - 1];
      prop_assert_eq!(inner.replace("``", "`"), name);
    }
  }
}
