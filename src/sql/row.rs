//! Row types: the typed sources and sinks a query ranges over.

use crate::sql::ast::Param;
use crate::sql::ddl::ColumnDefinition;

/// A row-shaped record type usable as a query source.
///
/// Usually declared with [`row_type!`](crate::row_type), which also records
/// the column metadata used for table DDL.
pub trait Row {
  /// Type name; identifies the source inside a plan.
  const NAME: &'static str;

  /// Ordered column metadata.
  fn columns() -> Vec<ColumnDefinition>;

  /// Parameter ranging over this row type.
  fn param(name: &str) -> Param {
    Param::bound(name, Self::NAME)
  }
}
