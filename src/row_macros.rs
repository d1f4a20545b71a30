//! # Row Macros
//!
//! Declarative macro for describing row types with minimal syntax.

/// Declares a unit row type and implements [`Row`](crate::sql::Row) for it.
///
/// Each column is `Name: ScalarType` optionally followed by modifiers:
/// `nullable`, `decimal(p, s)` or `event_time(source)`.
///
/// ```rust
/// use streamweave_sql::row_type;
/// use streamweave_sql::sql::{EventTimeSource, Row, ScalarType};
///
/// row_type! {
///   pub struct Order {
///     OrderId: ScalarType::BigInt,
///     CustomerId: ScalarType::Int,
///     Amount: ScalarType::Decimal [decimal(18, 2)],
///     Note: ScalarType::String [nullable],
///     EventTime: ScalarType::Timestamp [event_time(EventTimeSource::Payload)],
///   }
/// }
///
/// assert_eq!(Order::NAME, "Order");
/// assert_eq!(Order::columns().len(), 5);
/// ```
#[macro_export]
macro_rules! row_type {
  (
    $(#[$meta:meta])*
    $vis:vis struct $name:ident {
      $($column:ident : $ty:path $([$($modifier:ident $(( $($arg:expr),* ))?),* $(,)?])?),* $(,)?
    }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, Default)]
    $vis struct $name;

    impl $crate::sql::Row for $name {
      const NAME: &'static str = stringify!($name);

      fn columns() -> Vec<$crate::sql::ColumnDefinition> {
        vec![
          $(
            {
              #[allow(unused_mut)]
              let mut column = $crate::sql::ColumnDefinition::new(stringify!($column), $ty);
              $($(
                column = $crate::row_column_modifier!(column, $modifier $(( $($arg),* ))?);
              )*)?
              column
            }
          ),*
        ]
      }
    }
  };
}

/// Applies one column modifier inside [`row_type!`].
#[doc(hidden)]
#[macro_export]
macro_rules! row_column_modifier {
  ($column:ident, nullable) => {
    $column.nullable()
  };
  ($column:ident, decimal($precision:expr, $scale:expr)) => {
    $column.with_decimal($precision, $scale)
  };
  ($column:ident, event_time($source:expr)) => {
    $column.event_time($source)
  };
}
