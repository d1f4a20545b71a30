//! Combinators that build [`FunctionCall`] nodes for the function registry.
//!
//! String operations are methods on [`Expression`]; math, Flink library,
//! window and aggregate functions are free functions grouped by origin.
//!
//! ```rust
//! use streamweave_sql::sql::ast::{lit, Param};
//! use streamweave_sql::sql::dsl::{agg, math};
//!
//! let o = Param::bound("o", "Order");
//! let total = agg::sum(math::round(o.col("Amount"), Some(lit(2))));
//! let named = o.col("Name").to_upper().contains("ACME");
//! # let _ = (total, named);
//! ```

use crate::sql::ast::{Expression, FunctionCall, FunctionOrigin};

fn call(origin: FunctionOrigin, name: &str, args: Vec<Expression>) -> Expression {
  Expression::Call(FunctionCall {
    origin,
    name: name.to_string(),
    receiver: None,
    args,
  })
}

impl Expression {
  fn method(self, name: &str, args: Vec<Expression>) -> Expression {
    Expression::Call(FunctionCall {
      origin: FunctionOrigin::String,
      name: name.to_string(),
      receiver: Some(Box::new(self)),
      args,
    })
  }

  /// `LIKE '%pattern%'`
  pub fn contains(self, pattern: impl Into<Expression>) -> Expression {
    self.method("contains", vec![pattern.into()])
  }

  /// `LIKE 'pattern%'`
  pub fn starts_with(self, pattern: impl Into<Expression>) -> Expression {
    self.method("starts_with", vec![pattern.into()])
  }

  /// `LIKE '%pattern'`
  pub fn ends_with(self, pattern: impl Into<Expression>) -> Expression {
    self.method("ends_with", vec![pattern.into()])
  }

  /// Substring from a 0-based offset, optionally limited to `length` chars.
  pub fn substring(self, start: impl Into<Expression>, length: Option<Expression>) -> Expression {
    let mut args = vec![start.into()];
    args.extend(length);
    self.method("substring", args)
  }

  /// Replaces every occurrence of `from` with `to`.
  pub fn replace(self, from: impl Into<Expression>, to: impl Into<Expression>) -> Expression {
    self.method("replace", vec![from.into(), to.into()])
  }

  /// Trims both ends.
  pub fn trim(self) -> Expression {
    self.method("trim", Vec::new())
  }

  /// Trims leading whitespace.
  pub fn trim_start(self) -> Expression {
    self.method("trim_start", Vec::new())
  }

  /// Trims trailing whitespace.
  pub fn trim_end(self) -> Expression {
    self.method("trim_end", Vec::new())
  }

  /// Upper-cases the value.
  pub fn to_upper(self) -> Expression {
    self.method("to_upper", Vec::new())
  }

  /// Lower-cases the value.
  pub fn to_lower(self) -> Expression {
    self.method("to_lower", Vec::new())
  }

  /// 0-based position of `needle`, -1 when absent.
  pub fn index_of(self, needle: impl Into<Expression>) -> Expression {
    self.method("index_of", vec![needle.into()])
  }

  /// Splitting is not available in Flink SQL; kept so the call is reported.
  pub fn split(self, separator: impl Into<Expression>) -> Expression {
    self.method("split", vec![separator.into()])
  }

  /// String length, rendered as `CHAR_LENGTH`.
  pub fn length(self) -> Expression {
    self.member("Length")
  }

  /// Date part, rendered as `EXTRACT(YEAR FROM ...)`.
  pub fn year(self) -> Expression {
    self.member("Year")
  }

  /// Date part, rendered as `EXTRACT(MONTH FROM ...)`.
  pub fn month(self) -> Expression {
    self.member("Month")
  }

  /// Date part, rendered as `EXTRACT(DAY FROM ...)`.
  pub fn day(self) -> Expression {
    self.member("Day")
  }

  /// Date part, rendered as `EXTRACT(HOUR FROM ...)`.
  pub fn hour(self) -> Expression {
    self.member("Hour")
  }

  /// Date part, rendered as `EXTRACT(MINUTE FROM ...)`.
  pub fn minute(self) -> Expression {
    self.member("Minute")
  }

  /// Date part, rendered as `EXTRACT(SECOND FROM ...)`.
  pub fn second(self) -> Expression {
    self.member("Second")
  }
}

/// Static string concatenation.
pub fn concat<I>(parts: I) -> Expression
where
  I: IntoIterator<Item = Expression>,
{
  call(FunctionOrigin::String, "concat", parts.into_iter().collect())
}

/// Math functions.
pub mod math {
  use super::call;
  use crate::sql::ast::{Expression, FunctionOrigin};

  fn math(name: &str, args: Vec<Expression>) -> Expression {
    call(FunctionOrigin::Math, name, args)
  }

  /// `ROUND(x[, digits])`
  pub fn round(x: impl Into<Expression>, digits: Option<Expression>) -> Expression {
    let mut args = vec![x.into()];
    args.extend(digits);
    math("round", args)
  }

  /// `FLOOR(x)`
  pub fn floor(x: impl Into<Expression>) -> Expression {
    math("floor", vec![x.into()])
  }

  /// `CEIL(x)`
  pub fn ceiling(x: impl Into<Expression>) -> Expression {
    math("ceiling", vec![x.into()])
  }

  /// `ABS(x)`
  pub fn abs(x: impl Into<Expression>) -> Expression {
    math("abs", vec![x.into()])
  }

  /// `POWER(x, y)`
  pub fn pow(x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
    math("pow", vec![x.into(), y.into()])
  }

  /// `SQRT(x)`
  pub fn sqrt(x: impl Into<Expression>) -> Expression {
    math("sqrt", vec![x.into()])
  }

  /// Natural log, or `LOG(base, x)` when a base is given.
  pub fn log(x: impl Into<Expression>, base: Option<Expression>) -> Expression {
    let mut args = vec![x.into()];
    args.extend(base);
    math("log", args)
  }

  /// `LOG10(x)`
  pub fn log10(x: impl Into<Expression>) -> Expression {
    math("log10", vec![x.into()])
  }

  /// `EXP(x)`
  pub fn exp(x: impl Into<Expression>) -> Expression {
    math("exp", vec![x.into()])
  }
}

/// Explicit Flink scalar-function library.
pub mod flink {
  use super::call;
  use crate::sql::ast::{Expression, FunctionOrigin};

  /// Calls a library function by name; unknown names fail at render time.
  pub fn function<I>(name: &str, args: I) -> Expression
  where
    I: IntoIterator<Item = Expression>,
  {
    call(FunctionOrigin::Flink, name, args.into_iter().collect())
  }

  /// `JSON_VALUE(json, path)`
  pub fn json_value(json: impl Into<Expression>, path: impl Into<Expression>) -> Expression {
    function("json_value", [json.into(), path.into()])
  }

  /// `JSON_QUERY(json, path)`
  pub fn json_query(json: impl Into<Expression>, path: impl Into<Expression>) -> Expression {
    function("json_query", [json.into(), path.into()])
  }

  /// `DATE_FORMAT(ts, format)`
  pub fn date_format(ts: impl Into<Expression>, format: impl Into<Expression>) -> Expression {
    function("date_format", [ts.into(), format.into()])
  }

  /// `SPLIT_INDEX(text, separator, index)`
  pub fn split_index(
    text: impl Into<Expression>,
    separator: impl Into<Expression>,
    index: impl Into<Expression>,
  ) -> Expression {
    function("split_index", [text.into(), separator.into(), index.into()])
  }

  /// `CHAR_LENGTH(text)`
  pub fn char_length(text: impl Into<Expression>) -> Expression {
    function("char_length", [text.into()])
  }

  /// `TIMESTAMPDIFF(UNIT, from, to)`; `unit` must be a string literal.
  pub fn timestamp_diff(
    unit: &str,
    from: impl Into<Expression>,
    to: impl Into<Expression>,
  ) -> Expression {
    function("timestamp_diff", [Expression::from(unit), from.into(), to.into()])
  }

  /// `CARDINALITY(array)`
  pub fn cardinality(array: impl Into<Expression>) -> Expression {
    function("cardinality", [array.into()])
  }
}

/// Window markers, valid in windowed queries.
pub mod window {
  use super::call;
  use crate::sql::ast::{Expression, FunctionOrigin};

  /// `window_start`
  pub fn start() -> Expression {
    call(FunctionOrigin::Window, "start", Vec::new())
  }

  /// `window_end`
  pub fn end() -> Expression {
    call(FunctionOrigin::Window, "end", Vec::new())
  }

  /// `PROCTIME()`
  pub fn proctime() -> Expression {
    call(FunctionOrigin::Window, "proctime", Vec::new())
  }
}

/// Aggregate markers.
pub mod agg {
  use super::call;
  use crate::sql::ast::{Expression, FunctionOrigin};

  fn aggregate(name: &str, args: Vec<Expression>) -> Expression {
    call(FunctionOrigin::Aggregate, name, args)
  }

  /// `COUNT(*)`
  pub fn count() -> Expression {
    aggregate("count", Vec::new())
  }

  /// `COUNT(x)`
  pub fn count_of(x: impl Into<Expression>) -> Expression {
    aggregate("count", vec![x.into()])
  }

  /// `COUNT(DISTINCT x)`
  pub fn count_distinct(x: impl Into<Expression>) -> Expression {
    aggregate("count_distinct", vec![x.into()])
  }

  /// `SUM(x)`
  pub fn sum(x: impl Into<Expression>) -> Expression {
    aggregate("sum", vec![x.into()])
  }

  /// `AVG(x)`
  pub fn avg(x: impl Into<Expression>) -> Expression {
    aggregate("avg", vec![x.into()])
  }

  /// `MIN(x)`
  pub fn min(x: impl Into<Expression>) -> Expression {
    aggregate("min", vec![x.into()])
  }

  /// `MAX(x)`
  pub fn max(x: impl Into<Expression>) -> Expression {
    aggregate("max", vec![x.into()])
  }

  /// Rejected by the Flink dialect.
  pub fn earliest_by_offset(x: impl Into<Expression>) -> Expression {
    aggregate("earliest_by_offset", vec![x.into()])
  }

  /// Rejected by the Flink dialect.
  pub fn latest_by_offset(x: impl Into<Expression>) -> Expression {
    aggregate("latest_by_offset", vec![x.into()])
  }
}
