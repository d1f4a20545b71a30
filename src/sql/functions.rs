//! # Function Registry
//!
//! Closed dispatch table from `(origin, name, argument count)` to a rendering
//! rule. A call that matches no entry is a hard error naming the fully
//! qualified call; some entries are declared only to reject the call with a
//! pointed message.
//!
//! The registry is an immutable value injected into the dialect, following
//! the declarative mapper pattern: simple renames, templates with `{n}`
//! placeholders, and custom transforms with access to the raw arguments.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{SqlError, SqlResult};
use crate::sql::ast::{Expression, FunctionCall, FunctionOrigin, Literal};

/// Escape character used for LIKE patterns built from literals.
pub const LIKE_ESCAPE: char = '^';

/// Custom rendering closure.
pub type RenderFn = Arc<dyn Fn(&CallArgs<'_>) -> SqlResult<String> + Send + Sync>;

/// Arguments handed to a rendering rule.
///
/// `rendered` holds the receiver (if any) followed by the explicit
/// arguments, already rendered to SQL.
pub struct CallArgs<'a> {
  /// The captured call
  pub call: &'a FunctionCall,
  /// Rendered receiver and arguments
  pub rendered: &'a [String],
}

impl CallArgs<'_> {
  /// Raw expression at the same position as `rendered[index]`.
  pub fn raw(&self, index: usize) -> Option<&Expression> {
    match &self.call.receiver {
      Some(receiver) if index == 0 => Some(receiver.as_ref()),
      Some(_) => self.call.args.get(index - 1),
      None => self.call.args.get(index),
    }
  }

  fn get(&self, index: usize) -> SqlResult<&str> {
    self.rendered.get(index).map(String::as_str).ok_or_else(|| {
      SqlError::unsupported(format!(
        "`{}` is missing argument {}",
        self.call.qualified_name(),
        index
      ))
    })
  }
}

/// How a registered function is rendered.
#[derive(Clone)]
pub enum RenderRule {
  /// `NAME(arg0, arg1, ...)`
  Rename(&'static str),
  /// Text with `{n}` placeholders for rendered arguments
  Template(&'static str),
  /// Custom transform
  Transform(RenderFn),
  /// Declared but rejected by this dialect, with an optional hint
  Rejected(Option<&'static str>),
}

impl fmt::Debug for RenderRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RenderRule::Rename(s) => write!(f, "Rename({})", s),
      RenderRule::Template(s) => write!(f, "Template({})", s),
      RenderRule::Transform(_) => write!(f, "Transform"),
      RenderRule::Rejected(hint) => write!(f, "Rejected({:?})", hint),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FunctionKey {
  origin: FunctionOrigin,
  name: String,
  argc: usize,
}

/// Registry of function rendering rules.
#[derive(Clone)]
pub struct FunctionRegistry {
  rules: HashMap<FunctionKey, RenderRule>,
}

impl fmt::Debug for FunctionRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FunctionRegistry")
      .field("rules_count", &self.rules.len())
      .finish()
  }
}

impl Default for FunctionRegistry {
  fn default() -> Self {
    Self::flink()
  }
}

impl FunctionRegistry {
  /// An empty registry.
  pub fn empty() -> Self {
    Self {
      rules: HashMap::new(),
    }
  }

  fn insert(mut self, origin: FunctionOrigin, name: &str, argc: usize, rule: RenderRule) -> Self {
    let key = FunctionKey {
      origin,
      name: name.to_string(),
      argc,
    };
    self.rules.insert(key, rule);
    self
  }

  /// Registers `NAME(args)` for each argument count in `argc`.
  pub fn rename(
    mut self,
    origin: FunctionOrigin,
    name: &str,
    argc: impl IntoIterator<Item = usize>,
    sql_name: &'static str,
  ) -> Self {
    for n in argc {
      self = self.insert(origin, name, n, RenderRule::Rename(sql_name));
    }
    self
  }

  /// Registers a placeholder template.
  pub fn template(
    self,
    origin: FunctionOrigin,
    name: &str,
    argc: usize,
    template: &'static str,
  ) -> Self {
    self.insert(origin, name, argc, RenderRule::Template(template))
  }

  /// Registers a custom transform.
  pub fn transform<F>(self, origin: FunctionOrigin, name: &str, argc: usize, f: F) -> Self
  where
    F: Fn(&CallArgs<'_>) -> SqlResult<String> + Send + Sync + 'static,
  {
    self.insert(origin, name, argc, RenderRule::Transform(Arc::new(f)))
  }

  /// Declares a function that this dialect rejects.
  pub fn reject(
    mut self,
    origin: FunctionOrigin,
    name: &str,
    argc: impl IntoIterator<Item = usize>,
    hint: Option<&'static str>,
  ) -> Self {
    for n in argc {
      self = self.insert(origin, name, n, RenderRule::Rejected(hint));
    }
    self
  }

  /// Whether a rule (including a rejecting one) exists for the call shape.
  pub fn has_rule(&self, origin: FunctionOrigin, name: &str, argc: usize) -> bool {
    self.rules.contains_key(&FunctionKey {
      origin,
      name: name.to_string(),
      argc,
    })
  }

  /// Renders a call given its already-rendered receiver and arguments.
  pub fn render(&self, call: &FunctionCall, rendered: &[String]) -> SqlResult<String> {
    let key = FunctionKey {
      origin: call.origin,
      name: call.name.clone(),
      argc: call.args.len(),
    };
    let rule = self
      .rules
      .get(&key)
      .ok_or_else(|| SqlError::UnsupportedFunction {
        function: call.qualified_name(),
        hint: None,
      })?;

    let args = CallArgs { call, rendered };
    match rule {
      RenderRule::Rename(sql_name) => Ok(format!("{}({})", sql_name, rendered.join(", "))),
      RenderRule::Template(template) => fill_template(template, &args),
      RenderRule::Transform(f) => f(&args),
      RenderRule::Rejected(hint) => Err(SqlError::UnsupportedFunction {
        function: call.qualified_name(),
        hint: hint.map(str::to_string),
      }),
    }
  }

  /// The Flink SQL function table.
  pub fn flink() -> Self {
    let registry = Self::empty();
    let registry = register_string_functions(registry);
    let registry = register_math_functions(registry);
    let registry = register_flink_library(registry);
    let registry = register_window_markers(registry);
    register_aggregates(registry)
  }
}

fn fill_template(template: &str, args: &CallArgs<'_>) -> SqlResult<String> {
  let mut out = String::with_capacity(template.len() + 16);
  let mut chars = template.chars().peekable();
  while let Some(c) = chars.next() {
    if c != '{' {
      out.push(c);
      continue;
    }
    let mut digits = String::new();
    while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
      digits.push(*d);
      chars.next();
    }
    if digits.is_empty() || chars.next() != Some('}') {
      return Err(SqlError::unsupported(format!(
        "malformed template for `{}`",
        args.call.qualified_name()
      )));
    }
    let index: usize = digits
      .parse()
      .map_err(|_| SqlError::unsupported(format!("bad placeholder in `{}`", template)))?;
    out.push_str(args.get(index)?);
  }
  Ok(out)
}

fn string_literal(expr: Option<&Expression>) -> Option<&str> {
  match expr {
    Some(Expression::Literal(Literal::String(s))) => Some(s),
    _ => None,
  }
}

fn escape_like(pattern: &str) -> String {
  let mut escaped = String::with_capacity(pattern.len());
  for c in pattern.chars() {
    match c {
      '%' | '_' | LIKE_ESCAPE => {
        escaped.push(LIKE_ESCAPE);
        escaped.push(c);
      }
      '\'' => escaped.push_str("''"),
      _ => escaped.push(c),
    }
  }
  escaped
}

/// LIKE rendering shared by `contains`, `starts_with` and `ends_with`.
fn like(args: &CallArgs<'_>, prefix: bool, suffix: bool) -> SqlResult<String> {
  let receiver = args.get(0)?;
  let wild = |on: bool| if on { "%" } else { "" };
  match string_literal(args.raw(1)) {
    Some(pattern) => Ok(format!(
      "({} LIKE '{}{}{}' ESCAPE '{}')",
      receiver,
      wild(prefix),
      escape_like(pattern),
      wild(suffix),
      LIKE_ESCAPE
    )),
    None => {
      let mut parts = Vec::new();
      if prefix {
        parts.push("'%'");
      }
      parts.push(args.get(1)?);
      if suffix {
        parts.push("'%'");
      }
      Ok(format!("({} LIKE CONCAT({}))", receiver, parts.join(", ")))
    }
  }
}

/// SQL offsets are 1-based; string methods take 0-based offsets.
fn one_based(args: &CallArgs<'_>, index: usize) -> SqlResult<String> {
  match args.raw(index) {
    Some(Expression::Literal(Literal::Integer(n))) => n
      .checked_add(1)
      .map(|offset| offset.to_string())
      .ok_or_else(|| SqlError::unsupported(format!("string offset {} is out of range", n))),
    _ => Ok(format!("({} + 1)", args.get(index)?)),
  }
}

fn register_string_functions(r: FunctionRegistry) -> FunctionRegistry {
  use FunctionOrigin::String as S;
  r.transform(S, "contains", 1, |a| like(a, true, true))
    .transform(S, "starts_with", 1, |a| like(a, false, true))
    .transform(S, "ends_with", 1, |a| like(a, true, false))
    .transform(S, "substring", 1, |a| {
      Ok(format!("SUBSTRING({} FROM {})", a.get(0)?, one_based(a, 1)?))
    })
    .transform(S, "substring", 2, |a| {
      Ok(format!(
        "SUBSTRING({} FROM {} FOR {})",
        a.get(0)?,
        one_based(a, 1)?,
        a.get(2)?
      ))
    })
    .template(S, "replace", 2, "REPLACE({0}, {1}, {2})")
    .template(S, "trim", 0, "TRIM({0})")
    .template(S, "trim_start", 0, "TRIM(LEADING FROM {0})")
    .template(S, "trim_end", 0, "TRIM(TRAILING FROM {0})")
    .template(S, "to_upper", 0, "UPPER({0})")
    .template(S, "to_lower", 0, "LOWER({0})")
    .template(S, "index_of", 1, "(POSITION({1} IN {0}) - 1)")
    .rename(S, "concat", 2..=8, "CONCAT")
    .reject(S, "split", [1, 2], Some("use flink::split_index instead"))
}

fn register_math_functions(r: FunctionRegistry) -> FunctionRegistry {
  use FunctionOrigin::Math as M;
  r.rename(M, "round", [1, 2], "ROUND")
    .rename(M, "floor", [1], "FLOOR")
    .rename(M, "ceiling", [1], "CEIL")
    .rename(M, "abs", [1], "ABS")
    .rename(M, "pow", [2], "POWER")
    .rename(M, "sqrt", [1], "SQRT")
    .rename(M, "exp", [1], "EXP")
    .rename(M, "log10", [1], "LOG10")
    .rename(M, "sign", [1], "SIGN")
    .template(M, "log", 1, "LN({0})")
    .template(M, "log", 2, "LOG({1}, {0})")
}

const TIME_UNITS: &[&str] = &["SECOND", "MINUTE", "HOUR", "DAY", "WEEK", "MONTH", "QUARTER", "YEAR"];

/// Time unit arguments are written as string literals and emitted bare.
fn time_unit(args: &CallArgs<'_>, index: usize) -> SqlResult<&'static str> {
  let raw = string_literal(args.raw(index)).ok_or_else(|| {
    SqlError::unsupported(format!(
      "`{}` needs a literal time unit",
      args.call.qualified_name()
    ))
  })?;
  TIME_UNITS
    .iter()
    .find(|unit| unit.eq_ignore_ascii_case(raw))
    .copied()
    .ok_or_else(|| {
      SqlError::unsupported(format!(
        "`{}` does not accept time unit '{}'",
        args.call.qualified_name(),
        raw
      ))
    })
}

const OVER_HINT: Option<&str> =
  Some("OVER windows are not supported; aggregate over a window table function instead");
const JSON_HINT: Option<&str> = Some("not available in Flink SQL");

fn register_flink_library(r: FunctionRegistry) -> FunctionRegistry {
  use FunctionOrigin::Flink as F;
  r
    // json
    .rename(F, "json_value", [2], "JSON_VALUE")
    .rename(F, "json_query", [2], "JSON_QUERY")
    .rename(F, "json_exists", [2], "JSON_EXISTS")
    .rename(F, "json_string", [1], "JSON_STRING")
    .reject(F, "json_length", [1], JSON_HINT)
    .reject(F, "json_array_length", [1], JSON_HINT)
    .reject(F, "json_keys", [1], JSON_HINT)
    .reject(F, "json_table", [2], JSON_HINT)
    // strings
    .rename(F, "concat", 2..=8, "CONCAT")
    .rename(F, "concat_ws", 3..=8, "CONCAT_WS")
    .rename(F, "lpad", [3], "LPAD")
    .rename(F, "rpad", [3], "RPAD")
    .rename(F, "initcap", [1], "INITCAP")
    .rename(F, "upper", [1], "UPPER")
    .rename(F, "lower", [1], "LOWER")
    .rename(F, "char_length", [1], "CHAR_LENGTH")
    .rename(F, "regexp", [2], "REGEXP")
    .rename(F, "regexp_extract", [2, 3], "REGEXP_EXTRACT")
    .rename(F, "regexp_replace", [3], "REGEXP_REPLACE")
    .rename(F, "split_index", [3], "SPLIT_INDEX")
    .rename(F, "md5", [1], "MD5")
    .rename(F, "sha256", [1], "SHA256")
    .rename(F, "to_base64", [1], "TO_BASE64")
    .rename(F, "from_base64", [1], "FROM_BASE64")
    // dates
    .rename(F, "date_format", [2], "DATE_FORMAT")
    .rename(F, "to_timestamp", [1, 2], "TO_TIMESTAMP")
    .rename(F, "to_timestamp_ltz", [2], "TO_TIMESTAMP_LTZ")
    .rename(F, "unix_timestamp", [0, 1, 2], "UNIX_TIMESTAMP")
    .rename(F, "from_unixtime", [1, 2], "FROM_UNIXTIME")
    .template(F, "current_timestamp", 0, "CURRENT_TIMESTAMP")
    .rename(F, "now", [0], "NOW")
    .transform(F, "timestamp_diff", 3, |a| {
      Ok(format!(
        "TIMESTAMPDIFF({}, {}, {})",
        time_unit(a, 0)?,
        a.get(1)?,
        a.get(2)?
      ))
    })
    .transform(F, "timestamp_add", 3, |a| {
      Ok(format!(
        "TIMESTAMPADD({}, {}, {})",
        time_unit(a, 0)?,
        a.get(1)?,
        a.get(2)?
      ))
    })
    // arrays and maps
    .rename(F, "array_contains", [2], "ARRAY_CONTAINS")
    .rename(F, "array_join", [2, 3], "ARRAY_JOIN")
    .rename(F, "cardinality", [1], "CARDINALITY")
    .template(F, "element_at", 2, "{0}[{1}]")
    .rename(F, "map_keys", [1], "MAP_KEYS")
    .rename(F, "map_values", [1], "MAP_VALUES")
    // null handling and comparison
    .rename(F, "if_null", [2], "IFNULL")
    .rename(F, "null_if", [2], "NULLIF")
    .rename(F, "greatest", 2..=8, "GREATEST")
    .rename(F, "least", 2..=8, "LEAST")
    // OVER variants
    .reject(F, "row_number_over", [0], OVER_HINT)
    .reject(F, "rank_over", [0], OVER_HINT)
    .reject(F, "dense_rank_over", [0], OVER_HINT)
    .reject(F, "lag_over", [1, 2], OVER_HINT)
    .reject(F, "lead_over", [1, 2], OVER_HINT)
    // legacy aliases
    .reject(F, "len", [1], Some("use flink::char_length instead"))
    .reject(F, "ucase", [1], Some("use flink::upper instead"))
    .reject(F, "lcase", [1], Some("use flink::lower instead"))
    .reject(F, "substr", [2, 3], Some("use the string substring method instead"))
    .reject(F, "array_length", [1], Some("use flink::cardinality instead"))
    .reject(F, "extract_json_field", [2], Some("use flink::json_value instead"))
}

fn register_window_markers(r: FunctionRegistry) -> FunctionRegistry {
  use FunctionOrigin::Window as W;
  r.template(W, "start", 0, "window_start")
    .template(W, "end", 0, "window_end")
    .template(W, "time", 0, "window_time")
    .template(W, "proctime", 0, "PROCTIME()")
}

fn register_aggregates(r: FunctionRegistry) -> FunctionRegistry {
  use FunctionOrigin::Aggregate as A;
  const OFFSET_HINT: Option<&str> = Some("offset-ordered aggregates are not available in Flink SQL");
  r.template(A, "count", 0, "COUNT(*)")
    .rename(A, "count", [1], "COUNT")
    .template(A, "count_distinct", 1, "COUNT(DISTINCT {0})")
    .rename(A, "sum", [1], "SUM")
    .rename(A, "avg", [1], "AVG")
    .rename(A, "min", [1], "MIN")
    .rename(A, "max", [1], "MAX")
    .reject(A, "earliest_by_offset", [1], OFFSET_HINT)
    .reject(A, "latest_by_offset", [1], OFFSET_HINT)
}
