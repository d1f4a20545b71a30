//! # Scalar Expression Renderer
//!
//! Recursively renders expression nodes to Flink SQL text. Column references
//! resolve through [`ParamAliases`] to positional table aliases; calls are
//! delegated to the [`FunctionRegistry`].

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{SqlError, SqlResult};
use crate::sql::ast::{BinaryOperator, Expression, Literal, Param, UnaryOperator};
use crate::sql::functions::FunctionRegistry;
use crate::sql::identifier::quoted_identifier;

/// Format of timestamp literals; no time zone suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static DECIMAL_TEXT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static pattern"));

/// Maps row parameters to table aliases.
///
/// Source parameters resolve by the row type they range over, so every
/// parameter over the same source shares its alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamAliases {
  by_row: HashMap<String, String>,
  output: Option<String>,
}

impl ParamAliases {
  /// Positional aliases `t0, t1, ...` for `sources`, in order.
  pub fn positional<S: AsRef<str>>(sources: &[S]) -> Self {
    let by_row = sources
      .iter()
      .enumerate()
      .map(|(i, row)| (row.as_ref().to_string(), table_alias(i)))
      .collect();
    Self {
      by_row,
      output: None,
    }
  }

  /// Also resolves output-row parameters, to `alias`.
  pub fn with_output(mut self, alias: impl Into<String>) -> Self {
    self.output = Some(alias.into());
    self
  }

  /// Alias of `param`.
  pub fn resolve(&self, param: &Param) -> SqlResult<&str> {
    let alias = match &param.row {
      Some(row) => self.by_row.get(row),
      None => self.output.as_ref(),
    };
    alias.map(String::as_str).ok_or_else(|| match &param.row {
      Some(row) => SqlError::unsupported(format!(
        "parameter `{}` ranges over `{}`, which is not a source of this query",
        param.name, row
      )),
      None => SqlError::unsupported(format!(
        "output row `{}` can only be referenced from HAVING",
        param.name
      )),
    })
  }
}

/// Positional alias of the `index`-th source.
pub fn table_alias(index: usize) -> String {
  format!("t{}", index)
}

/// Renders expressions against one alias map.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionRenderer<'a> {
  functions: &'a FunctionRegistry,
  aliases: &'a ParamAliases,
}

impl<'a> ExpressionRenderer<'a> {
  /// Creates a renderer.
  pub fn new(functions: &'a FunctionRegistry, aliases: &'a ParamAliases) -> Self {
    Self { functions, aliases }
  }

  /// Renders `expr` as a scalar SQL expression.
  pub fn render(&self, expr: &Expression) -> SqlResult<String> {
    match expr {
      Expression::Literal(literal) => render_literal(literal),
      Expression::Column(column) => Ok(format!(
        "{}.{}",
        self.aliases.resolve(&column.param)?,
        quoted_identifier(&column.name)
      )),
      Expression::Param(param) => Err(SqlError::unsupported(format!(
        "the whole row `{}` cannot be used as a scalar value",
        param.name
      ))),
      Expression::Member { target, member } => self.render_member(target, member),
      Expression::Unary { op, operand } => {
        let operand = self.render(operand)?;
        Ok(match op {
          UnaryOperator::Not => format!("(NOT {})", operand),
          UnaryOperator::Negate => format!("(-{})", operand),
        })
      }
      Expression::Binary { left, op, right } => self.render_binary(left, *op, right),
      Expression::Conditional {
        test,
        then,
        otherwise,
      } => Ok(format!(
        "CASE WHEN {} THEN {} ELSE {} END",
        self.render(test)?,
        self.render(then)?,
        self.render(otherwise)?
      )),
      Expression::Coalesce { left, right } => Ok(format!(
        "COALESCE({}, {})",
        self.render(left)?,
        self.render(right)?
      )),
      Expression::Call(call) => {
        let rendered = call
          .receiver
          .iter()
          .map(|receiver| receiver.as_ref())
          .chain(call.args.iter())
          .map(|arg| self.render(arg))
          .collect::<SqlResult<Vec<_>>>()?;
        self.functions.render(call, &rendered)
      }
      Expression::Record(_) => Err(SqlError::unsupported(
        "record construction is only allowed as a projection or grouping",
      )),
    }
  }

  fn render_binary(
    &self,
    left: &Expression,
    op: BinaryOperator,
    right: &Expression,
  ) -> SqlResult<String> {
    let null_test = match op {
      BinaryOperator::Eq => Some("IS NULL"),
      BinaryOperator::Ne => Some("IS NOT NULL"),
      _ => None,
    };
    if let Some(test) = null_test {
      match (is_null(left), is_null(right)) {
        (false, true) => return Ok(format!("({} {})", self.render(left)?, test)),
        (true, false) => return Ok(format!("({} {})", self.render(right)?, test)),
        _ => {}
      }
    }
    Ok(format!(
      "({} {} {})",
      self.render(left)?,
      op.sql(),
      self.render(right)?
    ))
  }

  fn render_member(&self, target: &Expression, member: &str) -> SqlResult<String> {
    let part = match member {
      "Length" => return Ok(format!("CHAR_LENGTH({})", self.render(target)?)),
      "Year" => "YEAR",
      "Month" => "MONTH",
      "Day" => "DAY",
      "Hour" => "HOUR",
      "Minute" => "MINUTE",
      "Second" => "SECOND",
      _ => {
        return Err(SqlError::unsupported(format!(
          "member access `{}.{}`",
          target, member
        )));
      }
    };
    Ok(format!("EXTRACT({} FROM {})", part, self.render(target)?))
  }
}

fn is_null(expr: &Expression) -> bool {
  matches!(expr, Expression::Literal(Literal::Null))
}

/// Renders a literal value.
pub fn render_literal(literal: &Literal) -> SqlResult<String> {
  match literal {
    Literal::Null => Ok("NULL".to_string()),
    Literal::Boolean(true) => Ok("TRUE".to_string()),
    Literal::Boolean(false) => Ok("FALSE".to_string()),
    Literal::Integer(i) => Ok(i.to_string()),
    Literal::Float(f) if f.is_finite() => Ok(f.to_string()),
    Literal::Float(f) => Err(SqlError::unsupported(format!(
      "non-finite numeric literal {}",
      f
    ))),
    Literal::Decimal(d) if DECIMAL_TEXT.is_match(d) => Ok(d.clone()),
    Literal::Decimal(d) => Err(SqlError::unsupported(format!(
      "malformed decimal literal {}",
      quote_string(d)
    ))),
    Literal::String(s) => Ok(quote_string(s)),
    Literal::Timestamp(ts) => Ok(format!("TIMESTAMP '{}'", ts.format(TIMESTAMP_FORMAT))),
  }
}

/// Single-quotes `text`, doubling embedded quotes.
pub fn quote_string(text: &str) -> String {
  format!("'{}'", text.replace('\'', "''"))
}
