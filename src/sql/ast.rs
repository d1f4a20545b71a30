//! # Expression AST
//!
//! Closed set of scalar expression nodes captured from the fluent query API.
//!
//! Expressions are built with combinators instead of being recovered from
//! callback bodies: a [`Param`] stands for one row parameter (one per source,
//! or the projected output row) and `param.col("Amount")` yields a column
//! reference against it.
//!
//! ```rust
//! use streamweave_sql::sql::ast::{Expression, Param};
//!
//! let o = Param::bound("o", "Order");
//! let predicate = o.col("Amount").ge(100);
//! assert_eq!(predicate.to_string(), "(o.Amount >= 100)");
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops;

use crate::sql::row::Row;

/// A named row parameter.
///
/// A parameter bound to a row type resolves to that source's positional
/// alias (`t0`, `t1`, ...) at render time. An output parameter stands for
/// the projected row and is only meaningful inside HAVING predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
  /// Parameter name as written by the caller.
  pub name: String,
  /// Row type the parameter ranges over; `None` for the output row.
  pub row: Option<String>,
}

impl Param {
  /// Creates a parameter ranging over the row type `T`.
  pub fn of<T: Row>(name: impl Into<String>) -> Self {
    Self::bound(name, T::NAME)
  }

  /// Creates a parameter ranging over the row type named `row`.
  pub fn bound(name: impl Into<String>, row: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      row: Some(row.into()),
    }
  }

  /// Creates a parameter ranging over the projected output row.
  pub fn output(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      row: None,
    }
  }

  /// Whether this parameter ranges over the projected output row.
  pub fn is_output(&self) -> bool {
    self.row.is_none()
  }

  /// Column reference `param.column`.
  pub fn col(&self, column: impl Into<String>) -> Expression {
    Expression::Column(ColumnRef {
      param: self.clone(),
      name: column.into(),
    })
  }

  /// The whole row, as returned by an identity projection `x => x`.
  pub fn row(&self) -> Expression {
    Expression::Param(self.clone())
  }
}

impl fmt::Display for Param {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

/// Scalar expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
  /// Literal value
  Literal(Literal),
  /// Column of a row parameter
  Column(ColumnRef),
  /// A row parameter itself
  Param(Param),
  /// Member access on a computed value (e.g. `name.Length`, `ts.Year`)
  Member {
    /// Expression the member is read from
    target: Box<Expression>,
    /// Member name
    member: String,
  },
  /// Unary operation
  Unary {
    /// Operator
    op: UnaryOperator,
    /// Operand
    operand: Box<Expression>,
  },
  /// Binary operation
  Binary {
    /// Left operand
    left: Box<Expression>,
    /// Operator
    op: BinaryOperator,
    /// Right operand
    right: Box<Expression>,
  },
  /// `test ? then : otherwise`
  Conditional {
    /// Condition
    test: Box<Expression>,
    /// Value when the condition holds
    then: Box<Expression>,
    /// Value otherwise
    otherwise: Box<Expression>,
  },
  /// `left ?? right`
  Coalesce {
    /// Preferred value
    left: Box<Expression>,
    /// Fallback value
    right: Box<Expression>,
  },
  /// Function or method call
  Call(FunctionCall),
  /// Record / tuple construction with named members, in declaration order
  Record(Vec<RecordMember>),
}

/// Column reference `param.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
  /// Parameter the column is read from
  pub param: Param,
  /// Column name as declared on the row type
  pub name: String,
}

/// One named member of a record construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMember {
  /// Member name; becomes the output alias
  pub name: String,
  /// Member initializer
  pub value: Expression,
}

/// Where a called function comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionOrigin {
  /// Methods on a string receiver (`contains`, `substring`, ...)
  String,
  /// Math functions (`round`, `sqrt`, ...)
  Math,
  /// Explicit Flink scalar-function library
  Flink,
  /// Window markers (`start`, `end`, `proctime`)
  Window,
  /// Aggregate markers (`count`, `sum`, ...)
  Aggregate,
}

impl fmt::Display for FunctionOrigin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      FunctionOrigin::String => "string",
      FunctionOrigin::Math => "math",
      FunctionOrigin::Flink => "flink",
      FunctionOrigin::Window => "window",
      FunctionOrigin::Aggregate => "aggregate",
    };
    write!(f, "{}", name)
  }
}

/// A captured function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
  /// Function origin
  pub origin: FunctionOrigin,
  /// Method or function name
  pub name: String,
  /// Receiver for method-style calls
  pub receiver: Option<Box<Expression>>,
  /// Explicit arguments, receiver excluded
  pub args: Vec<Expression>,
}

impl FunctionCall {
  /// `origin::name/argc`, the identity used by the function registry.
  pub fn qualified_name(&self) -> String {
    format!("{}::{}/{}", self.origin, self.name, self.args.len())
  }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
  /// Addition
  Add,
  /// Subtraction
  Subtract,
  /// Multiplication
  Multiply,
  /// Division
  Divide,
  /// Modulo
  Modulo,
  /// Equality
  Eq,
  /// Inequality
  Ne,
  /// Less than
  Lt,
  /// Less than or equal
  Le,
  /// Greater than
  Gt,
  /// Greater than or equal
  Ge,
  /// Logical AND
  And,
  /// Logical OR
  Or,
}

impl BinaryOperator {
  /// SQL spelling of the operator.
  pub fn sql(&self) -> &'static str {
    match self {
      BinaryOperator::Add => "+",
      BinaryOperator::Subtract => "-",
      BinaryOperator::Multiply => "*",
      BinaryOperator::Divide => "/",
      BinaryOperator::Modulo => "%",
      BinaryOperator::Eq => "=",
      BinaryOperator::Ne => "<>",
      BinaryOperator::Lt => "<",
      BinaryOperator::Le => "<=",
      BinaryOperator::Gt => ">",
      BinaryOperator::Ge => ">=",
      BinaryOperator::And => "AND",
      BinaryOperator::Or => "OR",
    }
  }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
  /// Logical negation
  Not,
  /// Arithmetic negation
  Negate,
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
  /// NULL literal
  Null,
  /// Boolean literal
  Boolean(bool),
  /// Integer literal
  Integer(i64),
  /// Floating point literal
  Float(f64),
  /// Exact decimal literal, kept as its textual form
  Decimal(String),
  /// String literal
  String(String),
  /// Timestamp literal (no time zone)
  Timestamp(NaiveDateTime),
}

/// Wraps any literal-convertible value as an expression.
pub fn lit(value: impl Into<Literal>) -> Expression {
  Expression::Literal(value.into())
}

/// Record construction from `(name, value)` pairs, preserving order.
pub fn record<N, I>(members: I) -> Expression
where
  N: Into<String>,
  I: IntoIterator<Item = (N, Expression)>,
{
  Expression::Record(
    members
      .into_iter()
      .map(|(name, value)| RecordMember {
        name: name.into(),
        value,
      })
      .collect(),
  )
}

/// `CASE WHEN test THEN then ELSE otherwise END`
pub fn case_when(
  test: impl Into<Expression>,
  then: impl Into<Expression>,
  otherwise: impl Into<Expression>,
) -> Expression {
  Expression::Conditional {
    test: Box::new(test.into()),
    then: Box::new(then.into()),
    otherwise: Box::new(otherwise.into()),
  }
}

macro_rules! literal_from {
  ($($ty:ty => $variant:ident($conv:expr)),* $(,)?) => {
    $(
      impl From<$ty> for Literal {
        fn from(value: $ty) -> Self {
          Literal::$variant($conv(value))
        }
      }

      impl From<$ty> for Expression {
        fn from(value: $ty) -> Self {
          Expression::Literal(Literal::from(value))
        }
      }
    )*
  };
}

literal_from! {
  bool => Boolean(|v| v),
  i32 => Integer(i64::from),
  i64 => Integer(|v| v),
  u32 => Integer(i64::from),
  f64 => Float(|v| v),
  &str => String(str::to_string),
  String => String(|v| v),
  NaiveDateTime => Timestamp(|v| v),
  DateTime<Utc> => Timestamp(|v: DateTime<Utc>| v.naive_utc()),
}

impl From<Literal> for Expression {
  fn from(value: Literal) -> Self {
    Expression::Literal(value)
  }
}

impl From<ColumnRef> for Expression {
  fn from(value: ColumnRef) -> Self {
    Expression::Column(value)
  }
}

impl From<FunctionCall> for Expression {
  fn from(value: FunctionCall) -> Self {
    Expression::Call(value)
  }
}

impl Expression {
  /// The NULL literal.
  pub fn null() -> Self {
    Expression::Literal(Literal::Null)
  }

  fn binary(self, op: BinaryOperator, right: impl Into<Expression>) -> Self {
    Expression::Binary {
      left: Box::new(self),
      op,
      right: Box::new(right.into()),
    }
  }

  /// `self = other`
  pub fn equals(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::Eq, other)
  }

  /// `self <> other`
  pub fn not_equals(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::Ne, other)
  }

  /// `self < other`
  pub fn lt(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::Lt, other)
  }

  /// `self <= other`
  pub fn le(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::Le, other)
  }

  /// `self > other`
  pub fn gt(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::Gt, other)
  }

  /// `self >= other`
  pub fn ge(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::Ge, other)
  }

  /// `self AND other`
  pub fn and(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::And, other)
  }

  /// `self OR other`
  pub fn or(self, other: impl Into<Expression>) -> Self {
    self.binary(BinaryOperator::Or, other)
  }

  /// `self ?? fallback`
  pub fn coalesce(self, fallback: impl Into<Expression>) -> Self {
    Expression::Coalesce {
      left: Box::new(self),
      right: Box::new(fallback.into()),
    }
  }

  /// Member access on a computed value.
  pub fn member(self, member: impl Into<String>) -> Self {
    Expression::Member {
      target: Box::new(self),
      member: member.into(),
    }
  }

  /// Whether the tree contains an aggregate-marker call.
  pub fn contains_aggregate(&self) -> bool {
    let mut found = false;
    self.visit(&mut |node| {
      if let Expression::Call(call) = node {
        if call.origin == FunctionOrigin::Aggregate {
          found = true;
        }
      }
    });
    found
  }

  /// Distinct parameters referenced by the tree, in first-seen order.
  pub fn params(&self) -> Vec<Param> {
    let mut params: Vec<Param> = Vec::new();
    self.visit(&mut |node| {
      let param = match node {
        Expression::Column(column) => Some(&column.param),
        Expression::Param(param) => Some(param),
        _ => None,
      };
      if let Some(param) = param {
        if !params.contains(param) {
          params.push(param.clone());
        }
      }
    });
    params
  }

  /// Pre-order walk over every node.
  pub fn visit(&self, f: &mut impl FnMut(&Expression)) {
    f(self);
    match self {
      Expression::Literal(_) | Expression::Column(_) | Expression::Param(_) => {}
      Expression::Member { target, .. } => target.visit(f),
      Expression::Unary { operand, .. } => operand.visit(f),
      Expression::Binary { left, right, .. } | Expression::Coalesce { left, right } => {
        left.visit(f);
        right.visit(f);
      }
      Expression::Conditional {
        test,
        then,
        otherwise,
      } => {
        test.visit(f);
        then.visit(f);
        otherwise.visit(f);
      }
      Expression::Call(call) => {
        if let Some(receiver) = &call.receiver {
          receiver.visit(f);
        }
        for arg in &call.args {
          arg.visit(f);
        }
      }
      Expression::Record(members) => {
        for member in members {
          member.value.visit(f);
        }
      }
    }
  }

  /// Rebuilds the tree top-down. Where `f` returns a replacement the node
  /// is swapped and its children are not visited.
  pub fn rewrite(&self, f: &impl Fn(&Expression) -> Option<Expression>) -> Expression {
    if let Some(replacement) = f(self) {
      return replacement;
    }
    let boxed = |e: &Expression| Box::new(e.rewrite(f));
    match self {
      Expression::Literal(_) | Expression::Column(_) | Expression::Param(_) => self.clone(),
      Expression::Member { target, member } => Expression::Member {
        target: boxed(target),
        member: member.clone(),
      },
      Expression::Unary { op, operand } => Expression::Unary {
        op: *op,
        operand: boxed(operand),
      },
      Expression::Binary { left, op, right } => Expression::Binary {
        left: boxed(left),
        op: *op,
        right: boxed(right),
      },
      Expression::Conditional {
        test,
        then,
        otherwise,
      } => Expression::Conditional {
        test: boxed(test),
        then: boxed(then),
        otherwise: boxed(otherwise),
      },
      Expression::Coalesce { left, right } => Expression::Coalesce {
        left: boxed(left),
        right: boxed(right),
      },
      Expression::Call(call) => Expression::Call(FunctionCall {
        origin: call.origin,
        name: call.name.clone(),
        receiver: call.receiver.as_deref().map(boxed),
        args: call.args.iter().map(|arg| arg.rewrite(f)).collect(),
      }),
      Expression::Record(members) => Expression::Record(
        members
          .iter()
          .map(|member| RecordMember {
            name: member.name.clone(),
            value: member.value.rewrite(f),
          })
          .collect(),
      ),
    }
  }
}

impl ops::Add<Expression> for Expression {
  type Output = Expression;

  fn add(self, rhs: Expression) -> Expression {
    self.binary(BinaryOperator::Add, rhs)
  }
}

impl ops::Sub<Expression> for Expression {
  type Output = Expression;

  fn sub(self, rhs: Expression) -> Expression {
    self.binary(BinaryOperator::Subtract, rhs)
  }
}

impl ops::Mul<Expression> for Expression {
  type Output = Expression;

  fn mul(self, rhs: Expression) -> Expression {
    self.binary(BinaryOperator::Multiply, rhs)
  }
}

impl ops::Div<Expression> for Expression {
  type Output = Expression;

  fn div(self, rhs: Expression) -> Expression {
    self.binary(BinaryOperator::Divide, rhs)
  }
}

impl ops::Rem<Expression> for Expression {
  type Output = Expression;

  fn rem(self, rhs: Expression) -> Expression {
    self.binary(BinaryOperator::Modulo, rhs)
  }
}

impl ops::Not for Expression {
  type Output = Expression;

  fn not(self) -> Expression {
    Expression::Unary {
      op: UnaryOperator::Not,
      operand: Box::new(self),
    }
  }
}

impl ops::Neg for Expression {
  type Output = Expression;

  fn neg(self) -> Expression {
    Expression::Unary {
      op: UnaryOperator::Negate,
      operand: Box::new(self),
    }
  }
}

impl fmt::Display for Expression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expression::Literal(lit) => write!(f, "{}", lit),
      Expression::Column(col) => write!(f, "{}", col),
      Expression::Param(param) => write!(f, "{}", param),
      Expression::Member { target, member } => write!(f, "{}.{}", target, member),
      Expression::Unary { op, operand } => match op {
        UnaryOperator::Not => write!(f, "!{}", operand),
        UnaryOperator::Negate => write!(f, "-{}", operand),
      },
      Expression::Binary { left, op, right } => write!(f, "({} {} {})", left, op.sql(), right),
      Expression::Conditional {
        test,
        then,
        otherwise,
      } => write!(f, "({} ? {} : {})", test, then, otherwise),
      Expression::Coalesce { left, right } => write!(f, "({} ?? {})", left, right),
      Expression::Call(call) => {
        if let Some(receiver) = &call.receiver {
          write!(f, "{}.", receiver)?;
        } else {
          write!(f, "{}::", call.origin)?;
        }
        let args = call
          .args
          .iter()
          .map(|a| a.to_string())
          .collect::<Vec<_>>()
          .join(", ");
        write!(f, "{}({})", call.name, args)
      }
      Expression::Record(members) => {
        let members = members
          .iter()
          .map(|m| format!("{} = {}", m.name, m.value))
          .collect::<Vec<_>>()
          .join(", ");
        write!(f, "new {{ {} }}", members)
      }
    }
  }
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Literal::Null => write!(f, "null"),
      Literal::Boolean(b) => write!(f, "{}", b),
      Literal::Integer(i) => write!(f, "{}", i),
      Literal::Float(fl) => write!(f, "{}", fl),
      Literal::Decimal(d) => write!(f, "{}m", d),
      Literal::String(s) => write!(f, "\"{}\"", s),
      Literal::Timestamp(ts) => write!(f, "{}", ts),
    }
  }
}

impl fmt::Display for ColumnRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.param, self.name)
  }
}
