//! # Error Handling
//!
//! Errors raised while compiling a query plan into Flink SQL.
//!
//! Every error is a compile-time error: it surfaces from the call that
//! detects it (`render_select`, `generate_ddl`, table DDL generation) and is
//! never retried. Builder calls that only accumulate state never fail.
//!
//! ## Categories
//!
//! - **Unsupported**: an expression shape, function call or member access
//!   the renderer does not recognize
//! - **DialectConstraint**: a structurally illegal plan (window combined
//!   with a join, `Final` output without a window, misaligned topics, ...)
//! - **Configuration**: connector/WITH-property problems
//! - **MalformedInterval**: a duration that cannot be written as a single
//!   whole-unit SQL interval

use thiserror::Error;

/// Result alias used throughout the compiler.
pub type SqlResult<T> = Result<T, SqlError>;

/// Coarse category of a [`SqlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// Unsupported expression, member access or function call.
  Unsupported,
  /// Structurally illegal plan for the target dialect.
  DialectConstraint,
  /// Connector configuration or WITH-property conflict.
  Configuration,
  /// Interval not reducible to a whole number of one unit.
  MalformedInterval,
}

/// Error raised while rendering a plan or generating DDL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
  /// An expression node or member access the renderer cannot translate.
  #[error("unsupported expression: {0}")]
  UnsupportedExpression(String),

  /// A function call with no registered rendering rule, or one that is
  /// declared but rejected by this dialect.
  #[error("unsupported function call `{function}`{}", hint_suffix(.hint))]
  UnsupportedFunction {
    /// Fully-qualified call, e.g. `string::split/1`.
    function: String,
    /// Optional suggestion shown to the user.
    hint: Option<String>,
  },

  /// The plan violates a structural rule of the dialect.
  #[error("dialect constraint violated: {0}")]
  DialectConstraint(String),

  /// Connector configuration or WITH-clause conflict.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// Interval that is non-positive or spans more than one unit.
  #[error("malformed interval: {0}")]
  MalformedInterval(String),
}

fn hint_suffix(hint: &Option<String>) -> String {
  match hint {
    Some(hint) => format!(" ({})", hint),
    None => String::new(),
  }
}

impl SqlError {
  /// Returns the category of this error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      SqlError::UnsupportedExpression(_) | SqlError::UnsupportedFunction { .. } => {
        ErrorKind::Unsupported
      }
      SqlError::DialectConstraint(_) => ErrorKind::DialectConstraint,
      SqlError::Configuration(_) => ErrorKind::Configuration,
      SqlError::MalformedInterval(_) => ErrorKind::MalformedInterval,
    }
  }

  pub(crate) fn unsupported(construct: impl Into<String>) -> Self {
    SqlError::UnsupportedExpression(construct.into())
  }

  pub(crate) fn constraint(message: impl Into<String>) -> Self {
    SqlError::DialectConstraint(message.into())
  }

  pub(crate) fn config(message: impl Into<String>) -> Self {
    SqlError::Configuration(message.into())
  }

  pub(crate) fn interval(message: impl Into<String>) -> Self {
    SqlError::MalformedInterval(message.into())
  }
}
