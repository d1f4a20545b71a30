//! # DDL Execution Hand-off
//!
//! The compiler only produces text. Statements are executed by a caller
//! supplied [`DdlExecutor`]; [`deploy`] runs a script through one in order
//! and stops as soon as a statement fails or the token is cancelled.
//!
//! ```rust,no_run
//! use futures::FutureExt;
//! use streamweave_sql::executor::{deploy, BoxError};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(statements: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
//! let executor = |ddl: String, _token: CancellationToken| {
//!   async move {
//!     println!("{}", ddl);
//!     Ok::<(), BoxError>(())
//!   }
//!   .boxed()
//! };
//! deploy(&statements, &executor, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::future::{self, BoxFuture, Either};
use std::pin::pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Error type returned by executors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Executes one DDL/DML statement.
#[async_trait]
pub trait DdlExecutor: Send + Sync {
  /// Executes `ddl`; implementations should stop early once `token` is
  /// cancelled.
  async fn execute(&self, ddl: &str, token: CancellationToken) -> Result<(), BoxError>;
}

#[async_trait]
impl<F> DdlExecutor for F
where
  F: Fn(String, CancellationToken) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync,
{
  async fn execute(&self, ddl: &str, token: CancellationToken) -> Result<(), BoxError> {
    (self)(ddl.to_string(), token).await
  }
}

/// Error raised while deploying a script.
#[derive(Debug, Error)]
pub enum DeployError {
  /// The token was cancelled before every statement ran.
  #[error("deployment cancelled after {executed} statement(s)")]
  Cancelled {
    /// Statements that completed
    executed: usize,
  },
  /// A statement failed.
  #[error("statement {index} failed: {source}")]
  Execution {
    /// Position of the statement in the script
    index: usize,
    /// Statement text
    statement: String,
    /// Executor error
    source: BoxError,
  },
}

/// Runs `statements` in order, returning how many were executed.
pub async fn deploy<E>(
  statements: &[String],
  executor: &E,
  token: &CancellationToken,
) -> Result<usize, DeployError>
where
  E: DdlExecutor + ?Sized,
{
  info!(statements = statements.len(), "deploying statements");
  for (index, statement) in statements.iter().enumerate() {
    if token.is_cancelled() {
      return Err(DeployError::Cancelled { executed: index });
    }
    debug!(index, "executing statement");
    let cancelled = pin!(token.cancelled());
    match future::select(cancelled, executor.execute(statement, token.clone())).await {
      Either::Left(_) => return Err(DeployError::Cancelled { executed: index }),
      Either::Right((result, _)) => result.map_err(|source| DeployError::Execution {
        index,
        statement: statement.clone(),
        source,
      })?,
    }
  }
  info!(statements = statements.len(), "deployment finished");
  Ok(statements.len())
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::FutureExt;
  use std::sync::{Arc, Mutex};

  fn recorder(
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Option<&'static str>,
  ) -> impl Fn(String, CancellationToken) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync
  {
    move |ddl, _token| {
      let log = log.clone();
      async move {
        if fail_on.is_some_and(|marker| ddl.contains(marker)) {
          return Err::<(), BoxError>("engine rejected statement".into());
        }
        log.lock().unwrap().push(ddl);
        Ok(())
      }
      .boxed()
    }
  }

  fn script() -> Vec<String> {
    vec![
      "CREATE TABLE a".to_string(),
      "CREATE TABLE b".to_string(),
      "INSERT INTO b SELECT * FROM a".to_string(),
    ]
  }

  #[tokio::test]
  async fn test_runs_statements_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = recorder(log.clone(), None);
    let executed = deploy(&script(), &executor, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(executed, 3);
    assert_eq!(*log.lock().unwrap(), script());
  }

  #[tokio::test]
  async fn test_failure_stops_and_reports_statement() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = recorder(log.clone(), Some("TABLE b"));
    let err = deploy(&script(), &executor, &CancellationToken::new())
      .await
      .unwrap_err();
    match err {
      DeployError::Execution {
        index, statement, ..
      } => {
        assert_eq!(index, 1);
        assert_eq!(statement, "CREATE TABLE b");
      }
      other => panic!("unexpected error: {other}"),
    }
    assert_eq!(log.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_cancelled_token_stops_before_first_statement() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = recorder(log.clone(), None);
    let token = CancellationToken::new();
    token.cancel();
    let err = deploy(&script(), &executor, &token).await.unwrap_err();
    assert!(matches!(err, DeployError::Cancelled { executed: 0 }));
    assert!(log.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_cancellation_interrupts_a_running_statement() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let executor = move |_ddl: String, token: CancellationToken| {
      let trigger = trigger.clone();
      async move {
        trigger.cancel();
        token.cancelled().await;
        futures::future::pending::<Result<(), BoxError>>().await
      }
      .boxed()
    };
    let err = deploy(&script(), &executor, &token).await.unwrap_err();
    assert!(matches!(err, DeployError::Cancelled { executed: 0 }));
  }
}
