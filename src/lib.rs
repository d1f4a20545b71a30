//! # StreamWeave SQL
//!
//! Typed streaming queries compiled to Flink SQL.
//!
//! Queries are described with a fluent, strongly-typed API over row types
//! and compiled into `CREATE TABLE` and `INSERT INTO ... SELECT` statements
//! for a Flink streaming SQL engine reading from and writing to Kafka.
//!
//! ## Key Features
//!
//! - **Typed Rows**: row types and their column metadata via [`row_type!`]
//! - **Closed Expression AST**: projections and predicates are data, not callbacks
//! - **Windowing**: TUMBLE, HOP and SESSION window table functions
//! - **Fail-Fast**: unsupported constructs and illegal plans are errors, never guesses
//! - **Identifier Hygiene**: every table and column name is normalized and quoted
//!
//! ## Quick Start
//!
//! ```rust
//! use streamweave_sql::config::ConnectorOptions;
//! use streamweave_sql::row_type;
//! use streamweave_sql::sql::ast::record;
//! use streamweave_sql::sql::{FlinkDialect, Query, Row, ScalarType, SqlDialect};
//!
//! row_type! {
//!   pub struct Order {
//!     OrderId: ScalarType::BigInt,
//!     Amount: ScalarType::Int,
//!   }
//! }
//!
//! let o = Order::param("o");
//! let plan = Query::from::<Order>()
//!   .filter(o.col("Amount").ge(100))
//!   .select(record([("OrderId", o.col("OrderId")), ("Amount", o.col("Amount"))]))
//!   .plan()
//!   .with_source_topics(["orders"]);
//!
//! let sql = FlinkDialect::new(ConnectorOptions::default()).render_select(&plan)?;
//! assert_eq!(
//!   sql,
//!   "SELECT t0.`orderid` AS `orderid`, t0.`amount` AS `amount` \
//!    FROM `orders` AS t0 WHERE (t0.`amount` >= 100)"
//! );
//! # Ok::<(), streamweave_sql::error::SqlError>(())
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Kafka connector configuration.
pub mod config;
/// Compiler error taxonomy.
pub mod error;
/// Hand-off of generated statements to an execution callback.
pub mod executor;
/// Macros for declaring row types.
pub mod row_macros;
/// Query model, renderer and Flink dialect.
pub mod sql;
