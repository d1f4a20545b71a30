//! # Streaming SQL Compiler
//!
//! Compiles typed, fluent query descriptions into Flink streaming SQL.
//!
//! ## Overview
//!
//! A query is built with [`Query`] over row types declared with
//! [`row_type!`](crate::row_type). Projections, predicates and grouping keys
//! are [`Expression`] trees built from combinators. The frozen
//! [`QueryPlan`] is handed to a [`SqlDialect`], which validates it and
//! renders `INSERT INTO ... SELECT ...` text; entity definitions become
//! `CREATE TABLE` statements with a layered WITH clause.
//!
//! ## Pipeline
//!
//! 1. **ast / dsl**: expression nodes and the combinators that build them
//! 2. **plan / query**: plan data model, builder and fluent API
//! 3. **clause**: projection and grouping analysis
//! 4. **functions / render**: function registry and scalar renderer
//! 5. **dialect**: SELECT/INSERT assembly, DDL and legality checks
//!
//! ## Streaming Semantics
//!
//! - Window table functions cannot be combined with joins in one statement
//! - `Final` output requires a window
//! - Windowed aggregations always group by `window_start` and `window_end`

pub mod ast;
pub mod clause;
pub mod ddl;
pub mod dialect;
pub mod dsl;
pub mod functions;
pub mod identifier;
pub mod interval;
pub mod plan;
pub mod properties;
pub mod query;
pub mod render;
pub mod row;


pub use ast::{Expression, Param};
pub use clause::{Clause, ClauseItem};
pub use ddl::{ColumnDefinition, EntityDefinition, EventTimeSource, ScalarType};
pub use dialect::{DeploymentScript, FlinkDialect, OutputMode, SqlDialect, StatementKind};
pub use functions::FunctionRegistry;
pub use plan::{QueryPlan, QueryPlanBuilder, SinkMode, WindowKind, WindowSpec, WindowTime};
pub use properties::PropertyLayer;
pub use query::Query;
pub use row::Row;
