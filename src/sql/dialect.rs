//! # Flink SQL Dialect
//!
//! Entry point of the compiler. A [`SqlDialect`] turns a frozen
//! [`QueryPlan`] into `INSERT INTO ... SELECT ...` text and entity
//! definitions into `CREATE TABLE` statements, checking every structural
//! rule of the target engine on the way.
//!
//! ## Example
//!
//! ```rust
//! use streamweave_sql::config::ConnectorOptions;
//! use streamweave_sql::row_type;
//! use streamweave_sql::sql::ast::record;
//! use streamweave_sql::sql::dialect::{FlinkDialect, SqlDialect};
//! use streamweave_sql::sql::query::Query;
//! use streamweave_sql::sql::{Row, ScalarType};
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
//!   .select(record([("OrderId", o.col("OrderId"))]))
//!   .plan()
//!   .with_source_topics(["orders"]);
//!
//! let dialect = FlinkDialect::new(ConnectorOptions::default());
//! let sql = dialect.render_select(&plan)?;
//! assert!(sql.starts_with("SELECT t0.`orderid` AS `orderid` FROM `orders` AS t0"));
//! # Ok::<(), streamweave_sql::error::SqlError>(())
//! ```

use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use crate::config::ConnectorOptions;
use crate::error::{SqlError, SqlResult};
use crate::sql::ast::{Expression, Param};
use crate::sql::clause::{Clause, SCALAR_ALIAS};
use crate::sql::ddl::{EntityDefinition, TableRole};
use crate::sql::functions::FunctionRegistry;
use crate::sql::identifier::{normalize_identifier, quoted_identifier, quoted_object_name};
use crate::sql::interval::SqlInterval;
use crate::sql::plan::{QueryPlan, SinkMode, WindowKind, WindowSpec, WindowTime, PROCTIME_COLUMN};
use crate::sql::properties::{PropertyLayer, WithClause};
use crate::sql::render::{table_alias, ExpressionRenderer, ParamAliases};

/// Identifiers window table functions add to every row.
const WINDOW_KEYS: [&str; 2] = ["window_start", "window_end"];

/// Kind of object the INSERT statement feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
  /// Continuous stream of results
  Stream,
  /// Continuously maintained derived table
  Table,
}

/// Which results the query emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
  /// Every intermediate change
  Changes,
  /// Only final results; requires a window
  Final,
}

/// A target SQL dialect.
pub trait SqlDialect: Send + Sync {
  /// Dialect name used in diagnostics.
  fn name(&self) -> &'static str;

  /// Renders the SELECT statement of `plan`, without a trailing semicolon.
  fn render_select(&self, plan: &QueryPlan) -> SqlResult<String>;

  /// Renders `INSERT INTO <object> <select>;`.
  fn generate_ddl(
    &self,
    plan: &QueryPlan,
    kind: StatementKind,
    mode: OutputMode,
    object_name: &str,
    output_topic: &str,
  ) -> SqlResult<String>;

  /// Renders `CREATE TABLE` for a source table.
  fn create_source_table(
    &self,
    entity: &EntityDefinition,
    additional: Option<&PropertyLayer>,
  ) -> SqlResult<String>;

  /// Renders `CREATE TABLE` for a sink table.
  fn create_sink_table(
    &self,
    entity: &EntityDefinition,
    additional: Option<&PropertyLayer>,
  ) -> SqlResult<String>;
}

/// Flink streaming SQL over Kafka topics.
#[derive(Debug, Clone, Default)]
pub struct FlinkDialect {
  options: ConnectorOptions,
  functions: FunctionRegistry,
}

impl FlinkDialect {
  /// Dialect with the standard Flink function registry.
  pub fn new(options: ConnectorOptions) -> Self {
    Self::with_functions(options, FunctionRegistry::flink())
  }

  /// Dialect with a custom function registry.
  pub fn with_functions(options: ConnectorOptions, functions: FunctionRegistry) -> Self {
    Self { options, functions }
  }

  /// Connector options.
  pub fn options(&self) -> &ConnectorOptions {
    &self.options
  }

  fn validate(&self, plan: &QueryPlan) -> SqlResult<()> {
    let sources = plan.source_types().len();
    if sources == 0 {
      return Err(SqlError::constraint("query has no source"));
    }
    let topics = plan.source_topics().len();
    if topics != 0 && topics != sources {
      return Err(SqlError::constraint(format!(
        "{} source topics given for {} sources",
        topics, sources
      )));
    }
    let joins = plan.join_predicates().len();
    if plan.window().is_some() && joins > 0 {
      return Err(SqlError::constraint(
        "a window cannot be combined with a join; materialize the windowed result first, then join it",
      ));
    }
    if (sources > 1 || joins > 0) && joins != sources - 1 {
      return Err(SqlError::constraint(format!(
        "{} join predicates given for {} sources",
        joins, sources
      )));
    }
    if let Some(window) = plan.window() {
      if window.kind == WindowKind::Hop && window.slide.is_none() {
        return Err(SqlError::constraint("HOP window requires a slide"));
      }
    }
    if plan.having().is_some() && !plan.has_group_by() && !plan.has_aggregate() {
      return Err(SqlError::constraint(
        "HAVING requires GROUP BY or an aggregate projection",
      ));
    }
    if let Some(Clause::Wildcard(_)) = plan.group_by_clause() {
      return Err(SqlError::unsupported("grouping by a whole row"));
    }
    let mut aliases = HashSet::new();
    for item in plan.select_clause().items() {
      let alias = normalize_identifier(&item.alias);
      if !aliases.insert(alias.clone()) {
        return Err(SqlError::constraint(format!(
          "projection column `{}` collides with another column named `{}`",
          item.alias, alias
        )));
      }
    }
    Ok(())
  }

  fn table_names(plan: &QueryPlan) -> Vec<String> {
    let names = if plan.source_topics().is_empty() {
      plan.source_types()
    } else {
      plan.source_topics()
    };
    names.iter().map(|n| quoted_object_name(n)).collect()
  }

  fn render_items(&self, plan: &QueryPlan, renderer: &ExpressionRenderer<'_>) -> SqlResult<String> {
    match plan.select_clause() {
      Clause::Wildcard(None) => Ok("*".to_string()),
      Clause::Wildcard(Some(param)) => Ok(format!("{}.*", renderer_alias(plan, param)?)),
      Clause::Items(items) => items
        .iter()
        .map(|item| {
          Ok(format!(
            "{} AS {}",
            renderer.render(&item.expr)?,
            quoted_identifier(&item.alias)
          ))
        })
        .collect::<SqlResult<Vec<_>>>()
        .map(|items| items.join(", ")),
    }
  }

  fn render_from(table: &str, window: Option<&WindowSpec>) -> SqlResult<String> {
    let Some(window) = window else {
      return Ok(table.to_string());
    };
    let descriptor = match &window.time {
      WindowTime::Column(column) => quoted_identifier(column),
      WindowTime::Proctime => quoted_identifier(PROCTIME_COLUMN),
    };
    let size = SqlInterval::from_duration(window.size)?;
    let function = match (window.kind, window.slide) {
      (WindowKind::Tumble, _) => format!(
        "TUMBLE(TABLE {}, DESCRIPTOR({}), {})",
        table, descriptor, size
      ),
      (WindowKind::Hop, Some(slide)) => format!(
        "HOP(TABLE {}, DESCRIPTOR({}), {}, {})",
        table,
        descriptor,
        SqlInterval::from_duration(slide)?,
        size
      ),
      (WindowKind::Hop, None) => return Err(SqlError::constraint("HOP window requires a slide")),
      (WindowKind::Session, _) => format!(
        "SESSION(TABLE {}, DESCRIPTOR({}), {})",
        table, descriptor, size
      ),
    };
    Ok(format!("TABLE({})", function))
  }

  /// Windowed aggregations always group by the window bounds, even when the
  /// caller gave no grouping keys.
  fn render_group_by(
    &self,
    plan: &QueryPlan,
    renderer: &ExpressionRenderer<'_>,
  ) -> SqlResult<Option<String>> {
    let mut keys = match plan.group_by_clause() {
      Some(clause) => clause
        .items()
        .iter()
        .map(|item| renderer.render(&item.expr))
        .collect::<SqlResult<Vec<_>>>()?,
      None if plan.window().is_some() && plan.has_aggregate() => Vec::new(),
      None => return Ok(None),
    };
    if plan.window().is_some() {
      for key in WINDOW_KEYS {
        if !keys.iter().any(|k| k == key) {
          keys.push(key.to_string());
        }
      }
    }
    Ok(Some(keys.join(", ")))
  }

  /// Inlines output-row references in `having` with the projected
  /// expressions they name.
  ///
  /// A scalar projection (single `value` item) inlines the whole output row
  /// to that expression instead of taking the output-row fallback. Only a
  /// wildcard projection, which has no named items, falls back to rendering
  /// against the output row.
  fn render_having(
    &self,
    plan: &QueryPlan,
    having: &Expression,
    aliases: &ParamAliases,
  ) -> SqlResult<String> {
    let items = plan.select_clause().items();
    if items.is_empty() {
      warn!(
        "projection has no named items; rendering HAVING against the output row, which strict dialects may reject"
      );
      let aliases = aliases.clone().with_output(table_alias(0));
      return ExpressionRenderer::new(&self.functions, &aliases).render(having);
    }

    let scalar = match items {
      [item] if item.alias == SCALAR_ALIAS => Some(&item.expr),
      _ => None,
    };
    let inlined = having.rewrite(&|node| match node {
      Expression::Column(column) if column.param.is_output() => {
        let alias = normalize_identifier(&column.name);
        items
          .iter()
          .find(|item| normalize_identifier(&item.alias) == alias)
          .map(|item| item.expr.clone())
      }
      Expression::Param(param) if param.is_output() => scalar.cloned(),
      _ => None,
    });

    if let Some(unresolved) = inlined.params().iter().find(|p| p.is_output()) {
      return Err(SqlError::unsupported(format!(
        "HAVING references `{}` which is not a projected column",
        unresolved_reference(&inlined, unresolved)
      )));
    }
    ExpressionRenderer::new(&self.functions, aliases).render(&inlined)
  }

  fn create_table(
    &self,
    entity: &EntityDefinition,
    role: TableRole,
    additional: Option<&PropertyLayer>,
  ) -> SqlResult<String> {
    self.options.validate_format()?;

    let mut fixed = vec![
      ("connector", "kafka".to_string()),
      ("topic", entity.topic_name.clone()),
      ("format", self.options.format.clone()),
      ("properties.bootstrap.servers", self.options.bootstrap_servers.clone()),
    ];
    if let Some(url) = &self.options.schema_registry_url {
      fixed.push(("avro-confluent.url", url.clone()));
    }
    let mut with = WithClause::fixed(fixed);

    with.apply(&PropertyLayer::from_map(
      "global",
      self.options.properties.clone(),
      false,
    ))?;
    if let Some(topic) = self.options.topic(&entity.topic_name) {
      let (side, properties) = match role {
        TableRole::Source => ("source", &topic.source),
        TableRole::Sink => ("sink", &topic.sink),
      };
      with.apply(&PropertyLayer::from_map(
        format!("topic '{}' {}", entity.topic_name, side),
        properties.clone(),
        topic.allow_override,
      ))?;
    }
    if let Some(additional) = additional {
      with.apply(additional)?;
    }
    if role == TableRole::Source {
      with.validate_startup_mode()?;
    }

    let body = entity.render_body(role)?;
    let statement = format!(
      "CREATE TABLE IF NOT EXISTS {} ({}) {};",
      quoted_object_name(&entity.object_name),
      body,
      with.render()
    );
    debug!(
      object = %entity.object_name,
      topic = %entity.topic_name,
      role = ?role,
      "generated CREATE TABLE statement"
    );
    Ok(statement)
  }
}

fn renderer_alias(plan: &QueryPlan, param: &Param) -> SqlResult<String> {
  ParamAliases::positional(plan.source_types())
    .resolve(param)
    .map(str::to_string)
}

fn unresolved_reference(expr: &Expression, param: &Param) -> String {
  let mut name = param.name.clone();
  expr.visit(&mut |node| {
    if let Expression::Column(column) = node {
      if &column.param == param {
        name = format!("{}.{}", param.name, column.name);
      }
    }
  });
  name
}

impl SqlDialect for FlinkDialect {
  fn name(&self) -> &'static str {
    "flink"
  }

  fn render_select(&self, plan: &QueryPlan) -> SqlResult<String> {
    self.validate(plan)?;

    let aliases = ParamAliases::positional(plan.source_types());
    let renderer = ExpressionRenderer::new(&self.functions, &aliases);
    let tables = Self::table_names(plan);

    let mut sql = format!(
      "SELECT {} FROM {} AS {}",
      self.render_items(plan, &renderer)?,
      Self::render_from(&tables[0], plan.window())?,
      table_alias(0)
    );

    for (i, predicate) in plan.join_predicates().iter().enumerate() {
      let index = i + 1;
      sql.push_str(&format!(
        " JOIN {} AS {} ON {}",
        tables[index],
        table_alias(index),
        renderer.render(&predicate.body)?
      ));
    }

    if !plan.where_predicates().is_empty() {
      let predicates = plan
        .where_predicates()
        .iter()
        .map(|p| renderer.render(&p.body))
        .collect::<SqlResult<Vec<_>>>()?;
      sql.push_str(" WHERE ");
      sql.push_str(&predicates.join(" AND "));
    }

    if let Some(keys) = self.render_group_by(plan, &renderer)? {
      sql.push_str(" GROUP BY ");
      sql.push_str(&keys);
    }

    if let Some(having) = plan.having() {
      sql.push_str(" HAVING ");
      sql.push_str(&self.render_having(plan, having, &aliases)?);
    }

    debug!(
      sources = plan.source_types().len(),
      windowed = plan.window().is_some(),
      "rendered SELECT statement"
    );
    Ok(sql)
  }

  fn generate_ddl(
    &self,
    plan: &QueryPlan,
    kind: StatementKind,
    mode: OutputMode,
    object_name: &str,
    output_topic: &str,
  ) -> SqlResult<String> {
    if mode == OutputMode::Final && plan.window().is_none() {
      return Err(SqlError::constraint(
        "final output mode requires a window",
      ));
    }
    let select = self.render_select(plan)?;
    let insert = format!("INSERT INTO {} {};", quoted_object_name(object_name), select);
    let statement = match plan.sink_mode() {
      SinkMode::AppendOnly => insert,
      SinkMode::Upsert => format!(
        "-- upsert sink: topic '{}' is keyed by the sink table's primary key\n{}",
        output_topic, insert
      ),
    };
    debug!(
      object = object_name,
      topic = output_topic,
      kind = ?kind,
      mode = ?mode,
      "generated INSERT statement"
    );
    Ok(statement)
  }

  fn create_source_table(
    &self,
    entity: &EntityDefinition,
    additional: Option<&PropertyLayer>,
  ) -> SqlResult<String> {
    self.create_table(entity, TableRole::Source, additional)
  }

  fn create_sink_table(
    &self,
    entity: &EntityDefinition,
    additional: Option<&PropertyLayer>,
  ) -> SqlResult<String> {
    self.create_table(entity, TableRole::Sink, additional)
  }
}

/// Ordered statements deploying one query: source tables, the sink table,
/// then the INSERT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentScript {
  statements: Vec<String>,
}

impl DeploymentScript {
  /// Generates every statement for `plan` reading from `sources` (in plan
  /// source order) and writing to `sink`.
  ///
  /// A plan without source topics reads from the source tables by name.
  pub fn build<D: SqlDialect + ?Sized>(
    dialect: &D,
    plan: &QueryPlan,
    sources: &[EntityDefinition],
    sink: &EntityDefinition,
    kind: StatementKind,
    mode: OutputMode,
  ) -> SqlResult<Self> {
    if sources.len() != plan.source_types().len() {
      return Err(SqlError::constraint(format!(
        "{} source tables given for {} sources",
        sources.len(),
        plan.source_types().len()
      )));
    }
    let plan = if plan.source_topics().is_empty() {
      plan
        .clone()
        .with_source_topics(sources.iter().map(|s| s.object_name.clone()))
    } else {
      plan.clone()
    };

    let mut statements = sources
      .iter()
      .map(|source| dialect.create_source_table(source, None))
      .collect::<SqlResult<Vec<_>>>()?;
    statements.push(dialect.create_sink_table(sink, None)?);
    statements.push(dialect.generate_ddl(&plan, kind, mode, &sink.object_name, &sink.topic_name)?);
    Ok(Self { statements })
  }

  /// Statements in execution order.
  pub fn statements(&self) -> &[String] {
    &self.statements
  }

  /// Consumes the script.
  pub fn into_statements(self) -> Vec<String> {
    self.statements
  }
}

impl fmt::Display for DeploymentScript {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.statements.join("\n\n"))
  }
}
