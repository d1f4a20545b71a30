use std::time::Duration;
use streamweave_sql::config::ConnectorOptions;
use streamweave_sql::error::ErrorKind;
use streamweave_sql::row_type;
use streamweave_sql::sql::ast::{lit, record, Literal, Param};
use streamweave_sql::sql::dsl::{agg, window};
use streamweave_sql::sql::plan::{QueryPlanBuilder, WindowSpec, WindowTime};
use streamweave_sql::sql::{
  ColumnDefinition, DeploymentScript, EntityDefinition, EventTimeSource, FlinkDialect, OutputMode,
  Query, QueryPlan, Row, ScalarType, SqlDialect, StatementKind,
};

row_type! {
  /// Order events.
  pub struct Order {
    OrderId: ScalarType::BigInt,
    CustomerId: ScalarType::BigInt,
    Amount: ScalarType::Int,
    EventTime: ScalarType::Timestamp [event_time(EventTimeSource::Payload)],
  }
}

row_type! {
  /// Customer reference data.
  pub struct Customer {
    Id: ScalarType::BigInt,
    Name: ScalarType::String,
  }
}

row_type! {
  /// Payment events.
  pub struct Payment {
    OrderId: ScalarType::BigInt,
    Paid: ScalarType::Int,
  }
}

fn init_tracing() {
  let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn dialect() -> FlinkDialect {
  FlinkDialect::new(ConnectorOptions::new("kafka:9092").with_schema_registry("http://registry:8081"))
}

fn windows() -> Vec<WindowSpec> {
  let time = || WindowTime::Column("EventTime".to_string());
  vec![
    WindowSpec::tumble(time(), Duration::from_secs(5)),
    WindowSpec::hop(time(), Duration::from_secs(60), Duration::from_secs(10)),
    WindowSpec::session(time(), Duration::from_secs(30)),
  ]
}

// ============================================================================
// End-to-end rendering
// ============================================================================

#[test]
fn test_filter_and_projection() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .filter(o.col("Amount").ge(100))
    .select(record([("OrderId", o.col("OrderId")), ("Amount", o.col("Amount"))]))
    .plan()
    .with_source_topics(["orders"]);

  assert_eq!(
    dialect().render_select(&plan).unwrap(),
    "SELECT t0.`orderid` AS `orderid`, t0.`amount` AS `amount` FROM `orders` AS t0 WHERE (t0.`amount` >= 100)"
  );
}

#[test]
fn test_tumbling_window_grouped_by_window_start() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .tumble("EventTime", Duration::from_secs(5))
    .group_by(record([
      ("CustomerId", o.col("CustomerId")),
      ("WindowStart", window::start()),
    ]))
    .select(record([
      ("CustomerId", o.col("CustomerId")),
      ("WindowStart", window::start()),
      ("Total", agg::sum(o.col("Amount"))),
    ]))
    .plan()
    .with_source_topics(["orders"]);

  let sql = dialect().render_select(&plan).unwrap();
  assert_eq!(
    sql,
    "SELECT t0.`customerid` AS `customerid`, window_start AS `windowstart`, SUM(t0.`amount`) AS `total` \
     FROM TABLE(TUMBLE(TABLE `orders`, DESCRIPTOR(`eventtime`), INTERVAL '5' SECOND)) AS t0 \
     GROUP BY t0.`customerid`, window_start, window_end"
  );
}

#[test]
fn test_windowed_aggregate_without_keys_groups_by_window_bounds() {
  let plan = Query::from::<Order>()
    .tumble("EventTime", Duration::from_secs(5))
    .select(record([("Orders", agg::count())]))
    .plan();
  assert_eq!(
    dialect().render_select(&plan).unwrap(),
    "SELECT COUNT(*) AS `orders` \
     FROM TABLE(TUMBLE(TABLE `order`, DESCRIPTOR(`eventtime`), INTERVAL '5' SECOND)) AS t0 \
     GROUP BY window_start, window_end"
  );

  let o = Order::param("o");
  let plain = Query::from::<Order>()
    .tumble("EventTime", Duration::from_secs(5))
    .select(o.row())
    .plan();
  assert!(!dialect().render_select(&plain).unwrap().contains("GROUP BY"));
}

#[test]
fn test_hop_and_session_windows() {
  let o = Order::param("o");
  let base = || {
    Query::from::<Order>()
      .group_by(o.col("CustomerId"))
      .select(record([("Total", agg::sum(o.col("Amount")))]))
  };

  let hop = base()
    .hop("EventTime", Duration::from_secs(60), Duration::from_secs(10))
    .plan();
  assert!(dialect().render_select(&hop).unwrap().contains(
    "FROM TABLE(HOP(TABLE `order`, DESCRIPTOR(`eventtime`), INTERVAL '10' SECOND, INTERVAL '1' MINUTE)) AS t0"
  ));

  let session = base()
    .window(WindowSpec::session(WindowTime::Proctime, Duration::from_secs(30)))
    .plan();
  assert!(dialect().render_select(&session).unwrap().contains(
    "FROM TABLE(SESSION(TABLE `order`, DESCRIPTOR(`proctime`), INTERVAL '30' SECOND)) AS t0"
  ));
}

#[test]
fn test_joins_use_positional_aliases() {
  let o = Order::param("o");
  let c = Customer::param("c");
  let p = Payment::param("p");
  let plan = Query::from::<Order>()
    .join::<Customer>(o.col("CustomerId").equals(c.col("Id")))
    .join::<Payment>(p.col("OrderId").equals(o.col("OrderId")))
    .select(record([
      ("Name", c.col("Name")),
      ("Paid", p.col("Paid")),
      ("Amount", o.col("Amount")),
    ]))
    .plan()
    .with_source_topics(["orders", "customers", "payments"]);

  assert_eq!(
    dialect().render_select(&plan).unwrap(),
    "SELECT t1.`name` AS `name`, t2.`paid` AS `paid`, t0.`amount` AS `amount` \
     FROM `orders` AS t0 \
     JOIN `customers` AS t1 ON (t0.`customerid` = t1.`id`) \
     JOIN `payments` AS t2 ON (t2.`orderid` = t0.`orderid`)"
  );
}

#[test]
fn test_identity_projection_is_wildcard() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .select(o.row())
    .filter(o.col("Amount").gt(0))
    .filter(o.col("CustomerId").not_equals(Param::bound("x", "Order").col("OrderId")))
    .plan();
  assert_eq!(
    dialect().render_select(&plan).unwrap(),
    "SELECT t0.* FROM `order` AS t0 WHERE (t0.`amount` > 0) AND (t0.`customerid` <> t0.`orderid`)"
  );
}

#[test]
fn test_rendering_is_idempotent() {
  let o = Order::param("o");
  let query = Query::from::<Order>()
    .filter(o.col("Amount").ge(100))
    .select(record([("OrderId", o.col("OrderId"))]));
  let first = query.plan();
  let second = query.plan();
  assert_eq!(first, second);

  let d = dialect();
  let ddl = |plan: &QueryPlan| {
    d.generate_ddl(plan, StatementKind::Stream, OutputMode::Changes, "big_orders", "big-orders")
  };
  assert_eq!(ddl(&first).unwrap(), ddl(&second).unwrap());
  assert_eq!(d.render_select(&first).unwrap(), d.render_select(&first).unwrap());
}

// ============================================================================
// HAVING
// ============================================================================

#[test]
fn test_having_inlines_projected_aggregates() {
  let o = Order::param("o");
  let x = Param::output("x");
  let plan = Query::from::<Order>()
    .group_by(o.col("CustomerId"))
    .select(record([
      ("CustomerId", o.col("CustomerId")),
      ("Total", agg::sum(o.col("Amount"))),
    ]))
    .having(x.col("Total").gt(10))
    .plan();

  let sql = dialect().render_select(&plan).unwrap();
  let having = sql.split(" HAVING ").nth(1).unwrap();
  assert_eq!(having, "(SUM(t0.`amount`) > 10)");
  assert!(having.contains("SUM("));
  assert!(!sql.contains("t0.`total`"));
}

#[test]
fn test_having_on_scalar_projection_inlines_the_value() {
  let o = Order::param("o");
  let x = Param::output("x");
  let plan = Query::from::<Order>()
    .group_by(o.col("CustomerId"))
    .select(agg::count())
    .having(x.row().ge(lit(3)))
    .plan();
  assert!(dialect().render_select(&plan).unwrap().ends_with("HAVING (COUNT(*) >= 3)"));
}

#[test]
fn test_having_against_wildcard_projection_falls_back_to_output_row() {
  init_tracing();
  let o = Order::param("o");
  let x = Param::output("x");
  let plan = Query::from::<Order>()
    .group_by(o.col("CustomerId"))
    .having(x.col("CustomerId").gt(0))
    .plan();
  assert!(dialect().render_select(&plan).unwrap().ends_with("HAVING (t0.`customerid` > 0)"));
}

#[test]
fn test_having_unknown_output_column_is_unsupported() {
  let o = Order::param("o");
  let x = Param::output("x");
  let plan = Query::from::<Order>()
    .group_by(o.col("CustomerId"))
    .select(record([("Total", agg::sum(o.col("Amount")))]))
    .having(x.col("Missing").gt(0))
    .plan();
  let err = dialect().render_select(&plan).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unsupported);
  assert!(err.to_string().contains("x.Missing"));
}

#[test]
fn test_having_without_grouping_or_aggregate_is_rejected() {
  let o = Order::param("o");
  let x = Param::output("x");
  let plan = Query::from::<Order>()
    .select(record([("Amount", o.col("Amount"))]))
    .having(x.col("Amount").gt(0))
    .plan();
  let err = dialect().render_select(&plan).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::DialectConstraint);
}

// ============================================================================
// Legality checks
// ============================================================================

#[test]
fn test_window_and_join_are_exclusive_for_every_kind() {
  let o = Order::param("o");
  let c = Customer::param("c");
  for spec in windows() {
    let plan = Query::from::<Order>()
      .join::<Customer>(o.col("CustomerId").equals(c.col("Id")))
      .window(spec.clone())
      .plan();
    let err = dialect().render_select(&plan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DialectConstraint, "{:?}", spec.kind);
  }
}

#[test]
fn test_misaligned_topics_are_rejected() {
  let o = Order::param("o");
  let c = Customer::param("c");
  let plan = Query::from::<Order>()
    .join::<Customer>(o.col("CustomerId").equals(c.col("Id")))
    .plan()
    .with_source_topics(["orders"]);
  let err = dialect().render_select(&plan).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::DialectConstraint);
  assert!(err.to_string().contains("1 source topics given for 2 sources"));
}

#[test]
fn test_plan_without_source_is_rejected() {
  let plan = QueryPlanBuilder::new().build();
  assert_eq!(
    dialect().render_select(&plan).unwrap_err().kind(),
    ErrorKind::DialectConstraint
  );
}

#[test]
fn test_hop_without_slide_is_rejected() {
  let mut spec = WindowSpec::hop(
    WindowTime::Column("EventTime".into()),
    Duration::from_secs(60),
    Duration::from_secs(10),
  );
  spec.slide = None;
  let plan = Query::from::<Order>().window(spec).plan();
  let err = dialect().render_select(&plan).unwrap_err();
  assert!(err.to_string().contains("HOP window requires a slide"));
}

#[test]
fn test_malformed_window_size_is_rejected() {
  let plan = Query::from::<Order>()
    .tumble("EventTime", Duration::from_millis(1500))
    .plan();
  assert_eq!(
    dialect().render_select(&plan).unwrap_err().kind(),
    ErrorKind::MalformedInterval
  );
}

#[test]
fn test_grouping_by_whole_row_is_unsupported() {
  let o = Order::param("o");
  let plan = Query::from::<Order>().group_by(o.row()).plan();
  assert_eq!(
    dialect().render_select(&plan).unwrap_err().kind(),
    ErrorKind::Unsupported
  );
}

#[test]
fn test_rejected_aggregate_surfaces_from_render() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .group_by(o.col("CustomerId"))
    .select(record([("Last", agg::latest_by_offset(o.col("Amount")))]))
    .plan();
  let err = dialect().render_select(&plan).unwrap_err();
  assert!(err.to_string().contains("aggregate::latest_by_offset/1"));
}

#[test]
fn test_colliding_projection_aliases_are_rejected() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .group_by(o.col("CustomerId"))
    .select(record([
      ("Total", agg::sum(o.col("Amount"))),
      ("total", agg::count()),
    ]))
    .plan();
  let err = dialect().render_select(&plan).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::DialectConstraint);
  assert!(err.to_string().contains("`total`"));
}

// ============================================================================
// Caller input never escapes into the statement
// ============================================================================

#[test]
fn test_decimal_literal_text_is_validated() {
  let o = Order::param("o");
  let injected = Query::from::<Order>()
    .filter(o.col("Amount").gt(lit(Literal::Decimal("0) OR (1=1".to_string()))))
    .plan();
  assert_eq!(
    dialect().render_select(&injected).unwrap_err().kind(),
    ErrorKind::Unsupported
  );

  let valid = Query::from::<Order>()
    .filter(o.col("Amount").gt(lit(Literal::Decimal("10.50".to_string()))))
    .plan();
  assert!(dialect().render_select(&valid).unwrap().ends_with("WHERE (t0.`amount` > 10.50)"));
}

#[test]
fn test_substring_offset_overflow_is_an_error() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .select(o.col("OrderId").substring(lit(i64::MAX), None))
    .plan();
  assert_eq!(
    dialect().render_select(&plan).unwrap_err().kind(),
    ErrorKind::Unsupported
  );
}

// ============================================================================
// INSERT statements and deployment scripts
// ============================================================================

#[test]
fn test_generate_ddl_wraps_select_in_insert() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .select(record([("OrderId", o.col("OrderId"))]))
    .plan()
    .with_source_topics(["orders"]);
  let ddl = dialect()
    .generate_ddl(&plan, StatementKind::Table, OutputMode::Changes, "Order-Ids", "order-ids")
    .unwrap();
  assert_eq!(
    ddl,
    "INSERT INTO `order_ids` SELECT t0.`orderid` AS `orderid` FROM `orders` AS t0;"
  );
}

#[test]
fn test_final_output_requires_window() {
  let plan = Query::from::<Order>().plan();
  let err = dialect()
    .generate_ddl(&plan, StatementKind::Stream, OutputMode::Final, "out", "out")
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::DialectConstraint);

  let o = Order::param("o");
  let windowed = Query::from::<Order>()
    .tumble("EventTime", Duration::from_secs(60))
    .group_by(o.col("CustomerId"))
    .select(record([("Orders", agg::count())]))
    .plan();
  assert!(
    dialect()
      .generate_ddl(&windowed, StatementKind::Stream, OutputMode::Final, "out", "out")
      .is_ok()
  );
}

#[test]
fn test_upsert_sink_gets_comment_line() {
  let plan = Query::from::<Order>().upsert().plan();
  let ddl = dialect()
    .generate_ddl(&plan, StatementKind::Table, OutputMode::Changes, "latest", "latest-orders")
    .unwrap();
  let mut lines = ddl.lines();
  assert!(lines.next().unwrap().starts_with("-- upsert sink: topic 'latest-orders'"));
  assert_eq!(lines.next().unwrap(), "INSERT INTO `latest` SELECT * FROM `order` AS t0;");
}

#[test]
fn test_deployment_script_orders_statements() {
  let o = Order::param("o");
  let plan = Query::from::<Order>()
    .filter(o.col("Amount").ge(100))
    .select(record([("OrderId", o.col("OrderId")), ("Amount", o.col("Amount"))]))
    .plan();
  let source = EntityDefinition::for_row::<Order>("orders");
  let sink = EntityDefinition::new(
    "big_orders",
    "big-orders",
    vec![
      ColumnDefinition::new("OrderId", ScalarType::BigInt),
      ColumnDefinition::new("Amount", ScalarType::Int),
    ],
  );

  let script = DeploymentScript::build(
    &dialect(),
    &plan,
    &[source],
    &sink,
    StatementKind::Stream,
    OutputMode::Changes,
  )
  .unwrap();
  let statements = script.statements();
  assert_eq!(statements.len(), 3);
  assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS `orders`"));
  assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS `big_orders`"));
  assert!(statements[2].starts_with("INSERT INTO `big_orders` SELECT"));
  assert!(statements[2].contains("FROM `orders` AS t0"));

  let missing = DeploymentScript::build(
    &dialect(),
    &plan,
    &[],
    &sink,
    StatementKind::Stream,
    OutputMode::Changes,
  );
  assert!(missing.is_err());
  assert_eq!(Order::NAME, "Order");
}
