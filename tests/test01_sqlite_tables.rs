#![cfg(feature = "sqlite")]

mod common;

use common::{TempSqlite, ints, setup};
use sql_dac::error::messages;
use sql_dac::prelude::*;

const SEED: &str = "
    CREATE TABLE nums (n INTEGER NOT NULL, label TEXT);
    WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 20)
    INSERT INTO nums (n, label) SELECT x, CASE WHEN x % 5 = 0 THEN NULL ELSE 'n' || x END FROM seq;
";

async fn seeded() -> (TempSqlite, Database) {
    let tmp = TempSqlite::new();
    let db = tmp.database().await;
    setup(&db, SEED).await;
    (tmp, db)
}

#[tokio::test]
async fn window_zero_zero_returns_every_row() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let query = SqlCommand::text("SELECT n, label FROM nums ORDER BY n");
    let table = db.get_data_table(&query, &ExecOptions::default()).await?;

    assert_eq!(table.name(), "Table");
    assert_eq!(table.column_names(), ["n", "label"]);
    assert_eq!(table.row_count(), 20);
    assert_eq!(table.value(4, "label"), Some(&RowValues::Null));
    assert_eq!(
        table.value(0, "label").and_then(RowValues::as_text),
        Some("n1")
    );
    Ok(())
}

#[tokio::test]
async fn window_skips_start_rows_and_caps_at_max() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let query = SqlCommand::text("SELECT n FROM nums ORDER BY n").window(5, 3);
    let table = db.get_data_table(&query, &ExecOptions::default()).await?;
    assert_eq!(ints(&table, "n"), [6, 7, 8]);

    let tail = SqlCommand::text("SELECT n FROM nums ORDER BY n").window(18, 0);
    let table = db.get_data_table(&tail, &ExecOptions::default()).await?;
    assert_eq!(ints(&table, "n"), [19, 20]);
    Ok(())
}

#[tokio::test]
async fn start_past_the_end_keeps_columns_without_rows() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let query = SqlCommand::text("SELECT n, label FROM nums").window(100, 10);
    let table = db.get_data_table(&query, &ExecOptions::default()).await?;
    assert!(table.is_empty());
    assert_eq!(table.column_names(), ["n", "label"]);
    Ok(())
}

#[tokio::test]
async fn declared_types_are_reported() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let table = db
        .get_data_table(
            &SqlCommand::text("SELECT n, label FROM nums LIMIT 1"),
            &ExecOptions::default(),
        )
        .await?;
    let declared: Vec<Option<&str>> = table
        .columns()
        .iter()
        .map(|c| c.declared_type.as_deref())
        .collect();
    assert_eq!(declared, [Some("INTEGER"), Some("TEXT")]);
    Ok(())
}

#[tokio::test]
async fn data_set_keeps_every_result_set_in_order() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let query = SqlCommand::text(
        "SELECT n FROM nums WHERE n <= 2 ORDER BY n;
         SELECT 'only' AS word;
         SELECT n FROM nums WHERE n > 18 ORDER BY n;",
    );
    let set = db.get_data_set(&query, &ExecOptions::default()).await?;

    let names: Vec<&str> = set.iter().map(DataTable::name).collect();
    assert_eq!(names, ["Table", "Table1", "Table2"]);
    assert_eq!(ints(&set.tables()[0], "n"), [1, 2]);
    assert_eq!(
        set.tables()[1].value(0, "word").and_then(RowValues::as_text),
        Some("only")
    );
    assert_eq!(ints(&set.tables()[2], "n"), [19, 20]);
    Ok(())
}

#[tokio::test]
async fn window_applies_to_every_table_of_a_set() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let query = SqlCommand::text(
        "SELECT n FROM nums ORDER BY n; SELECT n FROM nums ORDER BY n DESC;",
    )
    .window(1, 2);
    let set = db.get_data_set(&query, &ExecOptions::default()).await?;
    assert_eq!(ints(&set.tables()[0], "n"), [2, 3]);
    assert_eq!(ints(&set.tables()[1], "n"), [19, 18]);
    Ok(())
}

#[tokio::test]
async fn table_target_still_runs_later_statements() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let query = SqlCommand::text(
        "SELECT n FROM nums ORDER BY n LIMIT 2;
         SELECT label FROM nums;
         INSERT INTO nums (n, label) VALUES (100, 'late');",
    );
    let table = db.get_data_table(&query, &ExecOptions::default()).await?;
    assert_eq!(ints(&table, "n"), [1, 2]);

    let count = db
        .execute_scalar(
            &SqlCommand::text("SELECT COUNT(*) FROM nums"),
            &ExecOptions::default(),
        )
        .await?;
    assert_eq!(count, RowValues::Int(21));
    Ok(())
}

#[tokio::test]
async fn table_from_a_command_without_result_sets_is_generic() {
    let (_tmp, db) = seeded().await;
    let err = db
        .get_data_table(
            &SqlCommand::text("UPDATE nums SET label = 'x' WHERE n = 1"),
            &ExecOptions::default(),
        )
        .await
        .expect_err("no result set");
    assert_eq!(err.kind(), ErrorKind::Generic);
}

#[tokio::test]
async fn fill_data_table_appends_matching_rows() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let options = ExecOptions::default();
    let mut target = DataTable::default();

    let first = SqlCommand::text("SELECT n, label FROM nums WHERE n <= 2 ORDER BY n");
    db.fill_data_table(&mut target, &first, &options).await?;
    let second = SqlCommand::text("SELECT n, label FROM nums WHERE n >= 19 ORDER BY n");
    db.fill_data_table(&mut target, &second, &options).await?;

    assert_eq!(target.name(), "Table");
    assert_eq!(ints(&target, "n"), [1, 2, 19, 20]);

    let other_shape = SqlCommand::text("SELECT label FROM nums");
    let err = db
        .fill_data_table(&mut target, &other_shape, &options)
        .await
        .expect_err("column mismatch");
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert_eq!(target.row_count(), 4);
    Ok(())
}

#[tokio::test]
async fn fill_data_set_continues_table_numbering() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let options = ExecOptions::default();
    let mut set = db
        .get_data_set(
            &SqlCommand::text("SELECT 1 AS a; SELECT 2 AS b;"),
            &options,
        )
        .await?;
    db.fill_data_set(&mut set, &SqlCommand::text("SELECT 3 AS c"), &options)
        .await?;

    let names: Vec<&str> = set.iter().map(DataTable::name).collect();
    assert_eq!(names, ["Table", "Table1", "Table2"]);
    assert_eq!(
        set.table_by_name("Table2").and_then(|t| t.value(0, "c")),
        Some(&RowValues::Int(3))
    );
    Ok(())
}

#[tokio::test]
async fn fill_data_resolves_the_target_at_runtime() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let options = ExecOptions::default();
    let query = SqlCommand::text("SELECT n FROM nums WHERE n <= 3 ORDER BY n");

    let mut table = DataTable::default();
    db.fill_data(&mut table, &query, &options).await?;
    assert_eq!(ints(&table, "n"), [1, 2, 3]);

    let mut set = DataSet::default();
    db.fill_data(&mut set, &query, &options).await?;
    assert_eq!(set.len(), 1);

    let mut wrong: Vec<i64> = Vec::new();
    let err = db
        .fill_data(&mut wrong, &query, &options)
        .await
        .expect_err("unsupported target");
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert!(
        err.to_string()
            .starts_with(messages::FILL_DATA_INVALID_TYPE_PASSED)
    );
    assert!(err.to_string().contains("Vec<i64>"));
    Ok(())
}

#[tokio::test]
async fn table_direct_reads_the_whole_table() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let table = db
        .get_data_table(
            &SqlCommand::table_direct("nums").window(0, 4),
            &ExecOptions::default(),
        )
        .await?;
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.column_names(), ["n", "label"]);
    Ok(())
}

#[tokio::test]
async fn stored_procedures_are_not_available_on_sqlite() {
    let (_tmp, db) = seeded().await;
    let err = db
        .execute_non_query(
            &SqlCommand::stored_procedure("do_things"),
            &ExecOptions::default(),
        )
        .await
        .expect_err("sqlite has no procedures");
    assert_eq!(err.kind(), ErrorKind::Generic);
}

#[tokio::test]
async fn results_serialize_as_plain_json() -> Result<(), DacError> {
    let (_tmp, db) = seeded().await;
    let table = db
        .get_data_table(
            &SqlCommand::text("SELECT n, label FROM nums WHERE n IN (1, 5) ORDER BY n"),
            &ExecOptions::default(),
        )
        .await?;
    let json = serde_json::to_value(&table).map_err(|e| DacError::generic_with("json", e))?;
    assert_eq!(json["rows"], serde_json::json!([[1, "n1"], [5, null]]));
    assert_eq!(json["columns"][1]["name"], "label");
    Ok(())
}
