#![cfg(feature = "sqlite")]

mod common;

use common::{TempSqlite, ints, setup};
use sql_dac::error::messages;
use sql_dac::prelude::*;

async fn jobs() -> (TempSqlite, Database) {
    let tmp = TempSqlite::new();
    let db = tmp.database().await;
    setup(
        &db,
        "CREATE TABLE jobs (id INTEGER PRIMARY KEY, state TEXT NOT NULL);
         INSERT INTO jobs (state) VALUES ('new'), ('new'), ('done');",
    )
    .await;
    (tmp, db)
}

/// Claims every new job, then reports `code` in the trailing status row.
fn claim(code: &str) -> SqlCommand {
    let mut params = SqlParameters::new();
    params.add_status("@ReturnCode").add_output("@message");
    SqlCommand::text(format!(
        "UPDATE jobs SET state = 'claimed' WHERE state = 'new';
         SELECT {code} AS returncode, 'claimed jobs' AS Message;"
    ))
    .params(params)
}

#[tokio::test]
async fn return_value_one_raises_with_the_literal_code() {
    let (_tmp, db) = jobs().await;
    let err = db
        .execute_non_query(&claim("1"), &ExecOptions::default())
        .await
        .expect_err("non-zero status");

    assert_eq!(err.kind(), ErrorKind::NonZeroReturnCode);
    assert!(err.is_db());
    assert_eq!(err.return_code(), Some(1));
    assert_eq!(
        err.to_string(),
        format!("{}1", messages::SQL_EXECUTION_RETURNED_NON_ZERO_CODE)
    );
    let returned = err.returned().expect("output parameters");
    assert_eq!(returned.len(), 2);
    assert_eq!(returned.get("ReturnCode"), Some(&RowValues::Int(1)));
    assert_eq!(
        returned.get("@message"),
        Some(&RowValues::Text("claimed jobs".into()))
    );
}

#[tokio::test]
async fn return_value_one_with_db_flag_off_returns_the_payload() -> Result<(), DacError> {
    let (_tmp, db) = jobs().await;
    let quiet = ExecOptions::with_policy(ExecutionPolicy::RAISE_ALL.throw_db(false));
    let claimed = db.execute_non_query(&claim("1"), &quiet).await?;
    assert_eq!(claimed, 2);
    Ok(())
}

#[tokio::test]
async fn zero_and_null_status_succeed() -> Result<(), DacError> {
    let (_tmp, db) = jobs().await;
    let options = ExecOptions::default();
    assert_eq!(db.execute_non_query(&claim("0"), &options).await?, 2);
    assert_eq!(db.execute_non_query(&claim("NULL"), &options).await?, 0);
    Ok(())
}

#[tokio::test]
async fn negative_codes_are_reported_verbatim() {
    let (_tmp, db) = jobs().await;
    let err = db
        .execute_non_query(&claim("-7"), &ExecOptions::default())
        .await
        .expect_err("non-zero status");
    assert_eq!(err.return_code(), Some(-7));
}

#[tokio::test]
async fn status_row_is_not_part_of_the_data() -> Result<(), DacError> {
    let (_tmp, db) = jobs().await;
    let mut params = SqlParameters::new();
    params.add_status("@status");
    let query = SqlCommand::text(
        "SELECT id FROM jobs ORDER BY id;
         SELECT COUNT(*) AS done FROM jobs WHERE state = 'done';
         SELECT 0 AS status;",
    )
    .params(params);

    let set = db.get_data_set(&query, &ExecOptions::default()).await?;
    assert_eq!(set.len(), 2);
    assert_eq!(ints(&set.tables()[0], "id"), [1, 2, 3]);

    let table = db.get_data_table(&query, &ExecOptions::default()).await?;
    assert_eq!(table.column_names(), ["id"]);
    Ok(())
}

#[tokio::test]
async fn suppressed_status_keeps_the_table_payload() -> Result<(), DacError> {
    let (_tmp, db) = jobs().await;
    let mut params = SqlParameters::new();
    params.add_status("@status");
    let query = SqlCommand::text("SELECT id FROM jobs ORDER BY id; SELECT 3 AS status;")
        .params(params)
        .window(1, 1);

    let err = db
        .get_data_table(&query, &ExecOptions::default())
        .await
        .expect_err("status 3");
    assert_eq!(err.return_code(), Some(3));

    let quiet = ExecOptions::with_policy(ExecutionPolicy::RAISE_ALL.throw_db(false));
    let table = db.get_data_table(&query, &quiet).await?;
    assert_eq!(ints(&table, "id"), [2]);
    Ok(())
}

#[tokio::test]
async fn non_integer_status_is_a_generic_failure() {
    let (_tmp, db) = jobs().await;
    let err = db
        .execute_non_query(&claim("'oops'"), &ExecOptions::default())
        .await
        .expect_err("status is text");
    assert_eq!(err.kind(), ErrorKind::Generic);
}

#[tokio::test]
async fn return_code_inside_a_batch_follows_the_batch_policy() -> Result<(), DacError> {
    let (_tmp, db) = jobs().await;

    let err = db
        .execute_batch(
            |conn| Box::pin(async move { conn.execute_non_query(&claim("1")).await }),
            &ExecOptions::default(),
        )
        .await
        .expect_err("raised through the batch");
    assert_eq!(err.return_code(), Some(1));

    let quiet = ExecOptions::with_policy(ExecutionPolicy::RAISE_ALL.throw_db(false));
    let value = db
        .execute_batch(
            |conn| Box::pin(async move { conn.execute_non_query(&claim("1")).await }),
            &quiet,
        )
        .await?;
    assert_eq!(value, 0);
    Ok(())
}
