mod common;

use common::{Fault, ScriptedConnector, ScriptedSet};
use sql_dac::error::messages;
use sql_dac::prelude::*;

fn count_rows() -> Vec<ScriptedSet> {
    vec![ScriptedSet::new(&["n"], vec![vec![RowValues::Int(3)]])]
}

#[tokio::test]
async fn batch_runs_caller_logic_on_one_connection() -> Result<(), DacError> {
    let script = ScriptedConnector::new();
    script.respond(vec![], 2).respond(count_rows(), 0);
    let db = script.database();

    let (changed, total) = db
        .execute_batch(
            |conn| {
                Box::pin(async move {
                    let changed = conn
                        .execute_non_query(&SqlCommand::text("UPDATE t SET n = n + 1"))
                        .await?;
                    let total = conn
                        .execute_scalar(&SqlCommand::text("SELECT COUNT(*) FROM t"))
                        .await?;
                    Ok((changed, total))
                })
            },
            &ExecOptions::default(),
        )
        .await?;

    assert_eq!(changed, 2);
    assert_eq!(total, RowValues::Int(3));
    assert_eq!(
        script.events(),
        [
            "connect",
            "execute UPDATE t SET n = n + 1",
            "execute SELECT COUNT(*) FROM t",
            "close"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn caller_held_connection_stays_open_unless_asked() -> Result<(), DacError> {
    let script = ScriptedConnector::new();
    let db = script.database();
    let mut conn = db.open_connection().await?;

    let ran: bool = conn
        .execute_batch(
            |conn| Box::pin(async move { Ok(conn.is_open()) }),
            false,
            &ExecOptions::default(),
        )
        .await?;
    assert!(ran);
    assert!(conn.is_open());

    conn.execute_batch(
        |_conn| Box::pin(async move { Ok(()) }),
        true,
        &ExecOptions::default(),
    )
    .await?;
    assert!(!conn.is_open());
    assert_eq!(script.events(), ["connect", "close"]);
    Ok(())
}

async fn explode() -> Result<u32, DacError> {
    panic!("logic exploded")
}

#[tokio::test]
async fn panics_in_caller_logic_become_system_failures() {
    let script = ScriptedConnector::new();
    let db = script.database();

    let err = db
        .execute_batch(|_conn| Box::pin(explode()), &ExecOptions::default())
        .await
        .expect_err("panic is caught");
    assert_eq!(err.kind(), ErrorKind::System);
    assert_eq!(
        err.to_string(),
        messages::SYSTEM_EXCEPTION_ON_EXECUTE_SQL_BATCH_LEVEL
    );
    let cause = std::error::Error::source(&err).map(ToString::to_string);
    assert!(cause.is_some_and(|c| c.contains("logic exploded")));
    assert_eq!(script.events(), ["connect", "close"]);
}

#[tokio::test]
async fn suppressed_batch_failure_returns_default() -> Result<(), DacError> {
    let script = ScriptedConnector::new();
    script.fail(Fault::Execute);
    let db = script.database();

    let quiet = ExecOptions::with_policy(ExecutionPolicy::RAISE_ALL.throw_db(false));
    let value: Vec<String> = db
        .execute_batch(
            |conn| {
                Box::pin(async move {
                    conn.execute_non_query(&SqlCommand::text("DELETE FROM t")).await?;
                    Ok(vec!["unreachable".to_string()])
                })
            },
            &quiet,
        )
        .await?;
    assert!(value.is_empty());
    Ok(())
}

#[tokio::test]
async fn caller_errors_keep_their_category() {
    let script = ScriptedConnector::new();
    let db = script.database();
    let quiet_db = ExecOptions::with_policy(ExecutionPolicy::RAISE_ALL.throw_db(false));

    let err = db
        .execute_batch::<(), _>(
            |_conn| {
                Box::pin(async move {
                    Err(DacError::system(std::io::Error::other("disk on fire")))
                })
            },
            &quiet_db,
        )
        .await
        .expect_err("system errors are not covered by the db flag");
    assert!(err.is_system());
}

#[tokio::test]
async fn close_failure_replaces_success_but_not_failure() {
    let script = ScriptedConnector::new();
    script.fail(Fault::Close);
    let db = script.database();

    let err = db
        .execute_batch(
            |_conn| Box::pin(async move { Ok(5_u8) }),
            &ExecOptions::default(),
        )
        .await
        .expect_err("close fails");
    assert_eq!(err.to_string(), messages::SQL_CONNECTION_CLOSE_EXCEPTION);

    let err = db
        .execute_batch::<u8, _>(
            |_conn| Box::pin(async move { Err(DacError::generic("caller gave up")) }),
            &ExecOptions::default(),
        )
        .await
        .expect_err("primary failure wins");
    assert_eq!(err.to_string(), "caller gave up");
}

#[tokio::test]
async fn owned_data_moves_into_the_batch() -> Result<(), DacError> {
    let script = ScriptedConnector::new();
    script.respond(vec![], 1).respond(vec![], 1).respond(vec![], 1);
    let db = script.database();

    let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let inserted = db
        .execute_batch(
            move |conn| {
                Box::pin(async move {
                    let mut total = 0;
                    for name in &names {
                        let insert =
                            SqlCommand::text("INSERT INTO t(name) VALUES (@name)").param("@name", name.as_str());
                        total += conn.execute_non_query(&insert).await?;
                    }
                    Ok(total)
                })
            },
            &ExecOptions::default(),
        )
        .await?;
    assert_eq!(inserted, 3);
    Ok(())
}
