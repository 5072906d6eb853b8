mod common;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{StubSource, db_error, int_rows};
use sql_guard::error::{DEADLOCK_DETECTED, SERIALIZATION_FAILURE};
use sql_guard::prelude::*;

#[tokio::test]
async fn commit_path_returns_the_unit_of_work_value() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    source.push_result(int_rows(&[42]));
    let n = db
        .with_transaction(|conn| {
            Box::pin(async move {
                let row = conn.one(&sql!("SELECT {}::int AS n", 42)).await?;
                Ok::<_, SqlGuardError>(row.and_then(|r| r.get("n").and_then(RowValues::as_int).copied()))
            })
        })
        .await?;

    assert_eq!(n, Some(42));
    assert_eq!(source.commands(), vec!["BEGIN", "COMMIT"]);
    let state = source.lock();
    assert_eq!((state.acquired, state.released, state.released_damaged), (1, 1, 0));
    Ok(())
}

#[tokio::test]
async fn every_statement_runs_on_the_transaction_connection() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    db.with_transaction(|conn| {
        Box::pin(async move {
            conn.none(&sql!("UPDATE bars SET n = {}", 1)).await?;
            conn.none(&sql!("UPDATE bars SET n = {}", 2)).await?;
            Ok::<_, SqlGuardError>(())
        })
    })
    .await?;

    let state = source.lock();
    assert!(state.executed.iter().all(|e| e.connection == 1));
    assert!(state.batches.iter().all(|(c, _)| *c == 1));
    Ok(())
}

#[tokio::test]
async fn failures_roll_back_and_are_flagged() {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    let err = db
        .with_transaction(|conn| {
            Box::pin(async move {
                conn.execute(&sql!("INSERT INTO bars VALUES ({})", 1)).await?;
                Err::<(), _>(db_error("23505"))
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.rolledback(), Some(true));
    assert_eq!(err.code(), None);
    let SqlGuardError::TransactionFailed { source: original } = &err else {
        panic!("expected TransactionFailed, got {err:?}");
    };
    assert_eq!(original.code(), Some("23505"));
    assert_eq!(source.commands(), vec!["BEGIN", "ROLLBACK"]);
    let state = source.lock();
    assert_eq!((state.acquired, state.released, state.released_damaged), (1, 1, 0));
}

#[tokio::test]
async fn guard_rejection_inside_a_transaction_rolls_back() {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    let err = db
        .with_transaction(|conn| {
            Box::pin(async move {
                conn.execute("DELETE FROM bars").await?;
                Ok::<_, SqlGuardError>(())
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.rolledback(), Some(true));
    assert!(matches!(
        err,
        SqlGuardError::TransactionFailed { ref source } if matches!(**source, SqlGuardError::MustBuildQuery)
    ));
    assert_eq!(source.executed_count(), 0);
}

#[tokio::test]
async fn failed_rollback_discards_the_connection() {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    source.fail_batch("ROLLBACK", "08006");
    let err = db
        .with_transaction(|_conn| Box::pin(async move { Err::<(), _>(db_error(DEADLOCK_DETECTED)) }))
        .await
        .unwrap_err();

    assert_eq!(err.rolledback(), Some(false));
    assert!(matches!(err, SqlGuardError::RollbackFailed { .. }));
    let state = source.lock();
    // no retry even though the original error was a deadlock
    assert_eq!(state.acquired, 1);
    assert_eq!((state.released, state.released_damaged), (1, 1));
}

#[tokio::test]
async fn conflicts_retry_on_fresh_connections() -> Result<(), SqlGuardError> {
    const CONFLICTS: usize = 3;
    let source = StubSource::new();
    let db = Database::new(source.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let value = db
        .with_transaction(move |_conn| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                if call < CONFLICTS {
                    let code = if call % 2 == 0 { DEADLOCK_DETECTED } else { SERIALIZATION_FAILURE };
                    return Err(db_error(code));
                }
                Ok::<_, SqlGuardError>("done")
            })
        })
        .await?;

    assert_eq!(value, "done");
    assert_eq!(calls.load(Ordering::SeqCst), CONFLICTS + 1);

    let state = source.lock();
    assert_eq!(state.acquired, CONFLICTS + 1);
    assert_eq!(state.released, CONFLICTS + 1);
    assert_eq!(state.released_damaged, 0);
    let begins: Vec<usize> = state
        .batches
        .iter()
        .filter(|(_, cmd)| cmd == "BEGIN")
        .map(|(c, _)| *c)
        .collect();
    assert_eq!(begins, vec![1, 2, 3, 4]);
    let rollbacks = state.batches.iter().filter(|(_, cmd)| cmd == "ROLLBACK").count();
    assert_eq!(rollbacks, CONFLICTS);
    Ok(())
}

#[tokio::test]
async fn conflicts_raised_by_the_database_are_retried() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    source.fail_execute(SERIALIZATION_FAILURE);
    db.with_transaction(|conn| {
        Box::pin(async move {
            conn.none(&sql!("UPDATE bars SET n = n + {}", 1)).await?;
            Ok::<_, SqlGuardError>(())
        })
    })
    .await?;

    assert_eq!(
        source.commands(),
        vec!["BEGIN", "ROLLBACK", "BEGIN", "COMMIT"]
    );
    assert_eq!(source.executed_count(), 2);
    Ok(())
}

#[tokio::test]
async fn commit_conflicts_are_retried() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    source.fail_batch("COMMIT", SERIALIZATION_FAILURE);
    db.with_transaction(|_conn| Box::pin(async move { Ok::<_, SqlGuardError>(()) }))
        .await?;

    assert_eq!(
        source.commands(),
        vec!["BEGIN", "COMMIT", "ROLLBACK", "BEGIN", "COMMIT"]
    );
    Ok(())
}

#[tokio::test]
async fn begin_failure_rolls_back_without_running_the_unit_of_work() {
    let source = StubSource::new();
    let db = Database::new(source.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    source.fail_batch("BEGIN", "57P01");
    let counter = Arc::clone(&calls);
    let err = db
        .with_transaction(move |_conn| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok::<_, SqlGuardError>(()) })
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(err.rolledback(), Some(true));
    assert_eq!(source.commands(), vec!["BEGIN", "ROLLBACK"]);
}

#[tokio::test]
async fn acquire_failures_are_not_retried() {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    source.fail_acquire("too many clients");
    let err = db
        .with_transaction(|_conn| Box::pin(async move { Ok::<_, SqlGuardError>(()) }))
        .await
        .unwrap_err();

    assert!(matches!(err, SqlGuardError::ConnectionError(_)));
    assert_eq!(err.rolledback(), None);
    assert!(source.commands().is_empty());
}

#[tokio::test]
async fn bounded_policy_gives_up() {
    let source = StubSource::new();
    let db = Database::new(source.clone())
        .with_retry_policy(RetryPolicy::bounded(NonZeroU32::new(3).unwrap()));

    let err = db
        .with_transaction(|_conn| Box::pin(async move { Err::<(), _>(db_error(DEADLOCK_DETECTED)) }))
        .await
        .unwrap_err();

    assert!(matches!(err, SqlGuardError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.rolledback(), Some(true));
    let state = source.lock();
    assert_eq!((state.acquired, state.released), (3, 3));
}

#[tokio::test(start_paused = true)]
async fn backoff_pauses_between_attempts() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone()).with_retry_policy(
        RetryPolicy::unbounded().with_backoff(Backoff::Fixed(Duration::from_secs(5))),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    let started = tokio::time::Instant::now();
    let counter = Arc::clone(&calls);
    db.with_transaction(move |_conn| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(db_error(DEADLOCK_DETECTED));
            }
            Ok::<_, SqlGuardError>(())
        })
    })
    .await?;

    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}
