mod common;

use common::{StubSource, int_rows};
use sql_guard::prelude::*;

#[tokio::test]
async fn handle_stamps_its_name() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone());
    let by_n = db.prepared("bars_by_n");
    assert_eq!(by_n.name(), "bars_by_n");

    source.push_result(int_rows(&[1]));
    let row = by_n.one(&sql!("SELECT n FROM bars WHERE n = {}", 1)).await?;
    assert!(row.is_some());
    by_n.many(&sql!("SELECT n FROM bars WHERE n = {}", 2)).await?;

    let state = source.lock();
    assert_eq!(state.executed.len(), 2);
    for executed in &state.executed {
        assert_eq!(executed.name.as_deref(), Some("bars_by_n"));
        assert_eq!(executed.text, "SELECT n FROM bars WHERE n = $1");
    }
    assert_eq!(state.executed[1].values, vec![RowValues::Int(2)]);
    Ok(())
}

#[tokio::test]
async fn handle_leaves_the_original_statement_unnamed() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    let stmt = sql!("SELECT {}::int", 1);
    db.prepared("one").query(&stmt).await?;
    assert_eq!(stmt.name(), None);
    Ok(())
}

#[tokio::test]
async fn handle_refuses_raw_and_unchecked_queries() {
    let source = StubSource::new();
    let db = Database::new(source.clone());
    let handle = db.prepared("nope");

    assert!(matches!(
        handle.query(&raw!("SELECT {}", 1)).await,
        Err(SqlGuardError::MustBuildQuery)
    ));
    assert!(matches!(handle.many("SELECT 1").await, Err(SqlGuardError::MustBuildQuery)));
    assert_eq!(source.executed_count(), 0);
}

#[tokio::test]
async fn handle_reducers_enforce_row_counts() {
    let source = StubSource::new();
    let db = Database::new(source.clone());
    let handle = db.prepared("counts");

    source.push_result(int_rows(&[1, 2]));
    assert!(matches!(
        handle.one(&sql!("SELECT n FROM bars")).await,
        Err(SqlGuardError::UnexpectedRowCount { actual: 2, .. })
    ));
    source.push_result(int_rows(&[1]));
    assert!(matches!(
        handle.none(&sql!("SELECT n FROM bars")).await,
        Err(SqlGuardError::UnexpectedRowCount { actual: 1, .. })
    ));
}

#[tokio::test]
async fn handle_works_inside_a_transaction() -> Result<(), SqlGuardError> {
    let source = StubSource::new();
    let db = Database::new(source.clone());

    db.with_transaction(|conn| {
        Box::pin(async move {
            conn.prepared("tx_update")
                .none(&sql!("UPDATE bars SET n = {}", 3))
                .await?;
            Ok::<_, SqlGuardError>(())
        })
    })
    .await?;

    let state = source.lock();
    assert_eq!(state.executed[0].name.as_deref(), Some("tx_update"));
    assert_eq!(state.executed[0].connection, 1);
    Ok(())
}
