#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sql_guard::prelude::*;
use sql_guard::{PoolState, RawQuery};

/// One statement as the stub saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub connection: usize,
    pub text: String,
    pub values: Vec<RowValues>,
    pub name: Option<String>,
}

/// Counters and scripted failures shared by a [`StubSource`] and its connections.
#[derive(Debug, Default)]
pub struct StubState {
    pub acquired: usize,
    pub released: usize,
    pub released_damaged: usize,
    pub executed: Vec<Executed>,
    /// `(connection, command)` for every BEGIN / COMMIT / ROLLBACK
    pub batches: Vec<(usize, String)>,
    /// Results handed out in order; an empty result once exhausted
    pub results: VecDeque<QueryResult>,
    /// SQLSTATEs raised by `raw_execute`, in order, before any result is handed out
    pub execute_failures: VecDeque<String>,
    /// `(command, SQLSTATE)` pairs; the first matching entry fails that command once
    pub batch_failures: Vec<(String, String)>,
    pub acquire_failure: Option<String>,
}

#[derive(Clone, Default)]
pub struct StubSource {
    state: Arc<Mutex<StubState>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }

    pub fn push_result(&self, result: QueryResult) {
        self.lock().results.push_back(result);
    }

    pub fn fail_execute(&self, code: &str) {
        self.lock().execute_failures.push_back(code.to_string());
    }

    pub fn fail_batch(&self, command: &str, code: &str) {
        self.lock()
            .batch_failures
            .push((command.to_string(), code.to_string()));
    }

    pub fn fail_acquire(&self, message: &str) {
        self.lock().acquire_failure = Some(message.to_string());
    }

    pub fn executed_count(&self) -> usize {
        self.lock().executed.len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().batches.iter().map(|(_, c)| c.clone()).collect()
    }
}

pub fn db_error(code: &str) -> SqlGuardError {
    SqlGuardError::Database {
        code: code.to_string(),
        message: format!("stub failure {code}"),
    }
}

/// A result with a single `n` column holding `values`.
pub fn int_rows(values: &[i64]) -> QueryResult {
    let mut result = QueryResult::with_columns(vec!["n".to_string()], values.len());
    for v in values {
        result.add_row_values(vec![RowValues::Int(*v)]);
    }
    result
}

#[async_trait]
impl ConnectionSource for StubSource {
    type Connection = StubConnection;

    async fn acquire(&self) -> Result<StubConnection, SqlGuardError> {
        let mut state = self.lock();
        if let Some(message) = &state.acquire_failure {
            return Err(SqlGuardError::ConnectionError(message.clone()));
        }
        state.acquired += 1;
        Ok(StubConnection {
            id: state.acquired,
            state: Arc::clone(&self.state),
        })
    }

    fn state(&self) -> PoolState {
        let state = self.state.lock().unwrap();
        PoolState {
            connections: u32::try_from(state.acquired - state.released_damaged).unwrap(),
            idle_connections: u32::try_from(state.released - state.released_damaged).unwrap(),
        }
    }
}

pub struct StubConnection {
    pub id: usize,
    state: Arc<Mutex<StubState>>,
}

#[async_trait]
impl Executor for StubConnection {
    async fn raw_execute(&self, query: RawQuery<'_>) -> Result<QueryResult, SqlGuardError> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(Executed {
            connection: self.id,
            text: query.text.to_string(),
            values: query.values.to_vec(),
            name: query.name.map(str::to_string),
        });
        if let Some(code) = state.execute_failures.pop_front() {
            return Err(db_error(&code));
        }
        Ok(state.results.pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl Connection for StubConnection {
    async fn batch(&mut self, sql: &str) -> Result<(), SqlGuardError> {
        let mut state = self.state.lock().unwrap();
        state.batches.push((self.id, sql.to_string()));
        if let Some(pos) = state.batch_failures.iter().position(|(cmd, _)| cmd == sql) {
            let (_, code) = state.batch_failures.remove(pos);
            return Err(db_error(&code));
        }
        Ok(())
    }

    fn release(self, damaged: bool) {
        let mut state = self.state.lock().unwrap();
        state.released += 1;
        if damaged {
            state.released_damaged += 1;
        }
    }
}
