#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sql_dac::driver::{
    CommandRequest, Connector, DataColumn, DriverConnection, DriverError, Execution, RowValues,
};
use sql_dac::prelude::*;

/// Where the scripted connector should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Connect,
    Execute,
    /// Fails execution with a non-driver error.
    ExecuteInternal,
    Begin,
    Commit,
    Rollback,
    Close,
}

/// One scripted result set: column names plus rows.
#[derive(Debug, Clone)]
pub struct ScriptedSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RowValues>>,
}

impl ScriptedSet {
    pub fn new(columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    events: Vec<String>,
    faults: Vec<Fault>,
    responses: VecDeque<(Vec<ScriptedSet>, u64)>,
}

/// A connector whose connections log every call and fail where told to.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fault: Fault) -> &Self {
        self.state.lock().unwrap().faults.push(fault);
        self
    }

    /// Queue the result of the next command.
    pub fn respond(&self, sets: Vec<ScriptedSet>, rows_affected: u64) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back((sets, rows_affected));
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn database(&self) -> Database {
        Database::new("scripted", self.clone())
    }

    fn record(&self, event: impl Into<String>) {
        self.state.lock().unwrap().events.push(event.into());
    }

    fn faulted(&self, fault: Fault) -> bool {
        self.state.lock().unwrap().faults.contains(&fault)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        self.record("connect");
        if self.faulted(Fault::Connect) {
            return Err(DriverError::ConnectionError("scripted connect failure".into()));
        }
        Ok(Box::new(ScriptedConnection {
            script: self.clone(),
        }))
    }
}

struct ScriptedConnection {
    script: ScriptedConnector,
}

impl ScriptedConnection {
    fn step(&self, event: &str, fault: Fault) -> Result<(), DriverError> {
        self.script.record(event);
        if self.script.faulted(fault) {
            return Err(DriverError::ExecutionError(format!("scripted {event} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl DriverConnection for ScriptedConnection {
    async fn begin(&mut self) -> Result<(), DriverError> {
        self.step("begin", Fault::Begin)
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.step("commit", Fault::Commit)
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.step("rollback", Fault::Rollback)
    }

    async fn execute(&mut self, request: CommandRequest<'_>) -> Result<Execution, DriverError> {
        self.script.record(format!("execute {}", request.command.sql));
        if self.script.faulted(Fault::ExecuteInternal) {
            return Err(DriverError::Internal("scripted worker crash".into()));
        }
        if self.script.faulted(Fault::Execute) {
            return Err(DriverError::ExecutionError("scripted execute failure".into()));
        }
        let (sets, rows_affected) = self
            .script
            .state
            .lock()
            .unwrap()
            .responses
            .pop_front()
            .unwrap_or_default();

        let mut execution = Execution {
            result_sets: Vec::new(),
            rows_affected,
        };
        for (index, set) in sets.into_iter().enumerate() {
            let columns = set
                .columns
                .iter()
                .enumerate()
                .map(|(ordinal, name)| DataColumn::new(name.clone(), ordinal, None))
                .collect();
            let mut collector = request.collector(columns, index);
            for row in set.rows {
                if !collector.offer(|| Ok(row))? {
                    break;
                }
            }
            execution.result_sets.push(collector.finish());
        }
        Ok(execution)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.step("close", Fault::Close)
    }
}

/// A file-backed `SQLite` database in a fresh temporary directory.
pub struct TempSqlite {
    pub dir: tempfile::TempDir,
    pub path: PathBuf,
}

impl TempSqlite {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("dac.db");
        Self { dir, path }
    }

    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub async fn database(&self) -> Database {
        Database::from_config(&DacConfig::new(DatabaseType::Sqlite, self.path_str()))
            .await
            .expect("build sqlite database")
    }
}

/// Run `sql` as one multi-statement command.
pub async fn setup(db: &Database, sql: &str) {
    db.execute_non_query(&SqlCommand::text(sql), &ExecOptions::default())
        .await
        .expect("setup script");
}

pub fn ints(table: &DataTable, column: &str) -> Vec<i64> {
    table
        .rows()
        .iter()
        .filter_map(|r| r.get(column).and_then(RowValues::as_int).copied())
        .collect()
}
