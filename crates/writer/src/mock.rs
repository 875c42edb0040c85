//! Scripted in-memory backend
//!
//! Records every write and database creation, and fails according to simple
//! rules so fallback paths can be exercised without a database server.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use contracts::{
    BackendError, BackendErrorKind, ContractError, ExportId, Point, ShutdownHook,
    TimePrecision, TimeSeriesBackend,
};

/// One accepted write call
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub db_name: String,
    pub time_precision: Option<TimePrecision>,
    pub points: Vec<Point>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Known databases; `None` = every database exists
    databases: Option<HashSet<String>>,
    /// Measurements rejected whenever they appear in a write
    rejected: HashMap<ExportId, BackendErrorKind>,
    /// Results consumed by the next write calls, before any rule applies
    scripted: VecDeque<Result<(), BackendError>>,
    /// Failure returned by `create_database`
    create_failure: Option<BackendErrorKind>,
    attempts: usize,
    written: Vec<WriteCall>,
    created: Vec<String>,
}

/// In-memory `TimeSeriesBackend` for tests
#[derive(Debug, Default)]
pub struct MockBackend {
    name: String,
    state: Mutex<MockState>,
    closed: AtomicBool,
}

impl MockBackend {
    /// Backend on which every database exists and every write succeeds
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            ..Default::default()
        }
    }

    /// Only the listed databases exist; others report `DatabaseNotFound`
    pub fn with_databases<I, S>(self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().databases = Some(databases.into_iter().map(Into::into).collect());
        self
    }

    /// Reject any write containing `measurement`
    pub fn reject_measurement(self, measurement: &str, kind: BackendErrorKind) -> Self {
        self.lock().rejected.insert(ExportId::from(measurement), kind);
        self
    }

    /// Make `create_database` fail
    pub fn fail_create_database(self, kind: BackendErrorKind) -> Self {
        self.lock().create_failure = Some(kind);
        self
    }

    /// Queue `count` failures of `kind`
    pub fn push_failures(&self, kind: BackendErrorKind, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state
                .scripted
                .push_back(Err(BackendError::new(kind, "scripted failure")));
        }
    }

    /// Accepted write calls, in order
    pub fn written(&self) -> Vec<WriteCall> {
        self.lock().written.clone()
    }

    /// Points accepted across all calls
    pub fn written_points(&self) -> usize {
        self.lock().written.iter().map(|w| w.points.len()).sum()
    }

    /// Write calls attempted (accepted or not)
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Databases created through `create_database`
    pub fn created_databases(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // ignore poisoning from a panicked test thread
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_write(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<(), BackendError> {
        if self.is_closed() {
            return Err(BackendError::closed(&self.name));
        }

        let mut state = self.lock();
        state.attempts += 1;

        let result = if let Some(scripted) = state.scripted.pop_front() {
            scripted
        } else if state
            .databases
            .as_ref()
            .is_some_and(|dbs| !dbs.contains(db_name))
        {
            Err(BackendError::database_not_found(db_name))
        } else if let Some((measurement, kind)) = points
            .iter()
            .find_map(|p| state.rejected.get_key_value(&p.measurement))
        {
            Err(BackendError::new(
                *kind,
                format!("measurement '{measurement}' rejected"),
            ))
        } else {
            Ok(())
        };

        if result.is_ok() {
            state.written.push(WriteCall {
                db_name: db_name.to_string(),
                time_precision,
                points: points.to_vec(),
            });
        }
        result
    }
}

impl TimeSeriesBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write_points(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<(), BackendError> {
        self.try_write(db_name, time_precision, points)
    }

    async fn create_database(&self, db_name: &str) -> Result<(), BackendError> {
        if self.is_closed() {
            return Err(BackendError::closed(&self.name));
        }
        let mut state = self.lock();
        if let Some(kind) = state.create_failure {
            return Err(BackendError::new(kind, "scripted create failure"));
        }
        if let Some(dbs) = state.databases.as_mut() {
            dbs.insert(db_name.to_string());
        }
        state.created.push(db_name.to_string());
        Ok(())
    }
}

impl ShutdownHook for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) -> Result<(), ContractError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
