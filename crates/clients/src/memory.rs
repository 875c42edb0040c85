//! MemoryDataClient - scripted batches for tests
//!
//! Every pull pops the next scripted batch; with nothing queued it waits for
//! the pull timeout and returns an empty batch, like an idle topic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use contracts::{
    ContractError, DataClient, LivenessProbe, MatchedRecord, PulledBatch, ShutdownHook,
};
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    scripted: VecDeque<Result<PulledBatch, ContractError>>,
    /// Records handed out so far
    pulled: usize,
    /// Records covered by the last persisted offset
    committed: usize,
    persist_calls: usize,
    persist_failures: usize,
}

/// In-memory `DataClient`
#[derive(Default)]
pub struct MemoryDataClient {
    name: String,
    state: Mutex<MemoryState>,
    stopped: AtomicBool,
}

impl MemoryDataClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Queue a batch of records
    pub fn push_records(&self, records: Vec<MatchedRecord>) {
        self.push_batch(PulledBatch::from_records(records));
    }

    /// Queue a batch, possibly carrying per-message errors
    pub fn push_batch(&self, batch: PulledBatch) {
        self.lock().scripted.push_back(Ok(batch));
    }

    /// Queue a failing pull
    pub fn push_pull_failure(&self, message: impl Into<String>) {
        let err = ContractError::data_client(&self.name, message);
        self.lock().scripted.push_back(Err(err));
    }

    /// Make the next `count` offset persists fail
    pub fn fail_persists(&self, count: usize) {
        self.lock().persist_failures += count;
    }

    /// Scripted pulls not consumed yet
    pub fn pending(&self) -> usize {
        self.lock().scripted.len()
    }

    pub fn pulled_records(&self) -> usize {
        self.lock().pulled
    }

    pub fn committed_records(&self) -> usize {
        self.lock().committed
    }

    pub fn persist_calls(&self) -> usize {
        self.lock().persist_calls
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_batch(&self, limit: usize) -> Option<Result<PulledBatch, ContractError>> {
        let mut state = self.lock();
        let mut next = state.scripted.pop_front()?;
        if let Ok(batch) = &mut next {
            if batch.records.len() > limit {
                let rest = batch.records.split_off(limit);
                state
                    .scripted
                    .push_front(Ok(PulledBatch::from_records(rest)));
            }
            state.pulled += batch.records.len();
        }
        Some(next)
    }
}

impl DataClient for MemoryDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pull_batch(
        &self,
        timeout: Duration,
        limit: usize,
    ) -> Result<PulledBatch, ContractError> {
        if self.is_stopped() {
            return Err(ContractError::stopped(&self.name));
        }
        match self.next_batch(limit) {
            Some(result) => result,
            None => {
                tokio::time::sleep(timeout).await;
                Ok(PulledBatch::default())
            }
        }
    }

    async fn persist_offsets(&self) -> Result<(), ContractError> {
        let mut state = self.lock();
        state.persist_calls += 1;
        if state.persist_failures > 0 {
            state.persist_failures -= 1;
            return Err(ContractError::data_client(
                &self.name,
                "scripted persist failure",
            ));
        }
        state.committed = state.pulled;
        debug!(client = %self.name, committed = state.committed, "offsets persisted");
        Ok(())
    }
}

impl LivenessProbe for MemoryDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        !self.is_stopped()
    }
}

impl ShutdownHook for MemoryDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) -> Result<(), ContractError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}
