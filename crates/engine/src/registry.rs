//! Execution registry — the process-wide table of live and recently
//! terminated executions.
//!
//! `submit` allocates a record, schedules the executor on its own tokio
//! task, and returns immediately. A global semaphore caps concurrently
//! running executions; submissions above the cap queue as `pending`, and
//! submissions above the admission cap are rejected outright. Terminal
//! records stay queryable for the retention window and are swept
//! periodically, with an LRU cap as the hard ceiling.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

use weft_domain::config::EngineConfig;
use weft_domain::execution::{ExecutionSnapshot, ExecutionStatus};
use weft_domain::{Error, Result};

use crate::cancel::CancelToken;
use crate::compiler::CompiledWorkflow;
use crate::executor::Executor;
use crate::persist::SnapshotSink;
use crate::state::ExecutionState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Submission options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub user_id: Option<String>,
    pub max_retries: Option<u32>,
    pub deadline_ms: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ExecutionHandle {
    state: Arc<RwLock<ExecutionState>>,
    cancel: CancelToken,
    status_tx: watch::Sender<ExecutionStatus>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ExecutionRegistry {
    executions: RwLock<HashMap<Uuid, ExecutionHandle>>,
    run_slots: Arc<Semaphore>,
    executor: Arc<Executor>,
    sink: Option<Arc<dyn SnapshotSink>>,
    config: EngineConfig,
}

impl ExecutionRegistry {
    pub fn new(
        config: EngineConfig,
        executor: Arc<Executor>,
        sink: Option<Arc<dyn SnapshotSink>>,
    ) -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
            run_slots: Arc::new(Semaphore::new(config.max_concurrent_executions)),
            executor,
            sink,
            config,
        }
    }

    /// Allocate a record, schedule the executor, and return the id.
    ///
    /// Execution ids are minted here, so at most one executor task ever
    /// exists per id. Rejects with `capacity_exceeded` once pending plus
    /// running executions reach the admission cap.
    pub fn submit(
        &self,
        compiled: Arc<CompiledWorkflow>,
        input: Map<String, Value>,
        options: SubmitOptions,
    ) -> Result<Uuid> {
        let active = self.active_count();
        if active >= self.config.admission_cap {
            return Err(Error::CapacityExceeded(format!(
                "{active} executions pending or running (cap {})",
                self.config.admission_cap
            )));
        }

        let state = ExecutionState::new(
            compiled.name.clone(),
            compiled.version.clone(),
            input,
            options.user_id,
            options.max_retries.unwrap_or(self.config.default_max_retries),
        );
        let execution_id = state.execution_id;
        let deadline = options
            .deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        let state = Arc::new(RwLock::new(state));
        let cancel = CancelToken::new();
        let (status_tx, _) = watch::channel(ExecutionStatus::Pending);

        self.executions.write().insert(
            execution_id,
            ExecutionHandle {
                state: state.clone(),
                cancel: cancel.clone(),
                status_tx: status_tx.clone(),
            },
        );

        let executor = self.executor.clone();
        let run_slots = self.run_slots.clone();
        let sink = self.sink.clone();

        let span = tracing::info_span!("execution", %execution_id, workflow = %compiled.name);
        tokio::spawn(tracing::Instrument::instrument(
            async move {
                let permit = match run_slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        state.write().finalize(ExecutionStatus::Failed);
                        status_tx.send_replace(ExecutionStatus::Failed);
                        return;
                    }
                };

                let status = executor.run(&compiled, &state, &cancel, deadline).await;
                drop(permit);

                // send_replace stores the value even with no subscribers,
                // so a late await_terminal still observes the transition.
                status_tx.send_replace(status);

                if let Some(sink) = sink {
                    let snapshot = state.read().snapshot();
                    if let Err(e) = sink.write(&snapshot) {
                        tracing::warn!(error = %e, "snapshot sink write failed");
                    }
                }
            },
            span,
        ));

        tracing::info!(%execution_id, "execution submitted");
        Ok(execution_id)
    }

    /// Deep-copied snapshot of one execution.
    pub fn get(&self, execution_id: Uuid) -> Result<ExecutionSnapshot> {
        let executions = self.executions.read();
        let handle = executions
            .get(&execution_id)
            .ok_or(Error::ExecutionNotFound(execution_id))?;
        let snapshot = handle.state.read().snapshot();
        Ok(snapshot)
    }

    /// Set the cancel signal for a live execution.
    ///
    /// Idempotence: cancelling a terminal execution answers
    /// `already_terminal` and leaves the record untouched — this also
    /// resolves the race against a natural terminal transition.
    pub fn cancel(&self, execution_id: Uuid) -> Result<()> {
        let executions = self.executions.read();
        let handle = executions
            .get(&execution_id)
            .ok_or(Error::ExecutionNotFound(execution_id))?;

        let status = handle.state.read().status;
        if status.is_terminal() {
            return Err(Error::AlreadyTerminal(execution_id));
        }
        handle.cancel.cancel();
        tracing::info!(%execution_id, "cancel signal set");
        Ok(())
    }

    /// Recent executions, newest first.
    pub fn list_recent(
        &self,
        limit: usize,
        status_filter: Option<ExecutionStatus>,
    ) -> Vec<ExecutionSnapshot> {
        let executions = self.executions.read();
        let mut snapshots: Vec<ExecutionSnapshot> = executions
            .values()
            .map(|h| h.state.read().snapshot())
            .filter(|s| status_filter.map_or(true, |f| s.status == f))
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.truncate(limit);
        snapshots
    }

    /// Block until the execution reaches a terminal status, or time out.
    pub async fn await_terminal(
        &self,
        execution_id: Uuid,
        timeout: Duration,
    ) -> Result<ExecutionSnapshot> {
        let mut rx = {
            let executions = self.executions.read();
            let handle = executions
                .get(&execution_id)
                .ok_or(Error::ExecutionNotFound(execution_id))?;
            if handle.state.read().status.is_terminal() {
                return Ok(handle.state.read().snapshot());
            }
            handle.status_tx.subscribe()
        };

        let wait = async {
            loop {
                if rx.borrow_and_update().is_terminal() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };

        if tokio::time::timeout(timeout, wait).await.is_err() {
            return Err(Error::DeadlineExceeded);
        }
        self.get(execution_id)
    }

    /// Pending + running executions.
    pub fn active_count(&self) -> usize {
        self.executions
            .read()
            .values()
            .filter(|h| !h.state.read().status.is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.executions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.read().is_empty()
    }

    /// Drop terminal records past the retention window, then enforce the
    /// retention cap by evicting the oldest terminal records. Returns the
    /// number of evicted records.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.retention_secs as i64);
        let mut executions = self.executions.write();
        let before = executions.len();

        executions.retain(|_, handle| {
            let state = handle.state.read();
            !(state.status.is_terminal()
                && state.completed_at.map_or(false, |t| t < cutoff))
        });

        if executions.len() > self.config.retention_cap {
            let mut terminal: Vec<(Uuid, chrono::DateTime<Utc>)> = executions
                .iter()
                .filter_map(|(id, handle)| {
                    let state = handle.state.read();
                    state
                        .status
                        .is_terminal()
                        .then(|| (*id, state.completed_at.unwrap_or(state.created_at)))
                })
                .collect();
            terminal.sort_by_key(|(_, completed_at)| *completed_at);

            let excess = executions.len() - self.config.retention_cap;
            for (id, _) in terminal.into_iter().take(excess) {
                executions.remove(&id);
            }
        }

        before - executions.len()
    }
}
