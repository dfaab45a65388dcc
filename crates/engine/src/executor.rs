//! The execution loop.
//!
//! One executor run drives one compiled workflow to a terminal status:
//! strictly serial node dispatch, conditional edge routing, per-execution
//! retry with exponential backoff, and cooperative cancellation/deadline
//! observation at the defined points — loop iteration start, immediately
//! before dispatch, and after every tool call returns.
//!
//! The executor is the only writer of the execution state while it runs;
//! it takes the record's write lock for short, non-awaiting sections so
//! the registry can answer status queries concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde_json::{Map, Value};

use weft_client::{ToolInvoker, ToolResponse};
use weft_domain::execution::{
    ErrorRecord, ExecutionStatus, LogLevel, StepKind, StepOutcome, StepRecord, ToolInvocation,
};
use weft_domain::workflow::{NodeSpec, ValueSource, TERMINAL};
use weft_domain::Error;
use weft_tools::{validate_arguments, ToolRegistry};

use crate::cancel::CancelToken;
use crate::compiler::{CompiledWorkflow, Transition};
use crate::conditions::ConditionRegistry;
use crate::state::ExecutionState;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 8_000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Executor {
    tools: Arc<ToolRegistry>,
    conditions: Arc<ConditionRegistry>,
    invoker: Arc<dyn ToolInvoker>,
}

/// What a successful dispatch produced.
struct DispatchOutcome {
    tool_invocation: Option<ToolInvocation>,
    /// Branch label, when the node was a conditional router.
    router_label: Option<String>,
}

/// A failed dispatch, with whatever invocation detail was captured before
/// the failure.
struct DispatchFailure {
    error: Error,
    tool_invocation: Option<ToolInvocation>,
}

impl From<Error> for DispatchFailure {
    fn from(error: Error) -> Self {
        Self { error, tool_invocation: None }
    }
}

impl Executor {
    pub fn new(
        tools: Arc<ToolRegistry>,
        conditions: Arc<ConditionRegistry>,
        invoker: Arc<dyn ToolInvoker>,
    ) -> Self {
        Self { tools, conditions, invoker }
    }

    /// Drive a compiled workflow against the given state to a terminal
    /// status. The state is finalized (terminal status, `completed_at`)
    /// before this returns.
    pub async fn run(
        &self,
        compiled: &CompiledWorkflow,
        state: &Arc<RwLock<ExecutionState>>,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> ExecutionStatus {
        {
            let mut st = state.write();
            st.mark_running(&compiled.entry_point);
            st.push_log(
                LogLevel::Info,
                format!("workflow {} v{} started", compiled.name, compiled.version),
                Value::Null,
            );
        }

        let mut current = compiled.entry_point.clone();

        loop {
            if current == TERMINAL {
                let mut st = state.write();
                st.push_log(LogLevel::Info, "workflow completed", Value::Null);
                st.finalize(ExecutionStatus::Completed);
                return ExecutionStatus::Completed;
            }

            state.write().current_node = Some(current.clone());

            // Observation point: loop iteration start / before dispatch.
            if cancel.is_cancelled() {
                return self.terminate(state, &current, Error::Cancelled);
            }
            if deadline.map_or(false, |d| Instant::now() >= d) {
                return self.terminate(state, &current, Error::DeadlineExceeded);
            }

            let Some(spec) = compiled.nodes.get(&current).cloned() else {
                // The compiler guarantees this; defend anyway.
                return self.terminate(state, &current, Error::UnknownNode(current.clone()));
            };

            // An explicit terminal node exits without a step.
            if matches!(spec, NodeSpec::Terminal) {
                current = TERMINAL.to_owned();
                continue;
            }

            let started_at = Utc::now();

            match self.dispatch(compiled, &spec, &current, state, cancel).await {
                Ok(outcome) => {
                    // Observation point: after the node's work returned.
                    if cancel.is_cancelled() {
                        commit_step(
                            state,
                            &current,
                            step_kind(&spec),
                            started_at,
                            StepOutcome::Error,
                            outcome.tool_invocation,
                            Some("execution cancelled".into()),
                            None,
                        );
                        let mut st = state.write();
                        st.append_error(
                            ErrorRecord::new(Error::Cancelled.kind(), "execution cancelled")
                                .at_node(&current),
                        );
                        st.finalize(ExecutionStatus::Cancelled);
                        return ExecutionStatus::Cancelled;
                    }

                    let (next, branch) =
                        match self.next_node(compiled, &current, state, outcome.router_label) {
                            Ok(selection) => selection,
                            Err(err) => {
                                commit_step(
                                    state,
                                    &current,
                                    step_kind(&spec),
                                    started_at,
                                    StepOutcome::Error,
                                    outcome.tool_invocation,
                                    Some(err.to_string()),
                                    None,
                                );
                                return self.terminate(state, &current, err);
                            }
                        };

                    commit_step(
                        state,
                        &current,
                        step_kind(&spec),
                        started_at,
                        StepOutcome::Success,
                        outcome.tool_invocation,
                        None,
                        branch.clone(),
                    );

                    // A conditional route back to an already-dispatched node
                    // is a workflow-level retry: raise the counter and leave
                    // an audit entry, as the tool-level path does.
                    if branch.is_some() && next != TERMINAL {
                        let mut st = state.write();
                        if st.has_visited(&next) && st.can_retry() {
                            st.increment_retry();
                        }
                    }

                    current = next;
                }
                Err(failure) => {
                    let retryable = failure.error.is_retryable();
                    let will_retry = retryable && state.read().can_retry();

                    {
                        let mut st = state.write();
                        st.append_error(ErrorRecord::from(&failure.error).at_node(&current));
                    }

                    if will_retry {
                        let attempt = {
                            let mut st = state.write();
                            st.increment_retry()
                        };
                        // The failed attempt is committed as a retry step;
                        // the re-entered node records its own fresh step.
                        commit_step(
                            state,
                            &current,
                            StepKind::Retry,
                            started_at,
                            StepOutcome::Error,
                            failure.tool_invocation,
                            Some(failure.error.to_string()),
                            None,
                        );
                        let delay = backoff_delay(attempt);
                        tracing::debug!(
                            node = %current,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after transient tool failure"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    commit_step(
                        state,
                        &current,
                        step_kind(&spec),
                        started_at,
                        StepOutcome::Error,
                        failure.tool_invocation,
                        Some(failure.error.to_string()),
                        None,
                    );

                    let status = terminal_status(&failure.error);
                    let mut st = state.write();
                    st.finalize(status);
                    return status;
                }
            }
        }
    }

    // ── dispatch ────────────────────────────────────────────────────

    async fn dispatch(
        &self,
        compiled: &CompiledWorkflow,
        spec: &NodeSpec,
        node_name: &str,
        state: &Arc<RwLock<ExecutionState>>,
        cancel: &CancelToken,
    ) -> Result<DispatchOutcome, DispatchFailure> {
        match spec {
            NodeSpec::ToolCall { service, tool, input_mapping, output_mapping } => {
                let invocation = self
                    .run_tool(node_name, service, tool, input_mapping, output_mapping.as_deref(), state)
                    .await?;
                Ok(DispatchOutcome { tool_invocation: Some(invocation), router_label: None })
            }
            NodeSpec::Composite { children } => {
                self.run_composite(compiled, node_name, children, state, cancel).await?;
                Ok(DispatchOutcome { tool_invocation: None, router_label: None })
            }
            NodeSpec::ConditionalRouter { condition } => {
                let label = self.evaluate_condition(condition, state)?;
                Ok(DispatchOutcome { tool_invocation: None, router_label: Some(label) })
            }
            NodeSpec::Terminal => {
                Ok(DispatchOutcome { tool_invocation: None, router_label: None })
            }
        }
    }

    async fn run_tool(
        &self,
        node_name: &str,
        service: &str,
        tool: &str,
        input_mapping: &std::collections::BTreeMap<String, ValueSource>,
        output_mapping: Option<&str>,
        state: &Arc<RwLock<ExecutionState>>,
    ) -> Result<ToolInvocation, DispatchFailure> {
        let binding = self.tools.lookup(service, tool)?;

        let arguments = {
            let st = state.read();
            build_arguments(input_mapping, &st)
        };

        if let Err(err) = validate_arguments(&binding, &arguments) {
            return Err(DispatchFailure {
                tool_invocation: Some(ToolInvocation {
                    service: service.to_owned(),
                    tool: tool.to_owned(),
                    request_snapshot: Value::Object(arguments),
                    response_snapshot: None,
                    http_status: None,
                    duration_ms: 0,
                }),
                error: err,
            });
        }

        let start = Instant::now();
        let result = self.invoker.invoke(&binding, &arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(ToolResponse { status, body }) => {
                let body = match &binding.response_shape {
                    Some(shape) => weft_client::invoker::apply_shape(shape, &body),
                    None => body,
                };
                apply_output(state, node_name, output_mapping, &body);
                Ok(ToolInvocation {
                    service: service.to_owned(),
                    tool: tool.to_owned(),
                    request_snapshot: Value::Object(arguments),
                    response_snapshot: Some(body),
                    http_status: Some(status),
                    duration_ms,
                })
            }
            Err(error) => {
                let (http_status, response_snapshot) = match &error {
                    Error::ToolNon2xx { status, body } => (Some(*status), Some(body.clone())),
                    _ => (None, None),
                };
                Err(DispatchFailure {
                    tool_invocation: Some(ToolInvocation {
                        service: service.to_owned(),
                        tool: tool.to_owned(),
                        request_snapshot: Value::Object(arguments),
                        response_snapshot,
                        http_status,
                        duration_ms,
                    }),
                    error,
                })
            }
        }
    }

    /// Execute composite children serially with the same state. The first
    /// child failure propagates; child invocation detail goes to the
    /// execution's log entries since the composite commits a single step.
    async fn run_composite(
        &self,
        compiled: &CompiledWorkflow,
        node_name: &str,
        children: &[String],
        state: &Arc<RwLock<ExecutionState>>,
        cancel: &CancelToken,
    ) -> Result<(), DispatchFailure> {
        for child in children {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled.into());
            }

            // The compiler guarantees children exist and are tool_call nodes.
            let Some(NodeSpec::ToolCall { service, tool, input_mapping, output_mapping }) =
                compiled.nodes.get(child)
            else {
                return Err(Error::NodeException(format!(
                    "composite `{node_name}`: child `{child}` is not dispatchable"
                ))
                .into());
            };

            match self
                .run_tool(child, service, tool, input_mapping, output_mapping.as_deref(), state)
                .await
            {
                Ok(invocation) => {
                    let mut st = state.write();
                    st.push_log(
                        LogLevel::Info,
                        format!("composite {node_name}: child {child} succeeded"),
                        serde_json::json!({
                            "service": invocation.service,
                            "tool": invocation.tool,
                            "http_status": invocation.http_status,
                            "duration_ms": invocation.duration_ms,
                            "request": invocation.request_snapshot,
                            "response": invocation.response_snapshot,
                        }),
                    );
                }
                Err(failure) => {
                    // Propagate the child's error untouched so the retry
                    // classification still applies at the composite level.
                    let mut st = state.write();
                    st.push_log(
                        LogLevel::Error,
                        format!(
                            "composite {node_name}: child {child} failed: {}",
                            failure.error
                        ),
                        serde_json::json!({ "child": child }),
                    );
                    drop(st);
                    return Err(DispatchFailure {
                        error: failure.error,
                        tool_invocation: failure.tool_invocation,
                    });
                }
            }
        }
        Ok(())
    }

    fn evaluate_condition(
        &self,
        condition: &str,
        state: &Arc<RwLock<ExecutionState>>,
    ) -> Result<String, DispatchFailure> {
        let Some(function) = self.conditions.get(condition) else {
            return Err(Error::UnknownCondition(condition.to_owned()).into());
        };
        let st = state.read();
        Ok(function(&st))
    }

    // ── next-node selection ─────────────────────────────────────────

    fn next_node(
        &self,
        compiled: &CompiledWorkflow,
        current: &str,
        state: &Arc<RwLock<ExecutionState>>,
        router_label: Option<String>,
    ) -> Result<(String, Option<String>), Error> {
        match compiled.transition(current) {
            Transition::Terminal => Ok((TERMINAL.to_owned(), None)),
            Transition::Unconditional(to) => Ok((to.clone(), None)),
            Transition::Conditional { condition, branches, fallback } => {
                let is_router = router_label.is_some();
                let label = match router_label {
                    Some(label) => label,
                    None => {
                        let function = self
                            .conditions
                            .get(condition)
                            .ok_or_else(|| Error::UnknownCondition(condition.clone()))?;
                        let st = state.read();
                        function(&st)
                    }
                };
                match branches.get(&label) {
                    Some(to) => Ok((to.clone(), Some(label))),
                    None if is_router => Err(Error::Validation(format!(
                        "router `{current}` returned unrecognized branch label `{label}`"
                    ))),
                    None => Ok((fallback.clone(), Some(label))),
                }
            }
        }
    }

    // ── termination ─────────────────────────────────────────────────

    fn terminate(
        &self,
        state: &Arc<RwLock<ExecutionState>>,
        node: &str,
        error: Error,
    ) -> ExecutionStatus {
        let status = terminal_status(&error);
        let mut st = state.write();
        st.append_error(ErrorRecord::from(&error).at_node(node));
        st.finalize(status);
        tracing::info!(
            execution_id = %st.execution_id,
            node,
            status = ?status,
            "execution terminated"
        );
        status
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_arguments(
    input_mapping: &std::collections::BTreeMap<String, ValueSource>,
    state: &ExecutionState,
) -> Map<String, Value> {
    let mut arguments = Map::new();
    for (name, source) in input_mapping {
        match source {
            ValueSource::State { path } => {
                if let Some(value) = state.get(path) {
                    arguments.insert(name.clone(), value);
                }
            }
            ValueSource::Literal { value } => {
                arguments.insert(name.clone(), value.clone());
            }
        }
    }
    arguments
}

/// Place a tool response into the state: at the mapped path when one is
/// declared, merged at the root for bare object responses, under the node
/// name otherwise.
fn apply_output(
    state: &Arc<RwLock<ExecutionState>>,
    node_name: &str,
    output_mapping: Option<&str>,
    body: &Value,
) {
    let mut st = state.write();
    match (output_mapping, body) {
        (Some(path), value) => st.set(path, value.clone()),
        (None, Value::Object(fields)) => st.merge_output(fields.clone()),
        (None, value) => st.set(node_name, value.clone()),
    }
}

#[allow(clippy::too_many_arguments)]
fn commit_step(
    state: &Arc<RwLock<ExecutionState>>,
    node_name: &str,
    kind: StepKind,
    started_at: DateTime<Utc>,
    outcome: StepOutcome,
    tool_invocation: Option<ToolInvocation>,
    error_message: Option<String>,
    branch: Option<String>,
) {
    let mut st = state.write();
    let step_id = st.next_step_id();
    st.append_step(StepRecord {
        step_id,
        node_name: node_name.to_owned(),
        kind,
        started_at,
        finished_at: Utc::now(),
        outcome,
        tool_invocation,
        error_message,
        branch,
    });
}

fn step_kind(spec: &NodeSpec) -> StepKind {
    match spec {
        NodeSpec::ToolCall { .. } => StepKind::ToolCall,
        NodeSpec::Composite { .. } => StepKind::Composite,
        NodeSpec::ConditionalRouter { .. } => StepKind::ConditionalRouter,
        NodeSpec::Terminal => StepKind::ToolCall,
    }
}

fn terminal_status(error: &Error) -> ExecutionStatus {
    match error {
        Error::Cancelled => ExecutionStatus::Cancelled,
        Error::DeadlineExceeded => ExecutionStatus::Timeout,
        _ => ExecutionStatus::Failed,
    }
}

/// Exponential backoff: base 500 ms doubling per attempt, capped at 8 s,
/// with ±20% uniform jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let raw = BACKOFF_BASE_MS.saturating_mul(1 << exponent);
    let capped = raw.min(BACKOFF_CAP_MS);
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    Duration::from_millis((capped as f64 * jitter) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        for _ in 0..32 {
            let first = backoff_delay(1).as_millis() as u64;
            assert!((400..=600).contains(&first), "attempt 1 -> {first}ms");

            let second = backoff_delay(2).as_millis() as u64;
            assert!((800..=1200).contains(&second), "attempt 2 -> {second}ms");

            let capped = backoff_delay(12).as_millis() as u64;
            assert!(capped <= 9_600, "attempt 12 -> {capped}ms");
            assert!(capped >= 6_400, "attempt 12 -> {capped}ms");
        }
    }

    #[test]
    fn terminal_status_mapping() {
        assert_eq!(terminal_status(&Error::Cancelled), ExecutionStatus::Cancelled);
        assert_eq!(terminal_status(&Error::DeadlineExceeded), ExecutionStatus::Timeout);
        assert_eq!(
            terminal_status(&Error::Validation("x".into())),
            ExecutionStatus::Failed
        );
        assert_eq!(
            terminal_status(&Error::ToolNon2xx { status: 503, body: Value::Null }),
            ExecutionStatus::Failed
        );
    }
}
