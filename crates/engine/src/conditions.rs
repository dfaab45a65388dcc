//! Named condition functions for conditional routing.
//!
//! Conditions are pure functions of the execution state returning a branch
//! label. They are registered by name in a process-scoped registry and
//! resolved at compile time, which keeps compiled workflows serializable
//! and reproducible across processes. Conditions never mutate state; the
//! retry counter is owned by the executor.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::state::ExecutionState;

pub type ConditionFn = dyn Fn(&ExecutionState) -> String + Send + Sync;

pub struct ConditionRegistry {
    conditions: RwLock<HashMap<String, Arc<ConditionFn>>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self {
            conditions: RwLock::new(HashMap::new()),
        }
    }

    /// A registry pre-loaded with the built-in conditions.
    pub fn with_builtins() -> Self {
        let registry = Self::new();

        // Route back into analysis while errors are present and retry
        // budget remains; the executor raises the counter on loop-backs.
        registry.register("should_retry", |state| {
            if !state.errors.is_empty() && state.can_retry() {
                "retry_analysis".into()
            } else {
                "end".into()
            }
        });

        registry.register("has_errors", |state| {
            if state.errors.is_empty() {
                "none".into()
            } else {
                "errors".into()
            }
        });

        registry
    }

    /// Register (or replace) a condition under a name.
    pub fn register<F>(&self, name: impl Into<String>, condition: F)
    where
        F: Fn(&ExecutionState) -> String + Send + Sync + 'static,
    {
        self.conditions
            .write()
            .insert(name.into(), Arc::new(condition));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.conditions.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ConditionFn>> {
        self.conditions.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.conditions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.read().is_empty()
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
