//! Process-wide tool registry.
//!
//! Owns the canonical `(service, tool) → ToolBinding` mapping. Registration
//! takes the write lock briefly; execution-time lookups clone an `Arc` out
//! under the read lock, so a binding resolved for a running step stays
//! stable even if a newer version lands mid-flight.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use weft_domain::binding::{ParamLocation, ToolBinding};
use weft_domain::{Error, Result};

pub struct ToolRegistry {
    bindings: RwLock<HashMap<(String, String), Arc<ToolBinding>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Register one binding.
    ///
    /// Fails with `duplicate_tool` if the key exists and the new version is
    /// not strictly greater than the registered one.
    pub fn register(&self, binding: ToolBinding) -> Result<()> {
        check_binding(&binding)?;
        let mut bindings = self.bindings.write();
        Self::insert_locked(&mut bindings, binding)
    }

    /// Register a batch atomically: either every binding lands or none do.
    pub fn register_all(&self, batch: Vec<ToolBinding>) -> Result<()> {
        for binding in &batch {
            check_binding(binding)?;
        }
        let mut bindings = self.bindings.write();
        for binding in &batch {
            if let Some(existing) = bindings.get(&binding.key()) {
                if binding.version <= existing.version {
                    return Err(Error::DuplicateTool {
                        service: binding.service.clone(),
                        tool: binding.tool.clone(),
                    });
                }
            }
        }
        for binding in batch {
            Self::insert_locked(&mut bindings, binding)?;
        }
        Ok(())
    }

    fn insert_locked(
        bindings: &mut HashMap<(String, String), Arc<ToolBinding>>,
        binding: ToolBinding,
    ) -> Result<()> {
        let key = binding.key();
        if let Some(existing) = bindings.get(&key) {
            if binding.version <= existing.version {
                return Err(Error::DuplicateTool {
                    service: binding.service,
                    tool: binding.tool,
                });
            }
            tracing::info!(
                service = %binding.service,
                tool = %binding.tool,
                old = %existing.version,
                new = %binding.version,
                "tool binding superseded"
            );
        }
        bindings.insert(key, Arc::new(binding));
        Ok(())
    }

    /// Resolve a binding for execution.
    pub fn lookup(&self, service: &str, tool: &str) -> Result<Arc<ToolBinding>> {
        self.bindings
            .read()
            .get(&(service.to_owned(), tool.to_owned()))
            .cloned()
            .ok_or_else(|| Error::UnknownTool {
                service: service.to_owned(),
                tool: tool.to_owned(),
            })
    }

    /// List registered bindings, optionally scoped to one service.
    /// Ordered by `(service, tool)` for stable output.
    pub fn list(&self, service: Option<&str>) -> Vec<Arc<ToolBinding>> {
        let bindings = self.bindings.read();
        let mut out: Vec<Arc<ToolBinding>> = bindings
            .values()
            .filter(|b| service.map_or(true, |s| b.service == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key().cmp(&b.key()));
        out
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural invariant: GET/DELETE bindings may not declare body
/// parameters, whatever path they arrived by.
fn check_binding(binding: &ToolBinding) -> Result<()> {
    if !binding.http_method.allows_body() {
        if let Some((name, _)) = binding
            .parameter_schema
            .iter()
            .find(|(_, p)| p.location == ParamLocation::Body)
        {
            return Err(Error::Validation(format!(
                "{}/{}: body parameter `{name}` not allowed on {}",
                binding.service, binding.tool, binding.http_method
            )));
        }
    }
    Ok(())
}
