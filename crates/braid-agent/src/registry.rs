use std::collections::HashMap;
use std::sync::Arc;

use braid_core::error::{BraidError, Result};
use braid_core::traits::Agent;

/// Name-keyed registry of agents.
///
/// Dotted names form groups ("sales.Loader", "sales.Summarizer"), which
/// lets callers list a whole group for coordination-style agent selection.
/// The registry is an owned instance with an explicit lifecycle — created
/// once per process or per test, never a module-level singleton.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent under its own name.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        let name = agent.name().to_string();
        if self.agents.contains_key(&name) {
            return Err(BraidError::AgentAlreadyRegistered(name));
        }
        self.agents.insert(name, agent);
        Ok(())
    }

    /// Unregister an agent by name. Returns whether it existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.agents.remove(name).is_some()
    }

    /// Look up an agent by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Agent>> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| BraidError::AgentNotRegistered(name.to_string()))
    }

    /// List all registered agent names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// List agent names in a dotted group, sorted (e.g. "sales" matches
    /// "sales.Loader" but not "salesforce.Sync").
    pub fn list_group(&self, group: &str) -> Vec<String> {
        let prefix = format!("{}.", group);
        let mut names: Vec<String> = self
            .agents
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Metadata for all registered agents, sorted by name.
    pub fn metadata(&self) -> Vec<serde_json::Value> {
        self.list()
            .iter()
            .filter_map(|name| self.agents.get(name))
            .map(|agent| agent.metadata())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_agent::FnAgent;

    fn noop(name: &str) -> Arc<dyn Agent> {
        Arc::new(FnAgent::new(name, |_| Ok(Default::default())))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = AgentRegistry::new();
        registry.register(noop("Loader")).unwrap();

        assert!(registry.get("Loader").is_ok());
        assert!(matches!(
            registry.get("Ghost"),
            Err(BraidError::AgentNotRegistered(name)) if name == "Ghost"
        ));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = AgentRegistry::new();
        registry.register(noop("Loader")).unwrap();
        assert!(matches!(
            registry.register(noop("Loader")),
            Err(BraidError::AgentAlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_unregister() {
        let mut registry = AgentRegistry::new();
        registry.register(noop("Loader")).unwrap();
        assert!(registry.unregister("Loader"));
        assert!(!registry.unregister("Loader"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_group_listing() {
        let mut registry = AgentRegistry::new();
        registry.register(noop("sales.Loader")).unwrap();
        registry.register(noop("sales.Summarizer")).unwrap();
        registry.register(noop("salesforce.Sync")).unwrap();

        assert_eq!(
            registry.list_group("sales"),
            vec!["sales.Loader", "sales.Summarizer"]
        );
        assert_eq!(registry.list().len(), 3);
    }

    #[test]
    fn test_metadata_is_sorted() {
        let mut registry = AgentRegistry::new();
        registry.register(noop("b")).unwrap();
        registry.register(noop("a")).unwrap();

        let meta = registry.metadata();
        assert_eq!(meta[0]["name"], "a");
        assert_eq!(meta[1]["name"], "b");
    }
}
