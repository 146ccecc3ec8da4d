//! Ordered rule table with an id index, and the shared handle used to swap it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::loader::Diagnostic;
use super::types::{Rule, RuleRecord};

/// An immutable rule set.
///
/// Table order is priority order among equally specific matches.
#[derive(Debug, Clone)]
pub struct RuleStore {
    rules: Vec<Rule>,
    by_id: HashMap<String, usize>,
    loaded_at: DateTime<Utc>,
    diagnostics: Vec<Diagnostic>,
}

impl RuleStore {
    /// A store with no rules. Every turn falls back to the responder.
    pub fn empty() -> Self {
        Self::from_rules(Vec::new())
    }

    /// Build a store from rules in priority order.
    ///
    /// A rule whose id was already seen is dropped; the first one wins.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        let mut kept = Vec::with_capacity(rules.len());
        let mut by_id = HashMap::with_capacity(rules.len());

        for rule in rules {
            if by_id.contains_key(&rule.id) {
                warn!(rule_id = %rule.id, "Duplicate rule id, keeping the first occurrence");
                continue;
            }
            by_id.insert(rule.id.clone(), kept.len());
            kept.push(rule);
        }

        Self {
            rules: kept,
            by_id,
            loaded_at: Utc::now(),
            diagnostics: Vec::new(),
        }
    }

    /// Attach the diagnostics produced while loading this store.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.by_id.get(id).map(|&idx| &self.rules[idx])
    }

    /// Rules in table order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// When this store was built.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Problems found while loading this store.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Export in table order, in the persisted shape.
    pub fn to_records(&self) -> Vec<RuleRecord> {
        self.rules.iter().map(Rule::to_record).collect()
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::empty()
    }
}

/// Shared handle to the rule set currently in effect.
///
/// Readers take a snapshot once per turn and keep using it even if a reload
/// publishes a new store meanwhile. Writers build the new store first and
/// only hold the lock for the pointer swap.
#[derive(Debug, Clone, Default)]
pub struct SharedRules {
    current: Arc<RwLock<Arc<RuleStore>>>,
}

impl SharedRules {
    pub fn new(store: RuleStore) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    /// The store currently in effect.
    pub fn snapshot(&self) -> Arc<RuleStore> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the store. Returns the store that was in effect before.
    pub fn publish(&self, store: RuleStore) -> Arc<RuleStore> {
        let next = Arc::new(store);
        info!(
            rules = next.len(),
            diagnostics = next.diagnostics().len(),
            "Publishing rule set"
        );
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}
