//! Rule selection for one turn.
//!
//! Two passes over the table in order:
//! 1. Contextual: rules requiring the current topic, whose pattern accepts the
//!    input (chain-only and `*` patterns always do).
//! 2. General: rules with no required topic and a phrase found in the input.
//!
//! A contextual match always beats a general one, and within a pass the first
//! rule in table order wins.

use tracing::debug;

use super::store::RuleStore;
use super::types::{Pattern, Rule, normalize};

/// Finds the rule that should fire for an `(input, context)` pair.
pub struct Matcher<'a> {
    store: &'a RuleStore,
}

impl<'a> Matcher<'a> {
    pub fn new(store: &'a RuleStore) -> Self {
        Self { store }
    }

    /// Find the best rule for a raw user message.
    ///
    /// Without a current topic the contextual pass is skipped.
    pub fn find(&self, input: &str, context: Option<&str>) -> Option<&'a Rule> {
        let input = normalize(input);

        if let Some(topic) = context.map(normalize) {
            if let Some(rule) = self
                .store
                .iter()
                .find(|rule| rule.requires_context(&topic) && rule.pattern.accepts(&input))
            {
                debug!(rule_id = %rule.id, context = %topic, "Contextual rule matched");
                return Some(rule);
            }
        }

        let general = self.store.iter().find(|rule| {
            rule.is_general()
                && matches!(&rule.pattern, Pattern::Phrase(phrase) if input.contains(phrase.as_str()))
        });

        match general {
            Some(rule) => debug!(rule_id = %rule.id, "General rule matched"),
            None => debug!(context = ?context, "No rule matched"),
        }
        general
    }
}
