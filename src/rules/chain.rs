//! GoTo chains: running a matched rule and the rules it jumps to.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::store::RuleStore;
use super::types::{ContextEffect, Rule};
use crate::context::ConversationContext;

/// Default cap on rules applied in one turn.
pub const MAX_GOTO_LOOPS: usize = 5;

/// Why a chain stopped. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEnd {
    /// The last rule had no GoTo.
    Completed,
    /// The loop cap was reached.
    LoopLimit,
    /// A GoTo pointed back at a rule already applied in this chain.
    Cycle { target: String },
    /// A GoTo named a rule that is not in the store.
    DanglingGoto { target: String },
}

/// Result of running a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    /// Non-empty responses in the order they were produced.
    pub fragments: Vec<String>,
    /// Ids of the rules applied, in order.
    pub rule_ids: Vec<String>,
    pub end: ChainEnd,
}

/// Applies a matched rule and follows its GoTo links.
#[derive(Debug, Clone, Copy)]
pub struct ChainRunner {
    max_goto_loops: usize,
}

impl ChainRunner {
    /// `max_goto_loops` is clamped to at least 1 so the matched rule always runs.
    pub fn new(max_goto_loops: usize) -> Self {
        Self {
            max_goto_loops: max_goto_loops.max(1),
        }
    }

    pub fn max_goto_loops(&self) -> usize {
        self.max_goto_loops
    }

    /// Run the chain starting at `initial`, mutating `context` as rules fire.
    pub fn run(
        &self,
        initial: &Rule,
        context: &mut ConversationContext,
        store: &RuleStore,
    ) -> ChainOutcome {
        let mut fragments = Vec::new();
        let mut rule_ids = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = initial;
        let mut loops = 0;

        let end = loop {
            visited.insert(current.id.as_str());
            rule_ids.push(current.id.clone());

            if !current.response.is_empty() {
                fragments.push(current.response.clone());
            }

            match &current.context_effect {
                ContextEffect::Unchanged => {}
                ContextEffect::SetTo(topic) => context.set(topic.as_str()),
                ContextEffect::Clear => context.clear(),
            }

            loops += 1;
            let Some(target) = current.goto_rule_id.as_deref() else {
                break ChainEnd::Completed;
            };

            if loops >= self.max_goto_loops {
                warn!(
                    rule_id = %current.id,
                    max = self.max_goto_loops,
                    "GoTo chain hit the loop limit"
                );
                break ChainEnd::LoopLimit;
            }

            if visited.contains(target) {
                warn!(rule_id = %current.id, goto = %target, "GoTo cycle detected, stopping chain");
                break ChainEnd::Cycle {
                    target: target.to_string(),
                };
            }

            match store.get(target) {
                Some(next) => {
                    debug!(from = %current.id, to = %next.id, "Following GoTo");
                    current = next;
                }
                None => {
                    warn!(rule_id = %current.id, goto = %target, "GoTo names an unknown rule");
                    break ChainEnd::DanglingGoto {
                        target: target.to_string(),
                    };
                }
            }
        };

        debug!(
            rules = ?rule_ids,
            fragments = fragments.len(),
            end = ?end,
            context = ?context.get(),
            "Chain finished"
        );

        ChainOutcome {
            fragments,
            rule_ids,
            end,
        }
    }
}

impl Default for ChainRunner {
    fn default() -> Self {
        Self::new(MAX_GOTO_LOOPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::Pattern;

    fn rule(id: &str, response: &str, effect: ContextEffect, goto: Option<&str>) -> Rule {
        Rule {
            id: id.into(),
            context_required: None,
            pattern: Pattern::ChainOnly,
            response: response.into(),
            context_effect: effect,
            goto_rule_id: goto.map(String::from),
        }
    }

    fn run(store: &RuleStore, start: &str, ctx: &mut ConversationContext) -> ChainOutcome {
        let initial = store.get(start).unwrap();
        ChainRunner::default().run(initial, ctx, store)
    }

    #[test]
    fn single_rule_sets_context() {
        let store = RuleStore::from_rules(vec![rule(
            "1",
            "Hi!",
            ContextEffect::SetTo("greeted".into()),
            None,
        )]);
        let mut ctx = ConversationContext::new();
        let out = run(&store, "1", &mut ctx);

        assert_eq!(out.fragments, ["Hi!"]);
        assert_eq!(out.end, ChainEnd::Completed);
        assert_eq!(ctx.get(), Some("greeted"));
    }

    #[test]
    fn follows_goto_and_clears() {
        let store = RuleStore::from_rules(vec![
            rule("2", "Why did...", ContextEffect::Unchanged, Some("3")),
            rule("3", "...the chicken!", ContextEffect::Clear, None),
        ]);
        let mut ctx = ConversationContext::with_topic("greeted");
        let out = run(&store, "2", &mut ctx);

        assert_eq!(out.fragments, ["Why did...", "...the chicken!"]);
        assert_eq!(out.rule_ids, ["2", "3"]);
        assert_eq!(ctx.get(), None);
    }

    #[test]
    fn empty_responses_are_not_fragments() {
        let store = RuleStore::from_rules(vec![
            rule("a", "", ContextEffect::SetTo("x".into()), Some("b")),
            rule("b", "done", ContextEffect::Unchanged, None),
        ]);
        let mut ctx = ConversationContext::new();
        let out = run(&store, "a", &mut ctx);
        assert_eq!(out.fragments, ["done"]);
        assert_eq!(ctx.get(), Some("x"));
    }

    #[test]
    fn two_rule_cycle_terminates() {
        let store = RuleStore::from_rules(vec![
            rule("A", "", ContextEffect::Unchanged, Some("B")),
            rule("B", "", ContextEffect::Unchanged, Some("A")),
        ]);
        let mut ctx = ConversationContext::new();
        let out = run(&store, "A", &mut ctx);

        assert!(out.fragments.is_empty());
        assert_eq!(out.rule_ids, ["A", "B"]);
        assert_eq!(out.end, ChainEnd::Cycle { target: "A".into() });
    }

    #[test]
    fn self_loop_terminates() {
        let store = RuleStore::from_rules(vec![rule("s", "again", ContextEffect::Unchanged, Some("s"))]);
        let mut ctx = ConversationContext::new();
        let out = run(&store, "s", &mut ctx);
        assert_eq!(out.fragments, ["again"]);
        assert!(matches!(out.end, ChainEnd::Cycle { .. }));
    }

    #[test]
    fn long_chain_stops_at_loop_limit() {
        let rules = (0..10)
            .map(|i| {
                let next = format!("{}", i + 1);
                rule(&i.to_string(), &format!("step {i}"), ContextEffect::Unchanged, Some(next.as_str()))
            })
            .collect();
        let store = RuleStore::from_rules(rules);
        let mut ctx = ConversationContext::new();
        let out = run(&store, "0", &mut ctx);

        assert_eq!(out.rule_ids.len(), MAX_GOTO_LOOPS);
        assert_eq!(out.fragments.len(), MAX_GOTO_LOOPS);
        assert_eq!(out.end, ChainEnd::LoopLimit);
    }

    #[test]
    fn custom_limit_respected() {
        let store = RuleStore::from_rules(vec![
            rule("a", "1", ContextEffect::Unchanged, Some("b")),
            rule("b", "2", ContextEffect::Unchanged, Some("c")),
            rule("c", "3", ContextEffect::Unchanged, None),
        ]);
        let mut ctx = ConversationContext::new();
        let out = ChainRunner::new(2).run(store.get("a").unwrap(), &mut ctx, &store);
        assert_eq!(out.fragments, ["1", "2"]);
        assert_eq!(out.end, ChainEnd::LoopLimit);
    }

    #[test]
    fn last_rule_without_goto_completes_at_the_limit() {
        let store = RuleStore::from_rules(vec![
            rule("a", "1", ContextEffect::Unchanged, Some("b")),
            rule("b", "2", ContextEffect::Unchanged, None),
        ]);
        let mut ctx = ConversationContext::new();

        let out = ChainRunner::new(1).run(store.get("b").unwrap(), &mut ctx, &store);
        assert_eq!(out.fragments, ["2"]);
        assert_eq!(out.end, ChainEnd::Completed);

        let out = ChainRunner::new(2).run(store.get("a").unwrap(), &mut ctx, &store);
        assert_eq!(out.fragments, ["1", "2"]);
        assert_eq!(out.end, ChainEnd::Completed);
    }

    #[test]
    fn zero_limit_still_runs_matched_rule() {
        let runner = ChainRunner::new(0);
        assert_eq!(runner.max_goto_loops(), 1);
    }

    #[test]
    fn dangling_goto_keeps_accumulated_output() {
        let store = RuleStore::from_rules(vec![rule(
            "1",
            "partial",
            ContextEffect::SetTo("t".into()),
            Some("ghost"),
        )]);
        let mut ctx = ConversationContext::new();
        let out = run(&store, "1", &mut ctx);

        assert_eq!(out.fragments, ["partial"]);
        assert_eq!(out.end, ChainEnd::DanglingGoto { target: "ghost".into() });
        assert_eq!(ctx.get(), Some("t"));
    }
}
