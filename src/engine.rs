//! Per-turn entry point: rules first, fallback responder second.
//!
//! A turn runs against one snapshot of the rule set, so a reload published
//! mid-turn is only seen by the next turn. Whenever the responder is called
//! the conversation context is cleared first, so a slow or failing provider
//! never leaves a stale topic behind.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{BotConfig, EmptyChainPolicy, EngineConfig};
use crate::context::ConversationContext;
use crate::error::Result;
use crate::llm::{Responder, SimulatedResponder, create_responder};
use crate::rules::{ChainEnd, ChainRunner, Matcher, RuleAdmin, RuleStore, SharedRules, load_rules};

/// Why a turn went to the fallback responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    NoMatch,
    EmptyChain,
}

/// Where a reply came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    /// Rule responses, from the rules applied in order.
    Rules { rule_ids: Vec<String>, end: ChainEnd },
    /// A matched chain produced no text and the acknowledgement was used.
    Acknowledged { rule_ids: Vec<String> },
    Fallback { reason: FallbackReason },
}

/// Text to display plus how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

/// Rule chatbot engine. Construct one per application and share it.
pub struct Engine {
    rules: SharedRules,
    runner: ChainRunner,
    empty_chain: EmptyChainPolicy,
    responder: Arc<dyn Responder>,
}

impl Engine {
    pub fn new(rules: SharedRules, responder: Arc<dyn Responder>, config: EngineConfig) -> Self {
        Self {
            rules,
            runner: ChainRunner::new(config.max_goto_loops),
            empty_chain: config.empty_chain,
            responder,
        }
    }

    /// Engine over a fixed store with default settings.
    pub fn with_store(store: RuleStore, responder: Arc<dyn Responder>) -> Self {
        Self::new(SharedRules::new(store), responder, EngineConfig::default())
    }

    /// Name of the fallback responder, for logs and banners.
    pub fn responder_name(&self) -> &str {
        self.responder.name()
    }

    /// Handle for reloading rules from elsewhere (e.g. [`crate::rules::RuleAdmin`]).
    pub fn shared_rules(&self) -> SharedRules {
        self.rules.clone()
    }

    /// The rule set currently in effect.
    pub fn rules(&self) -> Arc<RuleStore> {
        self.rules.snapshot()
    }

    /// Swap in a new rule set. Turns already in flight keep the old one.
    pub fn publish(&self, store: RuleStore) {
        self.rules.publish(store);
    }

    /// Reply to one user message, updating `context` in place.
    pub async fn handle(&self, input: &str, context: &mut ConversationContext) -> String {
        self.handle_turn(input, context).await.text
    }

    /// Like [`Engine::handle`], also reporting where the reply came from.
    pub async fn handle_turn(&self, input: &str, context: &mut ConversationContext) -> Reply {
        let store = self.rules.snapshot();

        let outcome = {
            let Some(rule) = Matcher::new(&store).find(input, context.get()) else {
                return self.fall_back(input, context, FallbackReason::NoMatch).await;
            };
            self.runner.run(rule, context, &store)
        };

        if !outcome.fragments.is_empty() {
            return Reply {
                text: outcome.fragments.join("\n"),
                source: ReplySource::Rules {
                    rule_ids: outcome.rule_ids,
                    end: outcome.end,
                },
            };
        }

        match &self.empty_chain {
            EmptyChainPolicy::Fallback => {
                self.fall_back(input, context, FallbackReason::EmptyChain)
                    .await
            }
            EmptyChainPolicy::Acknowledge(text) => {
                debug!(rules = ?outcome.rule_ids, "Chain produced no text, acknowledging");
                Reply {
                    text: text.clone(),
                    source: ReplySource::Acknowledged {
                        rule_ids: outcome.rule_ids,
                    },
                }
            }
        }
    }

    async fn fall_back(
        &self,
        input: &str,
        context: &mut ConversationContext,
        reason: FallbackReason,
    ) -> Reply {
        context.clear();
        info!(
            responder = self.responder.name(),
            reason = ?reason,
            "Falling back to responder"
        );
        let text = self.responder.respond(input).await;
        Reply {
            text,
            source: ReplySource::Fallback { reason },
        }
    }
}

/// Build the engine and its rule admin from process configuration.
///
/// Loads the rule file once and picks the LLM responder when an API key is
/// configured, the simulated one otherwise.
pub async fn bootstrap(config: &BotConfig) -> Result<(Arc<Engine>, Arc<RuleAdmin>)> {
    let responder: Arc<dyn Responder> = match &config.llm {
        Some(llm) => create_responder(llm)?,
        None => Arc::new(SimulatedResponder::new()),
    };

    let rules = SharedRules::new(load_rules(&config.rules_path).await?);
    let engine = Arc::new(Engine::new(rules.clone(), responder, config.engine.clone()));
    let admin = Arc::new(RuleAdmin::new(&config.rules_path, rules));

    info!(
        rules = engine.rules().len(),
        responder = engine.responder_name(),
        "Engine ready"
    );
    Ok((engine, admin))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::rules::parse_rules;

    /// Records every input it is asked about.
    #[derive(Default)]
    struct RecordingResponder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        fn name(&self) -> &str {
            "recording"
        }

        async fn respond(&self, input: &str) -> String {
            self.calls.lock().unwrap().push(input.to_string());
            format!("fallback: {input}")
        }
    }

    const HEADER: &str =
        "Rule_ID,Context_Required,Pattern,Response,Set_Context_On_Response,GoTo_Rule_ID\n";

    fn engine(body: &str, config: EngineConfig) -> (Engine, Arc<RecordingResponder>) {
        let responder = Arc::new(RecordingResponder::default());
        let store = parse_rules(format!("{HEADER}{body}").as_bytes());
        let engine = Engine::new(SharedRules::new(store), responder.clone(), config);
        (engine, responder)
    }

    const JOKE_RULES: &str = "1,,hello,Hi!,greeted,\n\
                              2,greeted,joke,Why did...,,3\n\
                              3,,,...the chicken!,clear,\n";

    #[tokio::test]
    async fn greeting_sets_context() {
        let (engine, responder) = engine(JOKE_RULES, EngineConfig::default());
        let mut ctx = ConversationContext::new();

        assert_eq!(engine.handle("hello", &mut ctx).await, "Hi!");
        assert_eq!(ctx.get(), Some("greeted"));
        assert!(responder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn joke_chain_over_two_turns() {
        let (engine, _) = engine(JOKE_RULES, EngineConfig::default());
        let mut ctx = ConversationContext::new();

        engine.handle("hello", &mut ctx).await;
        let reply = engine.handle_turn("tell me a joke", &mut ctx).await;

        assert_eq!(reply.text, "Why did...\n...the chicken!");
        assert_eq!(
            reply.source,
            ReplySource::Rules {
                rule_ids: vec!["2".into(), "3".into()],
                end: ChainEnd::Completed,
            }
        );
        assert_eq!(ctx.get(), None);
    }

    #[tokio::test]
    async fn no_match_calls_responder_with_original_text() {
        let (engine, responder) = engine(JOKE_RULES, EngineConfig::default());
        let mut ctx = ConversationContext::with_topic("greeted");

        let reply = engine.handle_turn("  What's The Weather?", &mut ctx).await;

        assert_eq!(reply.text, "fallback:   What's The Weather?");
        assert_eq!(
            reply.source,
            ReplySource::Fallback {
                reason: FallbackReason::NoMatch
            }
        );
        assert_eq!(ctx.get(), None);
        assert_eq!(
            *responder.calls.lock().unwrap(),
            ["  What's The Weather?".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_cycle_falls_back_by_default() {
        let (engine, responder) = engine("A,,x,,,B\nB,,,,,A\n", EngineConfig::default());
        let mut ctx = ConversationContext::with_topic("stale");

        let reply = engine.handle_turn("x", &mut ctx).await;

        assert_eq!(
            reply.source,
            ReplySource::Fallback {
                reason: FallbackReason::EmptyChain
            }
        );
        assert_eq!(ctx.get(), None);
        assert_eq!(responder.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_chain_can_acknowledge_instead() {
        let config = EngineConfig {
            empty_chain: EmptyChainPolicy::Acknowledge("Okay.".into()),
            ..EngineConfig::default()
        };
        let (engine, responder) = engine("menu,,menu,,ordering,\n", config);
        let mut ctx = ConversationContext::new();

        let reply = engine.handle_turn("show me the menu", &mut ctx).await;

        assert_eq!(reply.text, "Okay.");
        assert_eq!(ctx.get(), Some("ordering"));
        assert!(responder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_store_always_falls_back() {
        let (engine, responder) = engine("", EngineConfig::default());
        let mut ctx = ConversationContext::with_topic("anything");

        assert_eq!(engine.handle("hi", &mut ctx).await, "fallback: hi");
        assert!(ctx.is_empty());
        assert_eq!(responder.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publish_changes_next_turn() {
        let (engine, _) = engine("1,,ping,pong,,\n", EngineConfig::default());
        let mut ctx = ConversationContext::new();
        assert_eq!(engine.handle("ping", &mut ctx).await, "pong");

        engine.publish(parse_rules(format!("{HEADER}1,,ping,PONG v2,,\n").as_bytes()));
        assert_eq!(engine.handle("ping", &mut ctx).await, "PONG v2");
    }

    #[tokio::test]
    async fn partial_chain_output_is_kept_on_dangling_goto() {
        let (engine, responder) = engine("1,,start,Part one,topic,ghost\n", EngineConfig::default());
        let mut ctx = ConversationContext::new();

        let reply = engine.handle_turn("start", &mut ctx).await;

        assert_eq!(reply.text, "Part one");
        assert!(matches!(
            reply.source,
            ReplySource::Rules { end: ChainEnd::DanglingGoto { .. }, .. }
        ));
        assert_eq!(ctx.get(), Some("topic"));
        assert!(responder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_wires_admin_to_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.csv");
        tokio::fs::write(&path, format!("{HEADER}1,,ping,pong,,\n"))
            .await
            .unwrap();
        let config = BotConfig {
            rules_path: path.clone(),
            ..BotConfig::default()
        };

        let (engine, admin) = bootstrap(&config).await.unwrap();
        assert_eq!(engine.responder_name(), "simulated");
        assert_eq!(engine.rules().len(), 1);

        tokio::fs::write(&path, format!("{HEADER}1,,ping,pong,,\n2,,pang,pung,,\n"))
            .await
            .unwrap();
        admin.reload().await.unwrap();
        assert_eq!(engine.rules().len(), 2);
    }
}
