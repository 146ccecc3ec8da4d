//! rulebot: a context-aware rule chatbot with an LLM fallback.

pub mod channels;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod llm;
pub mod rules;
