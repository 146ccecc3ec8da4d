//! Responder backed by a rig-core agent.

use async_trait::async_trait;
use rig::completion::Prompt;
use tracing::{debug, warn};

use super::Responder;

/// Wraps any rig prompt target (usually an `Agent`) as a [`Responder`].
pub struct RigResponder<A> {
    agent: A,
    provider: String,
    model: String,
    apology: String,
}

impl<A> RigResponder<A> {
    pub fn new(agent: A, provider: &str, model: &str, apology: &str) -> Self {
        Self {
            agent,
            provider: provider.to_string(),
            model: model.to_string(),
            apology: apology.to_string(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl<A> Responder for RigResponder<A>
where
    A: Prompt + Send + Sync,
{
    fn name(&self) -> &str {
        &self.provider
    }

    async fn respond(&self, input: &str) -> String {
        debug!(provider = %self.provider, model = %self.model, "Calling fallback model");
        match self.agent.prompt(input).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(provider = %self.provider, "Fallback model returned an empty reply");
                self.apology.clone()
            }
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "Fallback model request failed");
                self.apology.clone()
            }
        }
    }
}
