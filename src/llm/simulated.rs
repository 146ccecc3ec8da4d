//! Offline responder: echoes the message back with a fixed prefix.

use async_trait::async_trait;

use super::Responder;

/// Stand-in for a real model when no API key is configured.
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    prefix: String,
}

impl SimulatedResponder {
    pub fn new() -> Self {
        Self::with_prefix("Simulated response for:")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for SimulatedResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Responder for SimulatedResponder {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn respond(&self, input: &str) -> String {
        format!("{} {}", self.prefix, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_original_input() {
        let responder = SimulatedResponder::new();
        assert_eq!(
            responder.respond("Tell me a FUN fact").await,
            "Simulated response for: Tell me a FUN fact"
        );
    }

    #[tokio::test]
    async fn custom_prefix() {
        let responder = SimulatedResponder::with_prefix("AI:");
        assert_eq!(responder.respond("hi").await, "AI: hi");
    }
}
