//! CLI channel: stdin/stdout REPL for local chatting.
//!
//! Commands:
//! - `/quit`: exit
//! - `/reload`: re-read the rule file and publish it
//! - `/context`: show the current topic
//!
//! Saying `bye` exits after the reply has been printed.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::context::ConversationContext;
use crate::engine::Engine;
use crate::rules::RuleAdmin;
use crate::rules::types::normalize;

const PROMPT: &str = "> ";

/// A single local conversation over stdin/stdout.
pub struct CliChannel {
    engine: Arc<Engine>,
    admin: Option<Arc<RuleAdmin>>,
}

impl CliChannel {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            admin: None,
        }
    }

    /// Enable `/reload`.
    pub fn with_admin(mut self, admin: Arc<RuleAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Chat over the process's stdin and stdout until EOF or exit.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.run_with(stdin, &mut stdout).await
    }

    /// Chat over any line reader and writer.
    pub async fn run_with<R, W>(&self, reader: R, writer: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut context = ConversationContext::new();
        let mut lines = reader.lines();

        writer.write_all(PROMPT.as_bytes()).await?;
        writer.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                writer.write_all(PROMPT.as_bytes()).await?;
                writer.flush().await?;
                continue;
            }

            let command = normalize(line);
            let output = match command.as_str() {
                "/quit" => break,
                "/context" => format!("Context: {}", context.get().unwrap_or("(none)")),
                "/reload" => self.reload().await,
                _ => self.engine.handle(line, &mut context).await,
            };

            writer.write_all(format!("{}\n", output).as_bytes()).await?;

            if command == "bye" {
                break;
            }

            writer.write_all(PROMPT.as_bytes()).await?;
            writer.flush().await?;
        }

        writer.flush().await?;
        Ok(())
    }

    async fn reload(&self) -> String {
        let Some(admin) = &self.admin else {
            return "Reload is not available.".to_string();
        };
        match admin.reload().await {
            Ok(store) => {
                let mut summary = format!("Reloaded {} rules.", store.len());
                for diagnostic in store.diagnostics() {
                    summary.push_str(&format!("\n  warning: {}", diagnostic));
                }
                summary
            }
            Err(e) => {
                tracing::error!("Rule reload failed: {}", e);
                format!("Reload failed: {}", e)
            }
        }
    }
}
