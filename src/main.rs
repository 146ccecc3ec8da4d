use std::path::Path;

use rulebot::channels::CliChannel;
use rulebot::config::{BotConfig, EmptyChainPolicy};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Log to stderr, and to a daily rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "rulebot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🤖 rulebot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Rules: {}", config.rules_path.display());
    eprintln!("   Max GoTo loops: {}", config.engine.max_goto_loops);
    match &config.engine.empty_chain {
        EmptyChainPolicy::Fallback => eprintln!("   Empty chains: fall back"),
        EmptyChainPolicy::Acknowledge(text) => eprintln!("   Empty chains: reply \"{}\"", text),
    }

    let (engine, admin) = rulebot::engine::bootstrap(&config).await?;
    match &config.llm {
        Some(llm) => eprintln!("   Fallback: {:?} ({})", llm.backend, llm.model),
        None => eprintln!("   Fallback: {} (no API key set)", engine.responder_name()),
    }

    let rules = engine.rules();
    eprintln!("   Loaded {} rules", rules.len());
    for diagnostic in rules.diagnostics() {
        eprintln!("   Warning: {}", diagnostic);
    }

    eprintln!("   Type a message and press Enter. /reload, /context, /quit.\n");

    CliChannel::new(engine).with_admin(admin).run().await?;

    Ok(())
}
