//! Channels that carry user messages to the engine.

pub mod cli;

pub use cli::CliChannel;
