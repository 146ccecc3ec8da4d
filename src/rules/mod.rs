//! Rule table: loading, matching, and GoTo chains.
//!
//! Every message flows through:
//! 1. `Matcher::find()`: contextual pass, then general pass
//! 2. `ChainRunner::run()`: apply the matched rule and follow GoTo links
//!
//! The table itself is an immutable `RuleStore`, replaced wholesale through
//! `SharedRules::publish()` whenever the rule file changes.

pub mod admin;
pub mod chain;
pub mod loader;
pub mod matcher;
pub mod store;
pub mod types;

pub use admin::RuleAdmin;
pub use chain::{ChainEnd, ChainOutcome, ChainRunner, MAX_GOTO_LOOPS};
pub use loader::{Diagnostic, RawTable, export_rules, load_rules, parse_rules};
pub use matcher::Matcher;
pub use store::{RuleStore, SharedRules};
pub use types::{ContextEffect, Pattern, Rule, RuleRecord};
