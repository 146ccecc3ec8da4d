//! File-backed rule administration: edit, upload, delete, reload.
//!
//! Every operation rewrites the rule file, reloads it through the loader and
//! publishes the result before returning, so the next turn already sees it.
//! Invalid edits are rejected before anything touches disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::loader::{self, Diagnostic, RawTable};
use super::store::{RuleStore, SharedRules};
use super::types::{Rule, RuleRecord};
use crate::error::AdminError;

/// Owns the rule file and the handle the engine reads rules from.
pub struct RuleAdmin {
    path: PathBuf,
    rules: SharedRules,
    /// Serializes read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl RuleAdmin {
    pub fn new(path: impl Into<PathBuf>, rules: SharedRules) -> Self {
        Self {
            path: path.into(),
            rules,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records of the rule set currently in effect, in table order.
    pub fn list(&self) -> Vec<RuleRecord> {
        self.rules.snapshot().to_records()
    }

    /// Re-read the rule file and publish it.
    pub async fn reload(&self) -> Result<Arc<RuleStore>, AdminError> {
        let _guard = self.write_lock.lock().await;
        self.reload_locked().await
    }

    /// Add a rule, or replace the rule with the same id in place.
    ///
    /// Other rows in the file, including ones the loader skips, are kept
    /// as written.
    pub async fn upsert(&self, record: RuleRecord) -> Result<Arc<RuleStore>, AdminError> {
        let rule = Rule::from_record(&record)?;

        let _guard = self.write_lock.lock().await;
        let mut table = RawTable::read(&self.path).await?;

        if table.upsert(&rule.to_record()) {
            info!(rule_id = %rule.id, "Updating rule");
        } else {
            info!(rule_id = %rule.id, "Adding rule");
        }

        self.persist_locked(&table).await
    }

    /// Remove every row with `id` from the file.
    pub async fn delete(&self, id: &str) -> Result<Arc<RuleStore>, AdminError> {
        let id = id.trim();
        let _guard = self.write_lock.lock().await;
        let mut table = RawTable::read(&self.path).await?;

        if table.remove(id) == 0 {
            return Err(AdminError::NotFound { id: id.to_string() });
        }

        info!(rule_id = %id, remaining = table.len(), "Deleting rule");
        self.persist_locked(&table).await
    }

    /// Replace the whole rule file with an uploaded one.
    ///
    /// The upload must carry all six columns; bad rows inside it are
    /// tolerated the same way as on a normal load.
    pub async fn replace_from_upload(&self, contents: &[u8]) -> Result<Arc<RuleStore>, AdminError> {
        let parsed = loader::parse_rules(contents);
        if let Some(problem) = parsed
            .diagnostics()
            .iter()
            .find(|d| matches!(d, Diagnostic::MissingColumns { .. }))
        {
            return Err(AdminError::RejectedUpload {
                reason: problem.to_string(),
            });
        }

        let _guard = self.write_lock.lock().await;
        info!(
            path = %self.path.display(),
            rules = parsed.len(),
            "Replacing rule file from upload"
        );
        loader::write_rule_file(&self.path, contents).await?;
        self.reload_locked().await
    }

    async fn persist_locked(&self, table: &RawTable) -> Result<Arc<RuleStore>, AdminError> {
        loader::write_rule_file(&self.path, &table.to_csv()?).await?;
        self.reload_locked().await
    }

    async fn reload_locked(&self) -> Result<Arc<RuleStore>, AdminError> {
        let store = loader::load_rules(&self.path).await?;
        self.rules.publish(store);
        Ok(self.rules.snapshot())
    }
}
