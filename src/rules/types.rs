//! Shared types for the rule table.

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Raw `Set_Context_On_Response` value meaning "remove the topic".
pub const CLEAR_SENTINEL: &str = "clear";

/// Raw pattern value meaning "any input, given the required context".
pub const WILDCARD: &str = "*";

/// Normalize text the same way for rule fields and user input.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── Persisted record ────────────────────────────────────────────────

/// One persisted row of the rule table, exactly as stored in the CSV file.
///
/// Column order here is the column order written on export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(rename = "Rule_ID", default)]
    pub rule_id: String,
    #[serde(rename = "Context_Required", default)]
    pub context_required: String,
    #[serde(rename = "Pattern", default)]
    pub pattern: String,
    #[serde(rename = "Response", default)]
    pub response: String,
    #[serde(rename = "Set_Context_On_Response", default)]
    pub set_context_on_response: String,
    #[serde(rename = "GoTo_Rule_ID", default)]
    pub goto_rule_id: String,
}

impl RuleRecord {
    /// Value of the column named `column`, if it is one of [`COLUMNS`].
    pub fn field(&self, column: &str) -> Option<&str> {
        let value = match column {
            "Rule_ID" => &self.rule_id,
            "Context_Required" => &self.context_required,
            "Pattern" => &self.pattern,
            "Response" => &self.response,
            "Set_Context_On_Response" => &self.set_context_on_response,
            "GoTo_Rule_ID" => &self.goto_rule_id,
            _ => return None,
        };
        Some(value)
    }
}

/// Header names every rule file must carry.
pub const COLUMNS: [&str; 6] = [
    "Rule_ID",
    "Context_Required",
    "Pattern",
    "Response",
    "Set_Context_On_Response",
    "GoTo_Rule_ID",
];

// ── Pattern ─────────────────────────────────────────────────────────

/// What a rule matches against the normalized input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Empty pattern: reachable by context alone or through a GoTo.
    ChainOnly,
    /// `*`: any input. Only valid together with a required context.
    Wildcard,
    /// Substring match against the normalized input.
    Phrase(String),
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "" => Pattern::ChainOnly,
            WILDCARD => Pattern::Wildcard,
            phrase => Pattern::Phrase(phrase.to_string()),
        }
    }

    /// Whether this pattern accepts `input` (already normalized).
    pub fn accepts(&self, input: &str) -> bool {
        match self {
            Pattern::ChainOnly | Pattern::Wildcard => true,
            Pattern::Phrase(phrase) => input.contains(phrase.as_str()),
        }
    }

    fn as_raw(&self) -> &str {
        match self {
            Pattern::ChainOnly => "",
            Pattern::Wildcard => WILDCARD,
            Pattern::Phrase(phrase) => phrase,
        }
    }
}

// ── Context effect ──────────────────────────────────────────────────

/// What firing a rule does to the conversation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEffect {
    Unchanged,
    SetTo(String),
    Clear,
}

impl ContextEffect {
    fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "" => ContextEffect::Unchanged,
            CLEAR_SENTINEL => ContextEffect::Clear,
            topic => ContextEffect::SetTo(topic.to_string()),
        }
    }

    fn as_raw(&self) -> &str {
        match self {
            ContextEffect::Unchanged => "",
            ContextEffect::SetTo(topic) => topic,
            ContextEffect::Clear => CLEAR_SENTINEL,
        }
    }
}

// ── Rule ────────────────────────────────────────────────────────────

/// A validated, normalized rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    /// Topic this rule requires; `None` makes it a general rule.
    pub context_required: Option<String>,
    pub pattern: Pattern,
    /// May be empty for rules that only set context or jump.
    pub response: String,
    pub context_effect: ContextEffect,
    /// Next rule to run in the same turn. May name a rule that does not exist.
    pub goto_rule_id: Option<String>,
}

impl Rule {
    /// Validate and normalize a persisted record.
    pub fn from_record(record: &RuleRecord) -> Result<Self, RuleError> {
        let id = non_empty(&record.rule_id).ok_or(RuleError::MissingId)?;
        let context_required = non_empty(&record.context_required).map(|c| c.to_lowercase());
        let pattern = Pattern::parse(&record.pattern);

        if pattern == Pattern::Wildcard && context_required.is_none() {
            return Err(RuleError::WildcardWithoutContext { id });
        }

        Ok(Self {
            id,
            context_required,
            pattern,
            response: record.response.trim().to_string(),
            context_effect: ContextEffect::parse(&record.set_context_on_response),
            goto_rule_id: non_empty(&record.goto_rule_id),
        })
    }

    /// Convert back to the persisted shape.
    pub fn to_record(&self) -> RuleRecord {
        RuleRecord {
            rule_id: self.id.clone(),
            context_required: self.context_required.clone().unwrap_or_default(),
            pattern: self.pattern.as_raw().to_string(),
            response: self.response.clone(),
            set_context_on_response: self.context_effect.as_raw().to_string(),
            goto_rule_id: self.goto_rule_id.clone().unwrap_or_default(),
        }
    }

    /// A general rule has no context requirement.
    pub fn is_general(&self) -> bool {
        self.context_required.is_none()
    }

    /// Whether this rule requires exactly `topic`, which must already be
    /// [`normalize`]d.
    pub fn requires_context(&self, topic: &str) -> bool {
        self.context_required.as_deref() == Some(topic)
    }
}
