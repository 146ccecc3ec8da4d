//! CSV rule files: loading with per-row diagnostics, and export.
//!
//! A rule file has one header row naming the six columns in [`COLUMNS`] and one
//! rule per row. Loading never fails because of bad rows: each one is skipped
//! and reported as a [`Diagnostic`] on the resulting [`RuleStore`].

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use super::store::RuleStore;
use super::types::{COLUMNS, Rule, RuleRecord};
use crate::error::{RuleError, RuleLoadError};

/// An operator-visible problem found while loading rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The rule file does not exist; the table is empty.
    FileNotFound { path: String },
    /// The header row lacks required columns; no rows were read.
    MissingColumns { missing: Vec<String> },
    /// A row could not be parsed as a record.
    MalformedRow { line: u64, reason: String },
    /// A row has no `Rule_ID`.
    MissingId { line: u64 },
    /// A row reuses an id seen earlier in the file.
    DuplicateId { line: u64, id: String },
    /// A `*` pattern without `Context_Required`.
    WildcardWithoutContext { line: u64, id: String },
    /// A `GoTo_Rule_ID` that names no loaded rule. The rule is still loaded.
    DanglingGoto { id: String, target: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FileNotFound { path } => {
                write!(f, "rule file {} not found, no rules loaded", path)
            }
            Diagnostic::MissingColumns { missing } => {
                write!(f, "rule file is missing columns: {}", missing.join(", "))
            }
            Diagnostic::MalformedRow { line, reason } => {
                write!(f, "line {}: malformed row skipped ({})", line, reason)
            }
            Diagnostic::MissingId { line } => {
                write!(f, "line {}: row without Rule_ID skipped", line)
            }
            Diagnostic::DuplicateId { line, id } => {
                write!(f, "line {}: duplicate rule id {} skipped", line, id)
            }
            Diagnostic::WildcardWithoutContext { line, id } => write!(
                f,
                "line {}: rule {} uses '*' without Context_Required, skipped",
                line, id
            ),
            Diagnostic::DanglingGoto { id, target } => {
                write!(f, "rule {} jumps to unknown rule {}", id, target)
            }
        }
    }
}

/// Parse a rule table from CSV.
pub fn parse_rules<R: io::Read>(input: R) -> RuleStore {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut diagnostics = Vec::new();

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            diagnostics.push(Diagnostic::MalformedRow {
                line: 1,
                reason: e.to_string(),
            });
            return finish(Vec::new(), diagnostics);
        }
    };

    let missing: Vec<String> = COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        diagnostics.push(Diagnostic::MissingColumns { missing });
        return finish(Vec::new(), diagnostics);
    }

    let mut rules = Vec::new();
    let mut seen = HashSet::new();

    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                let fatal = e.is_io_error();
                diagnostics.push(Diagnostic::MalformedRow {
                    line,
                    reason: e.to_string(),
                });
                if fatal {
                    break;
                }
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let record: RuleRecord = match row.deserialize(Some(&headers)) {
            Ok(record) => record,
            Err(e) => {
                diagnostics.push(Diagnostic::MalformedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match Rule::from_record(&record) {
            Ok(rule) => {
                if !seen.insert(rule.id.clone()) {
                    diagnostics.push(Diagnostic::DuplicateId { line, id: rule.id });
                    continue;
                }
                rules.push(rule);
            }
            Err(RuleError::MissingId) => diagnostics.push(Diagnostic::MissingId { line }),
            Err(RuleError::WildcardWithoutContext { id }) => {
                diagnostics.push(Diagnostic::WildcardWithoutContext { line, id })
            }
        }
    }

    for rule in &rules {
        if let Some(target) = &rule.goto_rule_id {
            if !seen.contains(target) {
                diagnostics.push(Diagnostic::DanglingGoto {
                    id: rule.id.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    finish(rules, diagnostics)
}

fn finish(rules: Vec<Rule>, diagnostics: Vec<Diagnostic>) -> RuleStore {
    for diagnostic in &diagnostics {
        warn!(%diagnostic, "Rule table diagnostic");
    }
    if rules.is_empty() {
        warn!("No rules loaded; every message will go to the fallback responder");
    }
    RuleStore::from_rules(rules).with_diagnostics(diagnostics)
}

/// Load the rule file at `path`.
///
/// A missing file yields an empty store with a [`Diagnostic::FileNotFound`].
pub async fn load_rules(path: &Path) -> Result<RuleStore, RuleLoadError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(finish(
                Vec::new(),
                vec![Diagnostic::FileNotFound {
                    path: path.display().to_string(),
                }],
            ));
        }
        Err(source) => {
            return Err(RuleLoadError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let store = parse_rules(bytes.as_slice());
    info!(
        path = %path.display(),
        rules = store.len(),
        diagnostics = store.diagnostics().len(),
        "Loaded rule file"
    );
    Ok(store)
}

/// The rule file exactly as written: headers plus every data row, unvalidated.
///
/// Edits go through this instead of a [`RuleStore`] so rows the loader skips
/// (no id, `*` without context, duplicates, short rows) stay in the file.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: csv::ByteRecord,
    rows: Vec<csv::ByteRecord>,
}

impl RawTable {
    fn empty() -> Self {
        Self {
            headers: csv::ByteRecord::from(COLUMNS.to_vec()),
            rows: Vec::new(),
        }
    }

    /// Read a table from CSV without trimming or validating anything.
    ///
    /// Any of the six columns absent from the header row are appended to it.
    pub fn parse<R: io::Read>(input: R) -> Result<Self, RuleLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(input);

        let mut headers = reader.byte_headers()?.clone();
        if headers.is_empty() {
            return Ok(Self::empty());
        }
        for column in COLUMNS {
            if column_index(&headers, column).is_none() {
                headers.push_field(column.as_bytes());
            }
        }

        let rows = reader
            .byte_records()
            .collect::<Result<Vec<_>, csv::Error>>()?;
        Ok(Self { headers, rows })
    }

    /// Read the table at `path`; a missing file is an empty table.
    pub async fn read(path: &Path) -> Result<Self, RuleLoadError> {
        match fs::read(path).await {
            Ok(bytes) => Self::parse(bytes.as_slice()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::empty()),
            Err(source) => Err(RuleLoadError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row_id<'r>(&self, row: &'r csv::ByteRecord) -> Option<&'r str> {
        let index = column_index(&self.headers, "Rule_ID")?;
        let id = std::str::from_utf8(row.get(index)?).ok()?.trim();
        (!id.is_empty()).then_some(id)
    }

    /// Replace the first row with the record's id, or append the record.
    ///
    /// Returns `true` when an existing row was replaced. Columns outside
    /// [`COLUMNS`] keep their old value on replace and are left blank on
    /// append.
    pub fn upsert(&mut self, record: &RuleRecord) -> bool {
        let id = record.rule_id.trim();
        let position = self.rows.iter().position(|row| self.row_id(row) == Some(id));
        let previous = position.map(|i| &self.rows[i]);

        let mut row = csv::ByteRecord::new();
        for (index, header) in self.headers.iter().enumerate() {
            let name = std::str::from_utf8(header).unwrap_or_default().trim();
            match record.field(name) {
                Some(value) => row.push_field(value.as_bytes()),
                None => row.push_field(previous.and_then(|p| p.get(index)).unwrap_or_default()),
            }
        }

        match position {
            Some(i) => {
                self.rows[i] = row;
                true
            }
            None => {
                self.rows.push(row);
                false
            }
        }
    }

    /// Remove every row whose id is `id`. Returns how many were removed.
    pub fn remove(&mut self, id: &str) -> usize {
        let id = id.trim();
        let before = self.rows.len();
        let headers = &self.headers;
        self.rows.retain(|row| {
            let row_id = column_index(headers, "Rule_ID")
                .and_then(|index| row.get(index))
                .and_then(|field| std::str::from_utf8(field).ok())
                .map(str::trim);
            row_id != Some(id)
        });
        before - self.rows.len()
    }

    /// Serialize back to CSV, header row first.
    pub fn to_csv(&self) -> Result<Vec<u8>, RuleLoadError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_byte_record(&self.headers)?;
        for row in &self.rows {
            writer.write_byte_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| RuleLoadError::Csv(csv::Error::from(e.into_error())))
    }
}

fn column_index(headers: &csv::ByteRecord, column: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| std::str::from_utf8(h).is_ok_and(|h| h.trim() == column))
}

/// Write records as CSV, header first.
pub fn write_records<W: io::Write>(records: &[RuleRecord], output: W) -> Result<(), RuleLoadError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Export a store to CSV bytes.
pub fn export_rules(store: &RuleStore) -> Result<Vec<u8>, RuleLoadError> {
    let mut buf = Vec::new();
    write_records(&store.to_records(), &mut buf)?;
    Ok(buf)
}

/// Replace the file at `path` with `contents`.
///
/// Writes a sibling temp file and renames it over the target so a reader
/// never sees a half-written rule file.
pub async fn write_rule_file(path: &Path, contents: &[u8]) -> Result<(), RuleLoadError> {
    let write_err = |source| RuleLoadError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, contents).await.map_err(write_err)?;
    fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}
