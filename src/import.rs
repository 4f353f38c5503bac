//! Recipient import from a YAML sheet export.
use crate::columns::{Columns, MissingColumns};
use crate::db::{Sheet, SheetRow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashSet;
use tracing::{info, warn};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$").unwrap());

/// Raw import document: a header row and loosely typed body rows.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportFile {
    pub header: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// A rejected row. `line` is the 1-based sheet line (header is line 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportIssue {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub sheet: Sheet,
    pub issues: Vec<ImportIssue>,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Build a clean sheet from an import file. A missing status column is
/// appended; rows with empty required cells, malformed or repeated emails
/// are skipped and reported.
pub fn validate(file: &ImportFile) -> Result<ImportOutcome, MissingColumns> {
    let mut header: Vec<String> = file.header.iter().map(|h| h.trim().to_string()).collect();
    if !header.iter().any(|h| h.eq_ignore_ascii_case("status")) {
        header.push("status".to_string());
    }
    let probe = Sheet {
        header,
        rows: Vec::new(),
    };
    let cols = Columns::for_dispatch(&probe)?;
    let width = probe.header.len();
    let required: Vec<(&str, usize)> = [
        ("email", cols.email),
        ("name", cols.name),
        ("gender", cols.gender),
    ]
    .into_iter()
    .chain(cols.academic_year.map(|c| ("academic_year", c)))
    .collect();

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut issues = Vec::new();
    for (idx, raw) in file.rows.iter().enumerate() {
        let line = idx + 2;
        if raw.len() > width {
            issues.push(ImportIssue {
                line,
                reason: format!("{} cells but the header has {} columns", raw.len(), width),
            });
            continue;
        }
        let mut cells: Vec<String> = raw.iter().map(cell_text).collect();
        cells.resize(width, String::new());
        let row = SheetRow::new(cells);

        let empty: Vec<&str> = required
            .iter()
            .filter(|(_, c)| row.cell(*c).is_empty())
            .map(|(k, _)| *k)
            .collect();
        if !empty.is_empty() {
            issues.push(ImportIssue {
                line,
                reason: format!("missing value(s): {}", empty.join(", ")),
            });
            continue;
        }

        let email = row.cell(cols.email);
        if !is_valid_email(email) {
            issues.push(ImportIssue {
                line,
                reason: format!("invalid email: {}", email),
            });
            continue;
        }
        if !seen.insert(email.to_lowercase()) {
            issues.push(ImportIssue {
                line,
                reason: format!("duplicate email: {}", email),
            });
            continue;
        }
        rows.push(row);
    }

    for issue in &issues {
        warn!(line = issue.line, reason = %issue.reason, "import row skipped");
    }
    info!(accepted = rows.len(), skipped = issues.len(), "import validated");
    Ok(ImportOutcome {
        sheet: Sheet {
            header: probe.header,
            rows,
        },
        issues,
    })
}
