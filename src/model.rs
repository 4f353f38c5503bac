use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of a recipient row, stored verbatim in the status cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    Empty,
    Pending,
    /// Written by preview only; collapses back to `Empty` on the next run.
    Ready,
    /// Written by preview only when the recipient image is absent.
    MissingImage,
    Successful,
    Failed,
    Draft,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Empty => "",
            Status::Pending => "pending",
            Status::Ready => "ready",
            Status::MissingImage => "missing image",
            Status::Successful => "successful",
            Status::Failed => "failed",
            Status::Draft => "draft",
        }
    }

    /// Case-insensitive parse of a status cell. Unknown values yield `None`.
    pub fn parse_status(raw: &str) -> Option<Status> {
        match raw.trim().to_lowercase().as_str() {
            "" => Some(Status::Empty),
            "pending" => Some(Status::Pending),
            "ready" => Some(Status::Ready),
            "missing image" => Some(Status::MissingImage),
            "successful" => Some(Status::Successful),
            "failed" => Some(Status::Failed),
            "draft" => Some(Status::Draft),
            _ => None,
        }
    }

    pub fn marker(&self) -> Marker {
        match self {
            Status::Successful => Marker::Success,
            Status::Failed => Marker::Failed,
            Status::Draft => Marker::Attention,
            _ => Marker::Cleared,
        }
    }
}

/// A row may enter a batch only when its status cell is empty or pending.
pub fn is_eligible(raw_status: &str) -> bool {
    matches!(
        Status::parse_status(raw_status),
        Some(Status::Empty | Status::Pending)
    )
}

/// Rows that survive compaction: untouched, pending, or retryable.
pub fn is_retained(raw_status: &str) -> bool {
    matches!(
        Status::parse_status(raw_status),
        Some(Status::Empty | Status::Pending | Status::Failed)
    )
}

/// Visual marker attached to a status cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Marker {
    Success,
    Failed,
    Attention,
    Cleared,
}

impl Marker {
    pub fn color(&self) -> Option<&'static str> {
        match self {
            Marker::Success => Some("#b7e1cd"),
            Marker::Failed => Some("#f4c7c3"),
            Marker::Attention => Some("#fff2cc"),
            Marker::Cleared => None,
        }
    }

    pub fn from_color(color: Option<&str>) -> Marker {
        match color {
            Some("#b7e1cd") => Marker::Success,
            Some("#f4c7c3") => Marker::Failed,
            Some("#fff2cc") => Marker::Attention,
            _ => Marker::Cleared,
        }
    }
}

/// Which of the two templates a recipient receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Masculine,
    Feminine,
}

impl TemplateKind {
    /// Feminine when the lowercased gender starts with "nữ" or equals "nu".
    pub fn for_gender(gender: &str) -> TemplateKind {
        let g = gender.trim().to_lowercase();
        if g.starts_with("nữ") || g == "nu" {
            TemplateKind::Feminine
        } else {
            TemplateKind::Masculine
        }
    }
}

/// One recipient row as seen by the dispatcher. `row` is the 0-based body
/// position at selection time and is only valid until the next compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub row: usize,
    pub email: String,
    pub name: String,
    pub gender: String,
    pub academic_year: String,
}

/// Outcome of a single recipient within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub row: usize,
    pub name: String,
    pub email: String,
    pub status: Status,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub logged_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub archived_at: DateTime<Utc>,
    pub name: String,
    pub academic_year: String,
    pub gender: String,
    pub email: String,
    pub status: String,
    pub message: String,
}
