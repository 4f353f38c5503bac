//! Sheet models returned by the repository.
//!
//! Keep these structs focused on the data stored in the tables. Dispatch
//! rules live in higher layers.

use crate::model::Marker;
use serde::{Deserialize, Serialize};

/// The recipient table: a header row plus ordered body rows. Body row
/// positions are 0-based and change whenever the body is rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub header: Vec<String>,
    #[serde(default)]
    pub rows: Vec<SheetRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub cells: Vec<String>,
    #[serde(default = "cleared")]
    pub marker: Marker,
}

fn cleared() -> Marker {
    Marker::Cleared
}

impl SheetRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            marker: Marker::Cleared,
        }
    }

    /// Cell text, or "" past the end of a short row.
    pub fn cell(&self, col: usize) -> &str {
        self.cells.get(col).map(String::as_str).unwrap_or("")
    }

    pub fn set_cell(&mut self, col: usize, value: &str) {
        if self.cells.len() <= col {
            self.cells.resize(col + 1, String::new());
        }
        self.cells[col] = value.to_string();
    }
}

impl Sheet {
    /// Header cells trimmed and lowercased for column lookup.
    pub fn normalized_header(&self) -> Vec<String> {
        self.header
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect()
    }
}
