//! Bulk lead import payloads and report.

use serde::{Deserialize, Serialize};

use crate::models::lead::ImportRow;

fn default_check_duplicates() -> bool {
    true
}

/// Body of `POST /leads/import`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportLeadsRequest {
    pub rows: Vec<ImportRow>,
    #[serde(default = "default_check_duplicates")]
    pub check_duplicates: bool,
}

/// Query string of `POST /leads/import/csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportCsvQuery {
    #[serde(default = "default_check_duplicates")]
    pub check_duplicates: bool,
}

/// A row skipped because its phone already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRow {
    pub row: usize,
    pub phone: String,
}

/// A row skipped because it failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidRow {
    pub row: usize,
    pub reason: String,
}

/// Result of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: Vec<i64>,
    pub duplicates: Vec<DuplicateRow>,
    pub invalid: Vec<InvalidRow>,
}
