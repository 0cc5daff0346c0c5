//! Bulk lead import (JSON and CSV) and CSV export.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use domain::models::import::{ImportReport, InvalidRow};
use domain::models::lead::{ImportRow, NewLead};
use domain::models::{Actor, Lead};
use domain::services::import::{candidate_phones, plan_import};
use domain::LeadError;
use persistence::repositories::{CompanyRepository, LeadRepository};

use crate::middleware::metrics::record_leads_imported;

/// Columns an import CSV must carry, in order.
pub const CSV_HEADERS: [&str; 6] = ["name", "phone", "platform", "company_id", "quality", "notes"];

/// Largest batch accepted in one call.
pub const MAX_IMPORT_ROWS: usize = 5_000;

/// Rows read from a CSV body.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub rows: Vec<ImportRow>,
    /// Source row index of each entry in `rows`.
    pub positions: Vec<usize>,
    /// Rows that could not be read at all.
    pub invalid: Vec<InvalidRow>,
}

/// Reads an import CSV. Headers must match [`CSV_HEADERS`] exactly.
pub fn parse_csv(body: &[u8]) -> Result<ParsedCsv, LeadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| LeadError::Validation(format!("Unreadable CSV header: {}", e)))?;
    if headers.iter().ne(CSV_HEADERS.iter().copied()) {
        return Err(LeadError::Validation(format!(
            "CSV headers must be exactly: {}",
            CSV_HEADERS.join(",")
        )));
    }

    let mut parsed = ParsedCsv::default();
    for (index, record) in reader.deserialize::<ImportRow>().enumerate() {
        match record {
            Ok(row) => {
                parsed.rows.push(row);
                parsed.positions.push(index);
            }
            Err(e) => parsed.invalid.push(InvalidRow {
                row: index,
                reason: match e.kind() {
                    csv::ErrorKind::Deserialize { err, .. } => err.to_string(),
                    _ => e.to_string(),
                },
            }),
        }
    }
    Ok(parsed)
}

#[derive(Serialize)]
struct ExportRow<'a> {
    id: i64,
    name: &'a str,
    phone: &'a str,
    platform: &'static str,
    quality: i32,
    notes: &'a str,
    company_id: Option<i64>,
    user_id: Option<i64>,
    status: &'static str,
    temp_status: &'static str,
    entered_at: DateTime<Utc>,
    company_assigned_at: Option<DateTime<Utc>>,
    agent_assigned_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Lead> for ExportRow<'a> {
    fn from(lead: &'a Lead) -> Self {
        Self {
            id: lead.id,
            name: &lead.name,
            phone: &lead.phone,
            platform: lead.platform.as_str(),
            quality: lead.quality,
            notes: lead.notes.as_deref().unwrap_or(""),
            company_id: lead.company_id,
            user_id: lead.user_id,
            status: lead.status.as_str(),
            temp_status: lead.temp_status.as_str(),
            entered_at: lead.entered_at,
            company_assigned_at: lead.company_assigned_at,
            agent_assigned_at: lead.agent_assigned_at,
        }
    }
}

/// Renders leads as CSV with a header row.
pub fn write_export(leads: &[Lead]) -> Result<Vec<u8>, LeadError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if leads.is_empty() {
        writer
            .write_record([
                "id",
                "name",
                "phone",
                "platform",
                "quality",
                "notes",
                "company_id",
                "user_id",
                "status",
                "temp_status",
                "entered_at",
                "company_assigned_at",
                "agent_assigned_at",
            ])
            .map_err(|e| LeadError::Persistence(e.to_string()))?;
    }
    for lead in leads {
        writer
            .serialize(ExportRow::from(lead))
            .map_err(|e| LeadError::Persistence(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| LeadError::Persistence(e.to_string()))
}

pub struct ImportService {
    pool: PgPool,
}

impl ImportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Imports JSON rows.
    pub async fn import_rows(
        &self,
        actor: &Actor,
        rows: &[ImportRow],
        check_duplicates: bool,
    ) -> Result<ImportReport, LeadError> {
        let positions: Vec<usize> = (0..rows.len()).collect();
        self.import(actor, rows, &positions, Vec::new(), check_duplicates)
            .await
    }

    /// Imports a CSV body.
    pub async fn import_csv(
        &self,
        actor: &Actor,
        body: &[u8],
        check_duplicates: bool,
    ) -> Result<ImportReport, LeadError> {
        let parsed = parse_csv(body)?;
        self.import(
            actor,
            &parsed.rows,
            &parsed.positions,
            parsed.invalid,
            check_duplicates,
        )
        .await
    }

    async fn import(
        &self,
        actor: &Actor,
        rows: &[ImportRow],
        positions: &[usize],
        unreadable: Vec<InvalidRow>,
        check_duplicates: bool,
    ) -> Result<ImportReport, LeadError> {
        if rows.len() + unreadable.len() > MAX_IMPORT_ROWS {
            return Err(LeadError::Validation(format!(
                "At most {} rows can be imported at once",
                MAX_IMPORT_ROWS
            )));
        }

        let leads = LeadRepository::new(self.pool.clone());

        let existing_phones: HashSet<String> = if check_duplicates {
            leads
                .existing_phones(&candidate_phones(rows))
                .await?
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        let mut company_ids: Vec<i64> = rows.iter().filter_map(|r| r.company_id).collect();
        company_ids.sort_unstable();
        company_ids.dedup();
        let known_companies: HashSet<i64> = CompanyRepository::new(self.pool.clone())
            .existing_ids(&company_ids)
            .await?
            .into_iter()
            .collect();

        let plan = plan_import(rows, &existing_phones, &known_companies, check_duplicates);

        let new_leads: Vec<NewLead> = plan.accepted.into_iter().map(|(_, lead)| lead).collect();
        let created: Vec<i64> = if new_leads.is_empty() {
            Vec::new()
        } else {
            leads
                .insert_many(&new_leads, Utc::now())
                .await?
                .into_iter()
                .map(|e| e.id)
                .collect()
        };

        let mut invalid = unreadable;
        invalid.extend(plan.invalid.into_iter().map(|mut row| {
            row.row = positions.get(row.row).copied().unwrap_or(row.row);
            row
        }));
        invalid.sort_by_key(|r| r.row);

        let duplicates = plan
            .duplicates
            .into_iter()
            .map(|mut row| {
                row.row = positions.get(row.row).copied().unwrap_or(row.row);
                row
            })
            .collect::<Vec<_>>();

        record_leads_imported(created.len(), duplicates.len(), invalid.len());
        tracing::info!(
            user_id = actor.user_id,
            created = created.len(),
            duplicates = duplicates.len(),
            invalid = invalid.len(),
            check_duplicates,
            "Leads imported"
        );

        Ok(ImportReport {
            created,
            duplicates,
            invalid,
        })
    }
}
