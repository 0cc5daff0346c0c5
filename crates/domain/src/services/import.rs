//! Import planning: validation and phone dedupe.

use std::collections::HashSet;

use validator::Validate;

use crate::models::import::{DuplicateRow, InvalidRow};
use crate::models::lead::{ImportRow, NewLead};

/// Rows split into what to insert and what to report.
#[derive(Debug, Default)]
pub struct ImportPlan {
    /// `(row index, lead)` pairs to insert.
    pub accepted: Vec<(usize, NewLead)>,
    pub duplicates: Vec<DuplicateRow>,
    pub invalid: Vec<InvalidRow>,
}

fn describe(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let detail = errs
                .iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            if detail.is_empty() {
                format!("{} is invalid", field)
            } else {
                format!("{}: {}", field, detail)
            }
        })
        .collect();
    parts.sort();
    parts.join("; ")
}

/// Validates rows and removes duplicates.
///
/// `existing_phones` holds normalized phones already stored; `known_companies`
/// the ids a row may be pre-assigned to. With `check_duplicates` off, phones
/// are neither checked against the store nor within the batch.
pub fn plan_import(
    rows: &[ImportRow],
    existing_phones: &HashSet<String>,
    known_companies: &HashSet<i64>,
    check_duplicates: bool,
) -> ImportPlan {
    let mut plan = ImportPlan::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        if let Err(errors) = row.validate() {
            plan.invalid.push(InvalidRow {
                row: index,
                reason: describe(&errors),
            });
            continue;
        }

        let lead = NewLead::from(row);

        if let Some(company_id) = lead.company_id {
            if !known_companies.contains(&company_id) {
                plan.invalid.push(InvalidRow {
                    row: index,
                    reason: format!("company {} does not exist", company_id),
                });
                continue;
            }
        }

        if check_duplicates
            && (existing_phones.contains(&lead.phone) || !seen.insert(lead.phone.clone()))
        {
            plan.duplicates.push(DuplicateRow {
                row: index,
                phone: lead.phone,
            });
            continue;
        }

        plan.accepted.push((index, lead));
    }

    plan
}

/// Normalized phones of the rows, for the store lookup.
pub fn candidate_phones(rows: &[ImportRow]) -> Vec<String> {
    let mut phones: Vec<String> = rows
        .iter()
        .map(|r| shared::validation::normalize_phone(&r.phone))
        .filter(|p| !p.is_empty())
        .collect();
    phones.sort();
    phones.dedup();
    phones
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, phone: &str) -> ImportRow {
        ImportRow {
            name: name.into(),
            phone: phone.into(),
            platform: None,
            company_id: None,
            quality: None,
            notes: None,
        }
    }

    fn companies() -> HashSet<i64> {
        [7].into_iter().collect()
    }

    #[test]
    fn test_existing_phone_is_duplicate() {
        let existing: HashSet<String> = ["+34600111222".to_string()].into_iter().collect();
        let rows = vec![row("Ana", "+34 600 111 222")];

        let plan = plan_import(&rows, &existing, &companies(), true);
        assert!(plan.accepted.is_empty());
        assert_eq!(
            plan.duplicates,
            vec![DuplicateRow {
                row: 0,
                phone: "+34600111222".into()
            }]
        );

        let plan = plan_import(&rows, &existing, &companies(), false);
        assert_eq!(plan.accepted.len(), 1);
        assert!(plan.duplicates.is_empty());
    }

    #[test]
    fn test_duplicates_within_batch() {
        let rows = vec![row("Ana", "600111222"), row("Ana bis", "600-111-222")];
        let plan = plan_import(&rows, &HashSet::new(), &companies(), true);
        assert_eq!(plan.accepted.len(), 1);
        assert_eq!(plan.accepted[0].0, 0);
        assert_eq!(plan.duplicates.len(), 1);
        assert_eq!(plan.duplicates[0].row, 1);
    }

    #[test]
    fn test_invalid_rows_do_not_abort_batch() {
        let rows = vec![row("", "600111222"), row("Luis", "600111333")];
        let plan = plan_import(&rows, &HashSet::new(), &companies(), true);
        assert_eq!(plan.invalid.len(), 1);
        assert_eq!(plan.invalid[0].row, 0);
        assert!(plan.invalid[0].reason.contains("name"));
        assert_eq!(plan.accepted.len(), 1);
    }

    #[test]
    fn test_unknown_company_is_invalid() {
        let mut r = row("Marta", "600111444");
        r.company_id = Some(99);
        let mut ok = row("Marta", "600111555");
        ok.company_id = Some(7);

        let plan = plan_import(&[r, ok], &HashSet::new(), &companies(), true);
        assert_eq!(plan.invalid.len(), 1);
        assert!(plan.invalid[0].reason.contains("99"));
        assert_eq!(plan.accepted[0].1.company_id, Some(7));
    }

    #[test]
    fn test_candidate_phones_are_normalized_and_unique() {
        let rows = vec![row("a", "600 111 222"), row("b", "600111222"), row("c", "+34 1")];
        assert_eq!(candidate_phones(&rows), vec!["+341", "600111222"]);
    }
}
