//! Database metrics: per-query latency labelled by table, pool gauges, and
//! a counter of guarded lead writes that lost their race.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Tables the repositories write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Companies,
    Users,
    Leads,
    LeadRequests,
    LeadReturns,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Companies => "companies",
            Table::Users => "users",
            Table::Leads => "leads",
            Table::LeadRequests => "lead_requests",
            Table::LeadReturns => "lead_returns",
        }
    }
}

pub fn record_query_duration(table: Table, query: &'static str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "table" => table.as_str(),
        "query" => query
    )
    .record(duration_secs);
}

/// Counts a guarded write (owner/status precondition) that matched no row.
pub fn record_guard_miss(table: Table, query: &'static str) {
    counter!(
        "database_guarded_write_misses_total",
        "table" => table.as_str(),
        "query" => query
    )
    .increment(1);
}

/// Refreshes the pool gauges; called on every scrape.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
}

/// Times one repository query.
///
/// ```ignore
/// let timer = QueryTimer::new(Table::Leads, "find_lead_by_id");
/// let result = sqlx::query_as::<_, LeadEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// result
/// ```
pub struct QueryTimer {
    table: Table,
    query: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(table: Table, query: &'static str) -> Self {
        Self {
            table,
            query,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(self.table, self.query, self.start.elapsed().as_secs_f64());
    }

    /// Records a guarded write; `Ok(None)` means its precondition no longer
    /// held and counts as a miss.
    pub fn record_guarded<T, E>(self, result: &Result<Option<T>, E>) {
        if matches!(result, Ok(None)) {
            record_guard_miss(self.table, self.query);
        }
        self.record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_labels() {
        assert_eq!(Table::Leads.as_str(), "leads");
        assert_eq!(Table::LeadRequests.as_str(), "lead_requests");
        assert_eq!(Table::LeadReturns.as_str(), "lead_returns");
    }

    #[test]
    fn test_query_timer_keeps_labels() {
        let timer = QueryTimer::new(Table::Leads, "claim_unassigned_lead");
        assert_eq!(timer.table, Table::Leads);
        assert_eq!(timer.query, "claim_unassigned_lead");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new(Table::Leads, "list_leads").record();
        let missed: Result<Option<()>, ()> = Ok(None);
        QueryTimer::new(Table::Leads, "apply_lead_patch").record_guarded(&missed);
        record_guard_miss(Table::LeadReturns, "submit_lead_return_evidence");
    }
}
