use chrono::{DateTime, Utc};

/// Builder for selecting live saga records.
///
/// Used by the stuck-saga monitor to find sagas that have sat in one
/// status for too long. Results are ordered by `status_since`, oldest first.
#[derive(Debug, Clone, Default)]
pub struct SagaQuery {
    /// Only sagas in one of these statuses.
    pub statuses: Option<Vec<String>>,

    /// Skip sagas in any of these statuses.
    pub excluded_statuses: Vec<String>,

    /// Only sagas whose status has not changed since this instant (inclusive).
    pub status_since_before: Option<DateTime<Utc>>,

    /// Maximum number of records to return.
    pub limit: Option<usize>,

    /// Number of records to skip.
    pub offset: Option<usize>,
}

impl SagaQuery {
    /// Creates a query matching every live saga.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for sagas that entered their status at or before `cutoff`.
    pub fn stalled_since(cutoff: DateTime<Utc>) -> Self {
        Self {
            status_since_before: Some(cutoff),
            ..Default::default()
        }
    }

    /// Filters by a single status.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.statuses = Some(vec![status.into()]);
        self
    }

    /// Filters by any of several statuses.
    pub fn statuses(mut self, statuses: Vec<String>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Excludes a status.
    pub fn exclude_status(mut self, status: impl Into<String>) -> Self {
        self.excluded_statuses.push(status.into());
        self
    }

    /// Filters by status age.
    pub fn status_since_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.status_since_before = Some(cutoff);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if a record with this status and age passes the filters.
    pub fn matches(&self, status: &str, status_since: DateTime<Utc>) -> bool {
        if let Some(ref statuses) = self.statuses
            && !statuses.iter().any(|s| s == status)
        {
            return false;
        }
        if self.excluded_statuses.iter().any(|s| s == status) {
            return false;
        }
        if let Some(cutoff) = self.status_since_before
            && status_since > cutoff
        {
            return false;
        }
        true
    }
}
