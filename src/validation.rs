//! Request validation for the query HTTP surface.
//!
//! Distinct from `sql::error::TranslatorError`: this catches malformed
//! requests before they ever reach the composer/translator (SPEC_FULL.md
//! §7's propagation policy still applies once a request clears this
//! layer — translator errors are a separate 4xx path).

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::dto::QueryScopeRequest;

/// Maximum length, in bytes, of a raw `query_filter` DSL string accepted
/// over the wire. Mirrors this team's other services' bound on untrusted
/// free-text input.
const MAX_QUERY_FILTER_LEN: usize = 8192;

pub struct ValidationService {
    max_scan_limit: u32,
    max_topn_limit: u32,
}

impl ValidationService {
    pub fn new(max_scan_limit: u32, max_topn_limit: u32) -> Self {
        Self { max_scan_limit, max_topn_limit }
    }

    pub fn validate_scope(&self, scope: &QueryScopeRequest) -> Result<()> {
        self.validate_time_range(scope.start, scope.end)?;
        self.validate_query_filter(&scope.query_filter)?;
        Ok(())
    }

    fn validate_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        if end <= start {
            bail!("end must be strictly after start");
        }
        Ok(())
    }

    fn validate_query_filter(&self, query_filter: &str) -> Result<()> {
        if query_filter.len() > MAX_QUERY_FILTER_LEN {
            bail!("query_filter too long: {} bytes (max {})", query_filter.len(), MAX_QUERY_FILTER_LEN);
        }
        Ok(())
    }

    pub fn validate_dimension(&self, dimension: &str) -> Result<()> {
        if dimension.is_empty() {
            bail!("dimension must not be empty");
        }
        Ok(())
    }

    pub fn validate_scan_limit(&self, limit: u32) -> Result<()> {
        if limit == 0 || limit > self.max_scan_limit {
            bail!("scan limit must be between 1 and {}", self.max_scan_limit);
        }
        Ok(())
    }

    pub fn validate_topn_limit(&self, limit: u32) -> Result<()> {
        if limit == 0 || limit > self.max_topn_limit {
            bail!("top-N limit must be between 1 and {}", self.max_topn_limit);
        }
        Ok(())
    }

    pub fn validate_precision(&self, precision: f64) -> Result<()> {
        if precision < 0.0 || !precision.is_finite() {
            bail!("precision must be a non-negative, finite number");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scope(start: DateTime<Utc>, end: DateTime<Utc>) -> QueryScopeRequest {
        QueryScopeRequest { start, end, query_filter: String::new(), entity: None }
    }

    #[test]
    fn rejects_inverted_time_range() {
        let v = ValidationService::new(10_000, 10_000);
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(v.validate_scope(&scope(start, end)).is_err());
    }

    #[test]
    fn rejects_oversized_scan_limit() {
        let v = ValidationService::new(100, 100);
        assert!(v.validate_scan_limit(101).is_err());
        assert!(v.validate_scan_limit(0).is_err());
        assert!(v.validate_scan_limit(100).is_ok());
    }

    #[test]
    fn rejects_negative_precision() {
        let v = ValidationService::new(100, 100);
        assert!(v.validate_precision(-1.0).is_err());
        assert!(v.validate_precision(0.0).is_ok());
    }
}
