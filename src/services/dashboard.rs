//! Dashboard Aggregator: simple counts recomputed on every call.

use chrono::{DateTime, Datelike, Utc};

use crate::db::Store;

use super::error::ServiceError;
use super::roles::{RoleAssignmentService, RoleMembership};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStats {
    pub total: u64,
    pub active: u64,
    pub new_this_month: u64,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Store,
    roles: RoleAssignmentService,
}

impl DashboardService {
    #[must_use]
    pub const fn new(store: Store, roles: RoleAssignmentService) -> Self {
        Self { store, roles }
    }

    /// Totals against the passed clock: `new_this_month` is calendar
    /// month/year containment, not a rolling 30-day window.
    pub async fn user_stats(&self, now: DateTime<Utc>) -> Result<UserStats, ServiceError> {
        let (start, end) = current_month_bounds(now);

        Ok(UserStats {
            total: self.store.count_users().await?,
            active: self.store.count_verified_users().await?,
            new_this_month: self.store.count_users_created_between(&start, &end).await?,
        })
    }

    pub async fn role_stats(&self) -> Result<Vec<RoleMembership>, ServiceError> {
        self.roles.roles_with_user_counts().await
    }
}

/// `[first day of this month, first day of next month)` as RFC3339 strings
/// comparable against stored UTC timestamps.
fn current_month_bounds(now: DateTime<Utc>) -> (String, String) {
    let start = month_start(now.year(), now.month());
    let end = if now.month() == 12 {
        month_start(now.year() + 1, 1)
    } else {
        month_start(now.year(), now.month() + 1)
    };
    (start, end)
}

fn month_start(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}-01T00:00:00+00:00")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_bounds_mid_year() {
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();
        let (start, end) = current_month_bounds(now);
        assert_eq!(start, "2026-08-01T00:00:00+00:00");
        assert_eq!(end, "2026-09-01T00:00:00+00:00");
    }

    #[test]
    fn test_month_bounds_december_rolls_over() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = current_month_bounds(now);
        assert_eq!(start, "2025-12-01T00:00:00+00:00");
        assert_eq!(end, "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_bounds_bracket_rfc3339_timestamps() {
        let now = Utc.with_ymd_and_hms(2026, 8, 15, 0, 0, 0).unwrap();
        let (start, end) = current_month_bounds(now);

        let inside = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 1).unwrap().to_rfc3339();
        let before = Utc.with_ymd_and_hms(2026, 7, 31, 23, 59, 59).unwrap().to_rfc3339();
        let after = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap().to_rfc3339();

        assert!(inside.as_str() >= start.as_str() && inside.as_str() < end.as_str());
        assert!(before.as_str() < start.as_str());
        assert!(after.as_str() >= end.as_str());
    }
}
