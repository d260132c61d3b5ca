//! Response assembly: overall verdict, issue dedup, request filters.

use std::collections::HashSet;

use petrel_types::result::{SelfCheckRequest, SelfCheckResult};
use petrel_types::status::{SelfCheck, StatusFlag};

use crate::context::IssueRecord;

/// Accumulates the overall picture while databases are evaluated.
#[derive(Debug, Default)]
pub struct OverallStateContext {
    pub result: SelfCheckResult,
    pub status: StatusFlag,
    /// Set when a non-green database carries storage issues; YELLOW
    /// with this flag maps to DEGRADED instead of GOOD.
    pub has_degraded: bool,
    issue_ids: HashSet<(String, String)>,
}

impl OverallStateContext {
    pub fn new() -> Self {
        OverallStateContext {
            status: StatusFlag::Grey,
            ..Default::default()
        }
    }

    pub fn update_max_status(&mut self, status: StatusFlag) {
        self.status = self.status.max(status);
    }

    /// Emits issue records into the response, deduplicating by
    /// (database, issue id).
    pub fn add_issues(&mut self, records: Vec<IssueRecord>) {
        for record in records {
            let key = (
                record.issue.location.database.name.clone(),
                record.issue.id.clone(),
            );
            if self.issue_ids.insert(key) {
                self.result.issue_log.push(record.issue);
            }
        }
    }

    /// Maps the accumulated status onto the wire verdict.
    pub fn fill_self_check_result(&mut self) {
        self.result.self_check_result = match self.status {
            StatusFlag::Green => SelfCheck::Good,
            StatusFlag::Yellow => {
                if self.has_degraded {
                    SelfCheck::Degraded
                } else {
                    SelfCheck::Good
                }
            }
            StatusFlag::Blue => SelfCheck::Degraded,
            StatusFlag::Orange => SelfCheck::MaintenanceRequired,
            StatusFlag::Red => SelfCheck::Emergency,
            _ => SelfCheck::Unspecified,
        };
    }
}

/// Applies the request's response filters in place.
pub fn apply_filters(result: &mut SelfCheckResult, request: &SelfCheckRequest) {
    if !request.return_verbose_status {
        result.database_status.clear();
    }
    if let Some(minimum_status) = request.minimum_status {
        result.issue_log.retain(|issue| issue.status >= minimum_status);
    }
    if request.maximum_level != 0 {
        let maximum_level = request.maximum_level;
        result.issue_log.retain(|issue| issue.level <= maximum_level);
    }
}
