//! The self-check request parameters and the response hierarchy.
//!
//! The verbose response mirrors the evaluation walk: per database a
//! compute branch (nodes with pool/load detail, tablet buckets) and a
//! storage branch (pools → groups → vdisks → pdisk).

use serde::{Deserialize, Serialize};

use crate::issue::IssueLog;
use crate::status::{SelfCheck, StatusFlag};

/// Parameters of one self-check request.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCheckRequest {
    /// Restrict the check to a single database path.
    #[serde(default)]
    pub database: Option<String>,
    /// Overrides the default 10 s wall-clock deadline.
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
    /// Keep the per-database status tree in the response.
    #[serde(default)]
    pub return_verbose_status: bool,
    /// Drop issues below this status.
    #[serde(default)]
    pub minimum_status: Option<StatusFlag>,
    /// Drop issues deeper than this level (0 = unlimited).
    #[serde(default)]
    pub maximum_level: u32,
}

/// The wire response of a self-check.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCheckResult {
    pub self_check_result: SelfCheck,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issue_log: Vec<IssueLog>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub database_status: Vec<DatabaseStatus>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub overall: StatusFlag,
    #[serde(default, skip_serializing_if = "ComputeStatus::is_empty")]
    pub compute: ComputeStatus,
    #[serde(default, skip_serializing_if = "StorageStatus::is_empty")]
    pub storage: StorageStatus,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeStatus {
    pub overall: StatusFlag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ComputeNodeStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tablets: Vec<ComputeTabletStatus>,
}

impl ComputeStatus {
    pub fn is_empty(&self) -> bool {
        self.overall == StatusFlag::Unspecified && self.nodes.is_empty() && self.tablets.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeNodeStatus {
    pub id: String,
    pub overall: StatusFlag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<ThreadPoolStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadAverageStatus>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadPoolStatus {
    pub name: String,
    pub usage: f64,
    pub overall: StatusFlag,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAverageStatus {
    pub load: f64,
    pub cores: u32,
    pub overall: StatusFlag,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeTabletStatus {
    #[serde(rename = "type")]
    pub kind: String,
    pub state: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id: Vec<String>,
    pub overall: StatusFlag,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub overall: StatusFlag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<StoragePoolStatus>,
}

impl StorageStatus {
    pub fn is_empty(&self) -> bool {
        self.overall == StatusFlag::Unspecified && self.pools.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePoolStatus {
    pub id: String,
    pub overall: StatusFlag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<StorageGroupStatus>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageGroupStatus {
    pub id: String,
    pub overall: StatusFlag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vdisks: Vec<StorageVDiskStatus>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageVDiskStatus {
    pub id: String,
    pub overall: StatusFlag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdisk: Option<StoragePDiskStatus>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePDiskStatus {
    pub id: String,
    pub overall: StatusFlag,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_has_no_filters() {
        let req = SelfCheckRequest::default();
        assert!(req.database.is_none());
        assert!(req.minimum_status.is_none());
        assert_eq!(req.maximum_level, 0);
        assert!(!req.return_verbose_status);
    }

    #[test]
    fn empty_result_serializes_to_verdict_only() {
        let result = SelfCheckResult {
            self_check_result: SelfCheck::Good,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json.get("self_check_result").unwrap(), "GOOD");
        assert!(json.get("issue_log").is_none());
        assert!(json.get("database_status").is_none());
    }

    #[test]
    fn database_status_roundtrip() {
        let status = DatabaseStatus {
            name: "/Root/db1".to_string(),
            overall: StatusFlag::Yellow,
            storage: StorageStatus {
                overall: StatusFlag::Yellow,
                pools: vec![StoragePoolStatus {
                    id: "ssd".to_string(),
                    overall: StatusFlag::Yellow,
                    groups: vec![],
                }],
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&status).unwrap();
        let back: DatabaseStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
