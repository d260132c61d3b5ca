//! Issue records and their location hierarchy.
//!
//! An issue points at the entity it concerns through a nested `Location`:
//! the database, the storage side (node → pool → group → vdisk → pdisk),
//! the compute side (node, thread pool, tablet bucket), or a node pair for
//! clock-skew findings. Empty branches are skipped during serialization so
//! the JSON stays compact.

use serde::{Deserialize, Serialize};

use crate::status::StatusFlag;

/// A single entry of the issue log.
///
/// `reason` references the ids of the child issues this one was derived
/// from; after merging, every referenced id still resolves within the same
/// response. `count`/`listed` are only set on merged records.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueLog {
    pub id: String,
    pub status: StatusFlag,
    pub message: String,
    #[serde(default, skip_serializing_if = "Location::is_empty")]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reason: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub level: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub listed: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "LocationDatabase::is_empty")]
    pub database: LocationDatabase,
    #[serde(default, skip_serializing_if = "LocationStorage::is_empty")]
    pub storage: LocationStorage,
    #[serde(default, skip_serializing_if = "LocationCompute::is_empty")]
    pub compute: LocationCompute,
    /// Node the issue is about (clock-skew findings).
    #[serde(default, skip_serializing_if = "LocationNode::is_empty")]
    pub node: LocationNode,
    /// The declared clock-skew peer of `node`.
    #[serde(default, skip_serializing_if = "LocationNode::is_empty")]
    pub peer: LocationNode,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.database.is_empty()
            && self.storage.is_empty()
            && self.compute.is_empty()
            && self.node.is_empty()
            && self.peer.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDatabase {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl LocationDatabase {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationNode {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub port: u16,
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}

impl LocationNode {
    pub fn is_empty(&self) -> bool {
        self.id == 0 && self.host.is_empty() && self.port == 0
    }

    pub fn clear(&mut self) {
        *self = LocationNode::default();
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStorage {
    #[serde(default, skip_serializing_if = "LocationNode::is_empty")]
    pub node: LocationNode,
    #[serde(default, skip_serializing_if = "LocationStoragePool::is_empty")]
    pub pool: LocationStoragePool,
}

impl LocationStorage {
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.pool.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStoragePool {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "LocationGroup::is_empty")]
    pub group: LocationGroup,
}

impl LocationStoragePool {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.group.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationGroup {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id: Vec<String>,
    #[serde(default, skip_serializing_if = "LocationVDisk::is_empty")]
    pub vdisk: LocationVDisk,
}

impl LocationGroup {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.vdisk.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationVDisk {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pdisk: Vec<LocationPDisk>,
}

impl LocationVDisk {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.pdisk.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPDisk {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCompute {
    #[serde(default, skip_serializing_if = "LocationNode::is_empty")]
    pub node: LocationNode,
    #[serde(default, skip_serializing_if = "LocationComputePool::is_empty")]
    pub pool: LocationComputePool,
    #[serde(default, skip_serializing_if = "LocationComputeTablet::is_empty")]
    pub tablet: LocationComputeTablet,
}

impl LocationCompute {
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.pool.is_empty() && self.tablet.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationComputePool {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl LocationComputePool {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationComputeTablet {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub count: u32,
}

impl LocationComputeTablet {
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() && self.id.is_empty() && self.count == 0
    }
}
