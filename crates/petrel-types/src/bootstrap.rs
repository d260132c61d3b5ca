//! Bootstrap configuration, read once at process start.
//!
//! Carries what the engine needs before it talks to anyone: the domain
//! name, the ids of the well-known system tablets, the static node id
//! boundary, and the statically configured storage service set. Loaded
//! from a TOML file by the daemon; each request snapshots it and never
//! re-reads it mid-flight.

use serde::{Deserialize, Serialize};

use crate::snapshot::{GroupId, NodeId, TabletId, VDiskKey};

/// Name of the synthetic pool collecting static groups with no pool of
/// their own.
pub const STATIC_STORAGE_POOL_NAME: &str = "static";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Root domain name, without the leading slash (e.g. `Root`).
    pub domain_name: String,
    #[serde(default)]
    pub console_id: Option<TabletId>,
    #[serde(default)]
    pub bs_controller_id: Option<TabletId>,
    #[serde(default)]
    pub root_scheme_shard_id: Option<TabletId>,
    #[serde(default)]
    pub root_hive_id: Option<TabletId>,
    /// Nodes with ids up to and including this one are static. When
    /// unset, every node is considered static.
    #[serde(default)]
    pub max_static_node_id: Option<NodeId>,
    #[serde(default)]
    pub static_service_set: StaticServiceSet,
}

impl BootstrapConfig {
    /// The root domain path (`/Root`).
    pub fn domain_path(&self) -> String {
        format!("/{}", self.domain_name)
    }

    pub fn is_static_node(&self, node_id: NodeId) -> bool {
        match self.max_static_node_id {
            Some(max) => node_id <= max,
            None => true,
        }
    }
}

/// The statically configured pdisks, vdisks, and groups a node warden
/// knows about before the storage controller is reachable.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticServiceSet {
    #[serde(default)]
    pub pdisks: Vec<StaticPDisk>,
    #[serde(default)]
    pub vdisks: Vec<StaticVDisk>,
    #[serde(default)]
    pub groups: Vec<StaticGroup>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPDisk {
    pub node_id: NodeId,
    pub pdisk_id: u32,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub guid: u64,
    #[serde(default)]
    pub category: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticVDisk {
    pub vdisk_id: VDiskKey,
    pub node_id: NodeId,
    pub pdisk_id: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticGroup {
    pub group_id: GroupId,
    /// Empty means the group belongs to the synthetic "static" pool.
    #[serde(default)]
    pub storage_pool_name: String,
}

impl StaticGroup {
    pub fn pool_name(&self) -> &str {
        if self.storage_pool_name.is_empty() {
            STATIC_STORAGE_POOL_NAME
        } else {
            &self.storage_pool_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_path_gets_leading_slash() {
        let config = BootstrapConfig {
            domain_name: "Root".to_string(),
            ..Default::default()
        };
        assert_eq!(config.domain_path(), "/Root");
    }

    #[test]
    fn static_node_boundary() {
        let mut config = BootstrapConfig::default();
        assert!(config.is_static_node(1000));

        config.max_static_node_id = Some(50);
        assert!(config.is_static_node(50));
        assert!(!config.is_static_node(51));
    }

    #[test]
    fn unnamed_static_group_falls_into_static_pool() {
        let group = StaticGroup {
            group_id: 0,
            storage_pool_name: String::new(),
        };
        assert_eq!(group.pool_name(), STATIC_STORAGE_POOL_NAME);

        let named = StaticGroup {
            group_id: 1,
            storage_pool_name: "ssd".to_string(),
        };
        assert_eq!(named.pool_name(), "ssd");
    }

    #[test]
    fn parses_from_toml() {
        let raw = r#"
            domain_name = "Root"
            console_id = 72057594037936131
            bs_controller_id = 72057594037932033
            root_scheme_shard_id = 72057594046678944
            root_hive_id = 72057594037968897
            max_static_node_id = 1000

            [[static_service_set.pdisks]]
            node_id = 1
            pdisk_id = 1
            path = "/dev/disk/by-partlabel/petrel_disk_01"

            [[static_service_set.groups]]
            group_id = 0
        "#;
        let config: BootstrapConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.domain_path(), "/Root");
        assert_eq!(config.static_service_set.pdisks.len(), 1);
        assert_eq!(config.static_service_set.groups[0].pool_name(), "static");
    }
}
