//! Snapshot shapes returned by cluster services.
//!
//! These are the engine-side views of what the scheme cache, the tenant
//! service, the scheme shard, the storage controller, the hive, and the
//! per-node whiteboards answer during a self-check fan-out. Gateways
//! deserialize service responses into these structs; the model builder
//! merges them without caring which transport they came in on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::WhiteboardFlag;

pub type NodeId = u32;
pub type TabletId = u64;
pub type GroupId = u32;

/// Identifies a sub-domain (database) inside the scheme: the owning
/// scheme shard plus the local path id.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DomainKey {
    pub owner_id: u64,
    pub local_path_id: u64,
}

impl DomainKey {
    pub fn is_zero(&self) -> bool {
        self.owner_id == 0 && self.local_path_id == 0
    }
}

/// Replica coordinates inside a storage group.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VDiskKey {
    pub group_id: GroupId,
    pub group_generation: u32,
    pub ring: u32,
    pub domain: u32,
    pub vdisk: u32,
}

impl fmt::Display for VDiskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.group_id, self.group_generation, self.ring, self.domain, self.vdisk
        )
    }
}

/// The canonical pdisk identifier: `"{nodeId}-{pdiskId}"`.
pub fn pdisk_ref(node_id: NodeId, pdisk_id: u32) -> String {
    format!("{node_id}-{pdisk_id}")
}

// ── Node directory ────────────────────────────────────────────────

/// One entry of the cluster node directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

// ── Whiteboard: system state ──────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStateInfo {
    #[serde(default)]
    pub node_id: NodeId,
    #[serde(default)]
    pub pool_stats: Vec<PoolStats>,
    #[serde(default)]
    pub load_average: Vec<f64>,
    #[serde(default)]
    pub number_of_cpus: u32,
    #[serde(default)]
    pub clock_skew_peer_id: Option<NodeId>,
    /// Signed clock difference against the peer, microseconds.
    #[serde(default)]
    pub clock_skew_micros: i64,
    /// Endpoints this node advertises (monitoring surface among them).
    #[serde(default)]
    pub endpoints: Vec<EndpointInfo>,
}

/// Usage of one worker pool on a node (0.0–1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub usage: f64,
}

/// One named endpoint a node advertises.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub name: String,
    /// Either `host:port`, or `:port` for a node-local listener.
    pub address: String,
}

// ── Whiteboard: vdisk state ───────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct VDiskStateInfo {
    #[serde(default)]
    pub vdisk_id: VDiskKey,
    #[serde(default)]
    pub node_id: NodeId,
    #[serde(default)]
    pub pdisk_id: u32,
    #[serde(default)]
    pub state: Option<VDiskState>,
    #[serde(default)]
    pub replicated: bool,
    #[serde(default)]
    pub disk_space: Option<WhiteboardFlag>,
    #[serde(default)]
    pub allocated_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VDiskState {
    Ok,
    Initial,
    SyncGuidRecovery,
    LocalRecoveryError,
    SyncGuidRecoveryError,
    PDiskError,
}

impl VDiskState {
    pub fn name(self) -> &'static str {
        match self {
            VDiskState::Ok => "OK",
            VDiskState::Initial => "Initial",
            VDiskState::SyncGuidRecovery => "SyncGuidRecovery",
            VDiskState::LocalRecoveryError => "LocalRecoveryError",
            VDiskState::SyncGuidRecoveryError => "SyncGuidRecoveryError",
            VDiskState::PDiskError => "PDiskError",
        }
    }
}

// ── Whiteboard: pdisk state ───────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PDiskStateInfo {
    #[serde(default)]
    pub node_id: NodeId,
    #[serde(default)]
    pub pdisk_id: u32,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub guid: u64,
    #[serde(default)]
    pub category: u64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub available_size: u64,
    #[serde(default)]
    pub state: Option<PDiskState>,
}

impl PDiskStateInfo {
    pub fn pdisk_ref(&self) -> String {
        pdisk_ref(self.node_id, self.pdisk_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PDiskState {
    Normal,
    Initial,
    InitialFormatRead,
    InitialSysLogRead,
    InitialCommonLogRead,
    InitialFormatReadError,
    InitialSysLogReadError,
    InitialSysLogParseError,
    InitialCommonLogReadError,
    InitialCommonLogParseError,
    CommonLoggerInitError,
    OpenFileError,
    ChunkQuotaError,
    DeviceIoError,
    Missing,
    Timeout,
    NodeDisconnected,
    Unknown,
    Reserved14,
    Reserved15,
    Reserved16,
}

impl PDiskState {
    pub fn name(self) -> &'static str {
        match self {
            PDiskState::Normal => "Normal",
            PDiskState::Initial => "Initial",
            PDiskState::InitialFormatRead => "InitialFormatRead",
            PDiskState::InitialSysLogRead => "InitialSysLogRead",
            PDiskState::InitialCommonLogRead => "InitialCommonLogRead",
            PDiskState::InitialFormatReadError => "InitialFormatReadError",
            PDiskState::InitialSysLogReadError => "InitialSysLogReadError",
            PDiskState::InitialSysLogParseError => "InitialSysLogParseError",
            PDiskState::InitialCommonLogReadError => "InitialCommonLogReadError",
            PDiskState::InitialCommonLogParseError => "InitialCommonLogParseError",
            PDiskState::CommonLoggerInitError => "CommonLoggerInitError",
            PDiskState::OpenFileError => "OpenFileError",
            PDiskState::ChunkQuotaError => "ChunkQuotaError",
            PDiskState::DeviceIoError => "DeviceIoError",
            PDiskState::Missing => "Missing",
            PDiskState::Timeout => "Timeout",
            PDiskState::NodeDisconnected => "NodeDisconnected",
            PDiskState::Unknown => "Unknown",
            PDiskState::Reserved14 => "Reserved14",
            PDiskState::Reserved15 => "Reserved15",
            PDiskState::Reserved16 => "Reserved16",
        }
    }
}

// ── Whiteboard: storage group state ───────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BsGroupStateInfo {
    #[serde(default)]
    pub group_id: GroupId,
    #[serde(default)]
    pub group_generation: u32,
    #[serde(default)]
    pub erasure_species: String,
    #[serde(default)]
    pub vdisk_ids: Vec<VDiskKey>,
    #[serde(default)]
    pub storage_pool_name: String,
    #[serde(default)]
    pub node_id: NodeId,
}

// ── Scheme cache ──────────────────────────────────────────────────

/// Result of resolving a database path through the scheme cache.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigateResult {
    pub path: String,
    pub domain_key: DomainKey,
    /// Differs from `domain_key` for serverless databases: points at the
    /// shared database hosting the compute resources.
    pub resources_domain_key: DomainKey,
    #[serde(default)]
    pub hive_id: Option<TabletId>,
    #[serde(default)]
    pub scheme_shard_id: Option<TabletId>,
}

// ── Scheme shard ──────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeSchemeResult {
    pub path: String,
    #[serde(default)]
    pub storage_pools: Vec<StoragePoolDescriptor>,
    #[serde(default)]
    pub storage_usage: u64,
    #[serde(default)]
    pub storage_quota: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePoolDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: String,
}

// ── Tenant service ────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantStatusResult {
    pub path: String,
    /// Set when the database is serverless (compute borrowed from a
    /// shared database).
    #[serde(default)]
    pub serverless: bool,
}

// ── Storage controller ────────────────────────────────────────────

/// The controller's canonical view of pdisks, vslots, and groups.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfig {
    #[serde(default)]
    pub pdisks: Vec<BaseConfigPDisk>,
    #[serde(default)]
    pub vslots: Vec<BaseConfigVSlot>,
    #[serde(default)]
    pub groups: Vec<BaseConfigGroup>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfigPDisk {
    pub node_id: NodeId,
    pub pdisk_id: u32,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub guid: u64,
    #[serde(default)]
    pub category: u64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub available_size: u64,
}

impl BaseConfigPDisk {
    pub fn pdisk_ref(&self) -> String {
        pdisk_ref(self.node_id, self.pdisk_id)
    }
}

/// Identifies a vslot on a pdisk.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VSlotId {
    pub node_id: NodeId,
    pub pdisk_id: u32,
    pub vslot_id: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfigVSlot {
    pub vslot_id: VSlotId,
    pub group_id: GroupId,
    #[serde(default)]
    pub group_generation: u32,
    #[serde(default)]
    pub fail_realm_idx: u32,
    #[serde(default)]
    pub fail_domain_idx: u32,
    #[serde(default)]
    pub vdisk_idx: u32,
    #[serde(default)]
    pub allocated_size: u64,
}

impl BaseConfigVSlot {
    pub fn vdisk_key(&self) -> VDiskKey {
        VDiskKey {
            group_id: self.group_id,
            group_generation: self.group_generation,
            ring: self.fail_realm_idx,
            domain: self.fail_domain_idx,
            vdisk: self.vdisk_idx,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfigGroup {
    pub group_id: GroupId,
    #[serde(default)]
    pub group_generation: u32,
    #[serde(default)]
    pub erasure_species: String,
    #[serde(default)]
    pub vslots: Vec<VSlotId>,
}

/// One pool's worth of matching groups from a select-groups call.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectGroupsResult {
    pub storage_pool_name: String,
    #[serde(default)]
    pub group_ids: Vec<GroupId>,
}

// ── Hive ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiveInfo {
    /// Milliseconds since epoch when this hive instance started.
    #[serde(default)]
    pub start_time_ms: u64,
    /// Milliseconds since epoch when the response was produced.
    #[serde(default)]
    pub response_time_ms: u64,
    #[serde(default)]
    pub tablets: Vec<HiveTabletInfo>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiveTabletInfo {
    pub tablet_id: TabletId,
    /// Zero for the leader; followers get distinct non-zero ids.
    #[serde(default)]
    pub follower_id: u32,
    #[serde(default)]
    pub tablet_type: String,
    #[serde(default)]
    pub node_id: NodeId,
    #[serde(default)]
    pub volatile_state: TabletVolatileState,
    #[serde(default)]
    pub restarts_per_period: u32,
    #[serde(default)]
    pub last_alive_timestamp_ms: u64,
    #[serde(default)]
    pub boot_mode: TabletBootMode,
    #[serde(default)]
    pub object_domain: DomainKey,
}

impl HiveTabletInfo {
    pub fn is_leader(&self) -> bool {
        self.follower_id == 0
    }

    /// The identifier shown in reports: `"{tabletId}"` for leaders,
    /// `"{tabletId}.{followerId}"` for followers.
    pub fn tablet_ref(&self) -> String {
        if self.follower_id != 0 {
            format!("{}.{}", self.tablet_id, self.follower_id)
        } else {
            self.tablet_id.to_string()
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabletVolatileState {
    #[default]
    Unknown,
    Stopped,
    Booting,
    Starting,
    Running,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabletBootMode {
    #[default]
    Default,
    Excluded,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiveNodeStats {
    pub node_id: NodeId,
    #[serde(default)]
    pub node_domain: Option<DomainKey>,
}

/// Kind of a well-known system tablet tracked by the request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabletKind {
    #[default]
    Unknown,
    Console,
    SchemeShard,
    Hive,
    BsController,
}

impl TabletKind {
    pub fn name(self) -> &'static str {
        match self {
            TabletKind::Unknown => "Unknown",
            TabletKind::Console => "Console",
            TabletKind::SchemeShard => "SchemeShard",
            TabletKind::Hive => "Hive",
            TabletKind::BsController => "BsController",
        }
    }
}
