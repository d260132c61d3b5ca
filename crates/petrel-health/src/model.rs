//! The request-scoped cluster model.
//!
//! Everything a self-check learns about the cluster lands here: the
//! databases and their pools, the merged per-entity views fused from the
//! whiteboards, the controller and the static configuration, the tablet
//! request ledger, and the transport bookkeeping (outstanding count,
//! retries, unavailable nodes). The model is built fresh per request and
//! discarded with it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};

use petrel_types::snapshot::{
    BaseConfig, BsGroupStateInfo, DescribeSchemeResult, DomainKey, GroupId, HiveInfo,
    HiveNodeStats, HiveTabletInfo, NavigateResult, NodeDescriptor, NodeId, PDiskStateInfo,
    SystemStateInfo, TabletId, TabletKind, TabletVolatileState, TenantStatusResult,
    VDiskStateInfo, TabletBootMode,
};

use crate::fanout::WhiteboardKind;

/// Health classification of one tablet bucket on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabletHealth {
    Good,
    Stopped,
    RestartsTooOften,
    Dead,
}

impl TabletHealth {
    pub fn name(self) -> &'static str {
        match self {
            TabletHealth::Good => "GOOD",
            TabletHealth::Stopped => "STOPPED",
            TabletHealth::RestartsTooOften => "RESTARTS_TOO_OFTEN",
            TabletHealth::Dead => "DEAD",
        }
    }
}

/// Knobs for tablet classification during hive aggregation.
#[derive(Debug, Clone)]
pub struct TabletStateSettings {
    /// Tablets not alive since this instant (ms since epoch) are dead.
    pub alive_barrier_ms: u64,
    pub max_restarts_per_period: u32,
    pub max_tablet_ids_stored: usize,
    pub report_good_tablet_ids: bool,
    /// Set while the placing hive is inside its synchronization window;
    /// suppresses the dead-tablet rule.
    pub hive_synchronization_period: bool,
}

impl Default for TabletStateSettings {
    fn default() -> Self {
        TabletStateSettings {
            alive_barrier_ms: 0,
            max_restarts_per_period: 30, // per hour
            max_tablet_ids_stored: 10,
            report_good_tablet_ids: false,
            hive_synchronization_period: false,
        }
    }
}

/// Tablet counts on one node, bucketed by (type, health, leader flag).
#[derive(Debug, Default, Clone)]
pub struct NodeTabletState {
    pub counts: Vec<NodeTabletStateCount>,
}

#[derive(Debug, Clone)]
pub struct NodeTabletStateCount {
    pub kind: String,
    pub state: TabletHealth,
    pub leader: bool,
    pub count: u32,
    pub identifiers: Vec<String>,
}

impl NodeTabletState {
    pub fn add_tablet(&mut self, info: &HiveTabletInfo, settings: &TabletStateSettings) {
        let state = classify_tablet(info, settings);
        let leader = info.is_leader();

        let position = self
            .counts
            .iter()
            .position(|c| c.state == state && c.kind == info.tablet_type && c.leader == leader);
        let bucket = match position {
            Some(i) => &mut self.counts[i],
            None => {
                self.counts.push(NodeTabletStateCount {
                    kind: info.tablet_type.clone(),
                    state,
                    leader,
                    count: 0,
                    identifiers: Vec::new(),
                });
                self.counts.last_mut().unwrap()
            }
        };
        bucket.count += 1;
        if (state != TabletHealth::Good || settings.report_good_tablet_ids)
            && bucket.identifiers.len() < settings.max_tablet_ids_stored
        {
            bucket.identifiers.push(info.tablet_ref());
        }
    }
}

fn classify_tablet(info: &HiveTabletInfo, settings: &TabletStateSettings) -> TabletHealth {
    if info.volatile_state == TabletVolatileState::Stopped {
        TabletHealth::Stopped
    } else if !settings.hive_synchronization_period
        && info.volatile_state != TabletVolatileState::Running
        && info.last_alive_timestamp_ms < settings.alive_barrier_ms
        && info.boot_mode == TabletBootMode::Default
    {
        TabletHealth::Dead
    } else if info.restarts_per_period >= settings.max_restarts_per_period {
        TabletHealth::RestartsTooOften
    } else {
        TabletHealth::Good
    }
}

/// One storage pool as the request sees it.
#[derive(Debug, Default, Clone)]
pub struct StoragePoolState {
    pub kind: String,
    /// Candidate group ids from whiteboards / static config.
    pub groups: BTreeSet<GroupId>,
    /// Group ids confirmed by the storage controller.
    pub authentic_groups: BTreeSet<GroupId>,
}

/// One database as the request sees it.
#[derive(Debug, Default, Clone)]
pub struct DatabaseState {
    pub hive_id: Option<TabletId>,
    /// For serverless databases: the domain key of the shared database
    /// hosting the compute.
    pub resource_domain_key: Option<DomainKey>,
    pub compute_node_ids: Vec<NodeId>,
    pub storage_pool_names: Vec<String>,
    pub merged_tablet_state: BTreeMap<(TabletId, u32), HiveTabletInfo>,
    pub merged_node_tablet_state: BTreeMap<NodeId, NodeTabletState>,
    pub storage_quota: u64,
    pub storage_usage: u64,
}

impl DatabaseState {
    pub fn add_storage_pool(&mut self, name: &str) {
        if !self.storage_pool_names.iter().any(|n| n == name) {
            self.storage_pool_names.push(name.to_string());
        }
    }
}

/// State of one system tablet the request talked to.
#[derive(Debug, Default, Clone)]
pub struct TrackedTablet {
    pub kind: TabletKind,
    pub database: String,
    pub is_unresponsive: bool,
    pub max_response_time: Duration,
}

#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub tablet_id: TabletId,
    pub key: String,
    pub started: Instant,
}

/// Ledger of tablet-bound requests: in-flight correlation plus
/// per-tablet response-time and unresponsiveness tracking.
#[derive(Debug, Default)]
pub struct TabletRequests {
    pub tablet_states: BTreeMap<TabletId, TrackedTablet>,
    pub in_flight: HashMap<u64, InFlightRequest>,
    next_request_id: u64,
}

impl TabletRequests {
    pub fn make_request(&mut self, tablet_id: TabletId, key: String) -> u64 {
        self.next_request_id += 1;
        self.in_flight.insert(
            self.next_request_id,
            InFlightRequest {
                tablet_id,
                key,
                started: Instant::now(),
            },
        );
        self.next_request_id
    }

    /// Completes an in-flight request, recording the response time.
    /// Returns the tablet id, or `None` if the request was already
    /// completed (late duplicate).
    pub fn complete_request(&mut self, request_id: u64) -> Option<TabletId> {
        let request = self.in_flight.remove(&request_id)?;
        let elapsed = request.started.elapsed();
        let tablet = self.tablet_states.entry(request.tablet_id).or_default();
        if elapsed > tablet.max_response_time {
            tablet.max_response_time = elapsed;
        }
        Some(request.tablet_id)
    }

    /// Marks everything still in flight as unresponsive. Called when
    /// the deadline fires or the request is about to reply.
    pub fn mark_in_flight_unresponsive(&mut self) {
        let tablet_ids: Vec<TabletId> =
            self.in_flight.values().map(|r| r.tablet_id).collect();
        for tablet_id in tablet_ids {
            self.tablet_states.entry(tablet_id).or_default().is_unresponsive = true;
        }
    }
}

/// Everything one self-check request knows, transport bookkeeping
/// included.
#[derive(Debug, Default)]
pub struct ClusterModel {
    pub domain_path: String,
    pub filter_database: Option<String>,

    // ── Discovery ─────────────────────────────────────────────────
    pub databases: BTreeMap<String, DatabaseState>,
    pub filter_domain_key: HashMap<DomainKey, String>,
    pub shared_databases: HashMap<DomainKey, String>,
    pub navigate_results: HashMap<String, NavigateResult>,
    pub describe_results: HashMap<String, DescribeSchemeResult>,
    pub tenant_status: HashMap<String, TenantStatusResult>,

    // ── Storage topology ──────────────────────────────────────────
    pub storage_pools: BTreeMap<String, StoragePoolState>,
    pub storage_pools_seen: HashSet<String>,
    pub merged_vdisk_state: HashMap<String, VDiskStateInfo>,
    pub valid_vdisks: HashSet<String>,
    pub merged_pdisk_state: HashMap<String, PDiskStateInfo>,
    pub valid_pdisks: HashSet<String>,
    pub merged_group_state: BTreeMap<GroupId, BsGroupStateInfo>,
    pub valid_groups: HashSet<GroupId>,
    pub base_config: Option<BaseConfig>,

    // ── Nodes ─────────────────────────────────────────────────────
    pub nodes: HashMap<NodeId, NodeDescriptor>,
    pub merged_system_state: HashMap<NodeId, SystemStateInfo>,
    pub node_ids: BTreeSet<NodeId>,
    pub storage_node_ids: BTreeSet<NodeId>,
    pub compute_node_ids: BTreeSet<NodeId>,
    pub unavailable_storage_nodes: HashSet<NodeId>,
    pub unavailable_compute_nodes: HashSet<NodeId>,

    // ── Hive ──────────────────────────────────────────────────────
    pub hive_info: BTreeMap<TabletId, HiveInfo>,
    pub hive_node_stats: BTreeMap<TabletId, Vec<HiveNodeStats>>,

    // ── Transport bookkeeping ─────────────────────────────────────
    pub tablet_requests: TabletRequests,
    pub outstanding: i64,
    pub whiteboard_answered: HashSet<(NodeId, WhiteboardKind)>,
    pub whiteboard_retries: HashMap<(NodeId, WhiteboardKind), u32>,
}

impl ClusterModel {
    /// True when the request targets one specific non-root database.
    pub fn is_specific_database_filter(&self) -> bool {
        match &self.filter_database {
            Some(path) => path != &self.domain_path,
            None => false,
        }
    }
}
