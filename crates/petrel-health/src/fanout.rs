//! The fan-out orchestrator.
//!
//! Issues typed requests to cluster services without blocking: every
//! call is spawned as a task that reports back over the request's event
//! channel. The orchestrator keeps the outstanding count, the tablet
//! request ledger, and the per-(node, request-type) retry budget in the
//! model, so the whole request state stays in one place.

use tokio::sync::mpsc;
use tracing::error;

use petrel_types::snapshot::{
    BaseConfig, BsGroupStateInfo, DescribeSchemeResult, DomainKey, HiveInfo, HiveNodeStats,
    NavigateResult, NodeDescriptor, NodeId, PDiskStateInfo, SelectGroupsResult, SystemStateInfo,
    TabletId, TenantStatusResult, VDiskStateInfo,
};

use crate::model::ClusterModel;
use crate::services::{GatewayError, Gateways};
use crate::{MAX_RETRIES, RETRY_DELAY};

/// Which whiteboard subset a node-scoped request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhiteboardKind {
    SystemState,
    VDiskState,
    PDiskState,
    BsGroupState,
}

impl WhiteboardKind {
    pub fn name(self) -> &'static str {
        match self {
            WhiteboardKind::SystemState => "system-state",
            WhiteboardKind::VDiskState => "vdisk-state",
            WhiteboardKind::PDiskState => "pdisk-state",
            WhiteboardKind::BsGroupState => "bsgroup-state",
        }
    }
}

/// Payload of a whiteboard response.
#[derive(Debug)]
pub enum WhiteboardPayload {
    System(Vec<SystemStateInfo>),
    VDisk(Vec<VDiskStateInfo>),
    PDisk(Vec<PDiskStateInfo>),
    BsGroup(Vec<BsGroupStateInfo>),
}

/// What the target of a navigate request was, echoed back with the
/// response so failures can be attributed.
#[derive(Debug, Clone)]
pub enum NavigateTarget {
    Path(String),
    Key(DomainKey),
}

/// One delivered response (or failure), processed by the event loop one
/// at a time.
#[derive(Debug)]
pub enum Event {
    NodesInfo(Result<Vec<NodeDescriptor>, GatewayError>),
    Navigate {
        target: NavigateTarget,
        result: Result<NavigateResult, GatewayError>,
    },
    Describe {
        request_id: u64,
        result: Result<DescribeSchemeResult, GatewayError>,
    },
    ListTenants {
        request_id: u64,
        result: Result<Vec<String>, GatewayError>,
    },
    TenantStatus {
        request_id: u64,
        result: Result<TenantStatusResult, GatewayError>,
    },
    SelectGroups {
        request_id: u64,
        result: Result<Vec<SelectGroupsResult>, GatewayError>,
    },
    BaseConfig {
        request_id: u64,
        result: Result<BaseConfig, GatewayError>,
    },
    HiveInfo {
        request_id: u64,
        hive_id: TabletId,
        result: Result<HiveInfo, GatewayError>,
    },
    HiveNodeStats {
        request_id: u64,
        hive_id: TabletId,
        result: Result<Vec<HiveNodeStats>, GatewayError>,
    },
    Whiteboard {
        node_id: NodeId,
        kind: WhiteboardKind,
        result: Result<WhiteboardPayload, GatewayError>,
    },
    /// A scheduled whiteboard retry fired.
    RetryWhiteboard { node_id: NodeId, kind: WhiteboardKind },
}

/// Spawns gateway calls and accounts for them.
pub struct Orchestrator {
    gateways: Gateways,
    tx: mpsc::UnboundedSender<Event>,
}

impl Orchestrator {
    pub fn new(gateways: Gateways, tx: mpsc::UnboundedSender<Event>) -> Self {
        Orchestrator { gateways, tx }
    }

    /// Accounts one finished request; the run loop replies once the
    /// counter reaches zero. A negative counter is a logic error and is
    /// only logged.
    pub fn request_done(&self, model: &mut ClusterModel, name: &str) {
        model.outstanding -= 1;
        if model.outstanding < 0 {
            error!(request = name, outstanding = model.outstanding, "outstanding count went negative");
        }
    }

    // ── Node directory ────────────────────────────────────────────

    pub fn request_nodes_info(&self, model: &mut ClusterModel) {
        model.outstanding += 1;
        let nodes = self.gateways.nodes.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = nodes.list_nodes().await;
            let _ = tx.send(Event::NodesInfo(result));
        });
    }

    // ── Scheme cache ──────────────────────────────────────────────

    pub fn request_navigate_path(&self, model: &mut ClusterModel, path: &str) {
        model.outstanding += 1;
        let scheme_cache = self.gateways.scheme_cache.clone();
        let tx = self.tx.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            let result = scheme_cache.navigate_path(&path).await;
            let _ = tx.send(Event::Navigate {
                target: NavigateTarget::Path(path),
                result,
            });
        });
    }

    pub fn request_navigate_key(&self, model: &mut ClusterModel, key: DomainKey) {
        model.outstanding += 1;
        let scheme_cache = self.gateways.scheme_cache.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = scheme_cache.navigate_key(key).await;
            let _ = tx.send(Event::Navigate {
                target: NavigateTarget::Key(key),
                result,
            });
        });
    }

    // ── Tablet-backed services ────────────────────────────────────

    pub fn request_describe(&self, model: &mut ClusterModel, scheme_shard: TabletId, path: &str) {
        let request_id = model
            .tablet_requests
            .make_request(scheme_shard, format!("describe:{path}"));
        model.outstanding += 1;
        let tablets = self.gateways.tablets.clone();
        let tx = self.tx.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            let result = tablets.describe_scheme(scheme_shard, &path).await;
            let _ = tx.send(Event::Describe { request_id, result });
        });
    }

    pub fn request_list_tenants(&self, model: &mut ClusterModel, console: TabletId) {
        let request_id = model
            .tablet_requests
            .make_request(console, "list-tenants".to_string());
        model.outstanding += 1;
        let tablets = self.gateways.tablets.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = tablets.list_tenants(console).await;
            let _ = tx.send(Event::ListTenants { request_id, result });
        });
    }

    pub fn request_tenant_status(&self, model: &mut ClusterModel, console: TabletId, path: &str) {
        let request_id = model
            .tablet_requests
            .make_request(console, format!("tenant-status:{path}"));
        model.outstanding += 1;
        let tablets = self.gateways.tablets.clone();
        let tx = self.tx.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            let result = tablets.tenant_status(console, &path).await;
            let _ = tx.send(Event::TenantStatus { request_id, result });
        });
    }

    pub fn request_select_groups(
        &self,
        model: &mut ClusterModel,
        controller: TabletId,
        storage_pool: &str,
    ) {
        let request_id = model
            .tablet_requests
            .make_request(controller, format!("select-groups:{storage_pool}"));
        model.outstanding += 1;
        let tablets = self.gateways.tablets.clone();
        let tx = self.tx.clone();
        let storage_pool = storage_pool.to_string();
        tokio::spawn(async move {
            let result = tablets.select_groups(controller, &storage_pool).await;
            let _ = tx.send(Event::SelectGroups { request_id, result });
        });
    }

    pub fn request_base_config(&self, model: &mut ClusterModel, controller: TabletId) {
        let request_id = model
            .tablet_requests
            .make_request(controller, "base-config".to_string());
        model.outstanding += 1;
        let tablets = self.gateways.tablets.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = tablets.base_config(controller).await;
            let _ = tx.send(Event::BaseConfig { request_id, result });
        });
    }

    pub fn request_hive_info(&self, model: &mut ClusterModel, hive: TabletId) {
        let request_id = model
            .tablet_requests
            .make_request(hive, "hive-info".to_string());
        model.outstanding += 1;
        let tablets = self.gateways.tablets.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = tablets.hive_info(hive).await;
            let _ = tx.send(Event::HiveInfo {
                request_id,
                hive_id: hive,
                result,
            });
        });
    }

    pub fn request_hive_node_stats(&self, model: &mut ClusterModel, hive: TabletId) {
        let request_id = model
            .tablet_requests
            .make_request(hive, "hive-node-stats".to_string());
        model.outstanding += 1;
        let tablets = self.gateways.tablets.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = tablets.hive_node_stats(hive).await;
            let _ = tx.send(Event::HiveNodeStats {
                request_id,
                hive_id: hive,
                result,
            });
        });
    }

    // ── Per-node whiteboards ──────────────────────────────────────

    /// System-state subscription shared by compute and storage nodes.
    /// Idempotent per node.
    pub fn request_generic_node(&self, model: &mut ClusterModel, node_id: NodeId) {
        if model.node_ids.insert(node_id) {
            model.outstanding += 1;
            self.spawn_whiteboard(node_id, WhiteboardKind::SystemState);
        }
    }

    /// Idempotent per node; system state only.
    pub fn request_compute_node(&self, model: &mut ClusterModel, node_id: NodeId) {
        if model.compute_node_ids.insert(node_id) {
            self.request_generic_node(model, node_id);
        }
    }

    /// Idempotent per node; system state plus the storage subsets.
    pub fn request_storage_node(&self, model: &mut ClusterModel, node_id: NodeId) {
        if model.storage_node_ids.insert(node_id) {
            self.request_generic_node(model, node_id);
            for kind in [
                WhiteboardKind::VDiskState,
                WhiteboardKind::PDiskState,
                WhiteboardKind::BsGroupState,
            ] {
                model.outstanding += 1;
                self.spawn_whiteboard(node_id, kind);
            }
        }
    }

    pub fn spawn_whiteboard(&self, node_id: NodeId, kind: WhiteboardKind) {
        let nodes = self.gateways.nodes.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match kind {
                WhiteboardKind::SystemState => {
                    nodes.system_state(node_id).await.map(WhiteboardPayload::System)
                }
                WhiteboardKind::VDiskState => {
                    nodes.vdisk_state(node_id).await.map(WhiteboardPayload::VDisk)
                }
                WhiteboardKind::PDiskState => {
                    nodes.pdisk_state(node_id).await.map(WhiteboardPayload::PDisk)
                }
                WhiteboardKind::BsGroupState => {
                    nodes.bsgroup_state(node_id).await.map(WhiteboardPayload::BsGroup)
                }
            };
            let _ = tx.send(Event::Whiteboard { node_id, kind, result });
        });
    }

    /// Schedules one more attempt for a failed whiteboard request, if
    /// the (node, kind) pair still has retry budget. The outstanding
    /// count is unchanged either way.
    pub fn retry_whiteboard(
        &self,
        model: &mut ClusterModel,
        node_id: NodeId,
        kind: WhiteboardKind,
    ) -> bool {
        let attempts = model.whiteboard_retries.entry((node_id, kind)).or_insert(0);
        if *attempts >= MAX_RETRIES {
            return false;
        }
        *attempts += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RETRY_DELAY).await;
            let _ = tx.send(Event::RetryWhiteboard { node_id, kind });
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use petrel_types::snapshot::*;

    use super::*;
    use crate::services::{GatewayResult, NodeGateway, SchemeCache, TabletGateway};

    struct SilentTablets;

    #[async_trait]
    impl TabletGateway for SilentTablets {
        async fn describe_scheme(
            &self,
            _: TabletId,
            _: &str,
        ) -> GatewayResult<DescribeSchemeResult> {
            Err(GatewayError::Connect("unreachable".into()))
        }
        async fn list_tenants(&self, _: TabletId) -> GatewayResult<Vec<String>> {
            Err(GatewayError::Connect("unreachable".into()))
        }
        async fn tenant_status(&self, _: TabletId, _: &str) -> GatewayResult<TenantStatusResult> {
            Err(GatewayError::Connect("unreachable".into()))
        }
        async fn select_groups(
            &self,
            _: TabletId,
            _: &str,
        ) -> GatewayResult<Vec<SelectGroupsResult>> {
            Err(GatewayError::Connect("unreachable".into()))
        }
        async fn base_config(&self, _: TabletId) -> GatewayResult<BaseConfig> {
            Err(GatewayError::Connect("unreachable".into()))
        }
        async fn hive_info(&self, _: TabletId) -> GatewayResult<HiveInfo> {
            Err(GatewayError::Connect("unreachable".into()))
        }
        async fn hive_node_stats(&self, _: TabletId) -> GatewayResult<Vec<HiveNodeStats>> {
            Err(GatewayError::Connect("unreachable".into()))
        }
    }

    struct SilentSchemeCache;

    #[async_trait]
    impl SchemeCache for SilentSchemeCache {
        async fn navigate_path(&self, _: &str) -> GatewayResult<NavigateResult> {
            Err(GatewayError::Remote("not found".into()))
        }
        async fn navigate_key(&self, _: DomainKey) -> GatewayResult<NavigateResult> {
            Err(GatewayError::Remote("not found".into()))
        }
    }

    struct SilentNodes;

    #[async_trait]
    impl NodeGateway for SilentNodes {
        async fn list_nodes(&self) -> GatewayResult<Vec<NodeDescriptor>> {
            Ok(vec![])
        }
        async fn system_state(&self, _: NodeId) -> GatewayResult<Vec<SystemStateInfo>> {
            Err(GatewayError::Undelivered("whiteboard".into()))
        }
        async fn vdisk_state(&self, _: NodeId) -> GatewayResult<Vec<VDiskStateInfo>> {
            Err(GatewayError::Undelivered("whiteboard".into()))
        }
        async fn pdisk_state(&self, _: NodeId) -> GatewayResult<Vec<PDiskStateInfo>> {
            Err(GatewayError::Undelivered("whiteboard".into()))
        }
        async fn bsgroup_state(&self, _: NodeId) -> GatewayResult<Vec<BsGroupStateInfo>> {
            Err(GatewayError::Undelivered("whiteboard".into()))
        }
    }

    fn test_gateways() -> Gateways {
        Gateways {
            tablets: Arc::new(SilentTablets),
            scheme_cache: Arc::new(SilentSchemeCache),
            nodes: Arc::new(SilentNodes),
        }
    }

    #[tokio::test]
    async fn storage_node_requests_are_idempotent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(test_gateways(), tx);
        let mut model = ClusterModel::default();

        orchestrator.request_storage_node(&mut model, 5);
        // System + vdisk + pdisk + bsgroup.
        assert_eq!(model.outstanding, 4);

        orchestrator.request_storage_node(&mut model, 5);
        assert_eq!(model.outstanding, 4);

        // The node already has a system-state subscription.
        orchestrator.request_compute_node(&mut model, 5);
        assert_eq!(model.outstanding, 4);
    }

    #[tokio::test]
    async fn compute_then_storage_adds_disk_requests_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(test_gateways(), tx);
        let mut model = ClusterModel::default();

        orchestrator.request_compute_node(&mut model, 9);
        assert_eq!(model.outstanding, 1);
        orchestrator.request_storage_node(&mut model, 9);
        assert_eq!(model.outstanding, 4);
    }

    #[tokio::test]
    async fn retry_budget_is_three_per_node_and_kind() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(test_gateways(), tx);
        let mut model = ClusterModel::default();

        for _ in 0..MAX_RETRIES {
            assert!(orchestrator.retry_whiteboard(&mut model, 3, WhiteboardKind::PDiskState));
        }
        assert!(!orchestrator.retry_whiteboard(&mut model, 3, WhiteboardKind::PDiskState));
        // A different kind on the same node has its own budget.
        assert!(orchestrator.retry_whiteboard(&mut model, 3, WhiteboardKind::VDiskState));

        // The scheduled retries eventually fire as events.
        let mut fired = 0;
        while fired < 4 {
            match rx.recv().await.unwrap() {
                Event::RetryWhiteboard { .. } => fired += 1,
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn tablet_requests_register_in_flight() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(test_gateways(), tx);
        let mut model = ClusterModel::default();

        let hive = 72057594037968897u64;
        orchestrator.request_hive_info(&mut model, hive);
        assert_eq!(model.outstanding, 1);
        assert_eq!(model.tablet_requests.in_flight.len(), 1);

        // The silent gateway fails with a connect error.
        match rx.recv().await.unwrap() {
            Event::HiveInfo { hive_id, result, .. } => {
                assert_eq!(hive_id, hive);
                assert!(result.is_err());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
