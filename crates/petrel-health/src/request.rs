//! The per-request actor: bootstrap, event loop, reply.
//!
//! One `SelfCheckActor` serves one self-check request. Bootstrap
//! snapshots the static configuration and fires the initial fan-out;
//! the event loop applies responses one at a time until everything
//! answered or the single wall-clock deadline fires; reply aggregates,
//! evaluates, filters, and returns the report. The deadline is terminal
//! and the report it produces is the partial-failure contract.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use petrel_types::bootstrap::BootstrapConfig;
use petrel_types::result::{SelfCheckRequest, SelfCheckResult};
use petrel_types::snapshot::{pdisk_ref, PDiskStateInfo, TabletKind, VDiskStateInfo};

use crate::aggregate::{aggregate_controller_state, aggregate_hive_info, aggregate_hive_node_stats};
use crate::builder;
use crate::eval;
use crate::fanout::{Event, Orchestrator, WhiteboardKind};
use crate::model::ClusterModel;
use crate::respond::apply_filters;
use crate::services::Gateways;
use crate::DEFAULT_TIMEOUT;

pub struct SelfCheckActor {
    orchestrator: Orchestrator,
    events: mpsc::UnboundedReceiver<Event>,
    config: Arc<BootstrapConfig>,
    request: SelfCheckRequest,
    model: ClusterModel,
}

impl SelfCheckActor {
    pub fn new(gateways: Gateways, config: Arc<BootstrapConfig>, request: SelfCheckRequest) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        SelfCheckActor {
            orchestrator: Orchestrator::new(gateways, tx),
            events,
            config,
            request,
            model: ClusterModel::default(),
        }
    }

    /// Runs the request to completion and returns the report.
    pub async fn run(mut self) -> SelfCheckResult {
        let timeout = self
            .request
            .operation_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);
        let deadline = Instant::now() + timeout;

        self.bootstrap();

        while self.model.outstanding > 0 {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    debug!(outstanding = self.model.outstanding, "deadline fired, replying with partial state");
                    break;
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
            }
        }

        self.reply()
    }

    fn bootstrap(&mut self) {
        let config = self.config.clone();
        self.model.filter_database = self.request.database.clone();
        self.model.domain_path = config.domain_path();
        let domain_path = self.model.domain_path.clone();

        if let Some(console) = config.console_id {
            let tracked = self.model.tablet_requests.tablet_states.entry(console).or_default();
            tracked.database = domain_path.clone();
            tracked.kind = TabletKind::Console;
            match self.model.filter_database.clone() {
                None => {
                    self.model.databases.entry(domain_path.clone()).or_default();
                    self.orchestrator.request_navigate_path(&mut self.model, &domain_path);
                    self.orchestrator.request_list_tenants(&mut self.model, console);
                }
                Some(filter) if filter != domain_path => {
                    self.orchestrator.request_tenant_status(&mut self.model, console, &filter);
                }
                Some(_) => {
                    self.model.databases.entry(domain_path.clone()).or_default();
                    self.orchestrator.request_navigate_path(&mut self.model, &domain_path);
                }
            }
        }

        if let Some(hive) = config.root_hive_id {
            let tracked = self.model.tablet_requests.tablet_states.entry(hive).or_default();
            tracked.database = domain_path.clone();
            tracked.kind = TabletKind::Hive;
            self.orchestrator.request_hive_node_stats(&mut self.model, hive);
            self.orchestrator.request_hive_info(&mut self.model, hive);
        }

        if let Some(scheme_shard) = config.root_scheme_shard_id {
            if !self.model.is_specific_database_filter() {
                let tracked = self
                    .model
                    .tablet_requests
                    .tablet_states
                    .entry(scheme_shard)
                    .or_default();
                tracked.database = domain_path.clone();
                tracked.kind = TabletKind::SchemeShard;
                self.orchestrator.request_describe(&mut self.model, scheme_shard, &domain_path);
            }
        }

        if let Some(controller) = config.bs_controller_id {
            let tracked = self
                .model
                .tablet_requests
                .tablet_states
                .entry(controller)
                .or_default();
            tracked.database = domain_path.clone();
            tracked.kind = TabletKind::BsController;
            self.orchestrator.request_base_config(&mut self.model, controller);
        }

        // Snapshot the static blob-storage configuration into the model.
        for pdisk in &config.static_service_set.pdisks {
            let id = pdisk_ref(pdisk.node_id, pdisk.pdisk_id);
            self.model.valid_pdisks.insert(id.clone());
            self.model
                .merged_pdisk_state
                .entry(id)
                .or_insert_with(|| PDiskStateInfo {
                    node_id: pdisk.node_id,
                    pdisk_id: pdisk.pdisk_id,
                    path: pdisk.path.clone(),
                    guid: pdisk.guid,
                    category: pdisk.category,
                    ..Default::default()
                });
            self.orchestrator.request_storage_node(&mut self.model, pdisk.node_id);
        }
        for vdisk in &config.static_service_set.vdisks {
            let id = vdisk.vdisk_id.to_string();
            self.model.valid_vdisks.insert(id.clone());
            self.model
                .merged_vdisk_state
                .entry(id)
                .or_insert_with(|| VDiskStateInfo {
                    vdisk_id: vdisk.vdisk_id,
                    node_id: vdisk.node_id,
                    pdisk_id: vdisk.pdisk_id,
                    ..Default::default()
                });
        }
        for group in &config.static_service_set.groups {
            self.model.valid_groups.insert(group.group_id);
            let pool_name = group.pool_name().to_string();
            self.model
                .storage_pools
                .entry(pool_name.clone())
                .or_default()
                .groups
                .insert(group.group_id);
            if !self.model.is_specific_database_filter() {
                self.model
                    .databases
                    .entry(domain_path.clone())
                    .or_default()
                    .add_storage_pool(&pool_name);
            }
        }

        self.orchestrator.request_nodes_info(&mut self.model);
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::NodesInfo(result) => {
                builder::handle_nodes_info(&self.orchestrator, &mut self.model, &self.config, result);
            }
            Event::Navigate { target, result } => {
                builder::handle_navigate(&self.orchestrator, &mut self.model, &self.config, target, result);
            }
            Event::Describe { request_id, result } => {
                builder::handle_describe(&self.orchestrator, &mut self.model, &self.config, request_id, result);
            }
            Event::ListTenants { request_id, result } => {
                builder::handle_list_tenants(&self.orchestrator, &mut self.model, &self.config, request_id, result);
            }
            Event::TenantStatus { request_id, result } => {
                builder::handle_tenant_status(&self.orchestrator, &mut self.model, request_id, result);
            }
            Event::SelectGroups { request_id, result } => {
                builder::handle_select_groups(&self.orchestrator, &mut self.model, request_id, result);
            }
            Event::BaseConfig { request_id, result } => {
                builder::handle_base_config(&self.orchestrator, &mut self.model, request_id, result);
            }
            Event::HiveInfo { request_id, hive_id, result } => {
                builder::handle_hive_info(&self.orchestrator, &mut self.model, request_id, hive_id, result);
            }
            Event::HiveNodeStats { request_id, hive_id, result } => {
                builder::handle_hive_node_stats(&self.orchestrator, &mut self.model, request_id, hive_id, result);
            }
            Event::Whiteboard { node_id, kind, result } => {
                builder::handle_whiteboard(&self.orchestrator, &mut self.model, node_id, kind, result);
            }
            Event::RetryWhiteboard { node_id, kind } => {
                builder::handle_retry_whiteboard(&self.orchestrator, node_id, kind);
            }
        }
    }

    /// Aggregate + Reply: terminal state of the request.
    fn reply(mut self) -> SelfCheckResult {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        aggregate_hive_info(&mut self.model, now_ms);
        aggregate_hive_node_stats(&mut self.model);
        aggregate_controller_state(&mut self.model);

        // Anything still in flight missed the deadline.
        self.model.tablet_requests.mark_in_flight_unresponsive();
        for &node_id in &self.model.node_ids {
            if !self
                .model
                .whiteboard_answered
                .contains(&(node_id, WhiteboardKind::SystemState))
            {
                self.model.unavailable_compute_nodes.insert(node_id);
            }
        }
        for &node_id in &self.model.storage_node_ids {
            for kind in [WhiteboardKind::VDiskState, WhiteboardKind::PDiskState] {
                if !self.model.whiteboard_answered.contains(&(node_id, kind)) {
                    self.model.unavailable_storage_nodes.insert(node_id);
                }
            }
        }

        let mut result = eval::fill_result(&self.model);
        apply_filters(&mut result, &self.request);
        result
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use petrel_types::snapshot::*;
    use petrel_types::status::SelfCheck;

    use super::*;
    use crate::services::{GatewayError, GatewayResult, NodeGateway, SchemeCache, TabletGateway};

    /// Tablets that never answer; nodes that answer instantly.
    struct BlackHoleTablets;

    #[async_trait]
    impl TabletGateway for BlackHoleTablets {
        async fn describe_scheme(&self, _: TabletId, _: &str) -> GatewayResult<DescribeSchemeResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
        async fn list_tenants(&self, _: TabletId) -> GatewayResult<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
        async fn tenant_status(&self, _: TabletId, _: &str) -> GatewayResult<TenantStatusResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
        async fn select_groups(&self, _: TabletId, _: &str) -> GatewayResult<Vec<SelectGroupsResult>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
        async fn base_config(&self, _: TabletId) -> GatewayResult<BaseConfig> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
        async fn hive_info(&self, _: TabletId) -> GatewayResult<HiveInfo> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
        async fn hive_node_stats(&self, _: TabletId) -> GatewayResult<Vec<HiveNodeStats>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    struct EmptySchemeCache;

    #[async_trait]
    impl SchemeCache for EmptySchemeCache {
        async fn navigate_path(&self, _: &str) -> GatewayResult<NavigateResult> {
            Err(GatewayError::Remote("no entry".into()))
        }
        async fn navigate_key(&self, _: DomainKey) -> GatewayResult<NavigateResult> {
            Err(GatewayError::Remote("no entry".into()))
        }
    }

    struct EmptyNodes;

    #[async_trait]
    impl NodeGateway for EmptyNodes {
        async fn list_nodes(&self) -> GatewayResult<Vec<NodeDescriptor>> {
            Ok(vec![])
        }
        async fn system_state(&self, _: NodeId) -> GatewayResult<Vec<SystemStateInfo>> {
            Ok(vec![])
        }
        async fn vdisk_state(&self, _: NodeId) -> GatewayResult<Vec<VDiskStateInfo>> {
            Ok(vec![])
        }
        async fn pdisk_state(&self, _: NodeId) -> GatewayResult<Vec<PDiskStateInfo>> {
            Ok(vec![])
        }
        async fn bsgroup_state(&self, _: NodeId) -> GatewayResult<Vec<BsGroupStateInfo>> {
            Ok(vec![])
        }
    }

    fn gateways() -> Gateways {
        Gateways {
            tablets: Arc::new(BlackHoleTablets),
            scheme_cache: Arc::new(EmptySchemeCache),
            nodes: Arc::new(EmptyNodes),
        }
    }

    #[tokio::test]
    async fn empty_cluster_completes_without_deadline() {
        let config = Arc::new(BootstrapConfig {
            domain_name: "Root".to_string(),
            ..Default::default()
        });
        let actor = SelfCheckActor::new(gateways(), config, SelfCheckRequest::default());
        let result = actor.run().await;
        assert_eq!(result.self_check_result, SelfCheck::Unspecified);
    }

    #[tokio::test]
    async fn silent_hive_becomes_unresponsive_at_deadline() {
        let config = Arc::new(BootstrapConfig {
            domain_name: "Root".to_string(),
            root_hive_id: Some(72057594037968897),
            ..Default::default()
        });
        let request = SelfCheckRequest {
            operation_timeout_ms: Some(100),
            ..Default::default()
        };
        let actor = SelfCheckActor::new(gateways(), config, request);
        let result = actor.run().await;
        // The hive never answered: the fallback system-tablet walk sees
        // it as unresponsive and the verdict escalates.
        assert_eq!(result.self_check_result, SelfCheck::Emergency);
    }
}
