//! Response handlers: populate the cluster model as events arrive.
//!
//! Each handler mirrors one response shape. Service-level errors are
//! skipped silently; the absence of data cascades into downstream
//! issues instead of failing the request. Transport failures on
//! whiteboard requests go through the retry budget before the node is
//! written off as unavailable.

use tracing::{debug, warn};

use petrel_types::bootstrap::{BootstrapConfig, STATIC_STORAGE_POOL_NAME};
use petrel_types::snapshot::{
    BaseConfig, BsGroupStateInfo, DescribeSchemeResult, GroupId, HiveInfo, HiveNodeStats,
    NavigateResult, NodeDescriptor, NodeId, PDiskStateInfo, SelectGroupsResult, SystemStateInfo,
    TabletId, TabletKind, TenantStatusResult, VDiskStateInfo,
};

use crate::fanout::{NavigateTarget, Orchestrator, WhiteboardKind, WhiteboardPayload};
use crate::model::ClusterModel;
use crate::services::GatewayError;

/// Group ids with the dynamic bit set were allocated by the controller;
/// everything else is static configuration.
fn is_static_group_id(group_id: GroupId) -> bool {
    group_id & 0x8000_0000 == 0
}

/// Completes a tablet-bound request and unwraps its payload.
///
/// A connect failure leaves the request in flight on purpose: it will be
/// reported as "system tablet is unresponsive" when the request replies.
fn complete_tablet_request<T>(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    request_id: u64,
    result: Result<T, GatewayError>,
    name: &str,
) -> Option<T> {
    match result {
        Ok(data) => {
            if model.tablet_requests.complete_request(request_id).is_some() {
                orchestrator.request_done(model, name);
                Some(data)
            } else {
                None
            }
        }
        Err(GatewayError::Connect(error)) => {
            warn!(request = name, %error, "tablet pipe connect failed");
            orchestrator.request_done(model, name);
            None
        }
        Err(error) => {
            debug!(request = name, %error, "service-level error, response skipped");
            if model.tablet_requests.complete_request(request_id).is_some() {
                orchestrator.request_done(model, name);
            }
            None
        }
    }
}

pub fn handle_nodes_info(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    config: &BootstrapConfig,
    result: Result<Vec<NodeDescriptor>, GatewayError>,
) {
    match result {
        Ok(nodes) => {
            let need_compute_from_static_nodes = !model.is_specific_database_filter();
            let domain_path = model.domain_path.clone();
            for node in nodes {
                let node_id = node.id;
                model.nodes.insert(node_id, node);
                if need_compute_from_static_nodes && config.is_static_node(node_id) {
                    model
                        .databases
                        .entry(domain_path.clone())
                        .or_default()
                        .compute_node_ids
                        .push(node_id);
                    orchestrator.request_compute_node(model, node_id);
                }
            }
        }
        Err(error) => warn!(%error, "node directory unavailable"),
    }
    orchestrator.request_done(model, "nodes-info");
}

pub fn handle_navigate(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    config: &BootstrapConfig,
    target: NavigateTarget,
    result: Result<NavigateResult, GatewayError>,
) {
    match result {
        Ok(navigate) => {
            let path = navigate.path.clone();

            if navigate.domain_key != navigate.resources_domain_key {
                // Serverless database: its compute lives in the shared
                // database; resolve that one too, exactly once.
                if !model
                    .shared_databases
                    .contains_key(&navigate.resources_domain_key)
                {
                    model
                        .shared_databases
                        .insert(navigate.resources_domain_key, path.clone());
                    orchestrator.request_navigate_key(model, navigate.resources_domain_key);
                }
                model.databases.entry(path.clone()).or_default().resource_domain_key =
                    Some(navigate.resources_domain_key);
            }

            if let Some(hive_id) = navigate.hive_id {
                model.databases.entry(path.clone()).or_default().hive_id = Some(hive_id);
                let tracked = model.tablet_requests.tablet_states.entry(hive_id).or_default();
                tracked.database = path.clone();
                tracked.kind = TabletKind::Hive;
                orchestrator.request_hive_node_stats(model, hive_id);
                orchestrator.request_hive_info(model, hive_id);
            }

            model.filter_domain_key.insert(navigate.domain_key, path.clone());

            let scheme_shard = match navigate.scheme_shard_id {
                Some(id) => {
                    let tracked = model.tablet_requests.tablet_states.entry(id).or_default();
                    tracked.database = path.clone();
                    tracked.kind = TabletKind::SchemeShard;
                    Some(id)
                }
                None => config.root_scheme_shard_id,
            };
            model.navigate_results.insert(path.clone(), navigate);
            if let Some(scheme_shard) = scheme_shard {
                orchestrator.request_describe(model, scheme_shard, &path);
            }
        }
        Err(error) => debug!(?target, %error, "navigate failed, path skipped"),
    }
    orchestrator.request_done(model, "navigate");
}

pub fn handle_describe(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    config: &BootstrapConfig,
    request_id: u64,
    result: Result<DescribeSchemeResult, GatewayError>,
) {
    let Some(describe) = complete_tablet_request(orchestrator, model, request_id, result, "describe")
    else {
        return;
    };
    let path = describe.path.clone();
    {
        let state = model.databases.entry(path.clone()).or_default();
        for pool in &describe.storage_pools {
            state.add_storage_pool(&pool.name);
        }
        if path == model.domain_path {
            state.add_storage_pool(STATIC_STORAGE_POOL_NAME);
        }
        state.storage_usage = describe.storage_usage;
        state.storage_quota = describe.storage_quota;
    }
    for pool in &describe.storage_pools {
        model
            .storage_pools
            .entry(pool.name.clone())
            .or_default()
            .kind = pool.kind.clone();
        if let Some(controller) = config.bs_controller_id {
            orchestrator.request_select_groups(model, controller, &pool.name);
        }
    }
    model.describe_results.insert(path, describe);
}

pub fn handle_list_tenants(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    config: &BootstrapConfig,
    request_id: u64,
    result: Result<Vec<String>, GatewayError>,
) {
    let Some(paths) = complete_tablet_request(orchestrator, model, request_id, result, "list-tenants")
    else {
        return;
    };
    for path in paths {
        if let Some(console) = config.console_id {
            orchestrator.request_tenant_status(model, console, &path);
        }
        model.databases.entry(path).or_default();
    }
}

pub fn handle_tenant_status(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    request_id: u64,
    result: Result<TenantStatusResult, GatewayError>,
) {
    let Some(status) = complete_tablet_request(orchestrator, model, request_id, result, "tenant-status")
    else {
        return;
    };
    // Serverless databases are reported through their shared database
    // unless this one was asked for explicitly.
    let ignore_serverless = !model.is_specific_database_filter();
    if status.serverless && ignore_serverless {
        model.databases.remove(&status.path);
    } else {
        let path = status.path.clone();
        model.databases.entry(path.clone()).or_default();
        model.tenant_status.insert(path.clone(), status);
        orchestrator.request_navigate_path(model, &path);
    }
}

pub fn handle_select_groups(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    request_id: u64,
    result: Result<Vec<SelectGroupsResult>, GatewayError>,
) {
    let Some(matches) = complete_tablet_request(orchestrator, model, request_id, result, "select-groups")
    else {
        return;
    };
    for matching in matches {
        let pool = model
            .storage_pools
            .entry(matching.storage_pool_name.clone())
            .or_default();
        for group_id in matching.group_ids {
            pool.groups.insert(group_id);
            pool.authentic_groups.insert(group_id);
        }
    }
}

pub fn handle_base_config(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    request_id: u64,
    result: Result<BaseConfig, GatewayError>,
) {
    let Some(base_config) = complete_tablet_request(orchestrator, model, request_id, result, "base-config")
    else {
        return;
    };
    for pdisk in &base_config.pdisks {
        orchestrator.request_storage_node(model, pdisk.node_id);
    }
    model.base_config = Some(base_config);
}

pub fn handle_hive_info(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    request_id: u64,
    hive_id: TabletId,
    result: Result<HiveInfo, GatewayError>,
) {
    let Some(info) = complete_tablet_request(orchestrator, model, request_id, result, "hive-info")
    else {
        return;
    };
    model.hive_info.insert(hive_id, info);
}

pub fn handle_hive_node_stats(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    request_id: u64,
    hive_id: TabletId,
    result: Result<Vec<HiveNodeStats>, GatewayError>,
) {
    let Some(stats) = complete_tablet_request(orchestrator, model, request_id, result, "hive-node-stats")
    else {
        return;
    };
    for stat in &stats {
        orchestrator.request_compute_node(model, stat.node_id);
    }
    model.hive_node_stats.insert(hive_id, stats);
}

pub fn handle_whiteboard(
    orchestrator: &Orchestrator,
    model: &mut ClusterModel,
    node_id: NodeId,
    kind: WhiteboardKind,
    result: Result<WhiteboardPayload, GatewayError>,
) {
    if model.whiteboard_answered.contains(&(node_id, kind)) {
        // A retry already gave up or a duplicate response won the race.
        return;
    }
    match result {
        Ok(payload) => {
            model.whiteboard_answered.insert((node_id, kind));
            match payload {
                WhiteboardPayload::System(states) => populate_system_state(model, node_id, states),
                WhiteboardPayload::VDisk(states) => populate_vdisk_state(model, node_id, states),
                WhiteboardPayload::PDisk(states) => populate_pdisk_state(model, node_id, states),
                WhiteboardPayload::BsGroup(states) => populate_bsgroup_state(model, node_id, states),
            }
            orchestrator.request_done(model, kind.name());
        }
        Err(error) if error.is_transient() => {
            if !orchestrator.retry_whiteboard(model, node_id, kind) {
                warn!(%node_id, request = kind.name(), %error, "whiteboard retries exhausted");
                give_up_whiteboard(model, node_id, kind);
                orchestrator.request_done(model, kind.name());
            }
        }
        Err(error) => {
            warn!(%node_id, request = kind.name(), %error, "whiteboard request failed");
            give_up_whiteboard(model, node_id, kind);
            orchestrator.request_done(model, kind.name());
        }
    }
}

pub fn handle_retry_whiteboard(
    orchestrator: &Orchestrator,
    node_id: NodeId,
    kind: WhiteboardKind,
) {
    orchestrator.spawn_whiteboard(node_id, kind);
}

/// Marks a whiteboard target as answered-with-nothing and the node as
/// unavailable on the relevant side.
pub fn give_up_whiteboard(model: &mut ClusterModel, node_id: NodeId, kind: WhiteboardKind) {
    model.whiteboard_answered.insert((node_id, kind));
    match kind {
        WhiteboardKind::SystemState => {
            model.unavailable_compute_nodes.insert(node_id);
        }
        WhiteboardKind::VDiskState | WhiteboardKind::PDiskState => {
            model.unavailable_storage_nodes.insert(node_id);
        }
        WhiteboardKind::BsGroupState => {}
    }
}

pub fn populate_system_state(
    model: &mut ClusterModel,
    node_id: NodeId,
    states: Vec<SystemStateInfo>,
) {
    for mut state in states {
        state.node_id = node_id;
        model.merged_system_state.insert(node_id, state);
    }
}

pub fn populate_vdisk_state(
    model: &mut ClusterModel,
    node_id: NodeId,
    states: Vec<VDiskStateInfo>,
) {
    for mut state in states {
        state.node_id = node_id;
        model
            .merged_vdisk_state
            .insert(state.vdisk_id.to_string(), state);
    }
}

pub fn populate_pdisk_state(
    model: &mut ClusterModel,
    node_id: NodeId,
    states: Vec<PDiskStateInfo>,
) {
    for mut state in states {
        state.node_id = node_id;
        model.merged_pdisk_state.insert(state.pdisk_ref(), state);
    }
}

pub fn populate_bsgroup_state(
    model: &mut ClusterModel,
    node_id: NodeId,
    states: Vec<BsGroupStateInfo>,
) {
    for mut state in states {
        state.node_id = node_id;
        let group_id = state.group_id;
        let pool_name = if state.storage_pool_name.is_empty() {
            if is_static_group_id(group_id) {
                Some(STATIC_STORAGE_POOL_NAME.to_string())
            } else {
                // Dynamic group with no pool attribution yet; another
                // node's view or the controller will supply it.
                None
            }
        } else {
            Some(state.storage_pool_name.clone())
        };

        // Latest generation wins when nodes disagree.
        let newer = match model.merged_group_state.get(&group_id) {
            Some(current) => current.group_generation < state.group_generation,
            None => true,
        };
        if newer {
            model.merged_group_state.insert(group_id, state);
        }

        if let Some(pool_name) = pool_name {
            model
                .storage_pools
                .entry(pool_name)
                .or_default()
                .groups
                .insert(group_id);
        }
    }
}
