//! Compute-side derivation: system tablets, per-node pool usage and
//! load, and hive-placed tablet buckets.

use std::time::Duration;

use petrel_types::result::{
    ComputeNodeStatus, ComputeStatus, ComputeTabletStatus, LoadAverageStatus, ThreadPoolStatus,
};
use petrel_types::snapshot::{NodeId, PoolStats, TabletKind};
use petrel_types::status::StatusFlag;

use crate::context::{CheckContext, Tag};
use crate::eval::fill_node_location;
use crate::model::{ClusterModel, DatabaseState, TabletHealth};

/// Worker pools whose saturation takes the whole node down with it.
const CRITICAL_POOLS: [&str; 3] = ["System", "IC", "IO"];

pub(crate) fn check_pool_usage(ctx: &mut CheckContext, pool: &PoolStats) {
    if CRITICAL_POOLS.contains(&pool.name.as_str()) {
        if pool.usage >= 0.99 {
            ctx.report_status(StatusFlag::Red, "Pool usage over 99%", Tag::OverloadState, &[]);
        } else if pool.usage >= 0.95 {
            ctx.report_status(StatusFlag::Orange, "Pool usage over 95%", Tag::OverloadState, &[]);
        } else if pool.usage >= 0.90 {
            ctx.report_status(StatusFlag::Yellow, "Pool usage over 90%", Tag::OverloadState, &[]);
        } else {
            ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
        }
    } else if pool.usage >= 0.99 {
        ctx.report_status(StatusFlag::Orange, "Pool usage over 99%", Tag::OverloadState, &[]);
    } else if pool.usage >= 0.95 {
        ctx.report_status(StatusFlag::Yellow, "Pool usage over 95%", Tag::OverloadState, &[]);
    } else {
        ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
    }
}

/// Reports on the system tablets this request talked to for the
/// database named in the context location.
pub fn fill_system_tablets(model: &ClusterModel, parent: &mut CheckContext) -> StatusFlag {
    let mut ctx = parent.child("SYSTEM_TABLET");
    let database_id = ctx.location.database.name.clone();
    for (tablet_id, tablet) in &model.tablet_requests.tablet_states {
        if tablet.database != database_id {
            continue;
        }
        ctx.location.compute.tablet = Default::default();
        if tablet.is_unresponsive || tablet.max_response_time >= Duration::from_millis(1000) {
            if tablet.kind != TabletKind::Unknown {
                ctx.location.compute.tablet.kind = tablet.kind.name().to_string();
            }
            ctx.location.compute.tablet.id.push(tablet_id.to_string());
            if tablet.is_unresponsive {
                ctx.report_status(
                    StatusFlag::Red,
                    "System tablet is unresponsive",
                    Tag::SystemTabletState,
                    &[],
                );
            } else if tablet.max_response_time >= Duration::from_millis(5000) {
                ctx.report_status(
                    StatusFlag::Orange,
                    "System tablet response time is over 5000ms",
                    Tag::SystemTabletState,
                    &[],
                );
            } else {
                ctx.report_status(
                    StatusFlag::Yellow,
                    "System tablet response time is over 1000ms",
                    Tag::SystemTabletState,
                    &[],
                );
            }
        }
    }
    let status = ctx.overall;
    parent.absorb(ctx);
    status
}

/// Reports on the tablet buckets of one node of a database.
pub(crate) fn fill_tablets(
    database: &DatabaseState,
    node_id: NodeId,
    statuses: &mut Vec<ComputeTabletStatus>,
    parent: &mut CheckContext,
) -> StatusFlag {
    let mut tablets_status = StatusFlag::Green;
    let Some(node_state) = database.merged_node_tablet_state.get(&node_id) else {
        return tablets_status;
    };
    let mut tablets_ctx = parent.child("");
    for count in &node_state.counts {
        if count.count == 0 {
            continue;
        }
        let mut ctx = tablets_ctx.child("TABLET");
        ctx.location.compute.tablet.kind = count.kind.clone();
        ctx.location.compute.tablet.count = count.count;
        ctx.location.compute.tablet.id = count.identifiers.clone();

        match count.state {
            TabletHealth::Good | TabletHealth::Stopped => {
                ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
            }
            TabletHealth::RestartsTooOften => {
                ctx.report_status(
                    StatusFlag::Red,
                    "Tablets are restarting too often",
                    Tag::TabletState,
                    &[],
                );
            }
            TabletHealth::Dead => {
                if count.leader {
                    ctx.report_status(StatusFlag::Red, "Tablets are dead", Tag::TabletState, &[]);
                } else {
                    ctx.report_status(
                        StatusFlag::Yellow,
                        "Followers are dead",
                        Tag::TabletState,
                        &[],
                    );
                }
            }
        }
        statuses.push(ComputeTabletStatus {
            kind: count.kind.clone(),
            state: count.state.name().to_string(),
            count: count.count,
            id: count.identifiers.clone(),
            overall: ctx.overall,
        });
        tablets_status = tablets_status.max(ctx.overall);
        tablets_ctx.absorb(ctx);
    }
    parent.absorb(tablets_ctx);
    tablets_status
}

pub(crate) fn fill_compute_node_status(
    model: &ClusterModel,
    node_id: NodeId,
    node_status: &mut ComputeNodeStatus,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("COMPUTE_NODE");
    fill_node_location(model, node_id, &mut ctx.location.compute.node);

    if let Some(state) = model.merged_system_state.get(&node_id) {
        for pool in &state.pool_stats {
            let mut pool_ctx = ctx.child("COMPUTE_POOL");
            pool_ctx.location.compute.pool.name = pool.name.clone();
            check_pool_usage(&mut pool_ctx, pool);
            node_status.pools.push(ThreadPoolStatus {
                name: pool.name.clone(),
                usage: pool.usage,
                overall: pool_ctx.overall,
            });
            ctx.absorb(pool_ctx);
        }

        if !state.load_average.is_empty() && state.number_of_cpus > 0 {
            let mut la_ctx = ctx.child("LOAD_AVERAGE");
            let load = state.load_average[0];
            if load > state.number_of_cpus as f64 {
                la_ctx.report_status(
                    StatusFlag::Yellow,
                    "LoadAverage above 100%",
                    Tag::OverloadState,
                    &[],
                );
            } else {
                la_ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
            }
            node_status.load = Some(LoadAverageStatus {
                load,
                cores: state.number_of_cpus,
                overall: la_ctx.overall,
            });
            ctx.absorb(la_ctx);
        }
    }
    node_status.id = node_id.to_string();
    node_status.overall = ctx.overall;
    parent.absorb(ctx);
}

/// Evaluates the compute side of one database.
pub fn fill_compute(
    model: &ClusterModel,
    database: &DatabaseState,
    compute_status: &mut ComputeStatus,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("COMPUTE");

    // Serverless databases borrow the shared database's compute.
    let mut compute_node_ids = database.compute_node_ids.clone();
    if let Some(key) = database.resource_domain_key {
        if let Some(shared_path) = model.filter_domain_key.get(&key) {
            compute_node_ids = model
                .databases
                .get(shared_path)
                .map(|shared| shared.compute_node_ids.clone())
                .unwrap_or_default();
        }
    }
    compute_node_ids.sort_unstable();
    compute_node_ids.dedup();

    if compute_node_ids.is_empty() {
        ctx.report_status(StatusFlag::Red, "There are no compute nodes", Tag::None, &[]);
    } else {
        let system_status = fill_system_tablets(model, &mut ctx);
        if system_status != StatusFlag::Green && system_status != StatusFlag::Grey {
            ctx.report_status(
                system_status,
                "Compute has issues with system tablets",
                Tag::ComputeState,
                &[Tag::SystemTabletState],
            );
        }
        for &node_id in &compute_node_ids {
            let mut node_status = ComputeNodeStatus::default();
            fill_compute_node_status(model, node_id, &mut node_status, &mut ctx);
            compute_status.nodes.push(node_status);
        }
        ctx.report_with_max_child_status("Compute is overloaded", Tag::ComputeState, &[Tag::OverloadState]);

        let mut tablets_status = StatusFlag::Green;
        compute_node_ids.push(0); // tablets currently placed nowhere
        for &node_id in &compute_node_ids {
            tablets_status =
                tablets_status.max(fill_tablets(database, node_id, &mut compute_status.tablets, &mut ctx));
        }
        if tablets_status != StatusFlag::Green {
            ctx.report_status(
                tablets_status,
                "Compute has issues with tablets",
                Tag::ComputeState,
                &[Tag::TabletState],
            );
        }
    }
    compute_status.overall = ctx.overall;
    parent.absorb(ctx);
}
