//! The evaluator: walks the aggregated model top-down and derives
//! statuses and issues for every entity.
//!
//! Walk order per database: compute (system tablets, nodes, tablets)
//! then storage (pools → groups → vdisks → pdisks), then the database
//! rollup. Cluster-wide passes follow: clock-skew pairs, the
//! "unknown database" section for pools nothing referenced, and the
//! final verdict.

pub mod compute;
pub mod storage;
pub mod sync;

use std::collections::HashSet;

use petrel_types::issue::LocationNode;
use petrel_types::result::{DatabaseStatus, SelfCheckResult};
use petrel_types::snapshot::NodeId;
use petrel_types::status::StatusFlag;

use crate::context::{CheckContext, Tag};
use crate::model::{ClusterModel, DatabaseState};
use crate::respond::OverallStateContext;

/// Mutable scratch state threaded through one evaluation pass.
#[derive(Debug, Default)]
pub struct EvalState {
    pub storage_pools_seen: HashSet<String>,
    pub used_clock_skew_nodes: HashSet<NodeId>,
}

pub(crate) fn fill_node_location(model: &ClusterModel, node_id: NodeId, out: &mut LocationNode) {
    out.id = node_id;
    if let Some(node) = model.nodes.get(&node_id) {
        out.host = node.host.clone();
        out.port = node.port;
    }
}

/// Evaluates one database into the response and the overall context.
pub fn fill_database_result(
    octx: &mut OverallStateContext,
    model: &ClusterModel,
    eval: &mut EvalState,
    path: &str,
    database: &DatabaseState,
) {
    let mut db_ctx = CheckContext::root("DATABASE");
    db_ctx.location.database.name = path.to_string();

    let mut database_status = DatabaseStatus {
        name: path.to_string(),
        ..Default::default()
    };
    compute::fill_compute(model, database, &mut database_status.compute, &mut db_ctx);
    storage::fill_storage(model, eval, database, &mut database_status.storage, &mut db_ctx);

    let compute_overall = database_status.compute.overall;
    let storage_overall = database_status.storage.overall;
    if compute_overall != StatusFlag::Green && storage_overall != StatusFlag::Green {
        db_ctx.report_status(
            compute_overall.max(storage_overall),
            "Database has multiple issues",
            Tag::DbState,
            &[Tag::ComputeState, Tag::StorageState],
        );
    } else if compute_overall != StatusFlag::Green {
        db_ctx.report_status(
            compute_overall,
            "Database has compute issues",
            Tag::DbState,
            &[Tag::ComputeState],
        );
    } else if storage_overall != StatusFlag::Green {
        db_ctx.report_status(
            storage_overall,
            "Database has storage issues",
            Tag::DbState,
            &[Tag::StorageState],
        );
    }
    database_status.overall = db_ctx.overall;
    octx.result.database_status.push(database_status);
    octx.update_max_status(db_ctx.overall);

    let has_storage_issues = db_ctx.has_tags(&[Tag::StorageState]);
    octx.add_issues(db_ctx.records);
    if !octx.has_degraded && octx.status != StatusFlag::Green && has_storage_issues {
        octx.has_degraded = true;
    }
}

/// Runs the full evaluation over the aggregated model.
pub fn fill_result(model: &ClusterModel) -> SelfCheckResult {
    let mut octx = OverallStateContext::new();
    let mut eval = EvalState::default();

    if model.is_specific_database_filter() {
        let path = model.filter_database.clone().unwrap_or_default();
        let database = model.databases.get(&path).cloned().unwrap_or_default();
        fill_database_result(&mut octx, model, &mut eval, &path, &database);
    } else {
        for (path, database) in &model.databases {
            fill_database_result(&mut octx, model, &mut eval, path, database);
        }
    }

    sync::fill_nodes_sync_result(&mut octx, model, &mut eval);

    if model.databases.is_empty() && !model.is_specific_database_filter() {
        // Nothing was discovered; still report on the system tablets of
        // the root domain.
        let mut tablet_ctx = CheckContext::root("");
        tablet_ctx.location.database.name = model.domain_path.clone();
        octx.result.database_status.push(DatabaseStatus {
            name: model.domain_path.clone(),
            ..Default::default()
        });
        compute::fill_system_tablets(model, &mut tablet_ctx);
        octx.update_max_status(tablet_ctx.overall);
    }

    if model.filter_database.is_none() {
        // Pools referenced by no database are reported under an unnamed
        // database entry.
        let unknown_pools: Vec<String> = model
            .storage_pools
            .keys()
            .filter(|name| !eval.storage_pools_seen.contains(*name))
            .cloned()
            .collect();
        if !unknown_pools.is_empty() {
            let unknown_database = DatabaseState {
                storage_pool_names: unknown_pools,
                ..Default::default()
            };
            let mut storage_ctx = CheckContext::root("");
            let mut database_status = DatabaseStatus::default();
            storage::fill_storage(
                model,
                &mut eval,
                &unknown_database,
                &mut database_status.storage,
                &mut storage_ctx,
            );
            database_status.overall = storage_ctx.overall;
            octx.result.database_status.push(database_status);
            octx.update_max_status(storage_ctx.overall);
            octx.add_issues(storage_ctx.records);
        }
    }

    octx.fill_self_check_result();
    octx.result
}

#[cfg(test)]
mod tests {
    use petrel_types::status::SelfCheck;

    use super::*;

    #[test]
    fn empty_model_reports_nothing_but_a_verdict() {
        let model = ClusterModel {
            domain_path: "/Root".to_string(),
            ..Default::default()
        };
        let result = fill_result(&model);
        // No data at all: grey maps to unspecified.
        assert_eq!(result.self_check_result, SelfCheck::Unspecified);
        // The fallback database entry for the root domain is present.
        assert_eq!(result.database_status.len(), 1);
        assert_eq!(result.database_status[0].name, "/Root");
    }

    #[test]
    fn database_with_no_compute_nodes_is_red() {
        let mut model = ClusterModel {
            domain_path: "/Root".to_string(),
            ..Default::default()
        };
        model.databases.entry("/Root/db1".to_string()).or_default();

        let result = fill_result(&model);
        assert_eq!(result.self_check_result, SelfCheck::Emergency);
        assert!(result
            .issue_log
            .iter()
            .any(|issue| issue.message == "There are no compute nodes"));
        // Storage is grey (no pools), so the rollup reports on both sides.
        assert!(result
            .issue_log
            .iter()
            .any(|issue| issue.message == "Database has multiple issues"));
    }

    #[test]
    fn issue_reasons_resolve_within_the_response() {
        let mut model = ClusterModel {
            domain_path: "/Root".to_string(),
            ..Default::default()
        };
        model.databases.entry("/Root/db1".to_string()).or_default();

        let result = fill_result(&model);
        for issue in &result.issue_log {
            for reason in &issue.reason {
                assert!(
                    result.issue_log.iter().any(|other| &other.id == reason),
                    "dangling reason {reason}"
                );
            }
        }
    }
}
