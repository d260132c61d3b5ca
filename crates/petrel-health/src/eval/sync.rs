//! Clock-skew derivation across node pairs.
//!
//! Every node declares one measurement peer. A pair is reported at most
//! once: a node's finding is emitted only when its peer points back at
//! it (or the peer was already consumed), which keeps one issue per
//! pair instead of two.

use petrel_types::snapshot::{NodeId, SystemStateInfo};
use petrel_types::status::StatusFlag;

use crate::context::{CheckContext, Tag};
use crate::eval::{fill_node_location, EvalState};
use crate::model::ClusterModel;
use crate::respond::OverallStateContext;

const CLOCK_SKEW_RED_MICROS: u64 = 25_000;
const CLOCK_SKEW_YELLOW_MICROS: u64 = 5_000;

fn is_required_clock_skew_issue(
    model: &ClusterModel,
    eval: &EvalState,
    state: &SystemStateInfo,
) -> bool {
    let Some(peer_id) = state.clock_skew_peer_id else {
        return true;
    };
    let Some(peer_state) = model.merged_system_state.get(&peer_id) else {
        return false;
    };
    if eval.used_clock_skew_nodes.contains(&peer_id) {
        return false;
    }
    let Some(next_peer_id) = peer_state.clock_skew_peer_id else {
        return true;
    };
    if next_peer_id != state.node_id && !eval.used_clock_skew_nodes.contains(&next_peer_id) {
        return false;
    }
    true
}

fn fill_clock_skew(
    model: &ClusterModel,
    eval: &mut EvalState,
    node_id: NodeId,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("TIME");
    fill_node_location(model, node_id, &mut ctx.location.node);

    if let Some(state) = model.merged_system_state.get(&node_id) {
        if is_required_clock_skew_issue(model, eval, state) {
            eval.used_clock_skew_nodes.insert(node_id);
            if let Some(peer_id) = state.clock_skew_peer_id {
                eval.used_clock_skew_nodes.insert(peer_id);
                fill_node_location(model, peer_id, &mut ctx.location.peer);
            }
            let skew_micros = state.clock_skew_micros.unsigned_abs();
            if skew_micros > CLOCK_SKEW_RED_MICROS {
                ctx.report_status(
                    StatusFlag::Red,
                    "Time difference is more than 25 ms",
                    Tag::NodeState,
                    &[],
                );
            } else if skew_micros > CLOCK_SKEW_YELLOW_MICROS {
                ctx.report_status(
                    StatusFlag::Yellow,
                    "Time difference is more than 5 ms",
                    Tag::NodeState,
                    &[],
                );
            } else {
                ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
            }
        }
    }
    parent.absorb(ctx);
}

/// Evaluates clock skew across every node the request touched.
pub fn fill_nodes_sync_result(
    octx: &mut OverallStateContext,
    model: &ClusterModel,
    eval: &mut EvalState,
) {
    let mut sync_ctx = CheckContext::root("NODES_SYNC");
    for &node_id in &model.node_ids {
        fill_clock_skew(model, eval, node_id, &mut sync_ctx);
    }
    sync_ctx.report_with_max_child_status("Time difference exceeded", Tag::SyncState, &[Tag::NodeState]);
    octx.update_max_status(sync_ctx.overall);
    octx.add_issues(sync_ctx.records);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_pair(skew_micros: i64) -> ClusterModel {
        let mut model = ClusterModel::default();
        for (node_id, peer_id) in [(1u32, 2u32), (2, 1)] {
            model.node_ids.insert(node_id);
            model.merged_system_state.insert(
                node_id,
                SystemStateInfo {
                    node_id,
                    clock_skew_peer_id: Some(peer_id),
                    clock_skew_micros: skew_micros,
                    ..Default::default()
                },
            );
        }
        model
    }

    fn run(model: &ClusterModel) -> OverallStateContext {
        let mut octx = OverallStateContext::new();
        let mut eval = EvalState::default();
        fill_nodes_sync_result(&mut octx, model, &mut eval);
        octx
    }

    #[test]
    fn pair_reports_exactly_one_issue() {
        let model = model_with_pair(7_000);
        let octx = run(&model);
        let skew_issues: Vec<_> = octx
            .result
            .issue_log
            .iter()
            .filter(|issue| issue.message == "Time difference is more than 5 ms")
            .collect();
        assert_eq!(skew_issues.len(), 1);
        // Plus the top-level rollup.
        assert!(octx
            .result
            .issue_log
            .iter()
            .any(|issue| issue.message == "Time difference exceeded"));
        assert_eq!(octx.status, StatusFlag::Yellow);
    }

    #[test]
    fn heavy_skew_is_red() {
        let model = model_with_pair(30_000);
        let octx = run(&model);
        assert_eq!(octx.status, StatusFlag::Red);
        assert!(octx
            .result
            .issue_log
            .iter()
            .any(|issue| issue.message == "Time difference is more than 25 ms"));
    }

    #[test]
    fn small_skew_is_green() {
        let model = model_with_pair(2_000);
        let octx = run(&model);
        assert_eq!(octx.status, StatusFlag::Green);
        assert!(octx.result.issue_log.is_empty());
    }

    #[test]
    fn negative_skew_uses_magnitude() {
        let model = model_with_pair(-30_000);
        let octx = run(&model);
        assert_eq!(octx.status, StatusFlag::Red);
    }

    #[test]
    fn node_without_peer_still_reports() {
        let mut model = ClusterModel::default();
        model.node_ids.insert(1);
        model.merged_system_state.insert(
            1,
            SystemStateInfo {
                node_id: 1,
                clock_skew_peer_id: None,
                clock_skew_micros: 40_000,
                ..Default::default()
            },
        );
        let octx = run(&model);
        assert_eq!(octx.status, StatusFlag::Red);
    }

    #[test]
    fn issue_location_names_both_nodes() {
        let mut model = model_with_pair(7_000);
        model.nodes.insert(
            1,
            petrel_types::snapshot::NodeDescriptor {
                id: 1,
                host: "node-1.petrel.local".to_string(),
                port: 19001,
            },
        );
        model.nodes.insert(
            2,
            petrel_types::snapshot::NodeDescriptor {
                id: 2,
                host: "node-2.petrel.local".to_string(),
                port: 19001,
            },
        );
        let octx = run(&model);
        let issue = octx
            .result
            .issue_log
            .iter()
            .find(|issue| issue.message == "Time difference is more than 5 ms")
            .unwrap();
        assert_eq!(issue.location.node.id, 1);
        assert_eq!(issue.location.peer.id, 2);
        assert_eq!(issue.location.node.host, "node-1.petrel.local");
    }
}
