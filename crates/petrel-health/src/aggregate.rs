//! Aggregation: fuses multi-source views once the fan-out settles.
//!
//! Runs when the outstanding count reaches zero or the deadline fires.
//! Hive tablet lists are folded into per-database tablet state, hive
//! node stats extend the compute sets, and the controller base config is
//! fused with the whiteboard views. Finally the merged disk and group
//! maps are pruned down to the ids the static config or the controller
//! actually knows ("valid" sets), dropping stale whiteboard entries.

use std::collections::HashMap;

use petrel_types::snapshot::{
    BsGroupStateInfo, HiveInfo, PDiskStateInfo, TabletVolatileState, VDiskStateInfo, VSlotId,
};

use crate::model::{ClusterModel, TabletStateSettings};
use crate::HIVE_SYNCHRONIZATION_PERIOD_MS;

const TABLET_ALIVE_BARRIER_MS: u64 = 5 * 60 * 1000;

/// A hive younger than the synchronization period has not finished
/// rebuilding its tablet list; dead-tablet classification would flag
/// every tablet it has not seen again yet.
pub fn is_hive_synchronization_period(hive: &HiveInfo) -> bool {
    let uptime_ms = hive.response_time_ms.saturating_sub(hive.start_time_ms);
    uptime_ms < HIVE_SYNCHRONIZATION_PERIOD_MS
}

/// Folds hive tablet placements into per-database tablet state.
///
/// Placement is keyed by (tablet id, follower id) so leaders and
/// followers are tracked independently. Tablets that are neither
/// starting nor running are bucketed under node 0.
pub fn aggregate_hive_info(model: &mut ClusterModel, now_ms: u64) {
    let hive_info = std::mem::take(&mut model.hive_info);
    let mut settings = TabletStateSettings {
        alive_barrier_ms: now_ms.saturating_sub(TABLET_ALIVE_BARRIER_MS),
        ..Default::default()
    };
    for info in hive_info.values() {
        settings.hive_synchronization_period = is_hive_synchronization_period(info);
        for tablet in &info.tablets {
            let Some(path) = model.filter_domain_key.get(&tablet.object_domain) else {
                continue;
            };
            let Some(database) = model.databases.get_mut(path) else {
                continue;
            };
            database
                .merged_tablet_state
                .entry((tablet.tablet_id, tablet.follower_id))
                .or_insert_with(|| tablet.clone());
            let node_id = match tablet.volatile_state {
                TabletVolatileState::Starting | TabletVolatileState::Running => tablet.node_id,
                _ => 0,
            };
            database
                .merged_node_tablet_state
                .entry(node_id)
                .or_default()
                .add_tablet(tablet, &settings);
        }
    }
    model.hive_info = hive_info;
}

/// Extends per-database compute sets with the hive's node→domain view.
pub fn aggregate_hive_node_stats(model: &mut ClusterModel) {
    let hive_node_stats = std::mem::take(&mut model.hive_node_stats);
    for stats in hive_node_stats.values() {
        for stat in stats {
            let Some(domain) = stat.node_domain else {
                continue;
            };
            let Some(path) = model.filter_domain_key.get(&domain) else {
                continue;
            };
            let path = path.clone();
            model
                .databases
                .entry(path)
                .or_default()
                .compute_node_ids
                .push(stat.node_id);
        }
    }
    model.hive_node_stats = hive_node_stats;
}

/// Fuses the controller base config into the merged views, then prunes
/// every merged map down to the valid id sets.
pub fn aggregate_controller_state(model: &mut ClusterModel) {
    if let Some(config) = model.base_config.take() {
        for pdisk in &config.pdisks {
            let pdisk_ref = pdisk.pdisk_ref();
            model.valid_pdisks.insert(pdisk_ref.clone());
            model
                .merged_pdisk_state
                .entry(pdisk_ref)
                .or_insert_with(|| PDiskStateInfo {
                    node_id: pdisk.node_id,
                    pdisk_id: pdisk.pdisk_id,
                    path: pdisk.path.clone(),
                    guid: pdisk.guid,
                    category: pdisk.category,
                    total_size: pdisk.total_size,
                    available_size: pdisk.available_size,
                    state: None,
                });
        }

        let mut slots_index: HashMap<VSlotId, usize> = HashMap::new();
        for (index, vslot) in config.vslots.iter().enumerate() {
            slots_index.insert(vslot.vslot_id, index);
            let key = vslot.vdisk_key();
            let vdisk_ref = key.to_string();
            model.valid_vdisks.insert(vdisk_ref.clone());
            model
                .merged_vdisk_state
                .entry(vdisk_ref)
                .or_insert_with(|| VDiskStateInfo {
                    vdisk_id: key,
                    node_id: vslot.vslot_id.node_id,
                    pdisk_id: vslot.vslot_id.pdisk_id,
                    allocated_size: vslot.allocated_size,
                    ..Default::default()
                });
        }

        for group in &config.groups {
            model.valid_groups.insert(group.group_id);
            if !model.merged_group_state.contains_key(&group.group_id) {
                let vdisk_ids = group
                    .vslots
                    .iter()
                    .filter_map(|slot_id| slots_index.get(slot_id))
                    .map(|&index| config.vslots[index].vdisk_key())
                    .collect();
                model.merged_group_state.insert(
                    group.group_id,
                    BsGroupStateInfo {
                        group_id: group.group_id,
                        group_generation: group.group_generation,
                        erasure_species: group.erasure_species.clone(),
                        vdisk_ids,
                        ..Default::default()
                    },
                );
            }
        }

        model.base_config = Some(config);
    }

    let valid_pdisks = &model.valid_pdisks;
    model
        .merged_pdisk_state
        .retain(|id, _| valid_pdisks.contains(id));
    let valid_vdisks = &model.valid_vdisks;
    model
        .merged_vdisk_state
        .retain(|id, _| valid_vdisks.contains(id));
    let valid_groups = &model.valid_groups;
    model
        .merged_group_state
        .retain(|id, _| valid_groups.contains(id));
}
