//! Storage-side derivation: pdisks, vdisks, erasure-aware groups,
//! pools, and the storage rollup.

use petrel_types::issue::LocationPDisk;
use petrel_types::result::{
    StorageGroupStatus, StoragePDiskStatus, StoragePoolStatus, StorageStatus, StorageVDiskStatus,
};
use petrel_types::snapshot::{
    pdisk_ref, BsGroupStateInfo, GroupId, PDiskState, PDiskStateInfo, VDiskState, VDiskStateInfo,
};
use petrel_types::status::{StatusFlag, WhiteboardFlag};

use crate::context::{CheckContext, Tag};
use crate::eval::EvalState;
use crate::merge::merge_records;
use crate::model::{ClusterModel, DatabaseState, StoragePoolState};

pub const ERASURE_NONE: &str = "none";
pub const ERASURE_BLOCK_4_2: &str = "block-4-2";
pub const ERASURE_MIRROR_3_DC: &str = "mirror-3-dc";

pub(crate) fn fill_pdisk_status(
    model: &ClusterModel,
    pdisk_id: &str,
    info: &PDiskStateInfo,
    pdisk_status: &mut StoragePDiskStatus,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("PDISK");
    // PDisks are shared between databases, pools, groups, and vdisks.
    ctx.location.database = Default::default();
    ctx.location.storage.pool.name.clear();
    ctx.location.storage.pool.group.id.clear();
    ctx.location.storage.pool.group.vdisk.id.clear();
    ctx.location.storage.pool.group.vdisk.pdisk = vec![LocationPDisk {
        id: pdisk_id.to_string(),
        path: info.path.clone(),
    }];
    pdisk_status.id = pdisk_id.to_string();

    match info.state {
        Some(PDiskState::Normal) => {
            ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
        }
        Some(
            state @ (PDiskState::Initial
            | PDiskState::InitialFormatRead
            | PDiskState::InitialSysLogRead
            | PDiskState::InitialCommonLogRead),
        ) => {
            ctx.report_status(
                StatusFlag::Yellow,
                &format!("PDisk state is {}", state.name()),
                Tag::PDiskState,
                &[],
            );
        }
        Some(
            state @ (PDiskState::InitialFormatReadError
            | PDiskState::InitialSysLogReadError
            | PDiskState::InitialSysLogParseError
            | PDiskState::InitialCommonLogReadError
            | PDiskState::InitialCommonLogParseError
            | PDiskState::CommonLoggerInitError
            | PDiskState::OpenFileError
            | PDiskState::ChunkQuotaError
            | PDiskState::DeviceIoError
            | PDiskState::Missing
            | PDiskState::Timeout
            | PDiskState::NodeDisconnected
            | PDiskState::Unknown),
        ) => {
            ctx.report_status(
                StatusFlag::Red,
                &format!("PDisk state is {}", state.name()),
                Tag::PDiskState,
                &[],
            );
        }
        Some(PDiskState::Reserved14 | PDiskState::Reserved15 | PDiskState::Reserved16) => {
            ctx.report_status(StatusFlag::Red, "Unknown PDisk state", Tag::None, &[]);
        }
        None => {
            if model.unavailable_storage_nodes.contains(&info.node_id) {
                let mut node_ctx = ctx.child("STORAGE_NODE");
                node_ctx.location.storage.pool = Default::default();
                node_ctx.location.storage.node.id = info.node_id;
                if let Some(node) = model.nodes.get(&info.node_id) {
                    node_ctx.location.storage.node.host = node.host.clone();
                    node_ctx.location.storage.node.port = node.port;
                }
                node_ctx.report_status(
                    StatusFlag::Red,
                    "Storage node is not available",
                    Tag::NodeState,
                    &[],
                );
                ctx.absorb(node_ctx);
            }
            ctx.report_status(
                StatusFlag::Red,
                "PDisk is not available",
                Tag::PDiskState,
                &[Tag::NodeState],
            );
        }
    }

    if info.state.is_some() && info.available_size != 0 && info.total_size != 0 {
        let available = info.available_size as f64 / info.total_size as f64;
        if available < 0.06 {
            ctx.report_status(
                StatusFlag::Red,
                "Available size is less than 6%",
                Tag::PDiskSpace,
                &[],
            );
        } else if available < 0.09 {
            ctx.report_status(
                StatusFlag::Orange,
                "Available size is less than 9%",
                Tag::PDiskSpace,
                &[],
            );
        } else if available < 0.12 {
            ctx.report_status(
                StatusFlag::Yellow,
                "Available size is less than 12%",
                Tag::PDiskSpace,
                &[],
            );
        }
    }

    pdisk_status.overall = ctx.overall;
    parent.absorb(ctx);
}

pub(crate) fn fill_vdisk_status(
    model: &ClusterModel,
    vdisk_id: &str,
    info: &VDiskStateInfo,
    vdisk_status: &mut StorageVDiskStatus,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("VDISK");
    ctx.location.storage.pool.group.vdisk.id = vec![vdisk_id.to_string()];
    // The group id is visible inside the vdisk id.
    ctx.location.storage.pool.group.id.clear();
    vdisk_status.id = vdisk_id.to_string();

    let pdisk = pdisk_ref(info.node_id, info.pdisk_id);
    if let Some(pdisk_info) = model.merged_pdisk_state.get(&pdisk) {
        let mut pdisk_status = StoragePDiskStatus::default();
        fill_pdisk_status(model, &pdisk, pdisk_info, &mut pdisk_status, &mut ctx);
        vdisk_status.pdisk = Some(pdisk_status);
    }

    let Some(state) = info.state else {
        ctx.report_status(
            StatusFlag::Red,
            "VDisk is not available",
            Tag::VDiskState,
            &[Tag::PDiskState],
        );
        vdisk_status.overall = ctx.overall;
        parent.absorb(ctx);
        return;
    };

    match state {
        VDiskState::Ok => {
            ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
        }
        VDiskState::Initial | VDiskState::SyncGuidRecovery => {
            // A starting vdisk masks whatever the pdisk walk found.
            ctx.clear_records();
            ctx.report_status(
                StatusFlag::Yellow,
                &format!("VDisk state is {}", state.name()),
                Tag::VDiskState,
                &[],
            );
            vdisk_status.overall = ctx.overall;
            parent.absorb(ctx);
            return;
        }
        VDiskState::LocalRecoveryError
        | VDiskState::SyncGuidRecoveryError
        | VDiskState::PDiskError => {
            ctx.report_status(
                StatusFlag::Red,
                &format!("VDisk state is {}", state.name()),
                Tag::VDiskState,
                &[Tag::PDiskState],
            );
            vdisk_status.overall = ctx.overall;
            parent.absorb(ctx);
            return;
        }
    }

    if !info.replicated {
        ctx.clear_records();
        ctx.report_status(StatusFlag::Blue, "Replication in progress", Tag::VDiskState, &[]);
        vdisk_status.overall = ctx.overall;
        parent.absorb(ctx);
        return;
    }

    if let Some(space) = info.disk_space {
        match space {
            WhiteboardFlag::Green => {
                if ctx.records.is_empty() {
                    ctx.report_status(StatusFlag::Green, "", Tag::None, &[]);
                } else {
                    // Degraded by the pdisk underneath.
                    let inherited = ctx.records[0].issue.status;
                    ctx.report_status(inherited, "VDisk is degraded", Tag::VDiskState, &[Tag::PDiskSpace]);
                }
            }
            WhiteboardFlag::Red => {
                ctx.report_status(
                    space.to_status(),
                    &format!("DiskSpace is {}", space.name()),
                    Tag::VDiskState,
                    &[Tag::PDiskSpace],
                );
            }
            _ => {
                ctx.report_status(
                    space.to_status(),
                    &format!("DiskSpace is {}", space.name()),
                    Tag::VDiskSpace,
                    &[Tag::PDiskSpace],
                );
            }
        }
    }

    vdisk_status.overall = ctx.overall;
    parent.absorb(ctx);
}

fn increment_for(realms: &mut Vec<(u32, i32)>, realm: u32) {
    match realms.iter_mut().find(|(id, _)| *id == realm) {
        Some((_, count)) => *count += 1,
        None => realms.push((realm, 1)),
    }
}

/// Evaluates one storage group against its erasure species.
pub(crate) fn fill_group_status(
    model: &ClusterModel,
    group_id: GroupId,
    info: &BsGroupStateInfo,
    group_status: &mut StorageGroupStatus,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("STORAGE_GROUP");
    ctx.location.storage.pool.group.id = vec![group_id.to_string()];
    group_status.id = group_id.to_string();

    let mut disks_colors = [0i32; StatusFlag::COUNT];
    let mut failed_realms: Vec<(u32, i32)> = Vec::new();
    let mut failed_disks = 0i32;

    for key in &info.vdisk_ids {
        let vdisk_id = key.to_string();
        let vdisk_info = model.merged_vdisk_state.get(&vdisk_id);
        match vdisk_info {
            Some(vdisk) => {
                ctx.location.storage.node.id = vdisk.node_id;
                match model.nodes.get(&vdisk.node_id) {
                    Some(node) => {
                        ctx.location.storage.node.host = node.host.clone();
                        ctx.location.storage.node.port = node.port;
                    }
                    None => {
                        ctx.location.storage.node.host.clear();
                        ctx.location.storage.node.port = 0;
                    }
                }
            }
            None => ctx.location.storage.node.clear(),
        }

        let mut vdisk_status = StorageVDiskStatus::default();
        let owned = vdisk_info.cloned().unwrap_or_default();
        fill_vdisk_status(model, &vdisk_id, &owned, &mut vdisk_status, &mut ctx);
        disks_colors[vdisk_status.overall as usize] += 1;
        match vdisk_status.overall {
            // Blue: the disk itself is fine but is not serving.
            // Grey: no status at all, the disk is not available.
            StatusFlag::Blue | StatusFlag::Red | StatusFlag::Grey => {
                increment_for(&mut failed_realms, key.ring);
                failed_disks += 1;
            }
            _ => {}
        }
        group_status.vdisks.push(vdisk_status);
    }

    ctx.location.storage.node.clear(); // the group has no node of its own

    // A group with descendant issues is never silently green: clamp to
    // at worst yellow before the erasure rule has its say.
    ctx.overall = ctx.overall.min(StatusFlag::Yellow);

    let blue = disks_colors[StatusFlag::Blue as usize];
    let yellow = disks_colors[StatusFlag::Yellow as usize];
    if info.erasure_species == ERASURE_NONE {
        if failed_disks > 0 {
            ctx.report_status(StatusFlag::Red, "Group failed", Tag::GroupState, &[Tag::VDiskState]);
        } else if yellow > 0 {
            ctx.report_status(StatusFlag::Yellow, "Group degraded", Tag::GroupState, &[Tag::VDiskState]);
        }
    } else if info.erasure_species == ERASURE_BLOCK_4_2 {
        if failed_disks > 2 {
            ctx.report_status(StatusFlag::Red, "Group failed", Tag::GroupState, &[Tag::VDiskState]);
        } else if failed_disks > 1 {
            ctx.report_status(
                StatusFlag::Orange,
                "Group has no redundancy",
                Tag::GroupState,
                &[Tag::VDiskState],
            );
        } else if failed_disks > 0 {
            if blue == failed_disks {
                ctx.report_status(StatusFlag::Blue, "Group degraded", Tag::GroupState, &[Tag::VDiskState]);
            } else {
                ctx.report_status(StatusFlag::Yellow, "Group degraded", Tag::GroupState, &[Tag::VDiskState]);
            }
        } else if yellow > 0 {
            ctx.report_status(StatusFlag::Yellow, "Group degraded", Tag::GroupState, &[Tag::VDiskState]);
        }
    } else if info.erasure_species == ERASURE_MIRROR_3_DC {
        if failed_realms.len() > 2
            || (failed_realms.len() == 2 && failed_realms[0].1 > 1 && failed_realms[1].1 > 1)
        {
            ctx.report_status(StatusFlag::Red, "Group failed", Tag::GroupState, &[Tag::VDiskState]);
        } else if failed_realms.len() == 2 {
            ctx.report_status(
                StatusFlag::Orange,
                "Group has no redundancy",
                Tag::GroupState,
                &[Tag::VDiskState],
            );
        } else if failed_disks > 0 {
            if blue == failed_disks {
                ctx.report_status(StatusFlag::Blue, "Group degraded", Tag::GroupState, &[Tag::VDiskState]);
            } else {
                ctx.report_status(StatusFlag::Yellow, "Group degraded", Tag::GroupState, &[Tag::VDiskState]);
            }
        } else if yellow > 0 {
            ctx.report_status(StatusFlag::Yellow, "Group degraded", Tag::GroupState, &[Tag::VDiskState]);
        }
    }

    group_status.overall = ctx.overall;
    parent.absorb(ctx);
}

pub(crate) fn fill_pool_status(
    model: &ClusterModel,
    pool_name: &str,
    pool: &StoragePoolState,
    pool_status: &mut StoragePoolStatus,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("STORAGE_POOL");
    ctx.location.storage.pool.name = pool_name.to_string();
    pool_status.id = pool_name.to_string();

    for &group_id in &pool.groups {
        if let Some(info) = model.merged_group_state.get(&group_id) {
            let mut group_status = StorageGroupStatus::default();
            fill_group_status(model, group_id, info, &mut group_status, &mut ctx);
            pool_status.groups.push(group_status);
        }
    }

    merge_records(&mut ctx.records);

    match ctx.overall {
        StatusFlag::Blue | StatusFlag::Yellow => {
            ctx.report_status(ctx.overall, "Pool degraded", Tag::PoolState, &[Tag::GroupState]);
        }
        StatusFlag::Orange => {
            ctx.report_status(ctx.overall, "Pool has no redundancy", Tag::PoolState, &[Tag::GroupState]);
        }
        StatusFlag::Red => {
            ctx.report_status(ctx.overall, "Pool failed", Tag::PoolState, &[Tag::GroupState]);
        }
        _ => {}
    }
    pool_status.overall = ctx.overall;
    parent.absorb(ctx);
}

/// Evaluates the storage side of one database.
pub fn fill_storage(
    model: &ClusterModel,
    eval: &mut EvalState,
    database: &DatabaseState,
    storage_status: &mut StorageStatus,
    parent: &mut CheckContext,
) {
    let mut ctx = parent.child("STORAGE");

    if !database.storage_pool_names.is_empty() {
        for pool_name in &database.storage_pool_names {
            let Some(pool) = model.storage_pools.get(pool_name) else {
                continue;
            };
            let mut pool = pool.clone();
            if !pool.authentic_groups.is_empty() {
                // The controller's answer overrides whatever the
                // whiteboards guessed.
                pool.groups = pool.authentic_groups.clone();
            }
            let mut pool_status = StoragePoolStatus::default();
            fill_pool_status(model, pool_name, &pool, &mut pool_status, &mut ctx);
            storage_status.pools.push(pool_status);
            eval.storage_pools_seen.insert(pool_name.clone());
        }

        match ctx.overall {
            StatusFlag::Blue | StatusFlag::Yellow => {
                ctx.report_status(ctx.overall, "Storage degraded", Tag::StorageState, &[Tag::PoolState]);
            }
            StatusFlag::Orange => {
                ctx.report_status(
                    ctx.overall,
                    "Storage has no redundancy",
                    Tag::StorageState,
                    &[Tag::PoolState],
                );
            }
            StatusFlag::Red => {
                ctx.report_status(ctx.overall, "Storage failed", Tag::StorageState, &[Tag::PoolState]);
            }
            _ => {}
        }
    }

    if database.storage_quota > 0 {
        let usage = database.storage_usage as f64 / database.storage_quota as f64;
        if usage > 0.9 {
            ctx.report_status(StatusFlag::Red, "Storage usage over 90%", Tag::StorageState, &[]);
        } else if usage > 0.85 {
            ctx.report_status(StatusFlag::Orange, "Storage usage over 85%", Tag::StorageState, &[]);
        } else if usage > 0.75 {
            ctx.report_status(StatusFlag::Yellow, "Storage usage over 75%", Tag::StorageState, &[]);
        }
    }

    storage_status.overall = ctx.overall;
    parent.absorb(ctx);
}

#[cfg(test)]
mod tests {
    use petrel_types::snapshot::VDiskKey;

    use super::*;

    fn pdisk_info(state: Option<PDiskState>, total: u64, available: u64) -> PDiskStateInfo {
        PDiskStateInfo {
            node_id: 1,
            pdisk_id: 1000,
            path: "/dev/disk/by-partlabel/petrel_disk_01".to_string(),
            total_size: total,
            available_size: available,
            state,
            ..Default::default()
        }
    }

    fn pdisk_overall(model: &ClusterModel, info: &PDiskStateInfo) -> (StatusFlag, CheckContext) {
        let mut parent = CheckContext::root("VDISK");
        let mut status = StoragePDiskStatus::default();
        fill_pdisk_status(model, "1-1000", info, &mut status, &mut parent);
        (status.overall, parent)
    }

    #[test]
    fn pdisk_state_table() {
        let model = ClusterModel::default();
        let (green, _) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::Normal), 100, 50));
        assert_eq!(green, StatusFlag::Green);

        let (yellow, ctx) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::Initial), 100, 50));
        assert_eq!(yellow, StatusFlag::Yellow);
        assert_eq!(ctx.records[0].issue.message, "PDisk state is Initial");

        let (red, ctx) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::DeviceIoError), 100, 50));
        assert_eq!(red, StatusFlag::Red);
        assert_eq!(ctx.records[0].issue.message, "PDisk state is DeviceIoError");

        let (reserved, ctx) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::Reserved14), 100, 50));
        assert_eq!(reserved, StatusFlag::Red);
        assert_eq!(ctx.records[0].issue.message, "Unknown PDisk state");
    }

    #[test]
    fn pdisk_space_thresholds() {
        let model = ClusterModel::default();
        let (red, _) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::Normal), 1000, 50));
        assert_eq!(red, StatusFlag::Red);
        let (orange, _) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::Normal), 1000, 80));
        assert_eq!(orange, StatusFlag::Orange);
        let (yellow, _) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::Normal), 1000, 110));
        assert_eq!(yellow, StatusFlag::Yellow);
        let (green, _) = pdisk_overall(&model, &pdisk_info(Some(PDiskState::Normal), 1000, 500));
        assert_eq!(green, StatusFlag::Green);
    }

    #[test]
    fn stateless_pdisk_on_unavailable_node_blames_the_node() {
        let mut model = ClusterModel::default();
        model.unavailable_storage_nodes.insert(1);
        let (overall, ctx) = pdisk_overall(&model, &pdisk_info(None, 0, 0));
        assert_eq!(overall, StatusFlag::Red);

        let node_issue = ctx
            .records
            .iter()
            .find(|r| r.tag == Tag::NodeState)
            .expect("storage node issue");
        assert_eq!(node_issue.issue.message, "Storage node is not available");

        let pdisk_issue = ctx
            .records
            .iter()
            .find(|r| r.tag == Tag::PDiskState)
            .expect("pdisk issue");
        assert_eq!(pdisk_issue.issue.message, "PDisk is not available");
        assert_eq!(pdisk_issue.issue.reason, vec![node_issue.issue.id.clone()]);
    }

    fn vdisk_info(state: Option<VDiskState>, replicated: bool) -> VDiskStateInfo {
        VDiskStateInfo {
            vdisk_id: VDiskKey {
                group_id: 0x80000000,
                group_generation: 1,
                ..Default::default()
            },
            node_id: 1,
            pdisk_id: 1000,
            state,
            replicated,
            ..Default::default()
        }
    }

    #[test]
    fn missing_vdisk_state_is_red_with_pdisk_reason() {
        let mut model = ClusterModel::default();
        model
            .merged_pdisk_state
            .insert("1-1000".to_string(), pdisk_info(Some(PDiskState::DeviceIoError), 100, 50));

        let mut parent = CheckContext::root("STORAGE_GROUP");
        let mut status = StorageVDiskStatus::default();
        fill_vdisk_status(
            &model,
            "2147483648-1-0-0-0",
            &vdisk_info(None, false),
            &mut status,
            &mut parent,
        );
        assert_eq!(status.overall, StatusFlag::Red);
        let vdisk_issue = parent
            .records
            .iter()
            .find(|r| r.tag == Tag::VDiskState)
            .unwrap();
        assert_eq!(vdisk_issue.issue.message, "VDisk is not available");
        assert_eq!(vdisk_issue.issue.reason.len(), 1);
    }

    #[test]
    fn starting_vdisk_masks_pdisk_noise() {
        let mut model = ClusterModel::default();
        model
            .merged_pdisk_state
            .insert("1-1000".to_string(), pdisk_info(Some(PDiskState::DeviceIoError), 100, 50));

        let mut parent = CheckContext::root("STORAGE_GROUP");
        let mut status = StorageVDiskStatus::default();
        fill_vdisk_status(
            &model,
            "2147483648-1-0-0-0",
            &vdisk_info(Some(VDiskState::Initial), false),
            &mut status,
            &mut parent,
        );
        // The pdisk RED still bubbles through overall, but its records
        // are masked by the transient state.
        assert_eq!(parent.records.len(), 1);
        assert_eq!(parent.records[0].issue.message, "VDisk state is Initial");
    }

    #[test]
    fn unreplicated_vdisk_is_blue() {
        let model = ClusterModel::default();
        let mut parent = CheckContext::root("STORAGE_GROUP");
        let mut status = StorageVDiskStatus::default();
        fill_vdisk_status(
            &model,
            "2147483648-1-0-0-0",
            &vdisk_info(Some(VDiskState::Ok), false),
            &mut status,
            &mut parent,
        );
        assert_eq!(status.overall, StatusFlag::Blue);
        assert_eq!(parent.records[0].issue.message, "Replication in progress");
    }

    fn group_with_disks(erasure: &str, disks: usize) -> (ClusterModel, BsGroupStateInfo) {
        let mut model = ClusterModel::default();
        let mut info = BsGroupStateInfo {
            group_id: 0x80000000,
            group_generation: 1,
            erasure_species: erasure.to_string(),
            ..Default::default()
        };
        for index in 0..disks {
            let key = VDiskKey {
                group_id: 0x80000000,
                group_generation: 1,
                ring: (index % 3) as u32,
                domain: (index / 3) as u32,
                vdisk: 0,
            };
            info.vdisk_ids.push(key);
            model.merged_vdisk_state.insert(
                key.to_string(),
                VDiskStateInfo {
                    vdisk_id: key,
                    node_id: 1,
                    pdisk_id: 1000 + index as u32,
                    state: Some(VDiskState::Ok),
                    replicated: true,
                    ..Default::default()
                },
            );
        }
        (model, info)
    }

    fn break_disk(model: &mut ClusterModel, info: &BsGroupStateInfo, index: usize) {
        let key = info.vdisk_ids[index];
        model
            .merged_vdisk_state
            .get_mut(&key.to_string())
            .unwrap()
            .state = Some(VDiskState::PDiskError);
    }

    fn group_overall(model: &ClusterModel, info: &BsGroupStateInfo) -> (StatusFlag, CheckContext) {
        let mut parent = CheckContext::root("STORAGE_POOL");
        let mut status = StorageGroupStatus::default();
        fill_group_status(model, info.group_id, info, &mut status, &mut parent);
        (status.overall, parent)
    }

    #[test]
    fn healthy_block42_group_is_green() {
        let (model, info) = group_with_disks(ERASURE_BLOCK_4_2, 8);
        let (overall, ctx) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Green);
        assert!(ctx.records.is_empty());
    }

    #[test]
    fn block42_one_failed_disk_degrades() {
        let (mut model, info) = group_with_disks(ERASURE_BLOCK_4_2, 8);
        break_disk(&mut model, &info, 0);
        let (overall, ctx) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Yellow);
        assert!(ctx
            .records
            .iter()
            .any(|r| r.tag == Tag::GroupState && r.issue.message == "Group degraded"));
    }

    #[test]
    fn block42_two_failed_disks_lose_redundancy() {
        let (mut model, info) = group_with_disks(ERASURE_BLOCK_4_2, 8);
        break_disk(&mut model, &info, 0);
        break_disk(&mut model, &info, 1);
        let (overall, ctx) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Orange);
        assert!(ctx
            .records
            .iter()
            .any(|r| r.issue.message == "Group has no redundancy"));
    }

    #[test]
    fn block42_three_failed_disks_fail_the_group() {
        let (mut model, info) = group_with_disks(ERASURE_BLOCK_4_2, 8);
        for index in 0..3 {
            break_disk(&mut model, &info, index);
        }
        let (overall, ctx) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Red);
        assert!(ctx.records.iter().any(|r| r.issue.message == "Group failed"));
    }

    #[test]
    fn no_erasure_any_failure_is_fatal() {
        let (mut model, info) = group_with_disks(ERASURE_NONE, 1);
        break_disk(&mut model, &info, 0);
        let (overall, _) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Red);
    }

    #[test]
    fn mirror3dc_two_failed_realms_lose_redundancy() {
        // Rings 0..3, three disks each.
        let (mut model, info) = group_with_disks(ERASURE_MIRROR_3_DC, 9);
        break_disk(&mut model, &info, 0); // ring 0
        break_disk(&mut model, &info, 1); // ring 1
        let (overall, _) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Orange);
    }

    #[test]
    fn mirror3dc_heavy_double_realm_failure_is_fatal() {
        let (mut model, info) = group_with_disks(ERASURE_MIRROR_3_DC, 9);
        // Two failures in ring 0 (indices 0, 3) and two in ring 1 (1, 4).
        break_disk(&mut model, &info, 0);
        break_disk(&mut model, &info, 3);
        break_disk(&mut model, &info, 1);
        break_disk(&mut model, &info, 4);
        let (overall, _) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Red);
    }

    #[test]
    fn fully_replicating_group_reports_blue() {
        let (mut model, info) = group_with_disks(ERASURE_BLOCK_4_2, 8);
        let key = info.vdisk_ids[0];
        model
            .merged_vdisk_state
            .get_mut(&key.to_string())
            .unwrap()
            .replicated = false;
        let (overall, ctx) = group_overall(&model, &info);
        assert_eq!(overall, StatusFlag::Blue);
        assert!(ctx
            .records
            .iter()
            .any(|r| r.tag == Tag::GroupState && r.issue.status == StatusFlag::Blue));
    }

    #[test]
    fn storage_usage_thresholds() {
        let model = ClusterModel::default();
        let mut eval = EvalState::default();
        let database = DatabaseState {
            storage_quota: 1000,
            storage_usage: 950,
            ..Default::default()
        };
        let mut parent = CheckContext::root("DATABASE");
        let mut status = StorageStatus::default();
        fill_storage(&model, &mut eval, &database, &mut status, &mut parent);
        assert_eq!(status.overall, StatusFlag::Red);
        assert!(parent
            .records
            .iter()
            .any(|r| r.issue.message == "Storage usage over 90%"));
    }
}
