//! Evaluation contexts and issue records.
//!
//! The evaluator walks the cluster model with a tree of `CheckContext`
//! values. Each context owns a location prefix, a nesting level, a type
//! string, and the issues reported under it. Closing a subtree is
//! explicit: the parent absorbs the child's records and bubbles its
//! overall status via max.

use sha2::{Digest, Sha256};

use petrel_types::issue::{IssueLog, Location};
use petrel_types::status::StatusFlag;

/// Coarse issue category used by the merger to group similar issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    None,
    DbState,
    StorageState,
    PoolState,
    GroupState,
    VDiskState,
    PDiskState,
    NodeState,
    VDiskSpace,
    PDiskSpace,
    ComputeState,
    TabletState,
    SystemTabletState,
    OverloadState,
    SyncState,
}

impl Tag {
    /// Every tag, in a fixed order the merger uses to reassemble records.
    pub const ALL: [Tag; 15] = [
        Tag::None,
        Tag::DbState,
        Tag::StorageState,
        Tag::PoolState,
        Tag::GroupState,
        Tag::VDiskState,
        Tag::PDiskState,
        Tag::NodeState,
        Tag::VDiskSpace,
        Tag::PDiskSpace,
        Tag::ComputeState,
        Tag::TabletState,
        Tag::SystemTabletState,
        Tag::OverloadState,
        Tag::SyncState,
    ];
}

/// One reported issue plus the tag the merger groups it by.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    pub issue: IssueLog,
    pub tag: Tag,
}

/// A node of the evaluation tree.
#[derive(Debug, Default, Clone)]
pub struct CheckContext {
    pub location: Location,
    pub level: u32,
    pub kind: String,
    pub overall: StatusFlag,
    pub records: Vec<IssueRecord>,
}

impl CheckContext {
    /// Root context for a top-level section (level 1).
    pub fn root(kind: &str) -> Self {
        CheckContext {
            level: 1,
            kind: kind.to_string(),
            overall: StatusFlag::Grey,
            ..Default::default()
        }
    }

    /// Child context one level deeper, inheriting the location prefix.
    pub fn child(&self, kind: &str) -> Self {
        CheckContext {
            location: self.location.clone(),
            level: self.level + 1,
            kind: kind.to_string(),
            overall: StatusFlag::Grey,
            records: Vec::new(),
        }
    }

    /// Absorbs a finished child: status bubbles via max, records move up.
    pub fn absorb(&mut self, child: CheckContext) {
        if child.overall >= self.overall {
            self.overall = child.overall;
        }
        self.records.extend(child.records);
    }

    /// Reports a status for this context.
    ///
    /// Non-green statuses append an issue record anchored at the current
    /// location. `include_tags` selects already-reported records whose
    /// ids become this issue's `reason` list.
    pub fn report_status(
        &mut self,
        status: StatusFlag,
        message: &str,
        set_tag: Tag,
        include_tags: &[Tag],
    ) {
        self.overall = self.overall.max(status);
        if !status.is_error() {
            return;
        }

        let mut reason: Vec<String> = Vec::new();
        if !include_tags.is_empty() {
            for record in &self.records {
                if include_tags.contains(&record.tag) {
                    reason.push(record.issue.id.clone());
                }
            }
        }
        reason.sort();
        reason.dedup();

        let mut issue = IssueLog {
            status,
            message: message.to_string(),
            location: self.location.clone(),
            reason,
            kind: self.kind.clone(),
            level: self.level,
            ..Default::default()
        };
        issue.id = issue_id(&issue);
        self.records.insert(0, IssueRecord {
            issue,
            tag: set_tag,
        });
    }

    pub fn has_tags(&self, tags: &[Tag]) -> bool {
        self.records.iter().any(|r| tags.contains(&r.tag))
    }

    pub fn find_max_status(&self, tags: &[Tag]) -> StatusFlag {
        let mut status = StatusFlag::Grey;
        for record in &self.records {
            if tags.contains(&record.tag) {
                status = status.max(record.issue.status);
            }
        }
        status
    }

    /// Reports the max status of matching child records, but only when
    /// at least one such record exists.
    pub fn report_with_max_child_status(
        &mut self,
        message: &str,
        set_tag: Tag,
        include_tags: &[Tag],
    ) {
        if self.has_tags(include_tags) {
            self.report_status(self.find_max_status(include_tags), message, set_tag, include_tags);
        }
    }

    /// Drops accumulated records; used when a transient state masks
    /// whatever was derived below it.
    pub fn clear_records(&mut self) {
        self.records.clear();
    }
}

/// Four hex digits derived from `data`, used inside issue ids.
fn digest16(data: &str) -> String {
    hex::encode(&Sha256::digest(data.as_bytes())[..2])
}

/// Derives the stable issue id from the status and the location.
///
/// Two issues with identical derivations deliberately collide to one id;
/// the responder dedupes by id before emitting.
pub fn issue_id(issue: &IssueLog) -> String {
    let mut id = issue.status.name().to_string();
    let location = &issue.location;

    if !location.database.name.is_empty() {
        id.push('-');
        id.push_str(&digest16(&location.database.name));
    }
    id.push('-');
    id.push_str(&digest16(&issue.message));

    let storage_node = &location.storage.node;
    if storage_node.id != 0 {
        id.push_str(&format!("-{}", storage_node.id));
    } else {
        if !storage_node.host.is_empty() {
            id.push_str(&format!("-{}", storage_node.host));
        }
        if storage_node.port != 0 {
            id.push_str(&format!("-{}", storage_node.port));
        }
    }

    let pool = &location.storage.pool;
    if let Some(vdisk_id) = pool.group.vdisk.id.first() {
        id.push_str(&format!("-{vdisk_id}"));
    } else if let Some(group_id) = pool.group.id.first() {
        id.push_str(&format!("-{group_id}"));
    } else if !pool.name.is_empty() {
        id.push('-');
        id.push_str(&digest16(&pool.name));
    }
    if let Some(pdisk) = pool.group.vdisk.pdisk.first() {
        if !pdisk.id.is_empty() {
            id.push_str(&format!("-{}", pdisk.id));
        }
    }

    let compute_node = &location.compute.node;
    if compute_node.id != 0 {
        id.push_str(&format!("-{}", compute_node.id));
    } else {
        if !compute_node.host.is_empty() {
            id.push_str(&format!("-{}", compute_node.host));
        }
        if compute_node.port != 0 {
            id.push_str(&format!("-{}", compute_node.port));
        }
    }
    if !location.compute.pool.name.is_empty() {
        id.push_str(&format!("-{}", location.compute.pool.name));
    }
    if !location.compute.tablet.kind.is_empty() {
        id.push_str(&format!("-{}", location.compute.tablet.kind));
    }

    id
}
