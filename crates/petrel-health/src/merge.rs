//! Issue merging: collapse similar sibling issues into compact records.
//!
//! Runs per storage pool after evaluation. Similar records merge per tag
//! (groups first, then vdisks under each surviving group, then pdisks
//! under each surviving vdisk), listed ids are capped per parent, and a
//! final cleanup pass removes orphaned records and dangling reason
//! references so the report keeps referential closure.

use std::collections::{HashMap, HashSet};

use crate::context::{IssueRecord, Tag};

/// Groups of this many similar records or fewer are not worth collapsing.
pub const MERGE_IGNORE_SIZE: usize = 4;

/// Cap on `listed` ids per tag under one parent.
pub const MERGE_ISSUE_LIMIT: u32 = 10;

/// Merges, truncates, and garbage-collects a flat issue list in place.
pub fn merge_records(records: &mut Vec<IssueRecord>) {
    let mut context = MergeContext::new(std::mem::take(records));
    context.merge_level(Tag::GroupState);
    context.merge_level_under(Tag::VDiskState, Tag::GroupState);
    context.merge_level_under(Tag::PDiskState, Tag::VDiskState);
    context.truncate_under(Tag::PDiskState, Tag::VDiskState);
    context.truncate_under(Tag::VDiskState, Tag::GroupState);
    context.truncate(Tag::GroupState);
    *records = context.finish();
}

struct MergeContext {
    by_tag: HashMap<Tag, Vec<IssueRecord>>,
    removed_ids: HashSet<String>,
}

impl MergeContext {
    fn new(records: Vec<IssueRecord>) -> Self {
        let mut by_tag: HashMap<Tag, Vec<IssueRecord>> = HashMap::new();
        for record in records {
            by_tag.entry(record.tag).or_default().push(record);
        }
        MergeContext {
            by_tag,
            removed_ids: HashSet::new(),
        }
    }

    fn merge_level(&mut self, tag: Tag) {
        let records = self.by_tag.remove(&tag).unwrap_or_default();
        let merged = self.merge_list(records);
        self.by_tag.insert(tag, merged);
    }

    /// Merges level records inside each parent's children only, so
    /// records of unrelated parents never collapse together.
    fn merge_level_under(&mut self, tag: Tag, upper_tag: Tag) {
        let mut level = self.by_tag.remove(&tag).unwrap_or_default();
        let upper = self.by_tag.remove(&upper_tag).unwrap_or_default();

        for parent in &upper {
            let (children, rest) = extract_children(level, parent);
            level = rest;
            let children = if children.len() > 1 {
                self.merge_list(children)
            } else {
                children
            };
            level.extend(children);
        }

        self.by_tag.insert(tag, level);
        self.by_tag.insert(upper_tag, upper);
    }

    fn merge_list(&mut self, records: Vec<IssueRecord>) -> Vec<IssueRecord> {
        let mut handled = Vec::with_capacity(records.len());
        let mut remaining = records;
        while !remaining.is_empty() {
            let head = remaining.remove(0);
            let mut similar = vec![head];
            let mut rest = Vec::new();
            for record in remaining {
                if is_similar(&similar[0], &record) {
                    similar.push(record);
                } else {
                    rest.push(record);
                }
            }
            remaining = rest;

            if similar.len() <= MERGE_IGNORE_SIZE {
                handled.extend(similar);
            } else {
                handled.push(self.merge_into_first(similar));
            }
        }
        handled
    }

    /// Folds a group of similar records into the first one: location id
    /// arrays and reason sets union, donors are queued for removal.
    fn merge_into_first(&mut self, mut similar: Vec<IssueRecord>) -> IssueRecord {
        let mut first = similar.remove(0);
        let mut ids: HashSet<String> = HashSet::new();
        ids.insert(first.issue.id.clone());
        let mut reason_ids: HashSet<String> = first.issue.reason.iter().cloned().collect();

        for donor in similar {
            if !ids.insert(donor.issue.id.clone()) {
                continue;
            }
            let donor_location = donor.issue.location;
            match first.tag {
                Tag::GroupState => {
                    first
                        .issue
                        .location
                        .storage
                        .pool
                        .group
                        .id
                        .extend(donor_location.storage.pool.group.id);
                }
                Tag::VDiskState => {
                    first
                        .issue
                        .location
                        .storage
                        .pool
                        .group
                        .vdisk
                        .id
                        .extend(donor_location.storage.pool.group.vdisk.id);
                }
                Tag::PDiskState => {
                    first
                        .issue
                        .location
                        .storage
                        .pool
                        .group
                        .vdisk
                        .pdisk
                        .extend(donor_location.storage.pool.group.vdisk.pdisk);
                }
                _ => {}
            }
            for reason in donor.issue.reason {
                if reason_ids.insert(reason.clone()) {
                    first.issue.reason.push(reason);
                }
            }
            self.removed_ids.insert(donor.issue.id);
        }

        first.issue.count = ids.len() as u32;
        first.issue.listed = ids.len() as u32;
        first
    }

    fn truncate(&mut self, tag: Tag) {
        let mut records = self.by_tag.remove(&tag).unwrap_or_default();
        self.truncate_list(&mut records);
        self.by_tag.insert(tag, records);
    }

    fn truncate_under(&mut self, tag: Tag, upper_tag: Tag) {
        let mut level = self.by_tag.remove(&tag).unwrap_or_default();
        let upper = self.by_tag.remove(&upper_tag).unwrap_or_default();

        let mut handled = Vec::new();
        for parent in &upper {
            let (mut children, rest) = extract_children(level, parent);
            level = rest;
            self.truncate_list(&mut children);
            handled.extend(children);
        }
        level.extend(handled);

        self.by_tag.insert(tag, level);
        self.by_tag.insert(upper_tag, upper);
    }

    /// Caps the total `listed` across the records at the limit. The
    /// record crossing the cap loses its excess location ids; records
    /// past the cap fold their count into the last kept record and are
    /// removed entirely.
    fn truncate_list(&mut self, records: &mut Vec<IssueRecord>) {
        let mut common_listed = 0u32;
        let mut index = 0;
        while index < records.len() {
            if common_listed == MERGE_ISSUE_LIMIT {
                let removed = records.remove(index);
                let previous = &mut records[index - 1];
                let folded = issue_count(previous) + issue_count(&removed);
                set_issue_count(previous, folded);
                for reason in &removed.issue.reason {
                    self.removed_ids.insert(reason.clone());
                }
                self.removed_ids.insert(removed.issue.id);
            } else if common_listed + issue_listed(&records[index]) > MERGE_ISSUE_LIMIT {
                let record = &mut records[index];
                let above = common_listed + issue_listed(record) - MERGE_ISSUE_LIMIT;
                let kept = issue_listed(record) - above;
                set_issue_listed(record, kept);
                pop_location_ids(record, above);
                common_listed = MERGE_ISSUE_LIMIT;
                index += 1;
            } else {
                common_listed += issue_listed(&records[index]);
                index += 1;
            }
        }
    }

    /// Reassembles the record list, removes orphans to a fixed point,
    /// and rewrites merged messages to plural form.
    fn finish(mut self) -> Vec<IssueRecord> {
        let mut records = Vec::new();
        for tag in Tag::ALL {
            if let Some(list) = self.by_tag.remove(&tag) {
                records.extend(list);
            }
        }
        remove_unlinked(&mut records, self.removed_ids);
        rename_merged(&mut records);
        records
    }
}

fn is_similar(a: &IssueRecord, b: &IssueRecord) -> bool {
    let similar = a.issue.status == b.issue.status
        && a.issue.message == b.issue.message
        && a.issue.level == b.issue.level;
    if similar && a.tag == Tag::VDiskState {
        return a.issue.location.storage.node.id == b.issue.location.storage.node.id;
    }
    similar
}

/// Splits `records` into (children of `parent`, the rest), where a
/// child is any record the parent's reason list references.
fn extract_children(
    records: Vec<IssueRecord>,
    parent: &IssueRecord,
) -> (Vec<IssueRecord>, Vec<IssueRecord>) {
    let child_ids: HashSet<&String> = parent.issue.reason.iter().collect();
    records
        .into_iter()
        .partition(|record| child_ids.contains(&record.issue.id))
}

fn issue_count(record: &IssueRecord) -> u32 {
    if record.issue.count == 0 {
        1
    } else {
        record.issue.count
    }
}

fn set_issue_count(record: &mut IssueRecord, value: u32) {
    if record.issue.listed == 0 {
        record.issue.listed = 1;
    }
    record.issue.count = value;
}

fn issue_listed(record: &IssueRecord) -> u32 {
    if record.issue.listed == 0 {
        1
    } else {
        record.issue.listed
    }
}

fn set_issue_listed(record: &mut IssueRecord, value: u32) {
    if record.issue.count == 0 {
        record.issue.count = 1;
    }
    record.issue.listed = value;
}

fn pop_location_ids(record: &mut IssueRecord, above: u32) {
    let location = &mut record.issue.location.storage.pool.group;
    match record.tag {
        Tag::GroupState => {
            for _ in 0..above {
                location.id.pop();
            }
        }
        Tag::VDiskState => {
            for _ in 0..above {
                location.vdisk.id.pop();
            }
        }
        Tag::PDiskState => {
            for _ in 0..above {
                location.vdisk.pdisk.pop();
            }
        }
        _ => {}
    }
}

/// Deletes records queued for removal that nothing references any more,
/// cascading through their reasons, then drops dangling reason ids.
fn remove_unlinked(records: &mut Vec<IssueRecord>, mut removed_ids: HashSet<String>) {
    loop {
        let necessary: HashSet<String> = records
            .iter()
            .flat_map(|r| r.issue.reason.iter().cloned())
            .collect();

        let mut removed_any = false;
        let mut kept = Vec::with_capacity(records.len());
        for record in records.drain(..) {
            if removed_ids.contains(&record.issue.id) && !necessary.contains(&record.issue.id) {
                for reason in record.issue.reason {
                    removed_ids.insert(reason);
                }
                removed_any = true;
            } else {
                kept.push(record);
            }
        }
        *records = kept;

        if !removed_any {
            break;
        }
    }

    let existing: HashSet<String> = records.iter().map(|r| r.issue.id.clone()).collect();
    for record in records.iter_mut() {
        record.issue.reason.retain(|reason| existing.contains(reason));
    }
}

fn rename_merged(records: &mut [IssueRecord]) {
    for record in records.iter_mut() {
        if record.issue.count == 0 {
            continue;
        }
        let rules: &[(&str, &str)] = match record.tag {
            Tag::GroupState => &[
                ("Group has ", "Groups have "),
                ("Group is ", "Groups are "),
                ("Group ", "Groups "),
            ],
            Tag::VDiskState => &[
                ("VDisk has ", "VDisks have "),
                ("VDisk is ", "VDisks are "),
                ("VDisk ", "VDisks "),
            ],
            Tag::PDiskState => &[
                ("PDisk has ", "PDisks have "),
                ("PDisk is ", "PDisks are "),
                ("PDisk ", "PDisks "),
            ],
            _ => continue,
        };
        for (singular, plural) in rules {
            if let Some(rest) = record.issue.message.strip_prefix(singular) {
                record.issue.message = format!("{plural}{rest}");
                break;
            }
        }
    }
}
