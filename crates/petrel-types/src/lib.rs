//! petrel-types — shared types for the Petrel health-check subsystem.
//!
//! Everything the self-check engine, the daemon, and the remote gateways
//! exchange lives here: the ordered status flags, the issue log and its
//! location hierarchy, the self-check result tree, the snapshot shapes
//! returned by cluster services, and the bootstrap configuration read at
//! process start. All types are plain serde structs so the monitoring
//! surface can serialize them to JSON directly.

pub mod bootstrap;
pub mod issue;
pub mod result;
pub mod snapshot;
pub mod status;

pub use bootstrap::{BootstrapConfig, StaticServiceSet, STATIC_STORAGE_POOL_NAME};
pub use issue::{IssueLog, Location};
pub use result::{SelfCheckRequest, SelfCheckResult};
pub use snapshot::{DomainKey, GroupId, NodeId, TabletId, VDiskKey};
pub use status::{SelfCheck, StatusFlag};
