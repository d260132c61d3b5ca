//! petrel-health — the cluster self-check engine.
//!
//! For each self-check request the engine fans out to every relevant
//! control-plane and data-plane service, collects their states in
//! parallel under a single wall-clock deadline, fuses the partial
//! responses into a request-scoped cluster model, derives per-entity
//! statuses bottom-up, merges similar issues into a bounded report, and
//! produces one overall verdict. The engine is read-only and stateless
//! between requests.
//!
//! # Architecture
//!
//! ```text
//! SelfCheckActor (one per request)
//!   ├── Orchestrator — typed RPC fan-out, retries, outstanding count
//!   │     ├── tablet gateway (console, hive, scheme shard, controller)
//!   │     ├── scheme cache (path → domain resolution)
//!   │     └── node gateway (per-node whiteboards)
//!   ├── ClusterModel — databases / pools / groups / vdisks / pdisks /
//!   │                  nodes / tablets, fused from all sources
//!   ├── eval — status derivation walk (database → compute/storage →
//!   │          pool → group → vdisk → pdisk; tablets; clock skew)
//!   ├── merge — per-tag issue merging, truncation, reference cleanup
//!   └── respond — request filters + verdict mapping
//! ```

pub mod aggregate;
pub mod builder;
pub mod context;
pub mod eval;
pub mod fanout;
pub mod merge;
pub mod model;
pub mod request;
pub mod respond;
pub mod services;

pub use context::{CheckContext, IssueRecord, Tag};
pub use model::ClusterModel;
pub use request::SelfCheckActor;
pub use services::{Gateways, GatewayError, NodeGateway, SchemeCache, TabletGateway};

use std::time::Duration;

/// Default wall-clock budget for one self-check request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Back-off between whiteboard retries.
pub const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Retries per (node, whiteboard-request-type) pair.
pub const MAX_RETRIES: u32 = 3;

/// A hive younger than this is still syncing its tablet list; the
/// dead-tablet rule is suppressed for tablets it placed.
pub const HIVE_SYNCHRONIZATION_PERIOD_MS: u64 = 10_000;
