//! Gateway traits for the external collaborators of a self-check.
//!
//! The engine never talks to the cluster directly; it goes through these
//! traits so the daemon can plug in real HTTP clients and tests can plug
//! in in-process mocks. Tablet-backed services (console, scheme shard,
//! hive, storage controller) hang off `TabletGateway`; per-node
//! whiteboards and the node directory hang off `NodeGateway`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use petrel_types::snapshot::{
    BaseConfig, BsGroupStateInfo, DescribeSchemeResult, DomainKey, HiveInfo, HiveNodeStats,
    NavigateResult, NodeDescriptor, NodeId, PDiskStateInfo, SelectGroupsResult, SystemStateInfo,
    TabletId, TenantStatusResult, VDiskStateInfo,
};

/// Transport or service failure of a gateway call.
///
/// `Undelivered` and `Disconnected` are transient: the orchestrator
/// retries them. `Connect` means the tablet pipe could not be opened at
/// all; `Remote` is a service-level error and is never retried.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request was not delivered: {0}")]
    Undelivered(String),
    #[error("node disconnected: {0}")]
    Disconnected(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("remote error: {0}")]
    Remote(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Undelivered(_) | GatewayError::Disconnected(_)
        )
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Requests served by cluster tablets, addressed by tablet id.
#[async_trait]
pub trait TabletGateway: Send + Sync {
    /// Scheme shard: pool names, kinds, storage usage and quota.
    async fn describe_scheme(&self, tablet: TabletId, path: &str)
        -> GatewayResult<DescribeSchemeResult>;

    /// Console: paths of all tenant databases.
    async fn list_tenants(&self, tablet: TabletId) -> GatewayResult<Vec<String>>;

    /// Console: status of one tenant database.
    async fn tenant_status(&self, tablet: TabletId, path: &str)
        -> GatewayResult<TenantStatusResult>;

    /// Storage controller: groups matching a storage pool.
    async fn select_groups(
        &self,
        tablet: TabletId,
        storage_pool: &str,
    ) -> GatewayResult<Vec<SelectGroupsResult>>;

    /// Storage controller: the canonical pdisk/vslot/group configuration.
    async fn base_config(&self, tablet: TabletId) -> GatewayResult<BaseConfig>;

    /// Hive: tablet placements, followers included.
    async fn hive_info(&self, tablet: TabletId) -> GatewayResult<HiveInfo>;

    /// Hive: per-node domain membership.
    async fn hive_node_stats(&self, tablet: TabletId) -> GatewayResult<Vec<HiveNodeStats>>;
}

/// Path and path-id resolution through the scheme cache.
#[async_trait]
pub trait SchemeCache: Send + Sync {
    async fn navigate_path(&self, path: &str) -> GatewayResult<NavigateResult>;

    async fn navigate_key(&self, key: DomainKey) -> GatewayResult<NavigateResult>;
}

/// The cluster node directory and the per-node whiteboards.
#[async_trait]
pub trait NodeGateway: Send + Sync {
    async fn list_nodes(&self) -> GatewayResult<Vec<NodeDescriptor>>;

    async fn system_state(&self, node: NodeId) -> GatewayResult<Vec<SystemStateInfo>>;

    async fn vdisk_state(&self, node: NodeId) -> GatewayResult<Vec<VDiskStateInfo>>;

    async fn pdisk_state(&self, node: NodeId) -> GatewayResult<Vec<PDiskStateInfo>>;

    async fn bsgroup_state(&self, node: NodeId) -> GatewayResult<Vec<BsGroupStateInfo>>;
}

/// Bundle of gateway handles a request fans out through.
#[derive(Clone)]
pub struct Gateways {
    pub tablets: Arc<dyn TabletGateway>,
    pub scheme_cache: Arc<dyn SchemeCache>,
    pub nodes: Arc<dyn NodeGateway>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::Undelivered("wb".into()).is_transient());
        assert!(GatewayError::Disconnected("node 5".into()).is_transient());
        assert!(!GatewayError::Connect("pipe".into()).is_transient());
        assert!(!GatewayError::Remote("status != ok".into()).is_transient());
    }
}
