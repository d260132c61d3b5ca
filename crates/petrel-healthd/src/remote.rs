//! JSON-over-HTTP gateway implementations.
//!
//! One `RemoteGateway` serves all three gateway traits against the
//! control-plane monitoring proxy: tablet-backed services under
//! `/tablets/{id}/…`, the scheme cache under `/scheme-cache/…`, and the
//! node directory plus per-node whiteboards under `/cluster/nodes/…`.
//! The shared `reqwest` client carries the per-call timeout and the
//! connection pool.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use petrel_health::services::{GatewayError, GatewayResult, NodeGateway, SchemeCache, TabletGateway};
use petrel_types::snapshot::{
    BaseConfig, BsGroupStateInfo, DescribeSchemeResult, DomainKey, HiveInfo, HiveNodeStats,
    NavigateResult, NodeDescriptor, NodeId, PDiskStateInfo, SelectGroupsResult, SystemStateInfo,
    TabletId, TenantStatusResult, VDiskStateInfo,
};

#[derive(Clone)]
pub struct RemoteGateway {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteGateway {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RemoteGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        classify: fn(reqwest::Error) -> GatewayError,
    ) -> GatewayResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(classify)?;
        if !response.status().is_success() {
            return Err(GatewayError::Remote(format!("{url}: {}", response.status())));
        }
        response
            .json::<T>()
            .await
            .map_err(|error| GatewayError::Remote(error.to_string()))
    }
}

/// A tablet that cannot be reached maps to a pipe connect failure; the
/// rest are service-level errors.
fn classify_tablet_error(error: reqwest::Error) -> GatewayError {
    if error.is_connect() {
        GatewayError::Connect(error.to_string())
    } else if error.is_timeout() {
        GatewayError::Undelivered(error.to_string())
    } else {
        GatewayError::Remote(error.to_string())
    }
}

/// Node-scoped failures are transient: the orchestrator retries them.
fn classify_node_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Undelivered(error.to_string())
    } else if error.is_connect() {
        GatewayError::Disconnected(error.to_string())
    } else {
        GatewayError::Remote(error.to_string())
    }
}

#[async_trait]
impl TabletGateway for RemoteGateway {
    async fn describe_scheme(
        &self,
        tablet: TabletId,
        path: &str,
    ) -> GatewayResult<DescribeSchemeResult> {
        self.get_json(
            &format!("/tablets/{tablet}/describe-scheme"),
            &[("path", path.to_string())],
            classify_tablet_error,
        )
        .await
    }

    async fn list_tenants(&self, tablet: TabletId) -> GatewayResult<Vec<String>> {
        self.get_json(&format!("/tablets/{tablet}/tenants"), &[], classify_tablet_error)
            .await
    }

    async fn tenant_status(
        &self,
        tablet: TabletId,
        path: &str,
    ) -> GatewayResult<TenantStatusResult> {
        self.get_json(
            &format!("/tablets/{tablet}/tenant-status"),
            &[("path", path.to_string())],
            classify_tablet_error,
        )
        .await
    }

    async fn select_groups(
        &self,
        tablet: TabletId,
        storage_pool: &str,
    ) -> GatewayResult<Vec<SelectGroupsResult>> {
        self.get_json(
            &format!("/tablets/{tablet}/select-groups"),
            &[("pool", storage_pool.to_string())],
            classify_tablet_error,
        )
        .await
    }

    async fn base_config(&self, tablet: TabletId) -> GatewayResult<BaseConfig> {
        self.get_json(&format!("/tablets/{tablet}/base-config"), &[], classify_tablet_error)
            .await
    }

    async fn hive_info(&self, tablet: TabletId) -> GatewayResult<HiveInfo> {
        self.get_json(&format!("/tablets/{tablet}/hive-info"), &[], classify_tablet_error)
            .await
    }

    async fn hive_node_stats(&self, tablet: TabletId) -> GatewayResult<Vec<HiveNodeStats>> {
        self.get_json(
            &format!("/tablets/{tablet}/hive-node-stats"),
            &[],
            classify_tablet_error,
        )
        .await
    }
}

#[async_trait]
impl SchemeCache for RemoteGateway {
    async fn navigate_path(&self, path: &str) -> GatewayResult<NavigateResult> {
        self.get_json(
            "/scheme-cache/navigate",
            &[("path", path.to_string())],
            classify_tablet_error,
        )
        .await
    }

    async fn navigate_key(&self, key: DomainKey) -> GatewayResult<NavigateResult> {
        self.get_json(
            "/scheme-cache/navigate-key",
            &[
                ("owner", key.owner_id.to_string()),
                ("path", key.local_path_id.to_string()),
            ],
            classify_tablet_error,
        )
        .await
    }
}

#[async_trait]
impl NodeGateway for RemoteGateway {
    async fn list_nodes(&self) -> GatewayResult<Vec<NodeDescriptor>> {
        self.get_json("/cluster/nodes", &[], classify_node_error).await
    }

    async fn system_state(&self, node: NodeId) -> GatewayResult<Vec<SystemStateInfo>> {
        self.get_json(
            &format!("/cluster/nodes/{node}/whiteboard/system"),
            &[],
            classify_node_error,
        )
        .await
    }

    async fn vdisk_state(&self, node: NodeId) -> GatewayResult<Vec<VDiskStateInfo>> {
        self.get_json(
            &format!("/cluster/nodes/{node}/whiteboard/vdisk"),
            &[],
            classify_node_error,
        )
        .await
    }

    async fn pdisk_state(&self, node: NodeId) -> GatewayResult<Vec<PDiskStateInfo>> {
        self.get_json(
            &format!("/cluster/nodes/{node}/whiteboard/pdisk"),
            &[],
            classify_node_error,
        )
        .await
    }

    async fn bsgroup_state(&self, node: NodeId) -> GatewayResult<Vec<BsGroupStateInfo>> {
        self.get_json(
            &format!("/cluster/nodes/{node}/whiteboard/bsgroup"),
            &[],
            classify_node_error,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum::{Json, Router};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn list_nodes_roundtrip() {
        let router = Router::new().route(
            "/cluster/nodes",
            get(|| async {
                Json(vec![NodeDescriptor {
                    id: 1,
                    host: "node-1.petrel.local".to_string(),
                    port: 19001,
                }])
            }),
        );
        let base = serve(router).await;

        let gateway = RemoteGateway::new(&base, Duration::from_secs(2)).unwrap();
        let nodes = gateway.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].host, "node-1.petrel.local");
    }

    #[tokio::test]
    async fn whiteboard_connect_failure_is_transient() {
        // Nothing listens on port 1.
        let gateway = RemoteGateway::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let error = gateway.system_state(1).await.unwrap_err();
        assert!(error.is_transient(), "unexpected classification: {error:?}");
    }

    #[tokio::test]
    async fn tablet_connect_failure_is_a_pipe_failure() {
        let gateway = RemoteGateway::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let error = gateway.base_config(72057594037932033).await.unwrap_err();
        assert!(
            matches!(error, GatewayError::Connect(_)),
            "unexpected classification: {error:?}"
        );
    }

    #[tokio::test]
    async fn http_error_status_is_a_remote_error() {
        let router = Router::new(); // No routes: everything is 404.
        let base = serve(router).await;

        let gateway = RemoteGateway::new(&base, Duration::from_secs(2)).unwrap();
        let error = gateway.list_tenants(72057594037936131).await.unwrap_err();
        assert!(matches!(error, GatewayError::Remote(_)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let gateway =
            RemoteGateway::new("http://cp.petrel.local:2135/", Duration::from_secs(1)).unwrap();
        assert_eq!(gateway.base_url, "http://cp.petrel.local:2135");
    }
}
