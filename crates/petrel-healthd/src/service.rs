//! The health service: entry points behind the monitoring surface.
//!
//! `self_check` spins up a request actor against the cluster gateways.
//! `node_check` serves the HTTP path: it first asks the local
//! whiteboard which address the monitoring surface listens on, then
//! forwards the check there — a cheap liveness answer for load
//! balancers. A missing endpoint leaves the verdict unspecified; a
//! failed or timed-out forward maps to MAINTENANCE_REQUIRED, each with
//! a single red issue. The probe client is built lazily on first use
//! and reused afterwards.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::warn;

use petrel_health::{Gateways, SelfCheckActor};
use petrel_types::bootstrap::BootstrapConfig;
use petrel_types::issue::IssueLog;
use petrel_types::result::{SelfCheckRequest, SelfCheckResult};
use petrel_types::snapshot::NodeId;
use petrel_types::status::{SelfCheck, StatusFlag};

/// Endpoint name a node advertises for its monitoring surface.
const MONITORING_ENDPOINT_NAME: &str = "monitoring";

#[derive(Clone)]
pub struct HealthService {
    gateways: Gateways,
    bootstrap: Arc<BootstrapConfig>,
    /// This node's id; node checks ask its whiteboard where the
    /// monitoring endpoint lives.
    node_id: NodeId,
    probe_client: Arc<OnceLock<reqwest::Client>>,
}

impl HealthService {
    pub fn new(gateways: Gateways, bootstrap: Arc<BootstrapConfig>, node_id: NodeId) -> Self {
        HealthService {
            gateways,
            bootstrap,
            node_id,
            probe_client: Arc::new(OnceLock::new()),
        }
    }

    /// Runs a full cluster self-check.
    pub async fn self_check(&self, request: SelfCheckRequest) -> SelfCheckResult {
        SelfCheckActor::new(self.gateways.clone(), self.bootstrap.clone(), request)
            .run()
            .await
    }

    /// Checks this node: resolves the local monitoring endpoint through
    /// the whiteboard, then forwards the node check to it. The timeout
    /// covers both steps.
    pub async fn node_check(&self, timeout: Duration) -> SelfCheckResult {
        match tokio::time::timeout(timeout, self.probe_local_endpoint()).await {
            Ok(result) => result,
            Err(_) => failure_result(SelfCheck::MaintenanceRequired, "Timeout"),
        }
    }

    async fn probe_local_endpoint(&self) -> SelfCheckResult {
        let Some(address) = self.resolve_monitoring_endpoint().await else {
            return failure_result(
                SelfCheck::Unspecified,
                "Couldn't find local monitoring endpoint",
            );
        };

        let client = self
            .probe_client
            .get_or_init(reqwest::Client::new)
            .clone();
        let url = format!("http://{address}/monitoring/node-check");
        match fetch_node_check(client, &url).await {
            Ok(result) => result,
            Err(error) => {
                warn!(%url, %error, "node check request failed");
                failure_result(SelfCheck::MaintenanceRequired, "Local check request failed")
            }
        }
    }

    /// Asks the local whiteboard which address serves the monitoring
    /// surface. Addresses advertised as `:port` are node-local.
    async fn resolve_monitoring_endpoint(&self) -> Option<String> {
        let states = match self.gateways.nodes.system_state(self.node_id).await {
            Ok(states) => states,
            Err(error) => {
                warn!(node_id = self.node_id, %error, "local whiteboard unavailable");
                return None;
            }
        };
        for state in &states {
            for endpoint in &state.endpoints {
                if endpoint.name == MONITORING_ENDPOINT_NAME {
                    if endpoint.address.starts_with(':') {
                        return Some(format!("localhost{}", endpoint.address));
                    }
                    return Some(endpoint.address.clone());
                }
            }
        }
        None
    }
}

async fn fetch_node_check(client: reqwest::Client, url: &str) -> anyhow::Result<SelfCheckResult> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("node check returned {}", response.status());
    }
    Ok(response.json::<SelfCheckResult>().await?)
}

/// The fast-path answer a healthy node gives about itself.
pub fn node_check_ok() -> SelfCheckResult {
    SelfCheckResult {
        self_check_result: SelfCheck::Good,
        ..Default::default()
    }
}

fn failure_result(verdict: SelfCheck, message: &str) -> SelfCheckResult {
    let mut result = SelfCheckResult {
        self_check_result: verdict,
        ..Default::default()
    };
    result.issue_log.push(IssueLog {
        id: (result.issue_log.len() + 1).to_string(),
        status: StatusFlag::Red,
        message: message.to_string(),
        ..Default::default()
    });
    result
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use petrel_health::services::{GatewayResult, NodeGateway};
    use petrel_types::snapshot::{
        BsGroupStateInfo, EndpointInfo, NodeDescriptor, PDiskStateInfo, SystemStateInfo,
        VDiskStateInfo,
    };

    use super::*;
    use crate::remote::RemoteGateway;

    /// Whiteboard that only knows this node's advertised endpoints.
    struct LocalWhiteboard {
        endpoints: Vec<EndpointInfo>,
    }

    #[async_trait]
    impl NodeGateway for LocalWhiteboard {
        async fn list_nodes(&self) -> GatewayResult<Vec<NodeDescriptor>> {
            Ok(vec![])
        }
        async fn system_state(&self, node: NodeId) -> GatewayResult<Vec<SystemStateInfo>> {
            Ok(vec![SystemStateInfo {
                node_id: node,
                endpoints: self.endpoints.clone(),
                ..Default::default()
            }])
        }
        async fn vdisk_state(&self, _: NodeId) -> GatewayResult<Vec<VDiskStateInfo>> {
            Ok(vec![])
        }
        async fn pdisk_state(&self, _: NodeId) -> GatewayResult<Vec<PDiskStateInfo>> {
            Ok(vec![])
        }
        async fn bsgroup_state(&self, _: NodeId) -> GatewayResult<Vec<BsGroupStateInfo>> {
            Ok(vec![])
        }
    }

    fn service_with_nodes(nodes: Arc<dyn NodeGateway>) -> HealthService {
        let remote =
            Arc::new(RemoteGateway::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap());
        let gateways = Gateways {
            tablets: remote.clone(),
            scheme_cache: remote,
            nodes,
        };
        let bootstrap = Arc::new(BootstrapConfig {
            domain_name: "Root".to_string(),
            ..Default::default()
        });
        HealthService::new(gateways, bootstrap, 1)
    }

    fn unreachable_service() -> HealthService {
        let remote =
            Arc::new(RemoteGateway::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap());
        service_with_nodes(remote)
    }

    #[tokio::test]
    async fn node_check_without_advertised_endpoint_stays_unspecified() {
        let service = service_with_nodes(Arc::new(LocalWhiteboard { endpoints: vec![] }));
        let result = service.node_check(Duration::from_millis(500)).await;
        assert_eq!(result.self_check_result, SelfCheck::Unspecified);
        assert_eq!(result.issue_log.len(), 1);
        assert_eq!(
            result.issue_log[0].message,
            "Couldn't find local monitoring endpoint"
        );
    }

    #[tokio::test]
    async fn node_check_with_dead_whiteboard_stays_unspecified() {
        // The whiteboard itself is unreachable: no endpoint to probe.
        let service = unreachable_service();
        let result = service.node_check(Duration::from_millis(500)).await;
        assert_eq!(result.self_check_result, SelfCheck::Unspecified);
        assert_eq!(
            result.issue_log[0].message,
            "Couldn't find local monitoring endpoint"
        );
    }

    #[tokio::test]
    async fn node_check_failure_maps_to_maintenance_required() {
        // The endpoint resolves, but nothing listens there.
        let service = service_with_nodes(Arc::new(LocalWhiteboard {
            endpoints: vec![EndpointInfo {
                name: "monitoring".to_string(),
                address: ":1".to_string(),
            }],
        }));
        let result = service.node_check(Duration::from_millis(500)).await;
        assert_eq!(result.self_check_result, SelfCheck::MaintenanceRequired);
        assert_eq!(result.issue_log.len(), 1);
        assert_eq!(result.issue_log[0].status, StatusFlag::Red);
        assert_eq!(result.issue_log[0].message, "Local check request failed");
    }

    #[tokio::test]
    async fn node_check_probes_the_advertised_endpoint() {
        // Serve the fast path on a real socket and advertise it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let router = axum::Router::new().route(
            "/monitoring/node-check",
            axum::routing::get(|| async { axum::Json(node_check_ok()) }),
        );
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let service = service_with_nodes(Arc::new(LocalWhiteboard {
            endpoints: vec![EndpointInfo {
                name: "monitoring".to_string(),
                address: format!(":{port}"),
            }],
        }));
        let result = service.node_check(Duration::from_secs(2)).await;
        assert_eq!(result.self_check_result, SelfCheck::Good);
        assert!(result.issue_log.is_empty());
    }

    #[tokio::test]
    async fn self_check_survives_an_unreachable_cluster() {
        let service = unreachable_service();
        let request = SelfCheckRequest {
            operation_timeout_ms: Some(1000),
            ..Default::default()
        };
        // Every gateway call fails; the engine still produces a report.
        let result = service.self_check(request).await;
        assert_eq!(result.self_check_result, SelfCheck::Unspecified);
    }

    #[test]
    fn fast_path_is_good_with_no_issues() {
        let result = node_check_ok();
        assert_eq!(result.self_check_result, SelfCheck::Good);
        assert!(result.issue_log.is_empty());
    }
}
