//! The monitoring HTTP surface.
//!
//! - `GET /status?timeout=ms` — load-balancer endpoint: resolves the
//!   local monitoring endpoint through the whiteboard, forwards the
//!   node check there, and answers 200 when the verdict is GOOD, 500
//!   otherwise, JSON body either way.
//! - `POST /monitoring/selfcheck` — the full cluster self-check.
//! - `GET /monitoring/node-check` — the direct fast-path per-node
//!   answer (no probing).

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use petrel_types::result::{SelfCheckRequest, SelfCheckResult};
use petrel_types::status::SelfCheck;

use crate::service::{node_check_ok, HealthService};

const DEFAULT_STATUS_TIMEOUT_MS: u64 = 10_000;

pub fn router(service: HealthService) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/monitoring/selfcheck", post(self_check))
        .route("/monitoring/node-check", get(node_check))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    timeout: Option<u64>,
}

/// GET /status
async fn status(
    State(service): State<HealthService>,
    Query(params): Query<StatusParams>,
) -> impl IntoResponse {
    let timeout = Duration::from_millis(params.timeout.unwrap_or(DEFAULT_STATUS_TIMEOUT_MS));
    let result = service.node_check(timeout).await;
    let code = if result.self_check_result == SelfCheck::Good {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(result))
}

/// POST /monitoring/selfcheck
async fn self_check(
    State(service): State<HealthService>,
    Json(request): Json<SelfCheckRequest>,
) -> Json<SelfCheckResult> {
    Json(service.self_check(request).await)
}

/// GET /monitoring/node-check
async fn node_check() -> Json<SelfCheckResult> {
    Json(node_check_ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use petrel_health::services::{GatewayResult, NodeGateway};
    use petrel_health::Gateways;
    use petrel_types::bootstrap::BootstrapConfig;
    use petrel_types::snapshot::{
        BsGroupStateInfo, EndpointInfo, NodeDescriptor, NodeId, PDiskStateInfo, SystemStateInfo,
        VDiskStateInfo,
    };

    use super::*;
    use crate::remote::RemoteGateway;

    /// Whiteboard advertising one monitoring endpoint.
    struct LocalWhiteboard {
        address: String,
    }

    #[async_trait]
    impl NodeGateway for LocalWhiteboard {
        async fn list_nodes(&self) -> GatewayResult<Vec<NodeDescriptor>> {
            Ok(vec![])
        }
        async fn system_state(&self, node: NodeId) -> GatewayResult<Vec<SystemStateInfo>> {
            Ok(vec![SystemStateInfo {
                node_id: node,
                endpoints: vec![EndpointInfo {
                    name: "monitoring".to_string(),
                    address: self.address.clone(),
                }],
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

    fn service_with_whiteboard(nodes: Arc<dyn NodeGateway>) -> HealthService {
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

    fn test_service() -> HealthService {
        let remote =
            Arc::new(RemoteGateway::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap());
        service_with_whiteboard(remote)
    }

    #[tokio::test]
    async fn node_check_fast_path_is_good() {
        let response = node_check().await;
        assert_eq!(response.0.self_check_result, SelfCheck::Good);
    }

    #[tokio::test]
    async fn status_returns_500_when_the_probe_fails() {
        // The local whiteboard is unreachable: no endpoint resolves.
        let response = status(
            State(test_service()),
            Query(StatusParams { timeout: Some(300) }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn status_returns_200_against_a_live_monitoring_endpoint() {
        // Serve the fast path on a real socket; the whiteboard
        // advertises it as the node-local monitoring endpoint.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let router = router(test_service());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let probing = service_with_whiteboard(Arc::new(LocalWhiteboard {
            address: format!(":{port}"),
        }));
        let response = status(
            State(probing),
            Query(StatusParams { timeout: Some(2000) }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn selfcheck_endpoint_answers_json() {
        let request = SelfCheckRequest {
            operation_timeout_ms: Some(500),
            ..Default::default()
        };
        let response = self_check(State(test_service()), Json(request)).await;
        // Unreachable cluster: a report is still produced.
        assert!(response.0.database_status.is_empty());
    }
}
