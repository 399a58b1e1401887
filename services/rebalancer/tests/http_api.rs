//! End-to-end tests for the HTTP surface.
//!
//! Drives the router with tower's `oneshot` while a wiremock server stands
//! in for the compute-cluster API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ecs_rebalancer::cluster::EcsClient;
use ecs_rebalancer::config::Config;
use ecs_rebalancer::rebalancer::Rebalancer;
use ecs_rebalancer::server::{create_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET_HEADER: &str = "x-amz-target";
const INSTANCE_ARN: &str =
    "arn:aws:ecs:eu-west-1:123456789012:container-instance/default/0f3a9c1d";
const SVC_A: &str = "arn:aws:ecs:eu-west-1:123456789012:service/default/svc-a";
const SVC_B: &str = "arn:aws:ecs:eu-west-1:123456789012:service/default/svc-b";

fn test_config(endpoint: &str) -> Config {
    Config {
        cluster: "default".to_string(),
        cluster_api_url: endpoint.to_string(),
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        request_timeout_secs: 5,
        log_level: "debug".to_string(),
    }
}

fn router(endpoint: &str) -> axum::Router {
    let config = test_config(endpoint);
    let client = Arc::new(EcsClient::new(&config).unwrap());
    let rebalancer = Arc::new(Rebalancer::new(client, config.cluster.as_str()));
    create_router(AppState::new(rebalancer))
}

fn notification(detail: Value) -> Value {
    json!({
        "id": "5fc2b616-3b0a-4c4b-b0a8-1c79a0de7a9f",
        "detail-type": "ECS Container Instance State Change",
        "source": "aws.ecs",
        "time": "2026-03-02T09:30:00Z",
        "detail": detail,
    })
}

fn connectivity_detail(agent_connected: bool) -> Value {
    json!({
        "containerInstanceArn": INSTANCE_ARN,
        "agentConnected": agent_connected,
        "status": "ACTIVE",
    })
}

async fn post_event(app: axum::Router, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/events")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn mount_instance(server: &MockServer, running: i64, pending: i64) {
    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.DescribeContainerInstances",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "containerInstances": [{
                "containerInstanceArn": INSTANCE_ARN,
                "runningTasksCount": running,
                "pendingTasksCount": pending,
                "agentConnected": true,
            }],
            "failures": [],
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_redeploy_round_trip() {
    let server = MockServer::start().await;
    mount_instance(&server, 0, 0).await;

    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.ListServices",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "serviceArns": [SVC_A, SVC_B],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.DescribeServices",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [
                { "serviceName": "svc-a", "serviceArn": SVC_A },
                { "serviceName": "svc-b", "serviceArn": SVC_B },
            ],
            "failures": [],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.UpdateService",
        ))
        .and(body_partial_json(json!({ "forceNewDeployment": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "service": {} })))
        .expect(2)
        .mount(&server)
        .await;

    let (status, body) = post_event(
        router(&server.uri()),
        &notification(connectivity_detail(true)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "redeployed");
    let names: Vec<_> = body["services"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["svc-a", "svc-b"]);
}

#[tokio::test]
async fn test_busy_instance_reports_not_required() {
    let server = MockServer::start().await;
    mount_instance(&server, 2, 0).await;

    let (status, body) = post_event(
        router(&server.uri()),
        &notification(connectivity_detail(true)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "not_required");
    assert_eq!(body["running_tasks"], 2);

    // describe is the only upstream call
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_string_encoded_detail_is_accepted() {
    let server = MockServer::start().await;
    mount_instance(&server, 1, 1).await;

    let detail = connectivity_detail(true).to_string();
    let (status, body) = post_event(router(&server.uri()), &notification(json!(detail))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "not_required");
}

#[tokio::test]
async fn test_undecodable_detail_makes_no_upstream_calls() {
    let server = MockServer::start().await;

    let (status, body) = post_event(
        router(&server.uri()),
        &notification(json!({ "agentConnected": true })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_event");

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "__type": "ServerException",
            "message": "internal failure",
        })))
        .mount(&server)
        .await;

    let (status, body) = post_event(
        router(&server.uri()),
        &notification(connectivity_detail(true)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "upstream_error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("DescribeContainerInstances"));
}

#[tokio::test]
async fn test_partial_update_failure_reports_updated_services() {
    let server = MockServer::start().await;
    mount_instance(&server, 0, 0).await;

    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.ListServices",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "serviceArns": [SVC_A, SVC_B],
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.DescribeServices",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [
                { "serviceName": "svc-a", "serviceArn": SVC_A },
                { "serviceName": "svc-b", "serviceArn": SVC_B },
            ],
        })))
        .mount(&server)
        .await;

    // svc-a updates fine, svc-b blows up mid-loop
    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.UpdateService",
        ))
        .and(body_partial_json(json!({ "service": SVC_A })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "service": {} })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.UpdateService",
        ))
        .and(body_partial_json(json!({ "service": SVC_B })))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "__type": "ServerException",
            "message": "deployment rejected",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = post_event(
        router(&server.uri()),
        &notification(connectivity_detail(true)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "partial_update_failure");
    assert_eq!(body["updated_services"], json!(["svc-a"]));
}

#[tokio::test]
async fn test_unknown_instance_acks_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header(
            TARGET_HEADER,
            "AmazonEC2ContainerServiceV20141103.DescribeContainerInstances",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "containerInstances": [],
            "failures": [{ "arn": INSTANCE_ARN, "reason": "MISSING" }],
        })))
        .mount(&server)
        .await;

    let (status, body) = post_event(
        router(&server.uri()),
        &notification(connectivity_detail(true)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "instance_not_found");
}

#[tokio::test]
async fn test_healthz_reports_service_identity() {
    let app = router("http://127.0.0.1:9");

    let request = Request::builder()
        .method("GET")
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "rebalancer");
}
