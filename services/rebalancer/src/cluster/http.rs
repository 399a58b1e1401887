//! HTTP client for the compute-cluster API.
//!
//! One POST per operation against the endpoint root, the operation selected
//! by the `X-Amz-Target` header and the body carried as
//! `application/x-amz-json-1.1`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::types::{
    DescribeContainerInstancesRequest, DescribeContainerInstancesResponse,
    DescribeServicesRequest, DescribeServicesResponse, ListServicesRequest, ListServicesResponse,
    UpdateServiceRequest,
};
use super::{ClusterApi, ClusterApiError};
use crate::config::Config;

const TARGET_HEADER: &str = "x-amz-target";
const TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141103";

/// Compute-cluster API client.
#[derive(Debug, Clone)]
pub struct EcsClient {
    client: reqwest::Client,
    endpoint: String,
}

impl EcsClient {
    /// Create a new client from the service configuration.
    pub fn new(config: &Config) -> Result<Self, ClusterApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-amz-json-1.1"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.cluster_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issue one operation and return the raw response on a success status.
    async fn send<B: Serialize>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<reqwest::Response, ClusterApiError> {
        debug!(operation, endpoint = %self.endpoint, "Calling cluster API");

        let response = self
            .client
            .post(&self.endpoint)
            .header(TARGET_HEADER, format!("{TARGET_PREFIX}.{operation}"))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response)
    }

    /// Issue one operation and decode its response document.
    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<T, ClusterApiError> {
        self.send(operation, body)
            .await?
            .json()
            .await
            .map_err(|e| ClusterApiError::InvalidBody(e.to_string()))
    }

    async fn error_from(response: reqwest::Response) -> ClusterApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);

        ClusterApiError::Api { status, message }
    }
}

#[async_trait]
impl ClusterApi for EcsClient {
    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instances: &[String],
    ) -> Result<DescribeContainerInstancesResponse, ClusterApiError> {
        let request = DescribeContainerInstancesRequest {
            cluster: cluster.to_string(),
            container_instances: container_instances.to_vec(),
        };

        self.call("DescribeContainerInstances", &request).await
    }

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> Result<ListServicesResponse, ClusterApiError> {
        let request = ListServicesRequest {
            cluster: cluster.to_string(),
            next_token: next_token.map(str::to_string),
        };

        self.call("ListServices", &request).await
    }

    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> Result<DescribeServicesResponse, ClusterApiError> {
        let request = DescribeServicesRequest {
            cluster: cluster.to_string(),
            services: services.to_vec(),
        };

        self.call("DescribeServices", &request).await
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        force_new_deployment: bool,
    ) -> Result<(), ClusterApiError> {
        let request = UpdateServiceRequest {
            cluster: cluster.to_string(),
            service: service.to_string(),
            force_new_deployment,
        };

        // Ack only; the service document in the response is not used.
        self.send("UpdateService", &request).await?;
        Ok(())
    }
}

/// Error document the cluster API returns for failed calls.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default, alias = "Message")]
    message: Option<String>,
}
