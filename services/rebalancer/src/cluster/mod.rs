//! Compute-cluster API.
//!
//! The [`ClusterApi`] trait abstracts the four remote operations the
//! rebalance flow needs. [`EcsClient`] is the HTTP implementation;
//! [`MockClusterApi`] serves scripted responses for tests.

mod http;
mod mock;
mod types;

pub use http::EcsClient;
pub use mock::{MockClusterApi, RecordedCall};
pub use types::{
    ApiFailure, ContainerInstance, DescribeContainerInstancesRequest,
    DescribeContainerInstancesResponse, DescribeServicesRequest, DescribeServicesResponse,
    ListServicesRequest, ListServicesResponse, ServiceDescription, UpdateServiceRequest,
};

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failures from the cluster API.
#[derive(Debug, Error)]
pub enum ClusterApiError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with an error status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// Operations the rebalance flow needs from the compute cluster.
///
/// Calls are one-shot: failures are reported to the caller without any
/// internal retry.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Describe container instances by ARN within a cluster.
    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instances: &[String],
    ) -> Result<DescribeContainerInstancesResponse, ClusterApiError>;

    /// List one page of service ARNs, continuing from `next_token`.
    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> Result<ListServicesResponse, ClusterApiError>;

    /// Describe services to obtain their display names.
    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> Result<DescribeServicesResponse, ClusterApiError>;

    /// Force a new deployment of one service.
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        force_new_deployment: bool,
    ) -> Result<(), ClusterApiError>;
}
