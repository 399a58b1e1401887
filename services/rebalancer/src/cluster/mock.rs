//! Scriptable in-memory cluster API for tests and development.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{
    ContainerInstance, DescribeContainerInstancesResponse, DescribeServicesResponse,
    ListServicesResponse, ServiceDescription,
};
use super::{ClusterApi, ClusterApiError};

/// A call recorded by [`MockClusterApi`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    DescribeContainerInstances {
        cluster: String,
        container_instances: Vec<String>,
    },
    ListServices {
        cluster: String,
        next_token: Option<String>,
    },
    DescribeServices {
        cluster: String,
        services: Vec<String>,
    },
    UpdateService {
        cluster: String,
        service: String,
        force_new_deployment: bool,
    },
}

/// Mock cluster API.
///
/// Serves scripted responses and records every call. Listing pages are
/// served in script order, one per call; past the last page an empty final
/// page is returned.
#[derive(Default)]
pub struct MockClusterApi {
    instances: Vec<ContainerInstance>,
    pages: Vec<ListServicesResponse>,
    services: Vec<ServiceDescription>,
    fail_update_of: Option<String>,
    page_cursor: AtomicUsize,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockClusterApi {
    /// Create a mock with no instances and no services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the container instances returned by describe.
    pub fn with_instances(mut self, instances: Vec<ContainerInstance>) -> Self {
        self.instances = instances;
        self
    }

    /// Script the listing pages, served one per call.
    pub fn with_service_pages(mut self, pages: Vec<ListServicesResponse>) -> Self {
        self.pages = pages;
        self
    }

    /// Script the service descriptions. When unscripted, descriptions are
    /// synthesized from the requested ARNs.
    pub fn with_described_services(mut self, services: Vec<ServiceDescription>) -> Self {
        self.services = services;
        self
    }

    /// Make the update of one service fail.
    pub fn with_failing_update(mut self, service: &str) -> Self {
        self.fail_update_of = Some(service.to_string());
        self
    }

    /// All calls received so far, in order.
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The `(service, force_new_deployment)` pairs of every update call.
    pub fn update_calls(&self) -> Vec<(String, bool)> {
        self.recorded_calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::UpdateService {
                    service,
                    force_new_deployment,
                    ..
                } => Some((service, force_new_deployment)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instances: &[String],
    ) -> Result<DescribeContainerInstancesResponse, ClusterApiError> {
        self.record(RecordedCall::DescribeContainerInstances {
            cluster: cluster.to_string(),
            container_instances: container_instances.to_vec(),
        });

        Ok(DescribeContainerInstancesResponse {
            container_instances: self.instances.clone(),
            failures: Vec::new(),
        })
    }

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> Result<ListServicesResponse, ClusterApiError> {
        self.record(RecordedCall::ListServices {
            cluster: cluster.to_string(),
            next_token: next_token.map(str::to_string),
        });

        let index = self.page_cursor.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> Result<DescribeServicesResponse, ClusterApiError> {
        self.record(RecordedCall::DescribeServices {
            cluster: cluster.to_string(),
            services: services.to_vec(),
        });

        let described = if self.services.is_empty() {
            services
                .iter()
                .map(|arn| ServiceDescription {
                    service_name: arn.rsplit('/').next().unwrap_or(arn).to_string(),
                    service_arn: arn.clone(),
                })
                .collect()
        } else {
            self.services.clone()
        };

        Ok(DescribeServicesResponse {
            services: described,
            failures: Vec::new(),
        })
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        force_new_deployment: bool,
    ) -> Result<(), ClusterApiError> {
        self.record(RecordedCall::UpdateService {
            cluster: cluster.to_string(),
            service: service.to_string(),
            force_new_deployment,
        });

        if self.fail_update_of.as_deref() == Some(service) {
            return Err(ClusterApiError::Api {
                status: 500,
                message: format!("scripted failure for {service}"),
            });
        }

        Ok(())
    }
}
