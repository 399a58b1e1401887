//! The rebalance sequence: check the instance, then redeploy every service.
//!
//! Per invocation the flow is strictly linear:
//!
//! ```text
//! describe instance -> gate check -> list pages -> describe names -> update each
//! ```
//!
//! An unknown instance or a closed gate ends the flow early with a success
//! outcome. There are no retries; every remote failure propagates to the
//! caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cluster::ClusterApi;
use crate::error::RebalanceError;
use crate::event::InstanceEvent;

/// Task-count snapshot of one container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceStatus {
    pub running_tasks: i32,
    pub pending_tasks: i32,
}

/// Record of one successfully issued forced deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedService {
    pub arn: String,
    pub name: String,
}

/// Terminal outcome of one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebalanceOutcome {
    /// The cluster does not know the instance; nothing to do.
    InstanceNotFound,

    /// The gate is closed; no updates were issued.
    NotRequired {
        running_tasks: i32,
        pending_tasks: i32,
        agent_connected: bool,
    },

    /// Every service in the cluster was forced through a new deployment.
    Redeployed { services: Vec<UpdatedService> },
}

/// Drives the check-and-redeploy sequence against a cluster.
pub struct Rebalancer {
    api: Arc<dyn ClusterApi>,
    cluster: String,
}

impl Rebalancer {
    /// Create a rebalancer for one target cluster.
    pub fn new(api: Arc<dyn ClusterApi>, cluster: impl Into<String>) -> Self {
        Self {
            api,
            cluster: cluster.into(),
        }
    }

    /// Handle one decoded instance event.
    ///
    /// Issues updates only when the instance exists, carries zero running
    /// and zero pending tasks, and its agent is connected.
    pub async fn handle_event(
        &self,
        event: &InstanceEvent,
    ) -> Result<RebalanceOutcome, RebalanceError> {
        let status = match self.instance_status(&event.container_instance_arn).await? {
            Some(status) => status,
            None => {
                info!(
                    instance = %event.container_instance_arn,
                    cluster = %self.cluster,
                    "Instance not registered with cluster, nothing to do"
                );
                return Ok(RebalanceOutcome::InstanceNotFound);
            }
        };

        let gate_open =
            status.running_tasks == 0 && status.pending_tasks == 0 && event.agent_connected;
        if !gate_open {
            info!(
                instance = %event.container_instance_arn,
                running_tasks = status.running_tasks,
                pending_tasks = status.pending_tasks,
                agent_connected = event.agent_connected,
                "Cluster does not require rebalancing"
            );
            return Ok(RebalanceOutcome::NotRequired {
                running_tasks: status.running_tasks,
                pending_tasks: status.pending_tasks,
                agent_connected: event.agent_connected,
            });
        }

        info!(
            instance = %event.container_instance_arn,
            cluster = %self.cluster,
            "Instance reconnected empty, forcing redeployment of all services"
        );

        let services = self.list_all_services().await?;
        if services.is_empty() {
            info!(cluster = %self.cluster, "Cluster has no services to redeploy");
            return Ok(RebalanceOutcome::Redeployed {
                services: Vec::new(),
            });
        }

        let updated = self.redeploy(services).await?;
        info!(updated = updated.len(), "Forced deployments issued");
        Ok(RebalanceOutcome::Redeployed { services: updated })
    }

    /// Fetch the task counts of one instance, or `None` when the cluster
    /// does not know it.
    async fn instance_status(
        &self,
        arn: &str,
    ) -> Result<Option<InstanceStatus>, RebalanceError> {
        let response = self
            .api
            .describe_container_instances(&self.cluster, &[arn.to_string()])
            .await
            .map_err(|source| RebalanceError::Query {
                operation: "DescribeContainerInstances",
                source,
            })?;

        for failure in &response.failures {
            warn!(arn = %failure.arn, reason = %failure.reason, "Describe reported a failure");
        }
        debug!(
            instances = response.container_instances.len(),
            "Described container instances"
        );

        Ok(response
            .container_instances
            .into_iter()
            .next()
            .map(|instance| InstanceStatus {
                running_tasks: instance.running_tasks_count,
                pending_tasks: instance.pending_tasks_count,
            }))
    }

    /// Drain the paginated service listing, in page order.
    async fn list_all_services(&self) -> Result<Vec<String>, RebalanceError> {
        let mut services = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .api
                .list_services(&self.cluster, next_token.as_deref())
                .await
                .map_err(|source| RebalanceError::Query {
                    operation: "ListServices",
                    source,
                })?;

            services.extend(page.service_arns);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(services = services.len(), "Listed cluster services");
        Ok(services)
    }

    /// Force a new deployment of every listed service, in listing order.
    ///
    /// The loop is sequential and aborts on the first failure; the services
    /// already updated travel with the error.
    async fn redeploy(
        &self,
        arns: Vec<String>,
    ) -> Result<Vec<UpdatedService>, RebalanceError> {
        let described = self
            .api
            .describe_services(&self.cluster, &arns)
            .await
            .map_err(|source| RebalanceError::Query {
                operation: "DescribeServices",
                source,
            })?;

        let mut names: HashMap<String, String> = described
            .services
            .into_iter()
            .filter(|service| !service.service_arn.is_empty())
            .map(|service| (service.service_arn, service.service_name))
            .collect();

        let mut updated = Vec::with_capacity(arns.len());
        for arn in arns {
            let name = names
                .remove(&arn)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| arn.clone());

            info!(service = %name, "Forcing new deployment");
            if let Err(source) = self.api.update_service(&self.cluster, &arn, true).await {
                return Err(RebalanceError::Update {
                    updated,
                    failed: arn,
                    source,
                });
            }

            updated.push(UpdatedService { arn, name });
        }

        Ok(updated)
    }
}
