//! Error taxonomy for a single invocation.

use thiserror::Error;

use crate::cluster::ClusterApiError;
use crate::event::DecodeError;
use crate::rebalancer::UpdatedService;

/// Failures that can end one invocation.
///
/// Nothing here is retried locally; the HTTP layer is the single decision
/// point for the invocation's final status.
#[derive(Debug, Error)]
pub enum RebalanceError {
    /// The notification payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A remote call failed before any service was updated.
    #[error("{operation} failed: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: ClusterApiError,
    },

    /// A forced deployment failed partway through the update loop.
    ///
    /// `updated` preserves the services whose updates were already issued;
    /// none of them are rolled back.
    #[error("forced deployment of {failed} failed: {source}")]
    Update {
        updated: Vec<UpdatedService>,
        failed: String,
        #[source]
        source: ClusterApiError,
    },
}
