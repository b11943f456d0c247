//! Thin typed clients for the Azure APIs accessops reconciles against.
//!
//! Each API sits behind a trait so the reconciler can run against in-memory
//! fakes:
//!
//! - [`ResourceManager`]: management groups, subscriptions, resource groups,
//!   role definitions and role assignments ([`ArmClient`])
//! - [`Directory`]: service principals, app role assignments and OAuth2
//!   permission grants through Microsoft Graph ([`GraphClient`])
//! - [`ServiceEndpoints`]: Azure DevOps projects and service connections
//!   ([`DevOpsClient`])
//!
//! Lookups return `Ok(None)` when the target does not exist. Every other
//! non-success response is an [`AzureError`].

pub mod arm;
pub mod auth;
pub mod devops;
pub mod graph;
mod http;
pub mod models;

pub use arm::{ArmClient, ResourceManager};
pub use auth::{Credential, TokenProvider};
pub use devops::{DevOpsClient, EndpointRequest, ServiceEndpoints};
pub use graph::{Directory, GraphClient};
pub use models::*;

/// Application id of the Azure DevOps resource in Entra ID
pub const DEVOPS_RESOURCE_ID: &str = "499b84ac-1321-427f-aa17-267ca6975798";

#[derive(Debug, thiserror::Error)]
pub enum AzureError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP {status} from {url}: {code}: {message}")]
    Api {
        status: u16,
        url: String,
        code: String,
        message: String,
    },

    #[error("Failed to connect to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl AzureError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn url(msg: impl Into<String>) -> Self {
        Self::Url(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
