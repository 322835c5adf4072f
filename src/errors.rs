//! Typed error hierarchy for the leadgate gateway.
//!
//! Three top-level enums cover the three subsystems:
//! - `PlatformError` — generic REST/query client failures against the hosted platform
//! - `StoreError` — CRM store operations built on top of the platform
//! - `ProvisionError` — the webhook provisioning pipeline

use thiserror::Error;

/// Errors from the generic platform REST client.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Platform returned {status} for table '{table}': {body}")]
    Api {
        table: String,
        status: u16,
        body: String,
    },

    #[error("Platform returned no rows for table '{table}' despite a requested representation")]
    EmptyRepresentation { table: String },

    #[error("Failed to decode platform response for table '{table}': {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Service key is not a valid header value: {0}")]
    InvalidKey(#[from] reqwest::header::InvalidHeaderValue),
}

/// Errors from the CRM store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Store backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the provisioning pipeline.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("No workspace is configured in the platform")]
    NoWorkspace,

    #[error("Payload carries no usable phone number (got {raw:?})")]
    UnusablePhone { raw: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
