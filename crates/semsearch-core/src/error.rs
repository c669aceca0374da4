//! Error taxonomy shared by providers, stores, and pipelines.
//!
//! Every variant names the component (provider tag or store name) that raised
//! it, so a failure can be traced back without extra context.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing credential or endpoint. Fatal for that one provider only.
    #[error("{component}: invalid configuration: {reason}")]
    Configuration { component: String, reason: String },

    /// Network failure, timeout, or 5xx from the remote service.
    #[error("{component}: provider unavailable: {cause}")]
    ProviderUnavailable { component: String, cause: String },

    /// The provider asked us to slow down.
    #[error("{component}: rate limited{}", retry_hint(.retry_after))]
    ProviderRateLimited {
        component: String,
        retry_after: Option<Duration>,
    },

    /// The provider rejected the input. Retrying will not help.
    #[error("{component}: request rejected: {cause}")]
    ProviderRequest { component: String, cause: String },

    #[error("{component}: dimension mismatch (expected {expected}, got {actual})")]
    DimensionMismatch {
        component: String,
        expected: usize,
        actual: usize,
    },

    #[error("{component}: rerank failed: {cause}")]
    RerankFailure { component: String, cause: String },

    #[error("{component}: record {id} was embedded by {found}, not {expected}")]
    ProviderMismatch {
        component: String,
        id: String,
        expected: String,
        found: String,
    },

    #[error("{component}: store error: {cause}")]
    Store { component: String, cause: String },

    #[error("{component}: corrupt record {location}: {cause}")]
    Corrupt {
        component: String,
        location: String,
        cause: String,
    },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}ms)", d.as_millis()),
        None => String::new(),
    }
}

impl Error {
    pub fn configuration(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration { component: component.into(), reason: reason.into() }
    }

    pub fn unavailable(component: impl Into<String>, cause: impl ToString) -> Self {
        Self::ProviderUnavailable { component: component.into(), cause: cause.to_string() }
    }

    pub fn request(component: impl Into<String>, cause: impl ToString) -> Self {
        Self::ProviderRequest { component: component.into(), cause: cause.to_string() }
    }

    pub fn rerank(component: impl Into<String>, cause: impl ToString) -> Self {
        Self::RerankFailure { component: component.into(), cause: cause.to_string() }
    }

    pub fn store(component: impl Into<String>, cause: impl ToString) -> Self {
        Self::Store { component: component.into(), cause: cause.to_string() }
    }

    pub fn dimension(component: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { component: component.into(), expected, actual }
    }

    /// Provider or store identity carried by the error.
    pub fn component(&self) -> &str {
        match self {
            Self::Configuration { component, .. }
            | Self::ProviderUnavailable { component, .. }
            | Self::ProviderRateLimited { component, .. }
            | Self::ProviderRequest { component, .. }
            | Self::DimensionMismatch { component, .. }
            | Self::RerankFailure { component, .. }
            | Self::ProviderMismatch { component, .. }
            | Self::Store { component, .. }
            | Self::Corrupt { component, .. } => component,
        }
    }

    /// Transient failures the ingestion path may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. } | Self::ProviderRateLimited { .. })
    }

    /// Errors that must stop an ingestion run rather than skip one document.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::DimensionMismatch { .. }
                | Self::Store { .. }
                | Self::Corrupt { .. }
                | Self::ProviderMismatch { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ProviderRateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
