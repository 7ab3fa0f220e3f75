use thiserror::Error;

/// The postal code in a request does not have the expected shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid zipcode")]
pub struct InvalidPostalCode;

/// Failure while resolving a locality or a temperature through an external service.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The lookup service answered, but knows nothing about the postal code.
    #[error("can not find zipcode")]
    NotFound,

    /// Transport, status or decode failure talking to an external service.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        service: &'static str,
        reason: String,
    },

    /// A required setting (e.g. an API key) is missing.
    #[error("{0} not set")]
    Misconfigured(&'static str),
}

impl ResolveError {
    pub(crate) fn upstream(service: &'static str, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
