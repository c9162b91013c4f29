//! Error taxonomy for the client-count pipeline.
//!
//! Only conditions that make a single fetch unusable are errors here. An empty
//! (204) response is [`crate::sources::Fetched::NoData`] and an out-of-range
//! query is a flag on [`crate::billing::BillingPeriod`]; neither is an error.

use serde::Serialize;
use std::fmt;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// The backend endpoints whose responses feed a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    Activity,
    Config,
    License,
    VersionHistory,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Activity => "activity",
            Endpoint::Config => "config",
            Endpoint::License => "license",
            Endpoint::VersionHistory => "version-history",
        }
    }

    /// Endpoints that decide the default billing start.
    pub fn determines_billing_start(&self) -> bool {
        matches!(self, Endpoint::License | Endpoint::Config)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Error {
    #[error("permission denied on {endpoint} endpoint")]
    PermissionDenied { endpoint: Endpoint },

    #[error("malformed {endpoint} payload: {reason}")]
    MalformedPayload { endpoint: Endpoint, reason: String },

    /// Raised by the normalizer, which does not know which endpoint it is reading.
    #[error("malformed counts field `{field}`: {reason}")]
    MalformedCounts { field: String, reason: String },

    #[error("invalid query range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },
}

impl Error {
    pub fn malformed(endpoint: Endpoint, reason: impl Into<String>) -> Self {
        Error::MalformedPayload {
            endpoint,
            reason: reason.into(),
        }
    }

    /// Attach endpoint context to a normalizer failure.
    pub fn for_endpoint(self, endpoint: Endpoint) -> Self {
        match self {
            Error::MalformedCounts { field, reason } => Error::MalformedPayload {
                endpoint,
                reason: format!("{field}: {reason}"),
            },
            other => other,
        }
    }

    /// The endpoint this failure is scoped to, if any.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            Error::PermissionDenied { endpoint } | Error::MalformedPayload { endpoint, .. } => {
                Some(*endpoint)
            }
            Error::MalformedCounts { .. } | Error::InvalidRange { .. } => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::PermissionDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_endpoint_lifts_counts_error() {
        let err = Error::MalformedCounts {
            field: "clients".to_string(),
            reason: "missing".to_string(),
        }
        .for_endpoint(Endpoint::Activity);

        assert_eq!(err.endpoint(), Some(Endpoint::Activity));
        assert_eq!(err.to_string(), "malformed activity payload: clients: missing");
    }

    #[test]
    fn test_permission_denied_display() {
        let err = Error::PermissionDenied {
            endpoint: Endpoint::VersionHistory,
        };
        assert!(err.is_permission_denied());
        assert_eq!(err.to_string(), "permission denied on version-history endpoint");
    }
}
