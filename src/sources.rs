//! Source responses
//!
//! A report joins up to four independent fetches: activity, config, license
//! and version history. Each one lands as a [`Fetched`] value: data, an empty
//! (204) answer, or a failure scoped to that endpoint. No source can block or
//! abort another.
//!
//! Responses are read from captured HTTP exchanges on disk:
//!
//! ```json
//! {"status": 200, "body": {"request_id": "...", "data": {...}}}
//! {"status": 204}
//! {"status": 403}
//! ```
//!
//! A file holding a bare JSON payload (no `status`) is read as a `200`.

use crate::error::{Endpoint, Error};
use crate::models::{ActivityResponse, ConfigResponse, LicenseResponse};
use crate::version_history::VersionHistoryResponse;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The outcome of one fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    /// A `204` or empty body: a valid "nothing for this window" answer.
    NoData,
    Failed(Error),
}

impl<T> Fetched<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Fetched::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Fetched::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.error().map(Error::is_permission_denied).unwrap_or(false)
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Fetched::NoData)
    }
}

/// Map an HTTP status and optional body onto a [`Fetched`] value.
pub fn from_response<T: DeserializeOwned>(
    endpoint: Endpoint,
    status: u16,
    body: Option<Value>,
) -> Fetched<T> {
    match status {
        200 => match body {
            None | Some(Value::Null) => Fetched::NoData,
            Some(body) => match serde_json::from_value(body) {
                Ok(parsed) => Fetched::Data(parsed),
                Err(e) => Fetched::Failed(Error::malformed(endpoint, e.to_string())),
            },
        },
        204 => Fetched::NoData,
        403 => Fetched::Failed(Error::PermissionDenied { endpoint }),
        other => Fetched::Failed(Error::malformed(
            endpoint,
            format!("unexpected status {other}"),
        )),
    }
}

/// A captured response as stored on disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Capture {
    pub status: u16,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Capture {
    /// Read a capture document, treating a bare payload as a `200` body.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Capture {
                status: 204,
                body: None,
            });
        }
        let value: Value = serde_json::from_str(text)?;
        if value.get("status").is_some() {
            serde_json::from_value(value)
        } else {
            Ok(Capture {
                status: 200,
                body: Some(value),
            })
        }
    }

    pub fn into_fetched<T: DeserializeOwned>(self, endpoint: Endpoint) -> Fetched<T> {
        from_response(endpoint, self.status, self.body)
    }
}

/// Load one captured response. A missing path means the source was not
/// queried and reads as [`Fetched::NoData`].
pub async fn load_capture<T: DeserializeOwned>(
    endpoint: Endpoint,
    path: Option<&Path>,
) -> Fetched<T> {
    let Some(path) = path else {
        debug!(endpoint = %endpoint, "No capture supplied");
        return Fetched::NoData;
    };

    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(
                endpoint = %endpoint,
                path = %path.display(),
                error = %e,
                "Failed to read capture"
            );
            return Fetched::Failed(Error::malformed(
                endpoint,
                format!("cannot read {}: {e}", path.display()),
            ));
        }
    };

    let fetched = match Capture::from_json(&text) {
        Ok(capture) => capture.into_fetched(endpoint),
        Err(e) => Fetched::Failed(Error::malformed(endpoint, e.to_string())),
    };

    if let Fetched::Failed(err) = &fetched {
        warn!(endpoint = %endpoint, error = %err, "Source unavailable");
    }
    fetched
}

/// Where each source's capture lives.
#[derive(Debug, Clone, Default)]
pub struct CapturePaths {
    pub activity: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub license: Option<PathBuf>,
    pub version_history: Option<PathBuf>,
}

/// Every source a report joins.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    pub activity: Fetched<ActivityResponse>,
    pub config: Fetched<ConfigResponse>,
    pub license: Fetched<LicenseResponse>,
    pub version_history: Fetched<VersionHistoryResponse>,
}

impl Default for SourceSet {
    fn default() -> Self {
        Self {
            activity: Fetched::NoData,
            config: Fetched::NoData,
            license: Fetched::NoData,
            version_history: Fetched::NoData,
        }
    }
}

impl SourceSet {
    /// Failures from every source, in endpoint order.
    pub fn errors(&self) -> Vec<Error> {
        [
            self.activity.error(),
            self.config.error(),
            self.license.error(),
            self.version_history.error(),
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

/// Load all four captures concurrently.
pub async fn load_sources(paths: &CapturePaths) -> SourceSet {
    let (activity, config, license, version_history) = tokio::join!(
        load_capture(Endpoint::Activity, paths.activity.as_deref()),
        load_capture(Endpoint::Config, paths.config.as_deref()),
        load_capture(Endpoint::License, paths.license.as_deref()),
        load_capture(Endpoint::VersionHistory, paths.version_history.as_deref()),
    );

    SourceSet {
        activity,
        config,
        license,
        version_history,
    }
}
