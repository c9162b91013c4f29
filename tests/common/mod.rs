#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use client_counts::sources::from_response;
use client_counts::timestamp_parser::TimestampParser;
use client_counts::{Endpoint, Fetched};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const LICENSE_START: &str = "2023-07-02T00:00:00Z";
pub const NOW: &str = "2023-10-15T00:00:00Z";

pub fn ts(s: &str) -> DateTime<Utc> {
    TimestampParser::parse(s).unwrap()
}

/// Write a captured response the way the CLI reads it.
pub fn write_capture(
    dir: &Path,
    filename: &str,
    status: u16,
    body: Option<Value>,
) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    let capture = match body {
        Some(body) => json!({"status": status, "body": body}),
        None => json!({"status": status}),
    };
    fs::write(&file_path, serde_json::to_string_pretty(&capture)?)?;
    Ok(file_path)
}

pub fn ok<T: DeserializeOwned>(endpoint: Endpoint, body: Value) -> Fetched<T> {
    from_response(endpoint, 200, Some(body))
}

pub fn status<T: DeserializeOwned>(endpoint: Endpoint, code: u16) -> Fetched<T> {
    from_response(endpoint, code, None)
}

/// Four months of activity, most recent first, as the backend sends it.
///
/// October uses modern keys and reports mounts; September uses the deprecated
/// keys and has a namespace without mounts; July and August predate tracking.
pub fn activity_body() -> Value {
    json!({
        "request_id": "8f3b6c1e-0b5f-4e7e-9a51-3a1f0b0c2d11",
        "data": {
            "start_time": "2023-07-01T00:00:00Z",
            "end_time": "2023-10-31T23:59:59Z",
            "total": {
                "entity_clients": 37,
                "non_entity_clients": 33,
                "secret_syncs": 5,
                "clients": 75
            },
            "by_namespace": [
                {
                    "namespace_id": "s07UR",
                    "namespace_path": "ns1/",
                    "counts": {"entity_clients": 15, "non_entity_clients": 15, "clients": 30},
                    "mounts": [
                        {"mount_path": "auth/up1/", "mount_type": "userpass", "counts": {"entity_clients": 15, "non_entity_clients": 15, "clients": 30}}
                    ]
                },
                {
                    "namespace_id": "root",
                    "namespace_path": "",
                    "counts": {"entity_clients": 22, "non_entity_clients": 18, "secret_syncs": 5, "clients": 45},
                    "mounts": [
                        {"mount_path": "auth/up1/", "counts": {"entity_clients": 7, "non_entity_clients": 18, "clients": 25}},
                        {"mount_path": "auth/up2/", "counts": {"entity_clients": 15, "non_entity_clients": 0, "secret_syncs": 5, "clients": 20}}
                    ]
                }
            ],
            "months": [
                {
                    "timestamp": "2023-10-01T00:00:00Z",
                    "counts": {"entity_clients": 20, "non_entity_clients": 15, "secret_syncs": 5, "clients": 40},
                    "namespaces": [
                        {
                            "namespace_id": "root",
                            "namespace_path": "",
                            "counts": {"entity_clients": 10, "non_entity_clients": 10, "secret_syncs": 5, "clients": 25},
                            "mounts": [
                                {"mount_path": "auth/up1/", "counts": {"entity_clients": 5, "non_entity_clients": 10, "clients": 15}},
                                {"mount_path": "auth/up2/", "counts": {"entity_clients": 5, "non_entity_clients": 0, "secret_syncs": 5, "clients": 10}}
                            ]
                        },
                        {
                            "namespace_id": "s07UR",
                            "namespace_path": "ns1/",
                            "counts": {"entity_clients": 10, "non_entity_clients": 5, "clients": 15},
                            "mounts": [
                                {"mount_path": "auth/up1/", "counts": {"entity_clients": 10, "non_entity_clients": 5, "clients": 15}}
                            ]
                        }
                    ],
                    "new_clients": {
                        "counts": {"entity_clients": 5, "non_entity_clients": 5, "clients": 10},
                        "namespaces": [
                            {
                                "namespace_id": "root",
                                "namespace_path": "",
                                "counts": {"entity_clients": 5, "non_entity_clients": 5, "clients": 10},
                                "mounts": [
                                    {"mount_path": "auth/up2/", "counts": {"entity_clients": 5, "non_entity_clients": 5, "clients": 10}}
                                ]
                            }
                        ]
                    }
                },
                {
                    "timestamp": "2023-09-01T00:00:00Z",
                    "counts": {"distinct_entities": 17, "non_entity_tokens": 18, "clients": 35},
                    "namespaces": [
                        {
                            "namespace_id": "root",
                            "namespace_path": "",
                            "counts": {"distinct_entities": 12, "non_entity_tokens": 8, "clients": 20}
                        },
                        {
                            "namespace_id": "s07UR",
                            "namespace_path": "ns1/",
                            "counts": {"distinct_entities": 5, "non_entity_tokens": 10, "clients": 15}
                        }
                    ],
                    "new_clients": {
                        "counts": {"distinct_entities": 3, "non_entity_tokens": 2, "clients": 5},
                        "namespaces": [
                            {
                                "namespace_id": "root",
                                "namespace_path": "",
                                "counts": {"distinct_entities": 3, "non_entity_tokens": 2, "clients": 5}
                            }
                        ]
                    }
                },
                {"timestamp": "2023-08-01T00:00:00Z", "counts": null, "namespaces": null, "new_clients": null},
                {"timestamp": "2023-07-01T00:00:00Z", "counts": null, "namespaces": null, "new_clients": null}
            ]
        }
    })
}

/// A `200` whose counts are all zero.
pub fn empty_activity_body() -> Value {
    json!({
        "request_id": "empty",
        "data": {
            "start_time": "2023-07-01T00:00:00Z",
            "end_time": "2023-10-31T23:59:59Z",
            "total": {"entity_clients": 0, "non_entity_clients": 0, "clients": 0},
            "by_namespace": [],
            "months": []
        }
    })
}

pub fn config_body(enabled: &str) -> Value {
    json!({
        "data": {
            "enabled": enabled,
            "queries_available": true,
            "retention_months": 48,
            "default_report_months": 12
        }
    })
}

pub fn license_body(start: &str) -> Value {
    json!({
        "data": {
            "autoloaded": {"start_time": start, "expiration_time": "2024-07-02T00:00:00Z"}
        }
    })
}

pub fn version_history_body() -> Value {
    json!({
        "data": {
            "keys": ["1.9.0", "1.9.1", "1.10.1", "1.14.4"],
            "key_info": {
                "1.9.0": {"timestamp_installed": "2023-07-02T00:00:00Z", "previous_version": null},
                "1.9.1": {"timestamp_installed": "2023-08-02T00:00:00Z", "previous_version": "1.9.0"},
                "1.10.1": {"timestamp_installed": "2023-09-02T00:00:00Z", "previous_version": "1.9.1"},
                "1.14.4": {"timestamp_installed": "2023-12-02T00:00:00Z", "previous_version": "1.10.1"}
            }
        }
    })
}
