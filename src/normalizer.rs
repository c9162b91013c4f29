//! Schema Normalizer
//!
//! Backends have renamed count fields across releases. [`FIELD_RENAMES`] is the
//! single table of those renames; it is consulted here and nowhere else, so
//! every structure leaving this module carries only canonical field names.
//!
//! When a payload carries both the deprecated and the modern key (a backend
//! mid-migration emits both), the modern key wins and the deprecated one is
//! dropped. That is a policy, not an error; a disagreement between the two is
//! logged.

use crate::error::{Error, Result};
use crate::models::{
    ClientCounts, MountBlock, NamespaceBlock, NewClients, RawCounts, RawMount, RawNamespace,
    RawNewClients,
};
use crate::ranking::namespace_label;
use serde_json::Value;
use tracing::{debug, warn};

/// Deprecated field names and the canonical name each one was renamed to.
pub const FIELD_RENAMES: &[(&str, &str)] = &[
    ("distinct_entities", "entity_clients"),
    ("non_entity_tokens", "non_entity_clients"),
];

const CLIENTS: &str = "clients";
const ENTITY_CLIENTS: &str = "entity_clients";
const NON_ENTITY_CLIENTS: &str = "non_entity_clients";
const SECRET_SYNCS: &str = "secret_syncs";
const ACME_CLIENTS: &str = "acme_clients";

/// Rewrite a raw counts object into canonical [`ClientCounts`].
///
/// `clients` and the entity and non-entity counters are mandatory under either
/// their modern or deprecated key. The extended counters stay `None` when
/// absent.
pub fn normalize(raw: &RawCounts) -> Result<ClientCounts> {
    let counts = ClientCounts {
        clients: required_counter(raw, CLIENTS)?,
        entity_clients: required_counter(raw, ENTITY_CLIENTS)?,
        non_entity_clients: required_counter(raw, NON_ENTITY_CLIENTS)?,
        secret_syncs: read_counter(raw, SECRET_SYNCS)?,
        acme_clients: read_counter(raw, ACME_CLIENTS)?,
    };

    if counts.clients < counts.largest_category() {
        warn!(
            clients = counts.clients,
            largest_category = counts.largest_category(),
            "Upstream clients total is below one of its categories"
        );
    }

    Ok(counts)
}

fn required_counter(raw: &RawCounts, canonical: &str) -> Result<u64> {
    read_counter(raw, canonical)?.ok_or_else(|| Error::MalformedCounts {
        field: canonical.to_string(),
        reason: "missing".to_string(),
    })
}

/// Read a canonical counter, falling back to any deprecated alias of it.
fn read_counter(raw: &RawCounts, canonical: &str) -> Result<Option<u64>> {
    let modern = parse_counter(canonical, raw.get(canonical))?;

    let mut deprecated = None;
    for (old, _) in FIELD_RENAMES.iter().filter(|(_, new)| *new == canonical) {
        if let Some(value) = parse_counter(old, raw.get(old))? {
            deprecated = Some((*old, value));
            break;
        }
    }

    match (modern, deprecated) {
        (Some(value), Some((old, old_value))) => {
            if value != old_value {
                warn!(
                    field = canonical,
                    deprecated_field = old,
                    value,
                    deprecated_value = old_value,
                    "Deprecated and canonical counters disagree, keeping canonical"
                );
            } else {
                debug!(
                    field = canonical,
                    deprecated_field = old,
                    "Dropping duplicate deprecated counter"
                );
            }
            Ok(Some(value))
        }
        (Some(value), None) => Ok(Some(value)),
        (None, Some((_, value))) => Ok(Some(value)),
        (None, None) => Ok(None),
    }
}

fn parse_counter(field: &str, value: Option<&Value>) -> Result<Option<u64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                return Ok(Some(v));
            }
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                    Ok(Some(f as u64))
                }
                _ => Err(Error::MalformedCounts {
                    field: field.to_string(),
                    reason: format!("expected a non-negative integer, got {n}"),
                }),
            }
        }
        Some(other) => Err(Error::MalformedCounts {
            field: field.to_string(),
            reason: format!("expected a number, got {other}"),
        }),
    }
}

pub fn normalize_mount(raw: &RawMount) -> Result<MountBlock> {
    Ok(MountBlock {
        path: raw.mount_path.clone(),
        mount_type: raw.mount_type.clone(),
        counts: normalize(&raw.counts)?,
    })
}

/// Normalize a namespace and its mounts, keeping `mounts: None` as reported.
pub fn normalize_namespace(raw: &RawNamespace) -> Result<NamespaceBlock> {
    let mounts = raw
        .mounts
        .as_ref()
        .map(|mounts| mounts.iter().map(normalize_mount).collect::<Result<Vec<_>>>())
        .transpose()?;

    Ok(NamespaceBlock {
        id: raw.namespace_id.clone(),
        path: raw.namespace_path.clone(),
        label: namespace_label(&raw.namespace_path),
        counts: normalize(&raw.counts)?,
        mounts,
    })
}

pub fn normalize_namespaces(raw: &[RawNamespace]) -> Result<Vec<NamespaceBlock>> {
    raw.iter().map(normalize_namespace).collect()
}

/// `None` when the backend sent no new-client counts for the month.
pub fn normalize_new_clients(raw: &RawNewClients) -> Result<Option<NewClients>> {
    let Some(counts) = raw.counts.as_ref() else {
        return Ok(None);
    };

    Ok(Some(NewClients {
        counts: normalize(counts)?,
        namespaces: normalize_namespaces(raw.namespaces.as_deref().unwrap_or_default())?,
    }))
}
