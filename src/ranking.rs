//! Attribution Ranker
//!
//! Ranks namespaces (or the mounts of one namespace) by total clients and
//! truncates to a top-N for display. Ranking never consumes its input: callers
//! that need exhaustive search keep the full sequence and rank a view of it.

use crate::models::{ClientCounts, MountBlock, NamespaceBlock, ROOT_NAMESPACE_LABEL};
use serde::Serialize;
use std::cmp::Reverse;

/// Default number of entries shown as top attribution.
pub const DEFAULT_LIMIT: usize = 10;

/// Anything that can appear in an attribution ranking.
pub trait Attributable {
    fn label(&self) -> &str;
    fn counts(&self) -> &ClientCounts;
}

/// Display label for a namespace path; the empty path is the root namespace.
pub fn namespace_label(path: &str) -> String {
    if path.is_empty() {
        ROOT_NAMESPACE_LABEL.to_string()
    } else {
        path.to_string()
    }
}

/// Sort by `clients` descending and keep the first `limit` entries.
///
/// The sort is stable, so ties keep their input order and repeated calls on the
/// same input return the same sequence.
pub fn rank<T: Attributable + Clone>(blocks: &[T], limit: usize) -> Vec<T> {
    let mut ranked = sort_by_clients(blocks);
    ranked.truncate(limit);
    ranked
}

/// The full sequence in ranked order, without truncation.
pub fn sort_by_clients<T: Attributable + Clone>(blocks: &[T]) -> Vec<T> {
    let mut sorted = blocks.to_vec();
    sorted.sort_by_key(|block| Reverse(block.counts().clients));
    sorted
}

/// Rank a namespace's mounts, or `None` if the backend did not report them.
pub fn rank_mounts(namespace: &NamespaceBlock, limit: usize) -> Option<Vec<MountBlock>> {
    namespace.mounts.as_deref().map(|mounts| rank(mounts, limit))
}

/// The dashboard's current drill-down, passed explicitly into ranking and totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    pub namespace: Option<String>,
    pub mount: Option<String>,
}

impl FilterSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespace(label: impl Into<String>) -> Self {
        Self {
            namespace: Some(label.into()),
            mount: None,
        }
    }

    pub fn mount(namespace: impl Into<String>, mount: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            mount: Some(mount.into()),
        }
    }
}

/// What to render as top attribution for a selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Attribution {
    Namespaces { top: Vec<NamespaceBlock> },
    Mounts { namespace: String, top: Vec<MountBlock> },
    /// The namespace exists but has no mount-level data; show namespace totals only.
    MountsUnavailable { namespace: String },
    UnknownNamespace { namespace: String },
}

pub fn attribution(
    by_namespace: &[NamespaceBlock],
    selection: &FilterSelection,
    limit: usize,
) -> Attribution {
    let Some(label) = selection.namespace.as_deref() else {
        return Attribution::Namespaces {
            top: rank(by_namespace, limit),
        };
    };

    match find_namespace(by_namespace, label) {
        None => Attribution::UnknownNamespace {
            namespace: label.to_string(),
        },
        Some(ns) => match rank_mounts(ns, limit) {
            Some(top) => Attribution::Mounts {
                namespace: ns.label.clone(),
                top,
            },
            None => Attribution::MountsUnavailable {
                namespace: ns.label.clone(),
            },
        },
    }
}

pub fn find_namespace<'a>(blocks: &'a [NamespaceBlock], label: &str) -> Option<&'a NamespaceBlock> {
    blocks.iter().find(|ns| ns.label == label)
}

/// Counts for the selected scope: the whole cluster, a namespace, or one mount.
///
/// `cluster_total` is returned for an empty selection. An unknown label, or a
/// mount selected on a namespace without mount data, yields `None`.
pub fn selection_totals(
    cluster_total: Option<ClientCounts>,
    by_namespace: &[NamespaceBlock],
    selection: &FilterSelection,
) -> Option<ClientCounts> {
    let Some(label) = selection.namespace.as_deref() else {
        return cluster_total;
    };
    let ns = find_namespace(by_namespace, label)?;
    match selection.mount.as_deref() {
        None => Some(ns.counts),
        Some(mount) => ns.mount(mount).map(|m| m.counts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(clients: u64) -> ClientCounts {
        ClientCounts {
            clients,
            ..Default::default()
        }
    }

    fn ns(path: &str, clients: u64, mounts: Option<Vec<MountBlock>>) -> NamespaceBlock {
        NamespaceBlock {
            id: path.to_string(),
            path: path.to_string(),
            label: namespace_label(path),
            counts: counts(clients),
            mounts,
        }
    }

    fn mount(path: &str, clients: u64) -> MountBlock {
        MountBlock {
            path: path.to_string(),
            mount_type: None,
            counts: counts(clients),
        }
    }

    #[test]
    fn test_rank_orders_descending() {
        let blocks = vec![ns("ns1/", 145, None), ns("", 155, None)];
        let ranked = rank(&blocks, DEFAULT_LIMIT);
        assert_eq!(ranked[0].label, "root");
        assert_eq!(ranked[1].label, "ns1/");
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let blocks = vec![
            ns("a/", 5, None),
            ns("b/", 9, None),
            ns("c/", 5, None),
            ns("d/", 5, None),
        ];
        let labels: Vec<_> = rank(&blocks, 10).into_iter().map(|n| n.label).collect();
        assert_eq!(labels, vec!["b/", "a/", "c/", "d/"]);
    }

    #[test]
    fn test_rank_truncates_without_touching_input() {
        let blocks: Vec<_> = (0..15).map(|i| ns(&format!("ns{i}/"), i, None)).collect();
        let ranked = rank(&blocks, DEFAULT_LIMIT);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].counts.clients, 14);
        assert_eq!(blocks.len(), 15);
        assert_eq!(blocks[0].counts.clients, 0);
    }

    #[test]
    fn test_attribution_skips_unavailable_mounts() {
        let blocks = vec![
            ns("", 20, Some(vec![mount("auth/up1/", 7), mount("auth/up2/", 13)])),
            ns("legacy/", 4, None),
        ];

        match attribution(&blocks, &FilterSelection::namespace("root"), 10) {
            Attribution::Mounts { namespace, top } => {
                assert_eq!(namespace, "root");
                assert_eq!(top[0].path, "auth/up2/");
            }
            other => panic!("unexpected attribution: {other:?}"),
        }

        assert_eq!(
            attribution(&blocks, &FilterSelection::namespace("legacy/"), 10),
            Attribution::MountsUnavailable {
                namespace: "legacy/".to_string()
            }
        );
        assert!(matches!(
            attribution(&blocks, &FilterSelection::namespace("missing/"), 10),
            Attribution::UnknownNamespace { .. }
        ));
    }

    #[test]
    fn test_selection_totals() {
        let blocks = vec![ns("", 20, Some(vec![mount("auth/up1/", 7)])), ns("legacy/", 4, None)];
        let total = Some(counts(24));

        assert_eq!(selection_totals(total, &blocks, &FilterSelection::all()), total);
        assert_eq!(
            selection_totals(total, &blocks, &FilterSelection::namespace("legacy/")),
            Some(counts(4))
        );
        assert_eq!(
            selection_totals(total, &blocks, &FilterSelection::mount("root", "auth/up1/")),
            Some(counts(7))
        );
        assert_eq!(
            selection_totals(total, &blocks, &FilterSelection::mount("legacy/", "auth/up1/")),
            None
        );
    }
}
