//! Flattening of nested grouping configuration.

use serde::Serialize;
use tracing::warn;

use crate::config::{FilterSet, GroupNode, TRUNCATED_SEGMENT};
use crate::Node;

/// How many group levels are searched for a `filters` leaf.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// One leaf filter set and the group keys leading to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedEntry {
    pub path: Vec<String>,
    pub filters: FilterSet,
    /// The branch went deeper than the depth limit. `path` ends with
    /// [`TRUNCATED_SEGMENT`] and `filters` is empty.
    pub truncated: bool,
}

/// Flatten `config` into one entry per reachable leaf, depth-first.
///
/// A leaf is still recognised at the depth limit; a group found there
/// yields a single truncated entry instead of being descended into.
pub fn flatten(config: &GroupNode, max_depth: usize) -> Vec<FlattenedEntry> {
    let mut entries = Vec::new();
    let mut path = Vec::new();
    flatten_into(config, max_depth, &mut path, &mut entries);
    entries
}

fn flatten_into(
    node: &GroupNode,
    depth_left: usize,
    path: &mut Vec<String>,
    entries: &mut Vec<FlattenedEntry>,
) {
    match node {
        Node::Leaf(filters) => entries.push(FlattenedEntry {
            path: path.clone(),
            filters: filters.clone(),
            truncated: false,
        }),
        Node::Group(_) if depth_left == 0 => {
            warn!(
                path = %path.join("/"),
                "Grouping configuration exceeds depth limit; branch truncated"
            );
            let mut truncated = path.clone();
            truncated.push(TRUNCATED_SEGMENT.to_string());
            entries.push(FlattenedEntry {
                path: truncated,
                filters: Vec::new(),
                truncated: true,
            });
        }
        Node::Group(children) => {
            for (key, child) in children {
                path.push(key.clone());
                flatten_into(child, depth_left - 1, path, entries);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::FilterSpec;
    use std::collections::BTreeMap;

    fn p(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn nested(depth: usize) -> GroupNode {
        let mut node = Node::Leaf(vec![FilterSpec::new("eq", vec!["a".into(), "b".into()])]);
        for level in (0..depth).rev() {
            let mut children = BTreeMap::new();
            children.insert(format!("l{}", level), node);
            node = Node::Group(children);
        }
        node
    }

    #[test]
    fn test_leaf_root_has_empty_path() {
        let entries = flatten(&Node::Leaf(vec![]), DEFAULT_MAX_DEPTH);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].path.is_empty());
        assert!(!entries[0].truncated);
    }

    #[test]
    fn test_empty_group_has_no_entries() {
        assert!(flatten(&GroupNode::empty_group(), DEFAULT_MAX_DEPTH).is_empty());
    }

    #[test]
    fn test_within_limit_reaches_leaf() {
        let entries = flatten(&nested(3), 3);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, p(&["l0", "l1", "l2"]));
        assert_eq!(entries[0].filters.len(), 1);
    }

    #[test]
    fn test_beyond_limit_truncates() {
        let entries = flatten(&nested(4), 2);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].truncated);
        assert_eq!(entries[0].path, p(&["l0", "l1", TRUNCATED_SEGMENT]));
        assert!(entries[0].filters.is_empty());
    }

    #[test]
    fn test_zero_depth_group_truncates_at_root() {
        let entries = flatten(&nested(1), 0);
        assert_eq!(entries[0].path, p(&[TRUNCATED_SEGMENT]));
    }
}
