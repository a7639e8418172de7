//! Keyed trees whose leaves are filter sets or collection handles.

use std::collections::BTreeMap;
use std::fmt;

use imagery_common::{ImageryError, ImageryResult};

/// A node of a grouping tree: either a terminal value or named children.
///
/// The same shape is used for grouping configuration (`Node<FilterSet>`)
/// and for realised imagery (`Node<CollectionHandle>`), so one walk serves
/// both flattening and processing.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<L> {
    Leaf(L),
    Group(BTreeMap<String, Node<L>>),
}

impl<L> Default for Node<L> {
    fn default() -> Self {
        Node::Group(BTreeMap::new())
    }
}

impl<L> Node<L> {
    pub fn empty_group() -> Self {
        Self::default()
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Group(_) => None,
        }
    }

    /// Direct child by key. Leaves have no children.
    pub fn child(&self, key: &str) -> Option<&Node<L>> {
        match self {
            Node::Group(children) => children.get(key),
            Node::Leaf(_) => None,
        }
    }

    /// Node at `path` below this one; an empty path is `self`.
    pub fn get(&self, path: &[String]) -> Option<&Node<L>> {
        path.iter().try_fold(self, |node, key| node.child(key))
    }

    /// Visit every leaf depth-first with its path relative to this node.
    pub fn walk<F>(&self, f: &mut F)
    where
        F: FnMut(&[String], &L),
    {
        let mut path = Vec::new();
        self.walk_inner(&mut path, f);
    }

    fn walk_inner<F>(&self, path: &mut Vec<String>, f: &mut F)
    where
        F: FnMut(&[String], &L),
    {
        match self {
            Node::Leaf(leaf) => f(path, leaf),
            Node::Group(children) => {
                for (key, child) in children {
                    path.push(key.clone());
                    child.walk_inner(path, f);
                    path.pop();
                }
            }
        }
    }

    pub fn leaf_paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        self.walk(&mut |path, _| paths.push(path.to_vec()));
        paths
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, _| count += 1);
        count
    }

    /// Rebuild the tree with every leaf replaced by `f(path, leaf)`.
    ///
    /// `base` is prepended to the paths handed to `f`. The source tree is
    /// never modified; the first error aborts the rebuild.
    pub fn try_map_leaves<M, E, F>(&self, base: &[String], f: &mut F) -> Result<Node<M>, E>
    where
        F: FnMut(&[String], &L) -> Result<M, E>,
    {
        let mut path = base.to_vec();
        self.try_map_inner(&mut path, f)
    }

    fn try_map_inner<M, E, F>(&self, path: &mut Vec<String>, f: &mut F) -> Result<Node<M>, E>
    where
        F: FnMut(&[String], &L) -> Result<M, E>,
    {
        match self {
            Node::Leaf(leaf) => Ok(Node::Leaf(f(path, leaf)?)),
            Node::Group(children) => {
                let mut mapped = BTreeMap::new();
                for (key, child) in children {
                    path.push(key.clone());
                    let node = child.try_map_inner(path, f);
                    path.pop();
                    mapped.insert(key.clone(), node?);
                }
                Ok(Node::Group(mapped))
            }
        }
    }

    /// Install `leaf` at `path`, creating intermediate groups.
    ///
    /// An empty path replaces this node if it is an empty group. Landing on
    /// an existing leaf, or replacing a non-empty group, is a conflict.
    pub fn insert(&mut self, path: &[String], leaf: L) -> ImageryResult<()> {
        let Some((last, parents)) = path.split_last() else {
            if !self.is_vacant() {
                return Err(conflict(path));
            }
            *self = Node::Leaf(leaf);
            return Ok(());
        };

        let mut node = self;
        for key in parents {
            let Node::Group(children) = node else {
                return Err(conflict(path));
            };
            node = children.entry(key.clone()).or_default();
        }

        let Node::Group(children) = node else {
            return Err(conflict(path));
        };
        if children.get(last).is_some_and(|existing| !existing.is_vacant()) {
            return Err(conflict(path));
        }
        children.insert(last.clone(), Node::Leaf(leaf));
        Ok(())
    }

    /// An empty group, which a leaf may replace.
    fn is_vacant(&self) -> bool {
        matches!(self, Node::Group(children) if children.is_empty())
    }
}

fn conflict(path: &[String]) -> ImageryError {
    ImageryError::Configuration(format!(
        "cannot install imagery at '{}': path already holds other imagery",
        path.join("/")
    ))
}

/// Indented outline of the tree's keys, leaves rendered with `Display`.
pub struct Outline<'a, L>(pub &'a Node<L>);

impl<L: fmt::Display> fmt::Display for Outline<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node<L: fmt::Display>(
            node: &Node<L>,
            depth: usize,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            match node {
                Node::Leaf(leaf) => writeln!(f, "{:indent$}{}", "", leaf, indent = depth * 2),
                Node::Group(children) if children.is_empty() => {
                    writeln!(f, "{:indent$}{{}}", "", indent = depth * 2)
                }
                Node::Group(children) => {
                    for (key, child) in children {
                        writeln!(f, "{:indent$}{}:", "", key, indent = depth * 2)?;
                        write_node(child, depth + 1, f)?;
                    }
                    Ok(())
                }
            }
        }
        write_node(self.0, 0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_insert_creates_intermediate_groups() {
        let mut tree: Node<u32> = Node::empty_group();
        tree.insert(&p(&["EW", "HH"]), 1).unwrap();
        tree.insert(&p(&["EW", "HV"]), 2).unwrap();
        tree.insert(&p(&["IW"]), 3).unwrap();

        assert_eq!(tree.get(&p(&["EW", "HV"])).and_then(Node::as_leaf), Some(&2));
        assert_eq!(
            tree.leaf_paths(),
            vec![p(&["EW", "HH"]), p(&["EW", "HV"]), p(&["IW"])]
        );
    }

    #[test]
    fn test_insert_empty_path_replaces_empty_group() {
        let mut tree: Node<u32> = Node::empty_group();
        tree.insert(&[], 7).unwrap();
        assert_eq!(tree, Node::Leaf(7));
        assert!(tree.insert(&[], 8).is_err());
    }

    #[test]
    fn test_insert_conflicts() {
        let mut tree: Node<u32> = Node::empty_group();
        tree.insert(&p(&["EW"]), 1).unwrap();
        assert!(tree.insert(&p(&["EW", "HH"]), 2).is_err());
        assert!(tree.insert(&p(&["EW"]), 3).is_err());
    }

    #[test]
    fn test_get_missing_and_through_leaf() {
        let mut tree: Node<u32> = Node::empty_group();
        tree.insert(&p(&["a"]), 1).unwrap();
        assert!(tree.get(&p(&["b"])).is_none());
        assert!(tree.get(&p(&["a", "b"])).is_none());
        assert_eq!(tree.get(&[]), Some(&tree));
    }

    #[test]
    fn test_try_map_passes_full_path() {
        let mut tree: Node<u32> = Node::empty_group();
        tree.insert(&p(&["x", "y"]), 4).unwrap();

        let mapped: Node<String> = tree
            .try_map_leaves::<_, (), _>(&p(&["S1"]), &mut |path, leaf| {
                Ok(format!("{}={}", path.join("/"), leaf))
            })
            .unwrap();
        assert_eq!(
            mapped.get(&p(&["x", "y"])).and_then(Node::as_leaf).map(String::as_str),
            Some("S1/x/y=4")
        );
    }

    #[test]
    fn test_outline() {
        let mut tree: Node<u32> = Node::empty_group();
        tree.insert(&p(&["EW", "HH"]), 1).unwrap();
        assert_eq!(Outline(&tree).to_string(), "EW:\n  HH:\n    1\n");
    }
}
