use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Document, DocumentError, Result};

/// Characters of snapshot text shown in a version listing.
const PREVIEW_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VersionId(pub u64);

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An immutable full-document capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionNode {
    pub id: VersionId,
    pub snapshot: String,
    pub line_count: usize,
    pub created_at: DateTime<Utc>,
    /// Back-reference for lookups only; the parent owns this node through `children`.
    pub parent: Option<VersionId>,
    pub children: Vec<VersionId>,
}

impl VersionNode {
    /// First characters of the snapshot on a single line, newlines escaped.
    pub fn preview(&self) -> String {
        let mut chars = self.snapshot.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        let mut preview = head.replace('\n', "\\n");
        if chars.next().is_some() {
            preview.push_str("...");
        }
        preview
    }
}

/// Append-only multi-way tree of snapshots.
///
/// Nodes are stored in id order, so `id - 1` is the slot of a node. Top-level
/// nodes (the root and any parentless snapshot taken after it) are kept in
/// `roots` in creation order.
#[derive(Debug, Default, Clone)]
pub struct VersionTree {
    nodes: Vec<VersionNode>,
    roots: Vec<VersionId>,
}

impl VersionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The first snapshot ever taken.
    pub fn root(&self) -> Option<&VersionNode> {
        self.roots.first().and_then(|id| self.find(*id))
    }

    fn next_id(&self) -> VersionId {
        VersionId(self.nodes.len() as u64 + 1)
    }

    /// Capture `document` as a new version.
    ///
    /// The first snapshot becomes the root whatever `parent` says. After that the
    /// node is appended as the last child of `parent`, or as the last top-level
    /// sibling of the root when `parent` is `None`.
    pub fn snapshot(
        &mut self,
        document: &Document,
        parent: Option<VersionId>,
    ) -> Result<&VersionNode> {
        let id = self.next_id();
        let parent = if self.nodes.is_empty() { None } else { parent };

        if let Some(parent_id) = parent {
            if self.slot(parent_id).is_none() {
                return Err(DocumentError::SnapshotNotFound(parent_id));
            }
        }

        let node = VersionNode {
            id,
            snapshot: document.serialize(),
            line_count: document.len(),
            created_at: Utc::now(),
            parent,
            children: Vec::new(),
        };

        match parent.and_then(|p| self.slot(p)) {
            Some(idx) => self.nodes[idx].children.push(id),
            None => self.roots.push(id),
        }
        self.nodes.push(node);

        self.find(id).ok_or(DocumentError::SnapshotNotFound(id))
    }

    pub fn find(&self, id: VersionId) -> Option<&VersionNode> {
        self.slot(id).map(|idx| &self.nodes[idx])
    }

    fn slot(&self, id: VersionId) -> Option<usize> {
        let idx = usize::try_from(id.0).ok()?.checked_sub(1)?;
        (idx < self.nodes.len()).then_some(idx)
    }

    /// Clear `document` and refill it from the snapshot text, one line per entry.
    pub fn restore(&self, id: VersionId, document: &mut Document) -> Result<&VersionNode> {
        let node = self.find(id).ok_or(DocumentError::SnapshotNotFound(id))?;
        document.replace_with_text(&node.snapshot);
        Ok(node)
    }

    /// Nodes with their depth, children before later siblings.
    pub fn depth_first(&self) -> Vec<(usize, &VersionNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, VersionId)> =
            self.roots.iter().rev().map(|id| (0, *id)).collect();

        while let Some((depth, id)) = stack.pop() {
            if let Some(node) = self.find(id) {
                out.push((depth, node));
                stack.extend(node.children.iter().rev().map(|c| (depth + 1, *c)));
            }
        }
        out
    }

    /// Path from the top-level ancestor down to `id`, inclusive.
    pub fn ancestry(&self, id: VersionId) -> Result<Vec<VersionId>> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self
                .find(current)
                .ok_or(DocumentError::SnapshotNotFound(current))?;
            path.push(node.id);
            cursor = node.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// One `v<id>: <preview>` line per node, indented two spaces per level.
    pub fn render(&self) -> Vec<String> {
        self.depth_first()
            .into_iter()
            .map(|(depth, node)| format!("{}{}: {}", "  ".repeat(depth), node.id, node.preview()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> Document {
        Document::from_lines(lines.iter().copied())
    }

    #[test]
    fn test_first_snapshot_is_root() {
        let mut tree = VersionTree::new();
        let node = tree.snapshot(&doc(&["a"]), Some(VersionId(42))).unwrap();
        assert_eq!(node.id, VersionId(1));
        assert_eq!(node.parent, None);
        assert_eq!(tree.root().map(|n| n.id), Some(VersionId(1)));
    }

    #[test]
    fn test_ids_increase_and_are_findable() {
        let mut tree = VersionTree::new();
        let mut d = Document::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            d.insert(i, format!("line {}", i)).unwrap();
            let root = tree.root().map(|n| n.id);
            ids.push(tree.snapshot(&d, root).unwrap().id);
        }

        assert_eq!(ids, (1..=5).map(VersionId).collect::<Vec<_>>());
        for id in ids {
            assert_eq!(tree.find(id).unwrap().id, id);
        }
        assert!(tree.find(VersionId(0)).is_none());
        assert!(tree.find(VersionId(6)).is_none());
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut tree = VersionTree::new();
        let mut d = doc(&["hello", "world"]);
        let first = tree.snapshot(&d, None).unwrap().id;
        d.insert(2, "more").unwrap();
        let root = tree.root().map(|n| n.id);
        let second = tree.snapshot(&d, root).unwrap().id;

        assert_eq!(tree.find(first).unwrap().snapshot, "hello\nworld\n");
        assert_eq!(tree.find(second).unwrap().snapshot, "hello\nworld\nmore\n");
        assert_eq!(tree.find(second).unwrap().line_count, 3);
    }

    #[test]
    fn test_branching_and_depth_first_order() {
        let mut tree = VersionTree::new();
        let d = doc(&["x"]);
        let v1 = tree.snapshot(&d, None).unwrap().id;
        let v2 = tree.snapshot(&d, Some(v1)).unwrap().id;
        let v3 = tree.snapshot(&d, Some(v1)).unwrap().id;
        let v4 = tree.snapshot(&d, Some(v2)).unwrap().id;
        let v5 = tree.snapshot(&d, None).unwrap().id;

        assert_eq!(tree.find(v1).unwrap().children, vec![v2, v3]);
        assert_eq!(tree.find(v4).unwrap().parent, Some(v2));
        assert_eq!(tree.find(v5).unwrap().parent, None);

        let order: Vec<_> = tree
            .depth_first()
            .into_iter()
            .map(|(depth, n)| (depth, n.id))
            .collect();
        assert_eq!(order, vec![(0, v1), (1, v2), (2, v4), (1, v3), (0, v5)]);

        assert_eq!(tree.ancestry(v4).unwrap(), vec![v1, v2, v4]);
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let mut tree = VersionTree::new();
        tree.snapshot(&doc(&["a"]), None).unwrap();
        assert_eq!(
            tree.snapshot(&doc(&["b"]), Some(VersionId(9))).unwrap_err(),
            DocumentError::SnapshotNotFound(VersionId(9))
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_restore_replaces_document() {
        let mut tree = VersionTree::new();
        let mut d = doc(&["hello", "world"]);
        let v1 = tree.snapshot(&d, None).unwrap().id;

        d.insert(0, "extra").unwrap();
        tree.restore(v1, &mut d).unwrap();

        assert_eq!(d.lines().collect::<Vec<_>>(), vec!["hello", "world"]);
        assert!(!d.history().can_undo());
        assert_eq!(
            tree.restore(VersionId(7), &mut d).unwrap_err(),
            DocumentError::SnapshotNotFound(VersionId(7))
        );
    }

    #[test]
    fn test_render_previews() {
        let mut tree = VersionTree::new();
        let v1 = tree.snapshot(&doc(&["hello", "world"]), None).unwrap().id;
        let long = "x".repeat(50);
        tree.snapshot(&doc(&[long.as_str()]), Some(v1)).unwrap();

        let lines = tree.render();
        assert_eq!(lines[0], "v1: hello\\nworld\\n");
        assert_eq!(lines[1], format!("  v2: {}...", "x".repeat(40)));
    }

    #[test]
    fn test_empty_snapshot() {
        let mut tree = VersionTree::new();
        let node = tree.snapshot(&Document::new(), None).unwrap();
        assert_eq!(node.snapshot, "");
        assert_eq!(node.preview(), "");
    }

    #[test]
    fn test_node_serializes() {
        let mut tree = VersionTree::new();
        let node = tree.snapshot(&doc(&["a"]), None).unwrap();
        let json = serde_json::to_value(node).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["snapshot"], "a\n");
    }
}
