//! Purpose: Group loaded records into a prefix tree by a key separator.
//! Exports: `KeyTree`, `KeyNode`.
//! Role: Pure data view used by the CLI's `scan --group`; no store access.
//! Invariants: Every record appears exactly once as a leaf.
//! Invariants: Within a folder, sub-folders come first, then leaves; each group sorted by name.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::record::{LoadResult, Record};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeyNode<'a> {
    Folder {
        #[serde(rename = "folder")]
        name: String,
        children: Vec<KeyNode<'a>>,
    },
    Leaf(&'a Record),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyTree<'a> {
    separator: String,
    nodes: Vec<KeyNode<'a>>,
}

#[derive(Default)]
struct Folder<'a> {
    folders: BTreeMap<String, Folder<'a>>,
    leaves: Vec<&'a Record>,
}

impl<'a> Folder<'a> {
    fn into_nodes(self) -> Vec<KeyNode<'a>> {
        let mut leaves = self.leaves;
        leaves.sort_by(|a, b| a.key().cmp(b.key()));
        let mut nodes: Vec<KeyNode<'a>> = self
            .folders
            .into_iter()
            .map(|(name, folder)| KeyNode::Folder {
                name,
                children: folder.into_nodes(),
            })
            .collect();
        nodes.extend(leaves.into_iter().map(KeyNode::Leaf));
        nodes
    }
}

impl<'a> KeyTree<'a> {
    /// A blank separator yields a flat tree.
    pub fn build(result: &'a LoadResult, separator: &str) -> Self {
        let mut root = Folder::default();
        for record in result.records() {
            let mut folder = &mut root;
            if !separator.trim().is_empty() {
                let key = record.key_lossy();
                let mut segments: Vec<&str> = key.split(separator).collect();
                segments.pop();
                for segment in segments {
                    folder = folder.folders.entry(segment.to_string()).or_default();
                }
            }
            folder.leaves.push(record);
        }
        Self {
            separator: separator.to_string(),
            nodes: root.into_nodes(),
        }
    }

    pub fn nodes(&self) -> &[KeyNode<'a>] {
        &self.nodes
    }

    pub fn leaf_count(&self) -> usize {
        fn count(nodes: &[KeyNode<'_>]) -> usize {
            nodes
                .iter()
                .map(|node| match node {
                    KeyNode::Folder { children, .. } => count(children),
                    KeyNode::Leaf(_) => 1,
                })
                .sum()
        }
        count(&self.nodes)
    }
}
