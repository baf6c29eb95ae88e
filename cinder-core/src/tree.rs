// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Profile trees
//!
//! A [`ProfileTree`] is a call-stack trie. Each node carries a `self` value
//! (samples attributed to exactly that stack) and a `total` (self plus all
//! descendants). Trees are the unit stored per (segment, depth, time bucket).
//!
//! ## Merge semantics
//!
//! `merge` adds values node by node, so it is commutative and associative:
//! any set of merges into the same tree yields the same result in any order.
//! Children are kept in a `BTreeMap`, which makes structural equality and the
//! collapsed rendering deterministic.

use crate::error::{CoreError, Result};
use crate::locked_cell::LockedCell;
use crate::ratio::Ratio;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared, lockable tree handle as stored in the tree cache.
pub type SharedTree = Arc<LockedCell<ProfileTree>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Node {
    self_value: u64,
    total: u64,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn merge(&mut self, other: &Node) {
        self.self_value = self.self_value.saturating_add(other.self_value);
        self.total = self.total.saturating_add(other.total);
        for (name, child) in &other.children {
            match self.children.get_mut(name) {
                Some(existing) => existing.merge(child),
                None => {
                    self.children.insert(name.clone(), child.clone());
                }
            }
        }
    }

    /// Scaled copy; `None` when nothing survives the scaling.
    fn scaled(&self, ratio: Ratio) -> Option<Node> {
        let self_value = ratio.scale(self.self_value);
        let children: BTreeMap<String, Node> = self
            .children
            .iter()
            .filter_map(|(name, child)| child.scaled(ratio).map(|c| (name.clone(), c)))
            .collect();
        let total = children
            .values()
            .fold(self_value, |acc, c| acc.saturating_add(c.total));
        if total == 0 {
            return None;
        }
        Some(Node {
            self_value,
            total,
            children,
        })
    }

    fn collect_collapsed(&self, prefix: &mut Vec<String>, out: &mut Vec<String>) {
        if self.self_value > 0 && !prefix.is_empty() {
            out.push(format!("{} {}", prefix.join(";"), self.self_value));
        }
        for (name, child) in &self.children {
            prefix.push(name.clone());
            child.collect_collapsed(prefix, out);
            prefix.pop();
        }
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(Node::count).sum::<usize>()
    }
}

/// Mergeable call-stack aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTree {
    root: Node,
}

impl ProfileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from collapsed stack text (`a;b;c 10`, one stack per line).
    pub fn from_collapsed(text: &str) -> Result<Self> {
        let mut tree = Self::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            tree.insert_collapsed(line)?;
        }
        Ok(tree)
    }

    /// Add `value` to the stack `frames` (root first). Empty stacks and zero
    /// values are ignored.
    pub fn insert<S: AsRef<str>>(&mut self, frames: &[S], value: u64) {
        if frames.is_empty() || value == 0 {
            return;
        }
        let mut node = &mut self.root;
        node.total = node.total.saturating_add(value);
        for frame in frames {
            node = node.children.entry(frame.as_ref().to_string()).or_default();
            node.total = node.total.saturating_add(value);
        }
        node.self_value = node.self_value.saturating_add(value);
    }

    /// Insert one collapsed stack line such as `main;work;parse 42`.
    pub fn insert_collapsed(&mut self, line: &str) -> Result<()> {
        let bad_line = || CoreError::InvalidCollapsedLine {
            line: line.to_string(),
        };
        let (stack, value) = line.trim().rsplit_once(' ').ok_or_else(bad_line)?;
        let value: u64 = value.parse().map_err(|_| bad_line())?;
        let frames: Vec<&str> = stack.split(';').filter(|f| !f.is_empty()).collect();
        if frames.is_empty() {
            return Err(bad_line());
        }
        self.insert(&frames, value);
        Ok(())
    }

    /// Merge `other` into this tree.
    pub fn merge(&mut self, other: &ProfileTree) {
        self.root.merge(&other.root);
    }

    /// Copy with every value multiplied by `ratio` (rounded down). Nodes that
    /// scale to zero are dropped.
    pub fn scaled_copy(&self, ratio: Ratio) -> ProfileTree {
        if ratio.is_one() {
            return self.clone();
        }
        ProfileTree {
            root: self.root.scaled(ratio).unwrap_or_default(),
        }
    }

    /// Total of all values in the tree.
    pub fn samples(&self) -> u64 {
        self.root.total
    }

    pub fn is_empty(&self) -> bool {
        self.root.total == 0
    }

    /// Self value of one stack, if the stack exists.
    pub fn self_value<S: AsRef<str>>(&self, frames: &[S]) -> Option<u64> {
        let mut node = &self.root;
        for frame in frames {
            node = node.children.get(frame.as_ref())?;
        }
        Some(node.self_value)
    }

    /// Number of nodes, excluding the root.
    pub fn node_count(&self) -> usize {
        self.root.count() - 1
    }

    /// Collapsed stack lines in lexical order.
    pub fn collapsed(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_collapsed(&mut Vec::new(), &mut out);
        out
    }
}
