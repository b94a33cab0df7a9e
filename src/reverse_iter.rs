// Copyright 2025 Stoolap Contributors
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

//! Reverse in-order iterator
//!
//! Forward pre-order visits a node's leaf before its descendants; in
//! reverse order the leaf must come after them. Each single-node frame
//! therefore carries an `expanded` flag: popping an unexpanded node with
//! children pushes the node back (expanded) followed by its children, so
//! the largest child is visited first and the node's own leaf last.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::node::Node;
use crate::watch::WatchSignal;

enum RevFrame<'a, V> {
    Nodes(&'a [Arc<Node<V>>]),
    Single(&'a Node<V>, bool),
}

/// Iterator over a tree (or subtree) in descending key order.
///
/// Created by [`RadixTree::reverse_iter`](crate::RadixTree::reverse_iter)
/// or [`Node::reverse_iter`]. [`prev`](Self::prev) steps backwards; the
/// [`Iterator`] impl yields the same descending sequence.
pub struct ReverseIter<'a, V> {
    root: &'a Node<V>,
    node: Option<&'a Node<V>>,
    stack: Vec<RevFrame<'a, V>>,
    seeded: bool,
}

impl<'a, V> ReverseIter<'a, V> {
    pub(crate) fn new(root: &'a Node<V>) -> Self {
        ReverseIter {
            root,
            node: Some(root),
            stack: Vec::new(),
            seeded: false,
        }
    }

    /// Position the iterator at the subtree covering `prefix`, so that
    /// `prev` yields exactly the keys with that prefix in descending
    /// order.
    pub fn seek_prefix(&mut self, prefix: &[u8]) {
        self.seek_prefix_watch(prefix);
    }

    /// Like [`seek_prefix`](Self::seek_prefix), additionally returning the
    /// finest-granularity watch signal traversed during the descent.
    pub fn seek_prefix_watch(&mut self, prefix: &[u8]) -> WatchSignal {
        self.stack.clear();
        self.seeded = false;
        let (watch, subtree) = self.root.prefix_subtree(prefix);
        self.node = subtree;
        watch
    }

    /// Position the iterator so that `prev` yields the keys `<= key` in
    /// descending order.
    pub fn seek_reverse_lower_bound(&mut self, key: &[u8]) {
        self.stack.clear();
        self.node = None;
        self.seeded = true;

        let mut n = self.root;
        let mut search = key;
        loop {
            let prefix_cmp = if n.prefix.len() < search.len() {
                n.prefix.as_slice().cmp(&search[..n.prefix.len()])
            } else {
                n.prefix.as_slice().cmp(search)
            };

            match prefix_cmp {
                Ordering::Less => {
                    // Every key in this subtree is smaller than the search
                    // key; the reverse lower bound is its maximum. Push the
                    // node unexpanded so the whole subtree is walked.
                    self.stack.push(RevFrame::Single(n, false));
                    return;
                }
                Ordering::Greater => {
                    // Every key in this subtree is greater; nothing here.
                    return;
                }
                Ordering::Equal => {}
            }

            if let Some(leaf) = &n.leaf {
                if leaf.key.as_ref() == key {
                    // Exact match: emit the leaf and stop. The subtree
                    // below holds only strictly greater keys.
                    self.stack.push(RevFrame::Single(n, true));
                    return;
                }
                if n.children.is_empty() {
                    // The leaf key is a strict prefix of the search key,
                    // hence strictly smaller; with no children it is the
                    // answer.
                    self.stack.push(RevFrame::Single(n, true));
                    return;
                }
                // The leaf is a candidate; children on the left of the
                // descent path may hold closer ones. Push pre-expanded so
                // only the leaf is emitted when it comes up.
                self.stack.push(RevFrame::Single(n, true));
            }

            search = &search[n.prefix.len()..];
            if search.is_empty() {
                // Exhausted without a leaf at this node: every key below
                // is strictly greater.
                return;
            }

            let lower = n.lower_bound_edge(search[0]);
            let idx = match &lower {
                Some((idx, _)) => *idx,
                None => n.children.len(),
            };
            // Children before the lower-bound edge are strictly smaller
            // than the search key.
            if idx > 0 {
                self.stack.push(RevFrame::Nodes(&n.children[..idx]));
            }
            match lower {
                Some((_, child)) => n = child.as_ref(),
                None => return,
            }
        }
    }

    /// Step to the previous (next smaller) key.
    pub fn prev(&mut self) -> Option<(&'a [u8], &'a V)> {
        if !self.seeded {
            self.seeded = true;
            if let Some(n) = self.node.take() {
                self.stack.push(RevFrame::Single(n, false));
            }
        }

        while let Some(top) = self.stack.last_mut() {
            let (elem, expanded): (&'a Node<V>, bool) = match top {
                RevFrame::Single(n, expanded) => {
                    let frame = (*n, *expanded);
                    self.stack.pop();
                    frame
                }
                RevFrame::Nodes(nodes) => {
                    let slice: &'a [Arc<Node<V>>] = *nodes;
                    let (last, rest) = slice
                        .split_last()
                        .expect("iterator frames are never empty");
                    if rest.is_empty() {
                        self.stack.pop();
                    } else {
                        *nodes = rest;
                    }
                    (last.as_ref(), false)
                }
            };

            if !expanded && !elem.children.is_empty() {
                // Revisit the node for its leaf after its children.
                self.stack.push(RevFrame::Single(elem, true));
                self.stack.push(RevFrame::Nodes(&elem.children));
                continue;
            }

            if let Some(leaf) = &elem.leaf {
                return Some((&leaf.key, &leaf.value));
            }
        }
        None
    }
}

impl<'a, V> Iterator for ReverseIter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.prev()
    }
}

impl<V> std::iter::FusedIterator for ReverseIter<'_, V> {}
