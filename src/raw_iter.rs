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

//! Raw pre-order node iterator
//!
//! Unlike [`Iter`](crate::Iter), this visits every node (leaf-bearing or
//! not) and reports the full path of each. The slow notify path walks the
//! pre-commit and post-commit trees with two raw iterators in lockstep,
//! comparing paths to find replaced and deleted positions.

use std::sync::Arc;

use crate::node::Node;

struct RawFrame<'a, V> {
    /// Accumulated path of the parent, including the parent's own prefix.
    path: Vec<u8>,
    nodes: &'a [Arc<Node<V>>],
}

pub(crate) struct RawIter<'a, V> {
    start: Option<&'a Node<V>>,
    stack: Vec<RawFrame<'a, V>>,
    current: Option<&'a Node<V>>,
    path: Vec<u8>,
}

impl<'a, V> RawIter<'a, V> {
    /// Create the iterator positioned on the first node (the start node
    /// itself).
    pub(crate) fn new(node: &'a Node<V>) -> Self {
        let mut iter = RawIter {
            start: Some(node),
            stack: Vec::new(),
            current: None,
            path: Vec::new(),
        };
        iter.advance();
        iter
    }

    /// Node the iterator is positioned on, or `None` when exhausted.
    pub(crate) fn front(&self) -> Option<&'a Node<V>> {
        self.current
    }

    /// Full path (concatenated prefixes) of the current node.
    pub(crate) fn path(&self) -> &[u8] {
        &self.path
    }

    /// Move to the next node in pre-order.
    pub(crate) fn advance(&mut self) {
        if let Some(n) = self.start.take() {
            self.path.clear();
            self.path.extend_from_slice(&n.prefix);
            if !n.children.is_empty() {
                self.stack.push(RawFrame {
                    path: self.path.clone(),
                    nodes: &n.children,
                });
            }
            self.current = Some(n);
            return;
        }

        while let Some(frame) = self.stack.last_mut() {
            let slice: &'a [Arc<Node<V>>] = frame.nodes;
            let Some((first, rest)) = slice.split_first() else {
                self.stack.pop();
                continue;
            };
            frame.nodes = rest;

            let elem: &'a Node<V> = first.as_ref();
            let mut path = frame.path.clone();
            path.extend_from_slice(&elem.prefix);

            if rest.is_empty() {
                self.stack.pop();
            }
            if !elem.children.is_empty() {
                self.stack.push(RawFrame {
                    path: path.clone(),
                    nodes: &elem.children,
                });
            }

            self.current = Some(elem);
            self.path = path;
            return;
        }

        self.current = None;
        self.path.clear();
    }
}
