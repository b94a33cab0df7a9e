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

//! Copy-on-write transaction
//!
//! A transaction owns a working root derived from a snapshot. Writes
//! clone the nodes along the mutation path (path-copy); everything off
//! the path stays shared with the snapshot. Nodes authored by the
//! transaction are recorded in an identity set so a second write through
//! the same path mutates them in place instead of cloning again.
//!
//! With mutation tracking enabled the transaction accumulates the watch
//! signals of every position it replaces and fires them on commit. The
//! tracked set is bounded; once it overflows, the commit falls back to
//! diffing the pre- and post-commit trees with raw iterators.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::bitmap::EdgeBitmap;
use crate::node::{longest_common_prefix, Leaf, Node, Prefix};
use crate::tree::RadixTree;
use crate::watch::WatchSignal;

/// Maximum number of signals tracked individually before a commit falls
/// back to the slow tree-diff notification path.
const MAX_TRACKED_SIGNALS: usize = 8192;

/// Bookkeeping shared by all write paths: which nodes this transaction
/// authored, and which signals it must fire on commit.
struct WriteState {
    /// Identities (addresses) of nodes created by this transaction. The
    /// snapshot keeps every pre-transaction node alive, so an address in
    /// this set can only denote a transaction-authored node.
    owned: FxHashSet<usize>,
    track: bool,
    tracked: FxHashSet<WatchSignal>,
    overflow: bool,
}

impl WriteState {
    fn new() -> Self {
        WriteState {
            owned: FxHashSet::default(),
            track: false,
            tracked: FxHashSet::default(),
            overflow: false,
        }
    }

    fn track_signal(&mut self, signal: &WatchSignal) {
        if !self.track || self.overflow {
            return;
        }
        if self.tracked.len() >= MAX_TRACKED_SIGNALS {
            // Too many positions touched; stop accumulating and let
            // notify diff the trees instead.
            self.overflow = true;
            self.tracked.clear();
            return;
        }
        self.tracked.insert(signal.clone());
    }

    /// Record the signals of a node authored by someone else that this
    /// transaction is about to replace. The leaf signal is tracked along
    /// with the node signal so an exact-match watch observes structural
    /// change anywhere under its key.
    fn track_node<V>(&mut self, node: &Node<V>) {
        self.track_signal(&node.signal);
        if let Some(leaf) = &node.leaf {
            self.track_signal(&leaf.signal);
        }
    }

    /// Make the node in `slot` writable, cloning it unless this
    /// transaction already authored it. Returns a mutable reference into
    /// the slot.
    fn write_node<'a, V>(&mut self, slot: &'a mut Arc<Node<V>>) -> &'a mut Node<V> {
        let addr = Arc::as_ptr(slot) as usize;
        if self.owned.contains(&addr) {
            if let Some(leaf) = &slot.leaf {
                self.track_signal(&leaf.signal);
            }
            return Arc::get_mut(slot).expect("transaction-owned node is uniquely referenced");
        }

        self.track_signal(&slot.signal);
        if let Some(leaf) = &slot.leaf {
            self.track_signal(&leaf.signal);
        }

        let copy = Node {
            signal: WatchSignal::new(),
            leaf: slot.leaf.clone(),
            prefix: slot.prefix.clone(),
            bitmap: slot.bitmap,
            children: slot.children.clone(),
        };
        *slot = Arc::new(copy);
        self.owned.insert(Arc::as_ptr(slot) as usize);
        Arc::get_mut(slot).expect("freshly cloned node is uniquely referenced")
    }

    /// Register a node built by this transaction.
    fn adopt<V>(&mut self, node: &Arc<Node<V>>) {
        self.owned.insert(Arc::as_ptr(node) as usize);
    }
}

/// A single-writer transaction over a [`RadixTree`] snapshot.
///
/// Derived from [`RadixTree::txn`]. Reads against the transaction observe
/// uncommitted writes; the originating tree (and every other snapshot)
/// is unaffected until and after [`commit`](Self::commit), which returns
/// a new tree handle. The transaction stays usable after a commit and
/// may commit again.
pub struct Transaction<V> {
    root: Arc<Node<V>>,
    /// Pre-transaction root, kept for the slow notification diff and to
    /// pin every shared node in memory for the identity checks.
    snap: Arc<Node<V>>,
    size: usize,
    state: WriteState,
}

impl<V> Transaction<V> {
    pub(crate) fn new(tree: &RadixTree<V>) -> Self {
        Transaction {
            root: Arc::clone(&tree.root),
            snap: Arc::clone(&tree.root),
            size: tree.size,
            state: WriteState::new(),
        }
    }

    /// Enable or disable watch-signal accumulation for subsequent writes.
    /// Off by default; when off, committing fires nothing.
    pub fn track_mutate(&mut self, track: bool) {
        self.state.track = track;
    }

    /// Number of keys in the working tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the working tree holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The working root, observing uncommitted writes.
    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    /// Look up a key in the working tree.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.root.get(key)
    }

    /// Look up a key in the working tree with its watch signal.
    pub fn get_watch(&self, key: &[u8]) -> (WatchSignal, Option<&V>) {
        self.root.get_watch(key)
    }

    /// Commit the working root into a new tree without firing any
    /// accumulated signals; [`notify`](Self::notify) fires them later.
    pub fn commit_only(&mut self) -> RadixTree<V> {
        let tree = RadixTree {
            root: Arc::clone(&self.root),
            size: self.size,
        };
        // The committed nodes are shared from here on; further writes in
        // this transaction must clone them again.
        self.state.owned.clear();
        tree
    }

    /// Fire the accumulated watch signals. Called by
    /// [`commit`](Self::commit); exposed for callers that use
    /// [`commit_only`](Self::commit_only) and control notification
    /// timing themselves.
    pub fn notify(&mut self) {
        if !self.state.track {
            return;
        }
        if self.state.overflow {
            self.slow_notify();
        } else {
            for signal in self.state.tracked.drain() {
                signal.fire();
            }
        }
        self.state.tracked.clear();
        self.state.overflow = false;
    }

    /// Commit the working root into a new tree and fire the accumulated
    /// watch signals.
    pub fn commit(&mut self) -> RadixTree<V> {
        let tree = self.commit_only();
        if self.state.track {
            self.notify();
        }
        tree
    }

    /// Diff the pre-transaction tree against the working tree and fire
    /// the signals of every replaced or deleted position. Used when the
    /// tracked set overflowed.
    fn slow_notify(&self) {
        use std::cmp::Ordering;

        let mut snap_iter = self.snap.raw_iter();
        let mut root_iter = self.root.raw_iter();

        while let Some(snap_node) = snap_iter.front() {
            let (fire, advance_snap, advance_root) = match root_iter.front() {
                // The rest of the snapshot was deleted.
                None => (true, true, false),
                Some(root_node) => match snap_iter.path().cmp(root_iter.path()) {
                    // This position no longer exists.
                    Ordering::Less => (true, true, false),
                    // A position created by the transaction; nobody can be
                    // watching it yet.
                    Ordering::Greater => (false, false, true),
                    // Same position: fire only if the node was replaced.
                    Ordering::Equal => (!std::ptr::eq(snap_node, root_node), true, true),
                },
            };

            if fire {
                snap_node.signal.fire();
                if let Some(leaf) = &snap_node.leaf {
                    leaf.signal.fire();
                }
            }
            if advance_snap {
                snap_iter.advance();
            }
            if advance_root {
                root_iter.advance();
            }
        }
    }
}

impl<V: Clone> Transaction<V> {
    /// Insert or replace a key, returning the previous value if the key
    /// was present.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let old = Self::insert_at(&mut self.state, &mut self.root, key, key, value);
        if old.is_none() {
            self.size += 1;
        }
        old
    }

    fn insert_at(
        state: &mut WriteState,
        slot: &mut Arc<Node<V>>,
        key: &[u8],
        search: &[u8],
        value: V,
    ) -> Option<V> {
        // Key exhausted: the leaf belongs on this node.
        if search.is_empty() {
            let old = slot.leaf.as_ref().map(|leaf| leaf.value.clone());
            let node = state.write_node(slot);
            node.leaf = Some(Arc::new(Leaf::new(key, value)));
            return old;
        }

        let label = search[0];

        // No edge: attach a leaf-only child carrying the whole suffix.
        if !slot.bitmap.contains(label) {
            let child = Arc::new(Node::leaf_node(search, key, value));
            state.adopt(&child);
            let node = state.write_node(slot);
            node.add_edge(child);
            return None;
        }

        let idx = slot.bitmap.rank(label);
        let common = longest_common_prefix(search, &slot.children[idx].prefix);

        // The child's prefix is fully consumed: recurse into it.
        if common == slot.children[idx].prefix.len() {
            let node = state.write_node(slot);
            return Self::insert_at(state, &mut node.children[idx], key, &search[common..], value);
        }

        // Split the child: a new junction takes the common portion, the
        // old child keeps the remainder of its prefix under it.
        let node = state.write_node(slot);
        let junction = Arc::new(Node::internal(&search[..common]));
        state.adopt(&junction);

        let child_slot = &mut node.children[idx];
        state.write_node(child_slot).prefix.drain(..common);
        let old_child = std::mem::replace(child_slot, junction);

        let junction = Arc::get_mut(child_slot).expect("freshly built junction is unshared");
        let remainder = &search[common..];
        if remainder.is_empty() {
            // The new key ends at the junction itself.
            junction.leaf = Some(Arc::new(Leaf::new(key, value)));
        } else {
            let leaf_child = Arc::new(Node::leaf_node(remainder, key, value));
            state.adopt(&leaf_child);
            junction.add_edge(leaf_child);
        }
        junction.add_edge(old_child);
        None
    }

    /// Delete a key, returning its value if it was present.
    pub fn delete(&mut self, key: &[u8]) -> Option<V> {
        // Probe first so a miss clones nothing and fires nothing.
        self.root.get(key)?;
        let old = Self::delete_at(&mut self.state, &mut self.root, true, key);
        debug_assert!(old.is_some(), "probed key must be deletable");
        if old.is_some() {
            self.size -= 1;
        }
        old
    }

    fn delete_at(
        state: &mut WriteState,
        slot: &mut Arc<Node<V>>,
        is_root: bool,
        search: &[u8],
    ) -> Option<V> {
        if search.is_empty() {
            let old = slot.leaf.as_ref().map(|leaf| leaf.value.clone())?;
            let node = state.write_node(slot);
            node.leaf = None;
            if !is_root && node.children.len() == 1 {
                Self::merge_child(state, node);
            }
            return Some(old);
        }

        let label = search[0];
        if !slot.bitmap.contains(label) {
            return None;
        }
        let idx = slot.bitmap.rank(label);
        let prefix_len = {
            let child = &slot.children[idx];
            if !search.starts_with(&child.prefix) {
                return None;
            }
            child.prefix.len()
        };

        let node = state.write_node(slot);
        let old = Self::delete_at(state, &mut node.children[idx], false, &search[prefix_len..])?;

        // Unwind: drop the child if it became empty, then restore the
        // compression invariant on this node.
        let child_empty = {
            let child = &node.children[idx];
            child.leaf.is_none() && child.children.is_empty()
        };
        if child_empty {
            node.del_edge(label);
            if !is_root && node.children.len() == 1 && !node.is_leaf() {
                Self::merge_child(state, node);
            }
        }
        Some(old)
    }

    /// Absorb a node's only child: concatenate prefixes and take the
    /// child's leaf, bitmap, and children.
    fn merge_child(state: &mut WriteState, node: &mut Node<V>) {
        let child = node.children.pop().expect("merge requires a child");
        state.track_node(child.as_ref());
        node.prefix.extend_from_slice(&child.prefix);
        match Arc::try_unwrap(child) {
            Ok(child) => {
                node.leaf = child.leaf;
                node.bitmap = child.bitmap;
                node.children = child.children;
            }
            Err(child) => {
                node.leaf = child.leaf.clone();
                node.bitmap = child.bitmap;
                node.children = child.children.clone();
            }
        }
    }

    /// Delete every key under `prefix`. Returns whether anything was
    /// deleted.
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> bool {
        if !Self::prefix_populated(&self.root, prefix) {
            return false;
        }
        let removed = Self::delete_prefix_at(&mut self.state, &mut self.root, true, prefix)
            .expect("probed prefix must match");
        self.size -= removed;
        true
    }

    /// Whether at least one key under `prefix` exists.
    fn prefix_populated(root: &Arc<Node<V>>, prefix: &[u8]) -> bool {
        let mut n = root.as_ref();
        let mut search = prefix;
        loop {
            if search.is_empty() {
                return n.leaf.is_some() || !n.children.is_empty();
            }
            let Some(child) = n.edge(search[0]) else {
                return false;
            };
            if search.starts_with(&child.prefix) {
                search = &search[child.prefix.len()..];
                n = child.as_ref();
            } else {
                // A child whose prefix extends the search prefix covers a
                // non-empty subtree.
                return child.prefix.starts_with(search);
            }
        }
    }

    fn delete_prefix_at(
        state: &mut WriteState,
        slot: &mut Arc<Node<V>>,
        is_root: bool,
        search: &[u8],
    ) -> Option<usize> {
        if search.is_empty() {
            // Everything below (and at) this node goes. Track the whole
            // subtree before detaching it.
            let removed = Self::track_subtree(state, slot.as_ref());
            let node = state.write_node(slot);
            node.leaf = None;
            node.children.clear();
            node.bitmap = EdgeBitmap::default();
            return Some(removed);
        }

        let label = search[0];
        if !slot.bitmap.contains(label) {
            return None;
        }
        let idx = slot.bitmap.rank(label);
        let advance = {
            let child = &slot.children[idx];
            if child.prefix.starts_with(search) {
                search.len()
            } else if search.starts_with(&child.prefix) {
                child.prefix.len()
            } else {
                return None;
            }
        };

        let node = state.write_node(slot);
        let removed =
            Self::delete_prefix_at(state, &mut node.children[idx], false, &search[advance..])?;

        let child_empty = {
            let child = &node.children[idx];
            child.leaf.is_none() && child.children.is_empty()
        };
        if child_empty {
            node.del_edge(label);
            if !is_root && node.children.len() == 1 && !node.is_leaf() {
                Self::merge_child(state, node);
            }
        }
        Some(removed)
    }

    /// Track every signal in a subtree about to be detached and count its
    /// leaves.
    fn track_subtree(state: &mut WriteState, node: &Node<V>) -> usize {
        let mut leaves = usize::from(node.leaf.is_some());
        state.track_node(node);
        for child in &node.children {
            leaves += Self::track_subtree(state, child.as_ref());
        }
        leaves
    }

    /// Insert a batch of pairs. Semantically equivalent to calling
    /// [`insert`](Self::insert) for each pair in order, with later
    /// duplicates winning; on an empty working tree the batch is sorted
    /// and built directly without path-copy.
    pub fn bulk_insert<K, I>(&mut self, pairs: I)
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = Self::sort_dedup(pairs);
        if self.root.leaf.is_none() && self.root.children.is_empty() {
            self.build_initial(entries);
        } else {
            for (key, value) in entries {
                self.insert(&key, value);
            }
        }
    }

    /// Build the working tree from a batch of pairs. A specialisation of
    /// [`bulk_insert`](Self::bulk_insert) for trees built from empty: the
    /// nodes are constructed bottom-up from the sorted batch, one node
    /// per longest-common-prefix run, with no path-copy at all.
    pub fn initialize_with_data<K, I>(&mut self, pairs: I)
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.bulk_insert(pairs);
    }

    /// Sort by key (stable) and keep the last write for each key.
    fn sort_dedup<K, I>(pairs: I) -> Vec<(Box<[u8]>, V)>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries: Vec<(Box<[u8]>, V)> = pairs
            .into_iter()
            .map(|(key, value)| (Box::from(key.as_ref()), value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut deduped: Vec<(Box<[u8]>, V)> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.last_mut() {
                Some(last) if last.0 == entry.0 => *last = entry,
                _ => deduped.push(entry),
            }
        }
        deduped
    }

    /// Replace the empty working root with a tree built from sorted,
    /// de-duplicated entries.
    fn build_initial(&mut self, entries: Vec<(Box<[u8]>, V)>) {
        debug_assert!(self.root.leaf.is_none() && self.root.children.is_empty());
        if entries.is_empty() {
            return;
        }
        let count = entries.len();
        let root = Self::build_node(&mut self.state, Prefix::new(), entries, 0);
        self.root = root;
        self.size += count;
    }

    /// Build the node covering `entries`, whose keys all share the path
    /// consumed so far (`depth` bytes, ending with `prefix`). Entries are
    /// sorted and distinct.
    fn build_node(
        state: &mut WriteState,
        prefix: Prefix,
        entries: Vec<(Box<[u8]>, V)>,
        depth: usize,
    ) -> Arc<Node<V>> {
        let mut node = Node {
            signal: WatchSignal::new(),
            leaf: None,
            prefix,
            bitmap: EdgeBitmap::default(),
            children: Vec::new(),
        };

        let mut iter = entries.into_iter().peekable();

        // A key that ends exactly here becomes this node's leaf.
        if let Some((key, _)) = iter.peek() {
            if key.len() == depth {
                let (key, value) = iter.next().expect("peeked entry");
                node.leaf = Some(Arc::new(Leaf {
                    signal: WatchSignal::new(),
                    value,
                    key,
                }));
            }
        }

        // Group the remaining entries by their next byte; each group
        // becomes one child whose prefix is the group's common run.
        let mut group: Vec<(Box<[u8]>, V)> = Vec::new();
        let flush =
            |state: &mut WriteState, node: &mut Node<V>, group: &mut Vec<(Box<[u8]>, V)>| {
                if group.is_empty() {
                    return;
                }
                let batch = std::mem::take(group);
                let common = {
                    let first = &batch[0].0;
                    let last = &batch[batch.len() - 1].0;
                    longest_common_prefix(&first[depth..], &last[depth..])
                };
                let child_prefix = Prefix::from_slice(&batch[0].0[depth..depth + common]);
                let child = Self::build_node(state, child_prefix, batch, depth + common);
                node.add_edge(child);
            };

        for entry in iter {
            if let Some(last) = group.last() {
                if last.0[depth] != entry.0[depth] {
                    flush(state, &mut node, &mut group);
                }
            }
            group.push(entry);
        }
        flush(state, &mut node, &mut group);

        let node = Arc::new(node);
        state.adopt(&node);
        node
    }
}
