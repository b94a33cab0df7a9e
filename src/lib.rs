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

//! # iradix - Immutable radix tree
//!
//! An immutable, persistent radix tree indexed by byte-string keys. All
//! mutation goes through a copy-on-write [`Transaction`] that produces a
//! new [`RadixTree`] handle while structurally sharing every unmodified
//! subtree with the prior version, so committed trees are cheap snapshots
//! that any number of threads can read without synchronisation.
//!
//! ## Key Features
//!
//! - **Copy-on-write transactions** - path-copy inserts, deletes, and
//!   prefix deletes; clones are de-duplicated within a transaction
//! - **Structural sharing** - N inserts allocate O(N · key length) nodes
//!   in total; old snapshots stay read-consistent forever
//! - **Bitmap-indexed children** - a 256-bit presence map with popcount
//!   rank replaces dense child tables on sparse nodes
//! - **Ordered iteration** - forward and reverse iterators, lower-bound
//!   and reverse-lower-bound seeks, prefix and path walks
//! - **Watch signals** - one-shot broadcast signals on every node and
//!   leaf, fired on commit for each position a tracking transaction
//!   replaced
//! - **Bulk loading** - sorted longest-common-prefix build for trees
//!   constructed from a batch
//!
//! ## Quick Start
//!
//! ```rust
//! use iradix::RadixTree;
//!
//! let tree: RadixTree<i32> = RadixTree::new();
//!
//! // All mutation goes through a transaction.
//! let mut txn = tree.txn();
//! txn.insert(b"foo", 1);
//! txn.insert(b"foobar", 2);
//! txn.insert(b"foozip", 3);
//! let tree = txn.commit();
//!
//! assert_eq!(tree.len(), 3);
//! assert_eq!(tree.get(b"foobar"), Some(&2));
//!
//! // Longest-prefix match.
//! let (key, value) = tree.longest_prefix(b"fooba").unwrap();
//! assert_eq!((key, *value), (&b"foo"[..], 1));
//!
//! // Ordered iteration.
//! let keys: Vec<&[u8]> = tree.iter().map(|(k, _)| k).collect();
//! assert_eq!(keys, vec![&b"foo"[..], b"foobar", b"foozip"]);
//!
//! // Prior snapshots are untouched by later commits.
//! let mut txn = tree.txn();
//! txn.delete(b"foo");
//! let updated = txn.commit();
//! assert_eq!(tree.len(), 3);
//! assert_eq!(updated.len(), 2);
//! ```
//!
//! ## Watching for changes
//!
//! ```rust
//! use iradix::RadixTree;
//!
//! let tree: RadixTree<i32> = RadixTree::new_with_data([(b"a", 1), (b"b", 2)]);
//!
//! let (signal, _) = tree.get_watch(b"b");
//!
//! let mut txn = tree.txn();
//! txn.track_mutate(true);
//! txn.insert(b"ba", 3);
//! txn.commit();
//!
//! assert!(signal.has_fired());
//! ```
//!
//! ## Modules
//!
//! - [`tree`] - the immutable tree handle ([`RadixTree`])
//! - [`txn`] - the copy-on-write transaction ([`Transaction`])
//! - [`node`] - the node representation and read surface ([`Node`])
//! - [`iter`] / [`reverse_iter`] - the ordered iterators
//! - [`watch`] - one-shot broadcast signals ([`WatchSignal`])

mod bitmap;
pub mod iter;
pub mod node;
mod raw_iter;
pub mod reverse_iter;
pub mod tree;
pub mod txn;
pub mod watch;

// Re-export main types for convenience
pub use iter::Iter;
pub use node::Node;
pub use reverse_iter::ReverseIter;
pub use tree::RadixTree;
pub use txn::Transaction;
pub use watch::WatchSignal;
