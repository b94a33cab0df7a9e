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

//! Snapshot semantics tests
//!
//! Read consistency of prior versions, independence of concurrent
//! transactions, and concurrent readers over shared snapshots.

use std::sync::Arc;
use std::thread;

use iradix::RadixTree;

#[test]
fn test_old_snapshots_stay_consistent_across_generations() {
    let mut versions: Vec<RadixTree<i64>> = vec![RadixTree::new()];

    for generation in 0..50i64 {
        let mut txn = versions.last().unwrap().txn();
        txn.insert(format!("gen{:03}", generation).as_bytes(), generation);
        versions.push(txn.commit());
    }

    // Every version sees exactly the keys that existed when it was
    // committed.
    for (i, version) in versions.iter().enumerate() {
        assert_eq!(version.len(), i);
        for generation in 0..50 {
            let key = format!("gen{:03}", generation);
            let expected = (generation as usize) < i;
            assert_eq!(
                version.get(key.as_bytes()).is_some(),
                expected,
                "version {} key {}",
                i,
                key
            );
        }
    }
}

#[test]
fn test_concurrent_transactions_from_same_snapshot() {
    let base: RadixTree<i64> = RadixTree::new_with_data([(b"shared", 0)]);

    let mut txn_a = base.txn();
    let mut txn_b = base.txn();

    txn_a.insert(b"a-only", 1);
    txn_b.insert(b"b-only", 2);
    txn_b.delete(b"shared");

    let tree_a = txn_a.commit();
    let tree_b = txn_b.commit();

    // Commits do not coordinate; each derives independently from base.
    assert_eq!(tree_a.len(), 2);
    assert_eq!(tree_a.get(b"a-only"), Some(&1));
    assert_eq!(tree_a.get(b"b-only"), None);
    assert_eq!(tree_a.get(b"shared"), Some(&0));

    assert_eq!(tree_b.len(), 1);
    assert_eq!(tree_b.get(b"b-only"), Some(&2));
    assert_eq!(tree_b.get(b"shared"), None);

    assert_eq!(base.len(), 1);
    assert_eq!(base.get(b"shared"), Some(&0));
}

#[test]
fn test_concurrent_readers_while_writer_commits() {
    let tree: RadixTree<i64> =
        RadixTree::new_with_data((0..1000i64).map(|i| (format!("key{:04}", i), i)));
    let snapshot = Arc::new(tree.clone());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let snap = Arc::clone(&snapshot);
            thread::spawn(move || {
                for _ in 0..50 {
                    assert_eq!(snap.len(), 1000);
                    assert_eq!(snap.get(b"key0000"), Some(&0));
                    assert_eq!(snap.iter().count(), 1000);
                }
            })
        })
        .collect();

    // Writer churns new versions while the readers run.
    let mut current = tree;
    for i in 0..100i64 {
        let mut txn = current.txn();
        txn.insert(format!("extra{:03}", i).as_bytes(), i);
        txn.delete(format!("key{:04}", i).as_bytes());
        current = txn.commit();
    }
    assert_eq!(current.len(), 1000);

    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_abandoned_transaction_leaves_no_trace() {
    let tree: RadixTree<i64> = RadixTree::new_with_data([(b"a", 1)]);

    {
        let mut txn = tree.txn();
        txn.insert(b"b", 2);
        txn.delete(b"a");
        // Dropped without commit.
    }

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get(b"a"), Some(&1));
    assert_eq!(tree.get(b"b"), None);
}
