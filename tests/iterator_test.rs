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

//! Forward iterator tests
//!
//! Ordering, prefix seeks, and lower-bound seeks checked against a
//! `BTreeMap` model over a deterministic key set.

use std::collections::BTreeMap;

use iradix::RadixTree;

/// A key set with shared prefixes, chains, the empty key, and embedded
/// zero bytes.
fn sample_pairs() -> Vec<(Vec<u8>, i64)> {
    let mut keys: Vec<Vec<u8>> = vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"aa".to_vec(),
        b"aaa".to_vec(),
        b"ab".to_vec(),
        b"abc".to_vec(),
        b"b\x00".to_vec(),
        b"b\x00\x01".to_vec(),
        b"zzz".to_vec(),
    ];
    for i in 0..400i64 {
        keys.push(format!("{:03}", (i * 7919 + 13) % 1000).into_bytes());
    }
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .enumerate()
        .map(|(i, k)| (k, i as i64))
        .collect()
}

fn build() -> (RadixTree<i64>, BTreeMap<Vec<u8>, i64>) {
    let pairs = sample_pairs();
    let tree = RadixTree::new_with_data(pairs.iter().map(|(k, v)| (k.clone(), *v)));
    let model: BTreeMap<Vec<u8>, i64> = pairs.into_iter().collect();
    (tree, model)
}

#[test]
fn test_full_iteration_is_sorted() {
    let (tree, model) = build();
    let got: Vec<(Vec<u8>, i64)> = tree.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
    let want: Vec<(Vec<u8>, i64)> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
    assert_eq!(got, want);
    assert_eq!(tree.len(), model.len());
}

#[test]
fn test_seek_lower_bound_matches_model() {
    let (tree, model) = build();

    let mut probes: Vec<Vec<u8>> = model.keys().cloned().collect();
    probes.extend([
        b"".to_vec(),
        b"0".to_vec(),
        b"0000".to_vec(),
        b"5".to_vec(),
        b"517a".to_vec(),
        b"aab".to_vec(),
        b"ab\x00".to_vec(),
        b"b".to_vec(),
        b"b\x00\x00".to_vec(),
        b"zzzz".to_vec(),
        b"\xff".to_vec(),
    ]);

    for probe in probes {
        let mut iter = tree.iter();
        iter.seek_lower_bound(&probe);
        let got: Vec<Vec<u8>> = iter.map(|(k, _)| k.to_vec()).collect();
        let want: Vec<Vec<u8>> = model.range(probe.clone()..).map(|(k, _)| k.clone()).collect();
        assert_eq!(got, want, "lower bound of {:?}", probe);
    }
}

#[test]
fn test_seek_lower_bound_on_empty_tree() {
    let tree: RadixTree<i64> = RadixTree::new();
    let mut iter = tree.iter();
    iter.seek_lower_bound(b"anything");
    assert_eq!(iter.next(), None);

    let mut iter = tree.iter();
    iter.seek_lower_bound(b"");
    assert_eq!(iter.next(), None);
}

#[test]
fn test_seek_prefix() {
    let (tree, model) = build();

    for prefix in [&b""[..], b"a", b"ab", b"b\x00", b"1", b"nope", b"zzz"] {
        let mut iter = tree.iter();
        iter.seek_prefix(prefix);
        let got: Vec<Vec<u8>> = iter.map(|(k, _)| k.to_vec()).collect();
        let want: Vec<Vec<u8>> = model
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        assert_eq!(got, want, "prefix {:?}", prefix);
    }
}

#[test]
fn test_seek_prefix_then_next_only_yields_prefixed_keys() {
    let tree: RadixTree<i64> =
        RadixTree::new_with_data([(&b"foo"[..], 1), (b"foobar", 2), (b"other", 3)]);

    let mut iter = tree.iter();
    iter.seek_prefix(b"foo");
    let got: Vec<Vec<u8>> = iter.map(|(k, _)| k.to_vec()).collect();
    assert_eq!(got, vec![b"foo".to_vec(), b"foobar".to_vec()]);
}

#[test]
fn test_iterator_on_subtree_root() {
    let tree: RadixTree<i64> = RadixTree::new_with_data([
        (&b"api/a"[..], 1),
        (b"api/b", 2),
        (b"web/a", 3),
    ]);

    // Iterating a node handle scopes to its subtree.
    let mut iter = tree.root().iter();
    iter.seek_prefix(b"api/");
    assert_eq!(iter.count(), 2);
}

#[test]
fn test_exhausted_iterator_stays_exhausted() {
    let tree: RadixTree<i64> = RadixTree::new_with_data([(b"a", 1)]);
    let mut iter = tree.iter();
    assert!(iter.next().is_some());
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}
