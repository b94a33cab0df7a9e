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

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use iradix::RadixTree;

/// Operations applied to both the tree and a BTreeMap model.
#[derive(Debug, Arbitrary)]
enum Op {
    Insert { key: Vec<u8>, value: u32 },
    Delete { key: Vec<u8> },
    DeletePrefix { prefix: Vec<u8> },
    BulkInsert { pairs: Vec<(Vec<u8>, u32)> },
    Commit,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
    let mut tree: RadixTree<u32> = RadixTree::new();
    let mut txn = tree.txn();

    for op in ops {
        match op {
            Op::Insert { key, value } => {
                let old_tree = txn.insert(&key, value);
                let old_model = model.insert(key, value);
                assert_eq!(old_tree, old_model);
            }
            Op::Delete { key } => {
                let old_tree = txn.delete(&key);
                let old_model = model.remove(&key);
                assert_eq!(old_tree, old_model);
            }
            Op::DeletePrefix { prefix } => {
                let deleted = txn.delete_prefix(&prefix);
                let doomed: Vec<Vec<u8>> = model
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .cloned()
                    .collect();
                for key in &doomed {
                    model.remove(key);
                }
                assert_eq!(deleted, !doomed.is_empty());
            }
            Op::BulkInsert { pairs } => {
                txn.bulk_insert(pairs.iter().map(|(k, v)| (k.clone(), *v)));
                for (key, value) in pairs {
                    model.insert(key, value);
                }
            }
            Op::Commit => {
                tree = txn.commit();
                assert_eq!(tree.len(), model.len());
                txn = tree.txn();
            }
        }
        assert_eq!(txn.len(), model.len());
    }

    let committed = txn.commit();
    assert_eq!(committed.len(), model.len());

    // Full ordered agreement with the model.
    let tree_entries: Vec<(Vec<u8>, u32)> =
        committed.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
    let model_entries: Vec<(Vec<u8>, u32)> =
        model.iter().map(|(k, v)| (k.clone(), *v)).collect();
    assert_eq!(tree_entries, model_entries);

    // Reverse iteration agrees too.
    let tree_rev: Vec<Vec<u8>> = committed.reverse_iter().map(|(k, _)| k.to_vec()).collect();
    let model_rev: Vec<Vec<u8>> = model.keys().rev().cloned().collect();
    assert_eq!(tree_rev, model_rev);
});
