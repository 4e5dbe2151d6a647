//! Property-based tests for the translation layer

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use syncbridge::{Raw, Synchronizer, Wrappable};

struct Node {
    id: u64,
}

impl Wrappable for Node {}

proptest! {
    #[test]
    fn scalars_roundtrip_unchanged(x in any::<i64>(), s in ".*", flag in any::<bool>()) {
        let sync = Synchronizer::named("prop-scalars");

        let value = (x, s.clone(), flag);
        let inner = sync.translate_in(value.clone());
        let outer = sync.translate_out(inner);

        prop_assert_eq!(outer, (x, s, flag));
    }

    #[test]
    fn raw_values_pass_through(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let sync = Synchronizer::named("prop-raw");

        let out = sync.translate_out(sync.translate_in(Raw(bytes.clone())));

        prop_assert_eq!(out.into_inner(), bytes);
    }

    #[test]
    fn instance_lists_roundtrip_to_identical_arcs(ids in proptest::collection::vec(any::<u64>(), 0..32)) {
        let sync = Synchronizer::named("prop-instances");
        let nodes: Vec<Arc<Node>> = ids.iter().map(|id| Arc::new(Node { id: *id })).collect();

        let handles = sync.translate_out(nodes.clone());
        let back = sync.translate_in(handles);

        prop_assert_eq!(back.len(), nodes.len());
        for (round, original) in back.iter().zip(nodes.iter()) {
            prop_assert!(Arc::ptr_eq(round, original));
        }
    }

    #[test]
    fn wrapping_twice_yields_elementwise_identical_wrappers(ids in proptest::collection::vec(any::<u64>(), 1..16)) {
        let sync = Synchronizer::named("prop-identity");
        let nodes: Vec<Arc<Node>> = ids.iter().map(|id| Arc::new(Node { id: *id })).collect();

        let first = sync.translate_out(nodes.clone());
        let second = sync.translate_out(nodes);

        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert!(a.ptr_eq(b));
        }
    }

    #[test]
    fn map_keys_survive_translation(entries in proptest::collection::hash_map(".{1,8}", any::<u64>(), 0..16)) {
        let sync = Synchronizer::named("prop-maps");
        let map: HashMap<String, Arc<Node>> = entries
            .iter()
            .map(|(k, id)| (k.clone(), Arc::new(Node { id: *id })))
            .collect();

        let out = sync.translate_out(map);

        prop_assert_eq!(out.len(), entries.len());
        for (key, id) in &entries {
            prop_assert_eq!(out[key].get(|n| n.id), *id);
        }
    }
}
