use memctl_dedup::{find_duplicates, jaccard, merge_duplicates, shingles};
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #[test]
    fn jaccard_identity(text in "[a-z]{1,8}( [a-z]{1,8}){0,12}") {
        let set = shingles(&text, 3);
        prop_assert_eq!(jaccard(&set, &set), 1.0);
        prop_assert_eq!(jaccard(&set, &HashSet::new()), 0.0);
    }

    #[test]
    fn jaccard_is_symmetric_and_bounded(a in "[a-d ]{0,40}", b in "[a-d ]{0,40}") {
        let (sa, sb) = (shingles(&a, 3), shingles(&b, 3));
        let forward = jaccard(&sa, &sb);
        prop_assert_eq!(forward, jaccard(&sb, &sa));
        prop_assert!((0.0..=1.0).contains(&forward));
    }

    #[test]
    fn groups_are_disjoint(entries in prop::collection::vec("[a-c]{1,3}( [a-c]{1,3}){0,5}", 0..25)) {
        let groups = find_duplicates(&entries, 0.6, 3);
        let mut seen = HashSet::new();
        for group in &groups {
            prop_assert!(group.indices.len() >= 2);
            for &idx in &group.indices {
                prop_assert!(seen.insert(idx));
            }
        }
        let merged = merge_duplicates(&entries, &groups);
        let removed: usize = groups.iter().map(|g| g.indices.len() - 1).sum();
        prop_assert_eq!(merged.len(), entries.len() - removed);
    }
}
