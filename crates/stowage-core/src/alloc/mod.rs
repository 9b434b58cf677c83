//! Collection types for stowage.
//!
//! This module provides:
//! - Re-exports of hash collections using AHash
//! - SparseSet data structure for generational indices

pub mod sparse_set;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert("bundle_a1b2", 3u32);
        assert_eq!(map.get("bundle_a1b2"), Some(&3));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert("textures/hero.png");
        assert!(set.contains("textures/hero.png"));
    }
}
