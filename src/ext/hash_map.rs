use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{BuildHasher, Hash},
};

/// Type alias for a hash map using a hasher with a constant state seed.
pub type ConstHashMap<K, V> = HashMap<K, V, ConstState>;

/// A constant state seed for a hashmap, whose [`Self::build_hasher()`] method always returns
/// [`DefaultHasher::new()`]
#[derive(Default, Debug, Clone, Copy)]
pub struct ConstState;
impl BuildHasher for ConstState {
    type Hasher = DefaultHasher;

    fn build_hasher(&self) -> Self::Hasher {
        DefaultHasher::new()
    }
}

/// A map from keys to buckets of values, used wherever several items share one hash summary.
pub trait Buckets<K, V> {
    /// Append `value` to the bucket for `key`, creating the bucket if necessary.
    fn push_to_bucket(&mut self, key: K, value: V);

    /// Iterate over the values in the bucket for `key`, in insertion order.
    fn bucket(&self, key: &K) -> std::slice::Iter<'_, V>;
}
impl<K: Eq + Hash, V, S: BuildHasher> Buckets<K, V> for HashMap<K, Vec<V>, S> {
    fn push_to_bucket(&mut self, key: K, value: V) {
        self.entry(key).or_default().push(value);
    }

    fn bucket(&self, key: &K) -> std::slice::Iter<'_, V> {
        self.get(key).map(|b| b.as_slice()).unwrap_or(&[]).iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    pub fn const_state_guarantees_predictable_iteration_order() {
        let mut hashmap_a = HashMap::with_hasher(ConstState);
        let mut hashmap_b = HashMap::with_hasher(ConstState);

        for x in 0..10 {
            hashmap_a.insert(x, x * 2);
            hashmap_b.insert(x, x * 2);
        }

        for ((key_a, _), (key_b, _)) in hashmap_a.into_iter().zip(hashmap_b.into_iter()) {
            assert_eq!(key_a, key_b);
        }
    }

    #[test]
    pub fn buckets_keep_insertion_order() {
        let mut buckets: ConstHashMap<u64, Vec<&str>> = ConstHashMap::default();
        buckets.push_to_bucket(7, "a");
        buckets.push_to_bucket(3, "b");
        buckets.push_to_bucket(7, "c");

        assert_eq!(vec![&"a", &"c"], buckets.bucket(&7).collect::<Vec<_>>());
        assert_eq!(0, buckets.bucket(&42).count());
    }
}
