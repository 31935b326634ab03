//! Operation cache (computed table) for memoizing recursive results.
//!
//! Keys are small tuples of dense ids hashed with [`IdHash`]; the backing
//! table is a `hashbrown` map addressed through the `raw_entry` API so a
//! lookup never clones the key. Entries are conceptually weak: the cache can
//! be cleared at any point between top-level operations without affecting
//! correctness, because every cached value is an interned id that stays valid
//! for the manager's lifetime.

use std::cell::Cell;
use std::hash::{BuildHasherDefault, Hash, Hasher};

use hashbrown::HashMap;

use crate::utils::IdHash;

/// A hasher that passes through the value produced by [`IdHash::id_hash`].
#[derive(Default)]
pub struct PairingHasher {
    hash: u64,
}

impl Hasher for PairingHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    #[inline]
    fn write(&mut self, _bytes: &[u8]) {
        unreachable!("PairingHasher only supports write_u64")
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Wrapper giving `std::hash::Hash` to any [`IdHash`] key.
#[derive(Clone, PartialEq, Eq)]
#[repr(transparent)]
struct CacheKey<K>(K);

impl<K: IdHash> Hash for CacheKey<K> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.id_hash());
    }
}

/// Memo table for one operation family.
pub struct OpCache<K, V> {
    map: HashMap<CacheKey<K>, V, BuildHasherDefault<PairingHasher>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl<K, V> Default for OpCache<K, V> {
    fn default() -> Self {
        Self::new(14)
    }
}

impl<K, V> OpCache<K, V> {
    /// Creates a cache pre-sized for `2^bits` entries.
    pub fn new(bits: usize) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(1 << bits, BuildHasherDefault::default()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<K, V> OpCache<K, V>
where
    K: IdHash + Eq,
    V: Copy,
{
    #[inline]
    pub fn get(&self, key: &K) -> Option<V> {
        let hash = key.id_hash();
        match self.map.raw_entry().from_hash(hash, |k| k.0 == *key) {
            Some((_, v)) => {
                self.hits.set(self.hits.get() + 1);
                Some(*v)
            }
            None => {
                self.misses.set(self.misses.get() + 1);
                None
            }
        }
    }

    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        let hash = key.id_hash();
        self.map
            .raw_entry_mut()
            .from_hash(hash, |k| k.0 == key)
            .insert(CacheKey(key), value);
    }
}
