//! Collection types shared across the runtime.

pub use hashbrown::{HashMap, HashSet};

/// Insertion-ordered map keyed with `ahash`, used wherever iteration order
/// is observable (dirty sets, prop tables).
pub type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;
