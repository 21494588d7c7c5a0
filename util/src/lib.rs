mod id;
pub use id::NodeIdx;

mod id_vec;
pub use id_vec::IdVec;

mod timer;
pub use timer::Timer;

/// Cycle search over index graphs
pub mod cycle;

pub type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub type HashMap<K, V> = std::collections::HashMap<K, V, Hasher>;
pub type HashSet<T> = std::collections::HashSet<T, Hasher>;
