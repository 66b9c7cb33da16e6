//! Cache domain - options, key derivation and the store/serializer contracts

mod key;
mod options;
mod serializer;
mod store;

pub use key::{derive_key, fnv1a_64, to_base36};
pub use options::{CacheOptions, QueryContext};
pub use serializer::{JsonSerializer, Serializer};
pub use store::Store;

#[cfg(test)]
pub use store::MockStore;
