//! Domain layer - Cache contracts and query types

pub mod cache;
pub mod error;
pub mod query;

pub use cache::{
    derive_key, CacheOptions, JsonSerializer, QueryContext, Serializer, Store,
};
pub use error::CacheError;
pub use query::{Query, QueryExecutor, QueryParam};
