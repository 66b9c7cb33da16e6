//! Query executor trait definition

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::cache::QueryContext;

use super::Query;

/// Runs a query against the backing database and decodes its rows
///
/// The error type is carried through the query cache untouched, so callers
/// see exactly what the database layer reported.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    type Error: Send;

    /// Executes the query and decodes the result into `T`
    async fn fetch<T>(&self, ctx: &QueryContext, query: &Query) -> Result<T, Self::Error>
    where
        T: DeserializeOwned + Send;
}
