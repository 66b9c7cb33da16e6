//! Database query executors

mod postgres;

pub use postgres::{PostgresExecutorConfig, PostgresQueryExecutor, QueryError};
