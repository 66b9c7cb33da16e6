//! Query domain - statements, fingerprints and the executor contract

mod executor;
mod fingerprint;
mod statement;

pub use executor::QueryExecutor;
pub use statement::{Query, QueryParam};
