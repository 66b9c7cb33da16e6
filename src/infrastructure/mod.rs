//! Infrastructure layer - Stores, executors and the caching service

pub mod cache;
pub mod executor;
pub mod logging;
pub mod observability;
pub mod services;
