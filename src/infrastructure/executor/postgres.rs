//! PostgreSQL query executor with connection pooling

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::QueryScalar;
use sqlx::Postgres;
use thiserror::Error;
use tracing::debug;

use crate::domain::cache::QueryContext;
use crate::domain::query::{Query, QueryExecutor, QueryParam};

/// Errors reported by the PostgreSQL executor
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to decode rows: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Query was cancelled")]
    Cancelled,
}

/// PostgreSQL executor configuration
#[derive(Debug, Clone)]
pub struct PostgresExecutorConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresExecutorConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/postgres".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresExecutorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Executes queries against PostgreSQL and decodes rows through JSON
///
/// The statement is wrapped so the server aggregates every row into a single
/// JSON array of objects keyed by column name. Callers decode it into any
/// `DeserializeOwned` type, typically a `Vec` of row structs.
#[derive(Clone)]
pub struct PostgresQueryExecutor {
    pool: PgPool,
}

impl Debug for PostgresQueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresQueryExecutor")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PostgresQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an executor backed by a fresh connection pool
    pub async fn connect(config: &PostgresExecutorConfig) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| {
                QueryError::Connection(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PostgresQueryExecutor {
    type Error = QueryError;

    async fn fetch<T>(&self, ctx: &QueryContext, query: &Query) -> Result<T, QueryError>
    where
        T: DeserializeOwned + Send,
    {
        let (sql, bound) = prepare_statement(query.sql(), query.params());
        let sql = aggregate_as_json(&sql);

        let mut statement = sqlx::query_scalar::<_, serde_json::Value>(&sql);
        for param in bound {
            statement = bind_param(statement, param);
        }

        let rows = tokio::select! {
            _ = ctx.cancellation().cancelled() => return Err(QueryError::Cancelled),
            rows = statement.fetch_one(&self.pool) => rows?,
        };

        debug!(
            rows = rows.as_array().map(|a| a.len()).unwrap_or_default(),
            "Executed query"
        );

        Ok(serde_json::from_value(rows)?)
    }
}

type JsonScalar<'q> = QueryScalar<'q, Postgres, serde_json::Value, PgArguments>;

fn bind_param<'q>(statement: JsonScalar<'q>, param: &'q QueryParam) -> JsonScalar<'q> {
    match param {
        // Inlined by `prepare_statement`, never bound
        QueryParam::Null => statement,
        QueryParam::Bool(value) => statement.bind(*value),
        QueryParam::Int(value) => statement.bind(*value),
        QueryParam::Float(value) => statement.bind(*value),
        QueryParam::Text(value) => statement.bind(value.as_str()),
        QueryParam::Timestamp(value) => statement.bind(*value),
        QueryParam::Bytes(value) => statement.bind(value.as_slice()),
    }
}

fn aggregate_as_json(sql: &str) -> String {
    format!(
        "SELECT COALESCE(json_agg(q), '[]'::json) FROM ({}) q",
        sql.trim().trim_end_matches(';')
    )
}

/// Rewrites placeholders into PostgreSQL's `$N` form
///
/// `?` and `$N` outside quotes are both accepted. NULL parameters are inlined
/// as a literal `NULL`: a bound NULL carries a concrete type OID and would
/// fail comparisons against columns of any other type. The returned
/// parameters are the ones left to bind, in `$N` order.
fn prepare_statement<'q>(sql: &str, params: &'q [QueryParam]) -> (String, Vec<&'q QueryParam>) {
    let mut placeholders = Placeholders::new(params);
    let mut prepared = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut position = 0;

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            prepared.push(c);
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                prepared.push(c);
            }
            '?' => {
                if !placeholders.emit(position, &mut prepared) {
                    prepared.push('?');
                }
                position += 1;
            }
            '$' => {
                let mut digits = String::new();

                while let Some(d) = chars.peek().copied() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }

                let emitted = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .is_some_and(|index| placeholders.emit(index, &mut prepared));

                if !emitted {
                    prepared.push('$');
                    prepared.push_str(&digits);
                }
            }
            _ => prepared.push(c),
        }
    }

    (prepared, placeholders.bound)
}

/// Tracks which parameters are bound and the `$N` each one was given
struct Placeholders<'q> {
    params: &'q [QueryParam],
    bound: Vec<&'q QueryParam>,
    numbers: HashMap<usize, usize>,
}

impl<'q> Placeholders<'q> {
    fn new(params: &'q [QueryParam]) -> Self {
        Self {
            params,
            bound: Vec::with_capacity(params.len()),
            numbers: HashMap::new(),
        }
    }

    /// Writes the placeholder for a parameter; false when it does not exist
    fn emit(&mut self, index: usize, out: &mut String) -> bool {
        let Some(param) = self.params.get(index) else {
            return false;
        };

        if matches!(param, QueryParam::Null) {
            out.push_str("NULL");
            return true;
        }

        let number = *self.numbers.entry(index).or_insert_with(|| {
            self.bound.push(param);
            self.bound.len()
        });

        out.push('$');
        out.push_str(&number.to_string());
        true
    }
}
