use crate::errors::{Error, Result};
use chrono::NaiveDateTime;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Connection, FromRow, Row};
use tracing::{debug, error, warn};

/// A value bound to a positional `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Written {
    pub rows_affected: u64,
    pub generated_id: Option<i64>,
}

/// Connection-per-call access to the database.
///
/// Every method opens its own connection, runs exactly one statement and
/// closes the connection before returning, whether or not the statement
/// succeeded. Nothing is shared between calls except the connect options.
#[derive(Debug, Clone)]
pub struct Database {
    options: PgConnectOptions,
}

impl Database {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }

    pub async fn fetch_all<T>(&self, sql: &str, params: &[Param]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send,
    {
        let mut conn = self.connect().await?;
        let rows = bind_all(sql, params).fetch_all(&mut conn).await;
        disconnect(conn).await;

        rows.map_err(Error::from_query)?
            .iter()
            .map(|row| T::from_row(row).map_err(Error::Query))
            .collect()
    }

    pub async fn fetch_one<T>(&self, sql: &str, params: &[Param]) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send,
    {
        let mut conn = self.connect().await?;
        let row = bind_all(sql, params).fetch_optional(&mut conn).await;
        disconnect(conn).await;

        row.map_err(Error::from_query)?
            .map(|row| T::from_row(&row).map_err(Error::Query))
            .transpose()
    }

    /// Runs a write statement in its own transaction.
    ///
    /// The statement must end in `RETURNING <key>::int8`: each returned key
    /// counts as one affected row and the first one is reported as the
    /// generated id. Commits on success; on failure the transaction is rolled
    /// back and the original error is returned.
    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<Written> {
        let mut conn = self.connect().await?;
        let outcome = execute_in_transaction(&mut conn, sql, params).await;
        disconnect(conn).await;
        outcome
    }

    async fn connect(&self) -> Result<PgConnection> {
        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| {
                error!("Error connecting to the database: {}", e);
                Error::Connection(e)
            })?;

        if let Err(e) = conn.ping().await {
            warn!("Database ping failed, reconnecting: {}", e);
            conn = PgConnection::connect_with(&self.options)
                .await
                .map_err(|e| {
                    error!("Error reconnecting to the database: {}", e);
                    Error::Connection(e)
                })?;
        }

        debug!("DB connected");
        Ok(conn)
    }
}

async fn execute_in_transaction(
    conn: &mut PgConnection,
    sql: &str,
    params: &[Param],
) -> Result<Written> {
    let mut tx = conn.begin().await.map_err(Error::from_query)?;

    match bind_all(sql, params).fetch_all(&mut *tx).await {
        Ok(keys) => {
            tx.commit().await.map_err(Error::from_query)?;
            debug!("Committed statement affecting {} rows", keys.len());
            Ok(Written {
                rows_affected: keys.len() as u64,
                generated_id: keys.first().and_then(|row| row.try_get::<i64, _>(0).ok()),
            })
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            } else {
                debug!("Rolled back statement");
            }
            Err(Error::from_query(e))
        }
    }
}

async fn disconnect(conn: PgConnection) {
    match conn.close().await {
        Ok(()) => debug!("DB disconnected"),
        Err(e) => warn!("Error closing database connection: {}", e),
    }
}

fn bind_all<'q>(sql: &'q str, params: &'q [Param]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            Param::Int(value) => query.bind(*value),
            Param::Float(value) => query.bind(*value),
            Param::Text(value) => query.bind(value.as_str()),
            Param::Timestamp(value) => query.bind(*value),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_database() -> Database {
        // Port 1 is reserved; connecting is refused immediately.
        Database::new(
            PgConnectOptions::new()
                .host("127.0.0.1")
                .port(1)
                .username("nobody")
                .database("nowhere"),
        )
    }

    #[test]
    fn test_fetch_one_reports_connection_error() {
        tokio_test::block_on(async {
            let db = unreachable_database();
            let result = db.fetch_one::<(i32,)>("SELECT 1", &[]).await;
            assert!(matches!(result, Err(Error::Connection(_))));
        });
    }

    #[test]
    fn test_execute_reports_connection_error() {
        tokio_test::block_on(async {
            let db = unreachable_database();
            let result = db
                .execute(
                    "DELETE FROM temperature_log WHERE log_id = $1 RETURNING log_id::int8",
                    &[Param::Int(1)],
                )
                .await;
            assert!(matches!(result, Err(Error::Connection(_))));
        });
    }
}
