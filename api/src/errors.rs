use sqlx::error::{DatabaseError, ErrorKind};
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Database query error: {0}")]
    Query(#[source] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classifies an error raised while running a statement.
    pub fn from_query(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if is_integrity_violation(db_err.kind()) => {
                Error::Integrity(integrity_message(&**db_err))
            }
            _ if is_connection_error(&err) => Error::Connection(err),
            _ => Error::Query(err),
        }
    }
}

fn is_integrity_violation(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation
    )
}

/// Server message, followed by the detail line when Postgres provides one
/// (e.g. `Key (sensor_id)=(7) already exists.`).
fn integrity_message(db_err: &dyn DatabaseError) -> String {
    let detail = db_err
        .try_downcast_ref::<PgDatabaseError>()
        .and_then(|pg| pg.detail());

    match detail {
        Some(detail) => format!("{} ({})", db_err.message(), detail),
        None => db_err.message().to_string(),
    }
}

fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            code.starts_with("08") || // connection_exception class
            code == "57P01" || // admin_shutdown
            code == "57P03" || // cannot_connect_now
            code == "53300" // too_many_connections
        }),
        _ => false,
    }
}
