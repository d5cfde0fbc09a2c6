use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StateStoreError {
    #[snafu(display("database query failed: {source}"))]
    Query { source: sqlx::Error },

    #[snafu(display("database migration failed: {source}"))]
    Migration { source: sqlx::migrate::MigrateError },

    #[snafu(display("no request found for {request_id}"))]
    NotFound { request_id: String },
}

impl From<sqlx::Error> for StateStoreError {
    fn from(source: sqlx::Error) -> Self {
        StateStoreError::Query { source }
    }
}

pub type Result<T> = std::result::Result<T, StateStoreError>;
