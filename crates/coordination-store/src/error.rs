use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("coordination store unavailable: {source}"))]
    Redis { source: redis::RedisError },

    #[snafu(display("failed to (de)serialize coordination store value: {message}"))]
    Serialization { message: String },

    #[snafu(display("gave up merging pending list for {sender} after {attempts} attempts due to concurrent writers"))]
    ContentionExceeded { sender: String, attempts: u32 },
}

impl From<redis::RedisError> for StoreError {
    fn from(source: redis::RedisError) -> Self {
        StoreError::Redis { source }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(source: serde_json::Error) -> Self {
        StoreError::Serialization {
            message: source.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
