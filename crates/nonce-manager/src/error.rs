use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NonceError {
    #[snafu(display("could not determine expected nonce for {sender}: {message}"))]
    NonceUnknown { sender: String, message: String },

    #[snafu(display("lock already held for {sender}"))]
    LockContention { sender: String },

    #[snafu(display("coordination store error: {source}"))]
    Store { source: coordination_store::StoreError },

    #[snafu(display("chain registry error: {source}"))]
    Registry { source: chain_registry::RegistryError },
}

impl From<coordination_store::StoreError> for NonceError {
    fn from(source: coordination_store::StoreError) -> Self {
        NonceError::Store { source }
    }
}

impl From<chain_registry::RegistryError> for NonceError {
    fn from(source: chain_registry::RegistryError) -> Self {
        NonceError::Registry { source }
    }
}

pub type Result<T> = std::result::Result<T, NonceError>;
