use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to load chain table: {source}"))]
    ChainTable { source: std::io::Error },

    #[snafu(display("chain registry rejected the chain table: {source}"))]
    ChainRegistry { source: chain_registry::RegistryError },

    #[snafu(display("failed to connect to coordination store: {source}"))]
    CoordinationStore { source: coordination_store::StoreError },

    #[snafu(display("failed to connect to state store: {source}"))]
    StateStore { source: state_store::StateStoreError },

    #[snafu(display("failed to bind health endpoint: {source}"))]
    ServerBind { source: std::io::Error },

    #[snafu(display("health endpoint failed: {source}"))]
    ServerStart { source: std::io::Error },

    #[snafu(display("failed to initialize logger: {message}"))]
    Logger { message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
