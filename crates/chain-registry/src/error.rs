use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RegistryError {
    #[snafu(display("chain table is invalid: {message}"))]
    ConfigInvalid { message: String },

    #[snafu(display("no chain entry registered for {chain}/{network}"))]
    Unsupported { chain: String, network: String },

    #[snafu(display("invalid rpc endpoint {endpoint} for chain_id {chain_id}: {source}"))]
    InvalidEndpoint {
        chain_id: u64,
        endpoint: String,
        source: url::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
