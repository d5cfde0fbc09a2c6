use std::net::IpAddr;

use clap::Parser;

/// CLI/env configuration for the broadcaster worker, per `spec.md` §6's
/// environment variable list. `clap`'s `env` attribute lets every flag be
/// set either way, matching this codebase's existing settings convention.
#[derive(Parser, Debug, Clone)]
#[command(name = "broadcaster-worker")]
#[command(about = "Nonce-ordered transaction broadcaster")]
pub struct Args {
    /// Host the health endpoint binds to.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port the health endpoint binds to.
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Log level / `tracing_subscriber::EnvFilter` directive.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Upstream signed-tx queue URL.
    #[arg(long, env = "SIGNED_TX_QUEUE_URL")]
    pub signed_tx_queue_url: String,

    /// Downstream broadcast-result queue URL.
    #[arg(long, env = "BROADCAST_TX_QUEUE_URL")]
    pub broadcast_tx_queue_url: String,

    /// Dead-letter queue URL for exhausted/permanently-failed messages.
    #[arg(long, env = "SIGNED_TX_DLQ_URL")]
    pub signed_tx_dlq_url: String,

    /// Path to the static chain configuration table (TOML).
    #[arg(long, env = "CHAIN_TABLE_PATH", default_value = "chains.toml")]
    pub chain_table_path: String,

    /// Single-chain RPC URL override, applied by the Chain Registry at load.
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Single-chain chainId override, applied by the Chain Registry at load.
    #[arg(long, env = "CHAIN_ID")]
    pub chain_id: Option<u64>,

    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    #[arg(long, env = "REDIS_PASSWORD")]
    pub redis_password: Option<String>,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub aws_region: String,

    /// Overrides the AWS endpoint, for local SQS emulators (e.g. localstack).
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub aws_endpoint_url: Option<String>,

    /// Max messages pulled per upstream long-poll (spec §4.6, N ≤ 10).
    #[arg(long, env = "POLL_BATCH_SIZE", default_value = "10")]
    pub poll_batch_size: i32,

    /// Upstream long-poll wait time in seconds (spec §4.6, ≤ 20s).
    #[arg(long, env = "POLL_WAIT_SECONDS", default_value = "20")]
    pub poll_wait_seconds: i32,

    /// Bound on in-flight per-message tasks within one worker process (spec
    /// §5, M ≥ 10).
    #[arg(long, env = "MAX_CONCURRENCY", default_value = "10")]
    pub max_concurrency: usize,

    /// Interval, in seconds, of the periodic sender-drain sweep (spec
    /// §4.6 step 3).
    #[arg(long, env = "SWEEP_INTERVAL_SECONDS", default_value = "5")]
    pub sweep_interval_seconds: u64,

    #[arg(long, env = "RETRY_MAX_RETRIES", default_value = "5")]
    pub retry_max_retries: u32,

    #[arg(long, env = "RETRY_BASE_DELAY_SECONDS", default_value = "2")]
    pub retry_base_delay_seconds: f64,

    #[arg(long, env = "RETRY_MAX_DELAY_SECONDS", default_value = "60")]
    pub retry_max_delay_seconds: f64,

    #[arg(long, env = "RETRY_MULTIPLIER", default_value = "2")]
    pub retry_multiplier: f64,

    /// Conservative cap on `StoreUnavailable` in-place retries before
    /// routing to DLQ; the spec leaves this unbounded (§9 Open Questions).
    #[arg(long, env = "STORE_UNAVAILABLE_MAX_RETRIES", default_value = "10")]
    pub store_unavailable_max_retries: u32,
}

impl Args {
    pub fn redis_url(&self) -> String {
        match &self.redis_password {
            Some(password) => format!(
                "redis://:{password}@{}:{}",
                self.redis_host, self.redis_port
            ),
            None => format!("redis://{}:{}", self.redis_host, self.redis_port),
        }
    }
}
