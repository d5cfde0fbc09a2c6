use ctor::ctor;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

pub const INTEGRATION_TEST_TIMEOUT_SECS: u64 = 10;

pub async fn get_free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("Should be able to bind to port");

    listener.local_addr().expect("Should have a local address").port()
}

#[ctor]
fn init_test_tracing() {
    let has_nocapture = std::env::args().any(|arg| arg == "--nocapture" || arg == "--show-output");
    if has_nocapture {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .try_init()
            .ok();
    }
}
