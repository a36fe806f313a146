use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, info_span, warn, Instrument};

use pretty_log::init::init_tracing;

#[tokio::main]
async fn main() {
    // PRETTY_LOG_LEVEL=debug PRETTY_LOG_GROUP_SPANS=1 cargo run --example tracing_layer
    if let Err(e) = init_tracing() {
        eprintln!("failed to install subscriber: {}", e);
        return;
    }

    info!(port = 8080u64, "starting service");

    async {
        debug!(attempt = 1u64, "authenticating");
        sleep(Duration::from_millis(5)).await;
        warn!(elapsed_ms = 5u64, "slow backend");
        error!(reason = "invalid password", "authentication failed");
    }
    .instrument(info_span!("request", user_id = 42u64))
    .await;
}
