use std::sync::Arc;

use roomcast::broker::Registry;
use roomcast::config::load_config;
use roomcast::id::Generator;
use roomcast::persistence::SledStore;
use roomcast::transport::websocket::start_websocket_server;
use roomcast::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    logging::init("info");

    if let Err(e) = run().await {
        error!("server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config()?;

    let store = Arc::new(SledStore::open(
        &settings.storage.path,
        settings.storage.max_messages_per_topic,
    )?);
    let idgen = Generator::new()?.with_min_len(settings.chat.id_min_length);
    let registry = Arc::new(Registry::new(idgen));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    tokio::select! {
        res = start_websocket_server(&addr, registry, store, settings) => {
            res?;
            error!("server exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, exiting");
        }
    }

    Ok(())
}
