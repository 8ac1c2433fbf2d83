use anyhow::Context;
use hyper::service;

use sendloop::receiver::{self, Server};
use sendloop::ReceiverConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();

    let config = ReceiverConfig::from_env().context("Invalid configuration")?;
    let max_latency = config.max_latency;
    let service = service::service_fn(move |req| receiver::handle(req, max_latency));

    let server = Server::bind(config.addr)
        .await
        .with_context(|| format!("Can't bind to {}", config.addr))?
        .max_connections(config.max_connections)
        .journal_capacity(config.journal_capacity)
        .service(service);

    server.run().await;
    Ok(())
}
