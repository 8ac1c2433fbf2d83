use std::io;

use anyhow::Context;
use log::info;

use sendloop::{Config, Sender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();

    let config = Config::from_env().context("Invalid configuration")?;
    info!("Payload: {:?}", config.payload);

    let sender = Sender::new(config);
    let stdout = io::stdout();
    sender
        .run(&mut stdout.lock())
        .await
        .context("Run aborted")?;

    Ok(())
}
