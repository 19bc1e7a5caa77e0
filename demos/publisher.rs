//! Publishes a single `ping` to the `neworder` topic.

use anyhow::Context;
use clap::Parser;
use dapr_sdk::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Publish one event", long_about = None)]
struct Args {
    /// Pub/sub component
    #[arg(long, env = "DAPR_PUBSUB_NAME")]
    pubsub: String,

    #[arg(long, default_value = "neworder")]
    topic: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let data = b"ping";

    setup_logger(std::io::stderr);
    let client = DaprClient::from_env().await.context("creating client")?;

    client
        .publish_event(&args.pubsub, &args.topic, data)
        .await
        .context("publishing event")?;
    println!("data published");

    println!("Done (CTRL+C to Exit)");
    Ok(())
}
