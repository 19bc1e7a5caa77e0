//! Walks through every building block once: publish, state CRUD, service
//! invocation and an output binding. Stops at the first error.

use anyhow::Context;
use clap::Parser;
use dapr_sdk::prelude::*;
use std::collections::HashMap;

#[derive(Parser)]
#[command(author, version, about = "Dapr client walkthrough", long_about = None)]
struct Args {
    /// State store component
    #[arg(long, default_value = "statestore")]
    store: String,

    /// Pub/sub component
    #[arg(long, default_value = "messages")]
    pubsub: String,

    #[arg(long, default_value = "demo")]
    topic: String,

    /// App id of the service to invoke
    #[arg(long, default_value = "serving")]
    app_id: String,

    #[arg(long, default_value = "echo")]
    method: String,

    /// Output binding component
    #[arg(long, default_value = "example-http-binding")]
    binding: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logger(std::io::stderr);

    let data = br#"{ "message": "hello" }"#;

    let client = DaprClient::from_env().await.context("creating client")?;

    client
        .publish_event(&args.pubsub, &args.topic, data)
        .await
        .context("publishing event")?;
    println!("data published");

    println!("saving data: {}", String::from_utf8_lossy(data));
    client
        .save_state(&args.store, "key1", data)
        .await
        .context("saving state")?;
    println!("data saved");

    let item = client
        .get_state(&args.store, "key1")
        .await
        .context("getting state")?;
    println!(
        "data retrieved [key:{} etag:{}]: {}",
        item.key,
        item.etag.as_deref().unwrap_or_default(),
        String::from_utf8_lossy(&item.value)
    );

    let item2 = SetStateItem {
        key: item.key.clone(),
        value: item.value.clone(),
        etag: Some(ETag::new("2")),
        metadata: HashMap::from([("created-on".to_string(), chrono::Utc::now().to_string())]),
        options: Some(StateOptions {
            concurrency: StateConcurrency::LastWrite,
            consistency: StateConsistency::Strong,
        }),
    };
    client
        .save_bulk_state(&args.store, &[item2])
        .await
        .context("saving state item")?;
    println!("data item saved");

    client
        .delete_state(&args.store, "key1")
        .await
        .context("deleting state")?;
    println!("data deleted");

    let content = DataContent::new("text/plain", "hellow");
    let resp = client
        .invoke_method_with_content(&args.app_id, &args.method, "post", &content)
        .await
        .context("invoking service method")?;
    println!("service method invoked, response: {}", String::from_utf8_lossy(&resp));

    let binding = InvokeBindingRequest::new(args.binding, "create");
    client
        .invoke_output_binding(&binding)
        .await
        .context("invoking output binding")?;
    println!("output binding invoked");

    println!("DONE (CTRL+C to Exit)");
    Ok(())
}
