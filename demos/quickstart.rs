//! Minimal end-to-end usage: connect, watch a table, call a reducer.
//!
//! Run against a local server:
//!
//! ```text
//! cargo run --example quickstart -- ws://localhost:3000 chat
//! ```

use anyhow::Context;
use anyhow::Result;
use vireo::DbConnection;
use vireo::PrimaryKeyExtractor;
use vireo::RowEvent;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("vireo_client=debug").init();

    let mut args = std::env::args().skip(1);
    let uri = args.next().unwrap_or_else(|| "ws://localhost:3000".to_string());
    let module = args.next().unwrap_or_else(|| "chat".to_string());

    let conn = DbConnection::builder()
        .with_uri(&uri)
        .with_module_name(&module)
        .on_identity(|identity, connection_id| {
            println!("identity {identity} on connection {connection_id}");
        })
        .on_disconnect(|error| match error {
            Some(error) => eprintln!("session ended: {error}"),
            None => println!("session closed"),
        })
        .build()
        .await
        .context("failed to establish session")?;

    let cache = conn.cache();
    cache.register_extractor("message", PrimaryKeyExtractor::prefix_u64());
    cache.on_any_event(|event| match event {
        RowEvent::Insert { table_name, .. } => println!("+ row in {table_name}"),
        RowEvent::Delete { table_name, .. } => println!("- row in {table_name}"),
        RowEvent::Update { table_name, .. } => println!("~ row in {table_name}"),
    });

    let subscription = conn
        .subscribe(vec!["SELECT * FROM message".to_string()])
        .await
        .context("subscribe failed")?;
    println!("subscribed to {:?}, {} rows cached", subscription.queries(), conn.cache().row_count("message"));

    tokio::signal::ctrl_c().await?;
    conn.disconnect().await?;
    Ok(())
}
