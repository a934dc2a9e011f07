//! Manual job injection CLI (SPEC_FULL §C.5): build a sample `Job`,
//! serialize it to JSON, and write it to the running node's Unix socket.

use eyre::Result;
use oracle_types::{Job, JobKind};
use tokio::io::AsyncWriteExt;

const SOCKET_PATH: &str = "/tmp/oracle-node.sock";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let kind = match args.next().as_deref() {
        Some("vrf") => JobKind::Vrf,
        Some("compute") => JobKind::Compute,
        Some("aggregate") => JobKind::Aggregate,
        _ => JobKind::DataFeed,
    };
    let id = args.next().unwrap_or_else(|| "manual-1".to_string());

    let job = Job::new(id, kind, "inject-event")
        .with_param("feed_id", "eth-usd")
        .with_param("url", "https://example.com/price/eth-usd");

    inject(job).await?;
    println!("job injected successfully");
    Ok(())
}

async fn inject(job: Job) -> Result<()> {
    let mut stream = tokio::net::UnixStream::connect(SOCKET_PATH).await?;
    let json = serde_json::to_string(&job)?;
    stream.write_all(json.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}
