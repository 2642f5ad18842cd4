use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pilot_cli::run().await
}
