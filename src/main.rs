use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    askgpt::run().await
}
