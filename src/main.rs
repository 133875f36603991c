use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    rt_visibility::cli::app::run().await
}
