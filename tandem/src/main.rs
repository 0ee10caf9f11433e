mod service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    service::run().await
}
