#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lot_lookup::run().await
}
