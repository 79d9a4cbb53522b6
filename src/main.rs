#[tokio::main]
async fn main() -> anyhow::Result<()> {
    econoviz_lib::run().await
}
