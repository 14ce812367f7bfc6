#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = egelab::run_worker().await {
        eprintln!("egelab fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
