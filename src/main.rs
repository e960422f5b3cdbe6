#[tokio::main]
async fn main() {
    if let Err(e) = docsort::run().await {
        tracing::error!("{}", e);
        eprintln!("docsort: {}", e);
        std::process::exit(1);
    }
}
