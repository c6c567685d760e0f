#[tokio::main]
async fn main() {
    if let Err(e) = ophthalmo_crm::run().await {
        tracing::error!("Fatal: {e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
