#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before any config is read from the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    passwordpal::cli::run_cli().await
}
