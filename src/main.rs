use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = httpchain::cli::Cli::parse();
    if let Err(e) = httpchain::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
