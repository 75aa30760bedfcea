#[tokio::main]
async fn main() {
    if let Err(err) = soarcery::cli::run().await {
        soarcery::ui::eprintln_error(&err);
        std::process::exit(soarcery::exit::exit_code(&err));
    }
}
