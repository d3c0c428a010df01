use stationauth_server::{bootstrap, run_server};

#[tokio::main]
async fn main() {
    let cfg = bootstrap::load_or_exit();

    if let Err(err) = run_server(cfg).await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
