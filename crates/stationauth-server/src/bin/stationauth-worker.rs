use stationauth_server::{bootstrap, run_worker};

#[tokio::main]
async fn main() {
    let cfg = bootstrap::load_or_exit();

    if let Err(err) = run_worker(cfg).await {
        eprintln!("Worker error: {err}");
        std::process::exit(1);
    }
}
