use env_logger::Env;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = shotrelay::run().await {
        log::error!("fatal: {err}");
        std::process::exit(1);
    }
}
