mod cli;

#[tokio::main]
async fn main() {
    sensor_monitor::init_tracing();
    let code = cli::run().await;
    std::process::exit(code);
}
