mod app;
mod config;
mod debug;
mod error;
mod ingest;
mod render;
mod series;
mod session;
mod tooltip;
mod transport;

use clap::Parser;

fn main() {
    env_logger::init();
    let config = config::Config::parse();
    log::info!("pps-chart starting up");

    if let Err(e) = app::run(config) {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
