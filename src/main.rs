// External crates
use anyhow::Result;
use log::info;
use std::env;

// Local modules
use forecast::{ForecastConfig, Forecaster};
use model::Architecture;
use server::router::RequestRouter;
use server::TransportServer;
use util::model_store::ModelStore;

// Constants
pub mod constants;

pub mod error;
pub mod forecast;
pub mod model;
pub mod server;

pub mod util {
    pub mod model_store;
    pub mod normalizer;
}

// Build-time metadata recorded by the build script
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Accept socket path, model directory, and architecture as command-line arguments
    let args: Vec<String> = env::args().collect();
    let socket_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or(constants::DEFAULT_SOCKET_PATH);
    let model_dir = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or(constants::DEFAULT_MODEL_DIR);
    let architecture = match args.get(3) {
        Some(raw) => raw.parse::<Architecture>()?,
        None => Architecture::default(),
    };

    info!(
        "{} v{} starting | architecture: {} | socket: {} | model dir: {}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        architecture,
        socket_path,
        model_dir
    );

    let config = ForecastConfig {
        architecture,
        ..ForecastConfig::default()
    };
    let forecaster = Forecaster::new(config, ModelStore::new(model_dir));
    let router = RequestRouter::new(forecaster);

    let server = TransportServer::bind(socket_path, router)?;
    server.install_signal_watcher()?;
    server.run()
}
