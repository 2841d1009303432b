mod config;
mod error;
mod frame;
mod object_3d_loader;
mod scene_pkg;
mod system;

use std::path::PathBuf;

use log::info;

use crate::config::settings::ViewerConfig;
use crate::config::vulkan::vulkan_init;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ViewerConfig::load(config_path)?;
    info!("starting {}", config.window.title);

    vulkan_init(config)
}
