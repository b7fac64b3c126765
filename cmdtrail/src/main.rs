use anyhow::Result;

mod collect;
mod config;
mod core;
mod helpers;
mod store;

use crate::{
    collect::Collector,
    config::Config,
    core::probe::user::{UretprobeBuilder, UretprobeTarget},
    helpers::{
        logger::{forward_libbpf_logs, Logger},
        signals::Running,
    },
    store::ImmudbClient,
};

// Re-export events crate. It's not really an import but a re-export so events appear as module
// inside the crate rather than an external crate. However, clippy doesn't like it.
#[allow(clippy::single_component_path_imports)]
use events;

fn main() -> Result<()> {
    let _logger = Logger::init(Logger::level_from_env()?)?;
    forward_libbpf_logs();

    let config = Config::load()?;
    let store = ImmudbClient::new(&config.store)?;
    let probe = UretprobeBuilder::new(
        UretprobeTarget::from(&config.probe),
        config.channel.perf_pages,
    );

    Collector::new(config, probe, store, Running::new()?).run()?;
    Ok(())
}
