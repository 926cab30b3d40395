mod config;
mod rsp;
mod ui;
mod viewer;

use std::{path::PathBuf, process, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use register_view::{DebugTarget, MemoryTarget, RegisterManager};

use config::Config;
use rsp::RspClient;

/// Controls the watchpoints of an OR1200 debug unit through a GDB stub.
#[derive(Debug, Parser)]
#[command(name = "wpctl", version)]
struct Opt {
    /// Config file. Defaults to WatchpointControl.toml in the working directory, if present.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Host of the GDB stub.
    #[arg(long)]
    host: Option<String>,
    /// Port of the GDB stub.
    #[arg(short, long)]
    port: Option<u16>,
    /// Edit an in-memory register file instead of connecting to a target.
    #[arg(long)]
    offline: bool,
    /// Publish the registers on this websocket address, e.g. localhost:3031.
    #[arg(long)]
    websocket: Option<String>,
}

fn main() {
    pretty_env_logger::init();

    match main_try() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("error: {:?}", e);
            process::exit(1);
        }
    }
}

fn main_try() -> Result<()> {
    let opt = Opt::parse();
    let mut config = Config::load(opt.config.as_deref())?;
    if let Some(host) = opt.host {
        config.rsp.host = host;
    }
    if let Some(port) = opt.port {
        config.rsp.port = port;
    }
    if let Some(websocket) = opt.websocket {
        config.viewer.enabled = true;
        config.viewer.websocket = websocket;
    }
    log::debug!("Using {:#?}", config);

    let target: Box<dyn DebugTarget> = if opt.offline {
        log::info!("Running without a target");
        Box::new(MemoryTarget::new())
    } else {
        Box::new(
            RspClient::connect(
                &config.rsp.host,
                config.rsp.port,
                config.rsp.connect_timeout(),
                config.rsp.read_timeout(),
            )
            .context("Failed to attach to the GDB stub. Use --offline to run without one")?,
        )
    };

    let mut state = ui::State::new(RegisterManager::new(target));
    state.set_poll_interval(config.ui.poll_interval_ms);
    if config.viewer.enabled {
        let viewer = viewer::Viewer::start(&config.viewer.websocket)?;
        if let Some(addr) = viewer.local_addr() {
            log::info!("Viewers can connect to ws://{}", addr);
        }
        state = state.with_viewer(viewer);
    }

    let mut app = ui::App::new(state, Duration::from_millis(config.ui.tick_rate_ms))?;
    app.run(config.ui.read_on_start)
}
