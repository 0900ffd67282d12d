use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use podfbv::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "podfbv")]
#[command(about = "Bridge a Line 6 FBV foot controller to a Line 6 POD")]
struct Cli {
    /// FBV name under /dev/snd/by-id (port name prefix with --backend midir)
    #[arg(long = "fbv-id", alias = "fbv_id", value_name = "ID")]
    fbv_id: Option<String>,

    /// POD name under /dev/snd/by-id (port name prefix with --backend midir)
    #[arg(long = "pod-id", alias = "pod_id", value_name = "ID")]
    pod_id: Option<String>,

    /// FBV raw MIDI device node, e.g. /dev/snd/midiC1D0
    #[arg(long = "fbv-dev", alias = "fbv_dev", value_name = "PATH", conflicts_with = "fbv_id")]
    fbv_dev: Option<PathBuf>,

    /// POD raw MIDI device node, e.g. /dev/snd/midiC2D0
    #[arg(long = "pod-dev", alias = "pod_dev", value_name = "PATH", conflicts_with = "pod_id")]
    pod_dev: Option<PathBuf>,

    /// Keep reconnecting after devices disappear
    #[arg(long = "loop")]
    retry: bool,

    /// Run unattended: implies --loop, plain log output
    #[arg(short, long)]
    daemon: bool,

    /// TOML config file; command line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Device backend: raw or midir
    #[arg(long)]
    backend: Option<Backend>,

    /// Print the MIDI port names midir can see and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(id) = &self.fbv_id {
            config.fbv = DeviceId::Id(id.clone());
        }
        if let Some(path) = &self.fbv_dev {
            config.fbv = DeviceId::Path(path.clone());
        }
        if let Some(id) = &self.pod_id {
            config.pod = DeviceId::Id(id.clone());
        }
        if let Some(path) = &self.pod_dev {
            config.pod = DeviceId::Path(path.clone());
        }
        if self.retry || self.daemon {
            config.retry = true;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
    }
}

fn init_tracing(daemon: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_ansi(!daemon)
        .try_init()
        .ok();
}

#[cfg(feature = "midir")]
fn list_ports() -> anyhow::Result<()> {
    let (inputs, outputs) = podfbv::io::list_ports().context("listing MIDI ports")?;
    println!("Inputs:");
    for name in inputs {
        println!("  {}", name);
    }
    println!("Outputs:");
    for name in outputs {
        println!("  {}", name);
    }
    Ok(())
}

#[cfg(not(feature = "midir"))]
fn list_ports() -> anyhow::Result<()> {
    anyhow::bail!("--list-ports needs podfbv built with the midir feature")
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.list_ports {
        return list_ports();
    }

    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    cli.apply(&mut config);

    let supervisor = Supervisor::builder()
        .config(config)
        .build()
        .context("configuring bridge")?;

    let handle = supervisor.handle();
    ctrlc::set_handler(move || handle.request_stop()).context("installing Ctrl-C handler")?;

    supervisor.run()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.daemon);

    match run(&cli) {
        Ok(()) => {
            if cli.daemon {
                info!("Daemon terminated successfully.");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
