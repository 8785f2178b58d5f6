use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use sysglance::config::{self, RunConfig};
use sysglance::metrics::{MetricSource, SysinfoSource};
use sysglance::render::Renderer;
use sysglance::sampler;

#[derive(Parser)]
#[command(
    name = "sysglance",
    about = "Live terminal report of memory, cpu and session usage"
)]
struct Cli {
    /// Number of samples to take
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    samples: Option<u32>,

    /// Seconds between samples
    #[arg(long)]
    tdelay: Option<u64>,

    /// Report the system sections (memory, cpu) only
    #[arg(long, conflicts_with = "user")]
    system: bool,

    /// Report the connected-sessions section only
    #[arg(long)]
    user: bool,

    /// Append each sample instead of refreshing in place
    #[arg(long)]
    sequential: bool,

    /// Chart memory changes and cpu load below the report
    #[arg(long)]
    graphics: bool,

    /// Path to a defaults file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Positional form of --samples
    #[arg(value_name = "SAMPLES", value_parser = clap::value_parser!(u32).range(1..))]
    samples_pos: Option<u32>,

    /// Positional form of --tdelay
    #[arg(value_name = "TDELAY")]
    tdelay_pos: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    #[cfg(feature = "sample-tracing")]
    init_tracing();

    let cli = Cli::parse();
    let config = resolve_config(&cli);

    // A panic mid-frame would leave the cursor inside the report; drop to a
    // clean line before the default report prints.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        println!();
        original_hook(panic_info);
    }));

    let source: Arc<dyn MetricSource> = Arc::new(SysinfoSource::new());
    let mut renderer = Renderer::new(std::io::stdout(), &config);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    sampler::run(&config, source, &mut renderer, shutdown).await?;
    Ok(())
}

fn resolve_config(cli: &Cli) -> RunConfig {
    let file = match &cli.config {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    };
    let mut config = file.into_run_config();

    if let Some(samples) = cli.samples.or(cli.samples_pos) {
        config.samples = samples;
    }
    if let Some(tdelay) = cli.tdelay.or(cli.tdelay_pos) {
        config.tdelay_secs = tdelay;
    }
    if cli.system {
        config.show_users = false;
    }
    if cli.user {
        config.show_system = false;
    }
    if cli.sequential {
        config.sequential = true;
    }
    if cli.graphics {
        config.graphs = true;
    }
    config
}

#[cfg(feature = "sample-tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
