use anyhow::{Context, Result};
use clap::Parser;
use popsplit_cli::cli::{Cli, Commands};
use popsplit_core::PopsplitConfig;
use tracing::{debug, error};
use tracing_subscriber::FmtSubscriber;

mod commands;

fn load_config(cli: &Cli) -> Result<PopsplitConfig> {
    match &cli.config {
        Some(path) => PopsplitConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PopsplitConfig::default()),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    debug!(?config, "configuration");
    match &cli.command {
        Commands::Graph { units } => commands::graph::handle(units, &config),
        Commands::Sweep(args) => commands::sweep::handle(args, config),
        Commands::Export(args) => commands::export::handle(args, config),
    }
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(err) = run(&cli) {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
