mod app;
mod cli;
mod decoder;
mod display;
mod fonts;
mod results;
mod splash;
mod timeline_csv;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::cli::{Cli, Settings};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let settings = Settings::load(Cli::parse())?;
    App::new(settings, command_line).run()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
