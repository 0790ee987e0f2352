use std::env;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

const LOG_FILE: &str = "note-manager.log";

#[derive(Parser, Debug)]
#[command(
    name = "note-manager",
    version,
    about = "Terminal note manager with live search and local storage"
)]
pub struct Cli {
    /// Override the config file location (takes precedence over NOTE_MANAGER_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over NOTE_MANAGER_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level, &paths.log_dir)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting note-manager");

    let config = loader.load_or_init()?;
    let store = storage::init(&paths, &config.storage)?;

    let mut app = App::new(Arc::new(config), store);
    let result = app.run();
    if let Err(err) = &result {
        tracing::error!(error = %err, "terminal session ended with an error");
    }
    result
}

/// Logs go to a file so they never draw over the terminal UI.
fn init_tracing(level: &str, log_dir: &Path) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let file = open_log_file(log_dir)?;
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
        Ok(())
    })
    .map(|_| ())
}

fn open_log_file(log_dir: &Path) -> Result<File> {
    let path = log_dir.join(LOG_FILE);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))
}
