use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use log::{debug, error, info};

use flash_notes::{
    App, BadgeHost, BadgeNotifier, Cli, Config, NoteStore, PersistenceAdapter, Result,
    StoreOptions, TerminalBadge,
};

pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    debug!("Logger initialized");
}

/// Loads the configuration; a first run writes one that keeps history across invocations
fn load_config(cli: &Cli) -> Result<Config> {
    let path: Option<PathBuf> = cli.config.clone().or_else(Config::default_path);

    let mut config = match &path {
        Some(path) if path.exists() => Config::load(path)?,
        Some(path) => {
            let config = Config {
                persist_history: true,
                ..Config::default()
            };
            config.save(path)?;
            config
        }
        None => Config::default(),
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    debug!("Using config: {:?}", config);

    let adapter = PersistenceAdapter::from_config(&config)?;
    let badge = Arc::new(TerminalBadge::new());
    let notifier = if config.badge {
        BadgeNotifier::new(Some(badge.clone() as Arc<dyn BadgeHost>))
    } else {
        BadgeNotifier::disabled()
    };

    let store = NoteStore::open(adapter, notifier, StoreOptions::from(&config)).await?;
    let app = App::new(store.clone(), badge, cli.verbose);

    let outcome = app.run(cli.command).await;
    if let Err(e) = store.shutdown().await {
        error!("Shutdown failed: {}", e);
    }
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);
    info!("Application starting up");

    match run(cli).await {
        Ok(()) => {
            info!("Application shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
