use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use elective::{Api, AppState, Config, Error, MemorySessions, MemoryStore, Mode, Server, Sessions, api, logging};

#[derive(Parser)]
#[command(name = "elective", version, about = "Course-selection JSON backend")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file.
    #[arg(long)]
    bind: Option<String>,

    /// Put internal error detail into 500 responses.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if cli.debug {
        config.mode = Mode::Debug;
    }
    config.validate()?;

    logging::init(&config.log);

    let addr = config.bind_addr()?;
    info!(%addr, mode = ?config.mode, admins = config.admins.len(), "configuration loaded");

    let sessions = Sessions::new(Arc::new(MemorySessions::new()), &config.session_cookie);
    let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), config.admins));
    let app = api::router(&Api::new(config.mode, sessions), state);

    Server::bind(addr).serve(app).await
}
