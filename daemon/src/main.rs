mod config;
mod metrics;
mod scheduler;
mod server;

use clap::Parser;
use config::Config;
use scheduler::SchedulerService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (.yaml, .yml or .toml); falls back to CRONMGR_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the socket path from the config file
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    setup_logging(&config)?;
    log::info!("Starting cronmgr-daemon...");

    let service = Arc::new(SchedulerService::from_config(&config)?);
    let socket_path = config.server.socket_path.clone();

    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    log::info!("Listening on {}", socket_path.display());

    // Set socket permissions to allow all users to connect
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&socket_path)?.permissions();
    perms.set_mode(0o666);
    std::fs::set_permissions(&socket_path, perms)?;

    let max_request_bytes = config.server.max_request_bytes;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, _) = accepted?;
                let service = service.clone();
                service.metrics().increment_connections();

                tokio::spawn(async move {
                    let served = server::serve_connection(socket, service, max_request_bytes).await;
                    if let Err(e) = served {
                        log::error!("connection closed with error: {:?}", e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

/// System config first, then the explicit file layered on top.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::default();

    let system_path = PathBuf::from(common::DEFAULT_CONFIG_PATH);
    if system_path.exists() {
        config.merge(Config::from_file(&system_path)?);
    }

    let explicit = args
        .config
        .clone()
        .or_else(|| std::env::var("CRONMGR_CONFIG").ok().map(PathBuf::from));
    if let Some(path) = explicit {
        config.merge(Config::from_file(&path)?);
    }

    if let Some(socket) = &args.socket {
        config.server.socket_path = socket.clone();
    }
    Ok(config)
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let level: log::LevelFilter = config.logging.level.parse()?;
    let json = config.logging.format == "json";

    let mut dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            if json {
                out.finish(format_args!(
                    "{}",
                    serde_json::json!({
                        "ts": chrono::Local::now().to_rfc3339(),
                        "target": record.target(),
                        "level": record.level().to_string(),
                        "message": message.to_string(),
                    })
                ))
            } else {
                out.finish(format_args!(
                    "[{}][{}][{}] {}",
                    chrono::Local::now().format("%Y-%m-%d][%H:%M:%S"),
                    record.target(),
                    record.level(),
                    message
                ))
            }
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(output) = &config.logging.output {
        ensure_parent(output)?;
        dispatch = dispatch.chain(fern::log_file(output)?);
    }

    dispatch.apply()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
