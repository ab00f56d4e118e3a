mod catalog;
mod output;

use anyhow::Context;
use catalog::Catalog;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use common::{frequency, CronMask, JobScheduler, Request, Response};
use output::{print_rows, OutputFormat};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a cron mask and preview its next two runs
    Validate {
        mask: String,
        /// Masks already in use; a match is rejected
        #[arg(long)]
        existing: Vec<String>,
        /// Time zone for the preview
        #[arg(long, default_value = common::DEFAULT_TIMEZONE)]
        tz: String,
    },
    /// List upcoming fire times of a mask
    Next {
        mask: String,
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
        /// RFC 3339 instant to start from (defaults to now)
        #[arg(long, value_parser = parse_instant)]
        after: Option<DateTime<Utc>>,
        #[arg(long, default_value = common::DEFAULT_TIMEZONE)]
        tz: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// List known time zones
    Timezones {
        /// Case-insensitive substring filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show scheduling state of the jobs in a catalog file (.yaml, .yml or .json)
    Status {
        file: PathBuf,
        /// RFC 3339 instant to evaluate at (defaults to now)
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print daemon metrics
    Metrics {
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 instant: {}", e))
}

fn format_instant(at: DateTime<Utc>, timezone: &str) -> String {
    match common::parse_timezone(timezone) {
        Ok(zone) => at.with_timezone(&zone).format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        Err(_) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}

fn due_label(hung: bool, due: bool) -> &'static str {
    match (hung, due) {
        (true, _) => "hung",
        (false, true) => "yes",
        (false, false) => "no",
    }
}

fn format_optional(value: Option<f64>, scale: f64, precision: usize, unit: &str) -> String {
    value
        .map(|v| format!("{:.*}{}", precision, v * scale, unit))
        .unwrap_or_else(|| "-".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Validate { mask, existing, tz } => {
            let zone = common::parse_timezone(&tz)?;
            let existing = existing.iter().map(String::as_str);
            let preview = frequency::check(&mask, existing, Utc::now(), zone)?;
            println!("Valid mask. Next runs: {}", preview);
        }
        Commands::Next { mask, count, after, tz, format } => {
            let zone = common::parse_timezone(&tz)?;
            let mask = CronMask::parse(&mask)?;
            let times = mask.upcoming(after.unwrap_or_else(Utc::now), count, zone);
            if times.is_empty() {
                anyhow::bail!("Mask {} never fires again", mask);
            }
            let rows: Vec<Vec<String>> = times
                .iter()
                .enumerate()
                .map(|(i, t)| vec![(i + 1).to_string(), format_instant(*t, &tz), t.to_rfc3339()])
                .collect();
            print_rows(format, &["#", "Local", "UTC"], &rows)?;
        }
        Commands::Timezones { filter } => {
            let filter = filter.map(|f| f.to_lowercase());
            for zone in common::list_timezones() {
                if filter.as_ref().map_or(true, |f| zone.to_lowercase().contains(f.as_str())) {
                    println!("{}", zone);
                }
            }
        }
        Commands::Status { file, at, format } => {
            let catalog = Catalog::from_file(&file)?;
            let now = at.unwrap_or_else(Utc::now);

            for problem in catalog.problems(now) {
                log::warn!("{}", problem);
                eprintln!("Warning: {}", problem);
            }

            let rows: Vec<Vec<String>> = catalog
                .report(&JobScheduler::default(), now)
                .into_iter()
                .map(|r| {
                    vec![
                        r.name,
                        r.frequency,
                        r.status.to_string(),
                        r.next_run
                            .map(|t| format_instant(t, &r.timezone))
                            .unwrap_or_else(|| "-".to_string()),
                        due_label(r.hung, r.due).to_string(),
                        r.runs.to_string(),
                        r.failed.to_string(),
                        format_optional(r.success_ratio, 100.0, 2, "%"),
                        format_optional(r.avg_exec_time, 1.0, 5, " sec"),
                    ]
                })
                .collect();
            print_rows(
                format,
                &[
                    "Name",
                    "Frequency",
                    "Status",
                    "Next run",
                    "Due",
                    "Runs",
                    "Failed",
                    "Success",
                    "Avg time",
                ],
                &rows,
            )?;
        }
        Commands::Metrics { socket } => {
            let socket_path = socket.unwrap_or_else(|| {
                let system = PathBuf::from(common::DEFAULT_SOCKET_PATH);
                if system.exists() { system } else { PathBuf::from(common::USER_SOCKET_PATH) }
            });
            let stream = UnixStream::connect(&socket_path)
                .await
                .with_context(|| format!("Failed to connect to {}", socket_path.display()))?;

            match send(stream, &Request::Metrics).await? {
                Response::Metrics(text) => print!("{}", text),
                Response::Error(e) => anyhow::bail!("Daemon error: {}", e),
                other => anyhow::bail!("Unexpected response: {:?}", other),
            }
        }
    }

    Ok(())
}

async fn send(stream: UnixStream, req: &Request) -> anyhow::Result<Response> {
    let (reader, mut writer) = stream.into_split();

    let mut req_bytes = serde_json::to_vec(req)?;
    req_bytes.push(b'\n');
    writer.write_all(&req_bytes).await?;

    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await?;
    if line.is_empty() {
        anyhow::bail!("Daemon closed the connection");
    }
    Ok(serde_json::from_str(&line)?)
}
