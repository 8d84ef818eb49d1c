mod advisor;
mod sync;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sync::{ReportClient, ReportReq};

/// Monthly expense reports from the expenses server
#[derive(Parser)]
#[command(name = "expenses", version)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "EXPENSES_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Bearer token identifying the owner; needed by every server call
    #[arg(long, env = "EXPENSES_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Period {
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: u32,
    #[arg(long)]
    year: i32,
}

impl From<&Period> for ReportReq {
    fn from(p: &Period) -> Self {
        Self {
            month: p.month,
            year: p.year,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Download the month's CSV export
    Csv {
        #[command(flatten)]
        period: Period,
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Download the printable HTML report
    Html {
        #[command(flatten)]
        period: Period,
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Stream the spending analysis to stdout
    Analyze {
        #[command(flatten)]
        period: Period,
    },
    /// Print the analysis text of a saved stream body
    Replay {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let client = || match cli.token.as_deref() {
        Some(token) => Ok(ReportClient::new(&cli.url, token)),
        None => Err(anyhow!("EXPENSES_TOKEN or --token is required")),
    };

    match cli.command {
        Command::Csv { period, out } => {
            let csv = client()?.download_csv(&(&period).into()).await?;
            let path = out.unwrap_or_else(|| {
                format!("expenses_{}_{}.csv", period.month, period.year).into()
            });
            std::fs::write(&path, csv)?;
            info!(path = %path.display(), "csv written");
            println!("{}", path.display());
        }
        Command::Html { period, out } => {
            let html = client()?.fetch_html(&(&period).into()).await?;
            let path = out.unwrap_or_else(|| {
                format!("report_{}_{}.html", period.month, period.year).into()
            });
            std::fs::write(&path, html)?;
            info!(path = %path.display(), "report written");
            println!("{}", path.display());
        }
        Command::Analyze { period } => {
            let resp = client()?.open_analysis(&(&period).into()).await?;
            let mut stdout = io::stdout().lock();
            let text = advisor::relay_analysis(Box::pin(resp.bytes_stream()), &mut stdout).await?;
            writeln!(stdout)?;
            info!(chars = text.chars().count(), "analysis complete");
        }
        Command::Replay { file } => {
            let body = std::fs::read_to_string(&file)?;
            println!("{}", advisor::replay_analysis(&body));
        }
    }
    Ok(())
}
