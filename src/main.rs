//! zuulscan - Netflix Zuul nflx-2016-003 scanner CLI

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use zuulscan::config;
use zuulscan::error::ZuulError;
use zuulscan::http::HttpClient;
use zuulscan::models::{ResultSet, ScanConfig};
use zuulscan::oob::{self, CallbackListener};
use zuulscan::scanner::orchestrator::report;
use zuulscan::scanner::{ActiveProbe, ScanOrchestrator};

/// Scans Netflix Zuul instances in relation to the nflx-2016-003 security advisory
#[derive(Parser)]
#[command(name = "zuulscan", version, about, long_about = None)]
struct Cli {
    /// Prints verbose information during command execution
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// HTTP/HTTPS proxy URL
    #[arg(long, global = true)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Executes a new passive scan against the specified targets
    Passive {
        /// Target base URLs
        #[arg(required = true)]
        targets: Vec<String>,

        /// Maximum targets scanned at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Executes a new passive scan against the targets listed in a file
    Passivebulk {
        /// File with one target base URL per line
        targets_file: PathBuf,

        /// Maximum targets scanned at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Executes a new active scan, uploading and activating a verification filter
    Active {
        /// Target base URL
        target: String,

        /// Host or IP the target can reach for the callback
        #[arg(long)]
        callback_host: Option<String>,

        /// Port the callback listener binds
        #[arg(long)]
        callback_port: Option<u16>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "zuulscan=debug"
    } else {
        "zuulscan=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_scan_config(path: Option<&Path>) -> zuulscan::error::Result<ScanConfig> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default_path = Path::new("config/default.toml");
            if default_path.exists() {
                config::load_config(default_path)
            } else {
                Ok(ScanConfig::default())
            }
        }
    }
}

fn print_result(target: &str, rs: &ResultSet) {
    let verdict = if rs.vulnerable {
        "VULNERABLE".red().bold()
    } else if rs.might_vulnerable {
        "POSSIBLY VULNERABLE".yellow().bold()
    } else if rs.prev_enabled {
        "VERIFICATION FILTER ALREADY ENABLED".yellow()
    } else if rs.admin_disabled {
        "ADMIN UPLOAD DISABLED".green()
    } else {
        "NOT VULNERABLE".green()
    };

    println!("  {} {}", "Target:".bold(), target);
    println!("  {} {}", "Result:".bold(), verdict);
    println!("  {} {}", "Previously enabled:".bold(), rs.prev_enabled);
    println!("  {} {}", "Admin disabled:".bold(), rs.admin_disabled);
    println!("  {} {}", "Vulnerable:".bold(), rs.vulnerable);
    println!("  {} {}", "Might be vulnerable:".bold(), rs.might_vulnerable);
}

async fn passive_scan(
    scan_config: &ScanConfig,
    targets: Vec<String>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpClient::from_config(scan_config)?;
    let orchestrator =
        ScanOrchestrator::new(Arc::new(client.clone())).with_concurrency(scan_config.concurrency);

    let stream = orchestrator.scan(targets);
    let mut stdout = std::io::stdout();
    report(stream, verbose, &mut stdout).await?;

    debug!("{} requests sent", client.request_count());
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut scan_config = load_scan_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Passive {
            targets,
            concurrency,
        } => {
            config::merge_cli_args(&mut scan_config, cli.timeout, concurrency, cli.proxy, None, None)?;
            passive_scan(&scan_config, targets, cli.verbose).await?;
        }

        Commands::Passivebulk {
            targets_file,
            concurrency,
        } => {
            config::merge_cli_args(&mut scan_config, cli.timeout, concurrency, cli.proxy, None, None)?;
            let targets = config::read_targets(&targets_file)?;
            passive_scan(&scan_config, targets, cli.verbose).await?;
        }

        Commands::Active {
            target,
            callback_host,
            callback_port,
            json,
        } => {
            config::merge_cli_args(
                &mut scan_config,
                cli.timeout,
                None,
                cli.proxy,
                callback_host,
                callback_port,
            )?;
            let host = scan_config.callback_host.clone().ok_or_else(|| {
                ZuulError::ConfigError(
                    "--callback-host (or [callback] host) is required for active scans".to_string(),
                )
            })?;

            let listener =
                CallbackListener::start(SocketAddr::from(([0, 0, 0, 0], scan_config.callback_port)))
                    .await?;
            let scan_id = oob::generate_id();
            let mut signal = listener.register(&scan_id).await?;
            let callback_url = listener.callback_url(&host, &scan_id);
            debug!("Callback URL: {callback_url}");

            let client = HttpClient::from_config(&scan_config)?;
            let probe = ActiveProbe::new(Arc::new(client));
            let outcome = probe.scan(&target, &callback_url, Some(&mut signal)).await;
            listener.unregister(&scan_id).await;

            let (rs, failure) = match outcome {
                Ok(rs) => (rs, None),
                Err(failure) => (failure.result, Some(failure.error)),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&rs)?);
            } else {
                print_result(&target, &rs);
            }

            if let Some(error) = failure {
                eprintln!("  {} {}", "Error:".red().bold(), error);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
