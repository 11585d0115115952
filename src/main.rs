//! gridstat - Sun Grid Engine job status
//!
//! One-shot job listing and deletion, or a long-running HTTP service backed
//! by a periodically refreshed qstat snapshot.

use anyhow::Context;
use clap::{Parser, Subcommand};
use gridstat::cache::SnapshotCache;
use gridstat::command::{GeneratedSource, Qdel, QstatRequest, QstatSource};
use gridstat::config::Config;
use gridstat::grid::{Job, JobInfo};
use gridstat::metrics::create_metrics;
use gridstat::server::{router, spawn_metrics_updater, AppState, JobQuery};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Interval at which snapshot gauges are refreshed
const METRICS_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// gridstat - Sun Grid Engine job status
#[derive(Parser, Debug)]
#[command(name = "gridstat")]
#[command(author, version, about = "Sun Grid Engine job status", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,

    /// Enable debug logging for qstat/qdel invocations
    #[arg(long)]
    debug_commands: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run qstat once and print the matching jobs
    Jobs {
        /// Ask qstat for this user's jobs only (default: all users)
        #[arg(long)]
        user: Option<String>,

        /// qstat state selector passed as `-s`
        #[arg(long)]
        state: Option<String>,

        /// qstat queue selector passed as `-q`
        #[arg(long)]
        queue: Option<String>,

        #[command(flatten)]
        query: JobQuery,

        /// Print JSON instead of one line per job
        #[arg(long)]
        json: bool,
    },

    /// Delete jobs with qdel
    Delete {
        /// Job ids to delete
        #[arg(long, value_delimiter = ',', required_unless_present = "owner", conflicts_with = "owner")]
        id: Vec<String>,

        /// Delete every job owned by these users
        #[arg(long, value_delimiter = ',')]
        owner: Vec<String>,
    },

    /// Serve cached job status over HTTP
    Serve {
        /// Server port (overrides GRIDSTAT_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before parsing args, so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs, args.debug_commands)?;

    let config = Config::from_env()?;
    if config.grid.test_mode {
        info!("Test mode enabled, using generated data instead of qstat/qdel");
    }

    match args.command {
        Command::Jobs {
            user,
            state,
            queue,
            query,
            json,
        } => {
            let request = QstatRequest {
                user,
                state,
                queue,
                extra: Vec::new(),
            };
            list_jobs(&config, request, &query, json).await
        }
        Command::Delete { id, owner } => delete_jobs(&config, &id, &owner).await,
        Command::Serve { port } => serve(config, port).await,
    }
}

async fn list_jobs(
    config: &Config,
    request: QstatRequest,
    query: &JobQuery,
    json: bool,
) -> anyhow::Result<()> {
    let filter = query.to_filter()?;

    let info = if config.grid.test_mode {
        GeneratedSource::new().generate()
    } else {
        QstatSource::new(&config.grid.qstat_path, config.grid.qstat_timeout)
            .with_request(request)
            .job_info()
            .await
            .context("qstat failed")?
    };

    let jobs = info.jobs().filter(filter);
    info!(jobs = jobs.len(), "Jobs matched");

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
    } else {
        for job in jobs.iter() {
            println!("{}", describe(job));
        }
    }

    Ok(())
}

fn describe(job: &Job) -> String {
    let number = match job.tasks.as_ref().and_then(|t| t.task_id) {
        Some(task) => format!("{}.{}", job.job_number, task),
        None => job.job_number.to_string(),
    };
    format!("{}\t{}\t{}\t{}", number, job.state, job.owner, job.name)
}

async fn delete_jobs(config: &Config, ids: &[String], owners: &[String]) -> anyhow::Result<()> {
    let qdel = Qdel::new(&config.grid.qdel_path, config.grid.qdel_timeout)
        .dry_run(config.grid.test_mode);

    let output = if owners.is_empty() {
        qdel.delete_jobs_by_id(ids).await
    } else {
        qdel.delete_jobs_by_owner(owners).await
    }
    .context("qdel failed")?;

    if !output.trim().is_empty() {
        println!("{}", output.trim_end());
    }

    Ok(())
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    info!("Starting gridstat v{}", env!("CARGO_PKG_VERSION"));

    let metrics = create_metrics().context("Failed to register metrics")?;
    let cache_config = config.to_cache_config();

    let cache: SnapshotCache<JobInfo> = if config.grid.test_mode {
        SnapshotCache::start_with_metrics(GeneratedSource::new(), cache_config, metrics.clone())
    } else {
        let source = QstatSource::new(&config.grid.qstat_path, config.grid.qstat_timeout);
        SnapshotCache::start_with_metrics(source, cache_config, metrics.clone())
    };
    let cache = Arc::new(cache);

    if cache.wait_for_snapshot(config.cache.request_timeout).await {
        info!("Initial snapshot ready");
    } else {
        warn!("No snapshot yet, serving empty data until the first refresh succeeds");
    }

    let updater = spawn_metrics_updater(cache.clone(), metrics.clone(), METRICS_UPDATE_INTERVAL);

    let app = router(AppState {
        cache: cache.clone(),
        metrics,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.server.port)));
    info!(
        "Listening on http://{} (Jobs: /jobs, Hosts: /hosts, Metrics: /metrics, Health: /health)",
        addr
    );

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
        }
        info!("Shutdown signal received, initiating graceful shutdown...");
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    cache.stop().await;
    updater.abort();

    info!("gridstat shutdown complete");
    Ok(())
}

fn init_logging(level: &str, json: bool, debug_commands: bool) -> anyhow::Result<()> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);

    // Build filter: set gridstat to requested level, and optionally enable command debugging
    let filter = if debug_commands {
        EnvFilter::new(format!(
            "gridstat={},gridstat::command=debug,tower_http=debug,hyper=warn",
            level
        ))
    } else {
        EnvFilter::new(format!("gridstat={},tower_http=info,hyper=warn", level))
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init();
    }

    Ok(())
}
