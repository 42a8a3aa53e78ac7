//! Lyric video worker binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lyric_media::{check_ffmpeg, check_ffprobe, FfmpegBackend};
use lyric_models::{JobId, JobStatus};
use lyric_storage::{NoopUploader, R2Client, R2Config, Uploader};
use lyric_worker::{metrics, RenderService, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "lyric-worker", version, about = "Render lyric videos from project files")]
struct Cli {
    /// Project JSON files (`background_url`, `audio_url`, `lyrics`).
    #[arg(required = true)]
    projects: Vec<PathBuf>,

    /// Output directory, created if missing. Overrides LYRIC_RENDER_DIR.
    #[arg(long)]
    render_dir: Option<PathBuf>,

    /// Concurrent renders. Overrides LYRIC_MAX_JOBS.
    #[arg(long)]
    max_jobs: Option<usize>,

    /// Status polling interval in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = WorkerConfig::from_env();
    if let Some(dir) = cli.render_dir {
        config.render_dir = dir;
    }
    if let Some(max_jobs) = cli.max_jobs {
        config.max_concurrent_jobs = max_jobs.max(1);
    }
    info!("Worker config: {:?}", config);

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid METRICS_ADDR {:?}", addr))?;
        metrics::init_metrics(addr).context("failed to start Prometheus exporter")?;
        info!("Prometheus metrics on http://{}/metrics", addr);
    }

    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    tokio::fs::create_dir_all(&config.render_dir)
        .await
        .with_context(|| format!("failed to create {}", config.render_dir.display()))?;

    let uploader: Arc<dyn Uploader> = if R2Config::is_configured() {
        let client = R2Client::from_env().await.context("invalid R2 configuration")?;
        info!("Uploading renders to R2 bucket {}", client.bucket());
        Arc::new(client)
    } else {
        Arc::new(NoopUploader)
    };

    let backend = Arc::new(FfmpegBackend::new(config.encoding_settings()));
    let service = RenderService::new(&config, backend, uploader)?;

    let mut submitted: Vec<JobId> = Vec::new();
    let mut rejected = 0usize;
    for path in &cli.projects {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) => {
                error!("Cannot read {}: {}", path.display(), e);
                rejected += 1;
                continue;
            }
        };

        match service.submit_json(&json) {
            Ok(response) => {
                info!(job_id = %response.job_id, "Submitted {}", path.display());
                submitted.push(response.job_id);
            }
            Err(e) => {
                error!("Rejected {}: {}", path.display(), e);
                rejected += 1;
            }
        }
    }

    let interval = Duration::from_millis(cli.poll_ms);
    for job_id in &submitted {
        let status = poll_until_terminal(&service, job_id, interval).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    let jobs = service.store().list();
    let failed = jobs
        .iter()
        .filter(|job| job.status == JobStatus::Failed)
        .count();
    info!(jobs = jobs.len(), failed, rejected, "Run finished");

    if failed + rejected > 0 {
        anyhow::bail!(
            "{} of {} projects did not render",
            failed + rejected,
            cli.projects.len()
        );
    }

    info!("All {} renders complete", submitted.len());
    Ok(())
}

async fn poll_until_terminal(
    service: &RenderService,
    job_id: &JobId,
    interval: Duration,
) -> anyhow::Result<lyric_models::JobStatusResponse> {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    let mut last_progress = None;

    loop {
        ticker.tick().await;
        let status = service.status(job_id)?;

        if last_progress != Some(status.progress) {
            info!(job_id = %job_id, progress = status.progress, "{}", status.message);
            last_progress = Some(status.progress);
        }

        if status.status.is_terminal() {
            if let Some(err) = &status.error {
                warn!(job_id = %job_id, "Render failed: {}", err);
            }
            return Ok(status);
        }
    }
}

// Colored output for dev, JSON for production
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("lyric_worker=info,lyric_media=info,lyric_storage=info")
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
