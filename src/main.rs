use anyhow::{Context, Result};
use clap::Parser;
use ocr_api::{config::Config, web::serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ocr-api")]
#[command(about = "OCR and speech transcription HTTP service")]
struct Args {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind: String,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Model directory path
    #[arg(long, env = "MODELS_DIR", default_value = "models")]
    models_dir: String,

    /// OCR language used when a request does not specify one
    #[arg(long, env = "OCR_DEFAULT_LANG", default_value = "pt")]
    default_lang: String,

    /// OpenAI-compatible transcription backend
    #[arg(long, env = "WHISPER_URL", default_value = "http://127.0.0.1:9000")]
    whisper_url: String,

    /// Whisper model name passed to the backend
    #[arg(long, env = "WHISPER_MODEL", default_value = "base")]
    whisper_model: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting OCR API service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Models directory: {}", args.models_dir);

    let config = Config::new(args.bind, args.models_dir, args.workers, args.dev)?
        .with_default_lang(&args.default_lang)
        .with_whisper(args.whisper_url, args.whisper_model);

    tracing::info!(
        "Default OCR language: {}, workers: {}, whisper backend: {}",
        config.default_lang,
        config.workers,
        config.whisper_config.base_url
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(serve(config))?;

    Ok(())
}
