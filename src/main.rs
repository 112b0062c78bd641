use anyhow::Result;
use clap::Parser;
use onnx_classifier::{config::Config, web::serve};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onnx-classifier")]
#[command(about = "ONNX-powered single-image classification service")]
struct Args {
    /// Server bind address
    #[arg(long, env = "CLASSIFIER_BIND", default_value = "0.0.0.0:5000")]
    bind: String,

    /// Path to the ONNX model
    #[arg(long, env = "CLASSIFIER_MODEL", default_value = "my_model/butterfly_model.onnx")]
    model: PathBuf,

    /// Path to the model manifest (defaults to the model path with a .json extension)
    #[arg(long, env = "CLASSIFIER_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Label file, one class name per line (defaults to the built-in butterfly labels)
    #[arg(long, env = "CLASSIFIER_LABELS")]
    labels: Option<PathBuf>,

    /// Directory where uploaded images are staged
    #[arg(long, env = "CLASSIFIER_UPLOAD_DIR", default_value = "static/images")]
    upload_dir: PathBuf,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

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

    tracing::info!("Starting ONNX classification service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model path: {}", args.model.display());

    // 创建配置
    let config = Config::new(
        args.bind,
        args.model,
        args.manifest,
        args.labels,
        args.upload_dir,
        args.workers,
        args.dev,
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    // 启动服务器
    runtime.block_on(serve(config))?;

    Ok(())
}
