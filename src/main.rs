use clap::Parser;
use receiptx_api::RestApi;
use receiptx_core::{Embedder, HashingEmbedder, DEFAULT_MAX_QUANTITY};
use receiptx_pipeline::{
    HttpEmbedder, HttpOcrEngine, ImageCrateLoader, JsonFileProductStore, LlmStructuredParser, PipelineConfig,
    ReceiptPipeline,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Receipt OCR reconciliation service
#[derive(Parser, Debug)]
#[command(name = "receiptx")]
#[command(about = "Reconciles scanned receipts against a user's product catalog", long_about = None)]
struct Args {
    /// HTTP API port
    #[arg(long, env = "RECEIPTX_HTTP_PORT", default_value_t = 8080)]
    http_port: u16,

    /// JSON file holding every user's catalog
    #[arg(long, env = "RECEIPTX_CATALOG", default_value = "./data/catalog.json")]
    catalog: PathBuf,

    /// OCR sidecar endpoint
    #[arg(long, env = "RECEIPTX_OCR_URL", default_value = "http://localhost:8866/ocr")]
    ocr_url: String,

    /// OpenAI-compatible base URL for the structured parser
    #[arg(long, env = "RECEIPTX_LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    #[arg(long, env = "RECEIPTX_LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    #[arg(long, env = "RECEIPTX_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// OpenAI-compatible base URL for embeddings
    #[arg(long, env = "RECEIPTX_EMBEDDING_BASE_URL", default_value = "https://api.openai.com/v1")]
    embedding_base_url: String,

    #[arg(long, env = "RECEIPTX_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Must match the dimension of the catalog embeddings
    #[arg(long, env = "RECEIPTX_EMBEDDING_DIM", default_value_t = 1536)]
    embedding_dim: usize,

    #[arg(long, env = "RECEIPTX_EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Use the offline trigram hashing embedder instead of the HTTP one
    #[arg(long, env = "RECEIPTX_HASHING_EMBEDDER")]
    hashing_embedder: bool,

    /// Upper bound on one receipt run, in seconds
    #[arg(long, env = "RECEIPTX_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Largest quantity accepted for a single line item
    #[arg(long, env = "RECEIPTX_MAX_QUANTITY", default_value_t = DEFAULT_MAX_QUANTITY)]
    max_quantity: f64,

    /// Log level, overridden by RUST_LOG
    #[arg(long, env = "RECEIPTX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Process this image once and print the result instead of serving
    #[arg(long, requires = "user_id")]
    image: Option<PathBuf>,

    /// Owner of the catalog used in one-shot mode
    #[arg(long)]
    user_id: Option<String>,
}

fn build_pipeline(args: &Args) -> anyhow::Result<ReceiptPipeline> {
    let mut parser = LlmStructuredParser::new(&args.llm_base_url, &args.llm_model);
    if let Some(key) = &args.llm_api_key {
        parser = parser.with_api_key(key);
    }

    let embedder: Arc<dyn Embedder> = if args.hashing_embedder {
        Arc::new(HashingEmbedder::default())
    } else {
        let mut embedder = HttpEmbedder::new(&args.embedding_base_url, &args.embedding_model, args.embedding_dim);
        if let Some(key) = &args.embedding_api_key {
            embedder = embedder.with_api_key(key);
        }
        Arc::new(embedder)
    };

    let config = PipelineConfig {
        timeout: Duration::from_secs(args.timeout_secs),
        max_quantity: args.max_quantity,
    };

    let pipeline = ReceiptPipeline::builder()
        .image_loader(Arc::new(ImageCrateLoader::new()))
        .ocr(Arc::new(HttpOcrEngine::new(&args.ocr_url)))
        .parser(Arc::new(parser))
        .embedder(embedder)
        .store(Arc::new(JsonFileProductStore::new(&args.catalog)))
        .config(config)
        .build()?;
    Ok(pipeline)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting receiptx v{}", env!("CARGO_PKG_VERSION"));
    let embedder_kind = if args.hashing_embedder { "hashing" } else { "http" };
    info!(catalog = %args.catalog.display(), embedder = embedder_kind, "Configuration loaded");

    let pipeline = Arc::new(build_pipeline(&args)?);

    if let (Some(image), Some(user_id)) = (&args.image, &args.user_id) {
        let bytes = tokio::fs::read(image).await?;
        let envelope = pipeline.process_receipt(&bytes, user_id).await;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    let http_port = args.http_port;
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on port {}", http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(pipeline, http_port).await {
                tracing::error!(error = %e, "HTTP server error");
            }
        })
    });

    info!("HTTP API: http://localhost:{}/receipts", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
