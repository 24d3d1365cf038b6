use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pixcache::application::{RenderImageUseCase, RenderRequest, RenderResponse};
use pixcache::infrastructure::ImageTransformer;
use pixcache::infrastructure::config::{
    AppConfig, CliArgs, Command, ConfigLoader, RenderArgs, TransformArgs,
};

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", pixcache::NAME, config.log_level)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = ConfigLoader::new()
        .load_config(args.config.as_deref())
        .wrap_err("failed to load configuration")?;
    config.merge_with_args(args);
    Ok(config)
}

fn request_for(args: &TransformArgs) -> RenderRequest {
    RenderRequest::new(&args.source, args.overrides()).with_format(args.format_preference())
}

async fn render(transformer: ImageTransformer, args: RenderArgs) -> Result<()> {
    let mut request = request_for(&args.transform);
    if args.stream {
        request = request.streamed();
    }

    let use_case = RenderImageUseCase::new(transformer.clone());
    let response = use_case
        .execute(request)
        .await
        .wrap_err_with(|| format!("failed to render {}", args.transform.source.display()))?;

    let mut out: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .wrap_err_with(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    debug!(content_type = response.content_type(), "Writing output");

    match response {
        RenderResponse::Buffered(image) => out.write_all(&image.bytes).await?,
        RenderResponse::Streamed(mut stream) => {
            while let Some(chunk) = stream.next().await {
                out.write_all(&chunk?).await?;
            }
        }
    }
    out.flush().await?;

    transformer.flush_pending_writes().await;
    Ok(())
}

fn print_key(transformer: &ImageTransformer, args: &TransformArgs) {
    let overrides = RenderImageUseCase::effective_overrides(&request_for(args));
    let key = transformer.key_for(&args.source, &overrides);
    println!("{key}");
    println!("{}", transformer.entry_path(&args.source, &overrides).display());
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config);

    info!(
        version = pixcache::VERSION,
        cache_dir = %config.cache_dir.display(),
        "Starting pixcache"
    );

    let transformer =
        ImageTransformer::with_cache_dir(config.transformer_config(), config.cache_dir.clone());

    match args.command {
        Command::Render(render_args) => render(transformer, render_args).await,
        Command::Key(transform_args) => {
            print_key(&transformer, &transform_args);
            Ok(())
        }
    }
}
