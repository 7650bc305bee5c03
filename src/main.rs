use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use media_chat::app::App;
use media_chat::models::{
    ChatOutcome, ChatRequest, Config, GenerationSettings, MediaKind, ModelChoice, Upload,
    MAX_OUTPUT_TOKENS, TEMPERATURE, TOP_P,
};
use media_chat::server;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "media-chat")]
#[command(about = "Chat with PDFs, images, video and audio using Gemini")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the chat page and API.
    Serve {
        /// Address to listen on. Overrides BIND_ADDR.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a single chat request from the command line.
    Ask {
        #[arg(long, value_enum)]
        media: MediaKind,
        #[arg(long, value_enum, default_value_t = ModelChoice::default())]
        model: ModelChoice,
        #[arg(long, default_value_t = TEMPERATURE.default)]
        temperature: f32,
        #[arg(long, default_value_t = TOP_P.default)]
        top_p: f32,
        #[arg(long, default_value_t = MAX_OUTPUT_TOKENS.default)]
        max_tokens: u32,
        /// Falls back to GEMINI_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, shutting down");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

async fn read_uploads(files: &[PathBuf]) -> Result<Vec<Upload>> {
    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        uploads.push(Upload::new(file_name, bytes));
    }
    Ok(uploads)
}

fn print_outcome(outcome: &ChatOutcome) {
    if let Some(count) = outcome.token_count {
        println!("Token count: {}", count);
    }
    if let Some(text) = &outcome.text {
        println!("{}", text);
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let mut config = Config::from_env().context("Failed to load configuration")?;

    match args.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            let app = Arc::new(App::new(&config)?);
            cancel_on_ctrl_c(app.shutdown_token());
            server::serve(app, &config.bind_addr, config.max_upload_bytes).await?;
        }
        Command::Ask {
            media,
            model,
            temperature,
            top_p,
            max_tokens,
            api_key,
            prompt,
            files,
        } => {
            let app = App::new(&config)?;
            cancel_on_ctrl_c(app.shutdown_token());

            let mut request = ChatRequest::new(media)
                .with_model(model)
                .with_settings(GenerationSettings::new(temperature, top_p, max_tokens));
            request.api_key = api_key;
            request.prompt = prompt;
            request.uploads = read_uploads(&files).await?;

            let outcome = app.run(request).await?;
            print_outcome(&outcome);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting media-chat");

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("media-chat failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
