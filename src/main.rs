use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use voice_emotion::config::Config;
use voice_emotion::model::Artifacts;
use voice_emotion::pipeline::EmotionPipeline;
use voice_emotion::server;

/// Speech emotion recognition from WAV recordings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (defaults to ~/.voiceemotion/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the XGBoost JSON model
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// Path to the JSON label encoder
    #[arg(short, long, global = true)]
    encoder: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload page and prediction API (default)
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8501
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Classify a single WAV file and print the result
    Predict {
        /// WAV file to classify
        wav: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    debug!("Config: {:?}", config);

    // CLI flags win over the config file
    if let Some(model) = args.model {
        config.model_path = Some(model);
    }
    if let Some(encoder) = args.encoder {
        config.encoder_path = Some(encoder);
    }

    let model_path = config.get_model_path()?;
    let encoder_path = config.get_encoder_path()?;
    let artifacts = Artifacts::load(&model_path, &encoder_path)
        .context("Failed to load model artifacts")?;

    let pipeline = EmotionPipeline::new(config.mfcc.clone(), artifacts)
        .context("Model does not match the feature extractor")?;

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let bind_addr = bind.unwrap_or(config.bind_addr);
            info!("Voice emotion server starting...");
            server::serve(Arc::new(pipeline), &bind_addr, config.max_upload_bytes).await?;
        }
        Command::Predict { wav } => predict_file(&pipeline, &wav)?,
    }

    Ok(())
}

fn predict_file(pipeline: &EmotionPipeline, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;

    let prediction = pipeline
        .run(&bytes)
        .with_context(|| format!("Could not process the audio file {:?}", path))?;

    println!("{}", prediction.headline());
    for entry in &prediction.probabilities {
        println!("  {:<10} {:>5.1}%", entry.label, entry.percent);
    }
    Ok(())
}
