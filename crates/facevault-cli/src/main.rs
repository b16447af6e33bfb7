use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facevault_core::{
    encode_and_save_reported, EncodeRequest, Metadata, OnnxEmbedder, ScrfdDetector,
};
use facevault_store::SqliteStore;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;
mod metadata;
mod recognize;

use config::Config;

#[derive(Parser)]
#[command(
    name = "facevault",
    about = "Store face encodings from photos and recognize faces live"
)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/facevault/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode the face in a photo and save it under a name
    Encode {
        /// Path to the image file
        #[arg(long)]
        image: Option<PathBuf>,
        /// Name of the person
        #[arg(long)]
        name: Option<String>,
        /// Extra metadata as KEY=VALUE (repeatable)
        #[arg(long = "meta", value_parser = metadata::parse_pair)]
        meta: Vec<(String, serde_json::Value)>,
    },
    /// Run real-time recognition from the camera
    Recognize {
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<usize>,
    },
    /// Print stored records as JSON lines
    List,
    /// Print one stored record as JSON
    Show {
        /// Record id, as printed by `list`
        id: String,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::debug!(?config, "configuration resolved");

    match cli.command {
        Commands::Encode { image, name, meta } => {
            let (Some(image), Some(name)) = (image, name) else {
                println!("Error: --image and --name are required for encode mode");
                return Ok(ExitCode::from(2));
            };
            if run_encode(&config, &image, &name, metadata::collect(meta)) {
                println!("Successfully encoded and saved face for {name}");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("Failed to encode and save face");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Recognize { frames } => {
            if let Err(err) = recognize::run(&config, frames) {
                println!("Error running face recognition: {err:#}");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            let records = SqliteStore
                .load_all(&config.store_target())
                .context("reading stored records")?;
            for record in records {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { id } => {
            let record = SqliteStore
                .get(&config.store_target(), &id)
                .with_context(|| format!("reading record {id}"))?;
            match record {
                Some(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("No record with id {id}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Load the models and encode one photo. Every failure, including a missing
/// model, is logged and reported as `false`.
fn run_encode(config: &Config, image: &Path, name: &str, metadata: Option<Metadata>) -> bool {
    let mut detector = match ScrfdDetector::load(&config.detector_model_path()) {
        Ok(detector) => detector,
        Err(err) => {
            tracing::error!(error = %err, "failed to load face detector");
            return false;
        }
    };
    let mut embedder = match OnnxEmbedder::load(&config.encoder_model_path()) {
        Ok(embedder) => embedder,
        Err(err) => {
            tracing::error!(error = %err, "failed to load face encoder");
            return false;
        }
    };

    let target = config.store_target();
    let request = EncodeRequest {
        image_path: image,
        name,
        metadata,
        target: &target,
    };

    encode_and_save_reported(request, &mut detector, &mut embedder, &SqliteStore)
}
