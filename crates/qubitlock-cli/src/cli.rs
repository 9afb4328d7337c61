use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use qubitlock_core::{
    ContentPipeline, EncryptOptions, LocalFileRepository, QubitLockConfig, TransitClient,
    DEFAULT_LIST_LIMIT,
};

type Pipeline = ContentPipeline<TransitClient, LocalFileRepository>;

#[derive(Parser)]
#[command(name = "qubitlock")]
#[command(about = "QubitLock secure content storage", long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, default_value = "qubitlock.toml", env = "QUBITLOCK_CONFIG")]
    pub config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compress, encrypt and store a file; prints its metadata
    Store {
        file: PathBuf,
        /// Store under this name instead of the file's own
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        no_compression: bool,
        #[arg(long)]
        no_integrity: bool,
    },
    /// Fetch, verify and decrypt a file
    Retrieve {
        id: String,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check stored ciphertext against its integrity root
    Verify { id: String },
    /// List stored files, oldest first
    List {
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
    /// Remove a stored file
    Delete { id: String },
    /// Probe the encryption service
    Health,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = load_config(&self.config)?;
        let pipeline = build_pipeline(&config).await?;

        match self.command {
            Command::Store {
                ref file,
                ref name,
                no_compression,
                no_integrity,
            } => {
                let options = EncryptOptions {
                    enable_compression: !no_compression,
                    enable_integrity: !no_integrity,
                    ..Default::default()
                };
                store(&pipeline, file, name.as_deref(), &options).await
            }
            Command::Retrieve { ref id, ref output } => {
                retrieve(&pipeline, id, output.as_deref()).await
            }
            Command::Verify { ref id } => verify(&pipeline, id).await,
            Command::List { limit, offset } => list(&pipeline, limit, offset).await,
            Command::Delete { ref id } => delete(&pipeline, id).await,
            Command::Health => health(&pipeline).await,
        }
    }
}

fn load_config(path: &Path) -> Result<QubitLockConfig> {
    let config = if path.exists() {
        QubitLockConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?
    } else {
        tracing::warn!("Config file not found, using defaults: {}", path.display());
        QubitLockConfig::default()
    };
    Ok(config.apply_env())
}

async fn build_pipeline(config: &QubitLockConfig) -> Result<Pipeline> {
    let gateway = TransitClient::new(&config.vault).context("building transit client")?;
    let repository = LocalFileRepository::new(&config.storage.root)
        .await
        .with_context(|| format!("opening storage at {}", config.storage.root.display()))?;
    Ok(ContentPipeline::new(
        config.pipeline(),
        Arc::new(gateway),
        Arc::new(repository),
    ))
}

async fn store(
    pipeline: &Pipeline,
    file: &Path,
    name: Option<&str>,
    options: &EncryptOptions,
) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let file_name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let metadata = pipeline.store(&data, &file_name, options).await?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

async fn retrieve(pipeline: &Pipeline, id: &str, output: Option<&Path>) -> Result<()> {
    let data = pipeline.retrieve(id).await?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => std::io::stdout().lock().write_all(&data)?,
    }
    Ok(())
}

async fn verify(pipeline: &Pipeline, id: &str) -> Result<()> {
    if !pipeline.verify(id).await? {
        bail!("File {} FAILED integrity verification", id);
    }
    println!("File {} intact", id);
    Ok(())
}

async fn list(pipeline: &Pipeline, limit: usize, offset: usize) -> Result<()> {
    let files = pipeline.list(limit, offset).await?;
    println!("{:<36}  {:>12}  {:<25}  {}", "ID", "SIZE", "UPLOADED", "NAME");
    for file in files {
        println!(
            "{:<36}  {:>12}  {:<25}  {}",
            file.id,
            file.file_size,
            file.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC"),
            file.file_name
        );
    }
    Ok(())
}

async fn delete(pipeline: &Pipeline, id: &str) -> Result<()> {
    if pipeline.delete(id).await? {
        println!("Deleted {}", id);
    } else {
        println!("No file {}", id);
    }
    Ok(())
}

async fn health(pipeline: &Pipeline) -> Result<()> {
    let status = pipeline.health().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
