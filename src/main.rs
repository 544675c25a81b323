use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use modelctl::config::Config;
use modelctl::error::{LifecycleError, Result};
use modelctl::models::inventory::{format_bytes, suggest};
use modelctl::models::{ModelManager, PROGRESS_SCALE};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modelctl")]
#[command(about = "Manage models on an Ollama-compatible registry", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/modelctl/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed models
    List,
    /// Show details of one model
    Info { name: String },
    /// Pull a model from the registry
    Pull { name: String },
    /// Delete a model
    Rm { name: String },
    /// Upload a local GGUF file as a new model
    Upload {
        file: PathBuf,
        /// Model name (default: lower-cased file stem)
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let manager = ModelManager::from_config(&config)?;

    let result = match cli.command {
        Commands::List => run_list(&manager).await,
        Commands::Info { name } => run_info(&manager, &name).await,
        Commands::Pull { name } => run_pull(&manager, &name).await,
        Commands::Rm { name } => run_rm(&manager, &name).await,
        Commands::Upload { file, name } => run_upload(&manager, file, name.as_deref()).await,
    };

    manager.shutdown().await;
    result
}

async fn run_list(manager: &ModelManager) -> Result<()> {
    let models = manager.list_models().await;
    if models.is_empty() {
        println!("No models installed (or registry unreachable, see log)");
        return Ok(());
    }

    println!("{:<40} {:>12}  {:<14} MODIFIED", "NAME", "SIZE", "DIGEST");
    for model in models {
        let digest: String = model
            .digest
            .trim_start_matches("sha256:")
            .chars()
            .take(12)
            .collect();
        println!(
            "{:<40} {:>12}  {:<14} {}",
            model.name,
            format_bytes(model.size),
            digest,
            model.modified_at
        );
    }
    Ok(())
}

async fn run_info(manager: &ModelManager, name: &str) -> Result<()> {
    match manager.get_model_info(name).await {
        Ok(model) => {
            let json = serde_json::to_string_pretty(&model)
                .map_err(|e| LifecycleError::Other(format!("Failed to render model: {e}")))?;
            println!("{json}");
            Ok(())
        }
        Err(LifecycleError::NotFound(msg)) => {
            let models = manager.list_models().await;
            match suggest(name, &models) {
                Some(close) => Err(LifecycleError::NotFound(format!(
                    "{msg}. Did you mean '{close}'?"
                ))),
                None => Err(LifecycleError::NotFound(msg)),
            }
        }
        Err(e) => Err(e),
    }
}

async fn run_pull(manager: &ModelManager, name: &str) -> Result<()> {
    let handle = manager.pull_model(name).await?;

    let bar = ProgressBar::new(u64::from(PROGRESS_SCALE));
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(handle.clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                manager.cancel_model_pull(&handle).await?;
                bar.abandon_with_message(format!("{handle}: cancelled"));
                return Ok(());
            }
            _ = ticker.tick() => {
                let progress = manager.get_download_progress(&handle).await?;
                bar.set_position(u64::from(progress.pull_progress));

                if !progress.done {
                    continue;
                }
                return match progress.error {
                    Some(e) => {
                        bar.abandon_with_message(format!("{handle}: failed"));
                        Err(LifecycleError::Other(format!("Pull of '{handle}' failed: {e}")))
                    }
                    None => {
                        bar.finish_with_message(format!("{handle}: done"));
                        println!("✓ Pulled '{handle}'");
                        Ok(())
                    }
                };
            }
        }
    }
}

async fn run_rm(manager: &ModelManager, name: &str) -> Result<()> {
    if manager.delete_model(name).await? {
        println!("✓ Removed model '{name}'");
        Ok(())
    } else {
        Err(LifecycleError::NotFound(format!("Model '{name}' is not installed")))
    }
}

async fn run_upload(manager: &ModelManager, file: PathBuf, name: Option<&str>) -> Result<()> {
    let filename = file.to_string_lossy().into_owned();
    let content = tokio::fs::read(&file).await?;
    println!("Uploading {} ({})...", file.display(), format_bytes(content.len() as u64));

    let model = manager.upload_model(content, &filename, name).await?;
    println!("✓ Created model '{model}'");
    Ok(())
}
