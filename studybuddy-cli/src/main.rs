mod ask;
mod doctor;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use studybuddy::ConfigManager;

#[derive(Parser)]
#[command(name = "studybuddy", version, about = "Study buddy for young learners")]
struct Cli {
    /// Config file (default: ~/.studybuddy/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question, optionally with a photo of the problem
    Ask(ask::AskArgs),

    /// List models from the live catalog (flash models first)
    Models,

    /// Probe every candidate model and show which one would be used
    Doctor,

    /// List the subjects of the current persona
    Subjects,

    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration (API key masked)
    Show,

    /// Store the API key (empty string clears it)
    SetKey { key: String },

    /// Replace the candidate model list, in probe order
    SetModels {
        #[arg(required = true)]
        models: Vec<String>,
    },

    /// Build candidates from the live catalog instead of the configured list
    UseCatalog {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studybuddy=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let manager = match cli.config {
        Some(path) => ConfigManager::new(path),
        None => ConfigManager::default_path(),
    };

    match cli.command {
        Commands::Ask(args) => {
            ask::run_ask(&manager, args).await?;
        }
        Commands::Models => {
            doctor::run_models(&manager).await?;
        }
        Commands::Doctor => {
            doctor::run_doctor(&manager).await?;
        }
        Commands::Subjects => {
            let config = manager.load()?;
            for (i, subject) in config.persona.subjects.iter().enumerate() {
                println!("{}. {}", i + 1, subject);
            }
        }
        Commands::Config { action } => run_config(&manager, action)?,
    }

    Ok(())
}

fn run_config(manager: &ConfigManager, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let mut config = manager.load()?;
            config.api_key = config.api_key.as_deref().map(mask_key);
            println!("# {}", manager.path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::SetKey { key } => {
            manager.set_api_key(&key)?;
            println!("API key saved to {}", manager.path().display());
        }
        ConfigAction::SetModels { models } => {
            manager.set_candidate_models(&models)?;
            println!("Candidate models: {}", manager.load()?.candidate_models.join(", "));
        }
        ConfigAction::UseCatalog { enabled } => {
            manager.set_use_catalog(enabled)?;
            println!("use_catalog = {}", enabled);
        }
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let shown: String = key.chars().take(4).collect();
    format!("{}…", shown)
}
