//! modelfall - provider request routing with same-provider model fallback
//!
//! Generates text from Gemini or Mistral from the command line, or serves
//! the same router over HTTP.

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelfall::config::{Config, KeySource};
use modelfall::provider::Adapters;
use modelfall::router::{self, Provider};
use modelfall::{extract_array, ApiKey, GenerationRequest, Generator};

const DEFAULT_CONFIG_PATH: &str = "modelfall.toml";

#[derive(Parser)]
#[command(name = "modelfall")]
#[command(about = "Generate with Gemini or Mistral, falling back through each provider's models")]
#[command(version)]
struct Cli {
    /// Path to configuration file (optional when using the default path)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Run one generation and print the output
    Generate {
        /// Model selection, e.g. "gemini", "gemini-2.0-flash", "mistral-small"
        #[arg(short, long)]
        model: String,

        /// Prompt text
        #[arg(short, long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the prompt from a file
        #[arg(long)]
        prompt_file: Option<String>,

        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,

        /// API key (defaults to the configured or MODELFALL_<PROVIDER>_API_KEY key)
        #[arg(long)]
        api_key: Option<String>,

        /// Print the extracted JSON array instead of raw text
        #[arg(long)]
        extract: bool,
    },

    /// List providers and their fallback catalogs
    Models,

    /// Validate configuration file
    Check,
}

/// Load the config file, tolerating a missing file at the default path.
fn load_config(path: &str) -> anyhow::Result<(Config, Vec<(Provider, KeySource)>)> {
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        return Ok(Config::parse_str_with_env("")?);
    }
    Config::from_file_with_env(path).with_context(|| format!("loading config '{}'", path))
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("modelfall={},tower_http={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (mut config, key_sources) = load_config(&cli.config)?;

    init_tracing(&config.logging.level);
    tracing::debug!(config = %cli.config, "Configuration loaded");

    match cli.command {
        Commands::Serve { listen } => {
            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }
            for (provider, source) in &key_sources {
                tracing::info!(provider = %provider, key_source = %source, "Provider key");
            }
            modelfall::server::run_server(config).await
        }

        Commands::Generate {
            model,
            prompt,
            prompt_file,
            system,
            api_key,
            extract,
        } => {
            let prompt = match (prompt, prompt_file) {
                (Some(p), _) => p,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading prompt file '{}'", path))?,
                (None, None) => anyhow::bail!("either --prompt or --prompt-file is required"),
            };

            let provider = router::resolve_provider(&model)
                .ok_or_else(|| anyhow::anyhow!("unsupported provider in selection '{}'", model))?;
            let api_key = api_key
                .map(ApiKey::from)
                .or_else(|| config.providers.api_key(provider).cloned())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "no API key for {}: pass --api-key or set {}",
                        provider,
                        modelfall::config::convention_env_var_name(provider)
                    )
                })?;

            let client = config.http.build_client()?;
            let generator = Generator::new(Adapters::new(client, &config), &config.fallback);

            let mut request = GenerationRequest::new(prompt);
            request.system_prompt = system;

            let generation = generator.generate(&model, api_key, &request).await?;
            tracing::info!(
                provider = %generation.provider,
                model = %generation.model,
                fallbacks = generation.attempts.len(),
                "Generation complete"
            );

            if extract {
                let items = extract_array(&generation.text)?;
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                println!("{}", generation.text);
            }
            Ok(())
        }

        Commands::Models => {
            for provider in Provider::ALL {
                println!("{}:", provider);
                for (i, model) in provider.catalog().iter().enumerate() {
                    println!("  {}. {}", i + 1, model);
                }
            }
            Ok(())
        }

        Commands::Check => {
            println!("Configuration OK ({})", cli.config);
            println!("  listen: {}", config.server.listen);
            println!(
                "  fallback: backoff {}ms, deadline {}, strict models {}",
                config.fallback.backoff_ms,
                config
                    .fallback
                    .deadline_secs
                    .map(|s| format!("{}s", s))
                    .unwrap_or_else(|| "none".to_string()),
                config.fallback.strict_models
            );
            for (provider, source) in &key_sources {
                println!(
                    "  {}: {} (key: {})",
                    provider,
                    config.providers.base_url(*provider),
                    source
                );
            }
            Ok(())
        }
    }
}
