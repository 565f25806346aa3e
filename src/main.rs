//! lead-intake: command line entry point
//!
//! `serve` runs the HTTP desk, `process` runs a single message through the
//! pipeline and prints the lead card.

use lead_intake::config::DeskConfig;
use lead_intake::desk::LeadDesk;
use lead_intake::health::{HealthCheckManager, LlmProviderHealthCheck, ToolSystemHealthCheck};
use lead_intake::lead::{sample_lead, sample_leads, LeadCard};
use lead_intake::llm::provider::LlmProvider;
use lead_intake::observability::{init_logging_with_verbosity, metrics::metrics};
use lead_intake::pipeline::LeadPipeline;
use lead_intake::server::{self, ApiState};
use lead_intake::tools::builtin::configured_price_table;
use lead_intake::tools::ToolSystem;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["lead-intake.toml", "config/lead-intake.toml"];

/// Lead intake desk for local-service marketplaces
#[derive(Parser)]
#[command(name = "lead-intake")]
#[command(about = "Turn raw customer and provider messages into structured, answered leads")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP desk
    Serve,
    /// Process one message and print the lead card
    Process {
        /// Lead name shown on the card
        #[arg(long, requires = "message")]
        name: Option<String>,
        /// Raw message text
        #[arg(long, requires = "name")]
        message: Option<String>,
        /// Use a demo message instead (see `samples`)
        #[arg(long, conflicts_with_all = ["name", "message"])]
        sample: Option<usize>,
        /// Print the lead as JSON instead of a card
        #[arg(long)]
        json: bool,
    },
    /// List the demo messages
    Samples,
    /// Check provider credentials and tool schemas
    Check,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging_with_verbosity(cli.verbose);

    if let Commands::Samples = cli.command {
        print_samples();
        return;
    }

    let config = match load_configuration(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => run_server(config).await,
        Commands::Process {
            name,
            message,
            sample,
            json,
        } => process_message(config, name, message, sample, json).await,
        Commands::Check => run_checks(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Samples => Ok(()),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: Option<&PathBuf>,
) -> Result<DeskConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(DeskConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(DeskConfig::load_from_file(&path)?);
        }
    }

    Err(format!(
        "No configuration file found. Provide one with -c/--config or create {}",
        DEFAULT_CONFIG_PATHS.join(" or ")
    )
    .into())
}

/// Provider factory for creating LLM providers from configuration
struct LlmProviderFactory;

impl LlmProviderFactory {
    fn create_provider(
        config: &DeskConfig,
    ) -> Result<Arc<dyn LlmProvider>, Box<dyn std::error::Error>> {
        use lead_intake::llm::providers::{
            GeminiConfig, GeminiProvider, OpenAiConfig, OpenAiProvider,
        };

        let api_key = config.get_llm_api_key()?;
        let timeout = Duration::from_secs(config.llm.timeout_secs);
        let base_url = config
            .llm
            .base_url
            .as_ref()
            .map(|url| url.trim_end_matches('/').to_string());

        match config.llm.provider.as_str() {
            "gemini" => {
                let defaults = GeminiConfig::default();
                let provider = GeminiProvider::new(GeminiConfig {
                    api_key,
                    base_url: base_url.unwrap_or(defaults.base_url),
                    timeout,
                })?;
                Ok(Arc::new(provider))
            }
            "openai" => {
                let defaults = OpenAiConfig::default();
                let provider = OpenAiProvider::new(OpenAiConfig {
                    api_key,
                    base_url: base_url.unwrap_or(defaults.base_url),
                    timeout,
                })?;
                Ok(Arc::new(provider))
            }
            provider => Err(format!("Unsupported LLM provider: {provider}").into()),
        }
    }
}

/// Everything a command needs, wired from configuration
struct Components {
    desk: LeadDesk,
    llm_provider: Arc<dyn LlmProvider>,
    tool_system: Arc<ToolSystem>,
}

async fn build_components(config: &DeskConfig) -> Result<Components, Box<dyn std::error::Error>> {
    let llm_provider = LlmProviderFactory::create_provider(config)?;

    let mut tool_system = ToolSystem::new();
    tool_system.initialize(&config.tools).await?;
    let tool_system = Arc::new(tool_system);
    info!(tools = ?tool_system.list_tools(), "Tools ready");

    let pipeline = LeadPipeline::new(llm_provider.clone(), tool_system.clone(), config);
    let desk = LeadDesk::new(
        Arc::new(pipeline),
        config.followup.clone(),
        configured_price_table(&config.tools)?,
    );

    Ok(Components {
        desk,
        llm_provider,
        tool_system,
    })
}

fn health_checks(components: &Components) -> HealthCheckManager {
    let mut manager = HealthCheckManager::new();
    manager.add_health_check(Box::new(LlmProviderHealthCheck::new(
        components.llm_provider.clone(),
    )));
    manager.add_health_check(Box::new(ToolSystemHealthCheck::new(
        components.tool_system.clone(),
    )));
    manager
}

async fn run_server(config: DeskConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        desk_id = %config.desk.id,
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Starting lead-intake v{}",
        env!("CARGO_PKG_VERSION")
    );
    metrics().set_desk_state("initializing");

    let components = build_components(&config).await?;
    let health = health_checks(&components);
    let state = ApiState::new(components.desk, health, config.desk.id.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server_port())
        .parse()
        .map_err(|e| format!("Invalid bind address: {e}"))?;

    server::serve(state, addr).await?;
    Ok(())
}

async fn process_message(
    config: DeskConfig,
    name: Option<String>,
    message: Option<String>,
    sample: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (name, message) = match (sample, name, message) {
        (Some(index), _, _) => {
            let sample = sample_lead(index).ok_or_else(|| {
                format!(
                    "No sample #{index}; choose 0 to {}",
                    sample_leads().len().saturating_sub(1)
                )
            })?;
            (sample.name.to_string(), sample.message.to_string())
        }
        (None, Some(name), Some(message)) => (name, message),
        _ => return Err("Provide --name and --message, or --sample N".into()),
    };

    let components = build_components(&config).await?;
    let lead = components.desk.submit(&name, &message).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&lead)?);
    } else {
        println!("{}", LeadCard(&lead));
    }

    match lead.error() {
        Some(error) => Err(format!("Lead processing failed: {error}").into()),
        None => Ok(()),
    }
}

async fn run_checks(config: DeskConfig) -> Result<(), Box<dyn std::error::Error>> {
    let components = build_components(&config).await?;
    let results = health_checks(&components).run_health_checks().await;

    for result in &results {
        let mark = if result.healthy { "ok  " } else { "FAIL" };
        println!(
            "[{mark}] {:<14} {} ({} ms)",
            result.component,
            result.message.as_deref().unwrap_or(""),
            result.response_time_ms.unwrap_or(0)
        );
    }

    if HealthCheckManager::overall_health(&results) {
        Ok(())
    } else {
        Err("One or more health checks failed".into())
    }
}

fn handle_config_command(config: &DeskConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    if !config.has_llm_api_key() {
        println!(
            "Warning: environment variable {} is not set",
            config.llm.api_key_env
        );
    }

    info!("Configuration validation complete");
    Ok(())
}

fn print_samples() {
    for (index, sample) in sample_leads().iter().enumerate() {
        println!("[{index}] {} ({})", sample.name, sample.kind);
        println!("    {}", sample.message);
    }
}
