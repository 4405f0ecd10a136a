use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use mission_control::clock::SystemClock;
use mission_control::config::Config;
use mission_control::logging;
use mission_control::rest::{self, ApiDoc, ApiState};
use mission_control::services::HeartbeatReporter;
use mission_control::status::{StatusRegistry, DAEMON_HEALTH_KEY, OFFLINE, ONLINE};
use mission_control::store::MemoryStore;
use mission_control::types::{Activity, InstanceStatus};
use mission_control::workflow::{load_definition_file, load_definitions_dir, WorkflowCoordinator};

#[derive(Parser)]
#[command(name = "mission-control")]
#[command(about = "Workflow orchestration and derived status for agent teams")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on (default: 7008)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Report daemon health to a running server
    Heartbeat {
        /// Base URL of the API server
        #[arg(long)]
        url: Option<String>,

        /// Send a single report and exit
        #[arg(long)]
        once: bool,
    },

    /// Show system status readings
    Status {
        /// Only show this key
        #[arg(short, long)]
        key: Option<String>,
    },

    /// List workflow templates
    Templates,

    /// Create a workflow template from a YAML or JSON file
    Import {
        /// Template definition file
        file: PathBuf,
    },

    /// List workflow instances
    Instances {
        /// Filter by status (active, running, paused_for_review, completed, cancelled)
        #[arg(short, long)]
        status: Option<InstanceStatus>,
    },

    /// List agents and their derived activity
    Agents,

    /// Print the OpenAPI document
    Openapi {
        /// Emit YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let is_server_mode = matches!(cli.command, Commands::Serve { .. });
    let logging_handle = logging::init_logging(&config, is_server_mode, cli.debug)?;

    match cli.command {
        Commands::Serve { port } => {
            cmd_serve(config, port, logging_handle.log_file_path).await?;
        }
        Commands::Heartbeat { url, once } => {
            cmd_heartbeat(&config, url, once).await?;
        }
        Commands::Status { key } => {
            cmd_status(&config, key).await?;
        }
        Commands::Templates => {
            cmd_templates(&config).await?;
        }
        Commands::Import { file } => {
            cmd_import(&config, &file).await?;
        }
        Commands::Instances { status } => {
            cmd_instances(&config, status).await?;
        }
        Commands::Agents => {
            cmd_agents(&config).await?;
        }
        Commands::Openapi { yaml } => {
            let doc = if yaml { ApiDoc::yaml()? } else { ApiDoc::json()? };
            println!("{doc}");
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<MemoryStore>> {
    let path = config.store_path();
    let store = MemoryStore::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn cmd_serve(config: Config, port: Option<u16>, log_file_path: Option<PathBuf>) -> Result<()> {
    let port = port.unwrap_or(config.api.port);
    let store = open_store(&config)?;
    let clock = Arc::new(SystemClock);

    let state = ApiState::new(store, clock, config.clone());

    if let Some(dir) = &config.templates.dir {
        let definitions = load_definitions_dir(std::path::Path::new(dir))?;
        let created = state.coordinator.seed_templates(definitions).await?;
        tracing::info!(dir = %dir, created, "Seeded workflow templates");
    }

    let listener = rest::bind(&config.api.host, port).await?;

    println!("Mission control API");
    println!("  Listening: http://{}", listener.local_addr()?);
    println!("  Swagger:   http://{}/swagger-ui", listener.local_addr()?);
    println!("  Store:     {}", config.store_path().display());
    if let Some(path) = &log_file_path {
        println!("  Log:       {}", path.display());
    }

    let registry = state.registry.clone();
    registry
        .upsert(DAEMON_HEALTH_KEY, ONLINE, Some("API server started".to_string()))
        .await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutdown signal received");
    };

    rest::serve(listener, state, shutdown).await?;

    registry
        .upsert(DAEMON_HEALTH_KEY, OFFLINE, Some("API server stopped".to_string()))
        .await?;

    Ok(())
}

async fn cmd_heartbeat(config: &Config, url: Option<String>, once: bool) -> Result<()> {
    let mut heartbeat = config.heartbeat.clone();
    if let Some(url) = url {
        heartbeat.api_url = url;
    }

    let reporter = HeartbeatReporter::new(&heartbeat)?;

    if once {
        let id = reporter.report(ONLINE, None).await?;
        println!("Reported {} to {} ({})", ONLINE, reporter.endpoint(), id);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    println!(
        "Reporting '{}' to {} every {}s (Ctrl-C to stop)",
        heartbeat.key,
        reporter.endpoint(),
        heartbeat.interval_secs
    );

    let mut reporter = reporter.with_shutdown(shutdown_rx);
    reporter.run().await?;

    Ok(())
}

async fn cmd_status(config: &Config, key: Option<String>) -> Result<()> {
    let registry = StatusRegistry::new(open_store(config)?, Arc::new(SystemClock), &config.status);

    let readings = match key {
        Some(key) => vec![registry.read(&key).await],
        None => registry.list().await,
    };

    if readings.is_empty() {
        println!("No status reported yet");
        return Ok(());
    }

    println!("System Status ({} keys)", readings.len());
    println!("{}", "─".repeat(60));

    for reading in &readings {
        let updated = reading
            .updated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!("{:<24} {:<10} {}", reading.key, reading.status, updated);
        if let Some(details) = &reading.details {
            println!("    {details}");
        }
    }

    Ok(())
}

async fn cmd_templates(config: &Config) -> Result<()> {
    let coordinator = WorkflowCoordinator::new(open_store(config)?, Arc::new(SystemClock));
    let templates = coordinator.templates().await?;

    if templates.is_empty() {
        println!("No workflow templates");
        return Ok(());
    }

    println!("Workflow Templates ({})", templates.len());
    println!("{}", "─".repeat(60));

    for template in &templates {
        println!("{} [{} steps] {}", template.name, template.steps.len(), template.id);
        for step in &template.steps {
            let role = step.agent_role.as_deref().unwrap_or("-");
            println!("    {}. {} ({})", step.order, step.name, role);
        }
    }

    Ok(())
}

async fn cmd_import(config: &Config, file: &std::path::Path) -> Result<()> {
    let definition = load_definition_file(file)?;
    let coordinator = WorkflowCoordinator::new(open_store(config)?, Arc::new(SystemClock));
    let template = coordinator.create_template(definition).await?;

    println!(
        "Created template '{}' with {} steps ({})",
        template.name,
        template.steps.len(),
        template.id
    );

    Ok(())
}

async fn cmd_instances(config: &Config, status: Option<InstanceStatus>) -> Result<()> {
    let coordinator = WorkflowCoordinator::new(open_store(config)?, Arc::new(SystemClock));
    let instances = coordinator.list_instances(status).await?;

    if instances.is_empty() {
        println!("No workflow instances");
        return Ok(());
    }

    println!("Workflow Instances ({})", instances.len());
    println!("{}", "─".repeat(60));

    for instance in &instances {
        let status_icon = match instance.status {
            InstanceStatus::Active => "○",
            InstanceStatus::Running => "▶",
            InstanceStatus::PausedForReview => "⏸",
            InstanceStatus::Completed => "✓",
            InstanceStatus::Cancelled => "✗",
        };
        println!(
            "{} {} [{}] step {}/{} {}",
            status_icon,
            instance.template_name,
            instance.status,
            instance.current_step,
            instance.total_steps,
            instance.id
        );
    }

    Ok(())
}

async fn cmd_agents(config: &Config) -> Result<()> {
    let coordinator = WorkflowCoordinator::new(open_store(config)?, Arc::new(SystemClock));
    let agents = coordinator.agents().activity().await;

    if agents.is_empty() {
        println!("No agents registered");
        return Ok(());
    }

    println!("Agents ({})", agents.len());
    println!("{}", "─".repeat(60));

    for agent in &agents {
        let activity_icon = match agent.activity {
            Activity::Working => "▶",
            Activity::Waiting => "⏸",
            Activity::Idle => "·",
        };
        println!(
            "{} {} [{}] {} ({})",
            activity_icon,
            agent.name,
            agent.activity,
            agent.role,
            agent.agent_role.as_deref().unwrap_or("no workflow role")
        );
    }

    Ok(())
}
