//! battery-observer: keeps the battery level of a fleet of BLE sensors fresh
//!
//! Polls every configured sensor on a fixed interval and reads each battery
//! through a single serialized worker, so reads never overlap each other or a
//! sensor's data download. Exposed as an MCP server over stdio.

use clap::{Parser, Subcommand};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::*,
    ErrorData as McpError,
    ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// === Modules ===

mod adapters;
mod config;
mod observer;
mod shared;
mod tools;

use adapters::directory::ConfiguredDirectory;
use adapters::downloads::DownloadTracker;
use observer::{BatteryReader, Observer, ReadOutcome};

// === CLI ===

#[derive(Parser)]
#[command(name = "battery-observer")]
#[command(about = "Keeps BLE sensor battery levels fresh, served over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the config file in your editor
    Config,
    /// Add a sensor to the config file
    AddSensor {
        /// Stable sensor id
        id: String,
        /// Device address, e.g. AA:BB:CC:DD:EE:FF
        mac_address: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Read one device's battery level and exit
    Read {
        /// Device address, e.g. AA:BB:CC:DD:EE:FF
        mac_address: String,
    },
}

// === Common Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

// === Server ===

pub struct ObserverServer {
    pub tool_router: ToolRouter<Self>,
    observer: Arc<Observer>,
    directory: Arc<ConfiguredDirectory>,
    downloads: Arc<DownloadTracker>,
}

impl ObserverServer {
    pub fn new(
        observer: Arc<Observer>,
        directory: Arc<ConfiguredDirectory>,
        downloads: Arc<DownloadTracker>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            observer,
            directory,
            downloads,
        }
    }
}

#[rmcp::tool_router]
impl ObserverServer {
    #[rmcp::tool(description = "Start periodic battery polling of every known sensor (no-op if already running)")]
    pub async fn start_watching(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::start_watching(&self.observer).await
    }

    #[rmcp::tool(description = "Stop periodic battery polling. Already queued updates still run.")]
    pub async fn stop_watching(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::stop_watching(&self.observer).await
    }

    #[rmcp::tool(description = "Queue a battery update for one sensor, independent of polling")]
    pub async fn request_update(
        &self,
        Parameters(params): Parameters<tools::SensorIdParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::request_update(&self.observer, &self.directory, params).await
    }

    #[rmcp::tool(description = "Mark a sensor as downloading (battery reads are skipped) or finished")]
    pub async fn set_downloading(
        &self,
        Parameters(params): Parameters<tools::DownloadParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::set_downloading(&self.downloads, params).await
    }

    #[rmcp::tool(description = "Get observer state: polling on/off, interval, sensors being read, sensors downloading")]
    pub async fn get_observer_state(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::get_observer_state(&self.observer, &self.downloads).await
    }

    #[rmcp::tool(description = "List known sensors with their last battery level and when it was read")]
    pub async fn list_sensors(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::list_sensors(&self.directory).await
    }

    #[rmcp::tool(description = "Get recent battery observer events (update started/succeeded/failed/completed, polling started/stopped)")]
    pub async fn get_recent_events(
        &self,
        Parameters(params): Parameters<tools::RecentEventsParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::get_recent_events(&self.observer, params).await
    }
}

#[rmcp::tool_handler]
impl ServerHandler for ObserverServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "battery-observer: periodic, serialized battery reads for BLE sensors.\n\
                 Use start_watching/stop_watching for polling, request_update for one sensor."
                    .to_string(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config) => {
            run_config_command()?;
        }
        Some(Commands::AddSensor {
            id,
            mac_address,
            name,
        }) => {
            run_add_sensor(id, mac_address, name)?;
        }
        Some(Commands::Read { mac_address }) => {
            init_tracing();
            run_read(&mac_address).await?;
        }
        None => {
            init_tracing();
            run_server().await?;
        }
    }

    Ok(())
}

// Stdout carries the MCP transport, so logs go to stderr
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open config file in user's editor, writing the bundled template first if it is missing
fn run_config_command() -> anyhow::Result<()> {
    let config_path = config::Config::path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, include_str!("../config.toml.example"))?;
        println!("Created config file with an example sensor: {}", config_path.display());
    }

    let editor = editor();
    println!("Opening {} with {}", config_path.display(), editor);

    let status = std::process::Command::new(&editor)
        .arg(&config_path)
        .status()?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", editor, status);
    }

    // Catch typos now rather than at the next server start
    if let Err(e) = config::Config::read_from(&config_path) {
        eprintln!("Warning: {:#}. The server will fall back to defaults.", e);
    }
    Ok(())
}

// $EDITOR, then $VISUAL, then a platform default
fn editor() -> String {
    std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            { "notepad".to_string() }
            #[cfg(not(target_os = "windows"))]
            { "nano".to_string() }
        })
}

fn run_add_sensor(id: String, mac_address: String, name: Option<String>) -> anyhow::Result<()> {
    let mut config = config::Config::load();
    if config.sensors.iter().any(|s| s.id == id) {
        anyhow::bail!("Sensor {} is already configured", id);
    }

    config.sensors.push(config::SensorEntry {
        id: id.clone(),
        mac_address,
        name,
    });
    config.save()?;
    println!("Added sensor {} ({} configured)", id, config.sensors.len());
    Ok(())
}

async fn run_read(mac_address: &str) -> anyhow::Result<()> {
    let config = config::Config::load();
    let device = adapters::device_service(config.scan_timeout(), config.retry_delay());
    let reader = BatteryReader::new(device, config.info_retries);

    match reader.read(mac_address).await {
        ReadOutcome::Success {
            mac_address,
            battery_level,
        } => {
            println!("{}: {}%", mac_address, battery_level);
            Ok(())
        }
        ReadOutcome::Failure {
            mac_address,
            reason,
        } => Err(anyhow::anyhow!("{}: {}", mac_address, reason)),
    }
}

/// Run the MCP server
async fn run_server() -> anyhow::Result<()> {
    tracing::info!("Starting battery-observer server");

    let config = config::Config::load();
    let directory = Arc::new(ConfiguredDirectory::new(&config.sensors));
    let downloads = Arc::new(DownloadTracker::default());
    let device = adapters::device_service(config.scan_timeout(), config.retry_delay());

    let observer = Observer::spawn(
        directory.clone(),
        device,
        downloads.clone(),
        config.observer_options(),
    );
    if config.watch_on_startup {
        observer.supervisor.start();
    }

    let server = ObserverServer::new(Arc::new(observer), directory, downloads);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    tracing::info!("battery-observer server stopped");
    Ok(())
}
