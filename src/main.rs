//! Box MCP Gateway Entry Point
//!
//! Loads configuration from the environment, applies command-line overrides,
//! initializes logging and runs the gateway on the selected transport.

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use box_mcp_server::core::{Config, McpServer, TransportService};

#[derive(Parser, Debug)]
#[command(name = "box-mcp-server")]
#[command(version, about = "MCP gateway exposing Box content management as tools", long_about = None)]
struct Cli {
    /// Transport to serve on (stdio or http). Overrides MCP_TRANSPORT.
    #[arg(long, short)]
    transport: Option<String>,

    /// HTTP bind host. Overrides MCP_HTTP_HOST.
    #[arg(long)]
    host: Option<String>,

    /// HTTP port. Overrides MCP_HTTP_PORT.
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    apply_cli(&mut config, &cli)?;

    // Logging goes to stderr; stdout belongs to the stdio transport.
    init_logging(&config.logging.level, config.logging.with_timestamps);

    info!("Starting {} v{}", config.server.name, config.server.version);

    let transport = TransportService::new(config.transport.clone());
    let server = McpServer::new(config)?;
    info!("Server initialized");

    transport.run(server).await?;

    info!("Server shutting down");
    Ok(())
}

/// Apply command-line overrides on top of the environment.
fn apply_cli(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(name) = &cli.transport {
        config.transport = config
            .transport
            .select(name)
            .ok_or_else(|| anyhow!("Unknown or disabled transport '{}'", name))?;
    }

    #[cfg(feature = "http")]
    if let box_mcp_server::core::TransportConfig::Http(http) = &mut config.transport {
        if let Some(host) = &cli.host {
            http.host = host.clone();
        }
        if let Some(port) = cli.port {
            http.port = port;
        }
    }
    Ok(())
}

/// Initialize the logging subsystem.
fn init_logging(level: &str, with_timestamps: bool) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if with_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}
