//! `geohaz`: serve the hazard tools, list datasets, or run a single call.

use clap::{Parser, Subcommand};
use geohaz_gateway::ComputeGateway;
use geohaz_server::{
    build_pipeline, connect_gateway, load_catalog, serve_stdio, serve_tcp, Config, ServerError,
    ToolServer, Transport,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "geohaz",
    version,
    about = "Geospatial hazard tools over a remote compute service"
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config/geohaz.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve tool requests (the default)
    Serve {
        /// Override the configured TCP port
        #[arg(long)]
        port: Option<u16>,
        /// Override the configured transport
        #[arg(long, value_enum)]
        transport: Option<Transport>,
        /// Expose Prometheus metrics on this address
        #[cfg(feature = "prometheus")]
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
    /// Print the dataset catalog as JSON
    Datasets,
    /// Run one request, e.g. '{"tool": "get_admin_boundary", "arguments": {...}}'
    Call {
        /// Request JSON
        request: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, ServerError> {
    let mut config = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        transport: None,
        #[cfg(feature = "prometheus")]
        metrics_addr: None,
    }) {
        Command::Datasets => {
            let catalog = load_catalog(&config)?;
            let listing = serde_json::json!({ "datasets": catalog.list_datasets() });
            println!("{}", serde_json::to_string_pretty(&listing).map_err(std::io::Error::from)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { request } => {
            let server = tool_server(&config)?;
            let response = server.handle_line(&request);
            println!("{}", response);
            let ok = serde_json::from_str::<serde_json::Value>(&response)
                .map(|v| v["ok"] == serde_json::Value::Bool(true))
                .unwrap_or(false);
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Serve {
            port,
            transport,
            #[cfg(feature = "prometheus")]
            metrics_addr,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(transport) = transport {
                config.server.transport = transport;
            }

            #[cfg(feature = "prometheus")]
            if let Some(addr) = metrics_addr {
                geohaz_metrics::install_prometheus_exporter(addr).map_err(|e| {
                    geohaz_server::ConfigError::Invalid(format!("metrics exporter: {}", e))
                })?;
                info!(%addr, "metrics exporter listening");
            }

            let server = tool_server(&config)?;
            info!(transport = %config.server.transport, "starting");
            match config.server.transport {
                Transport::Stdio => serve_stdio(&server)?,
                Transport::Tcp => {
                    let host: IpAddr = config.server.host.parse().map_err(|e| {
                        geohaz_server::ConfigError::Invalid(format!(
                            "server.host '{}': {}",
                            config.server.host, e
                        ))
                    })?;
                    serve_tcp(server, SocketAddr::new(host, config.server.port))?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn tool_server(config: &Config) -> Result<ToolServer, ServerError> {
    let gateway: Arc<dyn ComputeGateway> = Arc::new(connect_gateway(config)?);
    Ok(ToolServer::new(build_pipeline(config, gateway)?))
}
