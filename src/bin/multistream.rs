//! multistream-select CLI binary.
//!
//! # Commands
//!
//! - `serve` - Run a TCP host that echoes bytes on any negotiated protocol
//! - `select` - Negotiate a protocol with a remote host
//! - `ls` - List the protocols a remote host supports

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use multistream::{
    config::Config,
    protocol::{Host, ProtocolId},
    transport::{self, stream_handler, StreamHandler, TcpTransport, Transport},
    VERSION,
};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "multistream")]
#[command(version = VERSION)]
#[command(about = "multistream-select protocol negotiation", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/multistream/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the given protocols with an echo handler
    Serve {
        /// Protocol id to register (repeatable)
        #[arg(short, long = "protocol", required = true)]
        protocols: Vec<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Honor debug-sigkill from peers
        #[arg(long)]
        debug: bool,
    },

    /// Negotiate one of the given protocols with a host
    Select {
        /// Host address (e.g. 127.0.0.1:4001)
        #[arg(short, long)]
        addr: SocketAddr,

        /// Candidate protocol id, in preference order (repeatable)
        #[arg(short, long = "protocol", required = true)]
        protocols: Vec<String>,

        /// Demand a single protocol without fallback
        #[arg(short, long)]
        force: bool,
    },

    /// List the protocols a host supports
    Ls {
        /// Host address (e.g. 127.0.0.1:4001)
        #[arg(short, long)]
        addr: SocketAddr,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Serve {
            protocols,
            port,
            host,
            debug,
        } => runtime.block_on(cmd_serve(config, protocols, port, host, debug)),

        Commands::Select {
            addr,
            protocols,
            force,
        } => runtime.block_on(cmd_select(config, addr, protocols, force)),

        Commands::Ls { addr } => runtime.block_on(cmd_ls(config, addr)),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Config::from_file(path)?
            },
            None => Config::default(),
        },
    };
    Ok(config.with_env())
}

async fn cmd_serve(
    mut config: Config,
    protocols: Vec<String>,
    port: Option<u16>,
    host: Option<String>,
    debug: bool,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.transport.port = port;
    }
    if let Some(host) = host {
        config.transport.host = host;
    }
    config.host.debug |= debug;

    let server: Host<StreamHandler> = Host::with_config(config.host);
    for protocol in protocols {
        let protocol: ProtocolId = protocol.parse()?;
        server.add_handler(protocol, stream_handler(echo))?;
    }
    if server.is_debug() {
        tracing::warn!("Debug mode: peers may end sessions with debug-sigkill");
    }

    let transport = TcpTransport::from_config(&config.transport, &config.framing)?;
    transport.serve(server).await?;
    Ok(())
}

async fn echo(protocol: ProtocolId, mut stream: TcpStream) -> multistream::Result<()> {
    let (mut reader, mut writer) = stream.split();
    let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
    tracing::debug!(protocol = %protocol, bytes, "echo session finished");
    Ok(())
}

async fn cmd_select(
    config: Config,
    addr: SocketAddr,
    protocols: Vec<String>,
    force: bool,
) -> anyhow::Result<()> {
    let mut client = transport::connect(addr, &config.framing).await?;
    let timeout = config
        .transport
        .negotiation_timeout()
        .unwrap_or(Duration::MAX);

    let selected = if force {
        let [protocol] = protocols.as_slice() else {
            anyhow::bail!("--force takes exactly one --protocol");
        };
        tokio::time::timeout(timeout, client.select_protocol_or_fail(protocol)).await??
    } else {
        tokio::time::timeout(timeout, client.select_one_of(protocols.as_slice())).await??
    };

    println!("{selected}");
    Ok(())
}

async fn cmd_ls(config: Config, addr: SocketAddr) -> anyhow::Result<()> {
    let mut client = transport::connect(addr, &config.framing).await?;
    let timeout = config
        .transport
        .negotiation_timeout()
        .unwrap_or(Duration::MAX);

    let protocols = tokio::time::timeout(timeout, client.ls()).await??;
    for protocol in protocols {
        println!("{protocol}");
    }
    Ok(())
}
