//! redirector
//!
//! Answers every HTTP request with a redirect chosen by the request's host.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────┐
//!                     │                    REDIRECTOR                      │
//!   Client Request    │  ┌─────────┐   ┌──────────────┐   ┌────────────┐  │
//!   ──────────────────┼─▶│  http   │──▶│   manager    │──▶│  routing   │  │
//!                     │  │ server  │   │ (one worker) │   │  matcher   │  │
//!                     │  └────┬────┘   └──────┬───────┘   └────────────┘  │
//!   307/308/401/404   │       │               │ reload                    │
//!   ◀─────────────────┼───────┘               ▼                           │
//!                     │               ┌──────────────┐   stdin/file/URL   │
//!                     │               │config loader │◀──────────────────┼──
//!                     │               └──────────────┘                    │
//!                     │  ┌──────────┐ ┌──────────┐ ┌───────────────────┐  │
//!   redirector ping ──┼─▶│ control  │ │ security │ │ lifecycle/signals │  │
//!                     │  │  socket  │ │          │ │   observability   │  │
//!                     │  └──────────┘ └──────────┘ └───────────────────┘  │
//!                     └───────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use redirector::config::ConfigSource;
use redirector::control::{default_socket_path, send_message, ControlMessage};
use redirector::lifecycle::{self, StartOptions};
use redirector::observability::{logging, LogFormat};

#[derive(Parser)]
#[command(name = "redirector", version)]
#[command(about = "Redirect requests to other hosts based on the requested host name", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the redirect server
    Start(StartArgs),
    /// Check whether the server is running
    Ping {
        /// Print nothing; report through the exit code only
        #[arg(short, long)]
        quiet: bool,
        #[command(flatten)]
        socket: SocketArgs,
    },
    /// Shut the server down, removing the control socket first
    Close {
        #[command(flatten)]
        socket: SocketArgs,
    },
    /// Shut the server down
    Stop {
        #[command(flatten)]
        socket: SocketArgs,
    },
    /// Print the version
    Version,
}

#[derive(Args)]
struct SocketArgs {
    /// Control socket path [default: <tmp>/redirector.sock]
    #[arg(long, env = "REDIRECTOR_SOCKET")]
    socket: Option<PathBuf>,
}

impl SocketArgs {
    fn path(self) -> PathBuf {
        self.socket.unwrap_or_else(default_socket_path)
    }
}

#[derive(Args)]
struct StartArgs {
    /// Read the configuration from a YAML file, reloading when it changes
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Fetch the configuration from a URL
    #[arg(short, long, env = "CONFIG_URL")]
    url: Option<String>,

    /// Read the configuration from stdin
    #[arg(long)]
    stdin: bool,

    /// Load and print the configuration, then exit
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    socket: SocketArgs,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "METRICS_ADDRESS")]
    metrics_address: Option<SocketAddr>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl StartArgs {
    /// stdin wins over a file, a file over a URL.
    fn source(&self) -> Option<ConfigSource> {
        if self.stdin {
            Some(ConfigSource::Stdin)
        } else if let Some(path) = &self.file {
            Some(ConfigSource::File(path.clone()))
        } else {
            self.url
                .as_ref()
                .filter(|url| !url.is_empty())
                .map(|url| ConfigSource::Url(url.clone()))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Start(args) => start(args).await,
        Commands::Ping { quiet, socket } => {
            let result = send_message(&socket.path(), ControlMessage::Ping).await;
            match result {
                Ok(reply) if !quiet => println!("{reply}"),
                Ok(_) => {}
                Err(_) if quiet => std::process::exit(1),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Commands::Close { socket } => control(socket, ControlMessage::Close).await,
        Commands::Stop { socket } => control(socket, ControlMessage::Stop).await,
        Commands::Version => {
            println!("redirector {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start(args: StartArgs) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(args.log_format);

    let source = args
        .source()
        .ok_or("no configuration source: pass --file, --url or --stdin")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), source = ?source, "redirector starting");

    let options = StartOptions {
        dry_run: args.dry_run,
        socket_path: args.socket.path(),
        metrics_address: args.metrics_address,
        ..StartOptions::new(source)
    };

    lifecycle::run(options).await?;
    Ok(())
}

async fn control(socket: SocketArgs, message: ControlMessage) -> Result<(), Box<dyn std::error::Error>> {
    let reply = send_message(&socket.path(), message).await?;
    println!("{reply}");
    Ok(())
}
