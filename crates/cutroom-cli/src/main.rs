//! Cutroom chat client binary.
//!
//! # Usage
//!
//! ```bash
//! CUTROOM_TOKEN=... cutroom-cli --user-id u-42 --job job-7 \
//!     --socket-url wss://chat.example.com --api-url https://api.example.com/api
//! ```
//!
//! Type to send; `/quit` exits. Logs go to stderr.

use clap::Parser;
use cutroom_app::{ChatConfig, Runtime};
use cutroom_cli::{SystemEnv, TerminalDriver};
use cutroom_client::http::HttpMessageApi;
use cutroom_proto::JobId;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Cutroom project chat client
#[derive(Parser, Debug)]
#[command(name = "cutroom-cli")]
#[command(about = "Headless terminal client for Cutroom project chat")]
#[command(version)]
struct Args {
    /// Realtime socket URL
    #[arg(long, env = "CUTROOM_SOCKET_URL", default_value = "ws://localhost:3000/socket")]
    socket_url: String,

    /// REST base URL
    #[arg(long, env = "CUTROOM_API_URL", default_value = "http://localhost:3000/api")]
    api_url: String,

    /// Job room to open on start
    #[arg(short, long)]
    job: Option<String>,

    /// Local user id, used to ignore our own typing echo
    #[arg(short, long, env = "CUTROOM_USER_ID")]
    user_id: String,

    /// Bearer token. Without one the chat stays disabled.
    #[arg(long, env = "CUTROOM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!(user_id = %args.user_id, socket = %args.socket_url, "Cutroom chat starting");

    let api = HttpMessageApi::new(&args.api_url, args.token.clone().unwrap_or_default());
    let mut driver = TerminalDriver::new(args.socket_url, args.token);
    if let Some(job) = args.job {
        driver.open_on_start(JobId::new(job));
    }

    let runtime = Runtime::new(driver, api, SystemEnv::new(), ChatConfig::new(args.user_id));
    Ok(runtime.run().await?)
}
