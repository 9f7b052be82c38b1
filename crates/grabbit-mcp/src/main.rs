//! Grabbit MCP server entry point.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use grabbit::interceptor::{FetchRequest, FetchTransport};
use grabbit::{ArtifactBundle, CaptureConfig, HttpClient, MatchLog, PageSession, PageSnapshot, ReplayPolicy};

use grabbit_mcp::config::{resolve_debug_log_size, resolve_history, resolve_user_agent, ServerConfig};
use grabbit_mcp::protocol::ProtocolHandler;
use grabbit_mcp::session::GrabSessionManager;
use grabbit_mcp::tools::ToolRegistry;
use grabbit_mcp::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "grabbit-mcp",
    about = "MCP server for Grabbit — find the API call behind a value on a page",
    version
)]
struct Cli {
    /// Exchanges kept per page (env GRABBIT_HISTORY).
    #[arg(long)]
    history: Option<usize>,

    /// Match attempts kept in the debug log (env GRABBIT_DEBUG_LOG).
    #[arg(long)]
    debug_log_size: Option<usize>,

    /// Emit captured request headers in replay commands.
    #[arg(long)]
    include_headers: bool,

    /// Leave cookies out of replay commands.
    #[arg(long)]
    no_cookies: bool,

    /// User-agent recorded on captures that set none (env GRABBIT_USER_AGENT).
    #[arg(long)]
    user_agent: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Call a JSON endpoint through the interceptor and trace a value in its response.
    Grab {
        /// Endpoint to call.
        url: String,

        /// Value to look for in the response.
        target: String,

        /// HTTP method.
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request header, "Name: value". Repeatable.
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body, sent as-is.
        #[arg(short = 'd', long)]
        data: Option<String>,

        /// Request timeout in milliseconds.
        #[arg(long, default_value_t = 15_000)]
        timeout_ms: u64,
    },

    /// Print server capabilities as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   grabbit-mcp completions bash > ~/.local/share/bash-completion/completions/grabbit-mcp
    ///   grabbit-mcp completions zsh > ~/.zfunc/_grabbit-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            capture: CaptureConfig {
                max_exchanges: resolve_history(self.history),
                user_agent: Some(resolve_user_agent(self.user_agent.as_deref())),
                ..Default::default()
            },
            policy: ReplayPolicy {
                include_headers: self.include_headers,
                include_cookies: !self.no_cookies,
            },
            debug_log_size: resolve_debug_log_size(self.debug_log_size),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.server_config();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let session = Arc::new(Mutex::new(GrabSessionManager::new(config)));
            let handler = ProtocolHandler::new(session);
            let transport = StdioTransport::new(handler);
            transport.run().await?;
        }

        Commands::Grab {
            url,
            target,
            method,
            headers,
            data,
            timeout_ms,
        } => {
            grab(config, url, target, method, headers, data, timeout_ms).await?;
        }

        Commands::Info => {
            let capabilities = grabbit_mcp::types::InitializeResult::default_result();
            let tools = ToolRegistry::list_tools();
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "grabbit-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn grab(
    config: ServerConfig,
    url: String,
    target: String,
    method: String,
    headers: Vec<String>,
    data: Option<String>,
    timeout_ms: u64,
) -> anyhow::Result<()> {
    let snapshot = PageSnapshot {
        url: url.clone(),
        ..Default::default()
    };
    let mut session = PageSession::open(snapshot, &config.capture)?;

    let user_agent = config
        .capture
        .user_agent
        .clone()
        .unwrap_or_else(|| grabbit::config::DEFAULT_USER_AGENT.to_string());
    let fetch = session.wrap_fetch(HttpClient::with_user_agent(timeout_ms, &user_agent));

    let mut request = FetchRequest::get(url.as_str()).method(method);
    for header in &headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("header must look like \"Name: value\", got {header:?}"))?;
        request = request.header(name.trim(), value.trim());
    }
    if let Some(body) = data {
        request = request.body(serde_json::Value::String(body));
    }

    let response = fetch.fetch(request).await?;
    tracing::info!("{} {} bytes from {}", response.status, response.body.len(), response.url);

    // The capture is decoded off the request path; give it a moment to land.
    let mut captured = 0;
    for _ in 0..50 {
        captured += session.absorb();
        if captured > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    if captured == 0 {
        bail!("response from {url} was not JSON; nothing was captured");
    }

    let result = session.find_text(&target);
    let log = MatchLog::from_lookup(&result);
    let found = match result {
        Ok(found) => found,
        Err(_) => bail!("{}", log.message),
    };

    let bundle = ArtifactBundle::generate(
        &found.exchange,
        found.matched.as_ref(),
        &target,
        config.policy,
        &[],
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "match": found.matched,
            "artifacts": bundle,
            "log": log,
        }))?
    );
    Ok(())
}
