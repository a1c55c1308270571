//! OpenAI API Proxy
//!
//! This application forwards OpenAI API requests to the upstream service,
//! caching responses and accounting token usage and cost along the way. The
//! `chat` subcommand sends a single chat completion through the proxy.

mod api;
mod console;
mod core;
mod models;

use crate::api::endpoints::{AppState, create_router};
use crate::console::{run_console, spawn_stdin_reader};
use crate::core::cli::{ChatOptions, Cli, Command};
use crate::core::client::ChatClient;
use crate::core::config::Config;
use crate::core::logging::init_logging;
use crate::core::upstream::{HttpUpstream, Upstream};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        None => {
            if let Err(e) = cli.serve.apply(&mut config) {
                eprintln!("Configuration Error: {:#}", e);
                std::process::exit(1);
            }
            init_logging(&config.server.log_level);
            run_server(config).await
        }
        Some(Command::Chat(options)) => {
            // Keep stdout for the reply unless RUST_LOG asks for more
            init_logging("warn");
            run_chat(&config, options).await
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Send one chat completion and print the first choice's content
async fn run_chat(config: &Config, options: ChatOptions) -> Result<()> {
    let base_url = options
        .base_url
        .unwrap_or_else(|| config.client.base_url.clone());
    let model = options.model.unwrap_or_else(|| config.client.model.clone());

    let client = ChatClient::new(&base_url, options.api_key, config.client.request_timeout)
        .context("Failed to create chat client")?;
    let content = client
        .complete(&options.prompt, &model)
        .await
        .with_context(|| format!("Chat completion via {} failed", client.base_url()))?;

    println!("{}", content);
    Ok(())
}

/// Run the proxy until Ctrl-C, SIGTERM or the console's quit command
async fn run_server(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let upstream: Arc<dyn Upstream> = Arc::new(
        HttpUpstream::new(&config.upstream.base_url, config.upstream.request_timeout)
            .context("Failed to create upstream client")?,
    );
    let state = AppState::new(config.clone(), upstream)
        .await
        .context("Failed to create proxy server")?;
    let stats = state.stats.clone();
    let audit = state.audit.clone();
    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    print_startup_banner(&config);
    info!("Server listening on http://{}", addr);

    let console_quit = Arc::new(Notify::new());
    if config.server.console {
        tokio::spawn(run_console(
            spawn_stdin_reader(),
            stats,
            console_quit.clone(),
        ));
    }

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = stopping.clone();
        async move {
            shutdown_signal(console_quit).await;
            info!("Shutting down server...");
            stopping.notify_one();
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(signal);
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_task => {
            result.context("Server task failed")?.context("Server error")?;
        }
        _ = stopping.notified() => {
            let deadline = Duration::from_secs(config.server.shutdown_timeout);
            match tokio::time::timeout(deadline, &mut server_task).await {
                Ok(result) => result.context("Server task failed")?.context("Server error")?,
                Err(_) => {
                    warn!(
                        "Server forced to shutdown after {}s",
                        config.server.shutdown_timeout
                    );
                    server_task.abort();
                }
            }
        }
    }

    audit.flush().await;
    info!("Server exiting");
    Ok(())
}

/// Resolve when Ctrl-C, SIGTERM or a console quit arrives
async fn shutdown_signal(console_quit: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = console_quit.notified() => {},
    }
}

/// Print startup banner with configuration
fn print_startup_banner(config: &Config) {
    let url = format!("http://{}:{}", config.server.host, config.server.port);
    println!("🐨 Proxai - OpenAI API Proxy v{}", env!("CARGO_PKG_VERSION"));
    println!("   OpenAI Proxy Server is running on {}", url);
    println!("   For integration help, visit {}/help", url);
    println!("   Upstream: {}", config.upstream.base_url);
    println!(
        "   Cache: {}",
        if config.cache.enabled {
            config.cache.dir.display().to_string()
        } else {
            "disabled".to_string()
        }
    );
    println!("   Logs: {}", config.logs.dir.display());
    if config.server.console {
        println!("   Commands: r/reset, s/status, c/clear, q/quit");
    }
    println!();
}
