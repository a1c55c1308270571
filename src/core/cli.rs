//! Command-line arguments

use crate::core::config::Config;
use crate::core::constants::DEFAULT_PROMPT;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// OpenAI API proxy with response caching and usage accounting
#[derive(Parser, Debug)]
#[command(name = "proxai", version)]
pub struct Cli {
    /// Action to perform. If omitted, runs the proxy server.
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeOptions,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one chat completion and print the reply.
    Chat(ChatOptions),
}

/// Overrides applied to the loaded configuration in serve mode
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ServeOptions {
    /// Port to listen on [default: 8080]
    #[arg(long, short = 'p', value_name = "N")]
    pub port: Option<u16>,

    /// Address to listen on [default: localhost]
    #[arg(long, value_name = "HOST")]
    pub address: Option<String>,

    /// Directory for cached responses [default: ./cache]
    #[arg(long = "cache-dir", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory for audit logs [default: ./logs]
    #[arg(long = "log-dir", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Disable the response cache.
    #[arg(long = "no-cache", default_value_t = false)]
    pub no_cache: bool,

    /// Disable the interactive console.
    #[arg(long = "no-console", default_value_t = false)]
    pub no_console: bool,
}

impl ServeOptions {
    /// Apply overrides, then re-validate
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref address) = self.address {
            config.server.host = address.clone();
        }
        if let Some(ref dir) = self.cache_dir {
            config.cache.dir = dir.clone();
        }
        if let Some(ref dir) = self.log_dir {
            config.logs.dir = dir.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if self.no_console {
            config.server.console = false;
        }
        config.validate()
    }
}

/// Options for `proxai chat`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// Message to send.
    #[arg(value_name = "PROMPT", default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// API base URL [default: client.base_url]
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Model name [default: client.model]
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Bearer token sent with the request.
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}
