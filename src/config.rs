use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::prober::{ProbeOptions, RequestFlags};

#[derive(Parser, Debug)]
#[command(
    name = "httpbox",
    version,
    about = "Repeatedly probe an HTTP URL and report status, size and timing",
    after_help = "\
EXAMPLES:
    httpbox wikipedia.org                          Simplest, basic usage
    httpbox wikipedia.org -n 3 --compr --wait 0    Three requests, compression, no delay
    httpbox wikipedia.org -n 1 --showhdr --silent  Just show the HTTP reply header
    httpbox wikipedia.org --timesplit              Show per-chunk transfer times
    httpbox 1.2.3.4 --host example.domain          Test a virtual host at 1.2.3.4"
)]
pub struct Cli {
    /// URL to probe (may be given in the config file instead)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Stop after N requests
    #[arg(short = 'n', long = "count", value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,

    /// Send Accept-Encoding: gzip,deflate
    #[arg(long)]
    pub compr: bool,

    /// Use HEAD instead of GET
    #[arg(long)]
    pub head: bool,

    /// Use HTTP/1.0 instead of HTTP/1.1
    #[arg(long)]
    pub http10: bool,

    /// Show the HTTP reply header
    #[arg(long)]
    pub showhdr: bool,

    /// Show the HTTP reply header and body
    #[arg(long)]
    pub dump: bool,

    /// Don't show status lines
    #[arg(long)]
    pub silent: bool,

    /// Show transfer times for consecutive data chunks
    #[arg(long)]
    pub timesplit: bool,

    /// Value for the Host: header, the connection still goes to the URL's address
    #[arg(long, value_name = "HOSTNAME")]
    pub host: Option<String>,

    /// Seconds to wait between requests [default: 1]
    #[arg(long, value_name = "SECS")]
    pub wait: Option<u64>,

    /// Number of concurrent clients [default: 1]
    #[arg(long, value_name = "N")]
    pub clients: Option<usize>,

    /// JSON config file
    #[arg(long, value_name = "FILE", env = "PROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(long, value_name = "LEVEL", env = "PROBE_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Serve Prometheus metrics on this address
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub compr: bool,
    #[serde(default)]
    pub head: bool,
    #[serde(default)]
    pub http10: bool,
    #[serde(default)]
    pub showhdr: bool,
    #[serde(default)]
    pub dump: bool,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub timesplit: bool,
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
    #[serde(default = "default_clients")]
    pub clients: usize,
    #[serde(default)]
    pub max_requests: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

fn default_wait_secs() -> u64 {
    1
}

fn default_clients() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            host: None,
            compr: false,
            head: false,
            http10: false,
            showhdr: false,
            dump: false,
            silent: false,
            timesplit: false,
            wait_secs: default_wait_secs(),
            clients: default_clients(),
            max_requests: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_addr: None,
        }
    }
}

impl ProbeConfig {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            anyhow::bail!("No URL given, pass one on the command line or in the config file");
        }
        if self.max_requests == Some(0) {
            anyhow::bail!("max_requests must be greater than 0");
        }
        self.get_tracing_level().map(|_| ())
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            flags: RequestFlags {
                accept_compression: self.compr,
                use_head_method: self.head,
                use_http10: self.http10,
            },
            timesplit: self.timesplit,
        }
    }

    pub fn load_file_config(file_path: &Path) -> Result<ProbeConfig> {
        if !file_path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path.display()));
        }

        let content = std::fs::read_to_string(file_path)?;
        let config: ProbeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}

impl Cli {
    /// Merge the command line over the config file, if any. Switches given on
    /// the command line turn options on, values given there win.
    pub fn into_config(self) -> Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::load_file_config(path)?,
            None => ProbeConfig::default(),
        };

        if let Some(url) = self.url {
            config.url = url;
        }
        config.compr |= self.compr;
        config.head |= self.head;
        config.http10 |= self.http10;
        config.showhdr |= self.showhdr;
        config.dump |= self.dump;
        config.silent |= self.silent;
        config.timesplit |= self.timesplit;
        if self.host.is_some() {
            config.host = self.host;
        }
        if let Some(wait) = self.wait {
            config.wait_secs = wait;
        }
        if let Some(clients) = self.clients {
            config.clients = clients;
        }
        if self.count.is_some() {
            config.max_requests = self.count;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if self.metrics_addr.is_some() {
            config.metrics_addr = self.metrics_addr;
        }
        config.clients = config.clients.max(1);

        config.validate()?;
        Ok(config)
    }
}
