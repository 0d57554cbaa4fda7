use std::collections::HashMap;

use clap::Parser;
use harness_core::Language;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "judge-server", version = "0.1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    /// Whether to remove the existing database
    #[arg(long = "flush-data", short = 'f')]
    pub flush_data: bool,

    /// Maximum number of sandboxes to run concurrently
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn read_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        let mut config: Config = serde_json::from_reader(reader)?;
        if let Some(threads) = self.threads {
            config.orchestrator.max_concurrent_sandboxes = threads;
        }
        Ok(config)
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
}

#[derive(Deserialize, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    12345
}

/// Container image registry plus optional remote sandbox endpoint: a fixed
/// mapping from language to image tag.
#[derive(Deserialize, Debug, Clone)]
pub struct SandboxConfig {
    pub images: HashMap<Language, String>,
    /// `user@host` SSH destination for a remote Docker sandbox. Absent
    /// means sandboxes run against the local Docker daemon.
    pub remote_ssh_host: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OrchestratorSettings {
    #[serde(default = "default_concurrency")]
    pub max_concurrent_sandboxes: usize,
    #[serde(default = "default_margin_s")]
    pub margin_s: f64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        OrchestratorSettings {
            max_concurrent_sandboxes: default_concurrency(),
            margin_s: default_margin_s(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_margin_s() -> f64 {
    5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.bind_port, 12345);
        assert_eq!(config.sandbox.images.get(&Language::C).unwrap(), "judge/c:latest");
        assert_eq!(config.orchestrator.max_concurrent_sandboxes, 2);
    }
}
