//! CLI argument parsing

use clap::{Parser, Subcommand};
use coding_expert_core::CodingExpertConfig;
use std::path::PathBuf;

/// Main CLI structure for coding-expert
#[derive(Parser, Debug)]
#[command(
    name = "coding-expert",
    version,
    about = "ReAct coding-expert agent served over HTTP"
)]
pub struct Cli {
    /// Configuration file path (defaults to ./coding-expert.toml)
    #[arg(long, global = true, env = "CODING_EXPERT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on; overrides PORT and the config file
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Address to bind the server to
    #[arg(long, global = true, env = "CODING_EXPERT_BIND")]
    pub bind: Option<String>,

    /// Log every agent step at info level
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Serve the HTTP API (default)
    Serve,

    /// Print the configured languages as JSON and exit
    Languages,

    /// Validate the effective configuration and print it with secrets removed
    CheckConfig,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Serve)
    }

    /// Apply flag overrides, the highest-precedence configuration layer
    pub fn apply_overrides(&self, config: &mut CodingExpertConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if self.verbose {
            config.agent.verbose = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["coding-expert"]);
        assert_eq!(cli.command(), Commands::Serve);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "coding-expert",
            "serve",
            "--port",
            "9000",
            "--bind",
            "127.0.0.1",
            "--verbose",
        ]);
        let mut config = CodingExpertConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert!(config.agent.verbose);
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["coding-expert", "check-config", "--config", "x.toml"]);
        assert_eq!(cli.command(), Commands::CheckConfig);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn config_and_bind_read_the_environment() {
        let command = <Cli as clap::CommandFactory>::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|name| name.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("config").as_deref(), Some("CODING_EXPERT_CONFIG"));
        assert_eq!(env_of("bind").as_deref(), Some("CODING_EXPERT_BIND"));
        assert_eq!(env_of("port"), None);
    }
}
