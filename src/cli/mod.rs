//! CLI command handling.
//!
//! Provides subcommands for:
//! - Seeding default data (`seed`)
//! - Listing agents (`agents`)
//! - One chat exchange with an agent (`chat`)
//! - Running a simulated deployment (`deploy`)
//! - Rendering a prompt template (`render`)
//! - Benchmarking a prompt against agents (`bench`)

mod commands;

pub use commands::run_command;

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "command-center")]
#[command(about = "AI Agent Command Center core services")]
#[command(
    long_about = "Drives the command center services from the terminal.\nExamples:\n  command-center seed --user alice\n  command-center chat --agent claude \"Explain lifetimes\""
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the default agents and prompts for a user
    Seed {
        #[arg(long, env = "COMMAND_CENTER_USER", default_value = "local")]
        user: String,
    },

    /// List a user's agents
    Agents {
        #[arg(long, env = "COMMAND_CENTER_USER", default_value = "local")]
        user: String,
    },

    /// Send one message to an agent and print the reply
    #[command(
        long_about = "Sends a message to an agent, stores both turns and prints the reply.\nExample: command-center chat --agent deepseek \"Write a binary search\""
    )]
    Chat {
        #[arg(long, env = "COMMAND_CENTER_USER", default_value = "local")]
        user: String,

        /// Agent short name (gpt-4, claude, gemini, kimi, llama, deepseek)
        #[arg(short, long, default_value = "claude")]
        agent: String,

        /// Print the stored conversation before sending
        #[arg(long)]
        history: bool,

        /// Message text
        message: String,
    },

    /// Run a simulated deployment pipeline
    #[command(
        long_about = "Runs Build, Test, Security Scan and Deploy.\nWith --fail-at the named stage fails and stages take one second each;\notherwise outcomes and durations are random."
    )]
    Deploy {
        /// Stage id or name that should fail
        #[arg(long)]
        fail_at: Option<String>,

        /// Branch shown on the run
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Render a prompt template
    Render {
        /// Template text with {variable} placeholders
        template: String,

        /// Variable assignment, repeatable
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },

    /// Run a rendered prompt against one or all agents and print metrics
    Bench {
        /// Template text with {variable} placeholders
        template: String,

        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Agent to test; every comparison model when omitted
        #[arg(long)]
        model: Option<String>,

        /// Number of runs against a single model
        #[arg(long, default_value_t = 1)]
        batch: usize,
    },
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("lang=French").unwrap(),
            ("lang".to_string(), "French".to_string())
        );
        assert_eq!(
            parse_var("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::try_parse_from([
            "command-center",
            "render",
            "Hi {name}",
            "--var",
            "name=Ada",
        ])
        .unwrap();
        match cli.command {
            Command::Render { template, vars } => {
                assert_eq!(template, "Hi {name}");
                assert_eq!(vars, vec![("name".to_string(), "Ada".to_string())]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
