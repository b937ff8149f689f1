//! Command-line front end: issue, verify and refresh tokens from the environment configuration.

use clap::{Parser, Subcommand};
use rust_common::tracing_config::{TracingConfig, init_tracing};
use serde_json::Value;
use std::io::{self, Read};
use token_engine::{EngineConfig, Parsed, TokenEngine};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "token-engine", version, about = "Issue, verify and refresh JWTs")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign claims read as a JSON object from the argument or stdin.
    Issue {
        /// Claims JSON; `-` or absent reads stdin
        claims: Option<String>,
    },

    /// Verify a token and print its claims.
    Verify {
        /// Compact token
        token: String,
    },

    /// Verify a token and print a replacement with fresh time claims.
    Refresh {
        /// Compact token
        token: String,
    },
}

fn read_claims(arg: Option<String>) -> io::Result<String> {
    match arg.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(json) => Ok(json.to_string()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let tracing_config = TracingConfig::default()
        .with_service_name("token-engine")
        .with_log_level("warn")
        .with_env_overrides();
    let tracing_config = if cli.json_logs {
        tracing_config.with_json_output()
    } else {
        tracing_config
    };
    init_tracing(&tracing_config);

    let engine = TokenEngine::new(EngineConfig::from_env()?)?;

    match cli.cmd {
        Command::Issue { claims } => {
            let mut claims: token_engine::Claims = serde_json::from_str(&read_claims(claims)?)?;
            let token = engine.generate(&mut claims)?;
            info!("Issued token");
            println!("{token}");
        }
        Command::Verify { token } => {
            let parsed: Parsed<Value> = engine.parse(&token)?;
            let claims = parsed.into_claims().unwrap_or(Value::Null);
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Command::Refresh { token } => {
            let mut claims: token_engine::Claims = token_engine::Claims::default();
            let replacement = engine.refresh(&token, &mut claims)?;
            println!("{replacement}");
        }
    }

    Ok(())
}
