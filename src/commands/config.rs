use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;

use deckhand::config::{self, DeckhandConfig};

use super::CmdResult;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display configuration (merged defaults + file)
    Show {
        /// Show only built-in defaults (ignore deckhand.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Set a configuration value at a JSON pointer path
    Set {
        /// JSON pointer path (e.g., /target/image_tag)
        pointer: String,
        /// Value to set (JSON, falls back to a plain string)
        value: String,
    },
    /// Show the path to deckhand.json
    Path,
    /// Reset configuration to built-in defaults (deletes deckhand.json)
    Reset,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<DeckhandConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pointer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<bool>,
}

impl ConfigOutput {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            config: None,
            path: None,
            exists: None,
            pointer: None,
            value: None,
            deleted: None,
        }
    }
}

pub fn run(args: ConfigArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin } => {
            let config = if builtin {
                DeckhandConfig::default()
            } else {
                config::load()
            };
            Ok((
                ConfigOutput {
                    config: Some(config),
                    ..ConfigOutput::new("config.show")
                },
                0,
            ))
        }
        ConfigCommand::Set { pointer, value } => {
            let parsed = parse_value(&value);
            let config = config::set_value(&pointer, parsed.clone())?;
            Ok((
                ConfigOutput {
                    config: Some(config),
                    pointer: Some(pointer),
                    value: Some(parsed),
                    ..ConfigOutput::new("config.set")
                },
                0,
            ))
        }
        ConfigCommand::Path => Ok((
            ConfigOutput {
                path: Some(config::config_path()?),
                exists: Some(config::config_exists()),
                ..ConfigOutput::new("config.path")
            },
            0,
        )),
        ConfigCommand::Reset => Ok((
            ConfigOutput {
                deleted: Some(config::reset_config()?),
                ..ConfigOutput::new("config.reset")
            },
            0,
        )),
    }
}

/// Parse a string value into appropriate JSON type.
/// JSON literals (numbers, bools, arrays) win; everything else is a string.
fn parse_value(s: &str) -> Value {
    if let Ok(v) = serde_json::from_str(s) {
        return v;
    }
    Value::String(s.to_string())
}
