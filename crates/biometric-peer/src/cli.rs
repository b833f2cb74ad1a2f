use biometric_chaincode::{ChaincodeConfig, DeleteRouting, LogFormat};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Run one biometric chaincode invocation against a local world-state snapshot.
#[derive(Debug, Parser)]
#[command(name = "biometric-peer", version, about)]
pub struct Cli {
    /// World-state snapshot; created on the first successful write.
    #[arg(long, default_value = "world-state.json")]
    pub state: PathBuf,

    /// JSON chaincode config. Flags below override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,

    #[arg(long, value_enum)]
    pub delete_routing: Option<DeleteRoutingArg>,

    /// Proposal timestamp (RFC 3339); defaults to now.
    #[arg(long)]
    pub tx_timestamp: Option<DateTime<Utc>>,

    /// Print invocation counters after the response.
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Instantiate the chaincode.
    Init,
    /// Invoke a chaincode function.
    Invoke {
        function: String,
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeleteRoutingArg {
    Upsert,
    DeleteHandler,
}

impl Cli {
    /// Fold command-line overrides into a loaded config.
    pub fn apply_overrides(&self, mut config: ChaincodeConfig) -> ChaincodeConfig {
        if let Some(fmt) = self.log_format {
            config.log_format = match fmt {
                LogFormatArg::Pretty => LogFormat::Pretty,
                LogFormatArg::Json => LogFormat::Json,
            };
        }
        if let Some(routing) = self.delete_routing {
            config.delete_routing = match routing {
                DeleteRoutingArg::Upsert => DeleteRouting::Upsert,
                DeleteRoutingArg::DeleteHandler => DeleteRouting::DeleteHandler,
            };
        }
        config
    }

    /// Function name and arguments as the stub will report them.
    pub fn call(&self) -> (&str, Vec<&str>) {
        match &self.command {
            Command::Init => ("", Vec::new()),
            Command::Invoke { function, args } => {
                (function.as_str(), args.iter().map(String::as_str).collect())
            }
        }
    }
}
