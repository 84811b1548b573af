//! CLI argument parsing for the trace-propagation run.
//!
//! Every flag is an override on top of `config.json`; with no flags the run is
//! driven entirely by the config file in the working directory.
use clap::Parser;
use std::path::PathBuf;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Shell wrapper used to run the identity CLI.
#[cfg(windows)]
pub const DEFAULT_SHELL: &str = "pwsh.exe -Command";
#[cfg(not(windows))]
pub const DEFAULT_SHELL: &str = "pwsh -Command";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "dvtrace",
    version,
    about = "Post correlated telemetry to a Dataverse custom API and chain TraceParent values",
    after_help = "Examples:\n  dvtrace\n  dvtrace --config ./org.json --verbose\n  dvtrace --url https://org.crm.dynamics.com/ --token \"$TOKEN\""
)]
pub struct RootArgs {
    /// Path to the JSON config (environmentUrl, customApiName, entityName)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Environment URL, overriding environmentUrl from the config
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Bearer token to use instead of asking the Azure CLI
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Custom API name, overriding customApiName from the config
    #[arg(long, value_name = "NAME")]
    pub custom_api: Option<String>,

    /// Entity set name, overriding entityName from the config
    #[arg(long, value_name = "NAME")]
    pub entity: Option<String>,

    /// Shell wrapper used to run the Azure CLI (split like a POSIX shell)
    #[arg(long, value_name = "COMMAND", default_value = DEFAULT_SHELL)]
    pub shell: String,

    /// Emit debug logs on stderr
    #[arg(long)]
    pub verbose: bool,
}
