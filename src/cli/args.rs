use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,

    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct GlobalArgs {
    /// Path to the TOML configuration file
    #[arg(long, env = "VAULT_BOOTSTRAP_CONFIG", global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Vault API URL override
    #[arg(long, global = true)]
    pub(crate) endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Initialize, unseal and configure the server
    Bootstrap(Box<BootstrapArgs>),
    /// Poll the health endpoint until the server reports unsealed
    Health,
    /// Print the commands a bootstrap would run
    Plan,
}

#[derive(Args, Debug)]
pub(crate) struct BootstrapArgs {
    /// Show secrets in output summaries
    #[arg(long)]
    pub(crate) show_secrets: bool,

    /// Root token (used if the server is already initialized)
    #[arg(long, env = "VAULT_ROOT_TOKEN")]
    pub(crate) root_token: Option<String>,

    /// Unseal key (repeatable)
    #[arg(long, env = "VAULT_UNSEAL_KEYS", value_delimiter = ',')]
    pub(crate) unseal_key: Vec<String>,

    /// File with one unseal key per line
    #[arg(long)]
    pub(crate) unseal_key_file: Option<PathBuf>,

    /// Skip mounting secrets engines and key escrow
    #[arg(long)]
    pub(crate) skip_base_config: bool,
}
