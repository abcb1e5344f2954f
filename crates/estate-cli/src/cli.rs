use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "estate",
    about = "Estate Registry Ledger: permissioned real-estate registry",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Ledger configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// State snapshot to load before and save after each command.
    #[arg(long, global = true, default_value = "estate-state.bin")]
    pub state: PathBuf,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Invoke a named contract operation
    Invoke(InvokeArgs),
    /// List the operation catalogue and who may call it
    Operations(OperationsArgs),
    /// Show the commit journal
    Journal(JournalArgs),
    /// Hash a clear-text identifier the way the ledger stores it
    Hash(HashArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct InvokeArgs {
    /// Calling organization's MSP id, e.g. GovernmentMSP
    #[arg(long)]
    pub org: String,
    /// Principal within the organization
    #[arg(long)]
    pub principal: Option<String>,
    /// Endorse only; print the write set without committing
    #[arg(long)]
    pub dry_run: bool,
    pub function: String,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct OperationsArgs {
    /// Only operations this MSP may invoke
    #[arg(long)]
    pub org: Option<String>,
}

#[derive(Args)]
pub struct JournalArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// Recompute and check the hash chain
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args)]
pub struct HashArgs {
    pub value: String,
    #[arg(long, default_value = "citizen")]
    pub kind: HashKind,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum HashKind {
    Citizen,
    RealtyCert,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Validate only
    #[arg(long)]
    pub check: bool,
}
