use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use estate_core::{EstateLedger, Invocation, InvocationOutcome, LedgerConfig, Request};
use estate_gate::{CallerIdentity, Operation};
use estate_store::{verify_journal, InMemoryLedgerStore, LedgerStore};
use estate_types::IdentityHasher;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Invoke(args) => cmd_invoke(&cli.state, config, args, &cli.format),
        Command::Operations(args) => cmd_operations(args, &cli.format),
        Command::Journal(args) => cmd_journal(&cli.state, &config, args, &cli.format),
        Command::Hash(args) => cmd_hash(args, &cli.format),
        Command::Config(args) => cmd_config(&config, args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    let config = match path {
        Some(path) => LedgerConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => LedgerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Load the snapshot at `path`, or start an empty store partitioned the way
/// `config` says.
fn open_store(path: &Path, config: &LedgerConfig) -> anyhow::Result<InMemoryLedgerStore> {
    if path.exists() {
        let store = InMemoryLedgerStore::load_from(path)
            .with_context(|| format!("loading state {}", path.display()))?;
        tracing::debug!(path = %path.display(), height = store.height()?, "state loaded");
        Ok(store)
    } else {
        Ok(InMemoryLedgerStore::with_collections(config.collection_policy()))
    }
}

fn cmd_invoke(
    state: &Path,
    config: LedgerConfig,
    args: InvokeArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let store = open_store(state, &config)?;
    let ledger = EstateLedger::new(store, config)?;
    let caller = CallerIdentity::new(args.org, args.principal);
    let invocation = Invocation::new(args.function, args.args);

    if args.dry_run {
        let endorsement = ledger.endorse(&caller, Request::parse(&invocation)?)?;
        match format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "txId": endorsement.tx_id,
                    "operation": endorsement.operation,
                    "result": endorsement.result,
                    "writeSet": endorsement.write_set,
                }))?
            ),
            OutputFormat::Text => {
                println!(
                    "{} {} endorsed, not committed",
                    "~".yellow().bold(),
                    endorsement.operation.as_str().bold()
                );
                for write in &endorsement.write_set.writes {
                    println!("  {} {}", "write".cyan(), write.key);
                }
                println!("{}", serde_json::to_string_pretty(&endorsement.result)?);
            }
        }
        return Ok(());
    }

    let outcome = ledger.invoke_named(&caller, &invocation)?;
    if outcome.receipt.is_some() {
        ledger
            .store()
            .save_to(state)
            .with_context(|| format!("saving state {}", state.display()))?;
    }
    print_outcome(&outcome, format)
}

fn print_outcome(outcome: &InvocationOutcome, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => {
            match &outcome.receipt {
                Some(receipt) => println!(
                    "{} {} committed  seq {}  {}",
                    "✓".green().bold(),
                    outcome.operation.as_str().bold(),
                    receipt.seq.to_string().yellow(),
                    receipt.short_hash().dimmed()
                ),
                None => println!("{} {}", "✓".green().bold(), outcome.operation.as_str().bold()),
            }
            println!("{}", serde_json::to_string_pretty(&outcome.result)?);
        }
    }
    Ok(())
}

fn cmd_operations(args: OperationsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let only = args
        .org
        .map(|msp| CallerIdentity::new(msp, None).organization())
        .transpose()?;
    let operations: Vec<Operation> = Operation::ALL
        .iter()
        .copied()
        .filter(|op| only.map_or(true, |org| op.allows(org)))
        .collect();

    match format {
        OutputFormat::Json => {
            let listing: Vec<_> = operations
                .iter()
                .map(|op| {
                    json!({
                        "operation": op,
                        "module": format!("{:?}", op.module()),
                        "query": op.is_query(),
                        "allowed": op.allowed_organizations(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            for op in operations {
                let kind = if op.is_query() {
                    "query".blue()
                } else {
                    "write".magenta()
                };
                let allowed: Vec<&str> = op
                    .allowed_organizations()
                    .iter()
                    .map(|o| o.as_str())
                    .collect();
                println!(
                    "{:<38} {:<13} {}  {}",
                    op.as_str().bold(),
                    format!("{:?}", op.module()),
                    kind,
                    allowed.join(", ").dimmed()
                );
            }
        }
    }
    Ok(())
}

fn cmd_journal(
    state: &Path,
    config: &LedgerConfig,
    args: JournalArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let store = open_store(state, config)?;
    let journal = store.journal()?;
    if args.verify {
        verify_journal(&journal)?;
    }
    let skip = journal.len().saturating_sub(args.limit);
    let recent = &journal[skip..];

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(recent)?),
        OutputFormat::Text => {
            if journal.is_empty() {
                println!("Journal is empty.");
            }
            for receipt in recent {
                println!(
                    "{}  {}  {:<28} {:<15} {} writes  tx {}",
                    format!("#{}", receipt.seq).yellow().bold(),
                    receipt.short_hash().dimmed(),
                    receipt.function,
                    receipt.organization.as_str(),
                    receipt.write_count,
                    receipt.tx_id.short_id()
                );
            }
            if args.verify {
                println!(
                    "{} Journal integrity verified ({} commits)",
                    "✓".green().bold(),
                    journal.len()
                );
            }
        }
    }
    Ok(())
}

fn cmd_hash(args: HashArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let hasher = match args.kind {
        HashKind::Citizen => IdentityHasher::CITIZEN,
        HashKind::RealtyCert => IdentityHasher::REALTY_CERT,
    };
    let digest = hasher.hash_hex(&args.value);
    match format {
        OutputFormat::Json => println!("{}", json!({ "hash": digest })),
        OutputFormat::Text => println!("{digest}"),
    }
    Ok(())
}

fn cmd_config(config: &LedgerConfig, args: ConfigArgs) -> anyhow::Result<()> {
    if args.check {
        println!("{} Configuration is valid", "✓".green().bold());
        return Ok(());
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}
