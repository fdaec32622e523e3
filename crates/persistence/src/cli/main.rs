//! Resource store command-line tool.
//!
//! Operates on a SQLite store file: bulk import from NDJSON, point reads and
//! deletes, indexed lookups, composite queries, index inspection and
//! reindexing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use helios_resource_store::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
use helios_resource_store::core::ResourceStore;
use helios_resource_store::extractor::{IndexRegistry, PathIndexExtractor};
use helios_resource_store::types::{IndexKind, QuantityIndex, RawQuery, Resource, ResourceKey};

/// Indexed resource store.
#[derive(Parser, Debug)]
#[command(name = "resource-store")]
#[command(about = "Import, look up and maintain an indexed resource store")]
#[command(version)]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, env = "HELIOS_STORE_DATABASE", default_value = "resources.db")]
    database: PathBuf,

    /// JSON file of index definitions (defaults to the built-in set).
    #[arg(long, env = "HELIOS_STORE_INDEX_CONFIG")]
    index_config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HELIOS_STORE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upsert resources from an NDJSON file, one resource per line.
    Import {
        /// NDJSON file to read.
        file: PathBuf,

        /// Number of resources written per transaction.
        #[arg(long, default_value_t = 500)]
        batch_size: usize,
    },

    /// Print a resource.
    Get { resource_type: String, id: String },

    /// Delete a resource and its index rows.
    Delete { resource_type: String, id: String },

    /// Count stored resources of a type.
    Count { resource_type: String },

    /// Look up resources by index.
    #[command(subcommand)]
    Find(FindCommand),

    /// Run a composite query given as JSON.
    Query {
        /// Query JSON, e.g. {"resource_type": "Patient", "predicate": {"op": "all"}}
        query: String,

        /// Print full resources instead of keys.
        #[arg(long)]
        resources: bool,
    },

    /// Print the stored index entries of a resource.
    Entries {
        /// Resource reference, e.g. Patient/p1.
        #[arg(value_parser = parse_reference)]
        reference: ResourceKey,

        /// Only print entries of one kind (string, token, reference, quantity).
        #[arg(long, value_parser = parse_kind)]
        kind: Option<IndexKind>,
    },

    /// Rebuild the index rows of every resource of a type.
    Reindex { resource_type: String },
}

#[derive(Subcommand, Debug)]
enum FindCommand {
    /// Exact string match.
    String {
        resource_type: String,
        path: String,
        value: String,
    },

    /// Token match; an omitted system matches only entries without one.
    Token {
        resource_type: String,
        path: String,
        value: String,
        #[arg(long, default_value = "")]
        system: String,
    },

    /// Reference match, e.g. Organization/o1.
    Reference {
        resource_type: String,
        path: String,
        value: String,
    },

    /// Quantity match with exact decimal equality.
    Quantity {
        resource_type: String,
        name: String,
        path: String,
        value: String,
        #[arg(long, default_value = "")]
        system: String,
        #[arg(long, default_value = "")]
        unit: String,
    },
}

fn parse_reference(s: &str) -> Result<ResourceKey, String> {
    ResourceKey::parse(s).ok_or_else(|| format!("expected Type/id, got '{}'", s))
}

fn parse_kind(s: &str) -> Result<IndexKind, String> {
    IndexKind::parse(s).ok_or_else(|| format!("unknown index kind '{}'", s))
}

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_resource_store={},resource_store={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn open_store(cli: &Cli) -> anyhow::Result<SqliteBackend> {
    info!(database = %cli.database.display(), "Opening resource store");

    let mut backend = SqliteBackend::with_config(&cli.database, SqliteBackendConfig::from_env())?;

    if let Some(path) = &cli.index_config {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading index definitions from {}", path.display()))?;
        let registry = IndexRegistry::from_json(&json)?;
        info!(definitions = registry.len(), "Loaded index definitions");
        backend = backend.with_extractor(PathIndexExtractor::from_registry(registry));
    }

    backend.init_schema()?;
    Ok(backend)
}

fn import(store: &SqliteBackend, file: &PathBuf, batch_size: usize) -> anyhow::Result<()> {
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );

    let mut batch = Vec::with_capacity(batch_size);
    let mut created = 0usize;
    let mut replaced = 0usize;

    let mut flush = |batch: &mut Vec<Resource>| -> anyhow::Result<()> {
        for outcome in store.upsert_all(batch)? {
            if outcome.created {
                created += 1;
            } else {
                replaced += 1;
            }
        }
        batch.clear();
        Ok(())
    };

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("line {}: invalid JSON", line_no + 1))?;
        let resource =
            Resource::from_json(value).with_context(|| format!("line {}", line_no + 1))?;
        batch.push(resource);

        if batch.len() >= batch_size.max(1) {
            flush(&mut batch)?;
        }
    }
    if !batch.is_empty() {
        flush(&mut batch)?;
    }

    info!(created, replaced, "Import complete");
    println!("imported {} resources ({} created, {} replaced)", created + replaced, created, replaced);
    Ok(())
}

fn print_resources(resources: &[Resource]) -> anyhow::Result<()> {
    for resource in resources {
        println!("{}", serde_json::to_string(resource.content())?);
    }
    Ok(())
}

fn print_kind<T: Serialize>(kind: IndexKind, entries: &[T]) -> anyhow::Result<()> {
    for entry in entries {
        println!("{}\t{}", kind, serde_json::to_string(entry)?);
    }
    Ok(())
}

fn print_entries(
    store: &SqliteBackend,
    key: &ResourceKey,
    only: Option<IndexKind>,
) -> anyhow::Result<()> {
    let Some(entries) = store.index_entries(&key.resource_type, &key.id)? else {
        anyhow::bail!("{} not found", key);
    };

    for kind in IndexKind::ALL {
        if only.is_some_and(|wanted| wanted != kind) {
            continue;
        }
        match kind {
            IndexKind::String => print_kind(kind, &entries.strings)?,
            IndexKind::Token => print_kind(kind, &entries.tokens)?,
            IndexKind::Reference => print_kind(kind, &entries.references)?,
            IndexKind::Quantity => print_kind(kind, &entries.quantities)?,
        }
    }
    Ok(())
}

fn find(store: &SqliteBackend, command: FindCommand) -> anyhow::Result<()> {
    let resources = match command {
        FindCommand::String {
            resource_type,
            path,
            value,
        } => store.find_by_string(&resource_type, &path, &value)?,
        FindCommand::Token {
            resource_type,
            path,
            value,
            system,
        } => store.find_by_token(&resource_type, &path, &system, &value)?,
        FindCommand::Reference {
            resource_type,
            path,
            value,
        } => store.find_by_reference(&resource_type, &path, &value)?,
        FindCommand::Quantity {
            resource_type,
            name,
            path,
            value,
            system,
            unit,
        } => {
            let value = Decimal::from_str(&value)
                .with_context(|| format!("invalid decimal: {}", value))?;
            let criteria = QuantityIndex::new(name, path, system, value, unit);
            store.find_by_quantity(&resource_type, &criteria)?
        }
    };
    print_resources(&resources)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let store = open_store(&cli)?;

    match cli.command {
        Command::Import { file, batch_size } => import(&store, &file, batch_size)?,
        Command::Get { resource_type, id } => match store.get(&resource_type, &id)? {
            Some(resource) => {
                println!("{}", serde_json::to_string_pretty(&resource.into_content())?)
            }
            None => {
                eprintln!("{}/{} not found", resource_type, id);
                std::process::exit(1);
            }
        },
        Command::Delete { resource_type, id } => {
            if store.delete(&resource_type, &id)? {
                println!("deleted {}/{}", resource_type, id);
            } else {
                println!("{}/{} not found", resource_type, id);
            }
        }
        Command::Count { resource_type } => println!("{}", store.count(&resource_type)?),
        Command::Find(command) => find(&store, command)?,
        Command::Query { query, resources } => {
            let query: RawQuery = serde_json::from_str(&query).context("invalid query JSON")?;
            if resources {
                print_resources(&store.raw_query_resources(&query)?)?;
            } else {
                for key in store.raw_query(&query)? {
                    println!("{}", key);
                }
            }
        }
        Command::Entries { reference, kind } => print_entries(&store, &reference, kind)?,
        Command::Reindex { resource_type } => {
            let summary = store.reindex(&resource_type)?;
            println!(
                "reindexed {} {} resources ({} index rows)",
                summary.resources, summary.resource_type, summary.index_rows
            );
        }
    }

    Ok(())
}
