//! Command-line contact resolution.
//!
//! Reads existing canonical contacts (a JSON array) and incoming raw records
//! (JSON lines), resolves each record and prints one JSON line per outcome.
//!
//! **Usage:**
//! ```bash
//! contactlink --records incoming.jsonl --contacts contacts.json [--config contactlink.toml] [--dry-run]
//! ```

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

use contactlink::{
    CanonicalContact, Confidence, ContactStore, InMemoryContactStore, RawRecord, Resolver,
    ResolverConfig,
};

/// Contact identity resolution
#[derive(Parser, Debug)]
#[clap(name = "contactlink")]
#[clap(about = "Link incoming contact records to canonical contacts")]
struct Args {
    /// TOML configuration file
    #[clap(long, env = "CONTACTLINK_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Existing canonical contacts (JSON array); missing file means none
    #[clap(long, value_name = "FILE")]
    contacts: Option<PathBuf>,

    /// Incoming raw records, one JSON object per line
    #[clap(long, value_name = "FILE")]
    records: PathBuf,

    /// Where to write the resulting contacts (defaults to --contacts)
    #[clap(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Override the configured minimum confidence (exact, high, medium, low, none)
    #[clap(long)]
    min_confidence: Option<Confidence>,

    /// Preview matches only; nothing is written
    #[clap(long)]
    dry_run: bool,
}

fn load_contacts(path: Option<&Path>) -> Result<Vec<CanonicalContact>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read contacts from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse contacts in {}", path.display()))
}

fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open records {}", path.display()))?;
    let mut records = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), lineno + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn write_contacts(path: &Path, contacts: &[CanonicalContact]) -> Result<()> {
    let body = serde_json::to_string_pretty(contacts)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    info!(contacts = contacts.len(), path = %path.display(), "contacts written");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };
    let min_confidence = args.min_confidence.unwrap_or(config.min_confidence);

    let store = Arc::new(InMemoryContactStore::with_contacts(load_contacts(
        args.contacts.as_deref(),
    )?)?);
    let resolver = Resolver::new(store.clone(), config)?;
    let records = load_records(&args.records)?;
    info!(records = records.len(), %min_confidence, dry_run = args.dry_run, "resolving");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.dry_run {
        for (index, record) in records.iter().enumerate() {
            let result = resolver.find_best_match(record)?;
            let line = json!({
                "index": index,
                "confidence": result.confidence,
                "reason": result.reason,
                "score": result.score,
                "contactId": result.contact_id(),
                "wouldMerge": result.confidence != Confidence::None
                    && result.confidence.meets(min_confidence),
            });
            writeln!(out, "{line}")?;
        }
        return Ok(());
    }

    let outcome = resolver.resolve_batch(&records, min_confidence);
    let report = match &outcome {
        Ok(report) => Some(report),
        Err(err) => {
            error!(resume_from = err.resume_from, "batch aborted: {err}");
            None
        }
    };
    if let Some(report) = report {
        for item in &report.outcomes {
            let line = json!({
                "index": item.index,
                "created": item.resolution.created,
                "confidence": item.resolution.confidence,
                "reason": item.resolution.reason,
                "contactId": item.resolution.contact.id,
            });
            writeln!(out, "{line}")?;
        }
        for skipped in &report.skipped {
            let line = json!({ "index": skipped.index, "skipped": skipped.reason });
            writeln!(out, "{line}")?;
        }
    }

    // Whatever was applied before an abort is kept so the batch can resume.
    if let Some(path) = args.output.as_deref().or(args.contacts.as_deref()) {
        write_contacts(path, &store.list_all()?)?;
    }

    outcome.map(|_| ()).map_err(Into::into)
}
