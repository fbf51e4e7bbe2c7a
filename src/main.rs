use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use mercury_export::{
    default_mappings, matches_export, process_template, ExportMapping, ExportType, LedgerContext,
    Transaction,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("render") => run_render(&args[2..]),
        Some("export") => run_export(&args[2..]),
        _ => {
            eprintln!("Usage:");
            eprintln!("  mercury-export render <template> <transactions.json> [vars.json] [context.json]");
            eprintln!("  mercury-export export <type> <transactions.json> [vars.json] [context.json] [mapping.json]");
            eprintln!();
            eprintln!("Export types: mercury-transactions, quickbooks-deposits,");
            eprintln!("              quickbooks-checks, quickbooks-credit-card");
            std::process::exit(1);
        }
    }
}

fn run_render(args: &[String]) -> Result<()> {
    let [template, txn_path, rest @ ..] = args else {
        bail!("render requires <template> and <transactions.json>");
    };

    let transactions = load_transactions(txn_path)?;
    let vars = match rest.first() {
        Some(path) => load_vars(path)?,
        None => HashMap::new(),
    };
    let ledger = match rest.get(1) {
        Some(path) => Some(LedgerContext::from_file(path)?),
        None => None,
    };

    println!("🧮 Rendering template for {} transactions", transactions.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for txn in &transactions {
        let rendered = process_template(template, txn, &vars, ledger.as_ref())?;
        println!("{} → {}", txn.id, rendered);
    }

    Ok(())
}

fn run_export(args: &[String]) -> Result<()> {
    let [type_code, txn_path, rest @ ..] = args else {
        bail!("export requires <type> and <transactions.json>");
    };

    let export_type = ExportType::from_code(type_code)
        .with_context(|| format!("Unknown export type: {type_code}"))?;

    let transactions = load_transactions(txn_path)?;
    let vars = match rest.first() {
        Some(path) => load_vars(path)?,
        None => HashMap::new(),
    };
    let ledger = match rest.get(1) {
        Some(path) => Some(LedgerContext::from_file(path)?),
        None => None,
    };
    let mapping = match rest.get(2) {
        Some(path) => ExportMapping::from_file(path)?,
        None => default_mappings(export_type),
    };

    println!("🧾 {} export", export_type.name());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", mapping.headers().join(" | "));

    let mut exported = 0;
    for txn in &transactions {
        if !matches_export(txn, export_type) {
            continue;
        }
        let row = mapping.render_row(txn, &vars, ledger.as_ref())?;
        println!("{}", row.join(" | "));
        exported += 1;
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Exported {} of {} transactions", exported, transactions.len());

    Ok(())
}

fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<Transaction>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read transactions: {:?}", path.as_ref()))?;
    serde_json::from_str(&content).context("Failed to parse transactions JSON")
}

fn load_vars<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read variables: {:?}", path.as_ref()))?;
    serde_json::from_str(&content).context("Failed to parse variables JSON")
}
