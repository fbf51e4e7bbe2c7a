// 📒 Ledger Lookup Tables - per-company GL configuration
// Four independent tables joined only by the lookup chain:
// transaction field → mercury account → ledger preset → ledger record

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::transaction::{display_value, path_value};

// ============================================================================
// TABLE ROWS
// ============================================================================

/// Mercury bank account row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MercuryAccount {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// Ledger preset: a named GL slot (key + label)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPreset {
    pub id: i64,
    pub key: String,
    pub label: String,
}

// ============================================================================
// LOOKUP CONTEXT
// ============================================================================

/// Lookup context for one company.
///
/// `ledger_records` is always present; the three joinable tables may be
/// absent on a partially configured company, in which case the chain
/// short-circuits to "no value" instead of erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerContext {
    /// Ledger preset key → per-company GL name override
    #[serde(default)]
    pub ledger_records: HashMap<String, String>,

    #[serde(default)]
    pub mercury_accounts: Option<Vec<MercuryAccount>>,

    #[serde(default)]
    pub ledger_presets: Option<Vec<LedgerPreset>>,

    /// Mercury account id → ledger preset id (at most one active per account)
    #[serde(default)]
    pub account_mappings: Option<HashMap<i64, i64>>,
}

impl LedgerContext {
    /// Load a context from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read ledger context: {:?}", path.as_ref()))?;

        let context: LedgerContext =
            serde_json::from_str(&content).context("Failed to parse ledger context JSON")?;

        Ok(context)
    }

    /// Direct ledger record lookup by preset key
    pub fn record(&self, key: &str) -> Option<&str> {
        self.ledger_records.get(key).map(String::as_str)
    }

    /// Resolve `property` on the transaction snapshot, then walk the chain
    /// to the final ledger record value. Any missing hop yields `None`.
    pub fn lookup_value(&self, txn: &Value, property: &str) -> Option<String> {
        if !self.tables_present() {
            return None;
        }
        let lookup = display_value(path_value(txn, property)?)?;
        if lookup.is_empty() {
            return None;
        }
        let account = self.match_account(&lookup)?;
        let preset = self.preset_for_account(account.id)?;
        self.ledger_records.get(&preset.key).cloned()
    }

    /// Same chain as [`lookup_value`](Self::lookup_value) but stops one hop
    /// earlier, returning the preset's key. Composes as
    /// `ledgerLookup(ledgerPresetKey(lookup:X))`.
    ///
    /// `arg` may be `lookup:<path>`, `txn.<path>`, or a plain additional
    /// variable name.
    pub fn preset_key(
        &self,
        arg: &str,
        txn: &Value,
        vars: &HashMap<String, String>,
    ) -> Option<String> {
        if !self.tables_present() {
            return None;
        }

        let lookup = if let Some(path) = arg.strip_prefix("lookup:") {
            path_value(txn, path).and_then(display_value)
        } else if let Some(path) = arg.strip_prefix("txn.") {
            path_value(txn, path).and_then(display_value)
        } else {
            vars.get(arg).cloned()
        }?;

        if lookup.is_empty() {
            return None;
        }
        let account = self.match_account(&lookup)?;
        let preset = self.preset_for_account(account.id)?;
        Some(preset.key.clone())
    }

    fn tables_present(&self) -> bool {
        self.mercury_accounts.is_some()
            && self.ledger_presets.is_some()
            && self.account_mappings.is_some()
    }

    /// First account whose name, external id, or nickname equals the value.
    /// Case-sensitive exact match; accounts are expected to be uniquely
    /// named so first match wins.
    fn match_account(&self, value: &str) -> Option<&MercuryAccount> {
        self.mercury_accounts.as_ref()?.iter().find(|account| {
            account.name == value
                || account.external_id == value
                || account.nickname.as_deref() == Some(value)
        })
    }

    fn preset_for_account(&self, account_id: i64) -> Option<&LedgerPreset> {
        let preset_id = *self.account_mappings.as_ref()?.get(&account_id)?;
        self.ledger_presets
            .as_ref()?
            .iter()
            .find(|preset| preset.id == preset_id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
