// 📂 CSV Ingestion - labeled coin lists → coin table
// One row per coin; headers normalize to safe keys for selectors and JSON

use crate::keys::{normalize_key, KeyMap};
use std::collections::BTreeMap;
use thiserror::Error;

/// Recommended upper bound on coin rows before the UI asks for confirmation.
pub const DEFAULT_ROW_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV file has no header row")]
    NoHeader,
}

// ============================================================================
// COIN TABLE
// ============================================================================

/// A single coin: its id plus all row cells keyed by safe header key.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Coin {
    pub id: String,
    pub attrs: BTreeMap<String, String>,
}

impl Coin {
    /// Cell value for a safe key, trimmed. Missing cells read as empty.
    pub fn attr(&self, safe_key: &str) -> &str {
        self.attrs.get(safe_key).map(|v| v.trim()).unwrap_or("")
    }
}

/// The ingested CSV: coins in row order plus the raw↔safe header mapping.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CoinTable {
    pub coins: Vec<Coin>,
    pub key_map: KeyMap,
}

impl CoinTable {
    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// Distinct values per attribute, both sorted, for the filter dropdowns.
    pub fn attribute_values(&self) -> BTreeMap<String, Vec<String>> {
        let mut values: BTreeMap<String, std::collections::BTreeSet<String>> = BTreeMap::new();
        for coin in &self.coins {
            for (key, value) in &coin.attrs {
                if !value.is_empty() {
                    values.entry(key.clone()).or_default().insert(value.clone());
                }
            }
        }
        values
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect()
    }

    /// Sorted `attr=value` combination strings for the color dropdowns.
    pub fn attribute_combinations(&self) -> Vec<String> {
        let mut combos = std::collections::BTreeSet::new();
        for coin in &self.coins {
            for (key, value) in &coin.attrs {
                if !value.is_empty() {
                    combos.insert(format!("{}={}", key, value));
                }
            }
        }
        combos.into_iter().collect()
    }
}

// ============================================================================
// DECODING & PARSING
// ============================================================================

/// Decode raw upload bytes as Latin-1. Every byte maps to the Unicode scalar
/// with the same value, so this never fails and never drops data.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse CSV bytes into a coin table.
///
/// The first column is the coin id unless `id_column` names one (raw or safe
/// name accepted). Empty id cells fall back to the 1-based row index. Ragged
/// rows are tolerated: missing cells read as empty, extra cells are dropped.
pub fn load_coin_table(csv_bytes: &[u8], id_column: Option<&str>) -> Result<CoinTable, IngestError> {
    let text = decode_latin1(csv_bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.is_empty() {
        return Err(IngestError::NoHeader);
    }

    let key_map = KeyMap::from_headers(&headers);

    // Work out which safe key carries the node id (accept raw or safe)
    let id_key = match id_column {
        Some(name) => key_map.resolve(name),
        None => key_map
            .safe_keys()
            .next()
            .map(|s| s.to_string())
            .unwrap_or_else(|| normalize_key("id")),
    };

    let safe_keys: Vec<String> = key_map.safe_keys().map(|s| s.to_string()).collect();
    let mut coins = Vec::new();

    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        let mut attrs = BTreeMap::new();
        for (col, safe) in safe_keys.iter().enumerate() {
            let cell = record.get(col).unwrap_or("");
            attrs.insert(safe.clone(), cell.to_string());
        }

        let id_value = attrs
            .get(&id_key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .unwrap_or_else(|| (row_index + 1).to_string());

        coins.push(Coin { id: id_value, attrs });
    }

    Ok(CoinTable { coins, key_map })
}

// ============================================================================
// ROW GATE
// ============================================================================

/// Count data rows (excluding the header) without building the table.
pub fn count_rows(csv_bytes: &[u8]) -> Result<usize, IngestError> {
    let text = decode_latin1(csv_bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut count = 0usize;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

/// Re-emit the CSV keeping the header plus the first `limit` data rows.
/// Used when the user declines to load an oversized coin list in full.
pub fn truncate_csv(csv_bytes: &[u8], limit: usize) -> Result<Vec<u8>, IngestError> {
    let text = decode_latin1(csv_bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(&headers)?;

    for record in reader.records().take(limit) {
        writer.write_record(&record?)?;
    }

    let utf8 = writer
        .into_inner()
        .map_err(|e| IngestError::Csv(e.into_error().into()))?;
    // Back to Latin-1: the decode was byte-for-byte, chars stay in 0..=255
    Ok(String::from_utf8_lossy(&utf8)
        .chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================
