//! Symbol registry: the static symbol -> industry mapping.
//!
//! Loaded once at startup from a CSV file with `Symbol` and `Industry`
//! columns. When the file is missing, unreadable, or yields no usable rows,
//! a small built-in table is used instead so the registry is never empty.

use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use super::normalize_symbol;

/// Industry label used when a row leaves it blank.
pub const OTHER_INDUSTRY: &str = "Other";

/// One raw row from the registry source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRow {
    pub symbol: String,
    pub industry: String,
}

impl RegistryRow {
    pub fn new(symbol: impl Into<String>, industry: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            industry: industry.into(),
        }
    }
}

/// Built-in mapping used when the registry source is unavailable.
const BUILTIN_MAPPING: &[(&str, &[&str])] = &[
    ("Information Technology", &["TCS", "INFY", "WIPRO", "HCLTECH", "TECHM"]),
    ("Financial Services", &["HDFCBANK", "ICICIBANK", "SBIN", "KOTAKBANK", "AXISBANK"]),
    ("Oil Gas & Consumable Fuels", &["RELIANCE", "ONGC", "BPCL"]),
    ("Fast Moving Consumer Goods", &["HINDUNILVR", "ITC", "NESTLEIND"]),
    ("Automobile and Auto Components", &["MARUTI", "TATAMOTORS", "M&M"]),
    ("Healthcare", &["SUNPHARMA", "DRREDDY", "CIPLA"]),
    ("Power", &["NTPC", "POWERGRID"]),
];

/// Immutable symbol -> industry registry.
///
/// Constructed once and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SymbolRegistry {
    /// Industries in first-seen order, each with unique members in first-seen order
    industries: Vec<(String, Vec<String>)>,
    /// Every registered symbol, in first-seen order
    ordered_symbols: Vec<String>,
    /// Membership set
    all_symbols: HashSet<String>,
    /// Reverse index: symbol -> industries
    by_symbol: HashMap<String, Vec<String>>,
    /// Whether the built-in table was substituted
    fallback: bool,
}

impl SymbolRegistry {
    /// Load from a CSV file, falling back to the built-in table on any failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match Self::read_rows(path).and_then(Self::from_rows) {
            Ok(registry) => {
                info!(
                    path = %path.display(),
                    industries = registry.industries.len(),
                    symbols = registry.all_symbols.len(),
                    "Loaded symbol registry"
                );
                registry
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load symbol registry, using built-in mapping"
                );
                Self::builtin()
            }
        }
    }

    /// Read raw rows from a CSV file.
    ///
    /// Header names are matched case-insensitively; the first header
    /// containing "symbol" and the first containing "industry" are used.
    /// Extra columns are ignored. A missing industry column maps every row
    /// to [`OTHER_INDUSTRY`].
    pub fn read_rows(path: &Path) -> Result<Vec<RegistryRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open registry {}", path.display()))?;

        let headers = reader
            .headers()
            .context("Failed to read registry header")?
            .clone();

        let find = |needle: &str| {
            headers
                .iter()
                .position(|h| h.to_lowercase().contains(needle))
        };

        let symbol_idx = match find("symbol") {
            Some(idx) => idx,
            None => bail!("Registry {} has no Symbol column", path.display()),
        };
        let industry_idx = find("industry");

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("Malformed registry row")?;
            let symbol = record.get(symbol_idx).unwrap_or_default();
            let industry = industry_idx
                .and_then(|idx| record.get(idx))
                .unwrap_or_default();
            rows.push(RegistryRow::new(symbol, industry));
        }

        Ok(rows)
    }

    /// Build a registry from raw rows.
    ///
    /// Fails when no row survives normalization.
    pub fn from_rows(rows: impl IntoIterator<Item = RegistryRow>) -> Result<Self> {
        let registry = Self::build(rows, false);
        if registry.all_symbols.is_empty() {
            bail!("Registry source contained no usable rows");
        }
        Ok(registry)
    }

    /// The built-in fallback registry.
    pub fn builtin() -> Self {
        let rows = BUILTIN_MAPPING.iter().flat_map(|(industry, symbols)| {
            symbols.iter().map(move |s| RegistryRow::new(*s, *industry))
        });
        Self::build(rows, true)
    }

    fn build(rows: impl IntoIterator<Item = RegistryRow>, fallback: bool) -> Self {
        let mut industries: Vec<(String, Vec<String>)> = Vec::new();
        let mut industry_pos: HashMap<String, usize> = HashMap::new();
        let mut members: HashMap<String, HashSet<String>> = HashMap::new();
        let mut ordered_symbols = Vec::new();
        let mut all_symbols = HashSet::new();
        let mut by_symbol: HashMap<String, Vec<String>> = HashMap::new();

        for row in rows {
            let symbol = normalize_symbol(&row.symbol);
            if symbol.is_empty() {
                continue;
            }

            let industry = match row.industry.trim() {
                "" => OTHER_INDUSTRY.to_string(),
                label => label.to_string(),
            };

            if !members
                .entry(industry.clone())
                .or_default()
                .insert(symbol.clone())
            {
                continue;
            }

            let pos = *industry_pos.entry(industry.clone()).or_insert_with(|| {
                industries.push((industry.clone(), Vec::new()));
                industries.len() - 1
            });
            industries[pos].1.push(symbol.clone());

            if all_symbols.insert(symbol.clone()) {
                ordered_symbols.push(symbol.clone());
            }
            by_symbol.entry(symbol).or_default().push(industry);
        }

        Self {
            industries,
            ordered_symbols,
            all_symbols,
            by_symbol,
            fallback,
        }
    }

    /// Industries with their member symbols, in load order.
    pub fn industries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.industries
            .iter()
            .map(|(name, symbols)| (name.as_str(), symbols.as_slice()))
    }

    /// Members of one industry (exact label match).
    pub fn members(&self, industry: &str) -> Option<&[String]> {
        self.industries
            .iter()
            .find(|(name, _)| name == industry)
            .map(|(_, symbols)| symbols.as_slice())
    }

    /// All registered symbols in load order.
    pub fn symbols(&self) -> &[String] {
        &self.ordered_symbols
    }

    /// Membership set of all registered symbols.
    pub fn all_symbols(&self) -> &HashSet<String> {
        &self.all_symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.all_symbols.contains(symbol)
    }

    /// Industries a symbol belongs to.
    pub fn industries_for(&self, symbol: &str) -> &[String] {
        self.by_symbol
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First industry a symbol was registered under.
    pub fn primary_industry(&self, symbol: &str) -> Option<&str> {
        self.industries_for(symbol).first().map(String::as_str)
    }

    /// Reverse index used by the aggregator.
    pub fn symbol_to_industries(&self) -> &HashMap<String, Vec<String>> {
        &self.by_symbol
    }

    pub fn len(&self) -> usize {
        self.all_symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_symbols.is_empty()
    }

    pub fn industry_count(&self) -> usize {
        self.industries.len()
    }

    /// Whether the built-in table was substituted for the configured source.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_from_rows_normalizes_and_dedupes() {
        let registry = SymbolRegistry::from_rows(vec![
            RegistryRow::new("tcs.ns", " Information Technology "),
            RegistryRow::new("TCS", "Information Technology"),
            RegistryRow::new("INFY", "Information Technology"),
            RegistryRow::new("ITC", ""),
            RegistryRow::new("   ", "Power"),
        ])
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.members("Information Technology").unwrap(),
            &["TCS".to_string(), "INFY".to_string()]
        );
        assert_eq!(registry.primary_industry("ITC"), Some(OTHER_INDUSTRY));
        assert!(registry.members("Power").is_none());
        assert!(!registry.is_fallback());
    }

    #[test]
    fn test_multi_industry_membership() {
        let registry = SymbolRegistry::from_rows(vec![
            RegistryRow::new("RELIANCE", "Energy"),
            RegistryRow::new("RELIANCE", "Retail"),
        ])
        .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.industries_for("RELIANCE").len(), 2);
        assert_eq!(registry.industry_count(), 2);
        assert_eq!(registry.symbols(), &["RELIANCE".to_string()]);
    }

    #[test]
    fn test_from_rows_empty_fails() {
        assert!(SymbolRegistry::from_rows(Vec::new()).is_err());
        assert!(SymbolRegistry::from_rows(vec![RegistryRow::new("", "IT")]).is_err());
    }

    #[test]
    fn test_load_csv() {
        let file = write_csv(
            "Company Name,Industry,Symbol,Series\n\
             Tata Consultancy Services,Information Technology,TCS,EQ\n\
             Infosys,Information Technology,INFY,EQ\n\
             NTPC,Power,ntpc,EQ\n",
        );

        let registry = SymbolRegistry::load(file.path());
        assert!(!registry.is_fallback());
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("NTPC"));
        assert_eq!(registry.industry_count(), 2);
    }

    #[test]
    fn test_load_csv_without_industry_column() {
        let file = write_csv("Symbol\nTCS\nINFY\n");
        let registry = SymbolRegistry::load(file.path());
        assert_eq!(registry.members(OTHER_INDUSTRY).unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let registry = SymbolRegistry::load("/nonexistent/registry.csv");
        assert!(registry.is_fallback());
        assert!(!registry.is_empty());
        assert!(registry.industry_count() > 0);
    }

    #[test]
    fn test_load_empty_file_falls_back() {
        let file = write_csv("Symbol,Industry\n");
        let registry = SymbolRegistry::load(file.path());
        assert!(registry.is_fallback());
        assert!(!registry.all_symbols().is_empty());
    }

    #[test]
    fn test_load_without_symbol_column_falls_back() {
        let file = write_csv("Ticker,Industry\nTCS,IT\n");
        let registry = SymbolRegistry::load(file.path());
        assert!(registry.is_fallback());
    }
}
