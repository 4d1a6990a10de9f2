use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use lazy_static::lazy_static;
use tracing::*;

use crate::ConfigError;

/// Allowed isotope labels for one element and the label used to fill complete
/// schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsotopeSpec {
    pub allowed: BTreeSet<String>,
    pub default: String,
}

/// Element symbol to [`IsotopeSpec`] table. Passed explicitly to every entry point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IsotopeConfiguration {
    elements: BTreeMap<String, IsotopeSpec>,
}

lazy_static! {
    /// The table shipped with the crate: stable isotopes plus tritium and carbon-14.
    static ref STANDARD_ISOTOPES: IsotopeConfiguration = {
        let table: &[(&str, &[&str], &str)] = &[
            ("H", &["1", "2", "3"], "1"),
            ("C", &["12", "13", "14"], "12"),
            ("N", &["14", "15"], "14"),
            ("O", &["16", "17", "18"], "16"),
            ("F", &["19"], "19"),
            ("P", &["31"], "31"),
            ("S", &["32", "33", "34", "36"], "32"),
            ("Cl", &["35", "37"], "35"),
            ("Br", &["79", "81"], "79"),
        ];
        let mut config = IsotopeConfiguration::default();
        for (symbol, allowed, default) in table {
            config.elements.insert(
                symbol.to_string(),
                IsotopeSpec {
                    allowed: allowed.iter().map(|isotope| isotope.to_string()).collect(),
                    default: default.to_string(),
                },
            );
        }
        config
    };
}

impl IsotopeConfiguration {
    pub fn standard() -> Self {
        STANDARD_ISOTOPES.clone()
    }

    /// Adds or replaces the entry for `symbol`. The default must be one of the
    /// allowed isotopes.
    pub fn insert<I, S>(&mut self, symbol: &str, allowed: I, default: &str) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: BTreeSet<String> = allowed.into_iter().map(Into::into).collect();
        if allowed.is_empty() {
            return Err(ConfigError::EmptyIsotopes(symbol.to_string()));
        }
        if !allowed.contains(default) {
            return Err(ConfigError::DefaultNotAllowed {
                symbol: symbol.to_string(),
                default: default.to_string(),
            });
        }
        self.elements.insert(
            symbol.to_string(),
            IsotopeSpec {
                allowed,
                default: default.to_string(),
            },
        );
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&IsotopeSpec> {
        self.elements.get(symbol)
    }

    pub fn allowed(&self, symbol: &str) -> Option<&BTreeSet<String>> {
        self.elements.get(symbol).map(|spec| &spec.allowed)
    }

    pub fn default_isotope(&self, symbol: &str) -> Option<&str> {
        self.elements.get(symbol).map(|spec| spec.default.as_str())
    }

    pub fn is_allowed(&self, symbol: &str, isotope: &str) -> bool {
        self.allowed(symbol).is_some_and(|allowed| allowed.contains(isotope))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }

    /// Reads a `symbol,isotopes,default` table, isotopes separated by `;`.
    /// Blank rows are skipped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut config = Self::default();

        for result in rdr.records() {
            let record: StringRecord = result?;
            let symbol = record.get(0).unwrap_or("");
            let isotopes = record.get(1).unwrap_or("");
            let default = record.get(2).unwrap_or("");
            if symbol.is_empty() {
                warn!("Skipping isotope record without a symbol: {:?}", record);
                continue;
            }

            let allowed: Vec<&str> = isotopes
                .split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            config.insert(symbol, allowed, default)?;
        }
        debug!("Loaded isotope table for {} elements", config.elements.len());
        Ok(config)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }
}
