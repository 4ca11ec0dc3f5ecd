//! Instrument reference data.
//!
//! Every tradable instrument (a country ETF) belongs to exactly one country.
//! The universe is immutable once built and is what the execution engine
//! validates account state against.

use std::collections::{BTreeMap, HashSet};

use super::error::RebalanceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub symbol: String,
    pub country: String,
}

impl Instrument {
    pub fn new(symbol: &str, country: &str) -> Self {
        Instrument {
            symbol: symbol.trim().to_uppercase(),
            country: country.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    instruments: BTreeMap<String, Instrument>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty symbol")]
    EmptySymbol,

    #[error("empty country for {0}")]
    EmptyCountry(String),

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl Universe {
    pub fn from_instruments(instruments: Vec<Instrument>) -> Result<Self, UniverseError> {
        let mut map = BTreeMap::new();
        let mut seen = HashSet::new();

        for inst in instruments {
            if inst.symbol.is_empty() {
                return Err(UniverseError::EmptySymbol);
            }
            if inst.country.is_empty() {
                return Err(UniverseError::EmptyCountry(inst.symbol));
            }
            if !seen.insert(inst.symbol.clone()) {
                return Err(UniverseError::DuplicateSymbol(inst.symbol));
            }
            map.insert(inst.symbol.clone(), inst);
        }

        Ok(Universe { instruments: map })
    }

    pub fn count(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    pub fn country_of(&self, symbol: &str) -> Option<&str> {
        self.instruments.get(symbol).map(|i| i.country.as_str())
    }

    /// Symbols in ascending order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    /// All instruments listed for `country`, in symbol order.
    pub fn instruments_in(&self, country: &str) -> Vec<&Instrument> {
        self.instruments
            .values()
            .filter(|i| i.country == country)
            .collect()
    }

    /// Sub-universe holding only `symbols`.
    pub fn restrict(&self, symbols: &[String]) -> Result<Universe, RebalanceError> {
        let mut instruments = BTreeMap::new();
        for symbol in symbols {
            let inst = self
                .instruments
                .get(symbol)
                .ok_or_else(|| RebalanceError::UnknownInstrument {
                    symbol: symbol.clone(),
                })?;
            instruments.insert(symbol.clone(), inst.clone());
        }
        Ok(Universe { instruments })
    }
}

/// Parse a comma-separated symbol list, e.g. from a command line override.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptySymbol);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}
