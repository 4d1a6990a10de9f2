//! Error types shared by the labeling, NMR and configuration modules.

use thiserror::Error;

use crate::Position;

/// Errors raised while checking user supplied labeling rules against a molecule
/// and an isotope configuration.
///
/// Validation always happens before the first schema is produced, so any of
/// these aborts generation for the molecule as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Incorrect {kind} specification \"{rule}\", use {expected} format")]
    MalformedRuleString {
        kind: &'static str,
        rule: String,
        expected: &'static str,
    },
    #[error("Incorrect atom \"{symbol}\" provided, the molecule has no such element")]
    UnknownAtom { symbol: String },
    #[error("Incorrect isotope \"{isotope}\" provided for atom \"{symbol}\"")]
    UnknownIsotope { symbol: String, isotope: String },
    #[error("There is no \"{symbol}\" atom at position {position} (found {found:?})")]
    PositionMismatch {
        symbol: String,
        position: Position,
        found: Option<String>,
    },
    #[error("Only a single isotope can be specified per atom position, got {isotopes:?} at position {position}")]
    DuplicatePerPosition {
        position: Position,
        isotopes: Vec<String>,
    },
    #[error("Only a single isotope can be specified per atom type, got {isotopes:?} for \"{symbol}\"")]
    DuplicatePerType { symbol: String, isotopes: Vec<String> },
    #[error("\"enumerate\" and \"all\" rules are not compatible for atom \"{symbol}\"")]
    IncompatibleRules { symbol: String },
    #[error("Incorrect count {max} provided for {isotope}{symbol}, the molecule only has {available} such atoms")]
    CountOutOfRange {
        symbol: String,
        isotope: String,
        max: usize,
        available: usize,
    },
    #[error("Empty count range {min}..{max} provided for {isotope}{symbol}")]
    EmptyCountRange {
        symbol: String,
        isotope: String,
        min: usize,
        max: usize,
    },
    #[error("No default isotope is configured for atom \"{symbol}\"")]
    UnconfiguredElement { symbol: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NmrError {
    #[error("Unknown nmr experiment type: \"{0}\"")]
    UnknownExperimentType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoleculeError {
    #[error("Atom positions must be positive, got 0")]
    ZeroPosition,
    #[error("An atom already occupies position {0}")]
    DuplicatePosition(Position),
    #[error("No atom at position {0}")]
    UnknownPosition(Position),
}

/// Errors raised while loading an isotope table.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read isotope table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to open isotope table: {0}")]
    Io(#[from] std::io::Error),
    #[error("No isotopes listed for atom \"{0}\"")]
    EmptyIsotopes(String),
    #[error("Default isotope \"{default}\" for atom \"{symbol}\" is not among its allowed isotopes")]
    DefaultNotAllowed { symbol: String, default: String },
}
