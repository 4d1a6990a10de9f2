//! Isotope labeling rules and their validation against a molecule.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result as FmtResult};

use tracing::*;

use crate::{IsotopeConfiguration, MoleculeGraph, Position, ValidationError};

mod schema;
pub use schema::*;

/// One user (or structure-file) supplied isotope placement rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IsotopeRule {
    /// Label every atom of `symbol`.
    All { symbol: String, isotope: String },
    /// Label the atom at `position`.
    Specific {
        symbol: String,
        isotope: String,
        position: Position,
    },
    /// Enumerate every labeling with `min..=max` atoms of `symbol` carrying
    /// `isotope`. A `max` of `None` means "all atoms of that element".
    Enumerate {
        symbol: String,
        isotope: String,
        min: usize,
        max: Option<usize>,
    },
    /// An isotope already present in the input structure.
    Existing {
        symbol: String,
        isotope: String,
        position: Position,
    },
}

impl IsotopeRule {
    pub fn symbol(&self) -> &str {
        match self {
            IsotopeRule::All { symbol, .. }
            | IsotopeRule::Specific { symbol, .. }
            | IsotopeRule::Enumerate { symbol, .. }
            | IsotopeRule::Existing { symbol, .. } => symbol,
        }
    }

    pub fn isotope(&self) -> &str {
        match self {
            IsotopeRule::All { isotope, .. }
            | IsotopeRule::Specific { isotope, .. }
            | IsotopeRule::Enumerate { isotope, .. }
            | IsotopeRule::Existing { isotope, .. } => isotope,
        }
    }

    /// Derives `Existing` rules from the isotope layer already on `molecule`.
    pub fn existing_in(molecule: &MoleculeGraph) -> Vec<IsotopeRule> {
        molecule
            .atoms()
            .into_iter()
            .filter_map(|atom| {
                atom.isotope.as_ref().map(|isotope| IsotopeRule::Existing {
                    symbol: atom.symbol.clone(),
                    isotope: isotope.clone(),
                    position: atom.position,
                })
            })
            .collect()
    }
}

impl Display for IsotopeRule {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            IsotopeRule::All { symbol, isotope } => write!(f, "{isotope}:{symbol}"),
            IsotopeRule::Specific {
                symbol,
                isotope,
                position,
            }
            | IsotopeRule::Existing {
                symbol,
                isotope,
                position,
            } => write!(f, "{isotope}:{symbol}:{position}"),
            IsotopeRule::Enumerate {
                symbol,
                isotope,
                min,
                max: Some(max),
            } => write!(f, "{isotope}:{symbol}:{min}:{max}"),
            IsotopeRule::Enumerate {
                symbol,
                isotope,
                min,
                max: None,
            } => write!(f, "{isotope}:{symbol}:{min}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelingOptions {
    /// Fill every position not covered by a rule with the configured default
    /// isotope.
    pub complete: bool,
    /// Drop the isotope layer that came with the input structure.
    pub ignore_existing: bool,
}

/// An Enumerate rule with its upper bound resolved against the molecule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CountConstraint {
    pub symbol: String,
    pub isotope: String,
    pub min: usize,
    pub max: usize,
}

impl CountConstraint {
    pub fn admits(&self, count: usize) -> bool {
        self.min <= count && count <= self.max
    }
}

/// Rules that passed validation: fixed labels already merged in precedence order
/// and the count constraints left to enumerate.
#[derive(Debug, Clone, Default)]
pub(crate) struct ValidatedRules {
    pub fixed: BTreeMap<Position, Label>,
    pub constraints: Vec<CountConstraint>,
}

fn check_element(
    symbol: &str,
    isotope: &str,
    config: &IsotopeConfiguration,
    molecule: &MoleculeGraph,
) -> Result<(), ValidationError> {
    if !molecule.has_symbol(symbol) {
        return Err(ValidationError::UnknownAtom {
            symbol: symbol.to_string(),
        });
    }
    if !config.is_allowed(symbol, isotope) {
        return Err(ValidationError::UnknownIsotope {
            symbol: symbol.to_string(),
            isotope: isotope.to_string(),
        });
    }
    Ok(())
}

fn check_position(symbol: &str, position: Position, molecule: &MoleculeGraph) -> Result<(), ValidationError> {
    match molecule.atom(position) {
        Some(atom) if atom.is(symbol) => Ok(()),
        found => Err(ValidationError::PositionMismatch {
            symbol: symbol.to_string(),
            position,
            found: found.map(|atom| atom.symbol.clone()),
        }),
    }
}

/// Validates position-bound rules (Specific or Existing) and returns their labels.
fn positional_labels<'r>(
    rules: impl Iterator<Item = (&'r str, &'r str, Position)>,
    config: &IsotopeConfiguration,
    molecule: &MoleculeGraph,
) -> Result<BTreeMap<Position, Label>, ValidationError> {
    let mut requested: BTreeMap<Position, BTreeSet<&str>> = BTreeMap::new();
    let mut labels = BTreeMap::new();
    for (symbol, isotope, position) in rules {
        check_element(symbol, isotope, config, molecule)?;
        check_position(symbol, position, molecule)?;
        requested.entry(position).or_default().insert(isotope);
        labels.insert(position, Label::new(position, symbol, isotope));
    }

    if let Some((&position, isotopes)) = requested.iter().find(|(_, isotopes)| isotopes.len() > 1) {
        return Err(ValidationError::DuplicatePerPosition {
            position,
            isotopes: isotopes.iter().map(|isotope| isotope.to_string()).collect(),
        });
    }
    Ok(labels)
}

/// Checks every rule against `config` and `molecule` and merges the fixed ones
/// with precedence All, then Specific, then Existing (later wins on a shared
/// position). Existing rules are neither checked nor merged when
/// `options.ignore_existing` is set.
pub(crate) fn validate_rules(
    rules: &[IsotopeRule],
    config: &IsotopeConfiguration,
    molecule: &MoleculeGraph,
    options: LabelingOptions,
) -> Result<ValidatedRules, ValidationError> {
    let mut validated = ValidatedRules::default();

    // All
    let mut per_type: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for rule in rules {
        if let IsotopeRule::All { symbol, isotope } = rule {
            check_element(symbol, isotope, config, molecule)?;
            per_type.entry(symbol).or_default().insert(isotope);
            for atom in molecule.atoms_of_symbol(symbol) {
                validated
                    .fixed
                    .insert(atom.position, Label::new(atom.position, symbol, isotope));
            }
        }
    }
    if let Some((symbol, isotopes)) = per_type.iter().find(|(_, isotopes)| isotopes.len() > 1) {
        return Err(ValidationError::DuplicatePerType {
            symbol: symbol.to_string(),
            isotopes: isotopes.iter().map(|isotope| isotope.to_string()).collect(),
        });
    }

    // Specific
    let specific = positional_labels(
        rules.iter().filter_map(|rule| match rule {
            IsotopeRule::Specific {
                symbol,
                isotope,
                position,
            } => Some((symbol.as_str(), isotope.as_str(), *position)),
            _ => None,
        }),
        config,
        molecule,
    )?;
    validated.fixed.extend(specific);

    // Existing
    if options.ignore_existing {
        debug!("Ignoring the existing isotope layer");
    } else {
        let existing = positional_labels(
            rules.iter().filter_map(|rule| match rule {
                IsotopeRule::Existing {
                    symbol,
                    isotope,
                    position,
                } => Some((symbol.as_str(), isotope.as_str(), *position)),
                _ => None,
            }),
            config,
            molecule,
        )?;
        validated.fixed.extend(existing);
    }

    // Enumerate
    for rule in rules {
        if let IsotopeRule::Enumerate {
            symbol,
            isotope,
            min,
            max,
        } = rule
        {
            check_element(symbol, isotope, config, molecule)?;
            if per_type.contains_key(symbol.as_str()) {
                return Err(ValidationError::IncompatibleRules {
                    symbol: symbol.clone(),
                });
            }
            let available = molecule.count_symbol(symbol);
            let max = max.unwrap_or(available);
            if max > available {
                return Err(ValidationError::CountOutOfRange {
                    symbol: symbol.clone(),
                    isotope: isotope.clone(),
                    max,
                    available,
                });
            }
            if *min > max {
                return Err(ValidationError::EmptyCountRange {
                    symbol: symbol.clone(),
                    isotope: isotope.clone(),
                    min: *min,
                    max,
                });
            }
            validated.constraints.push(CountConstraint {
                symbol: symbol.clone(),
                isotope: isotope.clone(),
                min: *min,
                max,
            });
        }
    }

    if options.complete {
        for atom in molecule.atoms() {
            if config.default_isotope(&atom.symbol).is_none() {
                return Err(ValidationError::UnconfiguredElement {
                    symbol: atom.symbol.clone(),
                });
            }
        }
    }

    debug!(
        "Validated {} rules: {} fixed labels, {} count constraints",
        rules.len(),
        validated.fixed.len(),
        validated.constraints.len()
    );
    Ok(validated)
}
