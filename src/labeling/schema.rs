use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::vec;

use itertools::structs::MultiProduct;
use itertools::Itertools;
use tracing::*;

use super::{validate_rules, CountConstraint, IsotopeRule, LabelingOptions};
use crate::{Atom, IsotopeConfiguration, MoleculeError, MoleculeGraph, Position, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub position: Position,
    pub symbol: String,
    pub isotope: String,
}

impl Label {
    pub fn new(position: Position, symbol: impl Into<String>, isotope: impl Into<String>) -> Self {
        Self {
            position,
            symbol: symbol.into(),
            isotope: isotope.into(),
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}{}{}", self.isotope, self.symbol, self.position)
    }
}

/// One isotope assignment for a molecule: labels strictly increasing by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelingSchema {
    labels: Vec<Label>,
}

impl LabelingSchema {
    fn from_labels(labels: BTreeMap<Position, Label>) -> Self {
        Self {
            labels: labels.into_values().collect(),
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (Position, &str)> {
        self.labels
            .iter()
            .map(|label| (label.position, label.isotope.as_str()))
    }

    /// Writes the schema onto a private copy of `molecule`, replacing whatever
    /// isotope layer it carried.
    pub fn apply(&self, molecule: &MoleculeGraph) -> Result<MoleculeGraph, MoleculeError> {
        molecule.with_isotopes(self.pairs())
    }
}

impl Display for LabelingSchema {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.labels.iter().join(","))
    }
}

type Candidates = vec::IntoIter<Option<String>>;

enum Pending {
    Single(Option<LabelingSchema>),
    Product(MultiProduct<Candidates>),
}

/// A finite, lazily evaluated stream of labeling schemas.
///
/// Produced by [`generate_labeling_schemas`]; a fresh call is needed to walk the
/// schemas again. Dropping the iterator early has no side effects.
pub struct LabelingSchemas<'a> {
    atoms: Vec<&'a Atom>,
    config: &'a IsotopeConfiguration,
    constraints: Vec<CountConstraint>,
    complete: bool,
    pending: Pending,
}

fn fill_defaults(
    atoms: &[&Atom],
    config: &IsotopeConfiguration,
    complete: bool,
    labels: &mut BTreeMap<Position, Label>,
) {
    if !complete {
        return;
    }
    for atom in atoms {
        if labels.contains_key(&atom.position) {
            continue;
        }
        // Validation made sure every element has a default when `complete` is set.
        if let Some(default) = config.default_isotope(&atom.symbol) {
            labels.insert(atom.position, Label::new(atom.position, &atom.symbol, default));
        }
    }
}

fn admits(atoms: &[&Atom], constraints: &[CountConstraint], draw: &[Option<String>]) -> bool {
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for (atom, isotope) in atoms.iter().zip(draw) {
        if let Some(isotope) = isotope {
            *counts.entry((atom.symbol.as_str(), isotope.as_str())).or_default() += 1;
        }
    }
    constraints.iter().all(|constraint| {
        let count = counts
            .get(&(constraint.symbol.as_str(), constraint.isotope.as_str()))
            .copied()
            .unwrap_or(0);
        constraint.admits(count)
    })
}

impl Iterator for LabelingSchemas<'_> {
    type Item = LabelingSchema;

    fn next(&mut self) -> Option<Self::Item> {
        let Self {
            atoms,
            config,
            constraints,
            complete,
            pending,
        } = self;
        let product = match pending {
            Pending::Single(schema) => return schema.take(),
            Pending::Product(product) => product,
        };

        loop {
            let draw = product.next()?;
            if !admits(atoms, constraints, &draw) {
                continue;
            }

            let mut labels: BTreeMap<Position, Label> = atoms
                .iter()
                .zip(draw)
                .filter_map(|(atom, isotope)| {
                    isotope.map(|isotope| (atom.position, Label::new(atom.position, &atom.symbol, isotope)))
                })
                .collect();
            fill_defaults(atoms, *config, *complete, &mut labels);
            if labels.is_empty() {
                continue;
            }

            let schema = LabelingSchema::from_labels(labels);
            trace!("Yielding labeling schema {}", schema);
            return Some(schema);
        }
    }
}

/// Validates `rules` and returns the schemas they describe.
///
/// Without Enumerate rules exactly one schema is produced: the merged fixed
/// labels (All, then Specific, then Existing), topped up with defaults when
/// `options.complete` is set.
///
/// With Enumerate rules every position not pinned by a Specific/Existing rule may
/// take any isotope named by an Enumerate rule for its element, or stay
/// unlabeled; every combination whose per-isotope counts satisfy all Enumerate
/// bounds becomes a schema. The number of combinations grows exponentially with
/// the number of free positions, so callers should keep the enumerated elements
/// and count ranges narrow.
///
/// All validation happens here, before the first schema is produced.
pub fn generate_labeling_schemas<'a>(
    rules: &[IsotopeRule],
    config: &'a IsotopeConfiguration,
    molecule: &'a MoleculeGraph,
    options: LabelingOptions,
) -> Result<LabelingSchemas<'a>, ValidationError> {
    let validated = validate_rules(rules, config, molecule, options)?;
    let atoms = molecule.atoms();

    let mut schemas = LabelingSchemas {
        atoms,
        config,
        constraints: validated.constraints,
        complete: options.complete,
        pending: Pending::Single(None),
    };

    if schemas.constraints.is_empty() {
        let mut labels = validated.fixed;
        fill_defaults(&schemas.atoms, config, options.complete, &mut labels);
        schemas.pending = Pending::Single(Some(LabelingSchema::from_labels(labels)));
        return Ok(schemas);
    }

    let mut isotopes_per_symbol: BTreeMap<&str, Vec<Option<String>>> = BTreeMap::new();
    for constraint in &schemas.constraints {
        let candidates = isotopes_per_symbol
            .entry(constraint.symbol.as_str())
            .or_insert_with(|| vec![None]);
        let isotope = Some(constraint.isotope.clone());
        if !candidates.contains(&isotope) {
            candidates.push(isotope);
        }
    }

    let candidates: Vec<Vec<Option<String>>> = schemas
        .atoms
        .iter()
        .map(|atom| match validated.fixed.get(&atom.position) {
            Some(label) => vec![Some(label.isotope.clone())],
            None => isotopes_per_symbol
                .get(atom.symbol.as_str())
                .cloned()
                .unwrap_or_else(|| vec![None]),
        })
        .collect();

    let combinations = candidates
        .iter()
        .try_fold(1usize, |total, choices| total.checked_mul(choices.len()));
    match combinations {
        Some(total) => debug!("Enumerating {} candidate labelings", total),
        None => warn!("Candidate labelings exceed {}, enumeration will not finish in practice", usize::MAX),
    }

    schemas.pending = Pending::Product(candidates.into_iter().multi_cartesian_product());
    Ok(schemas)
}
