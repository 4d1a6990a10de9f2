//! End-to-end drivers: rules in, canonicalized variants out.
//!
//! Each schema or coupling combination is written onto its own clone of the
//! input molecule before canonicalization.

use anyhow::{Context, Result};
use tracing::*;

use crate::*;

/// Textual labeling rules as they arrive from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelingRequest {
    pub specific: Vec<String>,
    pub all: Vec<String>,
    pub enumerate: Vec<String>,
    pub complete: bool,
    pub ignore_existing: bool,
}

impl LabelingRequest {
    pub fn options(&self) -> LabelingOptions {
        LabelingOptions {
            complete: self.complete,
            ignore_existing: self.ignore_existing,
        }
    }

    /// Parses every rule string and appends the Existing rules read from
    /// `molecule`.
    pub fn rules(&self, molecule: &MoleculeGraph) -> Result<Vec<IsotopeRule>, ValidationError> {
        let mut rules = vec![];
        for rule in &self.all {
            rules.push(parse_all_rule(rule)?);
        }
        for rule in &self.specific {
            rules.push(parse_specific_rule(rule)?);
        }
        for rule in &self.enumerate {
            rules.push(parse_enumerate_rule(rule)?);
        }
        rules.extend(IsotopeRule::existing_in(molecule));
        Ok(rules)
    }
}

/// One variant per labeling schema, ids numbered from 1 in schema order.
pub fn label_variants<C>(
    molecule: &MoleculeGraph,
    config: &IsotopeConfiguration,
    request: &LabelingRequest,
    canonicalizer: &C,
) -> Result<Vec<Variant>>
where
    C: Canonicalizer + ?Sized,
{
    let rules = request.rules(molecule)?;
    debug!("Generating labeling schemas from {} rules", rules.len());

    let schemas = generate_labeling_schemas(&rules, config, molecule, request.options())?;
    let mut variants = vec![];
    for (index, schema) in schemas.enumerate() {
        let labeled = schema
            .apply(molecule)
            .with_context(|| format!("Failed to apply labeling schema {}", schema))?;
        let canonical_id = canonicalizer.canonicalize(&labeled)?;
        variants.push(Variant {
            id: (index + 1).to_string(),
            labels: schema.pairs().map(|(position, isotope)| (position, isotope.to_string())).collect(),
            canonical_id,
            coupling_types: vec![],
        });
    }
    info!("Generated {} labeled variants", variants.len());
    Ok(variants)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmrVariants {
    pub variants: Vec<Variant>,
    pub grouping: Grouping,
}

/// One variant per coupling combination, grouped by magnetic equivalence.
pub fn nmr_variants<C>(
    molecule: &MoleculeGraph,
    experiment: &NmrExperiment,
    subset: bool,
    canonicalizer: &C,
) -> Result<NmrVariants>
where
    C: Canonicalizer + ?Sized,
{
    let combinations = experiment.generate_coupling_combinations(molecule, subset);

    let mut variants = Vec::with_capacity(combinations.len());
    for (index, combination) in combinations.iter().enumerate() {
        let labeled = combination
            .apply(molecule)
            .with_context(|| format!("Failed to apply coupling combination {}", combination))?;
        let canonical_id = canonicalizer.canonicalize(&labeled)?;
        variants.push(Variant {
            id: (index + 1).to_string(),
            labels: combination.isotope_layer(),
            canonical_id,
            coupling_types: combination.names(),
        });
    }

    let grouping = annotate(&variants, molecule, canonicalizer)?;
    Ok(NmrVariants { variants, grouping })
}

/// The molecule with every charge state applied, canonicalized.
pub fn charge_variant<C>(molecule: &MoleculeGraph, states: &[ChargeState], canonicalizer: &C) -> Result<Variant>
where
    C: Canonicalizer + ?Sized,
{
    let charged = apply_charge_states(molecule, states)?;
    let canonical_id = canonicalizer
        .canonicalize(&charged)
        .context("Failed to canonicalize charged molecule")?;
    Ok(Variant {
        id: states.iter().map(ChargeState::to_string).collect::<Vec<_>>().join(","),
        labels: charged.isotope_layer(),
        canonical_id,
        coupling_types: vec![],
    })
}
