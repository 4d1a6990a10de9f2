//! Magnetic equivalence grouping of canonicalized variants.
//!
//! Variants that share both a canonical identifier and a coupling descriptor
//! are indistinguishable in the experiment and land in the same `ME{n}` group.
//! Groups are numbered in order of first appearance, so the whole batch has to
//! be known before any id is handed out.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter, Result as FmtResult};

use anyhow::{Context, Result};
use tracing::*;

use crate::{Canonicalizer, MoleculeGraph, Position};

/// One labeled structure ready for grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub id: String,
    pub labels: Vec<(Position, String)>,
    pub canonical_id: String,
    pub coupling_types: Vec<String>,
}

impl Variant {
    pub fn descriptor(&self) -> String {
        coupling_descriptor(&self.coupling_types)
    }
}

/// Strips the atom part of every coupling name, `[1H2:1H3]TwoBondHH` becomes
/// `TwoBondHH`, and joins the kinds with `" + "`.
pub fn coupling_descriptor<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            match name.find(']') {
                Some(end) => &name[end + 1..],
                None => name,
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceGroup {
    /// 1-based, in order of first appearance.
    pub index: usize,
    pub canonical_id: String,
    pub descriptor: String,
    /// Member variant ids in batch order.
    pub members: Vec<String>,
}

impl EquivalenceGroup {
    pub fn tag(&self) -> String {
        format!("ME{}", self.index)
    }
}

/// The merged labeling of a group with more than one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateVariant {
    pub group: usize,
    /// Every distinct `(position, isotope)` pair of the members, in first-seen
    /// order. A position may appear with more than one isotope; the canonical
    /// id is computed with the last of them applied.
    pub labels: Vec<(Position, String)>,
    pub canonical_id: String,
    pub descriptor: String,
    pub coupling_types: Vec<String>,
}

impl AggregateVariant {
    pub fn tag(&self) -> String {
        format!("MEA{}", self.group)
    }
}

impl Display for AggregateVariant {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} {}", self.tag(), self.canonical_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grouping {
    /// Group tag of each batch entry, aligned with the input.
    pub assignments: Vec<String>,
    pub groups: Vec<EquivalenceGroup>,
    pub aggregates: Vec<AggregateVariant>,
}

/// Assigns every variant in `batch` to its equivalence group and builds the
/// aggregate of each group with more than one member.
///
/// Aggregate labels are applied to `molecule` and passed back through
/// `canonicalizer`; its failures are returned unchanged apart from context.
pub fn annotate<C>(batch: &[Variant], molecule: &MoleculeGraph, canonicalizer: &C) -> Result<Grouping>
where
    C: Canonicalizer + ?Sized,
{
    let mut keys: HashMap<(&str, String), usize> = HashMap::new();
    let mut groups: Vec<EquivalenceGroup> = vec![];
    let mut member_variants: Vec<Vec<&Variant>> = vec![];
    let mut assignments = Vec::with_capacity(batch.len());

    for variant in batch {
        let descriptor = variant.descriptor();
        let slot = *keys
            .entry((variant.canonical_id.as_str(), descriptor.clone()))
            .or_insert_with(|| {
                groups.push(EquivalenceGroup {
                    index: groups.len() + 1,
                    canonical_id: variant.canonical_id.clone(),
                    descriptor,
                    members: vec![],
                });
                member_variants.push(vec![]);
                groups.len() - 1
            });
        groups[slot].members.push(variant.id.clone());
        member_variants[slot].push(variant);
        assignments.push(groups[slot].tag());
    }

    let mut aggregates = vec![];
    for (group, members) in groups.iter().zip(&member_variants) {
        if members.len() < 2 {
            continue;
        }

        let mut seen: HashSet<&(Position, String)> = HashSet::new();
        let mut positions: HashSet<Position> = HashSet::new();
        let mut labels: Vec<(Position, String)> = vec![];
        for label in members.iter().copied().flat_map(|variant| &variant.labels) {
            if !seen.insert(label) {
                continue;
            }
            if !positions.insert(label.0) {
                debug!(
                    "Aggregate {} labels position {} with more than one isotope, keeping {}",
                    group.tag(),
                    label.0,
                    label.1
                );
            }
            labels.push(label.clone());
        }

        let mut coupling_types: Vec<String> = members
            .iter()
            .flat_map(|variant| variant.coupling_types.iter().cloned())
            .collect();
        coupling_types.sort();
        coupling_types.dedup();

        let labeled = molecule
            .with_isotopes(labels.iter().map(|(position, isotope)| (*position, isotope.as_str())))
            .with_context(|| format!("Failed to apply labels of aggregate {}", group.tag()))?;
        let canonical_id = canonicalizer
            .canonicalize(&labeled)
            .with_context(|| format!("Failed to canonicalize aggregate {}", group.tag()))?;

        aggregates.push(AggregateVariant {
            group: group.index,
            labels,
            canonical_id,
            descriptor: coupling_descriptor(&coupling_types),
            coupling_types,
        });
    }

    info!(
        "Grouped {} variants into {} equivalence groups ({} aggregates)",
        batch.len(),
        groups.len(),
        aggregates.len()
    );
    Ok(Grouping {
        assignments,
        groups,
        aggregates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::tests::methylene;

    fn variant(id: &str, labels: &[(Position, &str)], canonical_id: &str, coupling_types: &[&str]) -> Variant {
        Variant {
            id: id.to_string(),
            labels: labels.iter().map(|(p, i)| (*p, i.to_string())).collect(),
            canonical_id: canonical_id.to_string(),
            coupling_types: coupling_types.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn layer_id(molecule: &MoleculeGraph) -> Result<String> {
        Ok(molecule
            .isotope_layer()
            .iter()
            .map(|(position, isotope)| format!("{}@{}", isotope, position))
            .collect::<Vec<_>>()
            .join(","))
    }

    #[test]
    fn test_coupling_descriptor() {
        assert_eq!(
            coupling_descriptor(&["[1H2,1H3:C1]Resonance", "[1H2:1H3]TwoBondHH"]),
            "Resonance + TwoBondHH"
        );
        assert_eq!(coupling_descriptor(&["Resonance"]), "Resonance");
        assert_eq!(coupling_descriptor::<&str>(&[]), "");
    }

    #[test]
    fn test_grouping_by_id_and_descriptor() {
        let batch = vec![
            variant("1", &[(2, "2")], "X", &["[1H2:C1]Resonance"]),
            variant("2", &[(3, "2")], "X", &["[1H3:C1]Resonance"]),
            variant("3", &[(1, "13")], "Y", &["[1H2:C1]Resonance"]),
            variant("4", &[(2, "2")], "X", &["[1H2:C1]Resonance", "[1H2:1H3]TwoBondHH"]),
        ];
        let grouping = annotate(&batch, &methylene(), &layer_id).unwrap();

        assert_eq!(grouping.assignments, vec!["ME1", "ME1", "ME2", "ME3"]);
        assert_eq!(grouping.groups.len(), 3);
        assert_eq!(grouping.groups[0].members, vec!["1", "2"]);
        assert_eq!(grouping.groups[2].descriptor, "Resonance + TwoBondHH");

        assert_eq!(grouping.aggregates.len(), 1);
        let aggregate = &grouping.aggregates[0];
        assert_eq!(aggregate.tag(), "MEA1");
        assert_eq!(aggregate.labels, vec![(2, "2".to_string()), (3, "2".to_string())]);
        assert_eq!(aggregate.canonical_id, "2@2,2@3");
        assert_eq!(aggregate.coupling_types, vec!["[1H2:C1]Resonance", "[1H3:C1]Resonance"]);
        assert_eq!(aggregate.descriptor, "Resonance + Resonance");
    }

    #[test]
    fn test_duplicate_labels_collapse() {
        let batch = vec![
            variant("a", &[(1, "13"), (2, "2")], "X", &["R"]),
            variant("b", &[(1, "13"), (3, "2")], "X", &["R"]),
            variant("c", &[(2, "2"), (1, "13")], "X", &["R"]),
        ];
        let grouping = annotate(&batch, &methylene(), &layer_id).unwrap();
        assert_eq!(grouping.assignments, vec!["ME1"; 3]);
        assert_eq!(
            grouping.aggregates[0].labels,
            vec![(1, "13".to_string()), (2, "2".to_string()), (3, "2".to_string())]
        );
        assert_eq!(grouping.aggregates[0].coupling_types, vec!["R"]);
    }

    #[test]
    fn test_conflicting_labels_keep_last_isotope() {
        let batch = vec![
            variant("1", &[(2, "1"), (3, "2")], "X", &["R"]),
            variant("2", &[(2, "2"), (3, "1")], "X", &["R"]),
        ];
        let grouping = annotate(&batch, &methylene(), &layer_id).unwrap();
        let aggregate = &grouping.aggregates[0];
        assert_eq!(
            aggregate.labels,
            vec![
                (2, "1".to_string()),
                (3, "2".to_string()),
                (2, "2".to_string()),
                (3, "1".to_string()),
            ]
        );
        assert_eq!(aggregate.canonical_id, "2@2,1@3");
    }

    #[test]
    fn test_canonicalizer_errors_propagate() {
        let failing = |_: &MoleculeGraph| -> Result<String> { Err(anyhow::anyhow!("no canonical form")) };
        let batch = vec![variant("1", &[], "X", &[]), variant("2", &[], "X", &[])];
        let error = annotate(&batch, &methylene(), &failing).unwrap_err();
        assert!(format!("{:#}", error).contains("no canonical form"));

        let single = annotate(&batch[..1], &methylene(), &failing).unwrap();
        assert!(single.aggregates.is_empty());
    }
}
