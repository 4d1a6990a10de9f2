//! NMR experiments and the coupling combinations they can observe.
//!
//! An experiment resolves to an ordered list of [`CouplingDefinition`]s. Every
//! carbon carrying at least one hydrogen is then expanded into the coupling
//! combinations those definitions produce around it.

use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools;
use tracing::*;

use crate::{MoleculeGraph, NmrError};

mod coupling;
pub use coupling::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExperimentType {
    /// 1D 1H
    Proton1D,
    /// 1D 1H-13C HSQC
    ChHsqc1D,
}

impl ExperimentType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Proton1D => "1D1H",
            Self::ChHsqc1D => "1DCHSQC",
        }
    }

    /// The couplings the experiment observes when the caller selects none, in
    /// resolution order. Resonance always comes first.
    pub fn default_definitions(&self) -> Vec<CouplingDefinition> {
        use CouplingKind::*;
        let deuterium = [("H", "2")];
        match self {
            Self::Proton1D => vec![
                CouplingDefinition::new(Resonance, &[("H", "1")], &deuterium),
                CouplingDefinition::new(OneBondCH, &[("C", "13"), ("H", "1")], &deuterium),
                CouplingDefinition::new(TwoBondHH, &[("H", "1")], &deuterium),
                CouplingDefinition::new(ThreeBondHH, &[("H", "1")], &deuterium),
            ],
            Self::ChHsqc1D => vec![
                CouplingDefinition::new(Resonance, &[("C", "13"), ("H", "1")], &deuterium),
                CouplingDefinition::new(OneBondCH, &[("C", "13"), ("H", "1")], &deuterium),
                CouplingDefinition::new(TwoBondHH, &[("C", "13"), ("H", "1")], &deuterium),
                CouplingDefinition::new(ThreeBondHH, &[("H", "1")], &deuterium),
            ],
        }
    }
}

impl FromStr for ExperimentType {
    type Err = NmrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1D1H" => Ok(Self::Proton1D),
            "1DCHSQC" => Ok(Self::ChHsqc1D),
            _ => Err(NmrError::UnknownExperimentType(s.to_string())),
        }
    }
}

impl Display for ExperimentType {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct NmrExperiment {
    name: String,
    experiment: ExperimentType,
    definitions: Vec<Arc<CouplingDefinition>>,
    type_combinations: Vec<Vec<Arc<CouplingDefinition>>>,
}

impl NmrExperiment {
    /// Resolves `name` to an experiment. A non-empty `couplings` keeps only the
    /// default definitions it names (unknown names are ignored), and any
    /// definition observing a `decoupled` element is removed.
    pub fn new<C, D>(name: &str, couplings: &[C], decoupled: &[D]) -> Result<Self, NmrError>
    where
        C: AsRef<str>,
        D: AsRef<str>,
    {
        let experiment: ExperimentType = name.parse()?;

        let selected: Vec<CouplingKind> = couplings
            .iter()
            .filter_map(|coupling| {
                let kind = CouplingKind::from_name(coupling.as_ref());
                if kind.is_none() {
                    debug!("Ignoring unknown coupling type {:?}", coupling.as_ref());
                }
                kind
            })
            .collect();

        let definitions: Vec<Arc<CouplingDefinition>> = experiment
            .default_definitions()
            .into_iter()
            .filter(|definition| couplings.is_empty() || selected.contains(&definition.kind))
            .filter(|definition| {
                !definition.active_symbols().any(|symbol| {
                    decoupled
                        .iter()
                        .any(|element| element.as_ref().trim().eq_ignore_ascii_case(symbol))
                })
            })
            .map(Arc::new)
            .collect();

        let type_combinations: Vec<Vec<Arc<CouplingDefinition>>> = (1..=definitions.len())
            .flat_map(|size| definitions.iter().cloned().combinations(size))
            .filter(|types| types.iter().any(|definition| definition.kind == CouplingKind::Resonance))
            .collect();

        info!(
            "Resolved {} experiment to [{}] with {} coupling type combinations",
            experiment,
            definitions.iter().join(", "),
            type_combinations.len()
        );

        Ok(Self {
            name: name.to_string(),
            experiment,
            definitions,
            type_combinations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn experiment_type(&self) -> ExperimentType {
        self.experiment
    }

    pub fn definitions(&self) -> &[Arc<CouplingDefinition>] {
        &self.definitions
    }

    /// Subsets of the resolved definitions that contain a resonance.
    pub fn type_combinations(&self) -> &[Vec<Arc<CouplingDefinition>>] {
        &self.type_combinations
    }

    /// Every distinct coupling combination observable on `molecule`.
    ///
    /// With `subset`, each combination is further expanded into the product of
    /// its members' partial occupancy variants, keeping only tuples whose
    /// members are all compatible with the leading resonance.
    pub fn generate_coupling_combinations(&self, molecule: &MoleculeGraph, subset: bool) -> Vec<CouplingCombination> {
        let mut seen = HashSet::new();
        let mut combinations = vec![];

        for carbon in molecule.carbon_atoms() {
            if molecule.hydrogen_neighbors(carbon).is_empty() {
                continue;
            }

            for types in &self.type_combinations {
                let per_type: Vec<Vec<Vec<Coupling>>> = types
                    .iter()
                    .map(|definition| definition.generate(molecule, carbon))
                    .filter(|couplings| !couplings.is_empty())
                    .map(|couplings| non_empty_combinations(&couplings))
                    .collect();
                if per_type.is_empty() {
                    continue;
                }

                for product in per_type.into_iter().multi_cartesian_product() {
                    let combination = CouplingCombination::new(product.into_iter().flatten().collect());
                    if seen.insert(combination.signature()) {
                        combinations.push(combination);
                    }
                }
            }
        }
        debug!("Found {} coupling combinations", combinations.len());

        if !subset {
            return combinations;
        }

        let mut seen = HashSet::new();
        let mut expanded = vec![];
        for combination in &combinations {
            let subsets: Vec<Vec<Coupling>> = combination.couplings().iter().map(Coupling::subset).collect();
            for members in subsets.into_iter().multi_cartesian_product() {
                let Some(resonance) = members.first() else {
                    continue;
                };
                if !members.iter().all(|member| member.is_resonance_compatible(resonance)) {
                    continue;
                }
                let combination = CouplingCombination::new(members);
                if seen.insert(combination.signature()) {
                    expanded.push(combination);
                }
            }
        }
        debug!(
            "Expanded {} coupling combinations into {} subsets",
            combinations.len(),
            expanded.len()
        );
        expanded
    }
}

fn non_empty_combinations(couplings: &[Coupling]) -> Vec<Vec<Coupling>> {
    (1..=couplings.len())
        .flat_map(|size| couplings.iter().cloned().combinations(size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::tests::{ethane, methylene};
    use crate::{Atom, Bond};

    fn kinds(experiment: &NmrExperiment) -> Vec<CouplingKind> {
        experiment.definitions().iter().map(|definition| definition.kind).collect()
    }

    #[test]
    fn test_unknown_experiment() {
        let error = NmrExperiment::new("2DNOESY", &[] as &[&str], &[] as &[&str]).unwrap_err();
        assert_eq!(error, NmrError::UnknownExperimentType("2DNOESY".to_string()));
        assert_eq!("1dchsqc".parse::<ExperimentType>(), Ok(ExperimentType::ChHsqc1D));
    }

    #[test]
    fn test_coupling_selection_and_decoupling() {
        let none: &[&str] = &[];
        let experiment = NmrExperiment::new("1D1H", none, none).unwrap();
        assert_eq!(kinds(&experiment), CouplingKind::ALL.to_vec());
        // 8 subsets of 4 types include the resonance
        assert_eq!(experiment.type_combinations().len(), 8);

        let experiment = NmrExperiment::new("1d1h", &["J3HH", "resonance", "J9XX"], none).unwrap();
        assert_eq!(kinds(&experiment), vec![CouplingKind::Resonance, CouplingKind::ThreeBondHH]);

        let experiment = NmrExperiment::new("1D1H", none, &["c"]).unwrap();
        assert_eq!(
            kinds(&experiment),
            vec![CouplingKind::Resonance, CouplingKind::TwoBondHH, CouplingKind::ThreeBondHH]
        );

        let experiment = NmrExperiment::new("1DCHSQC", none, &["C"]).unwrap();
        assert_eq!(kinds(&experiment), vec![CouplingKind::ThreeBondHH]);
        assert!(experiment.type_combinations().is_empty());
        assert!(experiment.generate_coupling_combinations(&methylene(), false).is_empty());
    }

    #[test]
    fn test_methylene_combinations() {
        let none: &[&str] = &[];
        let experiment = NmrExperiment::new("1D1H", none, none).unwrap();
        let combinations = experiment.generate_coupling_combinations(&methylene(), false);
        let names: Vec<Vec<String>> = combinations.iter().map(CouplingCombination::names).collect();
        assert_eq!(
            names,
            vec![
                vec!["[1H2,1H3:C1]Resonance"],
                vec!["[1H2,1H3:C1]Resonance", "[1H2,1H3:13C1]OneBondCH"],
                vec!["[1H2,1H3:C1]Resonance", "[1H2:1H3]TwoBondHH"],
                vec!["[1H2,1H3:C1]Resonance", "[1H2,1H3:13C1]OneBondCH", "[1H2:1H3]TwoBondHH"],
            ]
        );
        assert!(combinations.iter().all(CouplingCombination::has_resonance));
    }

    #[test]
    fn test_ethane_combinations() {
        let none: &[&str] = &[];
        let experiment = NmrExperiment::new("1D1H", none, none).unwrap();
        let combinations = experiment.generate_coupling_combinations(&ethane(), false);
        assert_eq!(combinations.len(), 8);

        let signatures: HashSet<Vec<String>> = combinations.iter().map(CouplingCombination::signature).collect();
        assert_eq!(signatures.len(), combinations.len());
        assert!(combinations
            .iter()
            .any(|c| c.names() == vec!["[1H3,1H4,1H5:C1]Resonance", "[1H3,1H4,1H5:1H6,1H7,1H8]ThreeBondHH"]));
    }

    /// Propane with explicit hydrogens: carbons 1-3, hydrogens 4-6 on C1, 7-8 on
    /// C2 and 9-11 on C3.
    fn propane() -> MoleculeGraph {
        let mut molecule = MoleculeGraph::new();
        for position in 1..=3 {
            molecule.add_atom(Atom::new(position, "C")).unwrap();
        }
        for position in 4..=11 {
            molecule.add_atom(Atom::new(position, "H")).unwrap();
        }
        molecule.add_bond(1, 2, Bond::Single).unwrap();
        molecule.add_bond(2, 3, Bond::Single).unwrap();
        for (carbon, hydrogens) in [(1, 4..=6), (2, 7..=8), (3, 9..=11)] {
            for hydrogen in hydrogens {
                molecule.add_bond(carbon, hydrogen, Bond::Single).unwrap();
            }
        }
        molecule
    }

    #[test]
    fn test_three_bond_couplings_on_both_sides() {
        let none: &[&str] = &[];
        let experiment = NmrExperiment::new("1D1H", &["Resonance", "J3HH"], none).unwrap();
        let molecule = propane();

        let three_bond = &experiment.definitions()[1];
        let couplings = three_bond.generate(&molecule, molecule.atom(2).unwrap());
        let names: Vec<String> = couplings.iter().map(Coupling::name).collect();
        assert_eq!(
            names,
            vec![
                "[1H7,1H8:1H4,1H5,1H6]ThreeBondHH",
                "[1H7,1H8:1H9,1H10,1H11]ThreeBondHH"
            ]
        );

        let combinations = experiment.generate_coupling_combinations(&molecule, false);
        assert_eq!(combinations.len(), 8);

        let central: Vec<Vec<String>> = combinations
            .iter()
            .map(CouplingCombination::names)
            .filter(|names| names[0] == "[1H7,1H8:C2]Resonance")
            .collect();
        assert_eq!(
            central,
            vec![
                vec!["[1H7,1H8:C2]Resonance"],
                vec!["[1H7,1H8:C2]Resonance", "[1H7,1H8:1H4,1H5,1H6]ThreeBondHH"],
                vec!["[1H7,1H8:C2]Resonance", "[1H7,1H8:1H9,1H10,1H11]ThreeBondHH"],
                vec![
                    "[1H7,1H8:C2]Resonance",
                    "[1H7,1H8:1H4,1H5,1H6]ThreeBondHH",
                    "[1H7,1H8:1H9,1H10,1H11]ThreeBondHH"
                ],
            ]
        );
    }

    #[test]
    fn test_subset_combinations() {
        let none: &[&str] = &[];
        let experiment = NmrExperiment::new("1D1H", none, none).unwrap();
        let combinations = experiment.generate_coupling_combinations(&methylene(), true);
        assert_eq!(combinations.len(), 8);
        assert!(combinations.iter().all(|c| c.couplings()[0].kind() == CouplingKind::Resonance));

        for combination in &combinations {
            let resonance = &combination.couplings()[0];
            assert!(combination
                .couplings()
                .iter()
                .all(|member| member.is_resonance_compatible(resonance)));
        }
        assert!(combinations
            .iter()
            .any(|c| c.names() == vec!["[2H2,1H3:C1]Resonance", "[2H2,1H3:13C1]OneBondCH"]));
    }
}
