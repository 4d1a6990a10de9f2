use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use itertools::Itertools;

use crate::{Atom, MoleculeError, MoleculeGraph, Position};

/// The closed set of coupling patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CouplingKind {
    Resonance,
    OneBondCH,
    TwoBondHH,
    ThreeBondHH,
}

impl CouplingKind {
    pub const ALL: [CouplingKind; 4] = [
        CouplingKind::Resonance,
        CouplingKind::OneBondCH,
        CouplingKind::TwoBondHH,
        CouplingKind::ThreeBondHH,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Resonance => "Resonance",
            Self::OneBondCH => "OneBondCH",
            Self::TwoBondHH => "TwoBondHH",
            Self::ThreeBondHH => "ThreeBondHH",
        }
    }

    /// The short spectroscopy name, also accepted by [`CouplingKind::from_name`].
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Resonance => "HResonance",
            Self::OneBondCH => "J1CH",
            Self::TwoBondHH => "J2HH",
            Self::ThreeBondHH => "J3HH",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name) || kind.alias().eq_ignore_ascii_case(name))
    }
}

impl Display for CouplingKind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

/// One atom on a coupling path, carrying the isotope it is observed with.
/// An empty isotope means the atom is not NMR active for this coupling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathAtom {
    pub position: Position,
    pub symbol: String,
    pub isotope: String,
}

impl Display for PathAtom {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}{}{}", self.isotope, self.symbol, self.position)
    }
}

/// A coupling pattern together with the isotopes that make it observable
/// (`active`) and the isotopes written onto atoms dropped from a subset
/// (`background`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouplingDefinition {
    pub kind: CouplingKind,
    pub active: BTreeMap<String, String>,
    pub background: BTreeMap<String, String>,
}

impl CouplingDefinition {
    pub fn new(kind: CouplingKind, active: &[(&str, &str)], background: &[(&str, &str)]) -> Self {
        let to_map = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(symbol, isotope)| (symbol.to_string(), isotope.to_string()))
                .collect()
        };
        Self {
            kind,
            active: to_map(active),
            background: to_map(background),
        }
    }

    pub fn active_symbols(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    fn path_atom(&self, atom: &Atom) -> PathAtom {
        PathAtom {
            position: atom.position,
            symbol: atom.symbol.clone(),
            isotope: self.active.get(&atom.symbol).cloned().unwrap_or_default(),
        }
    }

    fn group(&self, atoms: &[&Atom]) -> Vec<PathAtom> {
        atoms.iter().map(|atom| self.path_atom(atom)).collect()
    }

    /// Every coupling of this kind centered on `carbon`, in neighbor position
    /// order.
    pub fn generate(self: &Arc<Self>, molecule: &MoleculeGraph, carbon: &Atom) -> Vec<Coupling> {
        let hydrogens = molecule.hydrogen_neighbors(carbon);
        let center = self.path_atom(carbon);

        match self.kind {
            CouplingKind::Resonance | CouplingKind::OneBondCH => {
                if hydrogens.is_empty() {
                    return vec![];
                }
                vec![Coupling::new(self.clone(), vec![self.group(&hydrogens), vec![center]])]
            }
            CouplingKind::TwoBondHH => match hydrogens.as_slice() {
                [first, second] => vec![Coupling::new(
                    self.clone(),
                    vec![
                        vec![self.path_atom(first)],
                        vec![center],
                        vec![self.path_atom(second)],
                    ],
                )],
                _ => vec![],
            },
            CouplingKind::ThreeBondHH => molecule
                .neighbors_of_symbol(carbon, "C")
                .into_iter()
                .filter_map(|neighbor| {
                    let neighbor_hydrogens = molecule.hydrogen_neighbors(neighbor);
                    if neighbor_hydrogens.is_empty() {
                        return None;
                    }
                    Some(Coupling::new(
                        self.clone(),
                        vec![
                            self.group(&hydrogens),
                            vec![center.clone()],
                            vec![self.path_atom(neighbor)],
                            self.group(&neighbor_hydrogens),
                        ],
                    ))
                })
                .collect(),
        }
    }
}

impl Display for CouplingDefinition {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let active = self
            .active
            .iter()
            .map(|(symbol, isotope)| format!("{}{}", isotope, symbol))
            .join(",");
        write!(f, "{}({})", self.kind, active)
    }
}

/// One concrete coupling: a path of atom groups, each group sorted by position.
///
/// Equality and hashing go through [`Coupling::name`], which only looks at the
/// first and last groups of the path.
#[derive(Debug, Clone)]
pub struct Coupling {
    definition: Arc<CouplingDefinition>,
    path: Vec<Vec<PathAtom>>,
}

impl Coupling {
    pub fn new(definition: Arc<CouplingDefinition>, mut path: Vec<Vec<PathAtom>>) -> Self {
        for group in path.iter_mut() {
            group.sort_by_key(|atom| atom.position);
        }
        Self { definition, path }
    }

    pub fn kind(&self) -> CouplingKind {
        self.definition.kind
    }

    pub fn definition(&self) -> &CouplingDefinition {
        &self.definition
    }

    pub fn path(&self) -> &[Vec<PathAtom>] {
        &self.path
    }

    /// `[<first group>:<last group>]<kind>`, e.g. `[1H2:1H3]TwoBondHH`.
    pub fn name(&self) -> String {
        let render = |group: Option<&Vec<PathAtom>>| {
            group
                .map(|atoms| atoms.iter().map(PathAtom::to_string).join(","))
                .unwrap_or_default()
        };
        format!(
            "[{}:{}]{}",
            render(self.path.first()),
            render(self.path.last()),
            self.kind()
        )
    }

    /// The path restricted to hydrogen atoms, with groups that held no
    /// hydrogen dropped.
    pub fn hydrogen_path(&self) -> Vec<Vec<&PathAtom>> {
        self.path
            .iter()
            .map(|group| group.iter().filter(|atom| atom.symbol == "H").collect::<Vec<_>>())
            .filter(|group| !group.is_empty())
            .collect()
    }

    /// Expands the coupling into its partial occupancy variants. Each group is
    /// replaced by each of its non-empty sub-combinations, and the atoms left
    /// out are kept on the path relabeled with the background isotope.
    pub fn subset(&self) -> Vec<Coupling> {
        let background = &self.definition.background;
        let groups: Vec<Vec<Vec<PathAtom>>> = self
            .path
            .iter()
            .map(|group| {
                (1..=group.len())
                    .flat_map(|size| group.iter().combinations(size))
                    .map(|kept| {
                        if kept.len() == group.len() {
                            return group.clone();
                        }
                        group
                            .iter()
                            .map(|atom| {
                                if kept.contains(&atom) {
                                    atom.clone()
                                } else {
                                    PathAtom {
                                        isotope: background.get(&atom.symbol).cloned().unwrap_or_default(),
                                        ..atom.clone()
                                    }
                                }
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        groups
            .into_iter()
            .multi_cartesian_product()
            .map(|path| Coupling::new(self.definition.clone(), path))
            .collect()
    }

    /// Whether this coupling can be observed alongside the resonance `other`.
    ///
    /// The labels of `other`'s first hydrogen group must equal the labels of
    /// all of this coupling's hydrogens, or only its first hydrogen group for
    /// [`CouplingKind::ThreeBondHH`].
    pub fn is_resonance_compatible(&self, other: &Coupling) -> bool {
        let theirs = other.hydrogen_path();
        let Some(resonance) = theirs.first() else {
            return false;
        };
        let mine = self.hydrogen_path();
        let own: BTreeSet<String> = match self.kind() {
            CouplingKind::ThreeBondHH => match mine.first() {
                Some(group) => labels(group),
                None => return false,
            },
            _ => mine.iter().flat_map(|group| labels(group)).collect(),
        };
        labels(resonance) == own
    }
}

fn labels(group: &[&PathAtom]) -> BTreeSet<String> {
    group.iter().map(|atom| atom.to_string()).collect()
}

impl PartialEq for Coupling {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Coupling {}

impl Hash for Coupling {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl Display for Coupling {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

/// A set of couplings observed together on one molecule instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CouplingCombination {
    couplings: Vec<Coupling>,
}

impl CouplingCombination {
    pub fn new(couplings: Vec<Coupling>) -> Self {
        Self { couplings }
    }

    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    pub fn len(&self) -> usize {
        self.couplings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.couplings.is_empty()
    }

    /// Member names in member order.
    pub fn names(&self) -> Vec<String> {
        self.couplings.iter().map(Coupling::name).collect()
    }

    /// Member names sorted, used to deduplicate combinations.
    pub fn signature(&self) -> Vec<String> {
        let mut names = self.names();
        names.sort();
        names
    }

    pub fn has_resonance(&self) -> bool {
        self.couplings
            .iter()
            .any(|coupling| coupling.kind() == CouplingKind::Resonance)
    }

    /// The `(position, isotope)` pairs this combination implies: every path
    /// atom of an element the coupling observes, with the first coupling to
    /// mention a position deciding its isotope.
    pub fn isotope_layer(&self) -> Vec<(Position, String)> {
        let mut layer: BTreeMap<Position, String> = BTreeMap::new();
        for coupling in &self.couplings {
            let active = &coupling.definition().active;
            for atom in coupling.path().iter().flatten() {
                if atom.isotope.is_empty() || !active.contains_key(&atom.symbol) {
                    continue;
                }
                layer.entry(atom.position).or_insert_with(|| atom.isotope.clone());
            }
        }
        layer.into_iter().collect()
    }

    /// A private copy of `molecule` carrying exactly this combination's isotope
    /// layer.
    pub fn apply(&self, molecule: &MoleculeGraph) -> Result<MoleculeGraph, MoleculeError> {
        let layer = self.isotope_layer();
        molecule.with_isotopes(layer.iter().map(|(position, isotope)| (*position, isotope.as_str())))
    }
}

impl Display for CouplingCombination {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::tests::{ethane, methylene};
    use crate::{Bond, MoleculeGraph};

    fn definition(kind: CouplingKind) -> Arc<CouplingDefinition> {
        Arc::new(CouplingDefinition::new(kind, &[("C", "13"), ("H", "1")], &[("H", "2")]))
    }

    /// C1 bonded to C2 (three hydrogens) and C3 (none), with one hydrogen of
    /// its own.
    fn branched() -> MoleculeGraph {
        let mut molecule = MoleculeGraph::new();
        for (position, symbol) in [(1, "C"), (2, "C"), (3, "C"), (4, "H"), (5, "H"), (6, "H"), (7, "H"), (8, "O")] {
            molecule.add_atom(Atom::new(position, symbol)).unwrap();
        }
        for (a, b) in [(1, 2), (1, 3), (1, 4), (2, 5), (2, 6), (2, 7)] {
            molecule.add_bond(a, b, Bond::Single).unwrap();
        }
        molecule.add_bond(3, 8, Bond::Double).unwrap();
        molecule
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(CouplingKind::from_name("j2hh"), Some(CouplingKind::TwoBondHH));
        assert_eq!(CouplingKind::from_name("HResonance"), Some(CouplingKind::Resonance));
        assert_eq!(CouplingKind::from_name("onebondch"), Some(CouplingKind::OneBondCH));
        assert_eq!(CouplingKind::from_name("J4HH"), None);
    }

    #[test]
    fn test_two_bond_requires_exactly_two_hydrogens() {
        let molecule = methylene();
        let carbon = molecule.atom(1).unwrap();
        let couplings = definition(CouplingKind::TwoBondHH).generate(&molecule, carbon);
        assert_eq!(couplings.len(), 1);

        let path: Vec<Vec<Position>> = couplings[0]
            .path()
            .iter()
            .map(|group| group.iter().map(|atom| atom.position).collect())
            .collect();
        assert_eq!(path, vec![vec![2], vec![1], vec![3]]);

        let name = couplings[0].name();
        assert_eq!(name, "[1H2:1H3]TwoBondHH");
        assert!(name.contains("H2") && name.contains("H3"));

        let molecule = ethane();
        let carbon = molecule.atom(1).unwrap();
        assert!(definition(CouplingKind::TwoBondHH).generate(&molecule, carbon).is_empty());

        let molecule = branched();
        let carbon = molecule.atom(1).unwrap();
        assert!(definition(CouplingKind::TwoBondHH).generate(&molecule, carbon).is_empty());
        let carbon = molecule.atom(3).unwrap();
        assert!(definition(CouplingKind::TwoBondHH).generate(&molecule, carbon).is_empty());
    }

    #[test]
    fn test_three_bond_one_per_hydrogen_bearing_neighbor() {
        let molecule = branched();
        let carbon = molecule.atom(1).unwrap();
        let couplings = definition(CouplingKind::ThreeBondHH).generate(&molecule, carbon);
        assert_eq!(couplings.len(), 1);
        assert_eq!(couplings[0].name(), "[1H4:1H5,1H6,1H7]ThreeBondHH");
        assert_eq!(couplings[0].path().len(), 4);

        let molecule = methylene();
        let carbon = molecule.atom(1).unwrap();
        assert!(definition(CouplingKind::ThreeBondHH).generate(&molecule, carbon).is_empty());
    }

    #[test]
    fn test_resonance_path_and_isotopes() {
        let molecule = methylene();
        let carbon = molecule.atom(1).unwrap();
        let resonance = Arc::new(CouplingDefinition::new(CouplingKind::Resonance, &[("H", "1")], &[("H", "2")]));
        let couplings = resonance.generate(&molecule, carbon);
        assert_eq!(couplings.len(), 1);
        assert_eq!(couplings[0].name(), "[1H2,1H3:C1]Resonance");

        let couplings = definition(CouplingKind::OneBondCH).generate(&molecule, carbon);
        assert_eq!(couplings[0].name(), "[1H2,1H3:13C1]OneBondCH");
        assert_ne!(couplings[0], resonance.generate(&molecule, carbon)[0]);
    }

    #[test]
    fn test_subset_relabels_omitted_atoms() {
        let molecule = methylene();
        let carbon = molecule.atom(1).unwrap();
        let coupling = definition(CouplingKind::Resonance).generate(&molecule, carbon).remove(0);

        let names: Vec<String> = coupling.subset().iter().map(Coupling::name).collect();
        assert_eq!(
            names,
            vec![
                "[1H2,2H3:13C1]Resonance",
                "[2H2,1H3:13C1]Resonance",
                "[1H2,1H3:13C1]Resonance",
            ]
        );
        assert!(coupling.subset().iter().all(|c| c.kind() == CouplingKind::Resonance));
    }

    #[test]
    fn test_resonance_compatibility() {
        let molecule = methylene();
        let carbon = molecule.atom(1).unwrap();
        let resonances = definition(CouplingKind::Resonance).generate(&molecule, carbon).remove(0).subset();
        let two_bond = definition(CouplingKind::TwoBondHH).generate(&molecule, carbon).remove(0);

        let compatible: Vec<bool> = resonances.iter().map(|r| two_bond.is_resonance_compatible(r)).collect();
        assert_eq!(compatible, vec![false, false, true]);
        assert!(resonances.iter().all(|r| r.is_resonance_compatible(r)));

        let molecule = ethane();
        let carbon = molecule.atom(1).unwrap();
        let resonance = definition(CouplingKind::Resonance).generate(&molecule, carbon).remove(0);
        let three_bond = definition(CouplingKind::ThreeBondHH).generate(&molecule, carbon).remove(0);
        // Only the first hydrogen group of a three bond coupling is compared.
        assert!(three_bond.is_resonance_compatible(&resonance));
        let flattened = Coupling::new(definition(CouplingKind::OneBondCH), three_bond.path().to_vec());
        assert!(!flattened.is_resonance_compatible(&resonance));
    }

    #[test]
    fn test_combination_isotope_layer() {
        let molecule = methylene();
        let carbon = molecule.atom(1).unwrap();
        let resonance = Arc::new(CouplingDefinition::new(CouplingKind::Resonance, &[("H", "1")], &[("H", "2")]));
        let subset = resonance.generate(&molecule, carbon).remove(0).subset().remove(0);
        let one_bond = definition(CouplingKind::OneBondCH).generate(&molecule, carbon).remove(0);

        let combination = CouplingCombination::new(vec![subset, one_bond]);
        assert!(combination.has_resonance());
        assert_eq!(
            combination.isotope_layer(),
            vec![(1, "13".to_string()), (2, "1".to_string()), (3, "2".to_string())]
        );

        let labeled = combination.apply(&molecule).unwrap();
        assert_eq!(labeled.isotope_layer(), combination.isotope_layer());
        assert!(molecule.isotope_layer().is_empty());
    }
}
