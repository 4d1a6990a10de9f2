use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::MoleculeError;

/// The 1-based atom number used by structure files. Stable ordering key for every
/// atom list the crate produces.
pub type Position = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Bond {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

impl Bond {
    pub fn order(&self) -> usize {
        match self {
            Bond::Single => 1,
            Bond::Double => 2,
            Bond::Triple => 3,
            Bond::Aromatic => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub position: Position,
    pub symbol: String,
    pub charge: i32,
    pub isotope: Option<String>,
}

impl Atom {
    pub fn new(position: Position, symbol: impl Into<String>) -> Self {
        Self {
            position,
            symbol: symbol.into(),
            charge: 0,
            isotope: None,
        }
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_isotope(mut self, isotope: impl Into<String>) -> Self {
        self.isotope = Some(isotope.into());
        self
    }

    pub fn is(&self, symbol: &str) -> bool {
        self.symbol == symbol
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match &self.isotope {
            Some(isotope) => write!(f, "{}{}{}", isotope, self.symbol, self.position),
            None => write!(f, "{}{}", self.symbol, self.position),
        }
    }
}

/// An undirected atom/bond graph addressed by atom position.
///
/// Cloning is cheap enough to give every labeled variant its own private copy;
/// the isotope and charge fields are the only things the crate ever mutates, and
/// only on such copies.
#[derive(Debug, Clone, Default)]
pub struct MoleculeGraph {
    graph: UnGraph<Atom, Bond>,
    index: BTreeMap<Position, NodeIndex>,
}

impl MoleculeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> Result<NodeIndex, MoleculeError> {
        if atom.position == 0 {
            return Err(MoleculeError::ZeroPosition);
        }
        if self.index.contains_key(&atom.position) {
            return Err(MoleculeError::DuplicatePosition(atom.position));
        }
        let position = atom.position;
        let node = self.graph.add_node(atom);
        self.index.insert(position, node);
        Ok(node)
    }

    /// Connects two atoms. Bonding an already bonded pair again is a no-op so atom
    /// tables may list each bond from both ends.
    pub fn add_bond(&mut self, a: Position, b: Position, bond: Bond) -> Result<(), MoleculeError> {
        let a = self.node(a)?;
        let b = self.node(b)?;
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, bond);
        }
        Ok(())
    }

    fn node(&self, position: Position) -> Result<NodeIndex, MoleculeError> {
        self.index
            .get(&position)
            .copied()
            .ok_or(MoleculeError::UnknownPosition(position))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn atom(&self, position: Position) -> Option<&Atom> {
        self.index.get(&position).map(|&node| &self.graph[node])
    }

    /// All atoms, ordered by position.
    pub fn atoms(&self) -> Vec<&Atom> {
        self.index.values().map(|&node| &self.graph[node]).collect()
    }

    pub fn carbon_atoms(&self) -> Vec<&Atom> {
        self.atoms_of_symbol("C")
    }

    pub fn atoms_of_symbol(&self, symbol: &str) -> Vec<&Atom> {
        self.atoms().into_iter().filter(|atom| atom.is(symbol)).collect()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.graph.node_weights().any(|atom| atom.is(symbol))
    }

    pub fn count_symbol(&self, symbol: &str) -> usize {
        self.graph.node_weights().filter(|atom| atom.is(symbol)).count()
    }

    /// Neighbors of `atom` carrying `symbol`, ordered by position. Unknown atoms
    /// have no neighbors.
    pub fn neighbors_of_symbol(&self, atom: &Atom, symbol: &str) -> Vec<&Atom> {
        let Some(&node) = self.index.get(&atom.position) else {
            return Vec::new();
        };
        let mut neighbors: Vec<&Atom> = self
            .graph
            .neighbors(node)
            .map(|neighbor| &self.graph[neighbor])
            .filter(|neighbor| neighbor.is(symbol))
            .collect();
        neighbors.sort_by_key(|neighbor| neighbor.position);
        neighbors
    }

    pub fn hydrogen_neighbors(&self, atom: &Atom) -> Vec<&Atom> {
        self.neighbors_of_symbol(atom, "H")
    }

    /// Bonds as `(lower position, higher position, bond)` triples, sorted.
    pub fn bonds(&self) -> Vec<(Position, Position, Bond)> {
        let mut bonds: Vec<_> = self
            .graph
            .edge_references()
            .map(|edge| {
                let a = self.graph[edge.source()].position;
                let b = self.graph[edge.target()].position;
                (a.min(b), a.max(b), *edge.weight())
            })
            .collect();
        bonds.sort();
        bonds
    }

    pub(crate) fn graph(&self) -> &UnGraph<Atom, Bond> {
        &self.graph
    }

    pub fn set_isotope(&mut self, position: Position, isotope: Option<String>) -> Result<(), MoleculeError> {
        let node = self.node(position)?;
        self.graph[node].isotope = isotope;
        Ok(())
    }

    pub fn set_charge(&mut self, position: Position, charge: i32) -> Result<(), MoleculeError> {
        let node = self.node(position)?;
        self.graph[node].charge = charge;
        Ok(())
    }

    /// The `(position, isotope)` pairs of every labeled atom, ordered by position.
    pub fn isotope_layer(&self) -> Vec<(Position, String)> {
        self.atoms()
            .into_iter()
            .filter_map(|atom| atom.isotope.clone().map(|isotope| (atom.position, isotope)))
            .collect()
    }

    /// Returns a private copy whose isotope layer is replaced by exactly `layer`.
    /// Later pairs for the same position override earlier ones.
    pub fn with_isotopes<'a, I>(&self, layer: I) -> Result<MoleculeGraph, MoleculeError>
    where
        I: IntoIterator<Item = (Position, &'a str)>,
    {
        let mut labeled = self.clone();
        for atom in labeled.graph.node_weights_mut() {
            atom.isotope = None;
        }
        for (position, isotope) in layer {
            labeled.set_isotope(position, Some(isotope.to_string()))?;
        }
        Ok(labeled)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// H-C-H fragment: C at 1 with hydrogens at 2 and 3.
    pub(crate) fn methylene() -> MoleculeGraph {
        let mut molecule = MoleculeGraph::new();
        molecule.add_atom(Atom::new(1, "C")).unwrap();
        molecule.add_atom(Atom::new(2, "H")).unwrap();
        molecule.add_atom(Atom::new(3, "H")).unwrap();
        molecule.add_bond(1, 2, Bond::Single).unwrap();
        molecule.add_bond(1, 3, Bond::Single).unwrap();
        molecule
    }

    /// Ethane with explicit hydrogens: carbons at 1 and 2, hydrogens 3-5 on C1 and
    /// 6-8 on C2.
    pub(crate) fn ethane() -> MoleculeGraph {
        let mut molecule = MoleculeGraph::new();
        molecule.add_atom(Atom::new(1, "C")).unwrap();
        molecule.add_atom(Atom::new(2, "C")).unwrap();
        for position in 3..=8 {
            molecule.add_atom(Atom::new(position, "H")).unwrap();
        }
        molecule.add_bond(1, 2, Bond::Single).unwrap();
        for position in 3..=5 {
            molecule.add_bond(1, position, Bond::Single).unwrap();
        }
        for position in 6..=8 {
            molecule.add_bond(2, position, Bond::Single).unwrap();
        }
        molecule
    }

    #[test]
    fn test_neighbors_are_ordered_by_position() {
        let mut molecule = MoleculeGraph::new();
        molecule.add_atom(Atom::new(1, "C")).unwrap();
        molecule.add_atom(Atom::new(7, "H")).unwrap();
        molecule.add_atom(Atom::new(4, "H")).unwrap();
        molecule.add_atom(Atom::new(5, "O")).unwrap();
        molecule.add_bond(1, 7, Bond::Single).unwrap();
        molecule.add_bond(1, 4, Bond::Single).unwrap();
        molecule.add_bond(1, 5, Bond::Single).unwrap();

        let carbon = molecule.atom(1).unwrap().clone();
        let hydrogens: Vec<Position> = molecule
            .hydrogen_neighbors(&carbon)
            .iter()
            .map(|atom| atom.position)
            .collect();
        assert_eq!(hydrogens, vec![4, 7]);
        assert_eq!(molecule.neighbors_of_symbol(&carbon, "O").len(), 1);
    }

    #[test]
    fn test_duplicate_and_unknown_positions() {
        let mut molecule = methylene();
        assert_eq!(
            molecule.add_atom(Atom::new(2, "H")),
            Err(MoleculeError::DuplicatePosition(2))
        );
        assert_eq!(molecule.add_atom(Atom::new(0, "H")), Err(MoleculeError::ZeroPosition));
        assert_eq!(
            molecule.add_bond(1, 9, Bond::Single),
            Err(MoleculeError::UnknownPosition(9))
        );
    }

    #[test]
    fn test_bonds_listed_twice_are_kept_once() {
        let mut molecule = methylene();
        molecule.add_bond(2, 1, Bond::Single).unwrap();
        assert_eq!(molecule.bonds().len(), 2);
    }

    #[test]
    fn test_with_isotopes_leaves_source_untouched() {
        let molecule = methylene();
        let labeled = molecule.with_isotopes([(1, "13"), (3, "2")]).unwrap();
        assert_eq!(
            labeled.isotope_layer(),
            vec![(1, "13".to_string()), (3, "2".to_string())]
        );
        assert!(molecule.isotope_layer().is_empty());

        // Relabeling replaces the whole layer instead of merging into it.
        let relabeled = labeled.with_isotopes([(2, "2")]).unwrap();
        assert_eq!(relabeled.isotope_layer(), vec![(2, "2".to_string())]);
    }
}
