use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use anyhow::Result;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::{EdgeRef, IntoNodeReferences};
use tracing::*;

use crate::*;

/// Computes an identifier that is equal for two labeled molecules exactly when
/// they are the same structure.
pub trait Canonicalizer {
    fn canonicalize(&self, molecule: &MoleculeGraph) -> Result<String>;
}

impl<F> Canonicalizer for F
where
    F: Fn(&MoleculeGraph) -> Result<String>,
{
    fn canonicalize(&self, molecule: &MoleculeGraph) -> Result<String> {
        self(molecule)
    }
}

/// A Morgan style identifier: `<formula>/<isotopes>/<charge>/<graph hash>`,
/// with empty layers left out.
///
/// Atoms are refined by their neighborhoods until the number of distinct
/// classes stops growing, so the graph hash does not depend on positions.
/// Graphs that neighborhood refinement cannot tell apart share a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorganCanonicalizer {
    pub max_iterations: usize,
}

impl Default for MorganCanonicalizer {
    fn default() -> Self {
        Self { max_iterations: 100 }
    }
}

impl Canonicalizer for MorganCanonicalizer {
    fn canonicalize(&self, molecule: &MoleculeGraph) -> Result<String> {
        let atoms = molecule.atoms();
        let layers = [
            formula_layer(&atoms),
            isotope_layer(&atoms),
            charge_layer(&atoms),
            format!("{:016x}", graph_hash(molecule.graph(), self.max_iterations)),
        ];
        let id = layers.into_iter().filter(|layer| !layer.is_empty()).collect::<Vec<_>>().join("/");
        trace!("Canonicalized {} atoms to {}", atoms.len(), id);
        Ok(id)
    }
}

/// Computes a hash value for any hashable object.
fn compute_hash<T: Hash>(t: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    t.hash(&mut hasher);
    hasher.finish()
}

fn initial_label(atom: &Atom) -> u64 {
    compute_hash(&(&atom.symbol, &atom.isotope, atom.charge))
}

fn class_count(labels: &HashMap<NodeIndex, u64>) -> usize {
    let mut classes: Vec<u64> = labels.values().copied().collect();
    classes.sort_unstable();
    classes.dedup();
    classes.len()
}

pub fn morgan_algorithm(graph: &UnGraph<Atom, Bond>, max_iterations: usize) -> HashMap<NodeIndex, u64> {
    let mut labels: HashMap<NodeIndex, u64> = graph
        .node_references()
        .map(|(node, atom)| (node, initial_label(atom)))
        .collect();
    let mut classes = class_count(&labels);

    for _ in 0..max_iterations {
        let updated: HashMap<NodeIndex, u64> = graph
            .node_indices()
            .map(|node| {
                let mut neighborhood: Vec<(u64, usize)> = graph
                    .edges(node)
                    .map(|edge| {
                        let neighbor = if edge.source() == node { edge.target() } else { edge.source() };
                        (labels[&neighbor], edge.weight().order())
                    })
                    .collect();
                neighborhood.sort_unstable();
                (node, compute_hash(&(labels[&node], neighborhood)))
            })
            .collect();

        let refined = class_count(&updated);
        labels = updated;
        if refined <= classes {
            break;
        }
        classes = refined;
    }

    labels
}

fn graph_hash(graph: &UnGraph<Atom, Bond>, max_iterations: usize) -> u64 {
    let labels = morgan_algorithm(graph, max_iterations);

    let mut nodes: Vec<u64> = labels.values().copied().collect();
    nodes.sort_unstable();
    let mut edges: Vec<(u64, u64, usize)> = graph
        .edge_references()
        .map(|edge| {
            let (a, b) = (labels[&edge.source()], labels[&edge.target()]);
            (a.min(b), a.max(b), edge.weight().order())
        })
        .collect();
    edges.sort_unstable();

    compute_hash(&(nodes, edges))
}

/// Hill order: carbon, then hydrogen, then the rest alphabetically. Without
/// carbon everything is alphabetical.
fn formula_layer(atoms: &[&Atom]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for atom in atoms {
        *counts.entry(atom.symbol.as_str()).or_default() += 1;
    }

    let mut order: Vec<&str> = vec![];
    if counts.contains_key("C") {
        order.push("C");
        if counts.contains_key("H") {
            order.push("H");
        }
    }
    let rest: Vec<&str> = counts.keys().copied().filter(|symbol| !order.contains(symbol)).collect();
    order.extend(rest);

    order
        .into_iter()
        .map(|symbol| match counts[symbol] {
            1 => symbol.to_string(),
            n => format!("{}{}", symbol, n),
        })
        .collect()
}

fn isotope_layer(atoms: &[&Atom]) -> String {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for atom in atoms {
        if let Some(isotope) = &atom.isotope {
            *counts.entry((atom.symbol.as_str(), isotope.as_str())).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return String::new();
    }

    let isotopes: Vec<String> = counts
        .into_iter()
        .map(|((symbol, isotope), count)| match count {
            1 => format!("{}{}", isotope, symbol),
            n => format!("{}{}{}", isotope, symbol, n),
        })
        .collect();
    format!("i{}", isotopes.join(","))
}

fn charge_layer(atoms: &[&Atom]) -> String {
    match atoms.iter().map(|atom| atom.charge).sum::<i32>() {
        0 => String::new(),
        charge => format!("q{:+}", charge),
    }
}
