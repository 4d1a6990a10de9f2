//! CSV boundary: atom tables in, variant tables out.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use tracing::*;

use crate::{Atom, Bond, Grouping, MoleculeGraph, Position, Variant};

/// Splits `=3`, `#3`, `:3` or `3` into a bond order and a neighbor position.
fn parse_bond(token: &str) -> Result<(Bond, Position)> {
    let (bond, position) = match token.chars().next() {
        Some('=') => (Bond::Double, &token[1..]),
        Some('#') => (Bond::Triple, &token[1..]),
        Some(':') => (Bond::Aromatic, &token[1..]),
        _ => (Bond::Single, token),
    };
    let position: Position = position
        .trim()
        .parse()
        .with_context(|| format!("Invalid bond \"{}\"", token))?;
    Ok((bond, position))
}

fn field<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("")
}

/// Reads an atom table with header `position,symbol,charge,isotope,bonds`.
///
/// `charge` and `isotope` may be left empty. `bonds` lists neighbor positions
/// separated by `;`, each optionally prefixed by `=`, `#` or `:` for double,
/// triple or aromatic bonds. A bond may be listed from either end or both.
pub fn read_molecule<R: Read>(reader: R) -> Result<MoleculeGraph> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut molecule = MoleculeGraph::new();
    let mut bonds: Vec<(Position, Position, Bond)> = vec![];

    for (row, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read atom table")?;
        let line = row + 2;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let position: Position = field(&record, 0)
            .parse()
            .with_context(|| format!("Invalid atom position on line {}", line))?;
        let symbol = field(&record, 1);
        if symbol.is_empty() {
            bail!("Missing element symbol on line {}", line);
        }

        let mut atom = Atom::new(position, symbol);
        match field(&record, 2) {
            "" => {}
            charge => {
                let charge: i32 = charge
                    .parse()
                    .with_context(|| format!("Invalid charge \"{}\" on line {}", charge, line))?;
                atom = atom.with_charge(charge);
            }
        }
        match field(&record, 3) {
            "" => {}
            isotope => atom = atom.with_isotope(isotope),
        }
        molecule
            .add_atom(atom)
            .with_context(|| format!("Invalid atom on line {}", line))?;

        for token in field(&record, 4).split(';').map(str::trim).filter(|token| !token.is_empty()) {
            let (bond, neighbor) = parse_bond(token).with_context(|| format!("On line {}", line))?;
            bonds.push((position, neighbor, bond));
        }
    }

    for (a, b, bond) in bonds {
        molecule
            .add_bond(a, b, bond)
            .with_context(|| format!("Invalid bond {}-{}", a, b))?;
    }
    debug!(
        "Read molecule with {} atoms and {} bonds",
        molecule.len(),
        molecule.bonds().len()
    );
    Ok(molecule)
}

pub fn read_molecule_path(path: impl AsRef<Path>) -> Result<MoleculeGraph> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_molecule(file).with_context(|| format!("Failed to read molecule from {}", path.display()))
}

fn render_labels(molecule: &MoleculeGraph, labels: &[(Position, String)]) -> String {
    labels
        .iter()
        .map(|(position, isotope)| {
            let symbol = molecule.atom(*position).map(|atom| atom.symbol.as_str()).unwrap_or("");
            format!("{}{}{}", isotope, symbol, position)
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Writes `id,group,canonical_id,labels,couplings` rows for every variant,
/// followed by one row per aggregate when a grouping is given.
pub fn write_variants<W: Write>(
    writer: W,
    molecule: &MoleculeGraph,
    variants: &[Variant],
    grouping: Option<&Grouping>,
) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["id", "group", "canonical_id", "labels", "couplings"])?;

    for (index, variant) in variants.iter().enumerate() {
        let group = grouping
            .and_then(|grouping| grouping.assignments.get(index))
            .map(String::as_str)
            .unwrap_or("");
        let labels = render_labels(molecule, &variant.labels);
        let couplings = variant.coupling_types.join(";");
        wtr.write_record([
            variant.id.as_str(),
            group,
            variant.canonical_id.as_str(),
            labels.as_str(),
            couplings.as_str(),
        ])?;
    }

    if let Some(grouping) = grouping {
        for aggregate in &grouping.aggregates {
            wtr.write_record([
                aggregate.tag(),
                format!("ME{}", aggregate.group),
                aggregate.canonical_id.clone(),
                render_labels(molecule, &aggregate.labels),
                aggregate.coupling_types.join(";"),
            ])?;
        }
    }

    wtr.flush()?;
    info!("Wrote {} variant rows", variants.len());
    Ok(())
}
