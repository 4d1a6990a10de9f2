use std::fmt::{Display, Formatter, Result as FmtResult};

use anyhow::Result;
use tracing::*;

use crate::{MoleculeGraph, Position, ValidationError};

/// A requested ionization state for one atom, `<symbol>:<position>:<charge>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChargeState {
    pub symbol: String,
    pub position: Position,
    pub charge: i32,
}

impl Display for ChargeState {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}:{}:{:+}", self.symbol, self.position, self.charge)
    }
}

impl ChargeState {
    pub fn validate(&self, molecule: &MoleculeGraph) -> Result<(), ValidationError> {
        if !molecule.has_symbol(&self.symbol) {
            return Err(ValidationError::UnknownAtom {
                symbol: self.symbol.clone(),
            });
        }
        match molecule.atom(self.position) {
            Some(atom) if atom.is(&self.symbol) => Ok(()),
            found => Err(ValidationError::PositionMismatch {
                symbol: self.symbol.clone(),
                position: self.position,
                found: found.map(|atom| atom.symbol.clone()),
            }),
        }
    }
}

/// Validates every state first, then writes all of them onto a private copy of
/// `molecule`.
pub fn apply_charge_states(molecule: &MoleculeGraph, states: &[ChargeState]) -> Result<MoleculeGraph> {
    for state in states {
        state.validate(molecule)?;
    }

    let mut charged = molecule.clone();
    for state in states {
        debug!("Setting charge of {}{} to {}", state.symbol, state.position, state.charge);
        charged.set_charge(state.position, state.charge)?;
    }
    Ok(charged)
}
