//! Register allocation by graph coloring.
//!
//! Variables whose live ranges overlap in some block conflict and must get different colors. The
//! coloring never spills: when the graph can't be simplified with the available colors, the
//! function can't be compiled.

#[cfg(test)]
mod test;

mod coloring;
mod conflict_graph;

pub use coloring::color;
pub use conflict_graph::ConflictGraph;

use crate::{Reg, Variable};

/// A hint for [`color`] about which color a variable should get.
///
/// Only [`ColoringPreference::Pinned`] is binding. The other preferences are honoured when the
/// colors of the conflicting variables allow it.
#[derive(Debug, Clone, PartialEq)]
pub enum ColoringPreference<C = Reg> {
    /// The two variables should share a color, so the move between them disappears.
    Coalesce(Variable, Variable),
    /// The variable should get this color.
    Target(Variable, C),
    /// The variable should not get this color.
    Avoid(Variable, C),
    /// The variable must get this color.
    Pinned(Variable, C),
}

impl<C> ColoringPreference<C> {
    /// The variable the preference is about. For [`ColoringPreference::Coalesce`] this is the first
    /// of the two.
    pub fn var(&self) -> &Variable {
        match self {
            ColoringPreference::Coalesce(var, _)
            | ColoringPreference::Target(var, _)
            | ColoringPreference::Avoid(var, _)
            | ColoringPreference::Pinned(var, _) => var,
        }
    }
}
