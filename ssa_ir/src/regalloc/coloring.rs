use super::{ColoringPreference, ConflictGraph};
use crate::{IrError, IrResult, Variable};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Colors `graph` with `colors`, honouring `preferences` where possible.
///
/// Pinned variables keep their color, even if it isn't one of `colors`. The others are removed
/// one by one, always taking the one with the highest degree below `colors.len()`, and colored
/// in reverse order.
pub fn color<C>(
    graph: &ConflictGraph,
    colors: &[C],
    preferences: &[ColoringPreference<C>],
) -> IrResult<BTreeMap<Variable, C>>
where
    C: Copy + Eq + std::fmt::Display,
{
    let k = colors.len();
    let mut coloring = precolor(graph, preferences)?;

    let mut degrees: BTreeMap<&Variable, usize> = graph
        .nodes()
        .filter(|var| !coloring.contains_key(*var))
        .map(|var| (var, graph.degree(var)))
        .collect();
    let mut stack = Vec::with_capacity(degrees.len());
    while !degrees.is_empty() {
        let next = degrees
            .iter()
            .filter(|(_, &degree)| degree < k)
            .min_by_key(|(&var, &degree)| (Reverse(degree), var))
            .map(|(&var, _)| var);
        let Some(var) = next else {
            log::debug!("can't simplify {} variables with {k} colors", degrees.len());
            return Err(IrError::InsufficientColors {
                colors: k,
                remaining: degrees.len(),
            });
        };
        degrees.remove(var);
        for neighbour in graph.neighbours(var) {
            if let Some(degree) = degrees.get_mut(neighbour) {
                *degree -= 1;
            }
        }
        stack.push(var);
    }

    while let Some(var) = stack.pop() {
        let used: Vec<C> = graph
            .neighbours(var)
            .filter_map(|n| coloring.get(n).copied())
            .collect();
        let free: Vec<C> = colors.iter().copied().filter(|c| !used.contains(c)).collect();
        let chosen = select(var, &free, &coloring, preferences).ok_or(
            IrError::InsufficientColors {
                colors: k,
                remaining: stack.len() + 1,
            },
        )?;
        coloring.insert(var.clone(), chosen);
    }

    log::trace!("colored {} variables", coloring.len());
    Ok(coloring)
}

fn precolor<C>(
    graph: &ConflictGraph,
    preferences: &[ColoringPreference<C>],
) -> IrResult<BTreeMap<Variable, C>>
where
    C: Copy + Eq + std::fmt::Display,
{
    let mut coloring = BTreeMap::new();
    for preference in preferences {
        if let ColoringPreference::Pinned(var, color) = preference {
            if graph.contains(var) && !coloring.contains_key(var) {
                coloring.insert(var.clone(), *color);
            }
        }
    }

    for (var, color) in &coloring {
        let clash = graph
            .neighbours(var)
            .find(|n| *n > var && coloring.get(*n) == Some(color));
        if let Some(neighbour) = clash {
            return Err(IrError::PinnedConflict {
                first: var.clone(),
                second: neighbour.clone(),
                color: color.to_string(),
            });
        }
    }
    Ok(coloring)
}

/// Picks a color for `var` out of the `free` ones.
fn select<C>(
    var: &Variable,
    free: &[C],
    coloring: &BTreeMap<Variable, C>,
    preferences: &[ColoringPreference<C>],
) -> Option<C>
where
    C: Copy + Eq,
{
    let target = preferences.iter().find_map(|p| match p {
        ColoringPreference::Target(v, c) if v == var && free.contains(c) => Some(*c),
        _ => None,
    });
    let partner = || {
        preferences.iter().find_map(|p| match p {
            ColoringPreference::Coalesce(a, b) => {
                let partner = if a == var {
                    b
                } else if b == var {
                    a
                } else {
                    return None;
                };
                coloring.get(partner).copied().filter(|c| free.contains(c))
            }
            _ => None,
        })
    };
    let not_avoided = || {
        free.iter().copied().find(|c| {
            !preferences
                .iter()
                .any(|p| matches!(p, ColoringPreference::Avoid(v, a) if v == var && a == c))
        })
    };

    target
        .or_else(partner)
        .or_else(not_avoided)
        .or_else(|| free.first().copied())
}
