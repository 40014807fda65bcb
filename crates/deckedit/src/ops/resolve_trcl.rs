//! ResolveTRCL (§4.7): fixes `trcl`-derived surface-number collisions

use std::collections::{HashMap, HashSet};

use crate::core::CellBody;
use crate::deck::Deck;
use crate::error::{Error, Result};
use crate::ops::renumber::{self, Filter};

const MAX_ITERATIONS: u32 = 10;

fn has_trcl(cell: &crate::core::Cell) -> bool {
    match &cell.body {
        CellBody::Plain { trailing, .. } => trailing.to_ascii_lowercase().contains("trcl="),
        CellBody::Like { .. } => false,
    }
}

/// Surfaces reachable from `id`, following `#N` complement references and
/// `like N` parent chains transitively, memoised across one `ResolveTRCL`
/// iteration.
fn transitive_surfaces(
    deck: &Deck,
    cache: &mut HashMap<u32, Vec<u32>>,
    id: u32,
    visiting: &mut HashSet<u32>,
) -> Vec<u32> {
    if let Some(v) = cache.get(&id) {
        return v.clone();
    }
    if !visiting.insert(id) {
        return Vec::new();
    }
    let mut result = Vec::new();
    if let Some(cell) = deck.cells.iter().find(|c| c.id == id) {
        match &cell.body {
            CellBody::Plain {
                surface_refs,
                cell_refs,
                ..
            } => {
                result.extend(surface_refs.iter().copied());
                for cref in cell_refs {
                    result.extend(transitive_surfaces(deck, cache, *cref, visiting));
                }
            }
            CellBody::Like { parent, .. } => {
                result.extend(transitive_surfaces(deck, cache, *parent, visiting));
            }
        }
    }
    visiting.remove(&id);
    cache.insert(id, result.clone());
    result
}

/// Resolves `trcl`-derived surface collisions (`surf + 1000*cell`), per the
/// two-check iteration of §4.7.
pub(crate) fn resolve_trcl(deck: &mut Deck) -> Result<()> {
    for _ in 0..MAX_ITERATIONS {
        let mut cache = HashMap::new();
        let real_surfaces: HashSet<u32> = deck.surfaces.iter().map(|s| s.id).collect();
        let trcl_cells: Vec<u32> = deck.cells.iter().filter(|c| has_trcl(c)).map(|c| c.id).collect();

        let mut range_scheduled = false;
        for &id in &trcl_cells {
            let mut visiting = HashSet::new();
            let surfs = transitive_surfaces(deck, &mut cache, id, &mut visiting);
            if id >= 1000 || surfs.iter().any(|s| *s >= 1000) {
                range_scheduled = true;
                break;
            }
        }
        if range_scheduled {
            renumber::renumber(deck, Filter::All, 1, Filter::All, 1, None)?;
            continue;
        }

        let mut collision_scheduled: Vec<u32> = Vec::new();
        for &id in &trcl_cells {
            let mut visiting = HashSet::new();
            let surfs = transitive_surfaces(deck, &mut cache, id, &mut visiting);
            let collides = surfs.iter().any(|s| real_surfaces.contains(&(s + 1000 * id)));
            if collides {
                collision_scheduled.push(id);
            }
        }
        if collision_scheduled.is_empty() {
            return Ok(());
        }
        let start = collision_scheduled.iter().min().copied().unwrap_or(1) + 1;
        collision_scheduled.sort_unstable();
        renumber::renumber(deck, Filter::Some(collision_scheduled), start, Filter::None, 1, None)?;
    }

    Err(Error::ConvergenceFailure {
        iterations: MAX_ITERATIONS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Deck;

    #[test]
    fn converges_on_a_deck_with_no_trcl() {
        let text = "c h\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\n";
        let mut deck = Deck::from_text(text, None).unwrap();
        assert!(resolve_trcl(&mut deck).is_ok());
    }
}
