//! Renumber Engine (§4.5): transforms, then cells, then surfaces

use std::collections::HashMap;

use crate::core::CellBody;
use crate::deck::Deck;
use crate::error::Result;
use crate::parse::geometry::{replace_numeric_keyword_value, rewrite_geometry};

/// Which identifiers to renumber within one class.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Renumber every identifier currently in the deck (the `{-1}` sentinel)
    All,
    /// Renumber exactly these identifiers, in the given order
    Some(Vec<u32>),
    /// Renumber nothing
    None,
}

/// Stages the given ids to a disjoint temporary range, then places each one
/// into its sequential final slot starting at `start`, swapping any
/// unrelated occupant into the vacated original slot. Returns the composed
/// old-id -> new-id map actually applied.
fn stage_and_place(
    current_ids: impl Fn(&Deck) -> Vec<u32>,
    set_id: impl Fn(&mut Deck, u32, u32),
    deck: &mut Deck,
    order: &[u32],
    start: u32,
) -> HashMap<u32, u32> {
    let mut applied = HashMap::new();
    if order.is_empty() {
        return applied;
    }
    let temp_base = current_ids(deck).into_iter().max().unwrap_or(0) + 1 + order.len() as u32;
    let mut temp_of: HashMap<u32, u32> = HashMap::new();
    for (i, old) in order.iter().enumerate() {
        temp_of.insert(*old, temp_base + i as u32);
    }
    for (old, temp) in temp_of.iter() {
        set_id(deck, *old, *temp);
    }
    let mut final_of: HashMap<u32, u32> = HashMap::new();
    for (i, old) in order.iter().enumerate() {
        final_of.insert(temp_of[old], start + i as u32);
    }
    for (&temp_id, &final_id) in final_of.iter() {
        if temp_id == final_id {
            continue;
        }
        if current_ids(deck).contains(&final_id) {
            set_id(deck, final_id, temp_id);
        }
        set_id(deck, temp_id, final_id);
    }
    for old in order {
        let temp = temp_of[old];
        applied.insert(*old, final_of[&temp]);
    }
    applied
}

fn propagate_transform_rename(deck: &mut Deck, mapping: &HashMap<u32, u32>) {
    if mapping.is_empty() {
        return;
    }
    for cell in deck.cells.iter_mut() {
        if let CellBody::Plain { trailing, .. } = &mut cell.body {
            *trailing = replace_numeric_keyword_value(trailing, "trcl", mapping);
            *trailing = replace_numeric_keyword_value(trailing, "fill", mapping);
        }
    }
    for surf in deck.surfaces.iter_mut() {
        if surf.transform > 0 {
            if let Some(n) = mapping.get(&(surf.transform as u32)) {
                surf.transform = *n as i64;
            }
        }
    }
    for group in deck.groups.values_mut() {
        if let Some(list) = &mut group.trans {
            for v in list.iter_mut() {
                if *v >= 0 {
                    if let Some(n) = mapping.get(&(*v as u32)) {
                        *v = *n as i64;
                    }
                }
            }
        }
    }
}

fn propagate_cell_rename(deck: &mut Deck, mapping: &HashMap<u32, u32>) {
    if mapping.is_empty() {
        return;
    }
    for cell in deck.cells.iter_mut() {
        match &mut cell.body {
            CellBody::Plain {
                geometry,
                cell_refs,
                ..
            } => {
                *geometry = rewrite_geometry(geometry, Some(mapping), None);
                for r in cell_refs.iter_mut() {
                    if let Some(n) = mapping.get(r) {
                        *r = *n;
                    }
                }
            }
            CellBody::Like { parent, .. } => {
                if let Some(n) = mapping.get(parent) {
                    *parent = *n;
                }
            }
        }
    }
    for group in deck.groups.values_mut() {
        if let Some(list) = &mut group.cell {
            for v in list.iter_mut() {
                if *v >= 0 {
                    if let Some(n) = mapping.get(&(*v as u32)) {
                        *v = *n as i64;
                    }
                }
            }
        }
    }
}

fn propagate_surface_rename(deck: &mut Deck, mapping: &HashMap<u32, u32>) {
    if mapping.is_empty() {
        return;
    }
    for cell in deck.cells.iter_mut() {
        if let CellBody::Plain {
            geometry,
            surface_refs,
            ..
        } = &mut cell.body
        {
            *geometry = rewrite_geometry(geometry, None, Some(mapping));
            for r in surface_refs.iter_mut() {
                if let Some(n) = mapping.get(r) {
                    *r = *n;
                }
            }
        }
    }
    for group in deck.groups.values_mut() {
        if let Some(list) = &mut group.surf {
            for v in list.iter_mut() {
                if *v >= 0 {
                    if let Some(n) = mapping.get(&(*v as u32)) {
                        *v = *n as i64;
                    }
                }
            }
        }
    }
}

fn resolve_filter(filter: &Filter, all_ids: Vec<u32>) -> Vec<u32> {
    match filter {
        Filter::All => all_ids,
        Filter::Some(list) => list.clone(),
        Filter::None => Vec::new(),
    }
}

/// Runs the three-phase Renumber Engine (§4.5): transforms, then cells,
/// then surfaces, propagating every cross-reference as it goes.
///
/// `trans_start = None` suppresses transform renumbering entirely, matching
/// [`crate::ops::resolve_trcl`]'s use of the engine with transforms frozen.
pub fn renumber(
    deck: &mut Deck,
    cells: Filter,
    cell_start: u32,
    surfaces: Filter,
    surf_start: u32,
    trans_start: Option<u32>,
) -> Result<()> {
    if let Some(start) = trans_start {
        let order: Vec<u32> = deck.transforms.iter().map(|t| t.id).collect();
        let mut mapping = HashMap::new();
        for (i, old) in order.iter().enumerate() {
            mapping.insert(*old, start + i as u32);
        }
        for transform in deck.transforms.iter_mut() {
            transform.id = mapping[&transform.id];
        }
        propagate_transform_rename(deck, &mapping);
    }

    let cell_order = resolve_filter(&cells, deck.cells.iter().map(|c| c.id).collect());
    if !cell_order.is_empty() {
        let mapping = stage_and_place(
            |d| d.cells.iter().map(|c| c.id).collect(),
            |d, old, new| {
                if let Some(c) = d.cells.iter_mut().find(|c| c.id == old) {
                    c.id = new;
                }
            },
            deck,
            &cell_order,
            cell_start,
        );
        propagate_cell_rename(deck, &mapping);
        deck.enclosing_surface = rewrite_geometry(&deck.enclosing_surface, Some(&mapping), None);
    }

    let surf_order = resolve_filter(&surfaces, deck.surfaces.iter().map(|s| s.id).collect());
    if !surf_order.is_empty() {
        let mapping = stage_and_place(
            |d| d.surfaces.iter().map(|s| s.id).collect(),
            |d, old, new| {
                if let Some(s) = d.surfaces.iter_mut().find(|s| s.id == old) {
                    s.id = new;
                }
            },
            deck,
            &surf_order,
            surf_start,
        );
        propagate_surface_rename(deck, &mapping);
        deck.enclosing_surface = rewrite_geometry(&deck.enclosing_surface, None, Some(&mapping));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Deck;

    fn two_cell_deck() -> Deck {
        let text = "c header\n\
1 1 -1.0 -1 2 imp:n=1\n\
2 0 1 imp:n=0\n\
\n\
1 so 10.0\n\
2 px 5.0\n\
\n\
tr1 0 0 0 1 0 0 0 1 0 0 0 1\n\
\n";
        Deck::from_text(text, None).unwrap()
    }

    #[test]
    fn renumbers_two_cell_deck_s1() {
        let mut deck = two_cell_deck();
        renumber(
            &mut deck,
            Filter::All,
            10,
            Filter::All,
            20,
            Some(30),
        )
        .unwrap();
        let ids: Vec<u32> = deck.cells.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![10, 11]);
        let sids: Vec<u32> = deck.surfaces.iter().map(|s| s.id).collect();
        assert_eq!(sids, vec![20, 21]);
        assert_eq!(deck.transforms[0].id, 30);
        if let CellBody::Plain { geometry, .. } = &deck.cells[0].body {
            assert!(geometry.contains("20"));
            assert!(geometry.contains("21"));
        }
    }

    #[test]
    fn renumber_idempotence() {
        let mut deck = two_cell_deck();
        renumber(&mut deck, Filter::All, 1, Filter::All, 1, Some(1)).unwrap();
        let once = deck.clone();
        renumber(&mut deck, Filter::All, 1, Filter::All, 1, Some(1)).unwrap();
        assert_eq!(deck.cells.len(), once.cells.len());
        assert_eq!(
            deck.cells.iter().map(|c| c.id).collect::<Vec<_>>(),
            once.cells.iter().map(|c| c.id).collect::<Vec<_>>()
        );
    }
}
