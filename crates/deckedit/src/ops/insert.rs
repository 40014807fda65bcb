//! Insert Engine (§4.8): composes a guest deck into a host deck

use crate::core::{Cell, CellBody};
use crate::deck::Deck;
use crate::error::Result;
use crate::ops::material_merge;
use crate::ops::renumber::{self, Filter};
use crate::parse::geometry::scan_geometry_refs;

/// Where the guest deck sits relative to the host's geometry (§6: `Insert`'s
/// `location` argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Guest sits inside the host's diesis cell
    Inside,
    /// Guest sits outside the host's world cell
    Outside,
    /// Splice into both the diesis and world cells
    Unknown,
}

fn class_range(ids: &[u32]) -> Option<(u32, u32)> {
    if ids.is_empty() {
        None
    } else {
        Some((*ids.iter().min().unwrap(), *ids.iter().max().unwrap()))
    }
}

fn overlaps(host: Option<(u32, u32)>, guest: Option<(u32, u32)>) -> bool {
    match (host, guest) {
        (Some((h_min, h_max)), Some((g_min, g_max))) => {
            let test = (g_max as i64 - h_min as i64) * (h_max as i64 - g_min as i64);
            test >= 0
        }
        _ => false,
    }
}

/// Computes disjoint id ranges for cells/surfaces/transforms between `host`
/// and `guest` (§4.8 step 1), renumbering `guest` (and, if forced, `host`
/// too) as needed.
fn reconcile_ids(host: &mut Deck, guest: &mut Deck, renum: bool) -> Result<()> {
    if renum {
        renumber::renumber(guest, Filter::All, 1, Filter::All, 1, Some(1))?;
        let cell_start = guest.cells.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let surf_start = guest.surfaces.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let trans_start = guest.transforms.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        renumber::renumber(
            host,
            Filter::All,
            cell_start,
            Filter::All,
            surf_start,
            Some(trans_start),
        )?;
        return Ok(());
    }

    let h_cells = class_range(&host.cells.iter().map(|c| c.id).collect::<Vec<_>>());
    let g_cells = class_range(&guest.cells.iter().map(|c| c.id).collect::<Vec<_>>());
    if overlaps(h_cells, g_cells) {
        let start = h_cells.map(|(_, max)| max + 1).unwrap_or(1);
        renumber::renumber(guest, Filter::All, start, Filter::None, 1, None)?;
    }

    let h_surfaces = class_range(&host.surfaces.iter().map(|s| s.id).collect::<Vec<_>>());
    let g_surfaces = class_range(&guest.surfaces.iter().map(|s| s.id).collect::<Vec<_>>());
    if overlaps(h_surfaces, g_surfaces) {
        let start = h_surfaces.map(|(_, max)| max + 1).unwrap_or(1);
        renumber::renumber(guest, Filter::None, 1, Filter::All, start, None)?;
    }

    let h_transforms = class_range(&host.transforms.iter().map(|t| t.id).collect::<Vec<_>>());
    let g_transforms = class_range(&guest.transforms.iter().map(|t| t.id).collect::<Vec<_>>());
    if overlaps(h_transforms, g_transforms) {
        let start = h_transforms.map(|(_, max)| max + 1).unwrap_or(1);
        renumber::renumber(guest, Filter::None, 1, Filter::None, 1, Some(start))?;
    }

    Ok(())
}

fn append_fragment(cell: &mut Cell, fragment: &str, label: &str) -> Result<()> {
    if let CellBody::Plain {
        geometry,
        surface_refs,
        cell_refs,
        ..
    } = &mut cell.body
    {
        if !fragment.trim().is_empty() {
            geometry.push(' ');
            geometry.push_str(fragment);
            let (new_cell_refs, new_surface_refs) = scan_geometry_refs(fragment)?;
            cell_refs.extend(new_cell_refs);
            surface_refs.extend(new_surface_refs);
        }
    }
    cell.comment = Some(match &cell.comment {
        Some(existing) => format!("{existing}; {label}"),
        None => label.to_string(),
    });
    Ok(())
}

/// **Insert** / **InsertCells** (§4.8): merges `guest` into `host` in place.
pub(crate) fn insert(
    host: &mut Deck,
    mut guest: Deck,
    location: Location,
    renum: bool,
    is_insert_cells: bool,
) -> Result<()> {
    reconcile_ids(host, &mut guest, renum)?;

    let guest_label = guest
        .source_path
        .clone()
        .unwrap_or_else(|| "<inserted deck>".to_string());

    let appended_any = material_merge::merge(&mut host.materials, &mut guest);
    let rule = "=".repeat(78);
    let banner = if appended_any {
        "New material cards from:"
    } else {
        "Zero new material cards from:"
    };
    host.free_metadata.push(format!("c {rule}"));
    host.free_metadata.push(format!("c {banner}"));
    host.free_metadata.push(format!("c {guest_label}"));
    host.free_metadata.push(format!("c {rule}"));

    let subtraction_ids: Vec<u32> = if is_insert_cells && guest.cells.len() >= 2 {
        guest.cells[..guest.cells.len() - 2]
            .iter()
            .map(|c| c.id)
            .collect()
    } else {
        Vec::new()
    };
    let guest_enclosing_surface = guest.enclosing_surface.clone();

    let mut guest_cells = guest.cells;
    if !guest_cells.is_empty() {
        guest_cells.pop(); // drop guest's own world cell
    }
    guest_cells.append(&mut host.cells);
    host.cells = guest_cells;

    let mut guest_surfaces = guest.surfaces;
    guest_surfaces.append(&mut host.surfaces);
    host.surfaces = guest_surfaces;

    let mut guest_transforms = guest.transforms;
    guest_transforms.append(&mut host.transforms);
    host.transforms = guest_transforms;

    host.free_metadata.extend(guest.free_metadata);

    for (name, g_group) in guest.groups {
        match host.groups.get(&name) {
            Some(h_group) if h_group.key_set() == g_group.key_set() => {
                let mut merged = host.groups.remove(&name).unwrap();
                if let (Some(h), Some(g)) = (&mut merged.cell, g_group.cell) {
                    h.extend(g);
                }
                if let (Some(h), Some(g)) = (&mut merged.surf, g_group.surf) {
                    h.extend(g);
                }
                if let (Some(h), Some(g)) = (&mut merged.trans, g_group.trans) {
                    h.extend(g);
                }
                host.groups.insert(name, merged);
            }
            _ => {
                host.groups.insert(name, g_group);
            }
        }
    }

    if is_insert_cells {
        let fragment = subtraction_ids
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(" ");
        if host.cells.len() >= 2 {
            let idx = host.cells.len() - 2;
            append_fragment(&mut host.cells[idx], &fragment, &guest_label)?;
        }
    } else {
        if matches!(location, Location::Inside | Location::Unknown) && host.cells.len() >= 2 {
            let idx = host.cells.len() - 2;
            append_fragment(&mut host.cells[idx], &guest_enclosing_surface, &guest_label)?;
        }
        if matches!(location, Location::Outside | Location::Unknown) && !host.cells.is_empty() {
            let idx = host.cells.len() - 1;
            append_fragment(&mut host.cells[idx], &guest_enclosing_surface, &guest_label)?;
        }
    }

    host.inserted_files.push(guest_label);
    host.inserted_files.extend(guest.inserted_files);
    host.transform_history.extend(guest.transform_history);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Deck;

    fn deck_with_three_cells(surf_base: u32) -> Deck {
        let text = format!(
            "c h\n1 1 -1.0 -{s1} imp:n=1\n2 1 -1.0 -{s2} imp:n=1\n3 0 {s2} imp:n=0\n\n{s1} so 5.0\n{s2} so 10.0\n\n",
            s1 = surf_base + 1,
            s2 = surf_base + 2,
        );
        Deck::from_text(&text, Some("guest.i".to_string())).unwrap()
    }

    #[test]
    fn insert_with_overlap_disjoints_ids() {
        let mut host = deck_with_three_cells(0);
        let guest = deck_with_three_cells(0);
        insert(&mut host, guest, Location::Unknown, false, false).unwrap();
        let mut ids: Vec<u32> = host.cells.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), host.cells.len());
    }
}
