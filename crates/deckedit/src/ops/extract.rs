//! Extract Engine (§4.9): transitive closure of a cell subset

use std::collections::HashSet;

use crate::core::{Cell, CellBody, RigidTransform, Surface};
use crate::deck::Deck;
use crate::error::{Error, Result};
use crate::parse::geometry::extract_numeric_keyword_value;

/// Whether [`extract`] keeps the named cells or everything else (§6:
/// `Extract`'s `mode` argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Keep exactly the named cells (closed transitively)
    Extract,
    /// Keep every cell except the named ones (and the host's last two)
    Subtract,
}

/// **Extract** (§4.9): closes `cells` under surface, material, transform,
/// and cell-complement/`like` dependencies, emitting a standalone deck
/// wrapped in a fresh bounding sphere of radius `radius`.
pub(crate) fn extract(host: &Deck, cells: &[u32], mode: ExtractMode, radius: f64) -> Result<Deck> {
    let mut selected_cells: HashSet<u32> = match mode {
        ExtractMode::Extract => cells.iter().copied().collect(),
        ExtractMode::Subtract => {
            let all: HashSet<u32> = if host.cells.len() >= 2 {
                host.cells[..host.cells.len() - 2]
                    .iter()
                    .map(|c| c.id)
                    .collect()
            } else {
                HashSet::new()
            };
            let excluded: HashSet<u32> = cells.iter().copied().collect();
            all.difference(&excluded).copied().collect()
        }
    };

    let mut surfaces: HashSet<u32> = HashSet::new();
    let mut materials: HashSet<u32> = HashSet::new();
    let mut transforms: HashSet<u32> = HashSet::new();

    loop {
        let mut added = false;
        let snapshot: Vec<u32> = selected_cells.iter().copied().collect();
        for id in snapshot {
            let Some(cell) = host.cells.iter().find(|c| c.id == id) else {
                continue;
            };
            match &cell.body {
                CellBody::Plain {
                    material,
                    surface_refs,
                    cell_refs,
                    trailing,
                    ..
                } => {
                    if *material > 0 {
                        materials.insert(*material as u32);
                    }
                    surfaces.extend(surface_refs.iter().copied());
                    for cref in cell_refs {
                        if selected_cells.insert(*cref) {
                            added = true;
                        }
                    }
                    for kw in ["trcl", "fill"] {
                        if let Some(n) = extract_numeric_keyword_value(trailing, kw) {
                            transforms.insert(n);
                        }
                    }
                }
                CellBody::Like { parent, .. } => {
                    if selected_cells.insert(*parent) {
                        added = true;
                    }
                }
            }
        }
        if !added {
            break;
        }
    }

    if selected_cells.is_empty() {
        return Err(Error::EmptyResult);
    }

    for sid in surfaces.clone() {
        if let Some(surf) = host.surfaces.iter().find(|s| s.id == sid) {
            if surf.has_transform() {
                transforms.insert(surf.transform as u32);
            }
        }
    }

    let ordered_ids: Vec<u32> = host
        .cells
        .iter()
        .filter(|c| selected_cells.contains(&c.id))
        .map(|c| c.id)
        .collect();
    let mut out_cells: Vec<Cell> = host
        .cells
        .iter()
        .filter(|c| selected_cells.contains(&c.id))
        .cloned()
        .collect();

    let max_surf = host.surfaces.iter().map(|s| s.id).max().unwrap_or(0);
    let sphere_id = max_surf + 1;
    let max_cell = host.cells.iter().map(|c| c.id).max().unwrap_or(0);
    let inner_id = max_cell + 1;
    let outer_id = max_cell + 2;

    let complement_frag = ordered_ids
        .iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(" ");

    out_cells.push(Cell {
        id: inner_id,
        body: CellBody::Plain {
            material: 0,
            density: None,
            geometry: format!("{complement_frag} -{sphere_id}"),
            cell_refs: ordered_ids.clone(),
            surface_refs: vec![sphere_id],
            trailing: "imp:p=1 imp:n=1 imp:e=1".to_string(),
        },
        comment: None,
    });
    out_cells.push(Cell {
        id: outer_id,
        body: CellBody::Plain {
            material: 0,
            density: None,
            geometry: sphere_id.to_string(),
            cell_refs: Vec::new(),
            surface_refs: vec![sphere_id],
            trailing: "imp:p=0 imp:n=0 imp:e=0".to_string(),
        },
        comment: None,
    });

    let mut out_surfaces: Vec<Surface> = host
        .surfaces
        .iter()
        .filter(|s| surfaces.contains(&s.id))
        .cloned()
        .collect();
    out_surfaces.push(Surface {
        id: sphere_id,
        reflecting: false,
        white_boundary: false,
        transform: 0,
        surf_type: "so".to_string(),
        params: format!("{radius}"),
        comment: None,
    });

    let out_materials = host
        .materials
        .iter()
        .filter(|m| materials.contains(&m.id))
        .cloned()
        .collect();
    let out_transforms = host
        .transforms
        .iter()
        .filter(|t| transforms.contains(&t.id))
        .cloned()
        .collect();

    let mut out_groups = host.groups.clone();
    out_groups.retain(|_, g| g.retain(&selected_cells, &surfaces, &transforms));

    Ok(Deck {
        cells: out_cells,
        surfaces: out_surfaces,
        transforms: out_transforms,
        materials: out_materials,
        groups: out_groups,
        enclosing_surface: format!("-{sphere_id}"),
        object_transform: RigidTransform::identity(),
        transform_history: Vec::new(),
        inserted_files: Vec::new(),
        free_metadata: Vec::new(),
        source_path: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Deck;

    fn sample_host() -> Deck {
        let text = "c h\n\
8 1 -1.0 -5 imp:n=1\n\
12 1 -1.0 -5 9 #8 imp:n=1\n\
20 0 9 imp:n=0\n\
\n\
5 so 2.0\n\
9 so 50.0\n\
\n";
        Deck::from_text(text, None).unwrap()
    }

    #[test]
    fn extracts_cell_with_complement_closure_s5() {
        let host = sample_host();
        let out = extract(&host, &[12], ExtractMode::Extract, 100.0).unwrap();
        let ids: HashSet<u32> = out.cells.iter().map(|c| c.id).collect();
        assert!(ids.contains(&12));
        assert!(ids.contains(&8));
        let surf_ids: HashSet<u32> = out.surfaces.iter().map(|s| s.id).collect();
        assert!(surf_ids.contains(&5));
        assert!(surf_ids.contains(&9));
    }

    #[test]
    fn empty_selection_is_an_error() {
        let host = sample_host();
        let result = extract(&host, &[999], ExtractMode::Extract, 100.0);
        assert!(result.is_err());
    }
}
