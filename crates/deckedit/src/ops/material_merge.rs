//! Material Merge (§4.10): structural-equality dedup across the four
//! material-card kinds

use std::collections::HashSet;

use crate::core::{CellBody, Material, MaterialKind};
use crate::deck::Deck;

fn quadruple(materials: &[Material], id: u32) -> Vec<(MaterialKind, String)> {
    let mut v: Vec<_> = materials
        .iter()
        .filter(|m| m.id == id)
        .map(|m| (m.kind, m.normalized_body()))
        .collect();
    v.sort_by_key(|(k, _)| *k);
    v
}

fn rename_guest_material_id(guest: &mut Deck, from: u32, to: u32) {
    if from == to {
        return;
    }
    for m in guest.materials.iter_mut() {
        if m.id == from {
            m.id = to;
        }
    }
    for cell in guest.cells.iter_mut() {
        if let CellBody::Plain { material, .. } = &mut cell.body {
            if *material == from as i64 {
                *material = to as i64;
            }
        }
    }
}

fn swap_guest_material_id(guest: &mut Deck, a: u32, b: u32) {
    if a == b {
        return;
    }
    for m in guest.materials.iter_mut() {
        if m.id == a {
            m.id = b;
        } else if m.id == b {
            m.id = a;
        }
    }
    for cell in guest.cells.iter_mut() {
        if let CellBody::Plain { material, .. } = &mut cell.body {
            if *material == a as i64 {
                *material = b as i64;
            } else if *material == b as i64 {
                *material = a as i64;
            }
        }
    }
}

/// Merges `guest`'s material cards into `host_materials`, rewriting
/// `guest`'s own material cards and cell material slots in place. Returns
/// `true` if at least one new material quadruple was appended to the host
/// (used to decide which banner text to emit, §4.10).
pub(crate) fn merge(host_materials: &mut Vec<Material>, guest: &mut Deck) -> bool {
    let mut used_ids: HashSet<u32> = host_materials.iter().map(|m| m.id).collect();
    let guest_ids: Vec<u32> = {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        for m in &guest.materials {
            if seen.insert(m.id) {
                order.push(m.id);
            }
        }
        order
    };

    let mut appended_any = false;

    for guest_id in guest_ids {
        if !guest.materials.iter().any(|m| m.id == guest_id) {
            continue; // already consumed by an earlier rename in this pass
        }
        let gq = quadruple(&guest.materials, guest_id);

        let host_ids: Vec<u32> = {
            let mut seen = HashSet::new();
            let mut order = Vec::new();
            for m in host_materials.iter() {
                if seen.insert(m.id) {
                    order.push(m.id);
                }
            }
            order
        };
        let matched = host_ids
            .into_iter()
            .find(|&hid| quadruple(host_materials, hid) == gq);

        if let Some(host_id) = matched {
            if host_id != guest_id {
                if guest.materials.iter().any(|m| m.id == host_id) {
                    swap_guest_material_id(guest, guest_id, host_id);
                } else {
                    rename_guest_material_id(guest, guest_id, host_id);
                }
            }
            guest.materials.retain(|m| m.id != host_id);
        } else {
            let new_id = if used_ids.contains(&guest_id) {
                (1..).find(|n| !used_ids.contains(n)).expect("id space is infinite")
            } else {
                guest_id
            };
            used_ids.insert(new_id);
            rename_guest_material_id(guest, guest_id, new_id);
            host_materials.extend(guest.materials.iter().filter(|m| m.id == new_id).cloned());
            guest.materials.retain(|m| m.id != new_id);
            appended_any = true;
        }
    }

    appended_any
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Deck;

    #[test]
    fn identical_materials_are_deduplicated() {
        let host_text = "c h\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\nm1 1001 1.0\n\n";
        let guest_text = "c g\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 5.0\n\nm1 1001 1.0\n\n";
        let mut host = Deck::from_text(host_text, None).unwrap();
        let mut guest = Deck::from_text(guest_text, None).unwrap();
        let appended = merge(&mut host.materials, &mut guest);
        assert!(!appended);
        assert_eq!(host.materials.len(), 1);
        assert_eq!(guest.materials.len(), 0);
        if let CellBody::Plain { material, .. } = &guest.cells[0].body {
            assert_eq!(*material, 1);
        }
    }

    #[test]
    fn distinct_materials_are_appended_with_a_free_id() {
        let host_text = "c h\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\nm1 1001 1.0\n\n";
        let guest_text = "c g\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 5.0\n\nm1 8016 2.0\n\n";
        let mut host = Deck::from_text(host_text, None).unwrap();
        let mut guest = Deck::from_text(guest_text, None).unwrap();
        let appended = merge(&mut host.materials, &mut guest);
        assert!(appended);
        assert_eq!(host.materials.len(), 2);
        assert_eq!(host.materials[1].id, 2);
    }
}
