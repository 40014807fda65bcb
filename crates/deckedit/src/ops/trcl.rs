//! In-Cell Transform References and `ApplyTransfo` (§4.6)

use std::collections::HashSet;

use nalgebra::{Matrix3, Vector3};

use crate::core::{format_tr, round_tr, transform::RigidTransform, CellBody, Transform};
use crate::deck::Deck;
use crate::error::{Error, Result};

fn format_constant(rigid: &RigidTransform) -> String {
    let t = rigid.translation;
    let r = rigid.rotation;
    format!(
        "({} {} {} {} {} {} {} {} {} {} {} {})",
        format_tr(t.x),
        format_tr(t.y),
        format_tr(t.z),
        format_tr(r[(0, 0)]),
        format_tr(r[(0, 1)]),
        format_tr(r[(0, 2)]),
        format_tr(r[(1, 0)]),
        format_tr(r[(1, 1)]),
        format_tr(r[(1, 2)]),
        format_tr(r[(2, 0)]),
        format_tr(r[(2, 1)]),
        format_tr(r[(2, 2)]),
    )
}

fn replace_bare_with_text(trailing: &str, keyword: &str, replacement: &str) -> String {
    let lower = trailing.to_ascii_lowercase();
    let key = format!("{}=", keyword.to_ascii_lowercase());
    let Some(pos) = lower.find(&key) else {
        return trailing.to_string();
    };
    let value_start = pos + key.len();
    let rest = &trailing[value_start..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    format!(
        "{}{}{}",
        &trailing[..value_start],
        replacement,
        &trailing[value_start + digits.len()..]
    )
}

/// Finds the span (start, end) of a parenthesised constant block following
/// `<keyword>=`, tolerating an optional `fill=`-style lattice-index prefix
/// (`3` or `3:5`) between the `=` and the `(`.
fn find_paren_block(trailing: &str, keyword: &str) -> Option<(usize, usize)> {
    let lower = trailing.to_ascii_lowercase();
    let key = format!("{}=", keyword.to_ascii_lowercase());
    let pos = lower.find(&key)?;
    let bytes = trailing.as_bytes();
    let mut idx = pos + key.len();
    while idx < bytes.len() && (bytes[idx] as char).is_ascii_digit() {
        idx += 1;
    }
    if idx < bytes.len() && bytes[idx] as char == ':' {
        idx += 1;
        while idx < bytes.len() && (bytes[idx] as char).is_ascii_digit() {
            idx += 1;
        }
    }
    while idx < bytes.len() && (bytes[idx] as char).is_whitespace() {
        idx += 1;
    }
    if idx >= bytes.len() || bytes[idx] as char != '(' {
        return None;
    }
    let start = idx;
    let mut depth = 0i32;
    while idx < bytes.len() {
        match bytes[idx] as char {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, idx + 1));
                }
            }
            _ => {}
        }
        idx += 1;
    }
    None
}

fn parse_constant_values(block: &str) -> Result<Vec<f64>> {
    let inner = block.trim().trim_start_matches('(').trim_end_matches(')');
    inner
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>().map_err(|_| Error::MalformedInput {
                detail: format!("non-numeric field '{t}' in constant transform '{block}'"),
            })
        })
        .collect()
}

fn values_to_rigid(values: &[f64], degrees: bool) -> Result<RigidTransform> {
    let (translation, rotation) = match values.len() {
        3 => (Vector3::new(values[0], values[1], values[2]), Matrix3::identity()),
        12 | 13 => {
            let t = Vector3::new(values[0], values[1], values[2]);
            let r = Matrix3::new(
                values[3], values[4], values[5], values[6], values[7], values[8], values[9],
                values[10], values[11],
            );
            (t, r)
        }
        n => {
            return Err(Error::MalformedInput {
                detail: format!("constant transform has {n} numeric fields, expected 3, 12, or 13"),
            })
        }
    };
    let card = Transform {
        id: 0,
        degrees,
        translation,
        rotation,
        sense: if values.len() == 13 { values[12] as i8 } else { 1 },
    };
    Ok(card.to_rigid())
}

/// **SetCstTrcl** (§4.6): replaces every bare-integer `trcl=`/`fill=`
/// reference by its expanded constant form, using the referenced
/// transform's current scalar-unit value.
pub(crate) fn set_cst_trcl(deck: &mut Deck) -> Result<()> {
    let lookups: Vec<(usize, &'static str, u32)> = deck
        .cells
        .iter()
        .enumerate()
        .flat_map(|(i, cell)| {
            ["trcl", "fill"]
                .into_iter()
                .filter_map(move |kw| cell.numeric_transform_ref(kw).map(|id| (i, kw, id)))
        })
        .collect();
    for (i, kw, id) in lookups {
        let rigid = deck.find_tr_card(id).ok_or_else(|| Error::MissingReference {
            detail: format!("cell {} references undefined transform {id}", deck.cells[i].id),
        })?;
        let text = format_constant(&rigid);
        if let CellBody::Plain { trailing, .. } = &mut deck.cells[i].body {
            *trailing = replace_bare_with_text(trailing, kw, &text);
        }
    }
    Ok(())
}

/// **SwapCstTrclByNum** (§4.6): the inverse of [`set_cst_trcl`] — synthesises
/// a fresh transform card for each constant `trcl=`/`fill=` form and
/// replaces it by that card's number. `reserved` excludes ids already
/// claimed by the caller (e.g. tally bookkeeping) from the free-id search.
pub(crate) fn swap_cst_trcl_by_num(deck: &mut Deck, reserved: &HashSet<u32>) -> Result<()> {
    for kw in ["trcl", "fill"] {
        let mut used: HashSet<u32> = deck.transforms.iter().map(|t| t.id).chain(reserved.iter().copied()).collect();
        for i in 0..deck.cells.len() {
            let block = match &deck.cells[i].body {
                CellBody::Plain { trailing, .. } => find_paren_block(trailing, kw),
                CellBody::Like { .. } => None,
            };
            let Some((start, end)) = block else { continue };
            let (degrees, text) = match &deck.cells[i].body {
                CellBody::Plain { trailing, .. } => {
                    (trailing[..start].to_ascii_lowercase().contains(&format!("*{kw}=")), trailing[start..end].to_string())
                }
                CellBody::Like { .. } => unreachable!(),
            };
            let values = parse_constant_values(&text)?;
            let rigid = values_to_rigid(&values, degrees)?;
            let new_id = (1..10_000)
                .find(|n| !used.contains(n))
                .ok_or(Error::TransformIdExhaustion)?;
            used.insert(new_id);
            deck.transforms.push(Transform {
                id: new_id,
                degrees: false,
                translation: rigid.translation,
                rotation: rigid.rotation,
                sense: 1,
            });
            if let CellBody::Plain { trailing, .. } = &mut deck.cells[i].body {
                *trailing = format!("{}{}{}", &trailing[..start], new_id, &trailing[end..]);
            }
        }
    }
    Ok(())
}

fn normalize_star_forms(deck: &mut Deck) -> Result<()> {
    for cell in deck.cells.iter_mut() {
        let CellBody::Plain { trailing, .. } = &mut cell.body else {
            continue;
        };
        for kw in ["trcl", "fill"] {
            let star_kw = format!("*{kw}");
            if let Some((start, end)) = find_paren_block(trailing, &star_kw) {
                let values = parse_constant_values(&trailing[start..end])?;
                let rigid = values_to_rigid(&values, true)?;
                let replacement = format_constant(&rigid);
                let lower = trailing.to_ascii_lowercase();
                let star_pos = lower.find(&format!("*{kw}=")).unwrap();
                let mut rebuilt = String::with_capacity(trailing.len());
                rebuilt.push_str(&trailing[..star_pos]);
                rebuilt.push_str(kw);
                rebuilt.push('=');
                rebuilt.push_str(&trailing[star_pos + star_kw.len() + 1..start]);
                rebuilt.push_str(&replacement);
                rebuilt.push_str(&trailing[end..]);
                *trailing = rebuilt;
            }
        }
    }
    Ok(())
}

/// **ApplyTransfo** (§4.6): the top-level operator composing `applied` into
/// every existing transform card, every in-cell constant `trcl`/`fill`, and
/// the Deck's own `object_transform`.
pub(crate) fn apply_transfo(
    deck: &mut Deck,
    applied: RigidTransform,
    sense_suffix: Option<bool>,
    comment: Option<&str>,
) -> Result<()> {
    normalize_star_forms(deck)?;
    set_cst_trcl(deck)?;

    for surface in deck.surfaces.iter() {
        if surface.transform < 0 {
            return Err(Error::MalformedInput {
                detail: format!(
                    "surface {} has a periodic transform slot and cannot receive a new transform",
                    surface.id
                ),
            });
        }
    }

    let mut used: HashSet<u32> = deck.transforms.iter().map(|t| t.id).collect();
    let new_id = (1..10_000)
        .find(|n| !used.contains(n))
        .ok_or(Error::TransformIdExhaustion)?;
    used.insert(new_id);

    let mut attached = false;
    for surface in deck.surfaces.iter_mut() {
        if surface.transform == 0 {
            surface.transform = new_id as i64;
            attached = true;
        }
    }
    let _ = sense_suffix;
    if attached {
        deck.transforms.push(Transform {
            id: new_id,
            degrees: false,
            translation: applied.translation,
            rotation: applied.rotation,
            sense: 1,
        });
    }

    for transform in deck.transforms.iter_mut() {
        if transform.id == new_id && attached {
            continue;
        }
        let existing = transform.to_rigid();
        let composed = existing.compose_object(&applied).rounded();
        transform.degrees = false;
        transform.translation = composed.translation;
        transform.rotation = composed.rotation;
        transform.sense = 1;
    }

    for cell in deck.cells.iter_mut() {
        let CellBody::Plain { trailing, .. } = &mut cell.body else {
            continue;
        };
        for kw in ["trcl", "fill"] {
            if let Some((start, end)) = find_paren_block(trailing, kw) {
                let values = parse_constant_values(&trailing[start..end])?;
                let current = values_to_rigid(&values, false)?;
                let composed = current.compose_cell_constant(&applied).rounded();
                let replacement = format_constant(&composed);
                *trailing = format!("{}{}{}", &trailing[..start], replacement, &trailing[end..]);
            }
        }
    }

    deck.object_transform = deck.object_transform.compose_object(&applied).rounded();
    let label = comment
        .map(str::to_string)
        .unwrap_or_else(|| format!("Generalised transform: {}", describe(&applied)));
    deck.transform_history.push(label);

    Ok(())
}

fn describe(t: &RigidTransform) -> String {
    format!(
        "T=({:.3},{:.3},{:.3})",
        round_tr(t.translation.x),
        round_tr(t.translation.y),
        round_tr(t.translation.z)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Deck;

    #[test]
    fn set_cst_trcl_expands_bare_reference() {
        let text = "c h\n1 1 -1.0 -1 trcl=5 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\ntr5 1 2 3 1 0 0 0 1 0 0 0 1\n\n";
        let mut deck = Deck::from_text(text, None).unwrap();
        set_cst_trcl(&mut deck).unwrap();
        if let CellBody::Plain { trailing, .. } = &deck.cells[0].body {
            assert!(trailing.contains("trcl=("));
        } else {
            panic!("expected plain cell");
        }
    }

    #[test]
    fn translat_updates_object_transform() {
        let text = "c h\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\n";
        let mut deck = Deck::from_text(text, None).unwrap();
        deck.translat(Vector3::new(10.0, 20.0, 30.0), None).unwrap();
        assert_eq!(deck.object_transform.translation, Vector3::new(10.0, 20.0, 30.0));
    }
}
