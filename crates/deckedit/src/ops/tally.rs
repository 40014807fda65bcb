//! Tally and Banner Helpers (§4.12)

use std::collections::HashSet;

use nalgebra::Vector3;

use crate::core::format_tr;
use crate::deck::Deck;
use crate::error::{Error, Result};

fn scan_existing_tally_numbers(deck: &Deck) -> HashSet<u32> {
    let mut set = HashSet::new();
    for line in &deck.free_metadata {
        let token = line.trim_start().split_whitespace().next().unwrap_or("");
        let lower = token.to_ascii_lowercase();
        let Some(digits_part) = lower.strip_prefix('f') else {
            continue;
        };
        let digits: String = digits_part
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(n) = digits.parse() {
            set.insert(n);
        }
    }
    set
}

fn validate_type(type_digit: u8, raw: &str) -> Result<()> {
    match type_digit {
        1 | 2 | 4 | 5 | 6 | 7 | 8 => Ok(()),
        _ => Err(Error::UnknownOption {
            option: "tally",
            value: raw.to_string(),
        }),
    }
}

/// Parses a tally token (`"4"` = auto-allocate type F4, `"14:n"` = explicit
/// number 14 for particle `n`) into `(explicit number, type digit, particle)`.
fn parse_tally_token(token: &str) -> Result<(Option<u32>, u8, Option<String>)> {
    if token.to_ascii_lowercase().contains("tmesh") {
        return Err(Error::UnknownOption {
            option: "tally",
            value: token.to_string(),
        });
    }
    let (main, part) = match token.split_once(':') {
        Some((m, p)) => (m, Some(p.to_string())),
        None => (token, None),
    };
    let lower = main.trim().to_ascii_lowercase();
    let digits = lower.strip_prefix('f').unwrap_or(&lower);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::MalformedInput {
            detail: format!("malformed tally token '{token}'"),
        });
    }
    let n: u32 = digits.parse().map_err(|_| Error::MalformedInput {
        detail: format!("tally number overflow in '{token}'"),
    })?;
    let type_digit = (n % 10) as u8;
    validate_type(type_digit, token)?;
    if n as u8 as u32 == type_digit as u32 && n < 10 {
        Ok((None, type_digit, part))
    } else {
        Ok((Some(n), type_digit, part))
    }
}

fn allocate_number(used: &mut HashSet<u32>, type_digit: u8, requested: Option<u32>) -> u32 {
    let base = type_digit as u32;
    let mut n = requested.unwrap_or(base);
    while used.contains(&n) {
        n += 10;
    }
    used.insert(n);
    n
}

fn replace_leading_number(template: &str, n: u32) -> String {
    let trimmed = template.trim_start();
    match trimmed.split_once(char::is_whitespace) {
        Some((_, rest)) => format!("{n} {}", rest.trim_start()),
        None => n.to_string(),
    }
}

fn missing(what: &str) -> Error {
    Error::MissingReference {
        detail: what.to_string(),
    }
}

/// **AddMCNPTally** (§4.12): synthesises `F<n>`/companion cards for every
/// member of a group's surface or cell list.
pub(crate) fn add_mcnp_tally(
    deck: &mut Deck,
    tally: &str,
    comment: Option<&str>,
    group: &str,
    card: Option<&str>,
) -> Result<()> {
    let (requested, type_digit, part) = parse_tally_token(tally)?;
    if type_digit == 5 {
        return Err(Error::UnknownOption {
            option: "tally",
            value: "F5 must be added via AddMCNPPointTally".to_string(),
        });
    }
    let class_is_surf = matches!(type_digit, 1 | 2);
    let group_rec = deck
        .groups
        .get(group)
        .cloned()
        .ok_or_else(|| missing(&format!("no group named '{group}'")))?;
    let items = if class_is_surf {
        group_rec.surf
    } else {
        group_rec.cell
    }
    .ok_or_else(|| {
        missing(&format!(
            "group '{group}' has no {} list",
            if class_is_surf { "surf" } else { "cell" }
        ))
    })?;

    let mut used = scan_existing_tally_numbers(deck);
    if let Some(c) = comment {
        deck.free_metadata.push(format!("c {c}"));
    }
    for item in items {
        let n = allocate_number(&mut used, type_digit, requested);
        let tag = part.as_deref().map(|p| format!(":{p}")).unwrap_or_default();
        deck.free_metadata.push(format!("F{n}{tag} {item}"));
        if let Some(template) = card {
            deck.free_metadata.push(replace_leading_number(template, n));
        }
    }
    Ok(())
}

fn parse_vec3_list(text: &str) -> Result<Vec<Vector3<f64>>> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>().map_err(|_| Error::MalformedInput {
                detail: format!("non-numeric position component '{t}'"),
            })
        })
        .collect::<Result<_>>()?;
    if values.len() % 3 != 0 {
        return Err(Error::MalformedInput {
            detail: "position list length is not a multiple of 3".to_string(),
        });
    }
    Ok(values
        .chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect())
}

fn parse_f64_list(text: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|t| {
            t.parse::<f64>().map_err(|_| Error::MalformedInput {
                detail: format!("non-numeric radius '{t}'"),
            })
        })
        .collect()
}

/// **AddMCNPPointTally** (§4.12): synthesises `F5` point-detector cards
/// through every transform in a group's `trans` list. Detector positions
/// and radii are read as whitespace-separated float lists from the
/// `posgroup`/`radiusgroup` groups' free-text `comment` field.
#[allow(clippy::too_many_arguments)]
pub(crate) fn add_mcnp_point_tally(
    deck: &mut Deck,
    comment: Option<&str>,
    group: &str,
    part: &str,
    card: Option<&str>,
    posgroup: &str,
    radiusgroup: &str,
    ntal: i64,
) -> Result<()> {
    let group_rec = deck
        .groups
        .get(group)
        .cloned()
        .ok_or_else(|| missing(&format!("no group named '{group}'")))?;
    let trans_ids = group_rec
        .trans
        .ok_or_else(|| missing(&format!("group '{group}' has no trans list")))?;

    let pos_rec = deck
        .groups
        .get(posgroup)
        .cloned()
        .ok_or_else(|| missing(&format!("no group named '{posgroup}'")))?;
    let positions = parse_vec3_list(pos_rec.comment.as_deref().unwrap_or(""))?;

    let rad_rec = deck
        .groups
        .get(radiusgroup)
        .cloned()
        .ok_or_else(|| missing(&format!("no group named '{radiusgroup}'")))?;
    let raw_radii = parse_f64_list(rad_rec.comment.as_deref().unwrap_or(""))?;
    let radii: Vec<f64> = if raw_radii.len() == 1 {
        vec![raw_radii[0]; positions.len()]
    } else {
        raw_radii
    };
    if radii.len() != positions.len() {
        return Err(Error::MalformedInput {
            detail: format!(
                "radius list has {} entries but {} positions were given",
                radii.len(),
                positions.len()
            ),
        });
    }

    let mut used = scan_existing_tally_numbers(deck);
    if let Some(c) = comment {
        deck.free_metadata.push(format!("c {c}"));
    }
    for tid in trans_ids {
        let n = if ntal >= 0 {
            allocate_number(&mut used, 5, Some(ntal as u32))
        } else {
            allocate_number(&mut used, 5, None)
        };
        let rigid = deck
            .find_tr_card(tid as u32)
            .ok_or_else(|| missing(&format!("transform {tid}")))?;
        for (i, (pos, r)) in positions.iter().zip(radii.iter()).enumerate() {
            let mapped = rigid.rotation.transpose() * pos + rigid.translation;
            let line = if i == 0 {
                format!(
                    "F{n}:{part} {} {} {} {}",
                    format_tr(mapped.x),
                    format_tr(mapped.y),
                    format_tr(mapped.z),
                    format_tr(*r)
                )
            } else {
                format!(
                    "      {} {} {} {}",
                    format_tr(mapped.x),
                    format_tr(mapped.y),
                    format_tr(mapped.z),
                    format_tr(*r)
                )
            };
            deck.free_metadata.push(line);
        }
        if let Some(template) = card {
            deck.free_metadata.push(replace_leading_number(template, n));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Group;
    use crate::Deck;

    #[test]
    fn allocates_sequential_surface_tallies() {
        let text = "c h\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\n";
        let mut deck = Deck::from_text(text, None).unwrap();
        deck.groups.insert(
            "g".to_string(),
            Group {
                surf: Some(vec![1, 2, 3]),
                ..Default::default()
            },
        );
        add_mcnp_tally(&mut deck, "2", Some("surface flux"), "g", None).unwrap();
        let allocated: Vec<&str> = deck
            .free_metadata
            .iter()
            .filter(|l| l.starts_with('F'))
            .map(String::as_str)
            .collect();
        assert_eq!(allocated, vec!["F2 1", "F12 2", "F22 3"]);
    }

    #[test]
    fn rejects_f5_through_add_mcnp_tally() {
        let text = "c h\n1 0 -1 imp:n=0\n\n1 so 10.0\n\n";
        let mut deck = Deck::from_text(text, None).unwrap();
        deck.groups.insert("g".to_string(), Group::default());
        assert!(add_mcnp_tally(&mut deck, "5", None, "g", None).is_err());
    }
}
