//! Geometry-Line Parser (§4.3): splits a single cell or surface card's text
//! into its constituent fields.

use super::number;
use crate::core::{Cell, CellBody, Surface, CELL_KEYWORDS};
use crate::error::{Error, Result};

/// Splits off a trailing `$ comment`, returning `(body, comment)`.
fn split_comment(line: &str) -> (&str, Option<String>) {
    match line.find('$') {
        Some(pos) => (&line[..pos], Some(line[pos + 1..].trim().to_string())),
        None => (line, None),
    }
}

/// Finds the byte offset of the leftmost recognised trailing keyword in
/// `body`, scanning whitespace-delimited tokens for one that starts with a
/// known keyword followed by `=`, `:`, or end-of-token.
fn find_keyword_split(body: &str) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (start, _) in body.match_indices(|c: char| !c.is_whitespace()) {
        // only consider the start of a token
        if start > 0 && !body.as_bytes()[start - 1].is_ascii_whitespace() {
            continue;
        }
        let token_end = body[start..]
            .find(char::is_whitespace)
            .map(|p| start + p)
            .unwrap_or(body.len());
        let token = &body[start..token_end];
        for kw in CELL_KEYWORDS {
            if token.len() >= kw.len() && token[..kw.len()].eq_ignore_ascii_case(kw) {
                let next = token.as_bytes().get(kw.len());
                if next.is_none() || *next.unwrap() == b'=' || *next.unwrap() == b':' {
                    best = Some(match best {
                        Some(b) if b <= start => b,
                        _ => start,
                    });
                }
            }
        }
        if best.is_some() {
            break;
        }
    }
    best
}

/// Extracts cell-complement (`#N`) references and surface-number
/// references from a geometry token string, tolerating `#(...)`
/// complement-groups whose inner numbers remain surface references.
///
/// Digit runs are recognised with [`number`]'s nom combinators; the
/// surrounding walk just decides, at each position, whether a run starts
/// there.
pub(crate) fn scan_geometry_refs(geometry: &str) -> Result<(Vec<u32>, Vec<u32>)> {
    let mut cell_refs = Vec::new();
    let mut surface_refs = Vec::new();
    let mut rest = geometry;
    while !rest.is_empty() {
        if let Some(after_hash) = rest.strip_prefix('#') {
            let trimmed = after_hash.trim_start();
            if let Ok((tail, num)) = number::uint32(trimmed) {
                cell_refs.push(num);
                rest = tail;
                continue;
            } else if trimmed.starts_with('(') {
                // complement-group: leave the '(' for normal scanning
                rest = trimmed;
                continue;
            } else {
                return Err(Error::MalformedInput {
                    detail: format!("bare '#' with no following cell number in '{geometry}'"),
                });
            }
        }
        let first = rest.chars().next().unwrap();
        if first == '-' || first.is_ascii_digit() {
            let (sign, after_sign) = if first == '-' {
                ("-", &rest[1..])
            } else {
                ("", rest)
            };
            match number::digits_and_dots(after_sign) {
                Ok((tail, digits)) => {
                    let token = format!("{sign}{digits}");
                    if let Ok(v) = token.parse::<f64>() {
                        surface_refs.push(v.abs() as u32);
                    }
                    rest = tail;
                }
                Err(_) => rest = after_sign,
            }
            continue;
        }
        let mut chars = rest.chars();
        chars.next();
        rest = chars.as_str();
    }
    Ok((cell_refs, surface_refs))
}

/// Rewrites surface/cell-complement numbers inside a geometry token string
/// according to the given renumber maps, preserving sign and surrounding
/// syntax (§4.5: recognising a reference requires non-digit/non-`.`/non-`#`
/// neighbours, which this character-level walk does by construction since
/// it classifies every character instead of substring-matching).
pub(crate) fn rewrite_geometry(
    geometry: &str,
    cell_map: Option<&std::collections::HashMap<u32, u32>>,
    surface_map: Option<&std::collections::HashMap<u32, u32>>,
) -> String {
    let mut out = String::with_capacity(geometry.len());
    let mut rest = geometry;
    while !rest.is_empty() {
        if let Some(after_hash) = rest.strip_prefix('#') {
            out.push('#');
            let ws_len = after_hash.len() - after_hash.trim_start().len();
            out.push_str(&after_hash[..ws_len]);
            let trimmed = &after_hash[ws_len..];
            match number::uint32(trimmed) {
                Ok((tail, num)) => {
                    let mapped = cell_map.and_then(|m| m.get(&num)).copied().unwrap_or(num);
                    out.push_str(&mapped.to_string());
                    rest = tail;
                }
                Err(_) => rest = trimmed,
            }
            continue;
        }
        let first = rest.chars().next().unwrap();
        if first == '-' || first.is_ascii_digit() {
            let (sign, after_sign) = if first == '-' {
                ("-", &rest[1..])
            } else {
                ("", rest)
            };
            out.push_str(sign);
            match number::digits_and_dots(after_sign) {
                Ok((tail, digits)) => {
                    if let Ok(v) = digits.parse::<u32>() {
                        let mapped = surface_map.and_then(|m| m.get(&v)).copied().unwrap_or(v);
                        out.push_str(&mapped.to_string());
                    } else {
                        out.push_str(digits);
                    }
                    rest = tail;
                }
                Err(_) => rest = after_sign,
            }
            continue;
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Rewrites the bare-integer form of a `<keyword>=<n>` reference (leaves
/// parenthesised constant forms untouched), per the renumber map.
pub(crate) fn replace_numeric_keyword_value(
    trailing: &str,
    keyword: &str,
    mapping: &std::collections::HashMap<u32, u32>,
) -> String {
    let lower = trailing.to_ascii_lowercase();
    let key = format!("{}=", keyword.to_ascii_lowercase());
    let Some(pos) = lower.find(&key) else {
        return trailing.to_string();
    };
    let value_start = pos + key.len();
    let rest = &trailing[value_start..];
    if rest.trim_start().starts_with('(') {
        return trailing.to_string();
    }
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return trailing.to_string();
    }
    let Ok(old) = digits.parse::<u32>() else {
        return trailing.to_string();
    };
    let Some(new) = mapping.get(&old) else {
        return trailing.to_string();
    };
    format!(
        "{}{}{}",
        &trailing[..value_start],
        new,
        &trailing[value_start + digits.len()..]
    )
}

/// Reads the bare-integer form of a `<keyword>=<n>` reference from a
/// trailing keyword block, if present (used for `trcl=`/`fill=`, §4.6).
///
/// `fill=` additionally allows a lattice-index prefix before a constant
/// transform (`fill=3 (tx ty tz …)`, `fill=3:5 (…)`); a digit string
/// immediately followed by a parenthesised block, with or without
/// whitespace in between, is that prefix rather than a bare reference, so
/// it is rejected here too.
pub(crate) fn extract_numeric_keyword_value(trailing: &str, keyword: &str) -> Option<u32> {
    let lower = trailing.to_ascii_lowercase();
    let key = keyword.to_ascii_lowercase();
    let pos = lower.find(&format!("{key}="))?;
    let rest = &trailing[pos + key.len() + 1..];
    let rest = rest.trim_start();
    if rest.starts_with('(') {
        return None;
    }
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let after_digits = rest[digits.len()..].trim_start();
    if after_digits.starts_with('(') || after_digits.starts_with(':') {
        return None;
    }
    digits.parse().ok()
}

/// Parses a single cell card's already-joined text (continuation lines
/// concatenated with a single space) into a [`Cell`].
pub(crate) fn parse_cell_line(line: &str) -> Result<Cell> {
    let (body, comment) = split_comment(line);
    let body = body.trim_end();
    let trimmed = body.trim_start();

    let (rest, id) = number::uint32(trimmed).map_err(|_| Error::MalformedInput {
        detail: format!("cell card does not start with an integer id: '{line}'"),
    })?;
    let rest = rest.trim_start();

    if rest.to_ascii_lowercase().starts_with("like") {
        let after_like = rest[4..].trim_start();
        let (remainder, parent) = number::uint32(after_like).map_err(|_| Error::MalformedInput {
            detail: format!("'like' cell {id} missing a parent cell number"),
        })?;
        let remainder = remainder.trim_start();
        let but_pos = remainder.to_ascii_lowercase().find("but").ok_or_else(|| {
            Error::MalformedInput {
                detail: format!("'like {parent} but' cell {id} missing 'but' keyword"),
            }
        })?;
        let overrides = remainder[but_pos + 3..].trim().to_string();
        return Ok(Cell {
            id,
            body: CellBody::Like { parent, overrides },
            comment,
        });
    }

    let (after_mat, material) = number::int64(rest).map_err(|_| Error::MalformedInput {
        detail: format!("cell {id} has a non-integer material field"),
    })?;
    let after_mat = after_mat.trim_start();

    let (density, geom_start) = if material == 0 {
        (None, after_mat)
    } else {
        let (rest2, density) = number::float64(after_mat).map_err(|_| Error::MalformedInput {
            detail: format!("cell {id} has a non-numeric density field"),
        })?;
        (Some(density), rest2.trim_start())
    };

    let split_in_geom = find_keyword_split(geom_start);
    let (geometry, trailing) = match split_in_geom {
        Some(pos) => (geom_start[..pos].trim_end(), geom_start[pos..].trim().to_string()),
        None => (geom_start.trim_end(), String::new()),
    };

    let (cell_refs, surface_refs) = scan_geometry_refs(geometry)?;

    Ok(Cell {
        id,
        body: CellBody::Plain {
            material,
            density,
            geometry: geometry.to_string(),
            cell_refs,
            surface_refs,
            trailing,
        },
        comment,
    })
}

/// Parses a single surface card's already-joined text into a [`Surface`].
pub(crate) fn parse_surface_line(line: &str) -> Result<Surface> {
    let (body, comment) = split_comment(line);
    let mut trimmed = body.trim();

    let mut reflecting = false;
    let mut white_boundary = false;
    if let Some(stripped) = trimmed.strip_prefix('*') {
        reflecting = true;
        trimmed = stripped.trim_start();
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        white_boundary = true;
        trimmed = stripped.trim_start();
    }

    if trimmed.is_empty() {
        return Err(Error::MalformedInput {
            detail: format!("empty surface card: '{line}'"),
        });
    }
    let (after_id, id) = number::uint32(trimmed).map_err(|_| Error::MalformedInput {
        detail: format!("surface card does not start with an integer id: '{line}'"),
    })?;

    let rest: Vec<&str> = after_id.split_whitespace().collect();
    let (transform, type_idx) = match rest.first().and_then(|t| number::int64(t).ok()) {
        Some((remainder, n)) if remainder.is_empty() => (n, 1),
        _ => (0, 0),
    };
    let surf_type = rest
        .get(type_idx)
        .ok_or_else(|| Error::MalformedInput {
            detail: format!("surface {id} is missing a surface-type token"),
        })?
        .to_ascii_lowercase();
    let params = rest[type_idx + 1..].join(" ");

    Ok(Surface {
        id,
        reflecting,
        white_boundary,
        transform,
        surf_type,
        params,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_cell() {
        let cell = parse_cell_line("10 5 -2.7 -1 2 -3 imp:n=1 imp:p=1 $ outer shell").unwrap();
        assert_eq!(cell.id, 10);
        match &cell.body {
            CellBody::Plain { material, density, surface_refs, trailing, .. } => {
                assert_eq!(*material, 5);
                assert_eq!(*density, Some(-2.7));
                assert_eq!(surface_refs, &vec![1, 2, 3]);
                assert!(trailing.contains("imp:n=1"));
            }
            _ => panic!("expected plain cell"),
        }
        assert_eq!(cell.comment.as_deref(), Some("outer shell"));
    }

    #[test]
    fn parses_void_cell_with_complement() {
        let cell = parse_cell_line("20 0 #10 #11 -5 imp:n=0").unwrap();
        match &cell.body {
            CellBody::Plain { material, cell_refs, surface_refs, .. } => {
                assert_eq!(*material, 0);
                assert_eq!(cell_refs, &vec![10, 11]);
                assert_eq!(surface_refs, &vec![5]);
            }
            _ => panic!("expected plain cell"),
        }
    }

    #[test]
    fn parses_like_but_cell() {
        let cell = parse_cell_line("30 like 10 but mat=5 rho=-2.7").unwrap();
        match &cell.body {
            CellBody::Like { parent, overrides } => {
                assert_eq!(*parent, 10);
                assert!(overrides.contains("mat=5"));
            }
            _ => panic!("expected like cell"),
        }
    }

    #[test]
    fn parses_surface_with_transform() {
        let surf = parse_surface_line("12 5 px 10.0 $ boundary").unwrap();
        assert_eq!(surf.id, 12);
        assert_eq!(surf.transform, 5);
        assert_eq!(surf.surf_type, "px");
        assert_eq!(surf.params, "10.0");
    }

    #[test]
    fn parses_surface_without_transform() {
        let surf = parse_surface_line("1 so 100.0").unwrap();
        assert_eq!(surf.transform, 0);
        assert_eq!(surf.surf_type, "so");
    }
}
