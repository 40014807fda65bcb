//! Emitter (§4.11): renders a [`Deck`] back to MCNP-style text

use crate::core::{format_tr, CellBody, MaterialKind, PARTICLE_TAGS};
use crate::deck::{Deck, ImpMode};
use crate::error::Result;

const COLUMN_BUDGET: usize = 80;
const WRAP_COLUMN: usize = 75;

fn paren_depth(s: &str) -> i32 {
    s.chars().fold(0, |d, c| match c {
        '(' => d + 1,
        ')' => d - 1,
        _ => d,
    })
}

/// Wraps a single logical line at the last space before [`WRAP_COLUMN`],
/// using `&` continuation inside balanced parentheses and a six-space
/// indent (or `indent`, for the groups-JSON line) elsewhere (§4.11).
fn wrap_line(line: &str, indent: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = line.to_string();
    loop {
        if current.len() < COLUMN_BUDGET {
            out.push(current);
            break;
        }
        let limit = WRAP_COLUMN.min(current.len());
        let Some(idx) = current[..limit].rfind(' ') else {
            out.push(current);
            break;
        };
        let depth = paren_depth(&current[..idx]);
        let (head, tail) = current.split_at(idx);
        let tail = tail.trim_start();
        if depth > 0 {
            out.push(format!("{head} &"));
            current = tail.to_string();
        } else {
            out.push(head.to_string());
            current = format!("{indent}{tail}");
        }
    }
    out
}

fn right_align_comment(base: &str, comment: &str) -> String {
    let tail = format!("$ {comment}");
    if base.len() + 1 + tail.len() <= COLUMN_BUDGET {
        let pad = COLUMN_BUDGET - base.len() - tail.len();
        format!("{base}{}{tail}", " ".repeat(pad.max(1)))
    } else {
        format!("{base} {tail}")
    }
}

fn strip_keyword(trailing: &str, keyword: &str) -> (String, Option<String>) {
    let lower = trailing.to_ascii_lowercase();
    let key = format!("{}=", keyword.to_ascii_lowercase());
    let Some(pos) = lower.find(&key) else {
        return (trailing.to_string(), None);
    };
    let value_start = pos + key.len();
    let value_end = trailing[value_start..]
        .find(char::is_whitespace)
        .map(|i| value_start + i)
        .unwrap_or(trailing.len());
    let value = trailing[value_start..value_end].to_string();
    let mut rebuilt = String::new();
    rebuilt.push_str(trailing[..pos].trim_end());
    rebuilt.push(' ');
    rebuilt.push_str(trailing[value_end..].trim_start());
    (rebuilt.trim().to_string(), Some(value))
}

/// Run-length-encodes a per-cell value list as MCNP `v1 k r` repeat shorthand.
fn rle(values: &[String]) -> String {
    let mut out = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let v = &values[i];
        let mut run = 1;
        while i + run < values.len() && &values[i + run] == v {
            run += 1;
        }
        out.push(v.clone());
        if run > 1 {
            out.push((run - 1).to_string());
            out.push('r'.to_string());
        }
        i += run;
    }
    out.join(" ")
}

/// Extracts per-cell `imp:<part>=` keywords (§4.11 `imp = out`), stripping
/// them from each cell's trailing text and returning one `IMP:<part>` block
/// card per particle tag that was seen (or the default assumption if none
/// was seen on any cell).
fn extract_imp_cards(cells: &mut [CellBody]) -> Vec<String> {
    let n = cells.len();
    let mut seen_any = false;
    let mut per_tag: Vec<Option<Vec<Option<String>>>> = vec![None; PARTICLE_TAGS.len()];

    for (tag_idx, tag) in PARTICLE_TAGS.iter().enumerate() {
        let keyword = format!("imp:{tag}");
        let mut values: Vec<Option<String>> = Vec::with_capacity(n);
        let mut any = false;
        for body in cells.iter_mut() {
            if let CellBody::Plain { trailing, .. } = body {
                let (rest, value) = strip_keyword(trailing, &keyword);
                *trailing = rest;
                if value.is_some() {
                    any = true;
                    seen_any = true;
                }
                values.push(value);
            } else {
                values.push(None);
            }
        }
        if any {
            per_tag[tag_idx] = Some(values);
        }
    }

    let mut cards = Vec::new();
    if !seen_any {
        log::warn!("no per-cell imp: keyword found on any cell; assuming imp:n=imp:p=imp:e=1 defaults");
        for tag in ["n", "p", "e"] {
            let mut values = vec!["1".to_string(); n];
            if let Some(last) = values.last_mut() {
                *last = "0".to_string();
            }
            cards.push(format!("IMP:{} {}", tag.to_ascii_uppercase(), rle(&values)));
        }
        return cards;
    }

    for (tag_idx, tag) in PARTICLE_TAGS.iter().enumerate() {
        let Some(values) = &per_tag[tag_idx] else {
            continue;
        };
        if values.iter().any(Option::is_none) {
            log::warn!(
                "imp:{tag} does not cover every cell; skipping its IMP:{} block card",
                tag.to_ascii_uppercase()
            );
            continue;
        }
        let values: Vec<String> = values.iter().map(|v| v.clone().unwrap()).collect();
        cards.push(format!("IMP:{} {}", tag.to_ascii_uppercase(), rle(&values)));
    }
    cards
}

fn is_standalone_imp_card(line: &str) -> bool {
    let first = line.trim_start().split_whitespace().next().unwrap_or("");
    let lower = first.to_ascii_lowercase();
    lower.starts_with("imp:")
}

fn material_head(kind: MaterialKind, id: u32) -> String {
    match kind {
        MaterialKind::M => format!("m{id}"),
        MaterialKind::Mpn => format!("mpn{id}"),
        MaterialKind::Mx(p) => format!("mx{id}:{}", p.tag()),
        MaterialKind::Mt => format!("mt{id}"),
    }
}

/// Renders `deck` back to MCNP-style text (§4.11, §6: `WriteMCNPFile`/`Render`).
pub fn emit(deck: &Deck, imp: ImpMode) -> Result<String> {
    let mut out: Vec<String> = Vec::new();

    if !deck.transform_history.is_empty() || !deck.inserted_files.is_empty() {
        let rule = format!("c {}", "=".repeat(78));
        out.push(rule.clone());
        out.push("c Applied transforms:".to_string());
        for entry in &deck.transform_history {
            out.push(format!("c   {entry}"));
        }
        out.push("c Inserted files:".to_string());
        for entry in &deck.inserted_files {
            out.push(format!("c   {entry}"));
        }
        out.push(rule);
    }

    let mut cells = deck.cells.clone();
    let imp_cards = if imp == ImpMode::Out {
        let mut bodies: Vec<CellBody> = cells.iter().map(|c| c.body.clone()).collect();
        let cards = extract_imp_cards(&mut bodies);
        for (cell, body) in cells.iter_mut().zip(bodies.into_iter()) {
            cell.body = body;
        }
        cards
    } else {
        Vec::new()
    };

    for cell in &cells {
        let head = match &cell.body {
            CellBody::Plain {
                material,
                density,
                geometry,
                trailing,
                ..
            } => {
                let density_str = match density {
                    Some(d) => format!(" {}", format_tr(*d)),
                    None => String::new(),
                };
                let trailing_str = if trailing.trim().is_empty() {
                    String::new()
                } else {
                    format!(" {}", trailing.trim())
                };
                format!("{} {material}{density_str} {geometry}{trailing_str}", cell.id)
            }
            CellBody::Like { parent, overrides } => {
                format!("{} like {parent} but {overrides}", cell.id)
            }
        };
        let line = match &cell.comment {
            Some(c) => right_align_comment(&head, c),
            None => head,
        };
        out.extend(wrap_line(&line, "      "));
    }
    out.push(String::new());

    for surf in &deck.surfaces {
        let mut prefix = String::new();
        if surf.reflecting {
            prefix.push('*');
        } else if surf.white_boundary {
            prefix.push('+');
        }
        let head = if surf.transform != 0 {
            format!(
                "{prefix}{} {} {} {}",
                surf.id, surf.transform, surf.surf_type, surf.params
            )
        } else {
            format!("{prefix}{} {} {}", surf.id, surf.surf_type, surf.params)
        };
        let line = match &surf.comment {
            Some(c) => right_align_comment(&head, c),
            None => head,
        };
        out.extend(wrap_line(&line, "      "));
    }
    out.push(String::new());

    for t in &deck.transforms {
        let star = if t.degrees { "*" } else { "" };
        let tr = t.translation;
        let r = t.rotation;
        let mut nums = vec![
            format_tr(tr.x),
            format_tr(tr.y),
            format_tr(tr.z),
            format_tr(r[(0, 0)]),
            format_tr(r[(0, 1)]),
            format_tr(r[(0, 2)]),
            format_tr(r[(1, 0)]),
            format_tr(r[(1, 1)]),
            format_tr(r[(1, 2)]),
            format_tr(r[(2, 0)]),
            format_tr(r[(2, 1)]),
            format_tr(r[(2, 2)]),
        ];
        if t.sense == -1 {
            nums.push("-1".to_string());
        }
        let head = format!("{star}tr{} {}", t.id, nums.join(" "));
        out.extend(wrap_line(&head, "      "));
    }

    for m in &deck.materials {
        if let Some(c) = &m.leading_comment {
            out.push(format!("c {c}"));
        }
        let head = format!("{} {}", material_head(m.kind, m.id), m.body.trim());
        out.extend(wrap_line(&head, "      "));
    }

    for card in &imp_cards {
        out.extend(wrap_line(card, "      "));
    }

    for line in &deck.free_metadata {
        if imp == ImpMode::Out && is_standalone_imp_card(line) {
            continue;
        }
        out.extend(wrap_line(line, "      "));
    }
    out.push(String::new());

    if !deck.groups.is_empty() {
        let json = serde_json::to_string(&deck.groups)?;
        out.extend(wrap_line(&json, ""));
    }

    Ok(out.join("\n") + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Deck;

    #[test]
    fn round_trips_a_minimal_deck() {
        let text = "c header\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\n";
        let deck = Deck::from_text(text, None).unwrap();
        let rendered = emit(&deck, ImpMode::In).unwrap();
        assert!(rendered.contains("1 1"));
        assert!(rendered.contains("1 so"));
    }

    #[test]
    fn imp_out_synthesises_block_cards() {
        let text = "c header\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\n";
        let deck = Deck::from_text(text, None).unwrap();
        let rendered = emit(&deck, ImpMode::Out).unwrap();
        assert!(rendered.contains("IMP:N 1 0"));
        assert!(!rendered.contains("imp:n="));
    }

    #[test]
    fn rle_collapses_repeated_values() {
        let values = vec!["1".to_string(), "1".to_string(), "1".to_string(), "0".to_string()];
        assert_eq!(rle(&values), "1 2 r 0");
    }
}
