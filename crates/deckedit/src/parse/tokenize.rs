//! Card Tokeniser and Deck Builder (§4.2)

use std::collections::BTreeMap;

use log::{debug, warn};
use nalgebra::{Matrix3, Vector3};

use super::geometry::{parse_cell_line, parse_surface_line};
use super::normalize::is_comment;
use super::number;
use crate::core::{Group, Material, MaterialKind, MxParticle, Transform};
use crate::deck::Deck;
use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Cells,
    Surfaces,
    Data,
    Groups,
    Done,
}

/// Whether a physical line continues the previous card: the first five
/// columns are blank (§2, §4.2).
fn is_continuation(line: &str) -> bool {
    line.len() > 5 && line[..5].chars().all(|c| c == ' ') && !line.trim().is_empty()
}

/// Groups normalised lines into logical cards within one section, skipping
/// (and returning separately) any comment lines found between cards.
fn collect_cards(lines: &[String]) -> Vec<Vec<String>> {
    let mut cards: Vec<Vec<String>> = Vec::new();
    for line in lines {
        if is_comment(line) {
            continue;
        }
        if is_continuation(line) && !cards.is_empty() {
            cards.last_mut().unwrap().push(line.trim().to_string());
        } else {
            cards.push(vec![line.trim().to_string()]);
        }
    }
    cards
}

fn join_card(card: &[String]) -> String {
    card.join(" ")
}

enum DataHeader {
    Transform { id: u32, degrees: bool },
    Material { id: u32, kind: MaterialKind },
}

fn classify_header(token: &str) -> Option<DataHeader> {
    let (degrees, rest) = match token.strip_prefix('*') {
        Some(r) => (true, r),
        None => (false, token),
    };
    let lower = rest.to_ascii_lowercase();

    if let Some(digits) = lower.strip_prefix("tr") {
        if let Some(id) = number::full_uint32(digits) {
            return Some(DataHeader::Transform { id, degrees });
        }
    }
    if degrees {
        return None;
    }
    if let Some(suffix) = lower.strip_prefix("mx") {
        if let Some(colon) = suffix.find(':') {
            let digits = &suffix[..colon];
            let part = &suffix[colon + 1..];
            if let Some(id) = number::full_uint32(digits) {
                if let Some(p) = MxParticle::from_tag(part) {
                    return Some(DataHeader::Material {
                        id,
                        kind: MaterialKind::Mx(p),
                    });
                }
            }
        }
        return None;
    }
    if let Some(digits) = lower.strip_prefix("mpn") {
        return number::full_uint32(digits).map(|id| DataHeader::Material {
            id,
            kind: MaterialKind::Mpn,
        });
    }
    if let Some(digits) = lower.strip_prefix("mt") {
        return number::full_uint32(digits).map(|id| DataHeader::Material {
            id,
            kind: MaterialKind::Mt,
        });
    }
    if let Some(digits) = lower.strip_prefix('m') {
        if let Some(id) = number::full_uint32(digits) {
            return Some(DataHeader::Material {
                id,
                kind: MaterialKind::M,
            });
        }
    }
    None
}

fn parse_transform_card(id: u32, degrees: bool, body: &str) -> Result<Transform> {
    let (remainder, values) = number::vector_of_f64(body).map_err(|_| Error::MalformedInput {
        detail: format!("transform card {id} has a non-numeric field"),
    })?;
    if !remainder.trim().is_empty() {
        return Err(Error::MalformedInput {
            detail: format!("transform card {id} has a non-numeric field '{}'", remainder.trim()),
        });
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(Error::MalformedInput {
            detail: format!("transform card {id} contains an unresolved jump placeholder"),
        });
    }
    let (translation, rotation, sense) = match values.len() {
        3 => (
            Vector3::new(values[0], values[1], values[2]),
            Matrix3::identity(),
            1i8,
        ),
        12 | 13 => {
            let t = Vector3::new(values[0], values[1], values[2]);
            let r = Matrix3::new(
                values[3], values[4], values[5],
                values[6], values[7], values[8],
                values[9], values[10], values[11],
            );
            let sense = if values.len() == 13 { values[12] as i8 } else { 1 };
            (t, r, sense)
        }
        n => {
            return Err(Error::MalformedInput {
                detail: format!("transform card {id} has {n} numeric fields, expected 3, 12, or 13"),
            })
        }
    };
    Ok(Transform {
        id,
        degrees,
        translation,
        rotation,
        sense,
    })
}

/// Builds a [`Deck`] from normalised physical lines (§4.2).
pub(crate) fn build_deck(lines: Vec<String>) -> Result<Deck> {
    let mut state = State::Cells;
    let mut section_lines: Vec<String> = Vec::new();
    let mut sections: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();

    for line in &lines {
        if line.trim().is_empty() {
            let key = match state {
                State::Cells => "cells",
                State::Surfaces => "surfaces",
                State::Data => "data",
                State::Groups => "groups",
                State::Done => "done",
            };
            sections.entry(key).or_default().append(&mut section_lines);
            state = match state {
                State::Cells => State::Surfaces,
                State::Surfaces => State::Data,
                State::Data => State::Groups,
                State::Groups => State::Done,
                State::Done => State::Done,
            };
            continue;
        }
        if state == State::Done {
            section_lines.push(line.clone());
            continue;
        }
        section_lines.push(line.clone());
    }
    let key = match state {
        State::Cells => "cells",
        State::Surfaces => "surfaces",
        State::Data => "data",
        State::Groups => "groups",
        State::Done => "done",
    };
    sections.entry(key).or_default().append(&mut section_lines);

    let empty = Vec::new();
    let cell_lines = sections.get("cells").unwrap_or(&empty);
    let surface_lines = sections.get("surfaces").unwrap_or(&empty);
    let data_lines = sections.get("data").unwrap_or(&empty);
    let groups_lines = sections.get("groups").unwrap_or(&empty);
    let trailing_lines = sections.get("done").unwrap_or(&empty);

    let mut cells = Vec::new();
    for card in collect_cards(cell_lines) {
        cells.push(parse_cell_line(&join_card(&card))?);
    }

    let mut surfaces = Vec::new();
    for card in collect_cards(surface_lines) {
        surfaces.push(parse_surface_line(&join_card(&card))?);
    }

    let mut transforms = Vec::new();
    let mut materials = Vec::new();
    let mut free_metadata = Vec::new();
    let mut pending_comment: Vec<String> = Vec::new();

    for card in collect_cards(data_lines) {
        let first = card[0].trim_start();
        if is_comment(first) {
            pending_comment.push(first.to_string());
            continue;
        }
        let token = first.split_whitespace().next().unwrap_or_default();
        match classify_header(token) {
            Some(DataHeader::Transform { id, degrees }) => {
                pending_comment.clear();
                let joined = join_card(&card);
                let body = joined.splitn(2, char::is_whitespace).nth(1).unwrap_or_default();
                transforms.push(parse_transform_card(id, degrees, body)?);
            }
            Some(DataHeader::Material { id, kind }) => {
                let joined = join_card(&card);
                let body = joined.splitn(2, char::is_whitespace).nth(1).unwrap_or_default();
                let leading_comment = if pending_comment.is_empty() {
                    None
                } else {
                    Some(pending_comment.join("\n"))
                };
                pending_comment.clear();
                materials.push(Material {
                    id,
                    kind,
                    body: body.to_string(),
                    leading_comment,
                });
            }
            None => {
                free_metadata.extend(std::mem::take(&mut pending_comment));
                free_metadata.extend(card);
            }
        }
    }
    free_metadata.extend(pending_comment);

    let mut groups = BTreeMap::new();
    let groups_text: String = groups_lines
        .iter()
        .filter(|l| !is_comment(l))
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if !groups_text.trim().is_empty() {
        let parsed: BTreeMap<String, Group> = serde_json::from_str(&groups_text)?;
        groups = parsed;
    }

    if !trailing_lines.is_empty() {
        debug!("{} trailing line(s) after the groups block ignored", trailing_lines.len());
    }

    let enclosing_surface = match cells.len() {
        0 => String::new(),
        1 => cell_geometry(&cells[0]),
        n => cell_geometry(&cells[n - 2]),
    };

    if cells.is_empty() {
        warn!("deck has no cell cards");
    }

    Ok(Deck {
        cells,
        surfaces,
        transforms,
        materials,
        groups,
        enclosing_surface,
        object_transform: crate::core::RigidTransform::identity(),
        transform_history: Vec::new(),
        inserted_files: Vec::new(),
        free_metadata,
        source_path: None,
    })
}

fn cell_geometry(cell: &crate::core::Cell) -> String {
    match &cell.body {
        crate::core::CellBody::Plain { geometry, .. } => geometry.clone(),
        crate::core::CellBody::Like { .. } => String::new(),
    }
}
