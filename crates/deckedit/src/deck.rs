//! Deck Model (§3): the indexed in-memory representation of a loaded deck

use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use nalgebra::{Matrix3, Vector3};

use crate::core::{Cell, CellBody, Group, Material, Surface, Transform};
use crate::error::{Error, Result};
use crate::ops;
use crate::parse::{build_deck, normalize_lines};

/// An in-memory deck: cells, surfaces, transforms, materials, group
/// metadata, and the bookkeeping needed to reproduce a well-formed file.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    /// Cell cards, in card order
    pub cells: Vec<Cell>,
    /// Surface cards, in card order
    pub surfaces: Vec<Surface>,
    /// Coordinate-transform cards (`tr`/`*tr`)
    pub transforms: Vec<Transform>,
    /// Material-family cards (`m`, `mpn`, `mx:<part>`, `mt`)
    pub materials: Vec<Material>,
    /// Named groups of cells/surfaces/transforms, from the trailing JSON block
    pub groups: BTreeMap<String, Group>,
    /// Boolean geometry expression of the diesis cell, used by Insert's
    /// enclosing-surface splicing (§4.8 step 7)
    pub enclosing_surface: String,
    /// Accumulated rigid-body transform applied via Translat/TrRot*/Transform
    pub object_transform: crate::core::RigidTransform,
    /// Human-readable labels of every transform applied so far, newest last
    pub transform_history: Vec<String>,
    /// Provenance of every guest deck merged in via Insert/InsertCells
    pub inserted_files: Vec<String>,
    /// Opaque trailing simulation-card text not recognised as cell, surface,
    /// transform, or material (§1: "opaque token sequences")
    pub free_metadata: Vec<String>,
    /// Path the deck was loaded from, if any
    pub source_path: Option<String>,
}

impl Deck {
    /// Loads a deck from a file on disk (§6: `Load(path) -> Deck`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut deck = Self::from_text(&raw, Some(path.display().to_string()))?;
        deck.source_path = Some(path.display().to_string());
        info!("loaded deck from {}", path.display());
        Ok(deck)
    }

    /// Parses a deck from in-memory text, without touching the filesystem.
    pub fn from_text(raw: &str, source_path: Option<String>) -> Result<Self> {
        let lines = normalize_lines(raw)?;
        let mut deck = build_deck(lines)?;
        deck.source_path = source_path;
        Ok(deck)
    }

    /// Writes the deck back out as MCNP-style text (§4.11, §6:
    /// `WriteMCNPFile(path, imp)`).
    pub fn write_mcnp_file<P: AsRef<Path>>(&self, path: P, imp: ImpMode) -> Result<()> {
        let text = crate::emit::emit(self, imp)?;
        std::fs::write(path.as_ref(), text)?;
        info!("wrote deck to {}", path.as_ref().display());
        Ok(())
    }

    /// Renders the deck to a `String` without writing it (used by tests and
    /// by [`Self::write_mcnp_file`]).
    pub fn render(&self, imp: ImpMode) -> Result<String> {
        crate::emit::emit(self, imp)
    }

    /// The current accumulated [`crate::core::RigidTransform`] (§6: `GetTr`).
    pub fn get_tr(&self) -> crate::core::RigidTransform {
        self.object_transform
    }

    /// Looks up a transform card by number, normalised to scalar units and
    /// forward sense (§6: `FindTrCard`).
    pub fn find_tr_card(&self, id: u32) -> Option<crate::core::RigidTransform> {
        self.transforms
            .iter()
            .find(|t| t.id == id)
            .map(Transform::to_rigid)
    }

    /// Returns every group name currently defined (§6: `ShowGroups`).
    pub fn show_groups(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Looks up a group by name (§6: `GetGroup`).
    pub fn get_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Verifies that every id listed by a group actually exists in the deck,
    /// returning the dangling ids found, if any (§6: `CheckGroup`).
    pub fn check_group(&self, name: &str) -> Result<Vec<i64>> {
        let group = self
            .groups
            .get(name)
            .ok_or_else(|| Error::MissingReference {
                detail: format!("no group named '{name}'"),
            })?;
        let mut dangling = Vec::new();
        if let Some(list) = &group.cell {
            dangling.extend(
                list.iter()
                    .filter(|id| !self.cells.iter().any(|c| c.id as i64 == **id))
                    .copied(),
            );
        }
        if let Some(list) = &group.surf {
            dangling.extend(
                list.iter()
                    .filter(|id| !self.surfaces.iter().any(|s| s.id as i64 == **id))
                    .copied(),
            );
        }
        if let Some(list) = &group.trans {
            dangling.extend(
                list.iter()
                    .filter(|id| !self.transforms.iter().any(|t| t.id as i64 == **id))
                    .copied(),
            );
        }
        Ok(dangling)
    }

    /// Swaps the material (and optionally density) of one or more cells
    /// (§6: `SwapCellMat`). `like...but` cells are unsupported by the
    /// source tool and are skipped with a warning, matching §9 Open
    /// Question (ii).
    pub fn swap_cell_mat(&mut self, cell_ids: &[u32], material: i64, density: Option<f64>) {
        for cell in self.cells.iter_mut() {
            if !cell_ids.contains(&cell.id) {
                continue;
            }
            match &mut cell.body {
                CellBody::Plain {
                    material: m,
                    density: d,
                    ..
                } => {
                    *m = material;
                    *d = if material == 0 { None } else { density.or(*d) };
                }
                CellBody::Like { .. } => {
                    log::warn!(
                        "SwapCellMat on cell {} is a 'like...but' clone and is unsupported",
                        cell.id
                    );
                }
            }
        }
    }

    /// Appends raw card text verbatim to the free-metadata block (§4.12:
    /// `AddMCNPCard`).
    pub fn add_mcnp_card(&mut self, lines: &[&str]) {
        self.free_metadata
            .extend(lines.iter().map(|l| l.to_string()));
    }

    /// Appends a file's lines verbatim to the free-metadata block (§4.12:
    /// `AddMCNPCardFromFile`).
    pub fn add_mcnp_card_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.free_metadata.extend(text.lines().map(str::to_string));
        Ok(())
    }

    /// Appends a decorative, `c`-prefixed banner block (§4.12:
    /// `AddMCNPBanner`).
    pub fn add_mcnp_banner(&mut self, text: &str) {
        let rule = "=".repeat(78);
        self.free_metadata.push(format!("c {rule}"));
        self.free_metadata.push(format!("c {text}"));
        self.free_metadata.push(format!("c {rule}"));
    }

    /// Pure translation (§6: `Translat`).
    pub fn translat(&mut self, t: Vector3<f64>, comment: Option<&str>) -> Result<()> {
        let applied = crate::core::transform::translation(t);
        ops::trcl::apply_transfo(self, applied, None, comment)
    }

    /// Axis-cardinal rotation about X, composed with a translation offset
    /// (§6: `TrRotX`).
    pub fn tr_rot_x(
        &mut self,
        trans: Vector3<f64>,
        angle: f64,
        unit: AngleUnit,
        comment: Option<&str>,
    ) -> Result<()> {
        let rotation = crate::core::transform::rotation_x(angle, unit.is_degrees());
        let applied = crate::core::RigidTransform {
            translation: trans,
            rotation,
        };
        ops::trcl::apply_transfo(self, applied, None, comment)
    }

    /// Axis-cardinal rotation about Y (§6: `TrRotY`).
    pub fn tr_rot_y(
        &mut self,
        trans: Vector3<f64>,
        angle: f64,
        unit: AngleUnit,
        comment: Option<&str>,
    ) -> Result<()> {
        let rotation = crate::core::transform::rotation_y(angle, unit.is_degrees());
        let applied = crate::core::RigidTransform {
            translation: trans,
            rotation,
        };
        ops::trcl::apply_transfo(self, applied, None, comment)
    }

    /// Axis-cardinal rotation about Z (§6: `TrRotZ`).
    pub fn tr_rot_z(
        &mut self,
        trans: Vector3<f64>,
        angle: f64,
        unit: AngleUnit,
        comment: Option<&str>,
    ) -> Result<()> {
        let rotation = crate::core::transform::rotation_z(angle, unit.is_degrees());
        let applied = crate::core::RigidTransform {
            translation: trans,
            rotation,
        };
        ops::trcl::apply_transfo(self, applied, None, comment)
    }

    /// Euler ZXZ composition (§6: `TrEuler`).
    pub fn tr_euler(
        &mut self,
        trans: Vector3<f64>,
        alpha: f64,
        beta: f64,
        gamma: f64,
        unit: AngleUnit,
        comment: Option<&str>,
    ) -> Result<()> {
        let rotation = crate::core::transform::euler_zxz(alpha, beta, gamma, unit.is_degrees());
        let applied = crate::core::RigidTransform {
            translation: trans,
            rotation,
        };
        ops::trcl::apply_transfo(self, applied, None, comment)
    }

    /// Rodrigues axis-angle composition (§6: `TrRotU`).
    pub fn tr_rot_u(
        &mut self,
        u: Vector3<f64>,
        trans: Vector3<f64>,
        angle: f64,
        unit: AngleUnit,
        comment: Option<&str>,
    ) -> Result<()> {
        let rotation = crate::core::transform::rotation_axis_angle(u, angle, unit.is_degrees());
        let applied = crate::core::RigidTransform {
            translation: trans,
            rotation,
        };
        ops::trcl::apply_transfo(self, applied, None, comment)
    }

    /// Applies an arbitrary caller-supplied transform, given as 3, 12, 13 or
    /// 14 numeric tokens (the 14th being a sense flag), per §6: `Transform`.
    pub fn transform(&mut self, tokens: &[f64], comment: Option<&str>) -> Result<()> {
        let (translation, rotation, sense) = match tokens.len() {
            3 => (
                Vector3::new(tokens[0], tokens[1], tokens[2]),
                Matrix3::identity(),
                None,
            ),
            12 | 13 | 14 => {
                let t = Vector3::new(tokens[0], tokens[1], tokens[2]);
                let r = Matrix3::new(
                    tokens[3], tokens[4], tokens[5], tokens[6], tokens[7], tokens[8], tokens[9],
                    tokens[10], tokens[11],
                );
                let sense = if tokens.len() >= 13 {
                    Some(tokens[12] as i8)
                } else {
                    None
                };
                (t, r, sense)
            }
            n => {
                return Err(Error::MalformedInput {
                    detail: format!("Transform expects 3, 12, 13, or 14 tokens, got {n}"),
                })
            }
        };
        let applied = if sense == Some(-1) {
            crate::core::RigidTransform {
                translation: -rotation.transpose() * translation,
                rotation,
            }
        } else {
            crate::core::RigidTransform {
                translation,
                rotation,
            }
        };
        let sense_suffix = tokens.len() == 14;
        ops::trcl::apply_transfo(self, applied, Some(sense_suffix), comment)
    }

    /// Renumbers cells, surfaces, and transforms (§4.5, §6: `Renum`).
    pub fn renum(
        &mut self,
        cells: ops::renumber::Filter,
        cell_start: u32,
        surfaces: ops::renumber::Filter,
        surf_start: u32,
        trans_start: u32,
    ) -> Result<()> {
        ops::renumber::renumber(self, cells, cell_start, surfaces, surf_start, Some(trans_start))
    }

    /// Resolves `trcl`-derived surface-number collisions (§4.7, §6:
    /// `ResolveTRCL`).
    pub fn resolve_trcl(&mut self) -> Result<()> {
        ops::resolve_trcl::resolve_trcl(self)
    }

    /// Merges a guest deck into this one (§4.8, §6: `Insert`).
    pub fn insert(
        &mut self,
        guest: Deck,
        location: ops::insert::Location,
        renum: bool,
    ) -> Result<()> {
        ops::insert::insert(self, guest, location, renum, false)
    }

    /// Merges a guest deck, subtracting its cells from the host's diesis
    /// cell instead of its bounding surface (§4.8, §6: `InsertCells`).
    pub fn insert_cells(&mut self, guest: Deck) -> Result<()> {
        ops::insert::insert(self, guest, ops::insert::Location::Unknown, true, true)
    }

    /// Extracts a standalone deck closed over `cells` (§4.9, §6: `Extract`).
    pub fn extract(
        &self,
        cells: &[u32],
        mode: ops::extract::ExtractMode,
        radius: f64,
    ) -> Result<Deck> {
        ops::extract::extract(self, cells, mode, radius)
    }

    /// Synthesises `F<n>`/companion tally cards over a group's ids (§4.12:
    /// `AddMCNPTally`).
    pub fn add_mcnp_tally(
        &mut self,
        tally: &str,
        comment: Option<&str>,
        group: &str,
        card: Option<&str>,
    ) -> Result<()> {
        crate::ops::tally::add_mcnp_tally(self, tally, comment, group, card)
    }

    /// Synthesises `F5` point-detector tally cards through a group's
    /// associated transforms (§4.12: `AddMCNPPointTally`).
    #[allow(clippy::too_many_arguments)]
    pub fn add_mcnp_point_tally(
        &mut self,
        comment: Option<&str>,
        group: &str,
        part: &str,
        card: Option<&str>,
        posgroup: &str,
        radiusgroup: &str,
        ntal: i64,
    ) -> Result<()> {
        crate::ops::tally::add_mcnp_point_tally(
            self, comment, group, part, card, posgroup, radiusgroup, ntal,
        )
    }
}

/// Angle unit for the `TrRot*`/`TrEuler`/`TrRotU` family (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    /// Degrees
    Deg,
    /// Radians
    Rad,
}

impl AngleUnit {
    fn is_degrees(self) -> bool {
        matches!(self, AngleUnit::Deg)
    }
}

/// Emit-time `imp:` handling mode (§4.11, §6: `WriteMCNPFile`'s `imp`
/// argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpMode {
    /// Leave `imp:<part>=` keywords on each cell card
    In,
    /// Move them to a single block `IMP:<part>` data card per particle
    Out,
}
