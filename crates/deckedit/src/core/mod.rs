//! Core data types making up the in-memory [`Deck`](crate::Deck) model
//!
//! These mirror the card kinds of a deck: [`Cell`], [`Surface`], [`Transform`]
//! and [`Material`], plus [`Group`] for the trailing JSON metadata block.

mod cell;
mod group;
mod material;
mod surface;
pub(crate) mod transform;

pub use cell::{Cell, CellBody};
pub use group::Group;
pub use material::{Material, MaterialKind, MxParticle};
pub use surface::Surface;
pub use transform::{RigidTransform, Transform};

/// Decimal places floats are rounded to before being formatted for output
///
/// Matches the source tool's `ROUND_TR` constant.
pub const ROUND_TR: i32 = 14;

/// Fixed-width scientific notation used for every emitted float
///
/// Matches the source tool's `FORMAT_TR` constant (`".15e"`): 15 significant
/// digits in scientific notation.
pub const FORMAT_TR_PRECISION: usize = 15;

/// Particle tags recognised for `mx:<part>` material cards and `imp:<part>`
/// cell keywords, in the source tool's fixed order.
pub const PARTICLE_TAGS: [&str; 7] = ["n", "h", "p", "t", "s", "a", "d"];

/// Cell trailing-keyword table used to split a cell card's geometry tokens
/// from its keyword block (§4.3).
pub const CELL_KEYWORDS: &[&str] = &[
    "imp:n,p,e",
    "*trcl",
    "*fill",
    "trcl",
    "fill",
    "imp:n",
    "imp:p",
    "imp:e",
    "imp",
    "u",
    "vol",
    "lat",
    "nonu",
    "tmp",
    "cosy",
    "pd",
    "dxc",
    "pwt",
    "ext",
    "fcl",
    "wwn",
    "elpt",
    "bflcl",
    "unc",
];

/// Round a float to [`ROUND_TR`] decimal places.
pub fn round_tr(value: f64) -> f64 {
    let factor = 10f64.powi(ROUND_TR);
    (value * factor).round() / factor
}

/// Format a float using the fixed-width scientific notation (`".15e"`).
pub fn format_tr(value: f64) -> String {
    format!("{:.*e}", FORMAT_TR_PRECISION - 1, round_tr(value))
}
