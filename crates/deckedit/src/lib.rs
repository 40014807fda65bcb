//! Structural editor for MCNP-style geometry decks
//!
#![doc = include_str!("../readme.md")]

mod core;
mod deck;
mod emit;
mod error;
mod ops;
mod parse;

#[doc(inline)]
pub use crate::deck::{AngleUnit, Deck, ImpMode};

#[doc(inline)]
pub use crate::error::{Error, Result};

#[doc(inline)]
pub use crate::ops::extract::ExtractMode;

#[doc(inline)]
pub use crate::ops::insert::Location;

#[doc(inline)]
pub use crate::ops::renumber::Filter;

#[doc(inline)]
pub use crate::core::{
    Cell, CellBody, Group, Material, MaterialKind, MxParticle, RigidTransform, Surface, Transform,
};
