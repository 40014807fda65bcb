//! A semi-modular toolkit of fast and reliable libraries for neutronics
//! analysis
//!
#![doc = include_str!("../readme.md")]
#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

// Re-exports of crates that are behind feature flags
#[cfg(feature = "deckedit")]
#[cfg_attr(docsrs, doc(cfg(feature = "deckedit")))]
#[doc(inline)]
pub use ntools_deckedit as deckedit;
