//! # clgamma-lut
//!
//! Precomputed 8-bit gamma lookup tables.
//!
//! A [`GammaLut`] maps every input intensity `i` in `0..=255` to
//! `round(255 * (i / 255) ^ gamma)`, so per-pixel work on the compute
//! device reduces to a single table read instead of a `pow` call.
//!
//! # Usage
//!
//! ```rust
//! use clgamma_lut::GammaLut;
//!
//! let lut = GammaLut::new(2.2).unwrap();
//! assert_eq!(lut.get(0), 0);
//! assert_eq!(lut.get(255), 255);
//! assert_eq!(lut.get(128), 56);
//! ```
//!
//! # Used By
//!
//! - `clgamma-compute` - uploads the table as a device buffer
//! - `clgamma-cli` - builds the table from the command line gamma

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod gamma;

pub use error::{LutError, LutResult};
pub use gamma::{GammaLut, LUT_SIZE, build_table};
