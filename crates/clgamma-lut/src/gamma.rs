//! 256-entry gamma curve table.
//!
//! The table is the 8-bit specialisation of a 1D LUT: one entry per
//! representable intensity, no interpolation, output rounded to the
//! nearest byte.

use crate::{LutError, LutResult};

/// Number of entries in a gamma table (one per 8-bit intensity).
pub const LUT_SIZE: usize = 256;

/// Builds the raw gamma table for `gamma`.
///
/// `T[i] = round(255 * (i / 255) ^ gamma)`, clamped to `[0, 255]`.
/// The caller is responsible for passing a finite, positive exponent;
/// [`GammaLut::new`] is the checked entry point.
pub fn build_table(gamma: f64) -> [u8; LUT_SIZE] {
    let mut table = [0u8; LUT_SIZE];
    for (i, entry) in table.iter_mut().enumerate() {
        let t = i as f64 / 255.0;
        *entry = (t.powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    table
}

/// Gamma lookup table for 8-bit intensities.
///
/// Index is the input intensity, value is the remapped intensity. The
/// table is computed once from a single exponent and is immutable
/// afterwards.
///
/// # Example
///
/// ```rust
/// use clgamma_lut::GammaLut;
///
/// let lut = GammaLut::new(1.0).unwrap();
/// assert!((0..=255u8).all(|i| lut.get(i) == i));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GammaLut {
    table: [u8; LUT_SIZE],
    gamma: f64,
}

impl GammaLut {
    /// Creates a table for `gamma`.
    ///
    /// # Errors
    ///
    /// Returns [`LutError::InvalidGamma`] if `gamma` is NaN, infinite,
    /// zero or negative.
    pub fn new(gamma: f64) -> LutResult<Self> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(LutError::InvalidGamma(gamma));
        }
        Ok(Self {
            table: build_table(gamma),
            gamma,
        })
    }

    /// Creates the pass-through table (`gamma = 1`).
    pub fn identity() -> Self {
        let mut table = [0u8; LUT_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = i as u8;
        }
        Self { table, gamma: 1.0 }
    }

    /// Exponent the table was built from.
    #[inline]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Remapped value for input intensity `i`.
    #[inline]
    pub fn get(&self, i: u8) -> u8 {
        self.table[i as usize]
    }

    /// Raw table, suitable for uploading as a 256-byte buffer.
    #[inline]
    pub fn as_table(&self) -> &[u8; LUT_SIZE] {
        &self.table
    }

    /// Applies the table to every byte of `pixels` on the host.
    ///
    /// This is the reference the device result is checked against.
    pub fn apply_in_place(&self, pixels: &mut [u8]) {
        for px in pixels.iter_mut() {
            *px = self.table[*px as usize];
        }
    }

    /// True if the table never decreases with increasing input.
    pub fn is_monotonic(&self) -> bool {
        self.table.windows(2).all(|w| w[0] <= w[1])
    }
}

impl AsRef<[u8]> for GammaLut {
    fn as_ref(&self) -> &[u8] {
        &self.table
    }
}
