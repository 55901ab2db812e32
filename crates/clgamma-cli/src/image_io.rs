//! Image decode, encode and acknowledgment.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clgamma_compute::PixelBuffer;
use image::GrayImage;

/// Decode `path` and convert it to 8-bit single-channel luma.
pub fn load_gray(path: &Path) -> Result<PixelBuffer> {
    let decoded = image::open(path).with_context(|| format!("Failed to load: {}", path.display()))?;
    let gray = decoded.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        bail!("Failed to load: {}: image is empty", path.display());
    }
    PixelBuffer::new(height as usize, width as usize, 1, gray.into_raw())
        .with_context(|| format!("Failed to load: {}", path.display()))
}

/// Encode a single-channel raster to `path`, format chosen by extension.
pub fn save_gray(path: &Path, pixels: &PixelBuffer) -> Result<()> {
    if pixels.channels != 1 {
        bail!(
            "Failed to save: {}: expected 1 channel, got {}",
            path.display(),
            pixels.channels
        );
    }
    let gray = GrayImage::from_raw(pixels.cols as u32, pixels.rows as u32, pixels.data().to_vec())
        .with_context(|| format!("Failed to save: {}: raster size mismatch", path.display()))?;
    gray.save(path)
        .with_context(|| format!("Failed to save: {}", path.display()))
}

/// Print `prompt` and block until a line (or EOF) arrives on stdin.
pub fn await_acknowledgment(prompt: &str) -> Result<()> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read acknowledgment")?;
    Ok(())
}
