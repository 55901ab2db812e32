//! Host pixel raster.

use crate::{ComputeError, ComputeResult};

/// 8-bit image plane held in host memory.
///
/// Pixels are stored row-major and interleaved, `channels` bytes per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Bytes per pixel.
    pub channels: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing pixel bytes.
    ///
    /// Fails if any extent is zero, if `rows * cols * channels` overflows,
    /// or if `data` is not exactly that many bytes long.
    pub fn new(rows: usize, cols: usize, channels: usize, data: Vec<u8>) -> ComputeResult<Self> {
        let expected = checked_len(rows, cols, channels)?;
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, channels, data })
    }

    /// Zero-filled raster.
    pub fn zeroed(rows: usize, cols: usize, channels: usize) -> ComputeResult<Self> {
        let len = checked_len(rows, cols, channels)?;
        Self::new(rows, cols, channels, vec![0; len])
    }

    /// Zero-filled raster with the same shape as `self`.
    pub fn zeroed_like(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            channels: self.channels,
            data: vec![0; self.data.len()],
        }
    }

    /// Single-channel raster filled with `value`.
    pub fn filled(rows: usize, cols: usize, value: u8) -> ComputeResult<Self> {
        let len = checked_len(rows, cols, 1)?;
        Self::new(rows, cols, 1, vec![value; len])
    }

    /// Size in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Elements per row (`cols * channels`).
    #[inline]
    pub fn row_elements(&self) -> usize {
        self.cols * self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

}

/// Byte length of a `rows x cols x channels` raster.
fn checked_len(rows: usize, cols: usize, channels: usize) -> ComputeResult<usize> {
    if rows == 0 || cols == 0 || channels == 0 {
        return Err(ComputeError::InvalidDimensions(rows, cols));
    }
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(ComputeError::InvalidDimensions(rows, cols))
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("channels", &self.channels)
            .field("byte_size", &self.byte_size())
            .finish()
    }
}
