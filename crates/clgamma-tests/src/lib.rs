//! Integration tests for clgamma crates.
//!
//! [`FakeApi`] stands in for the OpenCL runtime so the whole pipeline,
//! including its failure paths, runs without a device.

pub mod fake;

pub use fake::{Call, Dispatch, Event, FakeApi, FakeDevice, RecordedArg, Resource};

use std::path::PathBuf;

use clgamma_compute::{KernelSource, PixelBuffer};

/// The kernel source shipped at the workspace root.
pub const SHIPPED_KERNEL: &str = include_str!("../../../custom_opencl_kernels.cl");

/// Path of the shipped kernel source.
pub fn shipped_kernel_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../custom_opencl_kernels.cl")
}

/// The shipped kernel as a loaded source.
pub fn shipped_kernel() -> KernelSource {
    match KernelSource::from_bytes("custom_opencl_kernels.cl", SHIPPED_KERNEL.as_bytes().to_vec()) {
        Ok(src) => src,
        Err(e) => panic!("shipped kernel rejected: {e}"),
    }
}

/// Single-channel raster filled with `value`.
pub fn uniform(rows: usize, cols: usize, value: u8) -> PixelBuffer {
    match PixelBuffer::filled(rows, cols, value) {
        Ok(px) => px,
        Err(e) => panic!("bad fixture {rows}x{cols}: {e}"),
    }
}

#[cfg(test)]
mod cli_tests;
#[cfg(test)]
mod pipeline_tests;
