//! OpenCL offload pipeline for 8-bit gamma correction.
//!
//! Moves a per-pixel lookup-table remap from the host to a compute device
//! through a kernel compiled at runtime.
//!
//! # Architecture
//!
//! ```text
//! GammaPipeline (state machine, owns every resource)
//!     ├── device     resolve one platform + one device, report limits
//!     ├── context    context + in-order queue
//!     ├── buffers    src / dst / lut device regions, blocking upload
//!     ├── program    kernel source -> built program -> entry point
//!     └── dispatch   bind args, enqueue 2-D range, blocking readback
//!             │
//!             └── ComputeApi trait
//!                     └── OpenClApi (opencl3, `opencl` feature)
//! ```
//!
//! Every handle returned by a [`ComputeApi`] releases its resource when
//! dropped, so teardown order is the reverse of creation order on every
//! exit path.
//!
//! # Example
//!
//! ```ignore
//! use clgamma_compute::{GammaPipeline, KernelSource, OpenClApi, PipelineConfig, PixelBuffer};
//! use clgamma_lut::GammaLut;
//!
//! let api = OpenClApi::new();
//! let source = PixelBuffer::new(rows, cols, 1, pixels)?;
//! let kernel = KernelSource::from_path("custom_opencl_kernels.cl")?;
//! let lut = GammaLut::new(2.2)?;
//!
//! let out = GammaPipeline::new(&api, PipelineConfig::default()).run(&source, &lut, &kernel)?;
//! ```

pub mod backend;
pub mod buffers;
pub mod config;
pub mod context;
pub mod device;
pub mod dispatch;
mod error;
pub mod image;
pub mod pipeline;
pub mod program;

pub use backend::{ApiError, ApiResult, ComputeApi, DeviceCaps, DeviceClass, KernelArg, MemAccess};
pub use buffers::DeviceBuffers;
pub use config::{DEFAULT_ENTRY_POINT, LocalSize, PipelineConfig};
pub use context::ExecutionContext;
pub use device::{ResolvedDevice, resolve_device};
pub use dispatch::DispatchDescriptor;
pub use error::{ComputeError, ComputeResult, DispatchPhase};
pub use image::PixelBuffer;
pub use pipeline::{GammaPipeline, PipelineOutput, Stage, run_gamma};
pub use program::{CompiledProgram, KernelSource, MAX_SOURCE_SIZE};

#[cfg(feature = "opencl")]
pub use backend::OpenClApi;
