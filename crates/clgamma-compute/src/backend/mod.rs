//! Compute-API seam.
//!
//! [`ComputeApi`] exposes exactly the calls the pipeline makes against the
//! platform runtime. Each associated handle type owns its resource and
//! releases it on drop, the same way `opencl3` types do.
//!
//! ```text
//! ComputeApi
//!     +-- OpenClApi  (opencl3, `opencl` feature)
//!     +-- FakeApi    (clgamma-tests, scripted in-process device)
//! ```

#[cfg(feature = "opencl")]
mod opencl_backend;

#[cfg(feature = "opencl")]
pub use opencl_backend::OpenClApi;

use std::fmt;
use std::str::FromStr;

/// Platform status codes used when no API call produced one.
///
/// Values follow the OpenCL headers so exit codes stay comparable with
/// codes propagated from real calls.
pub mod status {
    /// `CL_SUCCESS`
    pub const SUCCESS: i32 = 0;
    /// `CL_DEVICE_NOT_FOUND`
    pub const DEVICE_NOT_FOUND: i32 = -1;
    /// `CL_MEM_OBJECT_ALLOCATION_FAILURE`
    pub const MEM_OBJECT_ALLOCATION_FAILURE: i32 = -4;
    /// `CL_OUT_OF_RESOURCES`
    pub const OUT_OF_RESOURCES: i32 = -5;
    /// `CL_OUT_OF_HOST_MEMORY`
    pub const OUT_OF_HOST_MEMORY: i32 = -6;
    /// `CL_BUILD_PROGRAM_FAILURE`
    pub const BUILD_PROGRAM_FAILURE: i32 = -11;
    /// `CL_INVALID_VALUE`
    pub const INVALID_VALUE: i32 = -30;
    /// `CL_INVALID_DEVICE`
    pub const INVALID_DEVICE: i32 = -33;
    /// `CL_INVALID_CONTEXT`
    pub const INVALID_CONTEXT: i32 = -34;
    /// `CL_INVALID_PROGRAM_EXECUTABLE`
    pub const INVALID_PROGRAM_EXECUTABLE: i32 = -45;
    /// `CL_INVALID_KERNEL_NAME`
    pub const INVALID_KERNEL_NAME: i32 = -46;
    /// `CL_INVALID_ARG_INDEX`
    pub const INVALID_ARG_INDEX: i32 = -49;
    /// `CL_INVALID_ARG_VALUE`
    pub const INVALID_ARG_VALUE: i32 = -50;
    /// `CL_INVALID_ARG_SIZE`
    pub const INVALID_ARG_SIZE: i32 = -51;
    /// `CL_INVALID_WORK_GROUP_SIZE`
    pub const INVALID_WORK_GROUP_SIZE: i32 = -54;
    /// `CL_INVALID_BUFFER_SIZE`
    pub const INVALID_BUFFER_SIZE: i32 = -61;
    /// `CL_PLATFORM_NOT_FOUND_KHR`
    pub const PLATFORM_NOT_FOUND_KHR: i32 = -1001;

    /// Symbolic name of a status code, if known.
    pub fn name(code: i32) -> Option<&'static str> {
        let name = match code {
            SUCCESS => "CL_SUCCESS",
            DEVICE_NOT_FOUND => "CL_DEVICE_NOT_FOUND",
            MEM_OBJECT_ALLOCATION_FAILURE => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
            OUT_OF_RESOURCES => "CL_OUT_OF_RESOURCES",
            OUT_OF_HOST_MEMORY => "CL_OUT_OF_HOST_MEMORY",
            BUILD_PROGRAM_FAILURE => "CL_BUILD_PROGRAM_FAILURE",
            INVALID_VALUE => "CL_INVALID_VALUE",
            INVALID_DEVICE => "CL_INVALID_DEVICE",
            INVALID_CONTEXT => "CL_INVALID_CONTEXT",
            INVALID_PROGRAM_EXECUTABLE => "CL_INVALID_PROGRAM_EXECUTABLE",
            INVALID_KERNEL_NAME => "CL_INVALID_KERNEL_NAME",
            INVALID_ARG_INDEX => "CL_INVALID_ARG_INDEX",
            INVALID_ARG_VALUE => "CL_INVALID_ARG_VALUE",
            INVALID_ARG_SIZE => "CL_INVALID_ARG_SIZE",
            INVALID_WORK_GROUP_SIZE => "CL_INVALID_WORK_GROUP_SIZE",
            INVALID_BUFFER_SIZE => "CL_INVALID_BUFFER_SIZE",
            PLATFORM_NOT_FOUND_KHR => "CL_PLATFORM_NOT_FOUND_KHR",
            _ => return None,
        };
        Some(name)
    }
}

/// Failure reported by a single compute-API call.
///
/// `code` is the platform's integer status, carried unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    /// Platform status code.
    pub code: i32,
}

impl ApiError {
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match status::name(self.code) {
            Some(name) => write!(f, "{} ({})", name, self.code),
            None => write!(f, "status {}", self.code),
        }
    }
}

impl std::error::Error for ApiError {}

/// Result of a single compute-API call.
pub type ApiResult<T> = Result<T, ApiError>;

/// Class of device to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    /// CPU-class device.
    #[default]
    Cpu,
    /// GPU-class device.
    Gpu,
    /// Dedicated accelerator.
    Accelerator,
    /// Any device the platform reports.
    All,
}

impl DeviceClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Accelerator => "accelerator",
            Self::All => "all",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "accelerator" | "acc" => Ok(Self::Accelerator),
            "all" | "any" => Ok(Self::All),
            other => Err(format!(
                "unknown device class '{other}' (expected cpu, gpu, accelerator or all)"
            )),
        }
    }
}

/// Access-mode hint for a device buffer.
///
/// Advisory only; nothing in the pipeline relies on the device enforcing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Capability values reported for the resolved device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceCaps {
    /// Device name as reported by the runtime.
    pub name: String,
    /// Vendor string.
    pub vendor: String,
    /// Maximum size of a single buffer allocation in bytes.
    pub max_alloc_bytes: u64,
    /// Minimum base-address alignment of a buffer in bytes.
    pub base_align_bytes: u64,
}

/// A kernel argument value.
pub enum KernelArg<'a, M> {
    /// Device buffer.
    Mem(&'a M),
    /// 32-bit signed scalar.
    Int(i32),
}

/// Calls the pipeline makes against a compute runtime.
///
/// Handles own their resources: dropping one releases it. Callers keep
/// handles alive for as long as anything created from them is alive.
pub trait ComputeApi {
    type Platform;
    type Device;
    type Context;
    type Queue;
    type Mem;
    type Program;
    type Kernel;

    /// Backend name.
    fn name(&self) -> &'static str;

    /// Enumerate compute platforms.
    fn platforms(&self) -> ApiResult<Vec<Self::Platform>>;

    /// Enumerate devices of `class` on `platform`.
    fn devices(
        &self,
        platform: &Self::Platform,
        class: DeviceClass,
    ) -> ApiResult<Vec<Self::Device>>;

    /// Query capability values of `device`.
    fn device_caps(&self, device: &Self::Device) -> ApiResult<DeviceCaps>;

    /// Create a context holding `device` only.
    fn create_context(&self, device: &Self::Device) -> ApiResult<Self::Context>;

    /// Create an in-order, non-profiling queue on `device`.
    fn create_queue(
        &self,
        context: &Self::Context,
        device: &Self::Device,
    ) -> ApiResult<Self::Queue>;

    /// Allocate `size` bytes of device memory.
    fn create_buffer(
        &self,
        context: &Self::Context,
        access: MemAccess,
        size: usize,
    ) -> ApiResult<Self::Mem>;

    /// Copy `data` into `mem`, returning once the transfer is complete.
    fn write_buffer(&self, queue: &Self::Queue, mem: &mut Self::Mem, data: &[u8]) -> ApiResult<()>;

    /// Copy `mem` into `out`, returning once the transfer is complete.
    fn read_buffer(&self, queue: &Self::Queue, mem: &Self::Mem, out: &mut [u8]) -> ApiResult<()>;

    /// Create a program object from source text.
    fn create_program(&self, context: &Self::Context, source: &str) -> ApiResult<Self::Program>;

    /// Compile and link `program` for `device`.
    fn build_program(
        &self,
        program: &mut Self::Program,
        device: &Self::Device,
        options: &str,
    ) -> ApiResult<()>;

    /// Compiler diagnostics of the last build (may be empty).
    fn build_log(&self, program: &Self::Program, device: &Self::Device) -> String;

    /// Resolve the entry point `name` by exact match.
    fn create_kernel(&self, program: &Self::Program, name: &str) -> ApiResult<Self::Kernel>;

    /// Bind argument `index` of `kernel`.
    fn set_kernel_arg(
        &self,
        kernel: &mut Self::Kernel,
        index: u32,
        arg: KernelArg<'_, Self::Mem>,
    ) -> ApiResult<()>;

    /// Enqueue `kernel` over a 2-D range. `local = None` lets the runtime pick.
    fn enqueue_kernel(
        &self,
        queue: &Self::Queue,
        kernel: &Self::Kernel,
        global: [usize; 2],
        local: Option<[usize; 2]>,
    ) -> ApiResult<()>;

    /// Block until everything enqueued on `queue` has completed.
    fn finish(&self, queue: &Self::Queue) -> ApiResult<()>;
}
