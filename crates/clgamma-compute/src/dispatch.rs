//! Kernel argument binding, enqueue and readback.
//!
//! The kernel signature is fixed:
//!
//! ```text
//! gamma_transform(src: *const u8, dst: *mut u8, stride: i32, lut: *const u8)
//! ```
//!
//! One work-item per element: global extent is `(rows, cols * channels)`.

use tracing::{debug, trace};

use crate::backend::{ApiError, ComputeApi, KernelArg, status};
use crate::buffers::DeviceBuffers;
use crate::config::LocalSize;
use crate::context::ExecutionContext;
use crate::error::DispatchPhase;
use crate::image::PixelBuffer;
use crate::program::CompiledProgram;
use crate::{ComputeError, ComputeResult};

pub const ARG_SRC: u32 = 0;
pub const ARG_DST: u32 = 1;
pub const ARG_STRIDE: u32 = 2;
pub const ARG_LUT: u32 = 3;

/// Iteration space and scalar arguments of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchDescriptor {
    /// Global extent `[rows, row_elements]`.
    pub global: [usize; 2],
    /// Work-group extent, `None` to let the runtime choose.
    pub local: Option<[usize; 2]>,
    /// Elements per row, passed as the stride argument.
    pub row_stride: i32,
}

impl DispatchDescriptor {
    /// Describe a dispatch over every element of `image`.
    ///
    /// A fixed local size must divide the global extent in both dimensions.
    pub fn for_image(image: &PixelBuffer, local: LocalSize) -> ComputeResult<Self> {
        let global = [image.rows, image.row_elements()];
        if global[0] == 0 || global[1] == 0 {
            return Err(ComputeError::InvalidDimensions(global[0], global[1]));
        }
        let row_stride = i32::try_from(global[1])
            .map_err(|_| ComputeError::InvalidDimensions(global[0], global[1]))?;

        let local = match local {
            LocalSize::Auto => None,
            LocalSize::Fixed(tile) => {
                let divides = |g: usize, t: usize| t != 0 && g % t == 0;
                if !divides(global[0], tile[0]) || !divides(global[1], tile[1]) {
                    return Err(ComputeError::Dispatch {
                        phase: DispatchPhase::Validate,
                        source: ApiError::new(status::INVALID_WORK_GROUP_SIZE),
                    });
                }
                Some(tile)
            }
        };

        Ok(Self { global, local, row_stride })
    }

    /// Number of work-items.
    pub fn work_items(&self) -> usize {
        self.global[0] * self.global[1]
    }
}

/// Bind src, dst, stride and lut, in that order.
pub fn bind_arguments<A: ComputeApi>(
    api: &A,
    program: &mut CompiledProgram<A>,
    buffers: &DeviceBuffers<A>,
    desc: &DispatchDescriptor,
) -> ComputeResult<()> {
    let args: [(u32, &'static str, KernelArg<'_, A::Mem>); 4] = [
        (ARG_SRC, "src", KernelArg::Mem(buffers.src())),
        (ARG_DST, "dst", KernelArg::Mem(buffers.dst())),
        (ARG_STRIDE, "stride", KernelArg::Int(desc.row_stride)),
        (ARG_LUT, "lut", KernelArg::Mem(buffers.lut())),
    ];
    for (index, name, arg) in args {
        api.set_kernel_arg(program.kernel_mut(), index, arg)
            .map_err(|source| ComputeError::ArgumentBinding { index, name, source })?;
        trace!(index, name, "Bound kernel argument");
    }
    Ok(())
}

/// Enqueue the kernel over `desc.global`.
pub fn enqueue<A: ComputeApi>(
    api: &A,
    exec: &ExecutionContext<A>,
    program: &CompiledProgram<A>,
    desc: &DispatchDescriptor,
) -> ComputeResult<()> {
    api.enqueue_kernel(exec.queue(), program.kernel(), desc.global, desc.local)
        .map_err(|source| ComputeError::Dispatch {
            phase: DispatchPhase::Enqueue,
            source,
        })?;
    debug!(
        entry_point = program.entry_point(),
        global = ?desc.global,
        local = ?desc.local,
        work_items = desc.work_items(),
        "Kernel enqueued"
    );
    Ok(())
}

/// Blocking read of the destination buffer into `out`.
///
/// `out` is only overwritten once the read has completed.
pub fn read_back<A: ComputeApi>(
    api: &A,
    exec: &ExecutionContext<A>,
    buffers: &DeviceBuffers<A>,
    out: &mut PixelBuffer,
) -> ComputeResult<()> {
    if out.byte_size() != buffers.image_bytes() {
        return Err(ComputeError::BufferSizeMismatch {
            expected: buffers.image_bytes(),
            actual: out.byte_size(),
        });
    }
    let mut staging = vec![0u8; buffers.image_bytes()];
    api.read_buffer(exec.queue(), buffers.dst(), &mut staging)
        .map_err(|source| ComputeError::Dispatch {
            phase: DispatchPhase::Readback,
            source,
        })?;
    out.data_mut().copy_from_slice(&staging);
    debug!(bytes = staging.len(), "Read back destination buffer");
    Ok(())
}
