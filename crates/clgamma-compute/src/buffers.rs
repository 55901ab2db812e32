//! Device buffers for one run.
//!
//! Three regions: source pixels, destination pixels and the 256-byte LUT.
//! Allocation sizes are checked against the device's reported limit and
//! fail explicitly when they exceed it.

use clgamma_lut::{GammaLut, LUT_SIZE};
use tracing::debug;

use crate::backend::{ApiError, ComputeApi, DeviceCaps, MemAccess, status};
use crate::context::ExecutionContext;
use crate::image::PixelBuffer;
use crate::{ComputeError, ComputeResult};

/// Device-resident regions backing one dispatch.
pub struct DeviceBuffers<A: ComputeApi> {
    // Declared in reverse allocation order so drop releases LIFO.
    lut: A::Mem,
    dst: A::Mem,
    src: A::Mem,
    image_bytes: usize,
}

fn allocate_one<A: ComputeApi>(
    api: &A,
    exec: &ExecutionContext<A>,
    caps: &DeviceCaps,
    what: &'static str,
    access: MemAccess,
    bytes: usize,
) -> ComputeResult<A::Mem> {
    if bytes == 0 || bytes as u64 > caps.max_alloc_bytes {
        return Err(ComputeError::Allocation {
            what,
            bytes,
            source: ApiError::new(status::INVALID_BUFFER_SIZE),
        });
    }
    let mem = api
        .create_buffer(exec.context(), access, bytes)
        .map_err(|source| ComputeError::Allocation { what, bytes, source })?;
    debug!(buffer = what, bytes, ?access, "Allocated device buffer");
    Ok(mem)
}

impl<A: ComputeApi> DeviceBuffers<A> {
    /// Allocate source, destination and LUT regions, in that order.
    ///
    /// `image_bytes` sizes the two pixel regions.
    pub fn allocate(
        api: &A,
        exec: &ExecutionContext<A>,
        caps: &DeviceCaps,
        image_bytes: usize,
    ) -> ComputeResult<Self> {
        let src = allocate_one(api, exec, caps, "source", MemAccess::ReadOnly, image_bytes)?;
        let dst = allocate_one(api, exec, caps, "destination", MemAccess::WriteOnly, image_bytes)?;
        let lut = allocate_one(api, exec, caps, "lut", MemAccess::ReadOnly, LUT_SIZE)?;
        Ok(Self { lut, dst, src, image_bytes })
    }

    /// Blocking upload of the source pixels, the zero-filled destination
    /// mirror and the LUT.
    pub fn upload(
        &mut self,
        api: &A,
        exec: &ExecutionContext<A>,
        src_pixels: &PixelBuffer,
        dst_pixels: &PixelBuffer,
        lut: &GammaLut,
    ) -> ComputeResult<()> {
        self.check_len(src_pixels.byte_size())?;
        self.check_len(dst_pixels.byte_size())?;

        let queue = exec.queue();
        api.write_buffer(queue, &mut self.src, src_pixels.data())
            .map_err(|source| ComputeError::Transfer { what: "source", source })?;
        api.write_buffer(queue, &mut self.dst, dst_pixels.data())
            .map_err(|source| ComputeError::Transfer { what: "destination", source })?;
        api.write_buffer(queue, &mut self.lut, lut.as_ref())
            .map_err(|source| ComputeError::Transfer { what: "lut", source })?;
        debug!(image_bytes = self.image_bytes, lut_bytes = LUT_SIZE, "Uploaded buffers");
        Ok(())
    }

    fn check_len(&self, actual: usize) -> ComputeResult<()> {
        if actual != self.image_bytes {
            return Err(ComputeError::BufferSizeMismatch {
                expected: self.image_bytes,
                actual,
            });
        }
        Ok(())
    }

    pub fn src(&self) -> &A::Mem {
        &self.src
    }

    pub fn dst(&self) -> &A::Mem {
        &self.dst
    }

    pub fn lut(&self) -> &A::Mem {
        &self.lut
    }

    /// Size of each pixel region in bytes.
    pub fn image_bytes(&self) -> usize {
        self.image_bytes
    }
}
