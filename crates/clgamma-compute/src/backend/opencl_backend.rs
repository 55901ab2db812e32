//! OpenCL backend over `opencl3`.
//!
//! Requires the `opencl` feature and an installed OpenCL ICD loader.

use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{
    CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU, Device,
};
use opencl3::error_codes::ClError;
use opencl3::kernel::Kernel;
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY, ClMem};
use opencl3::platform::{Platform, get_platforms};
use opencl3::program::Program;
use opencl3::types::{CL_BLOCKING, cl_device_type, cl_int, cl_mem, cl_mem_flags};

use super::{ApiError, ApiResult, ComputeApi, DeviceCaps, DeviceClass, KernelArg, MemAccess};

impl From<ClError> for ApiError {
    fn from(e: ClError) -> Self {
        ApiError::new(e.0)
    }
}

fn device_type(class: DeviceClass) -> cl_device_type {
    match class {
        DeviceClass::Cpu => CL_DEVICE_TYPE_CPU,
        DeviceClass::Gpu => CL_DEVICE_TYPE_GPU,
        DeviceClass::Accelerator => CL_DEVICE_TYPE_ACCELERATOR,
        DeviceClass::All => CL_DEVICE_TYPE_ALL,
    }
}

fn mem_flags(access: MemAccess) -> cl_mem_flags {
    match access {
        MemAccess::ReadOnly => CL_MEM_READ_ONLY,
        MemAccess::WriteOnly => CL_MEM_WRITE_ONLY,
        MemAccess::ReadWrite => CL_MEM_READ_WRITE,
    }
}

/// OpenCL runtime accessed through `opencl3`.
///
/// Stateless: every handle it returns owns its OpenCL object and calls the
/// matching `clRelease*` when dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenClApi;

impl OpenClApi {
    pub fn new() -> Self {
        Self
    }

    /// Check if at least one OpenCL platform is installed.
    pub fn is_available() -> bool {
        get_platforms().map(|p| !p.is_empty()).unwrap_or(false)
    }
}

impl ComputeApi for OpenClApi {
    type Platform = Platform;
    type Device = Device;
    type Context = Context;
    type Queue = CommandQueue;
    type Mem = Buffer<u8>;
    type Program = Program;
    type Kernel = Kernel;

    fn name(&self) -> &'static str {
        "opencl"
    }

    fn platforms(&self) -> ApiResult<Vec<Platform>> {
        Ok(get_platforms()?)
    }

    fn devices(&self, platform: &Platform, class: DeviceClass) -> ApiResult<Vec<Device>> {
        let ids = platform.get_devices(device_type(class))?;
        Ok(ids.into_iter().map(Device::new).collect())
    }

    fn device_caps(&self, device: &Device) -> ApiResult<DeviceCaps> {
        Ok(DeviceCaps {
            name: device.name()?.trim().to_string(),
            vendor: device.vendor()?.trim().to_string(),
            max_alloc_bytes: device.max_mem_alloc_size()?,
            // Reported in bits.
            base_align_bytes: u64::from(device.mem_base_addr_align()?) / 8,
        })
    }

    fn create_context(&self, device: &Device) -> ApiResult<Context> {
        Ok(Context::from_device(device)?)
    }

    fn create_queue(&self, context: &Context, _device: &Device) -> ApiResult<CommandQueue> {
        // The context was created from this device alone, so it is the
        // queue's default device. Properties 0: in-order, no profiling.
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(context, 0)?;
        Ok(queue)
    }

    fn create_buffer(
        &self,
        context: &Context,
        access: MemAccess,
        size: usize,
    ) -> ApiResult<Buffer<u8>> {
        let flags = mem_flags(access);
        // SAFETY: no host pointer is passed; the runtime owns the region.
        let buffer = unsafe { Buffer::<u8>::create(context, flags, size, ptr::null_mut())? };
        Ok(buffer)
    }

    fn write_buffer(
        &self,
        queue: &CommandQueue,
        mem: &mut Buffer<u8>,
        data: &[u8],
    ) -> ApiResult<()> {
        // SAFETY: blocking write, `data` outlives the call.
        let event = unsafe { queue.enqueue_write_buffer(mem, CL_BLOCKING, 0, data, &[])? };
        event.wait()?;
        Ok(())
    }

    fn read_buffer(&self, queue: &CommandQueue, mem: &Buffer<u8>, out: &mut [u8]) -> ApiResult<()> {
        // SAFETY: blocking read, `out` outlives the call.
        let event = unsafe { queue.enqueue_read_buffer(mem, CL_BLOCKING, 0, out, &[])? };
        event.wait()?;
        Ok(())
    }

    fn create_program(&self, context: &Context, source: &str) -> ApiResult<Program> {
        Ok(Program::create_from_source(context, source)?)
    }

    fn build_program(
        &self,
        program: &mut Program,
        device: &Device,
        options: &str,
    ) -> ApiResult<()> {
        program.build(&[device.id()], options)?;
        Ok(())
    }

    fn build_log(&self, program: &Program, device: &Device) -> String {
        program.get_build_log(device.id()).unwrap_or_default()
    }

    fn create_kernel(&self, program: &Program, name: &str) -> ApiResult<Kernel> {
        Ok(Kernel::create(program, name)?)
    }

    fn set_kernel_arg(
        &self,
        kernel: &mut Kernel,
        index: u32,
        arg: KernelArg<'_, Buffer<u8>>,
    ) -> ApiResult<()> {
        match arg {
            KernelArg::Mem(buffer) => {
                let mem: cl_mem = buffer.get();
                // SAFETY: `mem` is a live buffer handle; the size passed is that of cl_mem.
                unsafe { kernel.set_arg(index, &mem)? };
            }
            KernelArg::Int(value) => {
                let value: cl_int = value;
                // SAFETY: plain scalar argument.
                unsafe { kernel.set_arg(index, &value)? };
            }
        }
        Ok(())
    }

    fn enqueue_kernel(
        &self,
        queue: &CommandQueue,
        kernel: &Kernel,
        global: [usize; 2],
        local: Option<[usize; 2]>,
    ) -> ApiResult<()> {
        let local_ptr = local.as_ref().map_or(ptr::null(), |l| l.as_ptr());
        // SAFETY: `global` and `local` outlive the call; every argument of
        // `kernel` was bound before enqueue.
        unsafe {
            queue.enqueue_nd_range_kernel(
                kernel.get(),
                2,
                ptr::null(),
                global.as_ptr(),
                local_ptr,
                &[],
            )?;
        }
        Ok(())
    }

    fn finish(&self, queue: &CommandQueue) -> ApiResult<()> {
        queue.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clgamma_lut::GammaLut;

    use super::*;
    use crate::{
        ComputeError, KernelSource, LocalSize, PipelineConfig, PixelBuffer, Stage, run_gamma,
    };

    const SHIPPED_KERNEL: &str = include_str!("../../../../custom_opencl_kernels.cl");

    fn any_device() -> PipelineConfig {
        PipelineConfig::default().with_device_class(DeviceClass::All)
    }

    fn shipped_kernel() -> KernelSource {
        KernelSource::from_bytes("custom_opencl_kernels.cl", SHIPPED_KERNEL.as_bytes().to_vec())
            .unwrap()
    }

    #[test]
    fn test_cl_error_keeps_status() {
        assert_eq!(ApiError::from(ClError(-61)).code, -61);
        assert_eq!(ApiError::from(ClError(-11)).code, -11);
    }

    #[test]
    fn test_uniform_4x4_gamma_2() {
        if !OpenClApi::is_available() {
            return; // skip
        }
        let api = OpenClApi::new();
        let lut = GammaLut::new(2.0).unwrap();
        let source = PixelBuffer::filled(4, 4, 128).unwrap();

        let out = run_gamma(&api, any_device(), &source, &lut, &shipped_kernel()).unwrap();

        assert!(out.image.data().iter().all(|&px| px == lut.get(128)));
        assert!(!out.device.name.is_empty());
        assert!(out.device.base_align_bytes > 0);
        assert!(out.device.max_alloc_bytes >= 16);
    }

    #[test]
    fn test_runtime_chosen_local_size() {
        if !OpenClApi::is_available() {
            return; // skip
        }
        let api = OpenClApi::new();
        let lut = GammaLut::new(2.2).unwrap();
        let ramp: Vec<u8> = (0..=255u8).collect();
        let source = PixelBuffer::new(16, 16, 1, ramp.clone()).unwrap();
        let config = any_device().with_local_size(LocalSize::Auto);

        let out = run_gamma(&api, config, &source, &lut, &shipped_kernel()).unwrap();

        let mut expected = ramp;
        lut.apply_in_place(&mut expected);
        assert_eq!(out.image.data(), expected.as_slice());
    }

    #[test]
    fn test_broken_kernel_reports_build_log() {
        if !OpenClApi::is_available() {
            return; // skip
        }
        let api = OpenClApi::new();
        let broken = KernelSource::from_bytes(
            "broken.cl",
            b"__kernel void gamma_transform(__global uchar* s) { s[0] = undeclared; }".to_vec(),
        )
        .unwrap();
        let source = PixelBuffer::filled(2, 2, 0).unwrap();

        let err = run_gamma(&api, any_device(), &source, &GammaLut::identity(), &broken)
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Compiled);
        let ComputeError::Build { log, entry_point, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(entry_point, "gamma_transform");
        assert!(!log.trim().is_empty());
    }
}
