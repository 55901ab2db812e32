//! Scripted in-process compute device.
//!
//! [`FakeApi`] implements [`ComputeApi`] on the host. Every context, queue,
//! buffer, program and kernel it hands out is tracked: creation and release
//! are appended to one ordered event log, so tests can check that nothing
//! leaks and that teardown runs in reverse creation order.
//!
//! Dispatching a kernel runs the `gamma_transform` contract on the host:
//! `dst[r * stride + c] = lut[src[r * stride + c]]`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use clgamma_compute::backend::status;
use clgamma_compute::{
    ApiError, ApiResult, ComputeApi, DeviceCaps, DeviceClass, KernelArg, MemAccess,
};

/// One call of the [`ComputeApi`] surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Platforms,
    Devices,
    DeviceCaps,
    CreateContext,
    CreateQueue,
    CreateBuffer,
    WriteBuffer,
    ReadBuffer,
    CreateProgram,
    BuildProgram,
    CreateKernel,
    SetKernelArg,
    EnqueueKernel,
    Finish,
}

/// Tracked resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Context,
    Queue,
    Mem,
    Program,
    Kernel,
}

/// Entry of the resource log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Created(Resource, u64),
    Released(Resource, u64),
}

/// A kernel argument as the fake saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedArg {
    /// Buffer handle id.
    Mem(u64),
    Int(i32),
}

/// One recorded enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub global: [usize; 2],
    pub local: Option<[usize; 2]>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    events: Vec<Event>,
    calls: HashMap<Call, usize>,
    failures: HashMap<(Call, usize), i32>,
    memory: HashMap<u64, Vec<u8>>,
    access: HashMap<u64, MemAccess>,
    kernel_args: HashMap<u64, HashMap<u32, RecordedArg>>,
    dispatches: Vec<Dispatch>,
    build_options: Vec<String>,
}

impl State {
    /// Count the call and return the injected status, if any.
    fn enter(&mut self, call: Call) -> ApiResult<()> {
        let n = self.calls.entry(call).or_insert(0);
        let index = *n;
        *n += 1;
        match self.failures.get(&(call, index)) {
            Some(&code) => Err(ApiError::new(code)),
            None => Ok(()),
        }
    }

    fn create(&mut self, kind: Resource) -> u64 {
        self.next_id += 1;
        self.events.push(Event::Created(kind, self.next_id));
        self.next_id
    }
}

type Shared = Rc<RefCell<State>>;

/// Handle to a tracked resource. Dropping it logs the release.
#[derive(Debug)]
pub struct FakeHandle {
    kind: Resource,
    id: u64,
    state: Shared,
}

impl FakeHandle {
    fn new(state: &Shared, kind: Resource) -> Self {
        let id = state.borrow_mut().create(kind);
        Self {
            kind,
            id,
            state: Rc::clone(state),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        let mut st = self.state.borrow_mut();
        st.events.push(Event::Released(self.kind, self.id));
        st.memory.remove(&self.id);
    }
}

/// Program handle: tracked, plus the source it was created from.
#[derive(Debug)]
pub struct FakeProgram {
    handle: FakeHandle,
    source: String,
    built: bool,
}

impl FakeProgram {
    pub fn id(&self) -> u64 {
        self.handle.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakePlatform(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeDevice(pub usize);

/// Scripted compute API.
///
/// Cloning shares the log and the failure script.
#[derive(Debug, Clone)]
pub struct FakeApi {
    state: Shared,
    platforms: usize,
    devices: usize,
    caps: DeviceCaps,
    build_log: String,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    /// One platform with one 1 GiB-allocation CPU device.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::default())),
            platforms: 1,
            devices: 1,
            caps: DeviceCaps {
                name: "Fake CPU".to_string(),
                vendor: "clgamma".to_string(),
                max_alloc_bytes: 1 << 30,
                base_align_bytes: 128,
            },
            build_log: "<source>:1:1: error: scripted build failure".to_string(),
        }
    }

    pub fn with_platforms(mut self, n: usize) -> Self {
        self.platforms = n;
        self
    }

    pub fn with_devices(mut self, n: usize) -> Self {
        self.devices = n;
        self
    }

    pub fn with_max_alloc(mut self, bytes: u64) -> Self {
        self.caps.max_alloc_bytes = bytes;
        self
    }

    /// Log returned by `build_log` after a failed build.
    pub fn with_build_log(mut self, log: impl Into<String>) -> Self {
        self.build_log = log.into();
        self
    }

    /// Fail the first invocation of `call` with `code`.
    pub fn fail(self, call: Call, code: i32) -> Self {
        self.fail_nth(call, 0, code)
    }

    /// Fail the `n`-th (0-based) invocation of `call` with `code`.
    pub fn fail_nth(self, call: Call, n: usize, code: i32) -> Self {
        self.state.borrow_mut().failures.insert((call, n), code);
        self
    }

    /// Times device resolution was attempted.
    pub fn resolution_calls(&self) -> usize {
        self.call_count(Call::Platforms)
    }

    pub fn call_count(&self, call: Call) -> usize {
        self.state.borrow().calls.get(&call).copied().unwrap_or(0)
    }

    /// Ordered resource log.
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Ids in creation order.
    pub fn created(&self) -> Vec<(Resource, u64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Created(k, id) => Some((k, id)),
                Event::Released(..) => None,
            })
            .collect()
    }

    /// Ids in release order.
    pub fn released(&self) -> Vec<(Resource, u64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Released(k, id) => Some((k, id)),
                Event::Created(..) => None,
            })
            .collect()
    }

    /// Resources created and not yet released.
    pub fn live_resources(&self) -> usize {
        self.created().len() - self.released().len()
    }

    /// True if every resource was released, in reverse creation order.
    pub fn released_lifo(&self) -> bool {
        let mut created = self.created();
        created.reverse();
        created == self.released()
    }

    /// Arguments bound to any kernel this fake created, by index.
    pub fn kernel_args(&self) -> Vec<(u32, RecordedArg)> {
        let st = self.state.borrow();
        let mut args: Vec<_> = st
            .kernel_args
            .values()
            .flat_map(|m| m.iter().map(|(&i, &a)| (i, a)))
            .collect();
        args.sort_by_key(|(i, _)| *i);
        args
    }

    /// Access hints of every buffer, in allocation order.
    pub fn buffer_access(&self) -> Vec<MemAccess> {
        let st = self.state.borrow();
        self.created()
            .into_iter()
            .filter(|(k, _)| *k == Resource::Mem)
            .filter_map(|(_, id)| st.access.get(&id).copied())
            .collect()
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.state.borrow().dispatches.clone()
    }

    pub fn build_options(&self) -> Vec<String> {
        self.state.borrow().build_options.clone()
    }

    fn enter(&self, call: Call) -> ApiResult<()> {
        self.state.borrow_mut().enter(call)
    }

    fn memory(&self, id: u64) -> ApiResult<Vec<u8>> {
        self.state
            .borrow()
            .memory
            .get(&id)
            .cloned()
            .ok_or(ApiError::new(status::INVALID_VALUE))
    }
}

impl ComputeApi for FakeApi {
    type Platform = FakePlatform;
    type Device = FakeDevice;
    type Context = FakeHandle;
    type Queue = FakeHandle;
    type Mem = FakeHandle;
    type Program = FakeProgram;
    type Kernel = FakeHandle;

    fn name(&self) -> &'static str {
        "fake"
    }

    fn platforms(&self) -> ApiResult<Vec<FakePlatform>> {
        self.enter(Call::Platforms)?;
        Ok((0..self.platforms).map(FakePlatform).collect())
    }

    fn devices(&self, _platform: &FakePlatform, _class: DeviceClass) -> ApiResult<Vec<FakeDevice>> {
        self.enter(Call::Devices)?;
        if self.devices == 0 {
            return Err(ApiError::new(status::DEVICE_NOT_FOUND));
        }
        Ok((0..self.devices).map(FakeDevice).collect())
    }

    fn device_caps(&self, _device: &FakeDevice) -> ApiResult<DeviceCaps> {
        self.enter(Call::DeviceCaps)?;
        Ok(self.caps.clone())
    }

    fn create_context(&self, _device: &FakeDevice) -> ApiResult<FakeHandle> {
        self.enter(Call::CreateContext)?;
        Ok(FakeHandle::new(&self.state, Resource::Context))
    }

    fn create_queue(&self, _context: &FakeHandle, _device: &FakeDevice) -> ApiResult<FakeHandle> {
        self.enter(Call::CreateQueue)?;
        Ok(FakeHandle::new(&self.state, Resource::Queue))
    }

    fn create_buffer(
        &self,
        _context: &FakeHandle,
        access: MemAccess,
        size: usize,
    ) -> ApiResult<FakeHandle> {
        self.enter(Call::CreateBuffer)?;
        let handle = FakeHandle::new(&self.state, Resource::Mem);
        let mut st = self.state.borrow_mut();
        // Fill with a non-zero pattern so unwritten regions are visible.
        st.memory.insert(handle.id, vec![0xCD; size]);
        st.access.insert(handle.id, access);
        drop(st);
        Ok(handle)
    }

    fn write_buffer(
        &self,
        _queue: &FakeHandle,
        mem: &mut FakeHandle,
        data: &[u8],
    ) -> ApiResult<()> {
        self.enter(Call::WriteBuffer)?;
        let mut st = self.state.borrow_mut();
        let region = st
            .memory
            .get_mut(&mem.id)
            .ok_or(ApiError::new(status::INVALID_VALUE))?;
        if data.len() > region.len() {
            return Err(ApiError::new(status::INVALID_VALUE));
        }
        region[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, _queue: &FakeHandle, mem: &FakeHandle, out: &mut [u8]) -> ApiResult<()> {
        self.enter(Call::ReadBuffer)?;
        let region = self.memory(mem.id)?;
        if out.len() > region.len() {
            return Err(ApiError::new(status::INVALID_VALUE));
        }
        out.copy_from_slice(&region[..out.len()]);
        Ok(())
    }

    fn create_program(&self, _context: &FakeHandle, source: &str) -> ApiResult<FakeProgram> {
        self.enter(Call::CreateProgram)?;
        Ok(FakeProgram {
            handle: FakeHandle::new(&self.state, Resource::Program),
            source: source.to_string(),
            built: false,
        })
    }

    fn build_program(
        &self,
        program: &mut FakeProgram,
        _device: &FakeDevice,
        options: &str,
    ) -> ApiResult<()> {
        self.state.borrow_mut().build_options.push(options.to_string());
        self.enter(Call::BuildProgram)?;
        if !program.source.contains("__kernel") {
            return Err(ApiError::new(status::BUILD_PROGRAM_FAILURE));
        }
        program.built = true;
        Ok(())
    }

    fn build_log(&self, program: &FakeProgram, _device: &FakeDevice) -> String {
        if program.built {
            String::new()
        } else {
            self.build_log.clone()
        }
    }

    fn create_kernel(&self, program: &FakeProgram, name: &str) -> ApiResult<FakeHandle> {
        self.enter(Call::CreateKernel)?;
        if !program.built {
            return Err(ApiError::new(status::INVALID_PROGRAM_EXECUTABLE));
        }
        let declared = program
            .source
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|word| word == name);
        if !declared {
            return Err(ApiError::new(status::INVALID_KERNEL_NAME));
        }
        let kernel = FakeHandle::new(&self.state, Resource::Kernel);
        self.state.borrow_mut().kernel_args.insert(kernel.id, HashMap::new());
        Ok(kernel)
    }

    fn set_kernel_arg(
        &self,
        kernel: &mut FakeHandle,
        index: u32,
        arg: KernelArg<'_, FakeHandle>,
    ) -> ApiResult<()> {
        self.enter(Call::SetKernelArg)?;
        if index > 3 {
            return Err(ApiError::new(status::INVALID_ARG_INDEX));
        }
        let recorded = match arg {
            KernelArg::Mem(mem) => RecordedArg::Mem(mem.id),
            KernelArg::Int(v) => RecordedArg::Int(v),
        };
        let mut st = self.state.borrow_mut();
        st.kernel_args.entry(kernel.id).or_default().insert(index, recorded);
        Ok(())
    }

    fn enqueue_kernel(
        &self,
        _queue: &FakeHandle,
        kernel: &FakeHandle,
        global: [usize; 2],
        local: Option<[usize; 2]>,
    ) -> ApiResult<()> {
        self.enter(Call::EnqueueKernel)?;
        self.state.borrow_mut().dispatches.push(Dispatch { global, local });

        let args = self
            .state
            .borrow()
            .kernel_args
            .get(&kernel.id)
            .cloned()
            .unwrap_or_default();
        let mem_arg = |i: u32| match args.get(&i) {
            Some(RecordedArg::Mem(id)) => Ok(*id),
            _ => Err(ApiError::new(status::INVALID_ARG_VALUE)),
        };
        let (src_id, dst_id, lut_id) = (mem_arg(0)?, mem_arg(1)?, mem_arg(3)?);
        let stride = match args.get(&2) {
            Some(RecordedArg::Int(v)) if *v >= 0 => *v as usize,
            _ => return Err(ApiError::new(status::INVALID_ARG_VALUE)),
        };

        let src = self.memory(src_id)?;
        let lut = self.memory(lut_id)?;
        let mut dst = self.memory(dst_id)?;
        for r in 0..global[0] {
            for c in 0..global[1] {
                let idx = r * stride + c;
                let (Some(&s), Some(d)) = (src.get(idx), dst.get_mut(idx)) else {
                    return Err(ApiError::new(status::OUT_OF_RESOURCES));
                };
                *d = *lut.get(s as usize).ok_or(ApiError::new(status::OUT_OF_RESOURCES))?;
            }
        }
        self.state.borrow_mut().memory.insert(dst_id, dst);
        Ok(())
    }

    fn finish(&self, _queue: &FakeHandle) -> ApiResult<()> {
        self.enter(Call::Finish)
    }
}
