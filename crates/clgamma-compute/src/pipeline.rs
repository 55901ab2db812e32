//! Pipeline driver.
//!
//! ```text
//! Idle -> Resolved -> Contexted -> Buffered -> Compiled -> Dispatched -> Retrieved -> TornDown
//!   \________\___________\___________\___________\____________\____________/  (on error)
//! ```
//!
//! Transitions only move forward. Any failure short-circuits to
//! `TornDown`; resources created so far are released in reverse creation
//! order as the locals holding them go out of scope. There is no retry.

use std::fmt;

use clgamma_lut::GammaLut;
use tracing::{debug, info, info_span};

use crate::backend::{ComputeApi, DeviceCaps};
use crate::buffers::DeviceBuffers;
use crate::config::PipelineConfig;
use crate::context::ExecutionContext;
use crate::device::resolve_device;
use crate::dispatch::{self, DispatchDescriptor};
use crate::image::PixelBuffer;
use crate::program::{CompiledProgram, KernelSource};
use crate::{ComputeError, ComputeResult};

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Idle,
    Resolved,
    Contexted,
    Buffered,
    Compiled,
    Dispatched,
    Retrieved,
    TornDown,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolved => "device resolution",
            Self::Contexted => "context creation",
            Self::Buffered => "buffer setup",
            Self::Compiled => "kernel build",
            Self::Dispatched => "dispatch",
            Self::Retrieved => "readback",
            Self::TornDown => "teardown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Device-computed raster, same shape as the input.
    pub image: PixelBuffer,
    /// Device the run executed on.
    pub device: DeviceCaps,
}

/// One-shot gamma offload.
///
/// A pipeline runs once; call [`GammaPipeline::run`] again and it fails
/// with [`ComputeError::InvalidState`].
pub struct GammaPipeline<'a, A: ComputeApi> {
    api: &'a A,
    config: PipelineConfig,
    stage: Stage,
    history: Vec<Stage>,
}

impl<'a, A: ComputeApi> GammaPipeline<'a, A> {
    pub fn new(api: &'a A, config: PipelineConfig) -> Self {
        Self {
            api,
            config,
            stage: Stage::Idle,
            history: vec![Stage::Idle],
        }
    }

    /// Current state.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Run the full pipeline over `source`.
    ///
    /// On success the returned raster holds `lut[src[i]]` for every element.
    /// On failure every resource acquired so far has been released when
    /// this returns, and the pipeline is in `TornDown`.
    pub fn run(
        &mut self,
        source: &PixelBuffer,
        lut: &GammaLut,
        kernel: &KernelSource,
    ) -> ComputeResult<PipelineOutput> {
        if self.stage != Stage::Idle {
            return Err(ComputeError::InvalidState(self.stage));
        }

        let result = self.execute(source, lut, kernel);
        if let Err(e) = &result {
            debug!(stage = %e.stage(), code = e.exit_code(), "Pipeline failed");
        }
        self.advance(Stage::TornDown);
        result
    }

    fn execute(
        &mut self,
        source: &PixelBuffer,
        lut: &GammaLut,
        kernel: &KernelSource,
    ) -> ComputeResult<PipelineOutput> {
        let api = self.api;
        let config = self.config.clone();
        let _span = info_span!(
            "gamma_pipeline",
            backend = api.name(),
            rows = source.rows,
            cols = source.cols,
            channels = source.channels,
            gamma = lut.gamma()
        )
        .entered();

        // Host-side checks run before any device call.
        let desc = DispatchDescriptor::for_image(source, config.local_size)?;

        // Declaration order is creation order; drop runs in reverse.
        let device = resolve_device(api, config.device_class)?;
        self.advance(Stage::Resolved);

        let exec = ExecutionContext::create(api, &device.device)?;
        self.advance(Stage::Contexted);

        let mut output = source.zeroed_like();
        let mut buffers = DeviceBuffers::allocate(api, &exec, &device.caps, source.byte_size())?;
        buffers.upload(api, &exec, source, &output, lut)?;
        self.advance(Stage::Buffered);

        let mut program = CompiledProgram::build(
            api,
            &exec,
            &device.device,
            kernel,
            &config.entry_point,
            &config.build_options,
        )?;
        self.advance(Stage::Compiled);

        dispatch::bind_arguments(api, &mut program, &buffers, &desc)?;
        dispatch::enqueue(api, &exec, &program, &desc)?;
        self.advance(Stage::Dispatched);

        dispatch::read_back(api, &exec, &buffers, &mut output)?;
        self.advance(Stage::Retrieved);

        if config.finish_on_teardown {
            exec.finish(api)?;
        }

        info!(device = %device.caps.name, bytes = output.byte_size(), "Gamma transform complete");
        Ok(PipelineOutput {
            image: output,
            device: device.caps.clone(),
        })
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        self.history.push(next);
    }
}

/// Run a fresh pipeline once with `config`.
pub fn run_gamma<A: ComputeApi>(
    api: &A,
    config: PipelineConfig,
    source: &PixelBuffer,
    lut: &GammaLut,
    kernel: &KernelSource,
) -> ComputeResult<PipelineOutput> {
    GammaPipeline::new(api, config).run(source, lut, kernel)
}
