//! Kernel source loading and compilation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::backend::ComputeApi;
use crate::context::ExecutionContext;
use crate::{ComputeError, ComputeResult};

/// Largest kernel source accepted, in bytes (1 MiB).
pub const MAX_SOURCE_SIZE: usize = 0x100000;

/// Kernel source text, treated as an opaque blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    origin: PathBuf,
    text: String,
}

impl KernelSource {
    /// Read kernel source from `path`.
    ///
    /// A missing or unreadable file, empty content or non-UTF-8 content is
    /// [`ComputeError::SourceNotFound`]. Files larger than
    /// [`MAX_SOURCE_SIZE`] are rejected with [`ComputeError::SourceTooLarge`]
    /// rather than truncated.
    pub fn from_path(path: impl AsRef<Path>) -> ComputeResult<Self> {
        let path = path.as_ref();
        let not_found = |reason: String| ComputeError::SourceNotFound {
            path: path.to_path_buf(),
            reason,
        };

        let meta = fs::metadata(path).map_err(|e| not_found(e.to_string()))?;
        if !meta.is_file() {
            return Err(not_found("not a regular file".into()));
        }
        if meta.len() > MAX_SOURCE_SIZE as u64 {
            return Err(ComputeError::SourceTooLarge {
                path: path.to_path_buf(),
                size: meta.len(),
                limit: MAX_SOURCE_SIZE,
            });
        }

        let bytes = fs::read(path).map_err(|e| not_found(e.to_string()))?;
        Self::from_bytes(path, bytes)
    }

    /// Wrap in-memory source bytes. `origin` is only used in diagnostics.
    pub fn from_bytes(origin: impl Into<PathBuf>, bytes: Vec<u8>) -> ComputeResult<Self> {
        let origin = origin.into();
        if bytes.len() > MAX_SOURCE_SIZE {
            return Err(ComputeError::SourceTooLarge {
                path: origin,
                size: bytes.len() as u64,
                limit: MAX_SOURCE_SIZE,
            });
        }
        if bytes.is_empty() {
            return Err(ComputeError::SourceNotFound {
                path: origin,
                reason: "file is empty".into(),
            });
        }
        let text = String::from_utf8(bytes).map_err(|e| ComputeError::SourceNotFound {
            path: origin.clone(),
            reason: format!("not valid UTF-8: {e}"),
        })?;
        Ok(Self { origin, text })
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A program built for the resolved device and its entry point.
pub struct CompiledProgram<A: ComputeApi> {
    // Kernel is released before the program it came from.
    kernel: A::Kernel,
    _program: A::Program,
    entry_point: String,
}

impl<A: ComputeApi> CompiledProgram<A> {
    /// Compile `source` for `device` and resolve `entry_point`.
    ///
    /// Fails with [`ComputeError::Build`] on a compiler error or a missing
    /// entry point. The error always carries a non-empty log.
    pub fn build(
        api: &A,
        exec: &ExecutionContext<A>,
        device: &A::Device,
        source: &KernelSource,
        entry_point: &str,
        options: &str,
    ) -> ComputeResult<Self> {
        let build_error = |log: String, code: i32| ComputeError::Build {
            entry_point: entry_point.to_string(),
            log,
            code,
        };

        let mut program = api
            .create_program(exec.context(), source.text())
            .map_err(|e| {
                let origin = source.origin().display();
                build_error(format!("cannot create program from {origin}: {e}"), e.code)
            })?;

        if let Err(e) = api.build_program(&mut program, device, options) {
            let mut log = api.build_log(&program, device);
            if log.trim().is_empty() {
                let origin = source.origin().display();
                log = format!("build of {origin} failed without diagnostics: {e}");
            }
            debug!(code = e.code, log_bytes = log.len(), "Kernel build failed");
            return Err(build_error(log, e.code));
        }
        debug!(source = %source.origin().display(), bytes = source.len(), options, "Program built");

        let kernel = api.create_kernel(&program, entry_point).map_err(|e| {
            let origin = source.origin().display();
            build_error(format!("entry point '{entry_point}' not found in {origin}: {e}"), e.code)
        })?;
        debug!(entry_point, "Kernel resolved");

        Ok(Self {
            kernel,
            _program: program,
            entry_point: entry_point.to_string(),
        })
    }

    pub fn kernel(&self) -> &A::Kernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut A::Kernel {
        &mut self.kernel
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}
