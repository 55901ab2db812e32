//! clgamma - gamma-correct an image on an OpenCL device.
//!
//! The binary is a thin wrapper over [`run`], which takes the argument
//! vector and a [`ComputeApi`] so the whole command can be driven against
//! any backend.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::error::ErrorKind;
use clgamma_compute::{
    ComputeApi, ComputeError, DEFAULT_ENTRY_POINT, DeviceCaps, DeviceClass, KernelSource, LocalSize,
    PipelineConfig, run_gamma,
};
use clgamma_lut::GammaLut;
use thiserror::Error;
use tracing::{info, warn};

pub mod image_io;
pub mod logging;

/// Well-known kernel source file, resolved against the working directory.
pub const DEFAULT_KERNEL_FILE: &str = "custom_opencl_kernels.cl";

#[derive(Parser, Debug, Clone)]
#[command(name = "clgamma")]
#[command(author, version, about = "Gamma-correct an image with an OpenCL kernel")]
#[command(long_about = "
Applies a 256-entry gamma lookup table to a grayscale image on a compute
device. The kernel is compiled at runtime from a source file.

Examples:
  clgamma photo.png 2.2                     # writes photo_gamma.png
  clgamma photo.png 0.45 -o bright.png --verify
  clgamma scan.tif 1.8 --device gpu --local-size 8x8 -vv
")]
pub struct Cli {
    /// Input image (any decodable raster, converted to grayscale)
    pub image: PathBuf,

    /// Gamma exponent (finite, greater than zero)
    #[arg(value_parser = parse_gamma, allow_hyphen_values = true)]
    pub gamma: f64,

    /// Kernel source file
    #[arg(short, long, default_value = DEFAULT_KERNEL_FILE)]
    pub kernel: PathBuf,

    /// Kernel entry point
    #[arg(long, default_value = DEFAULT_ENTRY_POINT)]
    pub entry_point: String,

    /// Device class: cpu, gpu, accelerator, all
    #[arg(short, long, default_value = "cpu")]
    pub device: DeviceClass,

    /// Work-group size: auto or RxC
    #[arg(long, default_value = "1x1")]
    pub local_size: LocalSize,

    /// Options passed to the kernel compiler
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub build_options: String,

    /// Output image (default: <input-stem>_gamma.png)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the grayscale input to this path
    #[arg(long)]
    pub original: Option<PathBuf>,

    /// Wait for Enter before exiting
    #[arg(long)]
    pub wait: bool,

    /// Compare the device result with the host lookup
    #[arg(long)]
    pub verify: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Parse a gamma exponent: finite and strictly positive.
pub fn parse_gamma(s: &str) -> Result<f64, String> {
    let gamma: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if !gamma.is_finite() || gamma <= 0.0 {
        return Err(format!("gamma must be a finite number greater than 0, got {s}"));
    }
    Ok(gamma)
}

/// Command failure.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),

    #[error("{0:#}")]
    ImageIo(anyhow::Error),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl AppError {
    /// Process exit status. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::ImageIo(_) => -1,
            Self::Compute(e) => e.exit_code(),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Where the processed raster was written.
    pub output: PathBuf,
    /// Device the kernel ran on.
    pub device: DeviceCaps,
    /// Pixels that differ from the host lookup, if `--verify` was given.
    pub mismatches: Option<usize>,
}

/// `<input-stem>_gamma.png` in the working directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{stem}_gamma.png"))
}

impl Cli {
    /// Pipeline settings selected by the flags.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_device_class(self.device)
            .with_entry_point(self.entry_point.clone())
            .with_build_options(self.build_options.clone())
            .with_local_size(self.local_size)
    }
}

/// Run the command for parsed arguments.
///
/// The image and kernel source are loaded before any device call, so a bad
/// path never touches the compute API.
pub fn execute<A: ComputeApi>(cli: &Cli, api: &A) -> Result<RunReport, AppError> {
    let source = image_io::load_gray(&cli.image).map_err(AppError::ImageIo)?;
    info!(
        path = %cli.image.display(),
        rows = source.rows,
        cols = source.cols,
        "Loaded image"
    );

    let lut = GammaLut::new(cli.gamma).map_err(|e| AppError::Usage(e.to_string()))?;
    let kernel = KernelSource::from_path(&cli.kernel)?;

    let output = run_gamma(api, cli.pipeline_config(), &source, &lut, &kernel)?;

    let mismatches = cli.verify.then(|| {
        let mut expected = source.clone();
        lut.apply_in_place(expected.data_mut());
        let count = expected
            .data()
            .iter()
            .zip(output.image.data())
            .filter(|(a, b)| a != b)
            .count();
        if count > 0 {
            warn!(mismatches = count, "Device result differs from host lookup");
        }
        count
    });

    if let Some(path) = &cli.original {
        image_io::save_gray(path, &source).map_err(AppError::ImageIo)?;
    }
    let out_path = cli.output.clone().unwrap_or_else(|| default_output_path(&cli.image));
    image_io::save_gray(&out_path, &output.image).map_err(AppError::ImageIo)?;

    println!(
        "{} ({}x{}) gamma {} on {} [{}] -> {}",
        cli.image.display(),
        source.cols,
        source.rows,
        cli.gamma,
        output.device.name,
        output.device.vendor,
        out_path.display()
    );
    if let Some(count) = mismatches {
        println!("verify: {count} of {} pixels differ from host lookup", source.byte_size());
    }

    if cli.wait {
        image_io::await_acknowledgment("Press Enter to exit...").map_err(AppError::ImageIo)?;
    }

    Ok(RunReport {
        output: out_path,
        device: output.device,
        mismatches,
    })
}

/// Parse `argv`.
///
/// On failure the clap message has been printed and the exit status is
/// returned: `0` for `--help` and `--version`, `-1` for usage errors.
pub fn parse<I, T>(argv: I) -> Result<Cli, i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(argv).map_err(|e| {
        let _ = e.print();
        match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => AppError::Usage(e.to_string()).exit_code(),
        }
    })
}

/// Parse `argv`, run, and return the process exit status.
///
/// Usage errors exit before anything else happens.
pub fn run<A, I, T>(argv: I, api: &A) -> i32
where
    A: ComputeApi,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match parse(argv) {
        Ok(cli) => cli,
        Err(code) => return code,
    };

    let _guard = match logging::init_tracing(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            return -1;
        }
    };

    match execute(&cli, api) {
        Ok(_) => 0,
        Err(e) => {
            report(&e);
            e.exit_code()
        }
    }
}

fn report(err: &AppError) {
    match err {
        AppError::Compute(e) => eprintln!("error: {} failed: {e}", e.stage()),
        other => eprintln!("error: {other}"),
    }
}
