//! clgamma - gamma-correct an image on an OpenCL device

#[cfg(feature = "opencl")]
fn run() -> i32 {
    let api = clgamma_compute::OpenClApi::new();
    clgamma_cli::run(std::env::args_os(), &api)
}

#[cfg(not(feature = "opencl"))]
fn run() -> i32 {
    if let Err(code) = clgamma_cli::parse(std::env::args_os()) {
        return code;
    }
    let err = clgamma_cli::AppError::Compute(clgamma_compute::ComputeError::BackendNotAvailable(
        "OpenCL support not compiled in (rebuild with --features opencl)".to_string(),
    ));
    eprintln!("error: {err}");
    err.exit_code()
}

fn main() {
    // Every resource is released inside run(); exit only afterwards.
    let code = run();
    std::process::exit(code);
}
