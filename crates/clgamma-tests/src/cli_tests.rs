//! Command-line behavior against the fake device.

use std::ffi::OsStr;
use std::path::Path;

use clap::Parser;
use clgamma_cli::{AppError, Cli, execute, run};
use tempfile::tempdir;

use crate::{Call, FakeApi, shipped_kernel_path};

fn write_gray_png(path: &Path, width: u32, height: u32, value: u8) {
    image::GrayImage::from_pixel(width, height, image::Luma([value]))
        .save(path)
        .unwrap();
}

#[test]
fn test_malformed_gamma_is_usage_error() {
    let api = FakeApi::new();
    let code = run(["clgamma", "photo.png", "bright"], &api);
    assert_eq!(code, -1);
    assert_eq!(api.resolution_calls(), 0);
    assert!(api.created().is_empty());
}

#[test]
fn test_non_positive_gamma_is_usage_error() {
    let api = FakeApi::new();
    assert_eq!(run(["clgamma", "photo.png", "0"], &api), -1);
    assert_eq!(run(["clgamma", "photo.png", "-2.2"], &api), -1);
    assert_eq!(api.resolution_calls(), 0);
}

#[test]
fn test_missing_arguments() {
    let api = FakeApi::new();
    assert_eq!(run(["clgamma"], &api), -1);
    assert_eq!(run(["clgamma", "photo.png"], &api), -1);
    assert_eq!(api.resolution_calls(), 0);
}

#[test]
fn test_help_exits_zero() {
    let api = FakeApi::new();
    assert_eq!(run(["clgamma", "--help"], &api), 0);
    assert_eq!(api.resolution_calls(), 0);
}

#[test]
fn test_unreadable_image_before_device() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.png");
    let api = FakeApi::new();

    let argv = [OsStr::new("clgamma"), missing.as_os_str(), OsStr::new("2.2")];
    let cli = Cli::try_parse_from(argv).unwrap();
    let err = execute(&cli, &api).unwrap_err();
    assert!(matches!(err, AppError::ImageIo(_)));
    assert_eq!(err.exit_code(), -1);
    assert_eq!(api.resolution_calls(), 0);
}

#[test]
fn test_missing_kernel_before_device() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.png");
    write_gray_png(&input, 4, 4, 10);
    let api = FakeApi::new();

    let cli = Cli::try_parse_from([
        OsStr::new("clgamma"),
        input.as_os_str(),
        OsStr::new("2.2"),
        OsStr::new("--kernel"),
        dir.path().join("nope.cl").as_os_str(),
    ])
    .unwrap();
    let err = execute(&cli, &api).unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert_eq!(api.resolution_calls(), 0);
}

#[test]
fn test_full_run_writes_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let original = dir.path().join("orig.png");
    write_gray_png(&input, 4, 4, 128);
    let api = FakeApi::new();

    let cli = Cli::try_parse_from([
        OsStr::new("clgamma"),
        input.as_os_str(),
        OsStr::new("2.0"),
        OsStr::new("--kernel"),
        shipped_kernel_path().as_os_str(),
        OsStr::new("-o"),
        output.as_os_str(),
        OsStr::new("--original"),
        original.as_os_str(),
        OsStr::new("--verify"),
    ])
    .unwrap();
    let report = execute(&cli, &api).unwrap();

    assert_eq!(report.output, output);
    assert_eq!(report.mismatches, Some(0));
    assert_eq!(report.device.name, "Fake CPU");

    let written = image::open(&output).unwrap().to_luma8();
    assert_eq!(written.dimensions(), (4, 4));
    assert!(written.pixels().all(|p| p.0[0] == 64));

    let orig = image::open(&original).unwrap().to_luma8();
    assert!(orig.pixels().all(|p| p.0[0] == 128));
    assert_eq!(api.live_resources(), 0);
}

#[test]
fn test_compute_failure_exit_code() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    write_gray_png(&input, 2, 2, 1);
    let api = FakeApi::new().fail(Call::CreateQueue, -5);

    let code = run(
        [
            OsStr::new("clgamma"),
            input.as_os_str(),
            OsStr::new("1.5"),
            OsStr::new("--kernel"),
            shipped_kernel_path().as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
        ],
        &api,
    );
    assert_eq!(code, -5);
    assert!(!output.exists(), "nothing is written after a failed run");
    assert_eq!(api.live_resources(), 0);
}
