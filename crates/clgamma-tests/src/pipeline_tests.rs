//! End-to-end pipeline behavior against the fake device.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_abs_diff_eq;
use clgamma_compute::backend::{ComputeApi, status};
use clgamma_compute::{
    ComputeError, DeviceBuffers, ExecutionContext, GammaPipeline, LocalSize, MemAccess,
    PipelineConfig, PixelBuffer, run_gamma,
};
use clgamma_lut::GammaLut;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::{Call, Dispatch, FakeApi, FakeDevice, RecordedArg, shipped_kernel, uniform};

/// Counts events at `WARN` or more severe.
struct LoudEvents(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for LoudEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() <= Level::WARN {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[test]
fn test_uniform_4x4_gamma_2() {
    let api = FakeApi::new();
    let lut = GammaLut::new(2.0).unwrap();
    let source = uniform(4, 4, 128);
    let out = run_gamma(&api, PipelineConfig::default(), &source, &lut, &shipped_kernel()).unwrap();

    assert_eq!((out.image.rows, out.image.cols, out.image.channels), (4, 4, 1));
    for &px in out.image.data() {
        assert_eq!(px, lut.get(128));
        assert_abs_diff_eq!(px as f64, 65.0, epsilon = 1.0);
    }

    let args = api.kernel_args();
    assert_eq!(args.len(), 4);
    assert_eq!(args[2], (2, RecordedArg::Int(4)));
    assert_eq!(
        api.dispatches(),
        vec![Dispatch {
            global: [4, 4],
            local: Some([1, 1])
        }]
    );
    assert_eq!(out.device.name, "Fake CPU");
}

#[test]
fn test_argument_order() {
    let api = FakeApi::new();
    let source = uniform(2, 3, 7);
    run_gamma(&api, PipelineConfig::default(), &source, &GammaLut::identity(), &shipped_kernel())
        .unwrap();

    let mems: Vec<u64> = api
        .created()
        .into_iter()
        .filter(|(k, _)| *k == crate::Resource::Mem)
        .map(|(_, id)| id)
        .collect();
    let (src, dst, lut) = (mems[0], mems[1], mems[2]);

    assert_eq!(
        api.kernel_args(),
        vec![
            (0, RecordedArg::Mem(src)),
            (1, RecordedArg::Mem(dst)),
            (2, RecordedArg::Int(3)),
            (3, RecordedArg::Mem(lut)),
        ]
    );
    assert_eq!(
        api.buffer_access(),
        vec![MemAccess::ReadOnly, MemAccess::WriteOnly, MemAccess::ReadOnly]
    );
}

#[test]
fn test_ramp_matches_host_lookup() {
    let api = FakeApi::new();
    let ramp: Vec<u8> = (0..=255u8).collect();
    let source = PixelBuffer::new(16, 16, 1, ramp.clone()).unwrap();
    let lut = GammaLut::new(2.2).unwrap();

    let out = run_gamma(&api, PipelineConfig::default(), &source, &lut, &shipped_kernel()).unwrap();

    let mut expected = ramp;
    lut.apply_in_place(&mut expected);
    assert_eq!(out.image.data(), expected.as_slice());
    assert_eq!(out.image.data()[128], 56);
}

#[test]
fn test_identity_twice_reproduces_input() {
    let data: Vec<u8> = (0..48).map(|i| (i * 5) as u8).collect();
    let source = PixelBuffer::new(6, 8, 1, data).unwrap();
    let lut = GammaLut::new(1.0).unwrap();
    let kernel = shipped_kernel();

    let config = PipelineConfig::default();
    let first = run_gamma(&FakeApi::new(), config.clone(), &source, &lut, &kernel).unwrap();
    let second = run_gamma(&FakeApi::new(), config, &first.image, &lut, &kernel).unwrap();
    assert_eq!(second.image, source);
}

#[test]
fn test_multi_channel_stride() {
    let api = FakeApi::new();
    let source = PixelBuffer::new(2, 3, 3, vec![200; 18]).unwrap();
    let lut = GammaLut::new(0.5).unwrap();
    let out = run_gamma(&api, PipelineConfig::default(), &source, &lut, &shipped_kernel()).unwrap();

    assert_eq!(api.dispatches()[0].global, [2, 9]);
    assert!(api.kernel_args().contains(&(2, RecordedArg::Int(9))));
    assert!(out.image.data().iter().all(|&v| v == lut.get(200)));
}

#[test]
fn test_auto_local_size() {
    let api = FakeApi::new();
    let config = PipelineConfig::default().with_local_size(LocalSize::Auto);
    run_gamma(&api, config, &uniform(5, 7, 1), &GammaLut::identity(), &shipped_kernel()).unwrap();
    assert_eq!(api.dispatches()[0].local, None);
}

#[test]
fn test_build_failure_carries_log() {
    let api = FakeApi::new()
        .with_build_log("kernel.cl:3:5: error: use of undeclared identifier 'lutt'")
        .fail(Call::BuildProgram, status::BUILD_PROGRAM_FAILURE);
    let source = uniform(2, 2, 0);
    let lut = GammaLut::identity();
    let err = run_gamma(&api, PipelineConfig::default(), &source, &lut, &shipped_kernel())
        .unwrap_err();

    match &err {
        ComputeError::Build { log, entry_point, code } => {
            assert!(log.contains("undeclared identifier 'lutt'"));
            assert_eq!(entry_point, "gamma_transform");
            assert_eq!(*code, status::BUILD_PROGRAM_FAILURE);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("undeclared identifier"));
}

#[test]
fn test_failure_left_to_caller_to_report() {
    let loud = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(LoudEvents(loud.clone()));
    let api = FakeApi::new()
        .with_build_log("kernel.cl:1:1: error: expected identifier")
        .fail(Call::BuildProgram, status::BUILD_PROGRAM_FAILURE);

    let err = tracing::subscriber::with_default(subscriber, || {
        let (source, lut) = (uniform(2, 2, 0), GammaLut::identity());
        run_gamma(&api, PipelineConfig::default(), &source, &lut, &shipped_kernel()).unwrap_err()
    });

    assert!(matches!(err, ComputeError::Build { .. }));
    assert_eq!(loud.load(Ordering::Relaxed), 0);
}

#[test]
fn test_source_without_kernel_fails_build() {
    let api = FakeApi::new();
    let source =
        clgamma_compute::KernelSource::from_bytes("bad.cl", b"int main() { return 0; }".to_vec())
            .unwrap();
    let image = uniform(2, 2, 0);
    let err = run_gamma(&api, PipelineConfig::default(), &image, &GammaLut::identity(), &source)
        .unwrap_err();

    let ComputeError::Build { log, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(!log.trim().is_empty());
    assert_eq!(err.exit_code(), status::BUILD_PROGRAM_FAILURE);
}

#[test]
fn test_missing_entry_point() {
    let api = FakeApi::new();
    let config = PipelineConfig::default().with_entry_point("gamma_transform_v2");
    let source = uniform(2, 2, 0);
    let err =
        run_gamma(&api, config, &source, &GammaLut::identity(), &shipped_kernel()).unwrap_err();

    assert_eq!(err.exit_code(), status::INVALID_KERNEL_NAME);
    let ComputeError::Build { log, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(log.contains("gamma_transform_v2"));
    assert_eq!(api.live_resources(), 0);
}

#[test]
fn test_oversize_allocation_fails_explicitly() {
    // 16-byte image against an 8-byte allocation limit.
    let api = FakeApi::new().with_max_alloc(8);
    let source = uniform(4, 4, 1);
    let lut = GammaLut::identity();
    let err = run_gamma(&api, PipelineConfig::default(), &source, &lut, &shipped_kernel())
        .unwrap_err();

    match err {
        ComputeError::Allocation { what, bytes, source } => {
            assert_eq!(what, "source");
            assert_eq!(bytes, 16);
            assert_eq!(source.code, status::INVALID_BUFFER_SIZE);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.call_count(Call::CreateBuffer), 0);
    assert_eq!(api.live_resources(), 0);
}

#[test]
fn test_build_options_forwarded() {
    let api = FakeApi::new();
    let config = PipelineConfig::default().with_build_options("-cl-fast-relaxed-math");
    run_gamma(&api, config, &uniform(1, 1, 0), &GammaLut::identity(), &shipped_kernel()).unwrap();
    assert_eq!(api.build_options(), vec!["-cl-fast-relaxed-math".to_string()]);
}

#[test]
fn test_finish_skipped_when_disabled() {
    let api = FakeApi::new();
    let mut config = PipelineConfig::default();
    config.finish_on_teardown = false;
    GammaPipeline::new(&api, config)
        .run(&uniform(2, 2, 3), &GammaLut::identity(), &shipped_kernel())
        .unwrap();
    assert_eq!(api.call_count(Call::Finish), 0);
}

#[test]
fn test_destination_uploaded_as_zeros() {
    let api = FakeApi::new();
    let device = FakeDevice(0);
    let exec = ExecutionContext::create(&api, &device).unwrap();
    let caps = api.device_caps(&device).unwrap();

    let source = uniform(3, 3, 90);
    let mut buffers = DeviceBuffers::allocate(&api, &exec, &caps, source.byte_size()).unwrap();
    buffers
        .upload(&api, &exec, &source, &source.zeroed_like(), &GammaLut::identity())
        .unwrap();

    let mut dst = vec![0xAA; 9];
    api.read_buffer(exec.queue(), buffers.dst(), &mut dst).unwrap();
    assert!(dst.iter().all(|&b| b == 0));

    let mut src = vec![0; 9];
    api.read_buffer(exec.queue(), buffers.src(), &mut src).unwrap();
    assert!(src.iter().all(|&b| b == 90));
}

#[test]
fn test_upload_size_mismatch() {
    let api = FakeApi::new();
    let device = FakeDevice(0);
    let exec = ExecutionContext::create(&api, &device).unwrap();
    let caps = api.device_caps(&device).unwrap();

    let mut buffers = DeviceBuffers::allocate(&api, &exec, &caps, 4).unwrap();
    let wrong = uniform(3, 3, 0);
    let err = buffers
        .upload(&api, &exec, &wrong, &wrong.zeroed_like(), &GammaLut::identity())
        .unwrap_err();
    assert!(matches!(err, ComputeError::BufferSizeMismatch { expected: 4, actual: 9 }));
    assert_eq!(api.call_count(Call::WriteBuffer), 0);
}
