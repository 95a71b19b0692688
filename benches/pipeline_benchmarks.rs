//! Benchmarks for transforms, compositing and full frame loop ticks

use ar_helmet_overlay::{
    app::{OverlayApp, TickReport},
    collaborators::{
        Collaborators, FrameRead, FrameSink, FrameSource, LandmarkDetector, MaterialParams, OverlayRenderer,
        PoseSolver,
    },
    compositor::{composite, composite_in_place},
    config::Config,
    constants::NUM_POSE_LANDMARKS,
    frame::{ChannelOrder, Frame},
    pose::{CameraIntrinsics, FaceLandmarks, Pose},
    transform::{build_model_transform, build_projection_transform, rotation_matrix_from_vector},
    Result,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use nalgebra::{Matrix4, Point2, Point3, Vector3};
use std::time::{Duration, Instant};

/// Overlay with a transparent border and a translucent centre block
fn helmet_like_overlay(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let inside = x > width / 4 && x < 3 * width / 4 && y < height / 2;
        if inside {
            Rgba([200, 205, 215, 128 + (rand::random::<u8>() % 128)])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn benchmark_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transforms");
    let pose = Pose::new(Vector3::new(3.0, 0.1, -0.05), Vector3::new(0.2, -0.1, 5.0));

    group.bench_function("rotation_matrix_from_vector", |b| {
        b.iter(|| black_box(rotation_matrix_from_vector(black_box(&pose.rotation))));
    });

    group.bench_function("build_model_transform", |b| {
        b.iter(|| black_box(build_model_transform(black_box(&pose), 1.35, 1.0, 0.08, 0.02)));
    });

    group.bench_function("build_projection_transform", |b| {
        b.iter(|| black_box(build_projection_transform(black_box(60.0), 16.0 / 9.0, 0.1, 100.0)));
    });

    group.finish();
}

fn benchmark_compositing(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositing");
    group.sample_size(20);

    for (width, height) in [(640u32, 480u32), (1280, 720)] {
        let frame = Frame::filled(width, height, [40, 60, 80], ChannelOrder::Bgr).expect("valid frame size");
        let label = format!("{width}x{height}");

        let matching = helmet_like_overlay(width, height);
        group.bench_with_input(BenchmarkId::new("same_size", &label), &matching, |b, overlay| {
            let mut target = frame.clone();
            b.iter(|| composite_in_place(black_box(&mut target), black_box(overlay)));
        });

        // Renderer output at a different size than the camera forces a resize
        let mismatched = helmet_like_overlay(1280, 720);
        group.bench_with_input(BenchmarkId::new("resized_from_720p", &label), &mismatched, |b, overlay| {
            b.iter(|| black_box(composite(black_box(&frame), black_box(overlay))));
        });
    }

    group.finish();
}

/// Camera that repeats one frame forever
struct LoopingSource(Frame);

impl FrameSource for LoopingSource {
    fn read_frame(&mut self) -> Result<FrameRead> {
        Ok(FrameRead::Fresh(self.0.clone()))
    }
}

/// Detector that finds a face on every other frame
struct FlickeringDetector(bool);

impl LandmarkDetector for FlickeringDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Option<FaceLandmarks>> {
        self.0 = !self.0;
        Ok(self
            .0
            .then(|| FaceLandmarks::new([(320, 240), (320, 330), (260, 200), (380, 200), (285, 290), (355, 290)])))
    }
}

struct JitterSolver;

impl PoseSolver for JitterSolver {
    fn solve(
        &mut self,
        _model_points: &[Point3<f64>; NUM_POSE_LANDMARKS],
        _image_points: &[Point2<f64>; NUM_POSE_LANDMARKS],
        _intrinsics: &CameraIntrinsics,
    ) -> Result<Option<Pose>> {
        Ok(Some(Pose::new(
            Vector3::new(3.0 + 0.01 * rand::random::<f64>(), 0.1, 0.0),
            Vector3::new(0.0, 0.0, 5.0 + 0.05 * rand::random::<f64>()),
        )))
    }
}

/// Renderer that returns a prepared overlay
struct CannedRenderer(RgbaImage);

impl OverlayRenderer for CannedRenderer {
    fn render(
        &mut self,
        _model: &Matrix4<f64>,
        _projection: &Matrix4<f64>,
        visible: bool,
        _material: &MaterialParams,
    ) -> Result<RgbaImage> {
        Ok(if visible {
            self.0.clone()
        } else {
            RgbaImage::new(self.0.width(), self.0.height())
        })
    }
}

struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, frame: &Frame, report: &TickReport) -> Result<()> {
        black_box((frame, report));
        Ok(())
    }

    fn should_stop(&mut self) -> bool {
        false
    }
}

fn benchmark_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(20);

    let frame = Frame::filled(640, 480, [40, 60, 80], ChannelOrder::Bgr).expect("valid frame size");
    let mut config = Config::default();
    config.render.width = 640;
    config.render.height = 480;

    let collaborators = Collaborators {
        source: Box::new(LoopingSource(frame)),
        detector: Box::new(FlickeringDetector(false)),
        solver: Box::new(JitterSolver),
        renderer: Box::new(CannedRenderer(helmet_like_overlay(640, 480))),
        sink: Box::new(NullSink),
    };
    let t0 = Instant::now();
    let mut app = OverlayApp::new_at(&config, collaborators, 640, 480, t0).expect("default config is valid");

    let mut frame_index = 0u64;
    group.bench_function("640x480_mock_collaborators", |b| {
        b.iter(|| {
            frame_index += 1;
            black_box(app.tick_at(t0 + Duration::from_millis(33 * frame_index)))
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_transforms, benchmark_compositing, benchmark_tick);
criterion_main!(benches);
