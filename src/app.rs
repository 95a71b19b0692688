//! Frame loop driving capture, tracking, rendering and compositing.

use crate::{
    collaborators::{Collaborators, FrameRead, MaterialParams},
    compositor::composite_in_place,
    config::{Config, RenderConfig},
    constants::FPS_WINDOW_MS,
    frame::Frame,
    pose::{face_model_points, CameraIntrinsics, FaceLandmarks, Pose},
    tracker::{PoseTracker, TrackingOutput, TrackingState},
    transform::{build_model_transform, build_projection_transform},
    Result,
};
use log::{debug, info, warn};
use nalgebra::Matrix4;
use std::time::{Duration, Instant};

/// Log an operation's duration at debug level
pub fn log_performance(operation: &str, duration: Duration) {
    debug!("Performance | {}: {:.2}ms", operation, duration.as_secs_f64() * 1000.0);
}

/// Frames-per-second over consecutive one-second windows
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: Duration,
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsCounter {
    /// Start the first window at `now`
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            window: Duration::from_millis(FPS_WINDOW_MS),
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one processed frame and return the latest completed window's rate
    pub fn tick(&mut self, now: Instant) -> f64 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window {
            self.fps = f64::from(self.frames) / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = now;
            debug!("FPS: {:.1}", self.fps);
        }
        self.fps
    }

    /// Rate of the last completed window (0 before the first one closes)
    #[must_use]
    pub const fn fps(&self) -> f64 {
        self.fps
    }
}

/// Lets through one of every `skip + 1` ticks
#[derive(Debug, Clone)]
pub struct FrameSkipGate {
    skip: u32,
    counter: u64,
}

impl FrameSkipGate {
    /// Gate with `skip` dropped ticks between processed ones
    #[must_use]
    pub const fn new(skip: u32) -> Self {
        Self { skip, counter: 0 }
    }

    /// Whether the current tick should be fully processed
    pub fn should_process(&mut self) -> bool {
        if self.skip == 0 {
            return true;
        }
        self.counter = self.counter.wrapping_add(1);
        self.counter % (u64::from(self.skip) + 1) == 0
    }
}

/// Time spent in each stage of a processed tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickTimings {
    pub capture: Duration,
    pub detection: Duration,
    pub render: Duration,
    pub composite: Duration,
    pub total: Duration,
}

/// What happened on one processed tick, handed to the display with the frame
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Tracking state after this tick
    pub state: TrackingState,
    /// A face was detected on this frame
    pub detected: bool,
    /// The overlay was drawn (fresh or frozen pose)
    pub should_render: bool,
    /// Pose the overlay was drawn at
    pub pose: Option<Pose>,
    /// Landmarks found on this frame
    pub landmarks: Option<FaceLandmarks>,
    /// The frame was the camera's last good frame rather than a new one
    pub stale: bool,
    /// Latest FPS measurement
    pub fps: f64,
    /// Stage timings
    pub timings: TickTimings,
}

/// Outcome of one [`OverlayApp::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Stop was requested or the source ended; no work was done
    Stopped,
    /// Dropped by the frame-skip gate
    Skipped,
    /// No frame was available; tracking advanced but nothing was shown
    NoFrame,
    /// Full pipeline ran
    Processed(TickReport),
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub processed: u64,
    pub skipped: u64,
    pub missing_frames: u64,
    pub last_fps: f64,
}

/// The overlay application
pub struct OverlayApp {
    render: RenderConfig,
    camera_fov_degrees: f64,
    tracker: PoseTracker,
    intrinsics: CameraIntrinsics,
    intrinsics_size: (u32, u32),
    material: MaterialParams,
    model_scale: f64,
    collaborators: Collaborators,
    fps: FpsCounter,
    gate: FrameSkipGate,
    summary: RunSummary,
}

impl OverlayApp {
    /// Build the app for frames of `frame_width` x `frame_height`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid
    pub fn new(
        config: &Config,
        collaborators: Collaborators,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Self> {
        Self::new_at(config, collaborators, frame_width, frame_height, Instant::now())
    }

    /// As [`new`](Self::new) with an explicit start time
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid
    pub fn new_at(
        config: &Config,
        collaborators: Collaborators,
        frame_width: u32,
        frame_height: u32,
        now: Instant,
    ) -> Result<Self> {
        info!("Initializing AR helmet overlay");
        config.tracking.validate()?;
        config.render.validate()?;

        let tracker = PoseTracker::new(&config.tracking, now)?;
        let intrinsics =
            CameraIntrinsics::from_fov(frame_width, frame_height, config.tracking.camera_fov_degrees)?;
        let model_scale = collaborators.renderer.model_scale();

        info!(
            "Camera {}x{}, focal length {:.1}px, render {}x{}, frame skip {}",
            frame_width,
            frame_height,
            intrinsics.focal_length(),
            config.render.width,
            config.render.height,
            config.render.frame_skip
        );

        Ok(Self {
            render: config.render.clone(),
            camera_fov_degrees: config.tracking.camera_fov_degrees,
            tracker,
            intrinsics,
            intrinsics_size: (frame_width, frame_height),
            material: MaterialParams::from_config(&config.render),
            model_scale,
            collaborators,
            fps: FpsCounter::new(now),
            gate: FrameSkipGate::new(config.render.frame_skip),
            summary: RunSummary::default(),
        })
    }

    /// Run ticks until stop is requested or the source ends
    pub fn run(&mut self) -> RunSummary {
        info!("Starting main loop (press 'q' or ESC to quit)");
        while !matches!(self.tick(), TickOutcome::Stopped) {}
        info!(
            "Main loop finished: {} ticks, {} processed, {} skipped, {} without frame",
            self.summary.ticks, self.summary.processed, self.summary.skipped, self.summary.missing_frames
        );
        self.summary
    }

    /// Run one iteration at the current time
    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// Run one iteration as if the clock read `now`.
    ///
    /// Collaborator failures are logged and treated as absence; nothing here
    /// ends the loop except a stop request or the end of the source.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        if self.collaborators.sink.should_stop() {
            info!("Stop requested");
            return TickOutcome::Stopped;
        }
        self.summary.ticks += 1;

        if !self.gate.should_process() {
            // Keep a live camera drained so processed ticks see current frames.
            // File frames wait for the next processed tick.
            if self.collaborators.source.is_live() {
                match self.collaborators.source.read_frame() {
                    Ok(FrameRead::Ended) => {
                        info!("End of video stream reached");
                        return TickOutcome::Stopped;
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Camera read failed on skipped tick: {}", e),
                }
            }
            self.summary.skipped += 1;
            return TickOutcome::Skipped;
        }

        let tick_start = Instant::now();
        let mut timings = TickTimings::default();

        let read = match self.collaborators.source.read_frame() {
            Ok(read) => read,
            Err(e) => {
                warn!("Camera read failed: {}", e);
                FrameRead::Missing
            }
        };
        timings.capture = tick_start.elapsed();

        if matches!(read, FrameRead::Ended) {
            info!("End of video stream reached");
            return TickOutcome::Stopped;
        }

        let stale = !read.is_fresh();
        let detect_start = Instant::now();
        let (raw_pose, landmarks) = match &read {
            FrameRead::Fresh(frame) => self.detect_pose(frame),
            _ => (None, None),
        };
        timings.detection = detect_start.elapsed();

        let output = self.tracker.update(raw_pose, now);

        let Some(mut frame) = read.into_frame() else {
            warn!("No camera frame available");
            self.summary.missing_frames += 1;
            return TickOutcome::NoFrame;
        };

        let render_start = Instant::now();
        let overlay = self.render_overlay(&output);
        timings.render = render_start.elapsed();

        let composite_start = Instant::now();
        if let Some(overlay) = overlay {
            composite_in_place(&mut frame, &overlay);
        }
        timings.composite = composite_start.elapsed();

        let fps = self.fps.tick(now);
        timings.total = tick_start.elapsed();

        let report = TickReport {
            state: output.state,
            detected: output.detected,
            should_render: output.should_render(),
            pose: output.pose,
            landmarks: if output.detected { landmarks } else { None },
            stale,
            fps,
            timings,
        };

        if let Err(e) = self.collaborators.sink.present(&frame, &report) {
            warn!("Failed to present frame: {}", e);
        }

        log_performance("capture", timings.capture);
        log_performance("detection", timings.detection);
        log_performance("render", timings.render);
        log_performance("composite", timings.composite);
        log_performance("frame", timings.total);

        self.summary.processed += 1;
        self.summary.last_fps = fps;
        TickOutcome::Processed(report)
    }

    /// Landmarks then PnP; any failure counts as no detection
    fn detect_pose(&mut self, frame: &Frame) -> (Option<Pose>, Option<FaceLandmarks>) {
        let landmarks = match self.collaborators.detector.detect(&frame.to_rgb()) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => return (None, None),
            Err(e) => {
                warn!("Landmark detection failed: {}", e);
                return (None, None);
            }
        };

        let size = (frame.width(), frame.height());
        if size != self.intrinsics_size {
            match CameraIntrinsics::from_fov(size.0, size.1, self.camera_fov_degrees) {
                Ok(intrinsics) => {
                    debug!("Frame size changed to {}x{}, updating intrinsics", size.0, size.1);
                    self.intrinsics = intrinsics;
                    self.intrinsics_size = size;
                }
                Err(e) => warn!("Keeping previous intrinsics: {}", e),
            }
        }

        let pose = match self.collaborators.solver.solve(
            &face_model_points(),
            &landmarks.image_points(),
            &self.intrinsics,
        ) {
            Ok(pose) => pose,
            Err(e) => {
                warn!("Pose solve failed: {}", e);
                None
            }
        };
        if pose.is_none() {
            debug!("Pose solve did not converge");
        }

        (pose, Some(landmarks))
    }

    /// Render at the tracked pose; `None` if the renderer failed
    fn render_overlay(&mut self, output: &TrackingOutput) -> Option<image::RgbaImage> {
        let model = output.pose.map_or_else(Matrix4::identity, |pose| {
            build_model_transform(
                &pose,
                self.render.helmet_scale,
                self.model_scale,
                self.render.helmet_offset_y,
                self.render.helmet_offset_z,
            )
        });
        let projection = build_projection_transform(
            self.render.fov_degrees,
            self.render.aspect_ratio(),
            self.render.near_plane,
            self.render.far_plane,
        );

        match self.collaborators.renderer.render(
            &model,
            &projection,
            output.should_render(),
            &self.material,
        ) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("Overlay render failed, showing raw frame: {}", e);
                None
            }
        }
    }

    /// Pose tracker state
    #[must_use]
    pub const fn tracker(&self) -> &PoseTracker {
        &self.tracker
    }

    /// Camera intrinsics currently handed to the solver
    #[must_use]
    pub const fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Counters so far
    #[must_use]
    pub const fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Latest FPS measurement
    #[must_use]
    pub const fn fps(&self) -> f64 {
        self.fps.fps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_skip_gate() {
        let mut gate = FrameSkipGate::new(2);
        let pattern: Vec<bool> = (0..9).map(|_| gate.should_process()).collect();
        assert_eq!(
            pattern,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn test_frame_skip_disabled() {
        let mut gate = FrameSkipGate::new(0);
        assert!((0..10).all(|_| gate.should_process()));
    }

    #[test]
    fn test_fps_counter_windows() {
        let t0 = Instant::now();
        let mut fps = FpsCounter::new(t0);

        // 30 frames across the first second
        for i in 1..30 {
            let rate = fps.tick(t0 + Duration::from_millis(i * 33));
            assert_eq!(rate, 0.0);
        }
        let rate = fps.tick(t0 + Duration::from_millis(1000));
        assert!((rate - 30.0).abs() < 1e-9);

        // The reported rate holds until the next window closes
        assert_eq!(fps.tick(t0 + Duration::from_millis(1100)), rate);

        let rate = fps.tick(t0 + Duration::from_millis(2000));
        assert!((rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_fps_counter_uses_actual_elapsed() {
        let t0 = Instant::now();
        let mut fps = FpsCounter::new(t0);
        for _ in 0..9 {
            fps.tick(t0);
        }
        let rate = fps.tick(t0 + Duration::from_millis(2000));
        assert!((rate - 5.0).abs() < 1e-9);
    }
}
