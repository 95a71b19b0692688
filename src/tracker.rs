//! Pose tracking state machine.
//!
//! Turns a per-frame "pose or nothing" into a stable overlay pose. Successful
//! detections are smoothed. During a detection gap the last smoothed pose is
//! drawn until the freeze timeout, then kept hidden until the lost timeout
//! discards it.
//!
//! ```text
//!             detection                 miss, elapsed < freeze
//!   any ─────────────────▶ Tracking ─────────────────────────▶ Frozen
//!                                                               │
//!                                   miss, elapsed > lost        ▼
//!                                 ◀──────────────────────────── Lost
//! ```

use crate::{
    config::TrackingConfig,
    filters::smooth,
    pose::Pose,
    Error, Result,
};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Visibility state of the tracked face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// The face was detected on the most recent processed frame
    Tracking,
    /// Detection is missing but the last pose is held
    Frozen,
    /// Detection has been missing too long; no pose is held
    #[default]
    Lost,
}

/// Result of feeding one frame's observation to the [`PoseTracker`].
///
/// `detected` and [`should_render`](Self::should_render) answer different
/// questions. `detected` is true only when the face was found on this frame.
/// `should_render` is true whenever a pose is available: fresh, or frozen
/// and still inside the freeze timeout.
/// During a freeze `detected` is false while the overlay keeps rendering at
/// the held pose; hide the overlay on `should_render`, never on `detected`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingOutput {
    /// Pose to render at, if any
    pub pose: Option<Pose>,
    /// Whether a detection occurred on this frame
    pub detected: bool,
    /// State after this update
    pub state: TrackingState,
}

impl TrackingOutput {
    /// Whether the overlay should be drawn this frame
    #[must_use]
    pub const fn should_render(&self) -> bool {
        self.pose.is_some()
    }
}

/// Temporal pose filter with freeze/lost timeouts.
///
/// All mutation happens inside [`update`](Self::update), which the frame loop
/// calls once per processed frame.
#[derive(Debug, Clone)]
pub struct PoseTracker {
    freeze_timeout: Duration,
    lost_timeout: Duration,
    smoothing_rotation: f64,
    smoothing_translation: f64,

    state: TrackingState,
    last_detection_time: Instant,
    smoothed: Option<Pose>,
    frozen: Option<Pose>,
}

impl PoseTracker {
    /// Create a tracker whose detection clock starts at `now`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the freeze timeout is not strictly
    /// less than the lost timeout, or a smoothing factor is outside `[0, 1]`.
    pub fn new(config: &TrackingConfig, now: Instant) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing PoseTracker (freeze {}ms, lost {}ms, smoothing r={} t={})",
            config.pose_freeze_timeout_ms,
            config.pose_lost_timeout_ms,
            config.smoothing_factor_rotation,
            config.smoothing_factor_translation
        );

        Ok(Self {
            freeze_timeout: Duration::from_millis(config.pose_freeze_timeout_ms),
            lost_timeout: Duration::from_millis(config.pose_lost_timeout_ms),
            smoothing_rotation: config.smoothing_factor_rotation,
            smoothing_translation: config.smoothing_factor_translation,
            state: TrackingState::default(),
            last_detection_time: now,
            smoothed: None,
            frozen: None,
        })
    }

    /// Feed one frame's raw pose (or its absence) observed at `now`.
    ///
    /// A non-finite pose is treated as a missed detection.
    pub fn update(&mut self, observation: Option<Pose>, now: Instant) -> TrackingOutput {
        match observation {
            Some(raw) if raw.is_finite() => self.on_detection(raw, now),
            Some(_) => {
                warn!("Discarding non-finite pose from solver");
                self.on_miss(now)
            }
            None => self.on_miss(now),
        }
    }

    fn on_detection(&mut self, raw: Pose, now: Instant) -> TrackingOutput {
        self.last_detection_time = now;

        let previous = self.smoothed.as_ref();
        let smoothed = Pose {
            rotation: smooth(&raw.rotation, previous.map(|p| &p.rotation), self.smoothing_rotation),
            translation: smooth(
                &raw.translation,
                previous.map(|p| &p.translation),
                self.smoothing_translation,
            ),
        };

        if self.state != TrackingState::Tracking {
            debug!("Face detected, tracking resumed from {:?}", self.state);
        }

        self.smoothed = Some(smoothed);
        self.frozen = Some(smoothed);
        self.state = TrackingState::Tracking;

        TrackingOutput {
            pose: Some(smoothed),
            detected: true,
            state: self.state,
        }
    }

    fn on_miss(&mut self, now: Instant) -> TrackingOutput {
        let elapsed = now.saturating_duration_since(self.last_detection_time);

        if elapsed < self.freeze_timeout {
            if self.state != TrackingState::Frozen {
                debug!("Face lost, freezing last pose");
            }
            self.state = TrackingState::Frozen;
            return TrackingOutput {
                pose: self.frozen,
                detected: false,
                state: self.state,
            };
        }

        if elapsed > self.lost_timeout {
            if self.frozen.take().is_some() {
                warn!(
                    "Face lost for {}ms, hiding overlay",
                    elapsed.as_millis()
                );
            }
            // Recovery after a loss starts smoothing from scratch
            self.smoothed = None;
            self.state = TrackingState::Lost;
        } else if self.state == TrackingState::Tracking {
            // A gap that skipped straight past the freeze window still degrades
            // through Frozen before Lost.
            debug!("Face lost after {}ms, overlay hidden", elapsed.as_millis());
            self.state = TrackingState::Frozen;
        }

        // Past the freeze window the frozen pose is kept until the lost
        // timeout but no longer drawn
        TrackingOutput {
            pose: None,
            detected: false,
            state: self.state,
        }
    }

    /// Current tracking state
    #[must_use]
    pub const fn state(&self) -> TrackingState {
        self.state
    }

    /// Time of the last successful detection (or construction time)
    #[must_use]
    pub const fn last_detection_time(&self) -> Instant {
        self.last_detection_time
    }

    /// Last smoothed pose snapshot, cleared on transition into `Lost`
    #[must_use]
    pub const fn frozen_pose(&self) -> Option<Pose> {
        self.frozen
    }

    /// Current smoothed pose, the reference for the next smoothing step
    #[must_use]
    pub const fn smoothed_pose(&self) -> Option<Pose> {
        self.smoothed
    }

    /// Configured freeze timeout
    #[must_use]
    pub const fn freeze_timeout(&self) -> Duration {
        self.freeze_timeout
    }

    /// Configured lost timeout
    #[must_use]
    pub const fn lost_timeout(&self) -> Duration {
        self.lost_timeout
    }
}

/// Reject timeout pairs that make the `Frozen` state unreachable
///
/// # Errors
///
/// Returns a configuration error if `freeze_ms >= lost_ms`
pub fn validate_timeouts(freeze_ms: u64, lost_ms: u64) -> Result<()> {
    if freeze_ms >= lost_ms {
        return Err(Error::ConfigError(format!(
            "Pose freeze timeout ({freeze_ms}ms) must be less than lost timeout ({lost_ms}ms)"
        )));
    }
    Ok(())
}
