//! Signal filtering for smoothing pose estimates.
//!
//! Raw solver output jitters from frame to frame even when the head is still.
//! The filters here trade a little latency for a stable overlay.

/// Exponential low-pass filter over fixed-size vectors
pub mod exponential;

pub use exponential::{clamp_smoothing_factor, smooth};
