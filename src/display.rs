//! HighGUI window showing composited frames and debug information.

use crate::{
    app::TickReport,
    collaborators::FrameSink,
    config::DebugConfig,
    constants::{KEY_ESCAPE, KEY_QUIT, KEY_TOGGLE_LANDMARKS},
    frame::Frame,
    pose::FaceLandmarks,
    utils::{image_conversion::frame_to_mat, landmark_bounds},
    Result,
};
use log::{info, warn};
use opencv::{
    core::{Mat, Point, Rect, Scalar},
    highgui::{self, WINDOW_NORMAL, WND_PROP_VISIBLE},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
};

/// Display window sink.
///
/// Keys: `q`/ESC quit, `d` toggles the landmark overlay. Closing the window
/// also stops the loop. All windows are destroyed on drop.
pub struct HighGuiDisplay {
    window_title: String,
    show_fps: bool,
    show_landmarks: bool,
    shown: bool,
    stop_requested: bool,
}

impl HighGuiDisplay {
    /// Open the display window
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be created
    pub fn new(window_title: &str, width: i32, height: i32, debug: &DebugConfig) -> Result<Self> {
        info!("Opening display window '{}'", window_title);
        highgui::named_window(window_title, WINDOW_NORMAL)?;
        highgui::resize_window(window_title, width, height)?;

        Ok(Self {
            window_title: window_title.to_string(),
            show_fps: debug.show_fps,
            show_landmarks: debug.show_landmarks,
            shown: false,
            stop_requested: false,
        })
    }

    /// Whether landmark drawing is on
    #[must_use]
    pub const fn show_landmarks(&self) -> bool {
        self.show_landmarks
    }

    fn draw_fps(image: &mut Mat, fps: f64) -> Result<()> {
        imgproc::put_text(
            image,
            &format!("FPS: {fps:.1}"),
            Point::new(10, 30),
            FONT_HERSHEY_SIMPLEX,
            0.8,
            Scalar::new(0.0, 255.0, 0.0, 0.0),
            2,
            LINE_8,
            false,
        )?;
        Ok(())
    }

    fn draw_landmarks(image: &mut Mat, landmarks: &FaceLandmarks) -> Result<()> {
        for &(x, y) in landmarks.points() {
            imgproc::circle(
                image,
                Point::new(x, y),
                3,
                Scalar::new(0.0, 255.0, 0.0, 0.0),
                -1,
                LINE_8,
                0,
            )?;
        }

        let (min_x, min_y, max_x, max_y) = landmark_bounds(landmarks);
        imgproc::rectangle(
            image,
            Rect::new(min_x, min_y, max_x - min_x, max_y - min_y),
            Scalar::new(255.0, 128.0, 0.0, 0.0),
            1,
            LINE_8,
            0,
        )?;
        Ok(())
    }

    fn handle_key(&mut self, key: i32) {
        if key < 0 {
            return;
        }
        match key & 0xFF {
            KEY_ESCAPE | KEY_QUIT => {
                info!("Quit key pressed");
                self.stop_requested = true;
            }
            KEY_TOGGLE_LANDMARKS => {
                self.show_landmarks = !self.show_landmarks;
                info!("Debug landmarks: {}", self.show_landmarks);
            }
            _ => {}
        }
    }

    fn window_closed(&self) -> bool {
        if !self.shown {
            return false;
        }
        match highgui::get_window_property(&self.window_title, WND_PROP_VISIBLE) {
            Ok(visible) => visible < 1.0,
            Err(_) => true,
        }
    }
}

impl FrameSink for HighGuiDisplay {
    fn present(&mut self, frame: &Frame, report: &TickReport) -> Result<()> {
        let mut image = frame_to_mat(frame)?;

        if self.show_fps {
            Self::draw_fps(&mut image, report.fps)?;
        }
        if self.show_landmarks {
            if let Some(landmarks) = &report.landmarks {
                Self::draw_landmarks(&mut image, landmarks)?;
            }
        }

        highgui::imshow(&self.window_title, &image)?;
        self.shown = true;
        Ok(())
    }

    fn should_stop(&mut self) -> bool {
        match highgui::wait_key(1) {
            Ok(key) => self.handle_key(key),
            Err(e) => warn!("Failed to poll keyboard: {}", e),
        }
        if !self.stop_requested && self.window_closed() {
            info!("Window close requested");
            self.stop_requested = true;
        }
        self.stop_requested
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            warn!("Failed to destroy windows: {}", e);
        }
    }
}
