//! OpenCV `solvePnP` pose solver.

use crate::{
    collaborators::PoseSolver,
    constants::NUM_POSE_LANDMARKS,
    pose::{CameraIntrinsics, Pose},
    utils::safe_cast::usize_to_i32,
    Result,
};
use nalgebra::{Point2, Point3, Vector3};
use opencv::{
    calib3d,
    core::{Mat, CV_64F},
    prelude::*,
};

/// Iterative PnP solver backed by OpenCV
#[derive(Default)]
pub struct OpenCvPnpSolver {
    /// Start each solve from the previous solution
    use_extrinsic_guess: bool,
    last: Option<(Mat, Mat)>,
}

impl OpenCvPnpSolver {
    /// Create a solver
    #[must_use]
    pub fn new() -> Self {
        log::info!("Initializing OpenCV PnP solver");
        Self::default()
    }

    /// Seed each solve with the previous result
    #[must_use]
    pub fn with_extrinsic_guess(mut self, enabled: bool) -> Self {
        self.use_extrinsic_guess = enabled;
        self
    }
}

fn matrix_to_mat<const R: usize, const C: usize>(rows: [[f64; C]; R]) -> Result<Mat> {
    let mut mat = Mat::zeros(usize_to_i32(R)?, usize_to_i32(C)?, CV_64F)?.to_mat()?;
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            *mat.at_2d_mut::<f64>(usize_to_i32(i)?, usize_to_i32(j)?)? = value;
        }
    }
    Ok(mat)
}

fn mat_to_vector(mat: &Mat) -> Result<Vector3<f64>> {
    Ok(Vector3::new(
        *mat.at_2d::<f64>(0, 0)?,
        *mat.at_2d::<f64>(1, 0)?,
        *mat.at_2d::<f64>(2, 0)?,
    ))
}

impl PoseSolver for OpenCvPnpSolver {
    fn solve(
        &mut self,
        model_points: &[Point3<f64>; NUM_POSE_LANDMARKS],
        image_points: &[Point2<f64>; NUM_POSE_LANDMARKS],
        intrinsics: &CameraIntrinsics,
    ) -> Result<Option<Pose>> {
        let object_points = matrix_to_mat(model_points.map(|p| [p.x, p.y, p.z]))?;
        let image_points = matrix_to_mat(image_points.map(|p| [p.x, p.y]))?;

        let m = &intrinsics.matrix;
        let camera_matrix = matrix_to_mat([
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ])?;
        let d = &intrinsics.distortion;
        let dist_coeffs = matrix_to_mat([[d[0]], [d[1]], [d[2]], [d[3]]])?;

        let guess = self.use_extrinsic_guess && self.last.is_some();
        let (mut rvec, mut tvec) = match (&self.last, guess) {
            (Some((r, t)), true) => (r.try_clone()?, t.try_clone()?),
            _ => (Mat::default(), Mat::default()),
        };

        let converged = calib3d::solve_pnp(
            &object_points,
            &image_points,
            &camera_matrix,
            &dist_coeffs,
            &mut rvec,
            &mut tvec,
            guess,
            calib3d::SOLVEPNP_ITERATIVE,
        )?;

        if !converged || rvec.empty() || tvec.empty() {
            self.last = None;
            return Ok(None);
        }

        let pose = Pose::new(mat_to_vector(&rvec)?, mat_to_vector(&tvec)?);
        if !pose.is_finite() {
            self.last = None;
            return Ok(None);
        }

        self.last = Some((rvec, tvec));
        Ok(Some(pose))
    }
}
