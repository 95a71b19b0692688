//! CPU wireframe helmet renderer.
//!
//! Draws a lit dome wireframe into an RGBA buffer with OpenCV line drawing.
//! Model and projection matrices follow OpenGL conventions; poses from the
//! PnP solver are in OpenCV camera coordinates (y down, z forward), so the
//! model-view is flipped into GL camera space before projecting.

use crate::{
    collaborators::{MaterialParams, OverlayRenderer},
    config::RenderConfig,
    utils::{
        image_conversion::rgba_mat_to_image,
        normalize_vector,
        safe_cast::{f64_to_i32_clamp, u32_to_i32},
    },
    Error, Result,
};
use image::RgbaImage;
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use opencv::{
    core::{Mat, Point, Scalar, CV_8UC4},
    imgproc::{self, LINE_AA},
};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Rings from the rim to the crown
const LATITUDE_STEPS: usize = 8;

/// Meridians around the dome
const LONGITUDE_STEPS: usize = 16;

/// Dome radius in model units
const DOME_RADIUS: f64 = 0.5;

/// Dome centre in face model coordinates (above and behind the nose tip)
const DOME_CENTER: [f64; 3] = [0.0, 0.12, -0.3];

/// Rim angle below the equator
const RIM_LATITUDE: f64 = -15.0 * PI / 180.0;

/// Unlit helmet colour (RGB)
const BASE_COLOR: [f64; 3] = [215.0, 220.0, 230.0];

/// Line thickness in pixels
const LINE_THICKNESS: i32 = 2;

/// Flip from OpenCV camera axes to OpenGL camera axes
fn cv_to_gl() -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0))
}

/// Dome wireframe: vertices, outward normals and edges
#[derive(Debug, Clone)]
pub struct WireframeMesh {
    pub vertices: Vec<Point3<f64>>,
    pub normals: Vec<Vector3<f64>>,
    pub edges: Vec<(usize, usize)>,
}

impl WireframeMesh {
    /// Latitude/longitude dome covering the top of the head
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Small step counts
    pub fn helmet() -> Self {
        let center = Vector3::from(DOME_CENTER);
        let mut vertices = Vec::new();
        let mut normals = Vec::new();
        let mut edges = Vec::new();

        for lat in 0..LATITUDE_STEPS {
            let phi = RIM_LATITUDE + (FRAC_PI_2 - RIM_LATITUDE) * lat as f64 / LATITUDE_STEPS as f64;
            for lon in 0..LONGITUDE_STEPS {
                let theta = TAU * lon as f64 / LONGITUDE_STEPS as f64;
                let normal = Vector3::new(phi.cos() * theta.sin(), phi.sin(), phi.cos() * theta.cos());
                vertices.push(Point3::from(center + normal * DOME_RADIUS));
                normals.push(normal);

                let index = lat * LONGITUDE_STEPS + lon;
                edges.push((index, lat * LONGITUDE_STEPS + (lon + 1) % LONGITUDE_STEPS));
                if lat + 1 < LATITUDE_STEPS {
                    edges.push((index, index + LONGITUDE_STEPS));
                }
            }
        }

        // Crown
        let crown = vertices.len();
        vertices.push(Point3::from(center + Vector3::y() * DOME_RADIUS));
        normals.push(Vector3::y());
        for lon in 0..LONGITUDE_STEPS {
            edges.push(((LATITUDE_STEPS - 1) * LONGITUDE_STEPS + lon, crown));
        }

        Self { vertices, normals, edges }
    }

    /// Largest axis-aligned extent of the mesh
    #[must_use]
    pub fn extent(&self) -> f64 {
        let (min, max) = self.vertices.iter().fold(
            (Vector3::repeat(f64::INFINITY), Vector3::repeat(f64::NEG_INFINITY)),
            |(min, max), v| (min.inf(&v.coords), max.sup(&v.coords)),
        );
        (max - min).max()
    }
}

/// Project a model-space point to pixel coordinates.
///
/// Returns `None` for points outside the clip volume's depth range.
#[must_use]
pub fn project_to_pixel(mvp: &Matrix4<f64>, point: &Point3<f64>, width: u32, height: u32) -> Option<(f64, f64)> {
    let clip = mvp * point.to_homogeneous();
    if clip.w <= f64::EPSILON {
        return None;
    }
    let ndc = clip.xyz() / clip.w;
    if !(-1.0..=1.0).contains(&ndc.z) {
        return None;
    }
    Some((
        (ndc.x + 1.0) * 0.5 * f64::from(width),
        (1.0 - ndc.y) * 0.5 * f64::from(height),
    ))
}

/// Lambert shading for one edge
fn shade(normal_view: &Vector3<f64>, material: &MaterialParams) -> Scalar {
    let intensity = if material.lighting {
        let light = normalize_vector(&Vector3::new(
            f64::from(material.light_position[0]),
            f64::from(material.light_position[1]),
            f64::from(material.light_position[2]),
        ));
        let lambert = normal_view.dot(&light).max(0.0);
        f64::from(material.ambient) + f64::from(material.diffuse) * lambert
    } else {
        f64::from(material.ambient)
    }
    .clamp(0.0, 1.0);

    let channel = |i: usize| (BASE_COLOR[i] * intensity * f64::from(material.light_color[i])).clamp(0.0, 255.0);
    Scalar::new(
        channel(0),
        channel(1),
        channel(2),
        (f64::from(material.opacity) * 255.0).clamp(0.0, 255.0),
    )
}

/// Wireframe helmet renderer
pub struct WireframeRenderer {
    width: u32,
    height: u32,
    mesh: WireframeMesh,
    model_extent: f64,
}

impl WireframeRenderer {
    /// Create a renderer for the configured output size
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the output size or model extent is invalid
    pub fn new(config: &RenderConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(Error::ConfigError(format!(
                "Render size must be non-zero, got {}x{}",
                config.width, config.height
            )));
        }
        if !(config.model_extent > 0.0) {
            return Err(Error::ConfigError(format!(
                "Model extent must be positive, got {}",
                config.model_extent
            )));
        }

        let mesh = WireframeMesh::helmet();
        log::info!(
            "Initializing wireframe renderer {}x{} ({} vertices, {} edges, extent {:.2})",
            config.width,
            config.height,
            mesh.vertices.len(),
            mesh.edges.len(),
            mesh.extent()
        );

        Ok(Self {
            width: config.width,
            height: config.height,
            mesh,
            model_extent: config.model_extent,
        })
    }
}

impl OverlayRenderer for WireframeRenderer {
    fn render(
        &mut self,
        model: &Matrix4<f64>,
        projection: &Matrix4<f64>,
        visible: bool,
        material: &MaterialParams,
    ) -> Result<RgbaImage> {
        if !visible {
            return Ok(RgbaImage::new(self.width, self.height));
        }

        let rows = u32_to_i32(self.height)?;
        let cols = u32_to_i32(self.width)?;
        let mut canvas = Mat::new_rows_cols_with_default(rows, cols, CV_8UC4, Scalar::default())?;

        let model_view = cv_to_gl() * model;
        let mvp = projection * model_view;
        let normal_matrix = model_view
            .fixed_view::<3, 3>(0, 0)
            .into_owned()
            .try_inverse()
            .map(|m| m.transpose())
            .ok_or_else(|| Error::Renderer("Model transform is singular".to_string()))?;

        let projected: Vec<Option<Point>> = self
            .mesh
            .vertices
            .iter()
            .map(|v| {
                project_to_pixel(&mvp, v, self.width, self.height).map(|(x, y)| {
                    // Far off-screen points are clamped; line drawing clips the rest
                    Point::new(
                        f64_to_i32_clamp(x, cols.saturating_mul(-4), cols.saturating_mul(4)),
                        f64_to_i32_clamp(y, rows.saturating_mul(-4), rows.saturating_mul(4)),
                    )
                })
            })
            .collect();

        for &(a, b) in &self.mesh.edges {
            let (Some(p0), Some(p1)) = (projected[a], projected[b]) else {
                continue;
            };
            let normal = normalize_vector(&(normal_matrix * (self.mesh.normals[a] + self.mesh.normals[b])));
            imgproc::line(
                &mut canvas,
                p0,
                p1,
                shade(&normal, material),
                LINE_THICKNESS,
                LINE_AA,
                0,
            )?;
        }

        rgba_mat_to_image(&canvas)
    }

    fn model_scale(&self) -> f64 {
        1.0 / self.model_extent
    }
}
